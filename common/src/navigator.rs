//! Info screen / menu navigation driven by encoder events.
//!
//! The info screen and the menu share one display. Switching modes always
//! disables the outgoing renderer before the incoming one writes anything.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::NavigatorConfig;
use crate::lifecycle::LifecycleController;
use crate::ports::{DisplayPort, MenuPort, MenuValue};
use crate::types::{LifecycleSnapshot, NavigatorMode};

pub const CMD_RETURN_TO_INFO: &str = "returnToInfo";
pub const CMD_POWER: &str = "power";

pub const ITEM_TEMPERATURE: &str = "temperature";
pub const ITEM_TIMER: &str = "timer";
pub const ITEM_DISPLAY_TARGET: &str = "displayTargetTemp";

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Clicked,
    LongPressClicked,
    ValueChanged { item_id: String, value: MenuValue },
    Selected(String),
}

pub struct Navigator {
    inner: Mutex<NavigatorInner>,
    lifecycle: Arc<LifecycleController>,
    config: NavigatorConfig,
}

struct NavigatorInner {
    mode: NavigatorMode,
    display: Box<dyn DisplayPort>,
    menu: Box<dyn MenuPort>,
    // Duration used for the next menu-initiated start; `None` runs unlimited.
    run_duration: Option<Duration>,
    last_rendered_temp_c: Option<f32>,
}

impl Navigator {
    pub fn new(
        display: Box<dyn DisplayPort>,
        menu: Box<dyn MenuPort>,
        lifecycle: Arc<LifecycleController>,
        config: NavigatorConfig,
    ) -> Self {
        Self {
            inner: Mutex::new(NavigatorInner {
                mode: NavigatorMode::InfoScreen,
                display,
                menu,
                run_duration: None,
                last_rendered_temp_c: None,
            }),
            lifecycle,
            config,
        }
    }

    pub async fn mode(&self) -> NavigatorMode {
        self.inner.lock().await.mode
    }

    pub async fn run_duration(&self) -> Option<Duration> {
        self.inner.lock().await.run_duration
    }

    pub async fn handle(&self, event: InputEvent) {
        let mut inner = self.inner.lock().await;
        match event {
            InputEvent::Clicked => {
                if inner.mode == NavigatorMode::InfoScreen {
                    inner.mode = NavigatorMode::Menu;
                    inner.menu.enable();
                    debug!("menu opened");
                } else {
                    // The menu consumes its own clicks.
                    debug!("click while in menu left to the menu");
                }
            }
            InputEvent::LongPressClicked => {
                let target = self.config.long_press_target_c;
                info!("long press: toggling power at {target:.0}C");
                if let Err(err) = self.lifecycle.set_target_temp(target).await {
                    warn!("long press target rejected: {err}");
                }
                self.toggle_power(&mut inner).await;
            }
            InputEvent::ValueChanged { item_id, value } => {
                self.apply_value_change(&mut inner, &item_id, value).await;
            }
            InputEvent::Selected(command) => match command.as_str() {
                CMD_RETURN_TO_INFO => self.show_info(&mut inner).await,
                CMD_POWER => {
                    debug!("menu power");
                    self.toggle_power(&mut inner).await;
                }
                other => warn!("ignoring unknown menu command {other:?}"),
            },
        }
    }

    /// Closes the menu if it is open and renders the info screen.
    pub async fn show_info_screen(&self) {
        let mut inner = self.inner.lock().await;
        self.show_info(&mut inner).await;
    }

    /// Re-renders the info screen when the temperature moved far enough and
    /// the info screen owns the display.
    pub async fn on_temperature_changed(&self, temp_c: f32) {
        let mut inner = self.inner.lock().await;
        if inner.mode != NavigatorMode::InfoScreen {
            return;
        }
        let moved = inner
            .last_rendered_temp_c
            .map(|last| (temp_c - last).abs() >= self.config.refresh_threshold_c)
            .unwrap_or(true);
        if moved {
            let snapshot = self.lifecycle.snapshot().await;
            render_info(&mut inner, &snapshot);
        }
    }

    async fn show_info(&self, inner: &mut NavigatorInner) {
        if inner.mode == NavigatorMode::Menu {
            inner.menu.disable();
            inner.mode = NavigatorMode::InfoScreen;
            inner.display.clear();
            debug!("menu closed");
        }
        let snapshot = self.lifecycle.snapshot().await;
        render_info(inner, &snapshot);
    }

    async fn toggle_power(&self, inner: &mut NavigatorInner) {
        let target = self.lifecycle.target_temp_c().await;
        match self.lifecycle.toggle_power(target, inner.run_duration).await {
            Ok(state) => debug!("power toggled, now {}", state.as_str()),
            Err(err) => warn!("power toggle rejected: {err}"),
        }
        if inner.mode == NavigatorMode::InfoScreen {
            let snapshot = self.lifecycle.snapshot().await;
            render_info(inner, &snapshot);
        }
    }

    async fn apply_value_change(&self, inner: &mut NavigatorInner, item_id: &str, value: MenuValue) {
        match (item_id, &value) {
            (ITEM_TEMPERATURE, MenuValue::Number(target)) => {
                match self.lifecycle.set_target_temp(*target as f32).await {
                    Ok(_) => {
                        let applied = self.lifecycle.target_temp_c().await;
                        inner.menu.update_item_value(
                            ITEM_DISPLAY_TARGET,
                            &MenuValue::Number(f64::from(applied)),
                        );
                    }
                    Err(err) => warn!("menu target rejected: {err}"),
                }
            }
            (ITEM_TIMER, MenuValue::Span(span)) => {
                inner.run_duration = (!span.is_zero()).then_some(*span);
            }
            (ITEM_TEMPERATURE | ITEM_TIMER, other) => {
                warn!("menu item {item_id:?} sent unexpected value {other:?}");
            }
            _ => warn!("ignoring value change for unknown menu item {item_id:?}"),
        }
    }
}

fn render_info(inner: &mut NavigatorInner, snapshot: &LifecycleSnapshot) {
    let current = snapshot
        .current_temp_c
        .map(|temp| format!("{temp:.1}"))
        .unwrap_or_else(|| "--.-".to_string());
    inner
        .display
        .write_line(&format!("Current Temp: {current}C"), 0);
    inner
        .display
        .write_line(&format!("Target:{:.0}C", snapshot.target_temp_c), 1);
    inner
        .display
        .write_line(&format!("Time: {}", format_remaining(snapshot.remaining_secs)), 2);
    inner.display.write_line("Click for more.", 3);
    inner.last_rendered_temp_c = snapshot.current_temp_c;
}

/// `HH:MM`, or `--:--` for a run without a duration limit.
pub fn format_remaining(remaining_secs: Option<u64>) -> String {
    match remaining_secs {
        Some(secs) => format!("{:02}:{:02}", secs / 3_600, (secs % 3_600) / 60),
        None => "--:--".to_string(),
    }
}
