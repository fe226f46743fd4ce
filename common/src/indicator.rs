//! RGB status indicator.
//!
//! Logical [`IndicatorState`]s map to a colour and to either a steady or a
//! blinking render. Pulses are fire-and-forget: the transient state is
//! rendered immediately and a background task renders the settle state
//! once the hold elapses. A plain [`StatusIndicator::pulse`] settles back
//! to the last steady state, so a pulse before the network is up returns
//! to the "not ready" render. Each pulse takes a new generation token and
//! aborts the previous settle task, so the most recent trigger always
//! determines the final render.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::IndicatorConfig;
use crate::ports::LedPort;
use crate::types::IndicatorState;

#[derive(Clone)]
pub struct StatusIndicator {
    inner: Arc<Mutex<IndicatorInner>>,
    pulse: Duration,
}

struct IndicatorInner {
    led: Box<dyn LedPort>,
    current: IndicatorState,
    // Last steady state; plain pulses settle back to it.
    base: IndicatorState,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl IndicatorInner {
    fn render(&mut self, state: IndicatorState) {
        let color = state.color();
        let result = if state.is_pulsing() {
            self.led.start_blink(color)
        } else {
            self.led.set_color(color)
        };
        if let Err(err) = result {
            debug!("status led render for {} failed: {err}", state.as_str());
        }
        self.current = state;
    }

    fn cancel_pending(&mut self) -> u64 {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }
}

impl StatusIndicator {
    /// Renders `initial` immediately.
    pub fn new(led: Box<dyn LedPort>, config: &IndicatorConfig, initial: IndicatorState) -> Self {
        let mut inner = IndicatorInner {
            led,
            current: initial,
            base: initial,
            generation: 0,
            pending: None,
        };
        inner.render(initial);
        Self {
            inner: Arc::new(Mutex::new(inner)),
            pulse: Duration::from_millis(config.pulse_ms),
        }
    }

    pub fn current(&self) -> IndicatorState {
        self.lock().current
    }

    /// Steady render; also cancels any pulse still waiting to settle.
    pub fn set_steady(&self, state: IndicatorState) {
        let mut inner = self.lock();
        inner.cancel_pending();
        inner.base = state;
        inner.render(state);
    }

    /// Pulses `transient` for the configured hold, then settles back to the
    /// last steady state.
    pub fn pulse(&self, transient: IndicatorState) {
        let inner = self.lock();
        let settle = inner.base;
        self.start_pulse(inner, transient, settle, self.pulse);
    }

    pub fn pulse_then_settle(
        &self,
        transient: IndicatorState,
        settle: IndicatorState,
        duration: Duration,
    ) {
        self.start_pulse(self.lock(), transient, settle, duration);
    }

    fn start_pulse(
        &self,
        mut inner: MutexGuard<'_, IndicatorInner>,
        transient: IndicatorState,
        settle: IndicatorState,
        duration: Duration,
    ) {
        let token = inner.cancel_pending();
        inner.render(transient);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime for status pulse, settling immediately");
            inner.render(settle);
            return;
        };

        let shared = Arc::clone(&self.inner);
        inner.pending = Some(runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            let mut inner = shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if inner.generation == token {
                inner.render(settle);
                inner.pending = None;
            }
        }));
    }

    fn lock(&self) -> MutexGuard<'_, IndicatorInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
