use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::LifecycleConfig;
use crate::error::LifecycleError;
use crate::ports::ActuatorPort;
use crate::types::{LifecycleSnapshot, ProcessState};

/// Actuator writes produced by a transition. Nothing else writes actuators.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleAction {
    RegulateHeater(f32),
    HeaterOff,
    FanOn(f32),
    FanOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOnOutcome {
    Started,
    /// The process was already running; only the target (and duration, when
    /// given) changed. The run clock keeps going.
    TargetUpdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOffOutcome {
    CoolingDown,
    /// Zero cooldown delay: everything de-energized at once.
    Stopped,
    AlreadyIdle,
}

#[derive(Debug, Clone)]
pub struct LifecycleEngine {
    config: LifecycleConfig,

    state: ProcessState,
    target_c: f32,
    current_temp_c: Option<f32>,

    // Target the heater was last told to regulate toward.
    regulated_target_c: Option<f32>,

    run_started_ms: Option<u64>,
    run_duration_ms: Option<u64>,

    cooldown_started_ms: Option<u64>,
    cooldown_ms: u64,
}

impl LifecycleEngine {
    pub fn new(mut config: LifecycleConfig) -> Self {
        config.sanitize();
        Self {
            target_c: config.initial_target_c,
            config,
            state: ProcessState::Idle,
            current_temp_c: None,
            regulated_target_c: None,
            run_started_ms: None,
            run_duration_ms: None,
            cooldown_started_ms: None,
            cooldown_ms: 0,
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ProcessState::Running
    }

    pub fn target_temp_c(&self) -> f32 {
        self.target_c
    }

    pub fn current_temp_c(&self) -> Option<f32> {
        self.current_temp_c
    }

    pub fn update_temperature(&mut self, temp_c: f32) {
        if temp_c.is_finite() {
            self.current_temp_c = Some(temp_c);
        }
    }

    /// Returns whether the target changed. A running heater picks the new
    /// target up on the next [`tick`](Self::tick).
    pub fn set_target_temp(&mut self, temp_c: f32) -> Result<bool, LifecycleError> {
        let clamped = self.validate_target(temp_c)?;
        if (self.target_c - clamped).abs() > f32::EPSILON {
            self.target_c = clamped;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn turn_on(
        &mut self,
        target_c: f32,
        run_duration: Option<Duration>,
        now_ms: u64,
    ) -> Result<(TurnOnOutcome, Vec<LifecycleAction>), LifecycleError> {
        let target_c = self.validate_target(target_c)?;
        let mut actions = Vec::new();

        match self.state {
            ProcessState::Idle => {
                self.target_c = target_c;
                self.run_duration_ms = run_duration.map(duration_ms);
                self.run_started_ms = Some(now_ms);
                self.state = ProcessState::Running;

                actions.push(LifecycleAction::FanOn(self.config.fan_intensity));
                self.regulate(&mut actions);
                Ok((TurnOnOutcome::Started, actions))
            }
            ProcessState::Running => {
                self.target_c = target_c;
                if let Some(duration) = run_duration {
                    self.run_duration_ms = Some(duration_ms(duration));
                }
                if self.regulated_target_c != Some(self.target_c) {
                    self.regulate(&mut actions);
                }
                Ok((TurnOnOutcome::TargetUpdated, actions))
            }
            ProcessState::CoolingDown => Err(LifecycleError::CoolingDown),
        }
    }

    pub fn turn_off(
        &mut self,
        cooldown_delay: Duration,
        now_ms: u64,
    ) -> (TurnOffOutcome, Vec<LifecycleAction>) {
        let mut actions = Vec::new();

        let outcome = match self.state {
            ProcessState::Idle => TurnOffOutcome::AlreadyIdle,
            ProcessState::Running => {
                actions.push(LifecycleAction::HeaterOff);
                self.regulated_target_c = None;
                self.begin_cooldown(cooldown_delay, now_ms, &mut actions)
            }
            ProcessState::CoolingDown => {
                self.begin_cooldown(cooldown_delay, now_ms, &mut actions)
            }
        };

        (outcome, actions)
    }

    /// One control evaluation: completes an elapsed cooldown, ends a run whose
    /// duration has elapsed, and re-targets the heater after a target change.
    pub fn tick(&mut self, now_ms: u64) -> Vec<LifecycleAction> {
        let mut actions = Vec::new();

        match self.state {
            ProcessState::CoolingDown => {
                if self.cooldown_remaining_ms(now_ms) == 0 {
                    self.enter_idle(&mut actions);
                }
            }
            ProcessState::Running => {
                if self.run_elapsed(now_ms) {
                    actions.push(LifecycleAction::HeaterOff);
                    self.regulated_target_c = None;
                    let delay = Duration::from_secs(self.config.default_cooldown_secs);
                    self.begin_cooldown(delay, now_ms, &mut actions);
                } else if self.regulated_target_c != Some(self.target_c) {
                    self.regulate(&mut actions);
                }
            }
            ProcessState::Idle => {}
        }

        actions
    }

    /// De-energizes everything regardless of state.
    pub fn force_idle(&mut self) -> Vec<LifecycleAction> {
        let mut actions = vec![LifecycleAction::HeaterOff];
        self.regulated_target_c = None;
        self.enter_idle(&mut actions);
        actions
    }

    /// `None` while running without a duration limit; zero when not running.
    pub fn running_time_left(&self, now_ms: u64) -> Option<Duration> {
        if self.state != ProcessState::Running {
            return Some(Duration::ZERO);
        }
        let duration = self.run_duration_ms?;
        let elapsed = self
            .run_started_ms
            .map(|start| now_ms.saturating_sub(start))
            .unwrap_or(0);
        Some(Duration::from_millis(duration.saturating_sub(elapsed)))
    }

    pub fn cooldown_remaining_ms(&self, now_ms: u64) -> u64 {
        if self.state != ProcessState::CoolingDown {
            return 0;
        }
        let Some(start) = self.cooldown_started_ms else {
            return 0;
        };
        self.cooldown_ms
            .saturating_sub(now_ms.saturating_sub(start))
    }

    pub fn snapshot(&self, now_ms: u64) -> LifecycleSnapshot {
        LifecycleSnapshot {
            state: self.state,
            target_temp_c: self.target_c,
            current_temp_c: self.current_temp_c,
            run_duration_secs: self
                .run_duration_ms
                .filter(|_| self.state == ProcessState::Running)
                .map(|ms| ms / 1_000),
            remaining_secs: self.running_time_left(now_ms).map(|left| left.as_secs()),
            cooldown_remaining_secs: self.cooldown_remaining_ms(now_ms).div_ceil(1_000),
        }
    }

    fn validate_target(&self, temp_c: f32) -> Result<f32, LifecycleError> {
        if !temp_c.is_finite() {
            return Err(LifecycleError::InvalidTarget(temp_c));
        }
        Ok(temp_c.clamp(self.config.min_target_c, self.config.max_target_c))
    }

    fn regulate(&mut self, actions: &mut Vec<LifecycleAction>) {
        actions.push(LifecycleAction::RegulateHeater(self.target_c));
        self.regulated_target_c = Some(self.target_c);
    }

    fn run_elapsed(&self, now_ms: u64) -> bool {
        matches!(self.running_time_left(now_ms), Some(left) if left.is_zero())
    }

    fn begin_cooldown(
        &mut self,
        delay: Duration,
        now_ms: u64,
        actions: &mut Vec<LifecycleAction>,
    ) -> TurnOffOutcome {
        self.run_started_ms = None;
        self.run_duration_ms = None;

        if delay.is_zero() {
            self.enter_idle(actions);
            return TurnOffOutcome::Stopped;
        }

        self.state = ProcessState::CoolingDown;
        self.cooldown_started_ms = Some(now_ms);
        self.cooldown_ms = duration_ms(delay);
        TurnOffOutcome::CoolingDown
    }

    fn enter_idle(&mut self, actions: &mut Vec<LifecycleAction>) {
        actions.push(LifecycleAction::FanOff);
        self.state = ProcessState::Idle;
        self.run_started_ms = None;
        self.run_duration_ms = None;
        self.cooldown_started_ms = None;
        self.cooldown_ms = 0;
    }
}

fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis().try_into().unwrap_or(u64::MAX)
}

/// Serializes every transition of the process lifecycle.
///
/// The engine and the actuators sit behind one lock, so a transition and
/// the actuator writes it produces happen as a single step; concurrent
/// callers observe either the state before or the state after.
pub struct LifecycleController {
    inner: RwLock<ControllerInner>,
    epoch: Instant,
}

struct ControllerInner {
    engine: LifecycleEngine,
    actuators: Box<dyn ActuatorPort + Sync>,
}

impl ControllerInner {
    fn apply(&mut self, actions: Vec<LifecycleAction>) {
        for action in actions {
            debug!("lifecycle action: {action:?}");
            match action {
                LifecycleAction::RegulateHeater(target_c) => self.actuators.regulate_heater(target_c),
                LifecycleAction::HeaterOff => self.actuators.heater_off(),
                LifecycleAction::FanOn(intensity) => self.actuators.energize_fan(intensity),
                LifecycleAction::FanOff => self.actuators.fan_off(),
            }
        }
    }
}

impl LifecycleController {
    pub fn new(config: LifecycleConfig, mut actuators: Box<dyn ActuatorPort + Sync>) -> Self {
        // Bring outputs to the Idle mapping before anyone can observe the state.
        actuators.heater_off();
        actuators.fan_off();
        Self {
            inner: RwLock::new(ControllerInner {
                engine: LifecycleEngine::new(config),
                actuators,
            }),
            epoch: Instant::now(),
        }
    }

    pub async fn turn_on(
        &self,
        target_c: f32,
        run_duration: Option<Duration>,
    ) -> Result<TurnOnOutcome, LifecycleError> {
        let mut inner = self.inner.write().await;
        let now_ms = self.now_ms();
        let (outcome, actions) = inner.engine.turn_on(target_c, run_duration, now_ms)?;
        inner.apply(actions);
        info!(
            "turn on ({outcome:?}): target {:.1}C, duration {run_duration:?}",
            inner.engine.target_temp_c()
        );
        Ok(outcome)
    }

    /// Network-style start without a duration limit.
    pub async fn turn_on_unlimited(&self, target_c: f32) -> Result<TurnOnOutcome, LifecycleError> {
        self.turn_on(target_c, None).await
    }

    pub async fn turn_off(&self, cooldown_delay: Duration) -> TurnOffOutcome {
        let mut inner = self.inner.write().await;
        let now_ms = self.now_ms();
        let (outcome, actions) = inner.engine.turn_off(cooldown_delay, now_ms);
        inner.apply(actions);
        info!("turn off ({outcome:?}): cooldown {cooldown_delay:?}");
        outcome
    }

    /// Stops a running process with the default cooldown, otherwise starts it.
    /// Decided and applied under one lock.
    pub async fn toggle_power(
        &self,
        target_c: f32,
        run_duration: Option<Duration>,
    ) -> Result<ProcessState, LifecycleError> {
        let mut inner = self.inner.write().await;
        let now_ms = self.now_ms();
        if inner.engine.is_running() {
            let delay = Duration::from_secs(inner.engine.config().default_cooldown_secs);
            let (outcome, actions) = inner.engine.turn_off(delay, now_ms);
            inner.apply(actions);
            info!("power toggled off ({outcome:?})");
        } else {
            let (outcome, actions) = inner.engine.turn_on(target_c, run_duration, now_ms)?;
            inner.apply(actions);
            info!("power toggled on ({outcome:?}): target {target_c:.1}C");
        }
        Ok(inner.engine.state())
    }

    pub async fn set_target_temp(&self, temp_c: f32) -> Result<bool, LifecycleError> {
        self.inner.write().await.engine.set_target_temp(temp_c)
    }

    pub async fn update_temperature(&self, temp_c: f32) {
        self.inner.write().await.engine.update_temperature(temp_c);
    }

    pub async fn tick(&self) {
        let mut inner = self.inner.write().await;
        let now_ms = self.now_ms();
        let before = inner.engine.state();
        let actions = inner.engine.tick(now_ms);
        if !actions.is_empty() {
            inner.apply(actions);
        }
        let after = inner.engine.state();
        if before != after {
            info!("lifecycle {} -> {}", before.as_str(), after.as_str());
        }
    }

    pub async fn shutdown(&self) {
        let mut inner = self.inner.write().await;
        let actions = inner.engine.force_idle();
        inner.apply(actions);
        info!("lifecycle forced idle");
    }

    pub async fn state(&self) -> ProcessState {
        self.inner.read().await.engine.state()
    }

    pub async fn is_running(&self) -> bool {
        self.inner.read().await.engine.is_running()
    }

    pub async fn target_temp_c(&self) -> f32 {
        self.inner.read().await.engine.target_temp_c()
    }

    pub async fn running_time_left(&self) -> Option<Duration> {
        let inner = self.inner.read().await;
        let now_ms = self.now_ms();
        inner.engine.running_time_left(now_ms)
    }

    pub async fn snapshot(&self) -> LifecycleSnapshot {
        let inner = self.inner.read().await;
        let now_ms = self.now_ms();
        inner.engine.snapshot(now_ms)
    }

    pub fn spawn_control_loop(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                self.tick().await;
            }
        })
    }

    fn now_ms(&self) -> u64 {
        self.epoch
            .elapsed()
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::mocks::{ActuatorCall, RecordingActuators};

    const HOUR: Duration = Duration::from_secs(3_600);

    fn engine() -> LifecycleEngine {
        LifecycleEngine::new(LifecycleConfig::default())
    }

    #[test]
    fn turn_on_from_idle_energizes_fan_and_heater() {
        let mut engine = engine();
        let (outcome, actions) = engine.turn_on(35.0, Some(2 * HOUR), 0).unwrap();

        assert_eq!(outcome, TurnOnOutcome::Started);
        assert_eq!(
            actions,
            vec![
                LifecycleAction::FanOn(1.0),
                LifecycleAction::RegulateHeater(35.0)
            ]
        );
        assert_eq!(engine.state(), ProcessState::Running);
    }

    #[test]
    fn second_turn_on_coalesces_into_target_update() {
        let mut engine = engine();
        engine.turn_on(35.0, Some(2 * HOUR), 0).unwrap();

        let (outcome, actions) = engine.turn_on(50.0, None, 5_000).unwrap();

        assert_eq!(outcome, TurnOnOutcome::TargetUpdated);
        assert_eq!(actions, vec![LifecycleAction::RegulateHeater(50.0)]);
        assert_eq!(engine.state(), ProcessState::Running);
        // Run clock untouched, duration kept.
        assert_eq!(
            engine.running_time_left(5_000),
            Some(2 * HOUR - Duration::from_secs(5))
        );
    }

    #[test]
    fn turn_on_while_cooling_down_is_rejected() {
        let mut engine = engine();
        engine.turn_on(35.0, None, 0).unwrap();
        engine.turn_off(Duration::from_secs(10), 1_000);

        assert_eq!(
            engine.turn_on(40.0, None, 2_000),
            Err(LifecycleError::CoolingDown)
        );
        assert_eq!(engine.state(), ProcessState::CoolingDown);
    }

    #[test]
    fn non_finite_target_is_rejected_and_range_is_clamped() {
        let mut engine = engine();
        assert_eq!(
            engine.set_target_temp(f32::INFINITY),
            Err(LifecycleError::InvalidTarget(f32::INFINITY))
        );
        assert!(engine.turn_on(f32::NAN, None, 0).is_err());
        assert_eq!(engine.state(), ProcessState::Idle);

        engine.turn_on(120.0, None, 0).unwrap();
        assert_eq!(engine.target_temp_c(), 70.0);
    }

    #[test]
    fn turn_off_cools_down_then_idles() {
        let mut engine = engine();
        engine.turn_on(35.0, None, 0).unwrap();

        let (outcome, actions) = engine.turn_off(Duration::from_secs(10), 1_000);
        assert_eq!(outcome, TurnOffOutcome::CoolingDown);
        assert_eq!(actions, vec![LifecycleAction::HeaterOff]);
        assert_eq!(engine.cooldown_remaining_ms(6_000), 5_000);

        assert!(engine.tick(10_999).is_empty());
        assert_eq!(engine.state(), ProcessState::CoolingDown);

        assert_eq!(engine.tick(11_000), vec![LifecycleAction::FanOff]);
        assert_eq!(engine.state(), ProcessState::Idle);
    }

    #[test]
    fn turn_off_while_idle_is_noop() {
        let mut engine = engine();
        let (outcome, actions) = engine.turn_off(Duration::from_secs(10), 0);
        assert_eq!(outcome, TurnOffOutcome::AlreadyIdle);
        assert!(actions.is_empty());
    }

    #[test]
    fn zero_delay_stops_immediately() {
        let mut engine = engine();
        engine.turn_on(35.0, None, 0).unwrap();

        let (outcome, actions) = engine.turn_off(Duration::ZERO, 100);
        assert_eq!(outcome, TurnOffOutcome::Stopped);
        assert_eq!(
            actions,
            vec![LifecycleAction::HeaterOff, LifecycleAction::FanOff]
        );
        assert_eq!(engine.state(), ProcessState::Idle);
    }

    #[test]
    fn run_duration_expiry_starts_default_cooldown() {
        let mut engine = engine();
        engine.turn_on(35.0, Some(Duration::from_secs(60)), 0).unwrap();

        assert!(engine.tick(59_999).is_empty());
        assert_eq!(engine.tick(60_000), vec![LifecycleAction::HeaterOff]);
        assert_eq!(engine.state(), ProcessState::CoolingDown);

        assert_eq!(engine.tick(70_000), vec![LifecycleAction::FanOff]);
        assert_eq!(engine.state(), ProcessState::Idle);
    }

    #[test]
    fn running_time_left_decreases_and_is_zero_when_idle() {
        let mut engine = engine();
        assert_eq!(engine.running_time_left(0), Some(Duration::ZERO));

        engine.turn_on(35.0, Some(HOUR), 0).unwrap();
        let mut previous = engine.running_time_left(0).unwrap();
        for now_ms in (60_000..=3_600_000).step_by(60_000) {
            let left = engine.running_time_left(now_ms).unwrap();
            assert!(left < previous);
            previous = left;
        }
        assert_eq!(previous, Duration::ZERO);
    }

    #[test]
    fn unlimited_run_reports_no_remaining_time() {
        let mut engine = engine();
        engine.turn_on(35.0, None, 0).unwrap();
        assert_eq!(engine.running_time_left(10_000_000), None);
        assert!(engine.tick(10_000_000).is_empty());
    }

    #[test]
    fn target_change_is_applied_on_next_tick() {
        let mut engine = engine();
        engine.turn_on(35.0, None, 0).unwrap();

        assert_eq!(engine.set_target_temp(45.0), Ok(true));
        assert_eq!(
            engine.tick(1_000),
            vec![LifecycleAction::RegulateHeater(45.0)]
        );
        assert!(engine.tick(2_000).is_empty());
    }

    #[test]
    fn target_change_while_idle_issues_no_actuator_write() {
        let mut engine = engine();
        assert_eq!(engine.set_target_temp(45.0), Ok(true));
        assert!(engine.tick(1_000).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn controller_applies_actions_to_actuators() {
        let actuators = RecordingActuators::default();
        let controller =
            LifecycleController::new(LifecycleConfig::default(), Box::new(actuators.clone()));

        controller.turn_on(40.0, None).await.unwrap();
        assert_eq!(actuators.heater_target(), Some(40.0));
        assert!(actuators.fan_on());

        controller.turn_off(Duration::from_secs(5)).await;
        assert_eq!(actuators.heater_target(), None);
        assert!(actuators.fan_on());

        tokio::time::advance(Duration::from_secs(5)).await;
        controller.tick().await;
        assert!(!actuators.fan_on());
        assert_eq!(controller.state().await, ProcessState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_power_flips_between_running_and_cooldown() {
        let actuators = RecordingActuators::default();
        let controller =
            LifecycleController::new(LifecycleConfig::default(), Box::new(actuators.clone()));

        assert_eq!(
            controller.toggle_power(38.0, Some(HOUR)).await,
            Ok(ProcessState::Running)
        );
        assert_eq!(
            controller.toggle_power(38.0, Some(HOUR)).await,
            Ok(ProcessState::CoolingDown)
        );
        assert_eq!(
            controller.toggle_power(38.0, Some(HOUR)).await,
            Err(LifecycleError::CoolingDown)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_de_energizes_everything() {
        let actuators = RecordingActuators::default();
        let controller =
            LifecycleController::new(LifecycleConfig::default(), Box::new(actuators.clone()));
        controller.turn_on(40.0, None).await.unwrap();

        controller.shutdown().await;

        assert_eq!(controller.state().await, ProcessState::Idle);
        assert_eq!(
            actuators.calls().last(),
            Some(&ActuatorCall::FanOff)
        );
        assert_eq!(actuators.heater_target(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn control_loop_completes_cooldown() {
        let actuators = RecordingActuators::default();
        let controller = Arc::new(LifecycleController::new(
            LifecycleConfig::default(),
            Box::new(actuators.clone()),
        ));
        let handle = Arc::clone(&controller).spawn_control_loop(Duration::from_secs(1));

        controller.turn_on(40.0, None).await.unwrap();
        controller.turn_off(Duration::from_secs(3)).await;
        tokio::time::sleep(Duration::from_millis(4_500)).await;

        assert_eq!(controller.state().await, ProcessState::Idle);
        assert!(!actuators.fan_on());
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn run_clock_starts_when_the_lock_is_acquired() {
        let controller = Arc::new(LifecycleController::new(
            LifecycleConfig::default(),
            Box::new(RecordingActuators::default()),
        ));

        let held = controller.inner.write().await;
        let start = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.turn_on(40.0, Some(HOUR)).await })
        };
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(held);

        assert_eq!(start.await.unwrap().unwrap(), TurnOnOutcome::Started);
        assert_eq!(controller.running_time_left().await, Some(HOUR));
    }
}
