use std::sync::Arc;
use std::time::Duration;

use appliance_common::config::{IndicatorConfig, LifecycleConfig, NavigatorConfig};
use appliance_common::mocks::{
    LedCall, RecordingActuators, RecordingLed, ScreenCall, ScreenTrace, ScriptedSensor,
    SteppingClock,
};
use appliance_common::navigator::{CMD_RETURN_TO_INFO, ITEM_TEMPERATURE};
use appliance_common::{
    DeviceEvent, EventBus, EventRouter, IndicatorState, InputEvent, LifecycleController,
    LifecycleDispatcher, MenuValue, Navigator, NavigatorMode, PeriodicSampler, ProcessState,
    Rgb, SampleLog, StatusIndicator, TurnOnOutcome, SENTINEL_READING, SENTINEL_STATUS,
};
use chrono::{FixedOffset, TimeZone};
use pretty_assertions::assert_eq;
use tokio::sync::Barrier;

const HOUR: Duration = Duration::from_secs(3_600);

fn controller() -> Arc<LifecycleController> {
    Arc::new(LifecycleController::new(
        LifecycleConfig::default(),
        Box::new(RecordingActuators::default()),
    ))
}

#[tokio::test(start_paused = true)]
async fn three_firings_with_a_fault_keep_order_and_pulse_busy() {
    let led = RecordingLed::default();
    let indicator = StatusIndicator::new(
        Box::new(led.clone()),
        &IndicatorConfig::default(),
        IndicatorState::Idle,
    );
    let start = FixedOffset::east_opt(3_600)
        .unwrap()
        .with_ymd_and_hms(2026, 6, 1, 7, 0, 0)
        .unwrap();
    let sampler = Arc::new(PeriodicSampler::new(
        Arc::new(SteppingClock::new(start, chrono::Duration::seconds(60))),
        Box::new(ScriptedSensor::new([Some(40.0), Some(42.0), None])),
        SampleLog::with_capacity(1_440),
        indicator.clone(),
    ));

    let handle = Arc::clone(&sampler).spawn(Duration::from_secs(60));
    // First firing is immediate, then one per period; stop before a fourth.
    tokio::time::sleep(Duration::from_secs(150)).await;
    handle.abort();

    let records = sampler.log().snapshot();
    assert_eq!(records.len(), 3);
    assert_eq!(
        records.iter().map(|r| r.value).collect::<Vec<_>>(),
        vec![40, 42, SENTINEL_READING]
    );
    assert!(records.windows(2).all(|w| w[0].taken_at < w[1].taken_at));
    assert_eq!(indicator.current(), IndicatorState::Idle);

    let pulse = [LedCall::Blink(Rgb::BLUE), LedCall::Solid(Rgb::GREEN)];
    let mut expected = vec![LedCall::Solid(Rgb::GREEN)];
    for _ in 0..3 {
        expected.extend(pulse.iter().cloned());
    }
    assert_eq!(led.calls(), expected);
}

#[tokio::test(start_paused = true)]
async fn concurrent_double_start_always_coalesces() {
    for _ in 0..25 {
        let lifecycle = controller();

        let first = {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.turn_on(35.0, Some(2 * HOUR)).await })
        };
        let second = {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.turn_on_unlimited(50.0).await })
        };

        let mut outcomes = vec![first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];
        outcomes.sort_by_key(|outcome| *outcome == TurnOnOutcome::TargetUpdated);

        assert_eq!(
            outcomes,
            vec![TurnOnOutcome::Started, TurnOnOutcome::TargetUpdated]
        );
        assert_eq!(lifecycle.state().await, ProcessState::Running);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_double_start_has_one_winner() {
    for _ in 0..100 {
        let lifecycle = controller();
        let barrier = Arc::new(Barrier::new(2));

        let first = {
            let lifecycle = Arc::clone(&lifecycle);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                lifecycle.turn_on(35.0, Some(2 * HOUR)).await
            })
        };
        let second = {
            let lifecycle = Arc::clone(&lifecycle);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                lifecycle.turn_on_unlimited(50.0).await
            })
        };

        let mut outcomes = vec![first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];
        outcomes.sort_by_key(|outcome| *outcome == TurnOnOutcome::TargetUpdated);

        assert_eq!(
            outcomes,
            vec![TurnOnOutcome::Started, TurnOnOutcome::TargetUpdated]
        );
        assert_eq!(lifecycle.state().await, ProcessState::Running);
    }
}

#[tokio::test(start_paused = true)]
async fn sequential_double_start_updates_target_and_keeps_duration() {
    let lifecycle = controller();
    lifecycle.turn_on(35.0, Some(2 * HOUR)).await.unwrap();
    assert_eq!(
        lifecycle.turn_on_unlimited(50.0).await.unwrap(),
        TurnOnOutcome::TargetUpdated
    );

    let snapshot = lifecycle.snapshot().await;
    assert_eq!(snapshot.state, ProcessState::Running);
    assert_eq!(snapshot.target_temp_c, 50.0);
    assert_eq!(snapshot.run_duration_secs, Some(7_200));
}

#[tokio::test(start_paused = true)]
async fn turn_on_then_off_settles_idle_after_cooldown_despite_input() {
    let lifecycle = controller();
    let trace = ScreenTrace::default();
    let navigator = Arc::new(Navigator::new(
        Box::new(trace.display()),
        Box::new(trace.menu()),
        Arc::clone(&lifecycle),
        NavigatorConfig::default(),
    ));
    let indicator = StatusIndicator::new(
        Box::new(RecordingLed::default()),
        &IndicatorConfig::default(),
        IndicatorState::Idle,
    );
    let (bus, rx) = EventBus::channel(16);
    let router = EventRouter::new(indicator)
        .with_navigator(Arc::clone(&navigator), Arc::clone(&lifecycle));
    let router = tokio::spawn(router.run(rx));
    let control = Arc::clone(&lifecycle).spawn_control_loop(Duration::from_millis(250));

    lifecycle.turn_on(45.0, None).await.unwrap();
    bus.post(DeviceEvent::Input(InputEvent::Clicked)).await;
    lifecycle.turn_off(Duration::from_secs(10)).await;
    bus.post(DeviceEvent::TemperatureChanged(44.0)).await;
    bus.post(DeviceEvent::Input(InputEvent::Selected(CMD_RETURN_TO_INFO.to_string())))
        .await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(lifecycle.state().await, ProcessState::CoolingDown);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(lifecycle.state().await, ProcessState::Idle);
    assert_eq!(lifecycle.running_time_left().await, Some(Duration::ZERO));

    control.abort();
    drop(bus);
    router.await.unwrap();
    assert_eq!(navigator.mode().await, NavigatorMode::InfoScreen);
}

#[tokio::test(start_paused = true)]
async fn remaining_time_counts_down_while_running() {
    let lifecycle = controller();
    assert_eq!(lifecycle.running_time_left().await, Some(Duration::ZERO));

    lifecycle.turn_on(40.0, Some(HOUR)).await.unwrap();
    let first = lifecycle.running_time_left().await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;
    let second = lifecycle.running_time_left().await.unwrap();

    assert!(second < first);
    assert_eq!(first - second, Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn menu_round_trip_shows_updated_target() {
    let lifecycle = controller();
    let trace = ScreenTrace::default();
    let navigator = Navigator::new(
        Box::new(trace.display()),
        Box::new(trace.menu()),
        Arc::clone(&lifecycle),
        NavigatorConfig::default(),
    );
    navigator.show_info_screen().await;
    trace.clear_calls();

    navigator.handle(InputEvent::Clicked).await;
    assert_eq!(navigator.mode().await, NavigatorMode::Menu);
    assert_eq!(trace.calls(), vec![ScreenCall::MenuEnabled]);

    navigator
        .handle(InputEvent::ValueChanged {
            item_id: ITEM_TEMPERATURE.to_string(),
            value: MenuValue::Number(55.0),
        })
        .await;
    navigator
        .handle(InputEvent::Selected(CMD_RETURN_TO_INFO.to_string()))
        .await;

    assert_eq!(navigator.mode().await, NavigatorMode::InfoScreen);
    assert_eq!(trace.line(1).as_deref(), Some("Target:55C"));
    assert!(!trace.info_written_over_menu());
}

#[tokio::test(start_paused = true)]
async fn status_reports_sentinel_outside_running() {
    let lifecycle = controller();
    let dispatcher = LifecycleDispatcher::new(Arc::clone(&lifecycle));
    lifecycle.update_temperature(33.0).await;

    assert_eq!(dispatcher.get_status().await, SENTINEL_STATUS);
    dispatcher.turn_on(50).await.unwrap();
    assert_eq!(dispatcher.get_status().await, 33.0);
    dispatcher.turn_off(2).await;
    assert_eq!(dispatcher.get_status().await, SENTINEL_STATUS);
}
