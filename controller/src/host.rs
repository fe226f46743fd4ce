use std::{
    collections::HashMap,
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveTime, Timelike};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use appliance_common::{
    config::load_json,
    navigator::{ITEM_TEMPERATURE, ITEM_TIMER},
    CommandResult, DehydratorConfig, DeviceEvent, DisplayPort, EventBus, EventRouter,
    IndicatorState, InputEvent, LifecycleController, LifecycleDispatcher, LifecycleError,
    MenuValue, Navigator, Sensor, StatusIndicator, TurnOffOutcome, TOPIC_CMD_POWER,
    TOPIC_DEHYDRATOR_STATE, TOPIC_DEHYDRATOR_STATUS,
};

use crate::sim::{OvenModel, TracingDisplay, TracingLed, TracingMenu};

const MAX_MQTT_PAYLOAD_BYTES: usize = 64;
const EVENT_QUEUE_DEPTH: usize = 64;

#[derive(Clone)]
struct AppState {
    dispatcher: LifecycleDispatcher,
    default_cooldown_secs: u64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Remote power command accepted on the MQTT command topic.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PowerCommand {
    On(Option<f32>),
    Off(Option<u64>),
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = data_dir().join("dehydrator.json");
    let mut config = load_json::<DehydratorConfig>(&config_path).unwrap_or_else(|err| {
        warn!("failed to load {}: {err:#}", config_path.display());
        DehydratorConfig::default()
    });
    config.sanitize();
    config.network.apply_env_overrides();

    // Peripheral bring-up; the display shows progress until the info screen takes over.
    let mut display = TracingDisplay;
    display.clear();
    display.write_line("Food Dehydrator", 0);
    display.write_line("Initializing...", 1);

    let indicator = StatusIndicator::new(
        Box::new(TracingLed),
        &config.indicator,
        IndicatorState::Alert,
    );

    let oven = OvenModel::new();
    let lifecycle = Arc::new(LifecycleController::new(
        config.lifecycle.clone(),
        Box::new(oven.heater()),
    ));
    let navigator = Arc::new(Navigator::new(
        Box::new(display),
        Box::new(TracingMenu),
        Arc::clone(&lifecycle),
        config.navigator.clone(),
    ));

    let (bus, rx) = EventBus::channel(EVENT_QUEUE_DEPTH);
    let router = EventRouter::new(indicator.clone())
        .with_navigator(Arc::clone(&navigator), Arc::clone(&lifecycle));
    tokio::spawn(router.run(rx));

    Arc::clone(&lifecycle)
        .spawn_control_loop(Duration::from_millis(config.lifecycle.control_interval_ms));
    spawn_sensor_poll_loop(
        bus.clone(),
        Box::new(oven.probe()),
        Duration::from_millis(config.navigator.sensor_poll_ms),
    );
    spawn_console_loop(bus.clone());

    let dispatcher = LifecycleDispatcher::new(Arc::clone(&lifecycle)).with_indicator(indicator);
    let app_state = AppState {
        dispatcher,
        default_cooldown_secs: config.lifecycle.default_cooldown_secs,
    };

    let mut mqtt_options = MqttOptions::new(
        "appliance-dehydrator",
        config.network.mqtt_host.clone(),
        config.network.mqtt_port,
    );
    if !config.network.mqtt_user.is_empty() {
        mqtt_options.set_credentials(
            config.network.mqtt_user.clone(),
            config.network.mqtt_pass.clone(),
        );
    }
    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 32);

    mqtt.subscribe(TOPIC_CMD_POWER, QoS::AtMostOnce)
        .await
        .context("failed to subscribe to power commands")?;
    mqtt.publish(TOPIC_DEHYDRATOR_STATUS, QoS::AtLeastOnce, true, "online")
        .await
        .context("failed to publish dehydrator online status")?;
    spawn_mqtt_loop(app_state.clone(), eventloop);
    spawn_state_publish_loop(
        Arc::clone(&lifecycle),
        mqtt,
        Duration::from_millis(config.network.state_publish_interval_ms.max(1_000)),
    );

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/turnon", post(handle_turn_on))
        .route("/api/turnoff", post(handle_turn_off))
        .route("/api/state", get(handle_get_state))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.network.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind dehydrator server at {addr}"))?;

    bus.post(DeviceEvent::NetworkConnected {
        address: addr.to_string(),
    })
    .await;
    navigator.show_info_screen().await;

    info!("dehydrator listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(lifecycle))
        .await?;
    Ok(())
}

fn data_dir() -> PathBuf {
    std::env::var("APPLIANCE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.appliance"))
}

async fn shutdown_signal(lifecycle: Arc<LifecycleController>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
        return;
    }
    info!("shutdown requested");
    lifecycle.shutdown().await;
}

fn spawn_sensor_poll_loop(bus: EventBus, mut probe: Box<dyn Sensor>, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match probe.read() {
                Ok(temp_c) => {
                    if !bus.post(DeviceEvent::TemperatureChanged(temp_c)).await {
                        break;
                    }
                }
                Err(err) => warn!("temperature probe read failed: {err}"),
            }
        }
    });
}

fn spawn_console_loop(bus: EventBus) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_console_command(&line) {
                    Some(event) => {
                        if !bus.post(DeviceEvent::Input(event)).await {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => warn!("unrecognized console input {line:?}"),
                },
                Ok(None) => {
                    debug!("console input closed");
                    break;
                }
                Err(err) => {
                    warn!("console read failed: {err}");
                    break;
                }
            }
        }
    });
}

/// Maps a console line onto an encoder event:
/// `click`, `long`, `select <cmd>`, `set temperature <n>`, `set timer <hh:mm>`.
fn parse_console_command(line: &str) -> Option<InputEvent> {
    let mut words = line.split_whitespace();
    match words.next()? {
        "click" => Some(InputEvent::Clicked),
        "long" => Some(InputEvent::LongPressClicked),
        "select" => words.next().map(|cmd| InputEvent::Selected(cmd.to_string())),
        "set" => {
            let item_id = words.next()?;
            let raw = words.next()?;
            let value = match item_id {
                ITEM_TEMPERATURE => MenuValue::Number(raw.parse::<f64>().ok()?),
                ITEM_TIMER => {
                    let time = NaiveTime::parse_from_str(raw, "%H:%M").ok()?;
                    MenuValue::Span(Duration::from_secs(u64::from(
                        time.num_seconds_from_midnight(),
                    )))
                }
                _ => return None,
            };
            Some(InputEvent::ValueChanged {
                item_id: item_id.to_string(),
                value,
            })
        }
        _ => None,
    }
}

fn parse_power_command(message: &str) -> Option<PowerCommand> {
    let lower = message.trim().to_ascii_lowercase();
    let (verb, arg) = match lower.split_once(':') {
        Some((verb, arg)) => (verb, Some(arg.trim())),
        None => (lower.as_str(), None),
    };
    match (verb, arg) {
        ("on", None) => Some(PowerCommand::On(None)),
        ("on", Some(target)) => target
            .parse::<f32>()
            .ok()
            .filter(|target| target.is_finite())
            .map(|target| PowerCommand::On(Some(target))),
        ("off", None) => Some(PowerCommand::Off(None)),
        ("off", Some(delay)) => delay
            .parse::<u64>()
            .ok()
            .map(|delay| PowerCommand::Off(Some(delay))),
        _ => None,
    }
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&app_state, &message.topic, &message.payload).await
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

async fn handle_mqtt_message(
    app_state: &AppState,
    topic: &str,
    payload: &[u8],
) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {topic} ({} bytes)",
            payload.len()
        );
        return Ok(());
    }
    if topic != TOPIC_CMD_POWER {
        return Ok(());
    }

    let message = std::str::from_utf8(payload).context("non utf8 mqtt payload")?;
    let Some(command) = parse_power_command(message) else {
        warn!("ignoring power command {message:?}");
        return Ok(());
    };

    let lifecycle = app_state.dispatcher.lifecycle();
    match command {
        PowerCommand::On(target) => {
            let target_c = match target {
                Some(target_c) => target_c,
                None => lifecycle.target_temp_c().await,
            };
            lifecycle
                .turn_on_unlimited(target_c)
                .await
                .context("power on command rejected")?;
        }
        PowerCommand::Off(delay) => {
            let delay = delay.unwrap_or(app_state.default_cooldown_secs);
            lifecycle.turn_off(Duration::from_secs(delay)).await;
        }
    }
    Ok(())
}

fn spawn_state_publish_loop(
    lifecycle: Arc<LifecycleController>,
    mqtt: AsyncClient,
    period: Duration,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;

            match serde_json::to_vec(&lifecycle.snapshot().await) {
                Ok(body) => {
                    if let Err(err) = mqtt
                        .publish(TOPIC_DEHYDRATOR_STATE, QoS::AtLeastOnce, true, body)
                        .await
                    {
                        warn!("dehydrator state publish failed: {err}");
                    }
                }
                Err(err) => warn!("dehydrator state serialization failed: {err}"),
            }
        }
    });
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.dispatcher.status_view().await)
}

async fn handle_get_state(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.dispatcher.lifecycle().snapshot().await)
}

async fn handle_turn_on(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("targetTemp") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'targetTemp' parameter");
    };
    let Ok(target_c) = value.parse::<i32>() else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid target temperature");
    };

    let result = state.dispatcher.turn_on(target_c).await;
    let current = state.dispatcher.lifecycle().state().await;
    match result {
        Ok(outcome) => Json(CommandResult {
            accepted: true,
            state: current,
            message: Some(format!("{outcome:?}")),
        })
        .into_response(),
        Err(err @ LifecycleError::CoolingDown) => (
            StatusCode::CONFLICT,
            Json(CommandResult {
                accepted: false,
                state: current,
                message: Some(err.to_string()),
            }),
        )
            .into_response(),
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

async fn handle_turn_off(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let cool_down_secs = match params.get("coolDownDelay") {
        Some(value) => match value.parse::<i32>() {
            Ok(secs) => secs,
            Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid cooldown delay"),
        },
        None => i32::try_from(state.default_cooldown_secs).unwrap_or(i32::MAX),
    };

    let outcome = state.dispatcher.turn_off(cool_down_secs).await;
    Json(CommandResult {
        accepted: outcome != TurnOffOutcome::AlreadyIdle,
        state: state.dispatcher.lifecycle().state().await,
        message: Some(format!("{outcome:?}")),
    })
    .into_response()
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
