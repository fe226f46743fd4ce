use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use rumqttc::{AsyncClient, MqttOptions, QoS};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use appliance_common::{
    config::load_json, Clock, DeviceEvent, EventBus, EventRouter, IndicatorState,
    PeriodicSampler, PlantHostConfig, SampleLog, SampleQueryDispatcher, SampleRecord,
    StatusIndicator, SystemClock, TOPIC_PLANTHOST_HUMIDITY, TOPIC_PLANTHOST_STATUS,
};

use crate::sim::{DriftingHumidityProbe, TracingRgbLed};

#[derive(Clone)]
struct AppState {
    dispatcher: SampleQueryDispatcher,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let data_dir = std::env::var("APPLIANCE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.appliance"));
    let config_path = data_dir.join("planthost.json");
    let mut config = load_json::<PlantHostConfig>(&config_path).unwrap_or_else(|err| {
        warn!("failed to load {}: {err:#}", config_path.display());
        PlantHostConfig::default()
    });
    config.sanitize();
    config.network.apply_env_overrides();

    let indicator = StatusIndicator::new(
        Box::new(TracingRgbLed),
        &config.indicator,
        IndicatorState::Alert,
    );

    let clock: Arc<dyn Clock> = match SystemClock::new(&config.timezone) {
        Ok(clock) => Arc::new(clock),
        Err(err) => {
            warn!("{err}, using UTC");
            Arc::new(SystemClock::utc())
        }
    };
    info!(
        "clock set to {}",
        clock.now().format(SampleRecord::TIMESTAMP_FORMAT)
    );

    let log = SampleLog::with_capacity(config.sampler.log_capacity);
    let sampler = Arc::new(PeriodicSampler::new(
        clock,
        Box::new(DriftingHumidityProbe::new(55.0)),
        log.clone(),
        indicator.clone(),
    ));

    let (bus, rx) = EventBus::channel(8);
    tokio::spawn(EventRouter::new(indicator.clone()).run(rx));

    let mut mqtt_options = MqttOptions::new(
        "appliance-planthost",
        config.network.mqtt_host.clone(),
        config.network.mqtt_port,
    );
    if !config.network.mqtt_user.is_empty() {
        mqtt_options.set_credentials(
            config.network.mqtt_user.clone(),
            config.network.mqtt_pass.clone(),
        );
    }
    let (mqtt, mut eventloop) = AsyncClient::new(mqtt_options, 32);

    mqtt.publish(TOPIC_PLANTHOST_STATUS, QoS::AtLeastOnce, true, "online")
        .await
        .context("failed to publish plant host online status")?;

    tokio::spawn(async move {
        loop {
            if let Err(err) = eventloop.poll().await {
                warn!("plant host mqtt poll error: {err}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    });

    spawn_sample_publish_loop(&sampler, mqtt);
    Arc::clone(&sampler).spawn(Duration::from_millis(config.sampler.period_ms));
    info!(
        "sampling every {}ms, keeping {} records",
        config.sampler.period_ms,
        log.capacity()
    );

    let app = Router::new()
        .route("/api/planthumidity", get(handle_get_plant_humidity))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState {
            dispatcher: SampleQueryDispatcher::new(log, indicator),
        });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.network.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind plant host server at {addr}"))?;

    bus.post(DeviceEvent::NetworkConnected {
        address: addr.to_string(),
    })
    .await;

    info!("plant host listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for ctrl-c: {err}");
            }
        })
        .await?;
    Ok(())
}

fn spawn_sample_publish_loop(sampler: &PeriodicSampler, mqtt: AsyncClient) {
    let mut latest = sampler.subscribe();
    tokio::spawn(async move {
        while latest.changed().await.is_ok() {
            let record = latest.borrow_and_update().clone();
            let Some(record) = record else {
                continue;
            };
            match serde_json::to_vec(&record) {
                Ok(body) => {
                    if let Err(err) = mqtt
                        .publish(TOPIC_PLANTHOST_HUMIDITY, QoS::AtLeastOnce, true, body)
                        .await
                    {
                        warn!("humidity publish failed: {err}");
                    }
                }
                Err(err) => warn!("humidity serialization failed: {err}"),
            }
        }
    });
}

async fn handle_get_plant_humidity(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.dispatcher.get_plant_humidity())
}
