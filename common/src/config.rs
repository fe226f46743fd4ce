use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub min_target_c: f32,
    pub max_target_c: f32,
    pub initial_target_c: f32,
    pub default_cooldown_secs: u64,
    pub control_interval_ms: u64,
    pub fan_intensity: f32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            min_target_c: 25.0,
            max_target_c: 70.0,
            initial_target_c: 35.0,
            default_cooldown_secs: 10,
            control_interval_ms: 1_000,
            fan_intensity: 1.0,
        }
    }
}

impl LifecycleConfig {
    pub fn sanitize(&mut self) {
        if !self.min_target_c.is_finite() || !self.max_target_c.is_finite() {
            let defaults = Self::default();
            self.min_target_c = defaults.min_target_c;
            self.max_target_c = defaults.max_target_c;
        }
        if self.min_target_c > self.max_target_c {
            std::mem::swap(&mut self.min_target_c, &mut self.max_target_c);
        }
        self.initial_target_c = if self.initial_target_c.is_finite() {
            self.initial_target_c
                .clamp(self.min_target_c, self.max_target_c)
        } else {
            self.min_target_c
        };
        self.control_interval_ms = self.control_interval_ms.clamp(100, 60_000);
        self.fan_intensity = if self.fan_intensity.is_finite() {
            self.fan_intensity.clamp(0.0, 1.0)
        } else {
            1.0
        };
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    pub long_press_target_c: f32,
    pub refresh_threshold_c: f32,
    pub sensor_poll_ms: u64,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            long_press_target_c: 40.0,
            refresh_threshold_c: 0.5,
            sensor_poll_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub period_ms: u64,
    pub log_capacity: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            period_ms: 60_000,
            log_capacity: 1_440,
        }
    }
}

impl SamplerConfig {
    pub fn sanitize(&mut self) {
        self.period_ms = self.period_ms.max(1_000);
        self.log_capacity = self.log_capacity.max(1);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub pulse_ms: u64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self { pulse_ms: 1_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub http_port: u16,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub state_publish_interval_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            state_publish_interval_ms: 10_000,
        }
    }
}

impl NetworkConfig {
    /// Environment variables win over the stored file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("MQTT_HOST") {
            self.mqtt_host = host;
        }
        if let Some(port) = std::env::var("MQTT_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
        {
            self.mqtt_port = port;
        }
        if let Ok(user) = std::env::var("MQTT_USER") {
            self.mqtt_user = user;
        }
        if let Ok(pass) = std::env::var("MQTT_PASS") {
            self.mqtt_pass = pass;
        }
        if let Some(port) = std::env::var("APPLIANCE_HTTP_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
        {
            self.http_port = port;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DehydratorConfig {
    pub lifecycle: LifecycleConfig,
    pub navigator: NavigatorConfig,
    pub indicator: IndicatorConfig,
    pub network: NetworkConfig,
}

impl DehydratorConfig {
    pub fn sanitize(&mut self) {
        self.lifecycle.sanitize();
        self.navigator.refresh_threshold_c = if self.navigator.refresh_threshold_c.is_finite() {
            self.navigator.refresh_threshold_c.max(0.0)
        } else {
            0.5
        };
        if !self.navigator.long_press_target_c.is_finite() {
            self.navigator.long_press_target_c = self.lifecycle.initial_target_c;
        }
        self.navigator.sensor_poll_ms = self.navigator.sensor_poll_ms.max(100);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantHostConfig {
    pub sampler: SamplerConfig,
    pub indicator: IndicatorConfig,
    pub network: NetworkConfig,
    pub timezone: String,
}

impl Default for PlantHostConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            indicator: IndicatorConfig::default(),
            network: NetworkConfig::default(),
            timezone: "UTC".to_string(),
        }
    }
}

impl PlantHostConfig {
    pub fn sanitize(&mut self) {
        self.sampler.sanitize();
        if self.timezone.parse::<chrono_tz::Tz>().is_err() {
            self.timezone = "UTC".to_string();
        }
    }
}

/// Reads a JSON config file, returning defaults when the file does not exist.
pub fn load_json<T>(path: &Path) -> Result<T, ConfigError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    match std::fs::read(path) {
        Ok(raw) => Ok(serde_json::from_slice(&raw)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(err) => Err(err.into()),
    }
}
