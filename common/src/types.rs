use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Value stored in a [`SampleRecord`] when the sensor could not be read.
pub const SENTINEL_READING: i32 = -1;

/// Value reported by the status query while no run is active.
pub const SENTINEL_STATUS: f32 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    Idle,
    Running,
    CoolingDown,
}

impl ProcessState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::CoolingDown => "COOLING_DOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NavigatorMode {
    InfoScreen,
    Menu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndicatorState {
    Idle,
    Alert,
    Busy,
    Query,
}

impl IndicatorState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Alert => "ALERT",
            Self::Busy => "BUSY",
            Self::Query => "QUERY",
        }
    }

    pub fn color(self) -> Rgb {
        match self {
            Self::Idle => Rgb::GREEN,
            Self::Alert => Rgb::RED,
            Self::Busy => Rgb::BLUE,
            Self::Query => Rgb::ORANGE,
        }
    }

    pub fn is_pulsing(self) -> bool {
        matches!(self, Self::Busy | Self::Query)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    pub const ORANGE: Rgb = Rgb::new(255, 165, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// One sampler tick. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRecord {
    #[serde(rename = "date")]
    pub timestamp: String,
    pub value: i32,
    #[serde(rename = "takenAt")]
    pub taken_at: DateTime<FixedOffset>,
}

impl SampleRecord {
    pub const TIMESTAMP_FORMAT: &'static str = "%I:%M %p %d/%b/%Y";

    pub fn new(taken_at: DateTime<FixedOffset>, value: i32) -> Self {
        Self {
            timestamp: taken_at.format(Self::TIMESTAMP_FORMAT).to_string(),
            value,
            taken_at,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.value == SENTINEL_READING
    }
}

/// Consistent point-in-time view of the lifecycle controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifecycleSnapshot {
    pub state: ProcessState,
    #[serde(rename = "targetTemp")]
    pub target_temp_c: f32,
    #[serde(rename = "currentTemp")]
    pub current_temp_c: Option<f32>,
    #[serde(rename = "runDurationSecs")]
    pub run_duration_secs: Option<u64>,
    /// `None` while running without a duration limit.
    #[serde(rename = "remainingSecs")]
    pub remaining_secs: Option<u64>,
    #[serde(rename = "cooldownRemainingSecs")]
    pub cooldown_remaining_secs: u64,
}

impl LifecycleSnapshot {
    pub fn is_running(&self) -> bool {
        self.state == ProcessState::Running
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub temperature: f32,
    pub running: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    pub accepted: bool,
    pub state: ProcessState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
