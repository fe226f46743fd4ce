//! Network-facing request handlers.
//!
//! Each operation forwards synchronously to the core and returns its
//! result; the dispatchers keep no state of their own.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::LifecycleError;
use crate::indicator::StatusIndicator;
use crate::lifecycle::{LifecycleController, TurnOffOutcome, TurnOnOutcome};
use crate::sample_log::SampleLog;
use crate::types::{
    IndicatorState, LifecycleSnapshot, SampleRecord, StatusView, SENTINEL_STATUS,
};

#[derive(Clone)]
pub struct LifecycleDispatcher {
    lifecycle: Arc<LifecycleController>,
    indicator: Option<StatusIndicator>,
}

impl LifecycleDispatcher {
    pub fn new(lifecycle: Arc<LifecycleController>) -> Self {
        Self {
            lifecycle,
            indicator: None,
        }
    }

    /// Pulse `Query` on the indicator for every handled request.
    pub fn with_indicator(mut self, indicator: StatusIndicator) -> Self {
        self.indicator = Some(indicator);
        self
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleController> {
        &self.lifecycle
    }

    /// Current temperature while running, otherwise [`SENTINEL_STATUS`].
    pub async fn get_status(&self) -> f32 {
        self.signal_query();
        status_temperature(&self.lifecycle.snapshot().await)
    }

    /// Temperature and running flag taken from one snapshot.
    pub async fn status_view(&self) -> StatusView {
        self.signal_query();
        let snapshot = self.lifecycle.snapshot().await;
        StatusView {
            temperature: status_temperature(&snapshot),
            running: snapshot.is_running(),
        }
    }

    pub async fn turn_on(&self, target_c: i32) -> Result<TurnOnOutcome, LifecycleError> {
        self.signal_query();
        info!("network turn on: target {target_c}C");
        self.lifecycle.turn_on_unlimited(target_c as f32).await
    }

    /// Negative delays are treated as zero.
    pub async fn turn_off(&self, cool_down_secs: i32) -> TurnOffOutcome {
        self.signal_query();
        info!("network turn off: cooldown {cool_down_secs}s");
        let delay = Duration::from_secs(u64::try_from(cool_down_secs).unwrap_or(0));
        self.lifecycle.turn_off(delay).await
    }

    fn signal_query(&self) {
        if let Some(indicator) = &self.indicator {
            indicator.pulse(IndicatorState::Query);
        }
    }
}

fn status_temperature(snapshot: &LifecycleSnapshot) -> f32 {
    if snapshot.is_running() {
        snapshot.current_temp_c.unwrap_or(SENTINEL_STATUS)
    } else {
        SENTINEL_STATUS
    }
}

#[derive(Clone)]
pub struct SampleQueryDispatcher {
    log: SampleLog,
    indicator: StatusIndicator,
}

impl SampleQueryDispatcher {
    pub fn new(log: SampleLog, indicator: StatusIndicator) -> Self {
        Self { log, indicator }
    }

    /// All retained records, oldest first. Pulses the indicator orange.
    pub fn get_plant_humidity(&self) -> Vec<SampleRecord> {
        self.indicator.pulse(IndicatorState::Query);
        let records = self.log.snapshot();
        debug!("humidity query returned {} records", records.len());
        records
    }
}
