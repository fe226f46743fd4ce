//! Periodic sampling.
//!
//! One firing reads the clock and the sensor, appends a [`SampleRecord`] to
//! the shared [`SampleLog`] and pulses the status indicator busy. A read
//! fault is stored as [`SENTINEL_READING`] and never stops the timer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::indicator::StatusIndicator;
use crate::ports::{Clock, Sensor};
use crate::sample_log::SampleLog;
use crate::types::{IndicatorState, SampleRecord, SENTINEL_READING};

pub struct PeriodicSampler {
    clock: Arc<dyn Clock>,
    sensor: Mutex<Box<dyn Sensor>>,
    log: SampleLog,
    indicator: StatusIndicator,
    latest: watch::Sender<Option<SampleRecord>>,
}

impl PeriodicSampler {
    pub fn new(
        clock: Arc<dyn Clock>,
        sensor: Box<dyn Sensor>,
        log: SampleLog,
        indicator: StatusIndicator,
    ) -> Self {
        Self {
            clock,
            sensor: Mutex::new(sensor),
            log,
            indicator,
            latest: watch::Sender::new(None),
        }
    }

    pub fn log(&self) -> &SampleLog {
        &self.log
    }

    /// Notified with each record as it is appended.
    pub fn subscribe(&self) -> watch::Receiver<Option<SampleRecord>> {
        self.latest.subscribe()
    }

    /// Performs one sampler tick and returns the record it appended.
    pub fn fire(&self) -> SampleRecord {
        let taken_at = self.clock.now();
        let reading = {
            let mut sensor = self
                .sensor
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            sensor.read()
        };

        let value = match reading {
            Ok(value) if value.is_finite() => value as i32,
            Ok(value) => {
                warn!("sensor returned non-finite value {value}, storing sentinel");
                SENTINEL_READING
            }
            Err(err) => {
                warn!("sensor read failed, storing sentinel: {err}");
                SENTINEL_READING
            }
        };

        let record = SampleRecord::new(taken_at, value);
        self.log.append(record.clone());
        debug!("sampled {} at {}", record.value, record.timestamp);
        self.latest.send_replace(Some(record.clone()));

        self.indicator.pulse(IndicatorState::Busy);
        record
    }

    /// Fires immediately and then once per `period` from a single task, so
    /// firings never overlap.
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                self.fire();
            }
        })
    }
}
