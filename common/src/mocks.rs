//! Recording and scripted port implementations for tests and dry runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, FixedOffset};

use crate::error::PortError;
use crate::ports::{ActuatorPort, Clock, DisplayPort, LedPort, MenuPort, MenuValue, Sensor};
use crate::types::Rgb;

fn locked<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, PartialEq)]
pub enum LedCall {
    Solid(Rgb),
    Blink(Rgb),
}

#[derive(Debug, Clone, Default)]
pub struct RecordingLed {
    calls: Arc<Mutex<Vec<LedCall>>>,
    failing: bool,
}

impl RecordingLed {
    /// Records calls but reports every render as failed.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<LedCall> {
        locked(&self.calls).clone()
    }

    pub fn last(&self) -> Option<LedCall> {
        locked(&self.calls).last().cloned()
    }

    fn record(&self, call: LedCall) -> Result<(), PortError> {
        locked(&self.calls).push(call);
        if self.failing {
            Err(PortError::Render("led offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl LedPort for RecordingLed {
    fn set_color(&mut self, color: Rgb) -> Result<(), PortError> {
        self.record(LedCall::Solid(color))
    }

    fn start_blink(&mut self, color: Rgb) -> Result<(), PortError> {
        self.record(LedCall::Blink(color))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCall {
    RegulateHeater(f32),
    HeaterOff,
    Fan(f32),
    FanOff,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingActuators {
    calls: Arc<Mutex<Vec<ActuatorCall>>>,
}

impl RecordingActuators {
    pub fn calls(&self) -> Vec<ActuatorCall> {
        locked(&self.calls).clone()
    }

    /// Target of the most recent heater write, `None` when the heater is off.
    pub fn heater_target(&self) -> Option<f32> {
        locked(&self.calls).iter().rev().find_map(|call| match call {
            ActuatorCall::RegulateHeater(target) => Some(Some(*target)),
            ActuatorCall::HeaterOff => Some(None),
            _ => None,
        })?
    }

    pub fn fan_on(&self) -> bool {
        locked(&self.calls)
            .iter()
            .rev()
            .find_map(|call| match call {
                ActuatorCall::Fan(intensity) => Some(*intensity > 0.0),
                ActuatorCall::FanOff => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }
}

impl ActuatorPort for RecordingActuators {
    fn regulate_heater(&mut self, target_c: f32) {
        locked(&self.calls).push(ActuatorCall::RegulateHeater(target_c));
    }

    fn heater_off(&mut self) {
        locked(&self.calls).push(ActuatorCall::HeaterOff);
    }

    fn energize_fan(&mut self, intensity: f32) {
        locked(&self.calls).push(ActuatorCall::Fan(intensity));
    }

    fn fan_off(&mut self) {
        locked(&self.calls).push(ActuatorCall::FanOff);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScreenCall {
    Clear,
    Line(u8, String),
    MenuEnabled,
    MenuDisabled,
    MenuItem(String, MenuValue),
}

/// Shared trace of everything written to the display and the menu, in order.
#[derive(Debug, Clone, Default)]
pub struct ScreenTrace {
    calls: Arc<Mutex<Vec<ScreenCall>>>,
}

impl ScreenTrace {
    pub fn display(&self) -> RecordingDisplay {
        RecordingDisplay {
            trace: self.clone(),
        }
    }

    pub fn menu(&self) -> RecordingMenu {
        RecordingMenu {
            trace: self.clone(),
        }
    }

    pub fn calls(&self) -> Vec<ScreenCall> {
        locked(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        locked(&self.calls).clear();
    }

    /// The last text written to `line`.
    pub fn line(&self, line: u8) -> Option<String> {
        locked(&self.calls).iter().rev().find_map(|call| match call {
            ScreenCall::Line(index, text) if *index == line => Some(text.clone()),
            _ => None,
        })
    }

    /// True when a display line was written while the menu owned the screen.
    pub fn info_written_over_menu(&self) -> bool {
        let mut menu_enabled = false;
        for call in locked(&self.calls).iter() {
            match call {
                ScreenCall::MenuEnabled => menu_enabled = true,
                ScreenCall::MenuDisabled => menu_enabled = false,
                ScreenCall::Line(..) | ScreenCall::Clear if menu_enabled => return true,
                _ => {}
            }
        }
        false
    }

    fn push(&self, call: ScreenCall) {
        locked(&self.calls).push(call);
    }
}

#[derive(Debug, Clone)]
pub struct RecordingDisplay {
    trace: ScreenTrace,
}

impl DisplayPort for RecordingDisplay {
    fn clear(&mut self) {
        self.trace.push(ScreenCall::Clear);
    }

    fn write_line(&mut self, text: &str, line: u8) {
        self.trace.push(ScreenCall::Line(line, text.to_string()));
    }
}

#[derive(Debug, Clone)]
pub struct RecordingMenu {
    trace: ScreenTrace,
}

impl MenuPort for RecordingMenu {
    fn enable(&mut self) {
        self.trace.push(ScreenCall::MenuEnabled);
    }

    fn disable(&mut self) {
        self.trace.push(ScreenCall::MenuDisabled);
    }

    fn update_item_value(&mut self, item_id: &str, value: &MenuValue) {
        self.trace
            .push(ScreenCall::MenuItem(item_id.to_string(), value.clone()));
    }
}

/// Returns scripted readings in order, then repeats the last one.
#[derive(Debug, Clone)]
pub struct ScriptedSensor {
    readings: Arc<Mutex<VecDeque<Option<f32>>>>,
    last: Option<f32>,
}

impl ScriptedSensor {
    /// `None` entries produce a read fault.
    pub fn new(readings: impl IntoIterator<Item = Option<f32>>) -> Self {
        Self {
            readings: Arc::new(Mutex::new(readings.into_iter().collect())),
            last: None,
        }
    }
}

impl Sensor for ScriptedSensor {
    fn read(&mut self) -> Result<f32, PortError> {
        let next = locked(&self.readings).pop_front();
        let reading = match next {
            Some(reading) => reading,
            None => self.last,
        };
        self.last = reading;
        reading.ok_or_else(|| PortError::Read("scripted fault".to_string()))
    }
}

/// Advances by a fixed step on every call to `now`.
#[derive(Debug)]
pub struct SteppingClock {
    next: Mutex<DateTime<FixedOffset>>,
    step: Duration,
}

impl SteppingClock {
    pub fn new(start: DateTime<FixedOffset>, step: Duration) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<FixedOffset> {
        let mut next = locked(&self.next);
        let now = *next;
        *next = now + self.step;
        now
    }
}
