//! Host stand-ins for the dehydrator hardware.
//!
//! The oven is a first-order thermal model: the chamber relaxes toward
//! the heater target while the heater is regulating and toward ambient
//! otherwise, faster with the fan running.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use appliance_common::{
    ActuatorPort, DisplayPort, LedPort, MenuPort, MenuValue, PortError, Rgb, Sensor,
};

const AMBIENT_C: f32 = 21.0;
const HEAT_RATE_PER_SEC: f32 = 0.02;
const COOL_RATE_PER_SEC: f32 = 0.005;
const FAN_COOL_BOOST: f32 = 3.0;

#[derive(Debug)]
struct OvenState {
    chamber_c: f32,
    heater_target_c: Option<f32>,
    fan_intensity: f32,
    last_step: Instant,
}

impl OvenState {
    fn advance(&mut self, dt: Duration) {
        let secs = dt.as_secs_f32();
        let (goal, rate) = match self.heater_target_c {
            Some(target) => (target, HEAT_RATE_PER_SEC),
            None => (
                AMBIENT_C,
                COOL_RATE_PER_SEC * (1.0 + FAN_COOL_BOOST * self.fan_intensity),
            ),
        };
        let blend = (rate * secs).min(1.0);
        self.chamber_c += (goal - self.chamber_c) * blend;
    }
}

/// Shared oven state; hand out [`OvenModel::heater`] to the lifecycle
/// controller and [`OvenModel::probe`] to the sensor poll loop.
#[derive(Debug, Clone)]
pub struct OvenModel {
    state: Arc<Mutex<OvenState>>,
}

impl OvenModel {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(OvenState {
                chamber_c: AMBIENT_C,
                heater_target_c: None,
                fan_intensity: 0.0,
                last_step: Instant::now(),
            })),
        }
    }

    pub fn heater(&self) -> OvenActuators {
        OvenActuators { model: self.clone() }
    }

    pub fn probe(&self) -> OvenProbe {
        OvenProbe { model: self.clone() }
    }

    fn lock(&self) -> MutexGuard<'_, OvenState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn step_to_now(&self) -> f32 {
        let mut state = self.lock();
        let now = Instant::now();
        let dt = now.duration_since(state.last_step);
        state.last_step = now;
        state.advance(dt);
        state.chamber_c
    }
}

impl Default for OvenModel {
    fn default() -> Self {
        Self::new()
    }
}

pub struct OvenActuators {
    model: OvenModel,
}

impl ActuatorPort for OvenActuators {
    fn regulate_heater(&mut self, target_c: f32) {
        self.model.step_to_now();
        self.model.lock().heater_target_c = Some(target_c);
        info!("heater regulating toward {target_c:.1}C");
    }

    fn heater_off(&mut self) {
        self.model.step_to_now();
        self.model.lock().heater_target_c = None;
        info!("heater off");
    }

    fn energize_fan(&mut self, intensity: f32) {
        self.model.step_to_now();
        self.model.lock().fan_intensity = intensity;
        info!("fan on at {:.0}%", intensity * 100.0);
    }

    fn fan_off(&mut self) {
        self.model.step_to_now();
        self.model.lock().fan_intensity = 0.0;
        info!("fan off");
    }
}

pub struct OvenProbe {
    model: OvenModel,
}

impl Sensor for OvenProbe {
    fn read(&mut self) -> Result<f32, PortError> {
        Ok(self.model.step_to_now())
    }
}

/// Character display that writes each line to the log.
#[derive(Debug, Default)]
pub struct TracingDisplay;

impl DisplayPort for TracingDisplay {
    fn clear(&mut self) {
        debug!("display cleared");
    }

    fn write_line(&mut self, text: &str, line: u8) {
        info!("display[{line}] {text}");
    }
}

#[derive(Debug, Default)]
pub struct TracingMenu;

impl MenuPort for TracingMenu {
    fn enable(&mut self) {
        info!("menu shown: temperature, timer, power, returnToInfo");
    }

    fn disable(&mut self) {
        debug!("menu hidden");
    }

    fn update_item_value(&mut self, item_id: &str, value: &MenuValue) {
        info!("menu item {item_id} = {value:?}");
    }
}

#[derive(Debug, Default)]
pub struct TracingLed;

impl LedPort for TracingLed {
    fn set_color(&mut self, color: Rgb) -> Result<(), PortError> {
        debug!("status led solid ({}, {}, {})", color.r, color.g, color.b);
        Ok(())
    }

    fn start_blink(&mut self, color: Rgb) -> Result<(), PortError> {
        debug!("status led blink ({}, {}, {})", color.r, color.g, color.b);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(heater_target_c: Option<f32>, fan_intensity: f32) -> OvenState {
        OvenState {
            chamber_c: 30.0,
            heater_target_c,
            fan_intensity,
            last_step: Instant::now(),
        }
    }

    #[test]
    fn chamber_heats_toward_target() {
        let mut oven = state(Some(60.0), 1.0);
        oven.advance(Duration::from_secs(10));
        assert!(oven.chamber_c > 30.0 && oven.chamber_c < 60.0);
    }

    #[test]
    fn fan_speeds_up_cooling() {
        let mut still = state(None, 0.0);
        let mut fanned = state(None, 1.0);
        still.advance(Duration::from_secs(10));
        fanned.advance(Duration::from_secs(10));
        assert!(fanned.chamber_c < still.chamber_c);
        assert!(still.chamber_c < 30.0);
    }

    #[test]
    fn long_step_does_not_overshoot() {
        let mut oven = state(Some(45.0), 1.0);
        oven.advance(Duration::from_secs(3_600));
        assert_eq!(oven.chamber_c, 45.0);
    }
}
