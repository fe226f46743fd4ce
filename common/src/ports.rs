//! Capability interfaces the core consumes.
//!
//! Hardware adapters (or the host simulation) implement these; the core
//! never touches pins, buses or render buffers directly.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use chrono_tz::Tz;

use crate::error::{ConfigError, PortError};
use crate::types::Rgb;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock resolved in a configured IANA timezone.
#[derive(Debug, Clone)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(timezone: &str) -> Result<Self, ConfigError> {
        let tz = timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::Timezone(timezone.to_string()))?;
        Ok(Self { tz })
    }

    pub fn utc() -> Self {
        Self { tz: Tz::UTC }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        let local = Utc::now().with_timezone(&self.tz);
        local.with_timezone(&local.offset().fix())
    }
}

pub trait Sensor: Send {
    fn read(&mut self) -> Result<f32, PortError>;
}

/// Heater and fan outputs. Writes are fire-and-forget.
pub trait ActuatorPort: Send {
    /// Drive the heater toward `target_c`; the regulation algorithm is the adapter's.
    fn regulate_heater(&mut self, target_c: f32);

    fn heater_off(&mut self);

    /// `intensity` is in `0.0..=1.0`.
    fn energize_fan(&mut self, intensity: f32);

    fn fan_off(&mut self);
}

/// Line-addressed character display.
pub trait DisplayPort: Send {
    fn clear(&mut self);

    fn write_line(&mut self, text: &str, line: u8);
}

#[derive(Debug, Clone, PartialEq)]
pub enum MenuValue {
    Number(f64),
    Span(Duration),
}

/// The menu renderer that shares the display with the info screen.
pub trait MenuPort: Send {
    fn enable(&mut self);

    fn disable(&mut self);

    fn update_item_value(&mut self, item_id: &str, value: &MenuValue);
}

pub trait LedPort: Send {
    fn set_color(&mut self, color: Rgb) -> Result<(), PortError>;

    fn start_blink(&mut self, color: Rgb) -> Result<(), PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_rejects_unknown_zone() {
        assert!(SystemClock::new("Nowhere/Special").is_err());
    }

    #[test]
    fn system_clock_resolves_fixed_offset() {
        let clock = SystemClock::new("Asia/Kolkata").unwrap();
        assert_eq!(clock.now().offset().local_minus_utc(), 5 * 3600 + 1800);
    }
}
