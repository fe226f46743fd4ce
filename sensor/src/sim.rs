//! Host stand-ins for the plant host hardware.

use tracing::info;

use appliance_common::{LedPort, PortError, Rgb, Sensor};

/// Soil humidity probe that drifts slowly between waterings.
#[derive(Debug)]
pub struct DriftingHumidityProbe {
    reading: f32,
    step: f32,
}

impl DriftingHumidityProbe {
    const DRY: f32 = 28.0;
    const WET: f32 = 64.0;

    pub fn new(start: f32) -> Self {
        Self {
            reading: start.clamp(Self::DRY, Self::WET),
            step: -0.4,
        }
    }
}

impl Sensor for DriftingHumidityProbe {
    fn read(&mut self) -> Result<f32, PortError> {
        self.reading += self.step;
        if self.reading <= Self::DRY {
            // watered
            self.reading = Self::WET;
        }
        Ok(self.reading)
    }
}

/// RGB LED that logs each render.
#[derive(Debug, Default)]
pub struct TracingRgbLed;

fn color_name(color: Rgb) -> &'static str {
    match color {
        Rgb::GREEN => "green",
        Rgb::RED => "red",
        Rgb::BLUE => "blue",
        Rgb::ORANGE => "orange",
        _ => "custom",
    }
}

impl LedPort for TracingRgbLed {
    fn set_color(&mut self, color: Rgb) -> Result<(), PortError> {
        info!("led {}", color_name(color));
        Ok(())
    }

    fn start_blink(&mut self, color: Rgb) -> Result<(), PortError> {
        info!("led blinking {}", color_name(color));
        Ok(())
    }
}
