//! Sensor readouts derived from the folded phase difference.
//!
//! Each profile maps a calibrated degree range to a reading. Values at or
//! below zero mean no usable difference and read as [`Readout::Invalid`].

use std::fmt;

use contracts::SensorProfile;
use serde::Serialize;

/// Soil: fully saturated at or below 15°, dry at or above 70°
const SOIL_SATURATED_DEG: f64 = 15.0;
const SOIL_DRY_DEG: f64 = 70.0;
/// Force: no load at or above 30°, full load at or below 5°
const FORCE_NONE_DEG: f64 = 30.0;
const FORCE_FULL_DEG: f64 = 5.0;
/// Force sticker hysteresis band
const STICKER_OFF_ABOVE_DEG: f64 = 40.0;
const STICKER_ON_BELOW_DEG: f64 = 10.0;
/// Photo: dark at or below 25°, saturated at or above 35°
const PHOTO_DARK_DEG: f64 = 25.0;
const PHOTO_BRIGHT_DEG: f64 = 35.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Readout {
    Degrees(f64),
    Percent(f64),
    Switch(bool),
    Invalid,
}

impl fmt::Display for Readout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Readout::Degrees(v) => write!(f, "{v:.0}°"),
            Readout::Percent(v) => write!(f, "{v:.0}%"),
            Readout::Switch(true) => f.write_str("On"),
            Readout::Switch(false) => f.write_str("Off"),
            Readout::Invalid => f.write_str("Error"),
        }
    }
}

/// Stateful readout; the force sticker keeps its last state inside the
/// hysteresis band.
#[derive(Debug, Clone, Copy)]
pub struct SensorReadout {
    profile: SensorProfile,
    switch_state: bool,
}

impl SensorReadout {
    pub fn new(profile: SensorProfile) -> Self {
        Self {
            profile,
            switch_state: false,
        }
    }

    pub fn profile(&self) -> SensorProfile {
        self.profile
    }

    pub fn apply(&mut self, degrees: f64) -> Readout {
        if !degrees.is_finite() || degrees <= 0.0 {
            return Readout::Invalid;
        }
        match self.profile {
            SensorProfile::Degrees => Readout::Degrees(degrees),
            SensorProfile::Soil => Readout::Percent(ramp(degrees, SOIL_DRY_DEG, SOIL_SATURATED_DEG)),
            SensorProfile::Force => Readout::Percent(ramp(degrees, FORCE_NONE_DEG, FORCE_FULL_DEG)),
            SensorProfile::Photo => Readout::Percent(ramp(degrees, PHOTO_DARK_DEG, PHOTO_BRIGHT_DEG)),
            SensorProfile::ForceSticker => {
                if degrees > STICKER_OFF_ABOVE_DEG {
                    self.switch_state = false;
                } else if degrees < STICKER_ON_BELOW_DEG {
                    self.switch_state = true;
                }
                Readout::Switch(self.switch_state)
            }
        }
    }
}

/// Linear 0..100 between `zero_at` and `full_at`, clamped; works for either
/// direction.
fn ramp(value: f64, zero_at: f64, full_at: f64) -> f64 {
    (100.0 * (value - zero_at) / (full_at - zero_at)).clamp(0.0, 100.0)
}
