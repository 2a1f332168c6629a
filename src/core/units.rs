use crate::errors::PvSynthError;

pub const HOURS_PER_DAY: u32 = 24;
pub const MINUTES_PER_HOUR: u32 = 60;
pub const MONTHS_PER_YEAR: u32 = 12;
pub const DEGREES_PER_HOUR: f64 = 15.;
pub const WATTS_PER_KILOWATT: u32 = 1_000;

/// Solar constant, in W/m2
pub const SOLAR_CONSTANT: f64 = 1367.;

/// Above this mean value a temperature series is taken to be in Kelvin
pub const KELVIN_DETECTION_THRESHOLD: f64 = 200.;
const ZERO_CELSIUS_IN_KELVIN: f64 = 273.15;

/// Ambient temperature assumed when none is supplied, in deg C
pub const DEFAULT_AMBIENT_TEMPERATURE: f64 = 20.;

pub(crate) fn kelvin_to_celsius(temp_k: f64) -> Result<f64, PvSynthError> {
    if temp_k < 0.0 {
        Err(PvSynthError::BelowAbsoluteZero { kelvin: temp_k })
    } else {
        Ok(temp_k - ZERO_CELSIUS_IN_KELVIN)
    }
}

/// Daily irradiation (Wh/m2/day) from a mean irradiance over the day (W/m2)
pub fn mean_irradiance_to_daily_total(mean_irradiance: f64) -> f64 {
    mean_irradiance * HOURS_PER_DAY as f64
}
