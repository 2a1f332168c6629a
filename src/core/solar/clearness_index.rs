//! Extraterrestrial irradiance on a horizontal plane and the clearness index
//! derived from it.

use crate::compare_floats::clip;
use crate::core::solar::sun_geometry::{
    eccentricity_correction, hour_angle, solar_declination, sunlit_intervals, Location,
};
use crate::core::units::SOLAR_CONSTANT;
use crate::time_index::day_of_year;
use chrono::NaiveDateTime;
use std::f64::consts::PI;

/// Mean extraterrestrial irradiance on a horizontal plane, in W/m2, over the
/// solar-time interval from `start` to `end` hours, averaged per hour.
///
/// The interval must already lie within the day's sunlit period.
pub fn extraterrestrial_irradiance_between(
    latitude: f64,
    day_of_year: u32,
    start: f64,
    end: f64,
) -> f64 {
    let latitude = latitude.to_radians();
    let declination = solar_declination(day_of_year).to_radians();
    let start_angle = hour_angle(start).to_radians();
    let end_angle = hour_angle(end).to_radians();

    SOLAR_CONSTANT
        * eccentricity_correction(day_of_year)
        * (12. / PI)
        * (latitude.cos() * declination.cos() * (end_angle.sin() - start_angle.sin())
            + (end_angle - start_angle) * latitude.sin() * declination.sin())
}

/// Mean extraterrestrial horizontal irradiance over the hour starting at
/// `timestamp`. Zero when the sun is down for the whole hour.
pub fn hourly_extraterrestrial_irradiance(location: &Location, timestamp: &NaiveDateTime) -> f64 {
    let day_of_year = day_of_year(timestamp);
    sunlit_intervals(location, timestamp)
        .into_iter()
        .map(|(start, end)| {
            extraterrestrial_irradiance_between(location.latitude, day_of_year, start, end)
        })
        .sum()
}

/// Ratio of measured to extraterrestrial horizontal irradiance, bounded to
/// [0, 1]. None when either quantity is not positive.
pub fn clearness_index(global_horizontal: f64, extraterrestrial: f64) -> Option<f64> {
    if extraterrestrial <= 0. || global_horizontal.is_nan() || global_horizontal <= 0. {
        return None;
    }
    Some(clip(global_horizontal / extraterrestrial, 0., 1.))
}

#[derive(Clone, Copy, Debug)]
pub struct ClearnessIndexCalculator {
    location: Location,
}

impl ClearnessIndexCalculator {
    pub fn new(location: Location) -> Self {
        Self { location }
    }

    pub fn extraterrestrial(&self, timestamp: &NaiveDateTime) -> f64 {
        hourly_extraterrestrial_irradiance(&self.location, timestamp)
    }

    pub fn clearness_index(&self, timestamp: &NaiveDateTime, global_horizontal: f64) -> Option<f64> {
        clearness_index(global_horizontal, self.extraterrestrial(timestamp))
    }

    /// Clearness index for each (timestamp, irradiance) pair.
    pub fn clearness_indices(
        &self,
        timestamps: &[NaiveDateTime],
        global_horizontal: &[f64],
    ) -> Vec<Option<f64>> {
        timestamps
            .iter()
            .zip(global_horizontal)
            .map(|(timestamp, ghi)| self.clearness_index(timestamp, *ghi))
            .collect()
    }
}
