//! BRL model of the diffuse fraction of global horizontal irradiance
//! (Ridley et al. 2010, parameters from Lauret et al. 2013).

use crate::compare_floats::clip;
use crate::core::solar::clearness_index::ClearnessIndexCalculator;
use crate::core::solar::sun_geometry::{sun_position_for_hour, sun_times, Location, SunTimes};
use crate::core::units::{DEGREES_PER_HOUR, HOURS_PER_DAY};
use crate::statistics::mean_of_defined;
use crate::time_index::day_of_year;
use chrono::{NaiveDateTime, Timelike};
use itertools::Itertools;

/// Logistic regression coefficients of the BRL model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrlCoefficients {
    pub intercept: f64,
    pub clearness_index: f64,
    pub apparent_solar_time: f64,
    pub solar_altitude: f64,
    pub daily_clearness_index: f64,
    pub persistence: f64,
}

/// Lauret et al. (2013)
pub const LAURET_2013: BrlCoefficients = BrlCoefficients {
    intercept: -5.32,
    clearness_index: 7.28,
    apparent_solar_time: -0.03,
    solar_altitude: -0.0047,
    daily_clearness_index: 1.72,
    persistence: 1.08,
};

/// Predictors of the BRL model for one hour.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrlPredictors {
    pub clearness_index: f64,
    /// Apparent solar time, in hours
    pub apparent_solar_time: f64,
    /// Solar altitude, in degrees
    pub solar_altitude: f64,
    /// Mean clearness index over the day
    pub daily_clearness_index: f64,
    /// Persistence: clearness index of the neighbouring hours
    pub persistence: f64,
}

impl BrlCoefficients {
    pub fn diffuse_fraction(&self, predictors: &BrlPredictors) -> f64 {
        let exponent = self.intercept
            + self.clearness_index * predictors.clearness_index
            + self.apparent_solar_time * predictors.apparent_solar_time
            + self.solar_altitude * predictors.solar_altitude
            + self.daily_clearness_index * predictors.daily_clearness_index
            + self.persistence * predictors.persistence;
        clip(1. / (1. + exponent.exp()), 0., 1.)
    }
}

/// Persistence of the clearness index for `hour` of a 24-hour day.
///
/// Between the sunrise and sunset hours this is the mean of the neighbouring
/// hours (or whichever of them is defined); in the sunrise hour it is the
/// following hour and in the sunset hour the preceding one. Night hours get 0.
fn persistence(hour: usize, clearness: &[Option<f64>], sun_times: &SunTimes) -> Option<f64> {
    let sunrise_hour = sun_times.sunrise_hour();
    let sunset_hour = sun_times.sunset_hour();
    let previous = hour.checked_sub(1).and_then(|h| clearness.get(h).copied().flatten());
    let next = clearness.get(hour + 1).copied().flatten();
    let this_hour = clearness.get(hour).copied().flatten();

    let is_daytime = if sun_times.wraps_midnight() {
        hour > sunrise_hour || hour < sunset_hour
    } else {
        hour > sunrise_hour && hour < sunset_hour
    };

    if is_daytime {
        match (previous, next) {
            (Some(previous), Some(next)) => Some((previous + next) / 2.),
            (Some(neighbour), None) | (None, Some(neighbour)) => Some(neighbour),
            (None, None) => this_hour,
        }
    } else if hour == sunrise_hour {
        next.or(this_hour)
    } else if hour == sunset_hour {
        previous.or(this_hour)
    } else {
        Some(0.)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DiffuseFractionEstimator {
    location: Location,
    coefficients: BrlCoefficients,
}

impl DiffuseFractionEstimator {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            coefficients: LAURET_2013,
        }
    }

    pub fn with_coefficients(location: Location, coefficients: BrlCoefficients) -> Self {
        Self {
            location,
            coefficients,
        }
    }

    /// Diffuse fractions for hourly data all falling on the same day.
    /// Hours with an undefined clearness index get an undefined fraction.
    pub fn daily_diffuse_fractions(
        &self,
        timestamps: &[NaiveDateTime],
        clearness: &[Option<f64>],
    ) -> Vec<Option<f64>> {
        let Some(first) = timestamps.first() else {
            return vec![];
        };
        let sun_times = sun_times(&self.location, day_of_year(first));
        let daily_clearness_index = mean_of_defined(clearness);

        let mut clearness_by_hour = [None; HOURS_PER_DAY as usize];
        for (timestamp, clearness_index) in timestamps.iter().zip(clearness) {
            clearness_by_hour[timestamp.hour() as usize] = *clearness_index;
        }

        timestamps
            .iter()
            .zip(clearness)
            .map(|(timestamp, clearness_index)| {
                let clearness_index = (*clearness_index)?;
                let sun = sun_position_for_hour(&self.location, timestamp);
                let hour = timestamp.hour() as usize;
                let predictors = BrlPredictors {
                    clearness_index,
                    apparent_solar_time: 12. + sun.hour_angle / DEGREES_PER_HOUR,
                    solar_altitude: sun.altitude,
                    daily_clearness_index: daily_clearness_index?,
                    persistence: persistence(hour, &clearness_by_hour, &sun_times)?,
                };
                Some(self.coefficients.diffuse_fraction(&predictors))
            })
            .collect()
    }

    /// Diffuse fractions for an hourly series, evaluated day by day.
    pub fn estimate(
        &self,
        timestamps: &[NaiveDateTime],
        global_horizontal: &[f64],
    ) -> Vec<Option<f64>> {
        let clearness = ClearnessIndexCalculator::new(self.location)
            .clearness_indices(timestamps, global_horizontal);

        let mut fractions = Vec::with_capacity(timestamps.len());
        let mut offset = 0;
        for (_, day) in &timestamps.iter().chunk_by(|timestamp| timestamp.date()) {
            let hours = day.count();
            fractions.extend(self.daily_diffuse_fractions(
                &timestamps[offset..offset + hours],
                &clearness[offset..offset + hours],
            ));
            offset += hours;
        }
        fractions
    }

    /// Split global horizontal irradiance into (direct, diffuse) horizontal
    /// components. Sunlit hours without an estimate are taken as all diffuse.
    pub fn split(
        &self,
        timestamps: &[NaiveDateTime],
        global_horizontal: &[f64],
    ) -> Vec<(f64, f64)> {
        self.estimate(timestamps, global_horizontal)
            .into_iter()
            .zip(global_horizontal)
            .map(|(fraction, ghi)| split_global(*ghi, fraction.unwrap_or(1.)))
            .collect()
    }
}

/// (direct, diffuse) horizontal irradiance for a given diffuse fraction.
pub fn split_global(global_horizontal: f64, diffuse_fraction: f64) -> (f64, f64) {
    if global_horizontal <= 0. || global_horizontal.is_nan() {
        return (0., 0.);
    }
    let diffuse = global_horizontal * clip(diffuse_fraction, 0., 1.);
    (global_horizontal - diffuse, diffuse)
}
