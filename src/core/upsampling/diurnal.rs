//! Half-sine diurnal profile: spreads a daily irradiation total over the
//! hours between sunrise and sunset.

use crate::core::solar::sun_geometry::{sun_times, Location, SunTimes};
use crate::core::units::HOURS_PER_DAY;
use crate::time_index::{day_of_year, start_of_day};
use chrono::NaiveDate;
use std::f64::consts::PI;

const HOURS: usize = HOURS_PER_DAY as usize;

/// One representative day of a coarser period, awaiting expansion to hours.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyntheticDay {
    pub date: NaiveDate,
    /// Irradiation over the day, in Wh/m2
    pub daily_total: f64,
    pub sun_times: SunTimes,
}

impl SyntheticDay {
    pub fn new(location: &Location, date: NaiveDate, daily_total: f64) -> Self {
        Self {
            date,
            daily_total,
            sun_times: sun_times(location, day_of_year(&start_of_day(date))),
        }
    }

    pub fn hourly(&self) -> [f64; HOURS] {
        expand_day(self.daily_total, &self.sun_times)
    }
}

/// Spread `daily_total` (Wh/m2) over 24 hourly mean irradiances (W/m2).
///
/// Each hour takes the half-sine `sin(pi·t/day_length)·daily_total·pi/(2·day_length)`
/// at its midpoint `t` hours after sunrise; hours whose midpoint is outside
/// daylight get 0. The values are then rescaled so they sum to the daily
/// total exactly. A day too short for any hour midpoint to be sunlit puts the
/// whole total in the hour of solar noon.
pub fn expand_day(daily_total: f64, sun_times: &SunTimes) -> [f64; HOURS] {
    let mut hourly = [0.; HOURS];
    if daily_total.is_nan() || daily_total <= 0. || sun_times.is_polar_night() {
        return hourly;
    }

    let (sunrise, day_length) = if sun_times.is_polar_day() {
        (0., HOURS_PER_DAY as f64)
    } else {
        (sun_times.sunrise, sun_times.day_length)
    };

    let peak = daily_total * PI / (2. * day_length);
    for (hour, value) in hourly.iter_mut().enumerate() {
        // elapsed time since sunrise wraps through midnight
        let elapsed = (hour as f64 + 0.5 - sunrise).rem_euclid(HOURS_PER_DAY as f64);
        if elapsed < day_length {
            *value = (PI * elapsed / day_length).sin().max(0.) * peak;
        }
    }

    let raw_total: f64 = hourly.iter().sum();
    if raw_total > 0. {
        let scale = daily_total / raw_total;
        hourly.iter_mut().for_each(|value| *value *= scale);
    } else {
        let noon = (sunrise + day_length / 2.).rem_euclid(HOURS_PER_DAY as f64);
        hourly[(noon.floor() as usize).min(HOURS - 1)] = daily_total;
    }

    hourly
}
