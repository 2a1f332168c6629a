//! Solar position for a location and time: declination, eccentricity, hour
//! angles, sunrise/sunset and the angle of incidence on fixed or tracking planes.
//!
//! Angles are passed in and returned as degrees and shadowed as radians
//! internally for the trigonometry.

use crate::compare_floats::{clip, max_of_2, min_of_2};
use crate::core::units::{DEGREES_PER_HOUR, HOURS_PER_DAY};
use crate::errors::{PvSynthError, Result};
use crate::time_index::{day_of_year, decimal_hour};
use chrono::NaiveDateTime;
use serde::Deserialize;

/// Apparent angular radius of the solar disc, in degrees
const SOLAR_DISC_RADIUS: f64 = 0.2667;

/// Sunset hour reported when the sun does not set
pub const LAST_SUNSET_HOUR: f64 = 23.999;

/// Max rotation of a single-axis tracker either side of its rest position, in degrees
const MAX_TRACKER_ROTATION: f64 = 90.;

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TimeReference {
    /// Timestamps are local apparent solar time
    #[default]
    Solar,
    /// Timestamps are UTC and are shifted by longitude and the equation of time
    Utc,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub time_reference: TimeReference,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || latitude.abs() > 90. {
            return Err(PvSynthError::invalid_geometry(format!(
                "latitude {latitude} is outside -90 to 90 degrees"
            )));
        }
        if !longitude.is_finite() || longitude.abs() > 360. {
            return Err(PvSynthError::invalid_geometry(format!(
                "longitude {longitude} is not a valid angle"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
            time_reference: TimeReference::Solar,
        })
    }

    pub fn with_time_reference(self, time_reference: TimeReference) -> Self {
        Self {
            time_reference,
            ..self
        }
    }

    /// Hours to add to clock time to get apparent solar time.
    pub fn solar_time_shift(&self, day_of_year: u32) -> f64 {
        match self.time_reference {
            TimeReference::Solar => 0.,
            TimeReference::Utc => {
                self.longitude / DEGREES_PER_HOUR + equation_of_time(day_of_year) / 60.
            }
        }
    }

    pub fn solar_time(&self, day_of_year: u32, clock_hour: f64) -> f64 {
        clock_hour + self.solar_time_shift(day_of_year)
    }

    pub fn clock_hour(&self, day_of_year: u32, solar_time: f64) -> f64 {
        (solar_time - self.solar_time_shift(day_of_year)).rem_euclid(HOURS_PER_DAY as f64)
    }
}

/// Solar declination, in degrees, for a 1-indexed day of the year.
pub fn solar_declination(day_of_year: u32) -> f64 {
    23.45 * (360. * (284. + day_of_year as f64) / 365.).to_radians().sin()
}

/// Eccentricity correction factor of the earth's orbit (Spencer).
pub fn eccentricity_correction(day_of_year: u32) -> f64 {
    let day_angle = 2. * std::f64::consts::PI * (day_of_year as f64 - 1.) / 365.;
    1.000110
        + 0.034221 * day_angle.cos()
        + 0.001280 * day_angle.sin()
        + 0.000719 * (2. * day_angle).cos()
        + 0.000077 * (2. * day_angle).sin()
}

/// Equation of time, in minutes (ISO 52010 piecewise form).
pub fn equation_of_time(day_of_year: u32) -> f64 {
    let nday = day_of_year as i32;
    match nday {
        nday if nday < 21 => 2.6 + 0.44 * nday as f64,
        nday if nday < 136 => 5.2 + 9.0 * ((nday - 43) as f64 * 0.0357).cos(),
        nday if nday < 241 => 1.4 - 5.0 * ((nday - 135) as f64 * 0.0449).cos(),
        nday if nday < 336 => -6.3 - 10.0 * ((nday - 306) as f64 * 0.036).cos(),
        nday => 0.45 * (nday - 359) as f64,
    }
}

/// Hour angle, in degrees, negative before solar noon.
pub fn hour_angle(solar_time: f64) -> f64 {
    DEGREES_PER_HOUR * (solar_time - 12.)
}

/// Sunset hour angle, in degrees, from `acos(-tan(lat)·tan(decl))`.
/// The argument is clamped so that polar day gives 180 and polar night 0.
pub fn sunset_hour_angle(latitude: f64, solar_declination: f64) -> f64 {
    let latitude = latitude.to_radians();
    let solar_declination = solar_declination.to_radians();
    clip(-latitude.tan() * solar_declination.tan(), -1., 1.)
        .acos()
        .to_degrees()
}

/// Hour angle, in degrees, at which the sun's centre sits at `altitude`.
fn hour_angle_at_altitude(latitude: f64, solar_declination: f64, altitude: f64) -> f64 {
    let sin_lat_sin_decl = latitude.to_radians().sin() * solar_declination.to_radians().sin();
    let cos_lat_cos_decl = latitude.to_radians().cos() * solar_declination.to_radians().cos();
    let sin_altitude = altitude.to_radians().sin();

    if cos_lat_cos_decl.abs() < 1e-12 {
        return if sin_lat_sin_decl > sin_altitude { 180. } else { 0. };
    }

    clip(
        (sin_altitude - sin_lat_sin_decl) / cos_lat_cos_decl,
        -1.,
        1.,
    )
    .acos()
    .to_degrees()
}

/// Sunrise and sunset for one day, in clock hours.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SunTimes {
    pub sunrise: f64,
    pub sunset: f64,
    /// Hours between sunrise and sunset, 0 for polar night, 24 for polar day
    pub day_length: f64,
}

impl SunTimes {
    pub fn is_polar_night(&self) -> bool {
        self.day_length <= 0.
    }

    pub fn is_polar_day(&self) -> bool {
        self.day_length >= HOURS_PER_DAY as f64
    }

    /// Whether daylight runs across midnight in clock time.
    pub fn wraps_midnight(&self) -> bool {
        !self.is_polar_day() && self.sunrise > self.sunset
    }

    /// Hour index in which the sun rises, 0 when it never sets.
    pub fn sunrise_hour(&self) -> usize {
        if self.is_polar_day() {
            0
        } else {
            self.sunrise.floor() as usize
        }
    }

    /// Hour index in which the sun sets, 23 when it never sets.
    pub fn sunset_hour(&self) -> usize {
        if self.is_polar_day() {
            HOURS_PER_DAY as usize - 1
        } else {
            min_of_2(self.sunset.floor() as usize, HOURS_PER_DAY as usize - 1)
        }
    }
}

/// Sunrise and sunset of the upper limb of the solar disc.
pub fn sun_times(location: &Location, day_of_year: u32) -> SunTimes {
    let declination = solar_declination(day_of_year);
    let half_day_angle = hour_angle_at_altitude(location.latitude, declination, -SOLAR_DISC_RADIUS);
    let day_length = 2. * half_day_angle / DEGREES_PER_HOUR;

    if day_length >= HOURS_PER_DAY as f64 {
        return SunTimes {
            sunrise: 0.,
            sunset: LAST_SUNSET_HOUR,
            day_length: HOURS_PER_DAY as f64,
        };
    }

    let sunrise = location.clock_hour(day_of_year, 12. - half_day_angle / DEGREES_PER_HOUR);
    let sunset = location.clock_hour(day_of_year, 12. + half_day_angle / DEGREES_PER_HOUR);
    SunTimes {
        sunrise,
        sunset,
        day_length,
    }
}

/// Sunlit parts of the clock hour starting at `timestamp`, as solar-time
/// intervals. The hour is split at solar midnight and each piece is clipped to
/// the geometric sunrise and sunset of the day.
pub fn sunlit_intervals(location: &Location, timestamp: &NaiveDateTime) -> Vec<(f64, f64)> {
    let day_of_year = day_of_year(timestamp);
    let start = location
        .solar_time(day_of_year, decimal_hour(timestamp))
        .rem_euclid(HOURS_PER_DAY as f64);
    let end = start + 1.;

    let half_day = sunset_hour_angle(location.latitude, solar_declination(day_of_year))
        / DEGREES_PER_HOUR;
    let (sunrise, sunset) = (12. - half_day, 12. + half_day);

    let pieces = if end > HOURS_PER_DAY as f64 {
        vec![
            (start, HOURS_PER_DAY as f64),
            (0., end - HOURS_PER_DAY as f64),
        ]
    } else {
        vec![(start, end)]
    };

    pieces
        .into_iter()
        .map(|(from, to)| (max_of_2(from, sunrise), min_of_2(to, sunset)))
        .filter(|(from, to)| to > from)
        .collect()
}

/// Sun position representative of the hour starting at `timestamp`: the
/// midpoint of the longest sunlit part, or the middle of the hour at night.
pub fn sun_position_for_hour(location: &Location, timestamp: &NaiveDateTime) -> SunPosition {
    let day_of_year = day_of_year(timestamp);
    let solar_time = sunlit_intervals(location, timestamp)
        .into_iter()
        .max_by(|(a_from, a_to), (b_from, b_to)| (a_to - a_from).total_cmp(&(b_to - b_from)))
        .map(|(from, to)| (from + to) / 2.)
        .unwrap_or_else(|| location.solar_time(day_of_year, decimal_hour(timestamp) + 0.5));
    SunPosition::at(location, day_of_year, solar_time)
}

/// Solar altitude, in degrees; negative when the sun is below the horizon.
pub fn solar_altitude(latitude: f64, solar_declination: f64, hour_angle: f64) -> f64 {
    let latitude = latitude.to_radians();
    let solar_declination = solar_declination.to_radians();
    let hour_angle = hour_angle.to_radians();

    (solar_declination.sin() * latitude.sin()
        + solar_declination.cos() * latitude.cos() * hour_angle.cos())
    .asin()
    .to_degrees()
}

/// Solar azimuth, in degrees clockwise from north, 0 to 360.
pub fn solar_azimuth(latitude: f64, solar_declination: f64, hour_angle: f64) -> f64 {
    let latitude = latitude.to_radians();
    let solar_declination = solar_declination.to_radians();
    let hour_angle = hour_angle.to_radians();

    let east = -solar_declination.cos() * hour_angle.sin();
    let north = solar_declination.sin() * latitude.cos()
        - solar_declination.cos() * hour_angle.cos() * latitude.sin();
    east.atan2(north).to_degrees().rem_euclid(360.)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SunPosition {
    pub declination: f64,
    pub hour_angle: f64,
    pub altitude: f64,
    pub zenith: f64,
    pub azimuth: f64,
}

impl SunPosition {
    pub fn new(latitude: f64, declination: f64, hour_angle: f64) -> Self {
        let altitude = solar_altitude(latitude, declination, hour_angle);
        Self {
            declination,
            hour_angle,
            altitude,
            zenith: 90. - altitude,
            azimuth: solar_azimuth(latitude, declination, hour_angle),
        }
    }

    pub fn at(location: &Location, day_of_year: u32, solar_time: f64) -> Self {
        Self::new(
            location.latitude,
            solar_declination(day_of_year),
            hour_angle(solar_time),
        )
    }

    pub fn is_above_horizon(&self) -> bool {
        self.zenith < 90.
    }

    /// Unit vector towards the sun as (east, north, up).
    fn direction(&self) -> [f64; 3] {
        let zenith = self.zenith.to_radians();
        let azimuth = self.azimuth.to_radians();
        [
            zenith.sin() * azimuth.sin(),
            zenith.sin() * azimuth.cos(),
            zenith.cos(),
        ]
    }
}

/// Read from configuration as 0, 1 or 2.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(try_from = "u8")]
pub enum TrackingMode {
    #[default]
    Fixed = 0,
    SingleAxis = 1,
    TwoAxis = 2,
}

impl TryFrom<u8> for TrackingMode {
    type Error = PvSynthError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(TrackingMode::Fixed),
            1 => Ok(TrackingMode::SingleAxis),
            2 => Ok(TrackingMode::TwoAxis),
            other => Err(PvSynthError::invalid_geometry(format!(
                "tracking mode must be 0, 1 or 2, got {other}"
            ))),
        }
    }
}

/// Orientation of a plane for one instant, with its angle of incidence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaneGeometry {
    /// Angle between the sun vector and the plane normal, in degrees
    pub incidence: f64,
    /// Tilt from horizontal, in degrees
    pub tilt: f64,
    /// Azimuth of the plane normal, degrees clockwise from north
    pub azimuth: f64,
}

/// Unit normal (east, north, up) of a plane with the given tilt and azimuth.
fn plane_normal(tilt: f64, azimuth: f64) -> [f64; 3] {
    let tilt = tilt.to_radians();
    let azimuth = azimuth.to_radians();
    [
        tilt.sin() * azimuth.sin(),
        tilt.sin() * azimuth.cos(),
        tilt.cos(),
    ]
}

fn dot(first: [f64; 3], second: [f64; 3]) -> f64 {
    first.iter().zip(second).map(|(a, b)| a * b).sum()
}

fn incidence_from_cosine(cos_incidence: f64) -> f64 {
    clip(cos_incidence, -1., 1.).acos().to_degrees()
}

/// Plane geometry for a panel facing `azimuth` (clockwise from north, already
/// corrected for hemisphere) tilted by `tilt`, or for a tracker whose rest
/// position is that plane (single-axis: the axis has that tilt and azimuth).
pub fn plane_geometry(
    sun: &SunPosition,
    tilt: f64,
    azimuth: f64,
    tracking: TrackingMode,
) -> PlaneGeometry {
    let sun_direction = sun.direction();
    match tracking {
        TrackingMode::Fixed => PlaneGeometry {
            incidence: incidence_from_cosine(dot(plane_normal(tilt, azimuth), sun_direction)),
            tilt,
            azimuth,
        },
        TrackingMode::SingleAxis => single_axis_geometry(sun_direction, tilt, azimuth),
        TrackingMode::TwoAxis => PlaneGeometry {
            incidence: 0.,
            tilt: clip(sun.zenith, 0., 90.),
            azimuth: sun.azimuth,
        },
    }
}

/// Rotation about the tracker axis that minimises the angle of incidence.
fn single_axis_geometry(sun_direction: [f64; 3], axis_tilt: f64, axis_azimuth: f64) -> PlaneGeometry {
    let rest_normal = plane_normal(axis_tilt, axis_azimuth);
    // horizontal direction perpendicular to the axis, 90 degrees clockwise from its azimuth
    let (sin_axis_azimuth, cos_axis_azimuth) = axis_azimuth.to_radians().sin_cos();
    let rotation_direction = [cos_axis_azimuth, -sin_axis_azimuth, 0.];

    let along_rest = dot(rest_normal, sun_direction);
    let along_rotation = dot(rotation_direction, sun_direction);
    let rotation = clip(
        along_rotation.atan2(along_rest).to_degrees(),
        -MAX_TRACKER_ROTATION,
        MAX_TRACKER_ROTATION,
    );
    let (sin_rotation, cos_rotation) = rotation.to_radians().sin_cos();

    let normal = [
        rest_normal[0] * cos_rotation + rotation_direction[0] * sin_rotation,
        rest_normal[1] * cos_rotation + rotation_direction[1] * sin_rotation,
        rest_normal[2] * cos_rotation,
    ];

    PlaneGeometry {
        incidence: incidence_from_cosine(dot(normal, sun_direction)),
        tilt: clip(normal[2], -1., 1.).acos().to_degrees(),
        azimuth: normal[0].atan2(normal[1]).to_degrees().rem_euclid(360.),
    }
}

/// Angle of incidence, in degrees, from declination, hour angle, latitude,
/// tilt and azimuth (180 = equator-facing in either hemisphere).
pub fn angle_of_incidence(
    solar_declination: f64,
    hour_angle: f64,
    latitude: f64,
    tilt: f64,
    azimuth: f64,
    tracking: TrackingMode,
) -> f64 {
    let sun = SunPosition::new(latitude, solar_declination, hour_angle);
    plane_geometry(&sun, tilt, hemisphere_azimuth(latitude, azimuth), tracking).incidence
}

/// Panel azimuths are given with 180 meaning equator-facing, so rotate them
/// by half a turn south of the equator.
pub fn hemisphere_azimuth(latitude: f64, azimuth: f64) -> f64 {
    if latitude < 0. {
        (azimuth + 180.).rem_euclid(360.)
    } else {
        azimuth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    const SPRING_EQUINOX: u32 = 80;
    const SUMMER_SOLSTICE: u32 = 172;
    const WINTER_SOLSTICE: u32 = 355;

    fn location(latitude: f64) -> Location {
        Location::new(latitude, 0.).unwrap()
    }

    #[rstest]
    fn test_solar_declination() {
        assert_relative_eq!(solar_declination(SUMMER_SOLSTICE), 23.45, epsilon = 0.01);
        assert_relative_eq!(solar_declination(WINTER_SOLSTICE), -23.45, epsilon = 0.05);
        assert_relative_eq!(solar_declination(SPRING_EQUINOX), 0., epsilon = 0.5);
    }

    #[rstest]
    fn test_eccentricity_correction() {
        assert_relative_eq!(eccentricity_correction(1), 1.03505, epsilon = 1e-4);
        assert!(eccentricity_correction(183) < 1.);
    }

    #[rstest]
    fn test_hour_angle() {
        assert_eq!(hour_angle(12.), 0.);
        assert_eq!(hour_angle(6.), -90.);
        assert_eq!(hour_angle(18.5), 97.5);
    }

    #[rstest]
    fn test_sunset_hour_angle_is_clamped_for_polar_conditions() {
        assert_eq!(sunset_hour_angle(80., solar_declination(WINTER_SOLSTICE)), 0.);
        assert_eq!(sunset_hour_angle(80., solar_declination(SUMMER_SOLSTICE)), 180.);
        assert_relative_eq!(sunset_hour_angle(0., 10.), 90., epsilon = 1e-9);
    }

    #[rstest]
    fn test_sunrise_before_sunset_outside_polar_circles() {
        for latitude in (-665..=665).step_by(5).map(|tenths| tenths as f64 / 10.) {
            for day_of_year in 1..=365 {
                let times = sun_times(&location(latitude), day_of_year);
                assert!(
                    times.sunrise < times.sunset,
                    "lat {latitude} day {day_of_year}: {times:?}"
                );
                assert!((0. ..24.).contains(&times.sunrise));
                assert!((0. ..24.).contains(&times.sunset));
            }
        }
    }

    #[rstest]
    #[case(SPRING_EQUINOX)]
    #[case(266)]
    fn test_day_length_at_equator_on_equinox(#[case] day_of_year: u32) {
        let times = sun_times(&location(0.), day_of_year);
        assert_relative_eq!(times.day_length, 12., epsilon = 0.1);
    }

    #[rstest]
    fn test_polar_night_and_day() {
        let night = sun_times(&location(80.), WINTER_SOLSTICE);
        assert!(night.is_polar_night());
        let day = sun_times(&location(80.), SUMMER_SOLSTICE);
        assert!(day.is_polar_day());
        assert_eq!(day.sunrise_hour(), 0);
        assert_eq!(day.sunset_hour(), 23);
    }

    #[rstest]
    fn test_utc_sun_times_wrap_midnight_far_east() {
        let far_east = Location::new(45., 170.)
            .unwrap()
            .with_time_reference(TimeReference::Utc);
        let times = sun_times(&far_east, SPRING_EQUINOX);
        assert!(times.wraps_midnight(), "{times:?}");
        assert_relative_eq!(times.day_length, 12., epsilon = 0.2);
    }

    #[rstest]
    fn test_sun_position_at_noon() {
        let sun = SunPosition::at(&location(45.), SPRING_EQUINOX, 12.);
        assert_relative_eq!(sun.altitude, 45. + sun.declination, epsilon = 1e-9);
        assert_relative_eq!(sun.azimuth, 180., epsilon = 1e-9);
    }

    #[rstest]
    fn test_sun_is_east_in_the_morning() {
        let sun = SunPosition::at(&location(45.), SUMMER_SOLSTICE, 8.);
        assert!(sun.azimuth > 45. && sun.azimuth < 135., "{sun:?}");
    }

    #[rstest]
    fn test_incidence_on_horizontal_plane_equals_zenith() {
        let declination = solar_declination(SUMMER_SOLSTICE);
        let incidence = angle_of_incidence(declination, -30., 50., 0., 180., TrackingMode::Fixed);
        let sun = SunPosition::new(50., declination, -30.);
        assert_relative_eq!(incidence, sun.zenith, epsilon = 1e-9);
    }

    #[rstest]
    fn test_equator_facing_panel_at_latitude_tilt_on_equinox_noon() {
        let declination = solar_declination(SPRING_EQUINOX);
        let incidence = angle_of_incidence(declination, 0., 40., 40., 180., TrackingMode::Fixed);
        assert_relative_eq!(incidence, declination.abs(), epsilon = 1e-9);
    }

    #[rstest]
    fn test_southern_hemisphere_panel_faces_north() {
        let declination = solar_declination(SPRING_EQUINOX);
        let incidence = angle_of_incidence(declination, 0., -40., 40., 180., TrackingMode::Fixed);
        assert_relative_eq!(incidence, declination.abs(), epsilon = 1e-9);
    }

    #[rstest]
    fn test_two_axis_incidence_is_zero() {
        let declination = solar_declination(SUMMER_SOLSTICE);
        assert_eq!(
            angle_of_incidence(declination, 45., 30., 20., 180., TrackingMode::TwoAxis),
            0.
        );
    }

    #[rstest]
    #[case(-60.)]
    #[case(-20.)]
    #[case(35.)]
    #[case(75.)]
    fn test_single_axis_never_worse_than_its_rest_position(#[case] hour_angle: f64) {
        let declination = solar_declination(SUMMER_SOLSTICE);
        let fixed = angle_of_incidence(declination, hour_angle, 45., 0., 180., TrackingMode::Fixed);
        let tracked =
            angle_of_incidence(declination, hour_angle, 45., 0., 180., TrackingMode::SingleAxis);
        assert!(tracked <= fixed + 1e-9, "{tracked} > {fixed}");
    }

    #[rstest]
    fn test_horizontal_north_south_axis_faces_east_in_morning() {
        let sun = SunPosition::at(&location(30.), SPRING_EQUINOX, 9.);
        let geometry = plane_geometry(&sun, 0., 180., TrackingMode::SingleAxis);
        assert!(geometry.azimuth > 0. && geometry.azimuth < 180., "{geometry:?}");

        let (latitude, declination, hour_angle) = (
            30f64.to_radians(),
            sun.declination.to_radians(),
            sun.hour_angle.to_radians(),
        );
        let rotation = (hour_angle.sin() * declination.cos())
            .abs()
            .atan2(
                hour_angle.cos() * declination.cos() * latitude.cos()
                    + declination.sin() * latitude.sin(),
            )
            .to_degrees();
        assert_relative_eq!(geometry.tilt, rotation, epsilon = 1e-6);
        assert_relative_eq!(geometry.azimuth, 90., epsilon = 1e-6);
    }

    #[rstest]
    fn test_tracking_mode_from_integer() {
        assert_eq!(TrackingMode::try_from(2).unwrap(), TrackingMode::TwoAxis);
        assert!(matches!(
            TrackingMode::try_from(3),
            Err(PvSynthError::InvalidGeometry(_))
        ));
    }

    #[rstest]
    fn test_sunlit_intervals_at_equator() {
        let date = chrono::NaiveDate::from_ymd_opt(2021, 3, 21).unwrap();
        let at = |hour| date.and_hms_opt(hour, 0, 0).unwrap();
        assert!(sunlit_intervals(&location(0.), &at(5)).is_empty());
        assert_eq!(sunlit_intervals(&location(0.), &at(11)), vec![(11., 12.)]);
        let evening = sun_position_for_hour(&location(0.), &at(21));
        assert!(!evening.is_above_horizon());
    }

    #[rstest]
    fn test_invalid_latitude() {
        assert!(Location::new(91., 0.).is_err());
    }
}
