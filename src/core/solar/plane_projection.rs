//! Irradiance on the plane of a panel (aperture irradiance) from direct and
//! diffuse horizontal irradiance, for fixed and tracking panels.

use crate::compare_floats::{clip, max_of_2, min_of_2};
use crate::core::solar::sun_geometry::{
    eccentricity_correction, hemisphere_azimuth, plane_geometry, sun_position_for_hour, Location,
    PlaneGeometry, SunPosition, TrackingMode,
};
use crate::core::units::SOLAR_CONSTANT;
use crate::errors::{PvSynthError, Result};
use crate::time_index::day_of_year;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use tracing::debug;

/// Ground reflectance used when none is configured
pub const DEFAULT_ALBEDO: f64 = 0.3;

/// Tilt giving the most annual irradiation for a latitude, in degrees
/// (Jacobson & Jadhav 2018 fit).
pub fn optimal_tilt(latitude: f64) -> f64 {
    let latitude = latitude.abs();
    if latitude <= 25. {
        latitude * 0.87
    } else if latitude <= 50. {
        (latitude * 0.76) + 3.1
    } else {
        40.
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TiltConfig {
    Fixed(f64),
    LatitudeDependent(fn(f64) -> f64),
}

impl TiltConfig {
    pub fn tilt_at(&self, latitude: f64) -> Result<f64> {
        let tilt = match self {
            TiltConfig::Fixed(tilt) => *tilt,
            TiltConfig::LatitudeDependent(tilt_for_latitude) => tilt_for_latitude(latitude),
        };
        if !(0. ..=90.).contains(&tilt) {
            return Err(PvSynthError::invalid_geometry(format!(
                "tilt of {tilt} degrees at latitude {latitude} is outside 0 to 90"
            )));
        }
        Ok(tilt)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PanelConfig {
    pub tilt: TiltConfig,
    /// Degrees, 180 means equator-facing in either hemisphere
    pub azimuth: f64,
    pub tracking: TrackingMode,
    pub albedo: f64,
}

impl PanelConfig {
    /// Checks what does not depend on latitude: the albedo, and a fixed tilt.
    pub fn validate(&self) -> Result<()> {
        if !(0. ..=1.).contains(&self.albedo) {
            return Err(PvSynthError::InvalidConfiguration(format!(
                "albedo must be between 0 and 1, got {}",
                self.albedo
            )));
        }
        if let TiltConfig::Fixed(tilt) = self.tilt {
            if !(0. ..=90.).contains(&tilt) {
                return Err(PvSynthError::invalid_geometry(format!(
                    "tilt of {tilt} degrees is outside 0 to 90"
                )));
            }
        }
        Ok(())
    }

    pub fn resolve(&self, latitude: f64) -> Result<ResolvedPanel> {
        self.validate()?;
        Ok(ResolvedPanel {
            tilt: self.tilt.tilt_at(latitude)?,
            azimuth: self.azimuth.rem_euclid(360.),
            tracking: self.tracking,
            albedo: self.albedo,
        })
    }
}

/// Panel configuration with its tilt evaluated for one latitude.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedPanel {
    pub tilt: f64,
    pub azimuth: f64,
    pub tracking: TrackingMode,
    pub albedo: f64,
}

/// Resolved panels keyed by latitude, so a latitude-dependent tilt is
/// evaluated once per distinct latitude. A tilt that is invalid at one
/// latitude is kept as that latitude's error.
#[derive(Debug, Default)]
pub struct ResolvedPanels {
    by_latitude: IndexMap<OrderedFloat<f64>, Result<ResolvedPanel>>,
}

impl ResolvedPanels {
    /// Fails only for problems shared by every latitude.
    pub fn new(panel: &PanelConfig, latitudes: impl IntoIterator<Item = f64>) -> Result<Self> {
        panel.validate()?;
        let mut by_latitude = IndexMap::new();
        for latitude in latitudes {
            by_latitude
                .entry(OrderedFloat(latitude))
                .or_insert_with(|| panel.resolve(latitude));
        }
        debug!("Resolved panel tilt for {} distinct latitudes", by_latitude.len());
        Ok(Self { by_latitude })
    }

    pub fn get(&self, latitude: f64) -> Result<&ResolvedPanel> {
        match self.by_latitude.get(&OrderedFloat(latitude)) {
            Some(Ok(panel)) => Ok(panel),
            Some(Err(err)) => Err(err.clone()),
            None => Err(PvSynthError::invalid_geometry(format!(
                "no panel resolved for latitude {latitude}"
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.by_latitude.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_latitude.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ApertureIrradiance {
    pub direct: f64,
    pub diffuse: f64,
}

impl ApertureIrradiance {
    pub fn total(&self) -> f64 {
        max_of_2(self.direct + self.diffuse, 0.)
    }
}

/// Direct normal irradiance from direct horizontal irradiance, limited to
/// the extraterrestrial normal irradiance.
fn direct_normal(direct_horizontal: f64, sun: &SunPosition, day_of_year: u32) -> f64 {
    if !sun.is_above_horizon() || direct_horizontal <= 0. || direct_horizontal.is_nan() {
        return 0.;
    }
    min_of_2(
        direct_horizontal / sun.zenith.to_radians().cos(),
        SOLAR_CONSTANT * eccentricity_correction(day_of_year),
    )
}

/// Isotropic sky diffuse plus ground-reflected irradiance on a plane of `tilt`.
fn plane_diffuse(direct: f64, diffuse: f64, tilt: f64, albedo: f64) -> f64 {
    let cos_tilt = tilt.to_radians().cos();
    diffuse * (1. + cos_tilt) / 2. + albedo * (direct + diffuse) * (1. - cos_tilt) / 2.
}

/// A two-axis tracker faces the sun's azimuth and takes the tilt that
/// maximises beam plus isotropic diffuse and ground-reflected irradiance.
/// Under a beam-only sky this is the zenith angle, so the plane is sun-normal.
fn two_axis_geometry(
    sun: &SunPosition,
    direct_normal: f64,
    direct: f64,
    diffuse: f64,
    albedo: f64,
) -> PlaneGeometry {
    let zenith = sun.zenith.to_radians();
    let sky_minus_ground = (diffuse - albedo * (direct + diffuse)) / 2.;
    let tilt = clip(
        (direct_normal * zenith.sin())
            .atan2(direct_normal * zenith.cos() + sky_minus_ground)
            .to_degrees(),
        0.,
        90.,
    );
    PlaneGeometry {
        incidence: (sun.zenith - tilt).abs(),
        tilt,
        azimuth: sun.azimuth,
    }
}

/// Irradiance on the panel plane for the hour starting at `timestamp`, from
/// direct and diffuse horizontal irradiance in W/m2.
pub fn project_to_plane(
    direct: f64,
    diffuse: f64,
    location: &Location,
    panel: &ResolvedPanel,
    timestamp: &NaiveDateTime,
) -> ApertureIrradiance {
    let direct = if direct.is_nan() { 0. } else { max_of_2(direct, 0.) };
    let diffuse = if diffuse.is_nan() { 0. } else { max_of_2(diffuse, 0.) };

    let sun = sun_position_for_hour(location, timestamp);
    let direct_normal = direct_normal(direct, &sun, day_of_year(timestamp));

    let geometry = match panel.tracking {
        TrackingMode::TwoAxis => {
            two_axis_geometry(&sun, direct_normal, direct, diffuse, panel.albedo)
        }
        tracking => plane_geometry(
            &sun,
            panel.tilt,
            hemisphere_azimuth(location.latitude, panel.azimuth),
            tracking,
        ),
    };

    ApertureIrradiance {
        direct: max_of_2(direct_normal * geometry.incidence.to_radians().cos(), 0.),
        diffuse: max_of_2(
            plane_diffuse(direct, diffuse, geometry.tilt, panel.albedo),
            0.,
        ),
    }
}
