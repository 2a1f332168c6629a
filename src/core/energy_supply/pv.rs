use crate::compare_floats::min_of_2;
use crate::core::units::{DEFAULT_AMBIENT_TEMPERATURE, WATTS_PER_KILOWATT};
use crate::errors::{PvSynthError, Result};
use serde::Deserialize;
use strum::{Display, EnumString};

/// This module contains objects that represent photovoltaic systems, using the
/// relative efficiency model of Huld et al. (2010), "Mapping the performance
/// of PV modules, effects of module type and data averaging", Solar Energy 84.

/// reference irradiance for the efficiency model, in W/m2
const REFERENCE_IRRADIANCE: f64 = WATTS_PER_KILOWATT as f64;
/// reference module temperature, in deg C
const REFERENCE_MODULE_TEMPERATURE: f64 = 25.;
/// rise in module temperature over ambient per unit irradiance, in deg C / (W/m2),
/// for a free-standing module without wind
const MODULE_TEMPERATURE_IRRADIANCE_COEFFICIENT: f64 = 0.035;

pub const DEFAULT_SYSTEM_LOSS: f64 = 0.10;

#[derive(Clone, Copy, Debug)]
struct HuldCoefficients {
    k1: f64,
    k2: f64,
    k3: f64,
    k4: f64,
    k5: f64,
    k6: f64,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, EnumString, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PanelTechnology {
    /// crystalline silicon
    #[default]
    CSi,
    /// cadmium telluride thin film
    CdTe,
}

impl PanelTechnology {
    fn coefficients(&self) -> HuldCoefficients {
        match self {
            PanelTechnology::CSi => HuldCoefficients {
                k1: -0.017162,
                k2: -0.040289,
                k3: -0.004681,
                k4: 0.000148,
                k5: 0.000169,
                k6: 0.000005,
            },
            PanelTechnology::CdTe => HuldCoefficients {
                k1: -0.103251,
                k2: -0.040446,
                k3: -0.001667,
                k4: -0.002075,
                k5: -0.001445,
                k6: -0.000023,
            },
        }
    }

    /// Conversion efficiency relative to standard test conditions.
    /// Zero when the irradiance is not positive or the fit goes negative.
    pub fn relative_efficiency(&self, irradiance: f64, ambient_temperature: f64) -> f64 {
        let HuldCoefficients {
            k1,
            k2,
            k3,
            k4,
            k5,
            k6,
        } = self.coefficients();
        // normalised in-plane irradiance and module temperature
        let g = irradiance / REFERENCE_IRRADIANCE;
        let t = ambient_temperature + MODULE_TEMPERATURE_IRRADIANCE_COEFFICIENT * irradiance
            - REFERENCE_MODULE_TEMPERATURE;
        let ln_g = g.ln();

        let efficiency = 1.
            + k1 * ln_g
            + k2 * ln_g.powi(2)
            + t * (k3 + k4 * ln_g + k5 * ln_g.powi(2))
            + k6 * t.powi(2);
        if efficiency.is_nan() || efficiency < 0. {
            0.
        } else {
            efficiency
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhotovoltaicSystem {
    technology: PanelTechnology,
    /// rated power, in W
    capacity: f64,
    system_loss: f64,
}

impl PhotovoltaicSystem {
    /// Construct a PhotovoltaicSystem
    ///
    /// Arguments:
    /// * `technology` - module technology, selecting the efficiency coefficients
    /// * `capacity` - rated power in W, at 1000 W/m2 and 25 degrees
    /// * `system_loss` - fraction lost between DC output and AC delivery, 0 to 1
    pub fn new(technology: PanelTechnology, capacity: f64, system_loss: f64) -> Result<Self> {
        if !(0. ..=1.).contains(&system_loss) {
            return Err(PvSynthError::InvalidConfiguration(format!(
                "system_loss must be between 0 and 1, got {system_loss}"
            )));
        }
        if !(capacity > 0.) {
            return Err(PvSynthError::InvalidConfiguration(format!(
                "capacity must be positive, got {capacity}"
            )));
        }
        Ok(Self {
            technology,
            capacity,
            system_loss,
        })
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// DC power in W from plane-of-array irradiance (W/m2), capped at capacity.
    pub fn compute_dc_output(&self, plane_irradiance: f64, ambient_temperature: f64) -> f64 {
        if plane_irradiance.is_nan() {
            return f64::NAN;
        }
        let output = plane_irradiance * self.capacity / REFERENCE_IRRADIANCE
            * self
                .technology
                .relative_efficiency(plane_irradiance, ambient_temperature);
        min_of_2(output, self.capacity)
    }

    /// Delivered power in W after system losses.
    pub fn compute_ac_output(&self, plane_irradiance: f64, ambient_temperature: f64) -> f64 {
        self.compute_dc_output(plane_irradiance, ambient_temperature) * (1. - self.system_loss)
    }

    /// Delivered power for each hour; hourly energy in Wh. Ambient temperature
    /// defaults to 20 deg C where none is given.
    pub fn run(&self, plane_irradiance: &[f64], ambient_temperature: Option<&[f64]>) -> Vec<f64> {
        plane_irradiance
            .iter()
            .enumerate()
            .map(|(idx, irradiance)| {
                let temperature = ambient_temperature
                    .and_then(|temperatures| temperatures.get(idx).copied())
                    .filter(|temperature| !temperature.is_nan())
                    .unwrap_or(DEFAULT_AMBIENT_TEMPERATURE);
                self.compute_ac_output(*irradiance, temperature)
            })
            .collect()
    }
}
