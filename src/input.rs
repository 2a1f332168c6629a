use crate::core::dispatch::ProcessingMode;
use crate::core::energy_supply::pv::{PanelTechnology, PhotovoltaicSystem, DEFAULT_SYSTEM_LOSS};
use crate::core::solar::plane_projection::{optimal_tilt, PanelConfig, TiltConfig, DEFAULT_ALBEDO};
use crate::core::solar::sun_geometry::{TimeReference, TrackingMode};
use crate::core::upsampling::temporal_upsampler::PdfFallback;
use crate::errors::{PvSynthError, Result};
use crate::time_index::FrequencyTag;
use crate::RunSettings;
use serde::Deserialize;
use std::io::{BufReader, Read};

pub fn ingest_run_config(json: impl Read) -> anyhow::Result<RunConfig> {
    Ok(serde_json::from_reader(BufReader::new(json))?)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub panel: PanelInput,
    #[serde(default)]
    pub frequency: FrequencyTag,
    /// Present when daily values should be drawn from PDFs
    pub pdfs: Option<PdfsInput>,
    #[serde(default)]
    pub time_reference: TimeReference,
    pub num_threads: Option<usize>,
}

impl RunConfig {
    pub fn run_settings(&self) -> Result<RunSettings> {
        if self.num_threads == Some(0) {
            return Err(PvSynthError::InvalidConfiguration(
                "num_threads must be at least 1".into(),
            ));
        }
        let panel = self.panel.panel_config();
        panel.validate()?;
        Ok(RunSettings {
            panel,
            pv_system: self.panel.photovoltaic_system()?,
            frequency: self.frequency,
            time_reference: self.time_reference,
            pdf_fallback: self.pdfs.as_ref().map(|pdfs| pdfs.fallback),
            processing_mode: ProcessingMode::from_num_threads(self.num_threads),
        })
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TiltInput {
    Degrees(f64),
    Named(NamedTilt),
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum NamedTilt {
    Optimal,
}

impl From<TiltInput> for TiltConfig {
    fn from(value: TiltInput) -> Self {
        match value {
            TiltInput::Degrees(tilt) => TiltConfig::Fixed(tilt),
            TiltInput::Named(NamedTilt::Optimal) => TiltConfig::LatitudeDependent(optimal_tilt),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PanelInput {
    pub tilt: TiltInput,
    #[serde(default = "default_azimuth")]
    pub azimuth: f64,
    #[serde(default)]
    pub tracking: TrackingMode,
    /// Rated power, in W
    pub capacity: f64,
    #[serde(default)]
    pub technology: PanelTechnology,
    #[serde(default = "default_system_loss")]
    pub system_loss: f64,
    #[serde(default = "default_albedo")]
    pub albedo: f64,
}

fn default_azimuth() -> f64 {
    180.
}

fn default_system_loss() -> f64 {
    DEFAULT_SYSTEM_LOSS
}

fn default_albedo() -> f64 {
    DEFAULT_ALBEDO
}

impl PanelInput {
    pub fn panel_config(&self) -> PanelConfig {
        PanelConfig {
            tilt: self.tilt.into(),
            azimuth: self.azimuth,
            tracking: self.tracking,
            albedo: self.albedo,
        }
    }

    pub fn photovoltaic_system(&self) -> Result<PhotovoltaicSystem> {
        PhotovoltaicSystem::new(self.technology, self.capacity, self.system_loss)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PdfsInput {
    #[serde(default)]
    pub fallback: PdfFallback,
}
