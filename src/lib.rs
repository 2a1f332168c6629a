mod compare_floats;
pub mod core;
pub mod errors;
pub mod input;
pub mod output;
pub mod output_writer;
pub mod read_climate_file;
mod statistics;
pub mod time_index;

#[cfg(test)]
mod tests;

pub use crate::core::dispatch::{CancellationToken, ProcessingMode};
pub use crate::errors::PvSynthError;

use crate::core::dispatch::dispatch;
use crate::core::energy_supply::pv::PhotovoltaicSystem;
use crate::core::solar::plane_projection::{
    project_to_plane, ApertureIrradiance, PanelConfig, ResolvedPanel, ResolvedPanels,
};
use crate::core::solar::sun_geometry::{Location, TimeReference};
use crate::core::units::HOURS_PER_DAY;
use crate::core::upsampling::pdf::{GriddedPdfStore, PdfStore};
use crate::core::upsampling::temporal_upsampler::{
    synthesize_hourly, HourlySeries, IrradianceSeries, PdfFallback, PdfOptions,
};
use crate::errors::Result;
use crate::input::ingest_run_config;
use crate::output::Output;
use crate::output_writer::{write_hourly_output, write_period_output};
use crate::read_climate_file::{climate_data_to_cells, pdf_table_to_store};
use crate::statistics::mean;
use crate::time_index::{parse_timestamp, Frequency, FrequencyTag};
use anyhow::anyhow;
use chrono::NaiveDateTime;
use std::io::Read;
use tracing::{debug, error, info};

/// Climate input for one grid cell, as read.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GridCell {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamps: Vec<String>,
    /// Mean global horizontal irradiance per period, W/m2; NaN where missing
    pub global_horizontal: Vec<f64>,
    pub diffuse_fraction: Option<Vec<f64>>,
    /// Celsius or Kelvin
    pub temperature: Option<Vec<f64>>,
}

impl GridCell {
    pub fn location(&self, time_reference: TimeReference) -> Result<Location> {
        Ok(Location::new(self.latitude, self.longitude)?.with_time_reference(time_reference))
    }

    pub fn series(&self) -> Result<IrradianceSeries> {
        let timestamps = self
            .timestamps
            .iter()
            .map(|raw| parse_timestamp(raw))
            .collect::<Result<Vec<NaiveDateTime>>>()?;
        let mut series = IrradianceSeries::new(timestamps, self.global_horizontal.clone())?;
        if let Some(diffuse_fraction) = &self.diffuse_fraction {
            series = series.with_diffuse_fraction(diffuse_fraction.clone())?;
        }
        if let Some(temperature) = &self.temperature {
            series = series.with_temperature(temperature.clone())?;
        }
        Ok(series)
    }
}

/// Validated settings shared by every cell of a run.
#[derive(Clone, Copy, Debug)]
pub struct RunSettings {
    pub panel: PanelConfig,
    pub pv_system: PhotovoltaicSystem,
    pub frequency: FrequencyTag,
    pub time_reference: TimeReference,
    /// Some when daily values are drawn from PDFs
    pub pdf_fallback: Option<PdfFallback>,
    pub processing_mode: ProcessingMode,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeriodOutput {
    pub timestamp: NaiveDateTime,
    /// Wh for hourly input, otherwise mean Wh per day over the period
    pub energy: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CellOutput {
    pub latitude: f64,
    pub longitude: f64,
    pub frequency: Frequency,
    pub hourly: HourlySeries,
    /// (direct, diffuse) horizontal irradiance per hour, W/m2
    pub horizontal: Vec<(f64, f64)>,
    pub plane_irradiance: Vec<ApertureIrradiance>,
    /// Delivered power per hour, W, i.e. Wh over the hour
    pub ac_output: Vec<f64>,
    pub periods: Vec<PeriodOutput>,
}

/// Runs the full chain for one cell: hourly synthesis, direct/diffuse split,
/// projection onto the panel plane and PV output.
pub fn simulate_cell(
    cell: &GridCell,
    panel: &ResolvedPanel,
    settings: &RunSettings,
    pdf_store: Option<&dyn PdfStore>,
) -> Result<CellOutput> {
    let location = cell.location(settings.time_reference)?;
    let series = cell.series()?;

    let pdfs = pdf_store
        .zip(settings.pdf_fallback)
        .map(|(store, fallback)| PdfOptions { store, fallback });
    let hourly = synthesize_hourly(&series, &location, settings.frequency, pdfs.as_ref())?;

    let horizontal = hourly.horizontal_components(&location);
    let plane_irradiance = horizontal
        .iter()
        .zip(&hourly.timestamps)
        .map(|((direct, diffuse), timestamp)| {
            project_to_plane(*direct, *diffuse, &location, panel, timestamp)
        })
        .collect::<Vec<_>>();

    // missing input stays missing through to the output
    let plane_totals = plane_irradiance
        .iter()
        .zip(&hourly.global_horizontal)
        .map(|(irradiance, global_horizontal)| {
            if global_horizontal.is_nan() {
                f64::NAN
            } else {
                irradiance.total()
            }
        })
        .collect::<Vec<f64>>();
    let ac_output = settings
        .pv_system
        .run(&plane_totals, hourly.temperature.as_deref());

    let frequency = hourly.source_frequency.unwrap_or(Frequency::Hourly);
    let periods = series
        .timestamps()
        .iter()
        .zip(energy_by_period(&hourly, &ac_output, series.len(), frequency))
        .map(|(timestamp, energy)| PeriodOutput {
            timestamp: *timestamp,
            energy,
        })
        .collect();

    Ok(CellOutput {
        latitude: cell.latitude,
        longitude: cell.longitude,
        frequency,
        hourly,
        horizontal,
        plane_irradiance,
        ac_output,
        periods,
    })
}

/// Energy for each input period: the energy of the hour for hourly input,
/// otherwise the mean over the period's synthetic days of their daily energy.
fn energy_by_period(
    hourly: &HourlySeries,
    ac_output: &[f64],
    period_count: usize,
    frequency: Frequency,
) -> Vec<f64> {
    let hours_per_day = match frequency {
        Frequency::Hourly => 1,
        _ => HOURS_PER_DAY as usize,
    };
    let mut by_period: Vec<Vec<f64>> = vec![vec![]; period_count];
    for (period, output) in hourly.period.iter().zip(ac_output) {
        if let Some(outputs) = by_period.get_mut(*period) {
            outputs.push(*output);
        }
    }
    by_period
        .iter()
        .map(|outputs| {
            if outputs.is_empty() {
                return f64::NAN;
            }
            let daily = outputs
                .chunks(hours_per_day)
                .map(|day| day.iter().sum::<f64>())
                .collect::<Vec<f64>>();
            mean(&daily)
        })
        .collect()
}

/// Simulates every cell, one result per cell in cell order.
///
/// Fails as a whole only for problems common to all cells: an invalid fixed
/// tilt or albedo, PDFs requested without a store, or a worker pool that
/// cannot be built. Anything else, including a latitude-dependent tilt that
/// is invalid at a cell's latitude, fails just the affected cell.
pub fn run_grid(
    cells: &[GridCell],
    settings: &RunSettings,
    pdf_store: Option<&dyn PdfStore>,
    cancellation: &CancellationToken,
    on_cell_done: Option<&(dyn Fn() + Sync)>,
) -> Result<Vec<Result<CellOutput>>> {
    if settings.pdf_fallback.is_some() && pdf_store.is_none() {
        return Err(PvSynthError::InvalidConfiguration(
            "PDFs were requested but no PDF table was given".into(),
        ));
    }
    let panels = ResolvedPanels::new(&settings.panel, cells.iter().map(|cell| cell.latitude))?;

    info!(
        "Simulating {} cells ({:?})",
        cells.len(),
        settings.processing_mode
    );
    dispatch(
        cells,
        settings.processing_mode,
        cancellation,
        on_cell_done,
        |cell| {
            let panel = panels.get(cell.latitude)?;
            simulate_cell(cell, panel, settings, pdf_store).inspect_err(|err| {
                debug!("Cell ({}, {}) failed: {err}", cell.latitude, cell.longitude)
            })
        },
    )
}

/// Everything read from disk for a run, ready for `run_project`.
#[derive(Debug)]
pub struct ProjectInputs {
    pub cells: Vec<GridCell>,
    pub settings: RunSettings,
    pub pdf_store: Option<GriddedPdfStore>,
}

pub fn load_project(
    climate_data: impl Read,
    run_config: impl Read,
    pdf_table: Option<impl Read>,
) -> anyhow::Result<ProjectInputs> {
    let settings = ingest_run_config(run_config)?.run_settings()?;
    let cells = climate_data_to_cells(climate_data)?;
    let pdf_store = pdf_table.map(pdf_table_to_store).transpose()?;
    if pdf_store.is_some() && settings.pdf_fallback.is_none() {
        info!("A PDF table was given but the run configuration does not enable PDFs");
    }
    Ok(ProjectInputs {
        cells,
        settings,
        pdf_store,
    })
}

#[derive(Debug, Default, PartialEq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Runs all cells and writes the period output, plus the hourly detail when
/// `hourly_detail` is set. Failed cells are logged and left out of the files.
pub fn run_project(
    inputs: &ProjectInputs,
    output: impl Output,
    hourly_detail: bool,
    cancellation: &CancellationToken,
    on_cell_done: Option<&(dyn Fn() + Sync)>,
) -> anyhow::Result<RunSummary> {
    let results = run_grid(
        &inputs.cells,
        &inputs.settings,
        inputs
            .pdf_store
            .as_ref()
            .map(|store| store as &dyn PdfStore),
        cancellation,
        on_cell_done,
    )?;

    let mut succeeded = vec![];
    for (cell, result) in inputs.cells.iter().zip(&results) {
        match result {
            Ok(cell_output) => succeeded.push(cell_output),
            Err(err) => error!("Cell ({}, {}): {err}", cell.latitude, cell.longitude),
        }
    }
    let summary = RunSummary {
        succeeded: succeeded.len(),
        failed: results.len() - succeeded.len(),
    };
    if succeeded.is_empty() && !results.is_empty() {
        return Err(anyhow!("All {} cells failed", results.len()));
    }

    if !output.is_noop() {
        write_period_output(output.writer_for_key("pv")?, &succeeded)?;
        if hourly_detail {
            write_hourly_output(output.writer_for_key("hourly")?, &succeeded)?;
        }
    }
    Ok(summary)
}
