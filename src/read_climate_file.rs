use crate::core::upsampling::pdf::{GriddedPdfStore, PdfRecord};
use crate::GridCell;
use anyhow::Context;
use csv::ReaderBuilder as CsvReaderBuilder;
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::Deserialize;
use std::io::Read;
use tracing::debug;

/// One row of a long-format climate table: a value per cell and timestamp.
/// Missing values may be left empty.
#[derive(Debug, Deserialize)]
struct ClimateRecord {
    #[serde(alias = "latitude")]
    lat: f64,
    #[serde(alias = "longitude")]
    lon: f64,
    #[serde(alias = "timestamp")]
    time: String,
    #[serde(alias = "ghi")]
    global_horizontal: Option<f64>,
    #[serde(default)]
    diffuse_fraction: Option<f64>,
    #[serde(default)]
    temperature: Option<f64>,
}

/// Reads a CSV with columns `lat`, `lon`, `time`, `global_horizontal` and
/// optionally `diffuse_fraction` and `temperature`, grouping rows by cell in
/// order of first appearance.
///
/// Timestamps are kept as text so that a bad timestamp only fails its cell.
pub fn climate_data_to_cells(file: impl Read) -> anyhow::Result<Vec<GridCell>> {
    let mut reader = CsvReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let mut grouped: IndexMap<(OrderedFloat<f64>, OrderedFloat<f64>), Vec<ClimateRecord>> =
        IndexMap::new();
    for (row, result) in reader.deserialize().enumerate() {
        let record: ClimateRecord =
            result.with_context(|| format!("Could not read climate data row {}", row + 1))?;
        grouped
            .entry((OrderedFloat(record.lat), OrderedFloat(record.lon)))
            .or_default()
            .push(record);
    }

    let cells: Vec<GridCell> = grouped
        .into_iter()
        .map(|((latitude, longitude), records)| {
            let companion = |value: fn(&ClimateRecord) -> Option<f64>| {
                records
                    .iter()
                    .any(|record| value(record).is_some())
                    .then(|| {
                        records
                            .iter()
                            .map(|record| value(record).unwrap_or(f64::NAN))
                            .collect::<Vec<f64>>()
                    })
            };
            GridCell {
                latitude: latitude.0,
                longitude: longitude.0,
                diffuse_fraction: companion(|record| record.diffuse_fraction),
                temperature: companion(|record| record.temperature),
                global_horizontal: records
                    .iter()
                    .map(|record| record.global_horizontal.unwrap_or(f64::NAN))
                    .collect(),
                timestamps: records.into_iter().map(|record| record.time).collect(),
            }
        })
        .collect();

    debug!("Read climate data for {} cells", cells.len());
    Ok(cells)
}

/// Reads a long-format PDF table with columns `lat`, `lon`, `month`, `bin`,
/// `xk` and `pk`.
pub fn pdf_table_to_store(file: impl Read) -> anyhow::Result<GriddedPdfStore> {
    let mut reader = CsvReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    let records = reader
        .deserialize()
        .collect::<Result<Vec<PdfRecord>, _>>()
        .context("Could not read PDF table")?;
    Ok(GriddedPdfStore::from_records(records)?)
}
