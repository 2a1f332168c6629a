//! Empirical distributions of daily irradiation per grid cell and month, and
//! the stores that look them up by location.

use crate::core::units::MONTHS_PER_YEAR;
use crate::errors::{PvSynthError, Result};
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::Deserialize;
use tracing::debug;

/// Number of bins in each monthly distribution
pub const PDF_BINS: usize = 128;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PdfBin {
    /// Daily irradiation of the bin, in the units of the series mean
    pub value: f64,
    pub probability: f64,
}

/// Distribution of daily irradiation for one month.
#[derive(Clone, Debug, PartialEq)]
pub struct MonthlyPdf {
    bins: Vec<PdfBin>,
    cumulative: Vec<f64>,
}

impl MonthlyPdf {
    /// Probabilities are normalised to sum to 1. None when they are all zero
    /// or any is negative or not a number.
    pub fn new(bins: Vec<PdfBin>) -> Option<Self> {
        if bins
            .iter()
            .any(|bin| bin.probability.is_nan() || bin.probability < 0. || bin.value.is_nan())
        {
            return None;
        }
        let total: f64 = bins.iter().map(|bin| bin.probability).sum();
        if total <= 0. {
            return None;
        }

        let cumulative = bins
            .iter()
            .scan(0., |running, bin| {
                *running += bin.probability / total;
                Some(*running)
            })
            .collect();
        Some(Self { bins, cumulative })
    }

    pub fn bins(&self) -> &[PdfBin] {
        &self.bins
    }

    /// Value of the first bin whose cumulative probability reaches `quantile`.
    pub fn quantile(&self, quantile: f64) -> f64 {
        let index = self
            .cumulative
            .partition_point(|cumulative| *cumulative < quantile)
            .min(self.bins.len() - 1);
        self.bins[index].value
    }

    pub fn mean(&self) -> f64 {
        let total: f64 = self.bins.iter().map(|bin| bin.probability).sum();
        self.bins
            .iter()
            .map(|bin| bin.value * bin.probability / total)
            .sum()
    }
}

/// Supplies monthly distributions by location. Shared read-only by all workers.
pub trait PdfStore: Sync {
    /// Fails with `MissingPdf` when no grid cell covers the coordinate or the
    /// cell has no usable distribution for the month (1 to 12).
    fn lookup(&self, latitude: f64, longitude: f64, month: u32) -> Result<&MonthlyPdf>;
}

/// One row of a long-format PDF table.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct PdfRecord {
    #[serde(alias = "latitude")]
    pub lat: f64,
    #[serde(alias = "longitude")]
    pub lon: f64,
    pub month: u32,
    pub bin: usize,
    pub xk: f64,
    pub pk: f64,
}

type CellKey = (OrderedFloat<f64>, OrderedFloat<f64>);

#[derive(Debug)]
struct PdfCell {
    latitude: f64,
    longitude: f64,
    months: Vec<Option<MonthlyPdf>>,
}

/// Cell widths of a regular grid, in degrees
#[derive(Clone, Copy, Debug, PartialEq)]
struct GridSpacing {
    latitude: f64,
    longitude: f64,
}

/// In-memory store for a regular grid of cells. A coordinate is served by the
/// nearest cell centre if it lies within half a cell width of it on each axis.
#[derive(Debug)]
pub struct GriddedPdfStore {
    cells: Vec<PdfCell>,
    spacing: GridSpacing,
}

impl GriddedPdfStore {
    pub fn from_records(records: impl IntoIterator<Item = PdfRecord>) -> Result<Self> {
        let mut grouped: IndexMap<CellKey, Vec<Vec<PdfBin>>> = IndexMap::new();
        for record in records {
            if !(1..=MONTHS_PER_YEAR).contains(&record.month) {
                return Err(PvSynthError::InvalidConfiguration(format!(
                    "PDF month must be 1 to 12, got {}",
                    record.month
                )));
            }
            let months = grouped
                .entry((OrderedFloat(record.lat), OrderedFloat(record.lon)))
                .or_insert_with(|| vec![vec![]; MONTHS_PER_YEAR as usize]);
            let bins = &mut months[record.month as usize - 1];
            if bins.len() <= record.bin {
                bins.resize(
                    record.bin + 1,
                    PdfBin {
                        value: 0.,
                        probability: 0.,
                    },
                );
            }
            bins[record.bin] = PdfBin {
                value: record.xk,
                probability: record.pk,
            };
        }

        let cells: Vec<PdfCell> = grouped
            .into_iter()
            .map(|((latitude, longitude), months)| PdfCell {
                latitude: latitude.0,
                longitude: longitude.0,
                months: months
                    .into_iter()
                    .map(|bins| {
                        if !bins.is_empty() && bins.len() != PDF_BINS {
                            debug!(
                                "PDF for cell ({}, {}) has {} bins rather than {PDF_BINS}",
                                latitude.0,
                                longitude.0,
                                bins.len()
                            );
                        }
                        MonthlyPdf::new(bins)
                    })
                    .collect(),
            })
            .collect();

        let spacing = grid_spacing(&cells);
        debug!(
            "Loaded PDFs for {} grid cells with spacing {} x {}",
            cells.len(),
            spacing.latitude,
            spacing.longitude
        );
        Ok(Self { cells, spacing })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn nearest_cell(&self, latitude: f64, longitude: f64) -> Option<&PdfCell> {
        let half_latitude = self.spacing.latitude / 2. + 1e-9;
        let half_longitude = self.spacing.longitude / 2. + 1e-9;
        self.cells
            .iter()
            .map(|cell| {
                let latitude_offset = (cell.latitude - latitude).abs();
                let longitude_offset = longitude_difference(cell.longitude, longitude);
                (cell, latitude_offset, longitude_offset)
            })
            .filter(|(_, latitude_offset, longitude_offset)| {
                *latitude_offset <= half_latitude && *longitude_offset <= half_longitude
            })
            .min_by(|(_, a_lat, a_lon), (_, b_lat, b_lon)| {
                a_lat.hypot(*a_lon).total_cmp(&b_lat.hypot(*b_lon))
            })
            .map(|(cell, _, _)| cell)
    }
}

impl PdfStore for GriddedPdfStore {
    fn lookup(&self, latitude: f64, longitude: f64, month: u32) -> Result<&MonthlyPdf> {
        let missing = || PvSynthError::MissingPdf {
            latitude,
            longitude,
            month,
        };
        let cell = self.nearest_cell(latitude, longitude).ok_or_else(missing)?;
        month
            .checked_sub(1)
            .and_then(|index| cell.months.get(index as usize))
            .and_then(Option::as_ref)
            .ok_or_else(missing)
    }
}

/// Smallest positive separation between distinct cell latitudes, and between
/// distinct longitudes. An axis with a single value takes the other axis's
/// spacing; 1 degree for a single cell.
fn grid_spacing(cells: &[PdfCell]) -> GridSpacing {
    let smallest_gap = |mut coordinates: Vec<f64>| {
        coordinates.sort_by(f64::total_cmp);
        coordinates.dedup();
        coordinates
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .fold(f64::INFINITY, f64::min)
    };
    let latitude = smallest_gap(cells.iter().map(|cell| cell.latitude).collect());
    let longitude = smallest_gap(cells.iter().map(|cell| cell.longitude).collect());
    match (latitude.is_finite(), longitude.is_finite()) {
        (true, true) => GridSpacing {
            latitude,
            longitude,
        },
        (true, false) => GridSpacing {
            latitude,
            longitude: latitude,
        },
        (false, true) => GridSpacing {
            latitude: longitude,
            longitude,
        },
        (false, false) => GridSpacing {
            latitude: 1.,
            longitude: 1.,
        },
    }
}

fn longitude_difference(first: f64, second: f64) -> f64 {
    let difference = (first - second).rem_euclid(360.);
    difference.min(360. - difference)
}
