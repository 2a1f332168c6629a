//! Expands annual, seasonal, monthly or daily irradiance means into an hourly
//! series, through representative days and the half-sine diurnal profile.
//!
//! Without PDFs each period gets one representative day at its own mean (two
//! for annual periods, at the end of March and of September). With PDFs every
//! calendar day of the period's representative month(s) is drawn from the
//! cell's distribution of daily irradiation and the draws are rescaled so their
//! mean matches the period mean.

use crate::core::solar::diffuse_fraction::{split_global, DiffuseFractionEstimator};
use crate::core::solar::sun_geometry::Location;
use crate::core::units::{
    kelvin_to_celsius, mean_irradiance_to_daily_total, HOURS_PER_DAY, KELVIN_DETECTION_THRESHOLD,
};
use crate::core::upsampling::diurnal::SyntheticDay;
use crate::core::upsampling::pdf::{MonthlyPdf, PdfStore};
use crate::errors::{PvSynthError, Result};
use crate::statistics::mean;
use crate::time_index::{
    days_in_month, hours_of_day, normalise_period_timestamp, Frequency, FrequencyTag, TimeIndex,
};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use itertools::repeat_n;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Fractional part of the golden ratio, stepping quantiles evenly over (0, 1)
const GOLDEN_RATIO_CONJUGATE: f64 = 0.618_033_988_749_894_8;

/// Months standing in for a whole year when drawing from PDFs
const ANNUAL_REPRESENTATIVE_MONTHS: [u32; 2] = [3, 9];

/// Horizontal irradiance means (W/m2) at some resolution, with optional
/// diffuse fraction and air temperature companions.
#[derive(Clone, Debug)]
pub struct IrradianceSeries {
    index: TimeIndex,
    global_horizontal: Vec<f64>,
    diffuse_fraction: Option<Vec<f64>>,
    temperature: Option<Vec<f64>>,
}

impl IrradianceSeries {
    /// Missing values may be given as NaN; negative irradiance is rejected.
    pub fn new(timestamps: Vec<NaiveDateTime>, global_horizontal: Vec<f64>) -> Result<Self> {
        if timestamps.len() != global_horizontal.len() {
            return Err(PvSynthError::InvalidConfiguration(format!(
                "{} timestamps but {} irradiance values",
                timestamps.len(),
                global_horizontal.len()
            )));
        }
        if let Some(negative) = global_horizontal.iter().find(|value| **value < 0.) {
            return Err(PvSynthError::InvalidConfiguration(format!(
                "irradiance must not be negative, got {negative}"
            )));
        }
        Ok(Self {
            index: TimeIndex::new(timestamps)?,
            global_horizontal,
            diffuse_fraction: None,
            temperature: None,
        })
    }

    pub fn with_diffuse_fraction(mut self, diffuse_fraction: Vec<f64>) -> Result<Self> {
        self.check_companion_length("diffuse fraction", diffuse_fraction.len())?;
        if let Some(invalid) = diffuse_fraction
            .iter()
            .find(|value| !value.is_nan() && !(0. ..=1.).contains(*value))
        {
            return Err(PvSynthError::InvalidConfiguration(format!(
                "diffuse fraction must be between 0 and 1, got {invalid}"
            )));
        }
        self.diffuse_fraction = Some(diffuse_fraction);
        Ok(self)
    }

    /// Air temperature in Celsius, or in Kelvin if the series mean is
    /// implausibly high for Celsius.
    pub fn with_temperature(mut self, temperature: Vec<f64>) -> Result<Self> {
        self.check_companion_length("temperature", temperature.len())?;
        let defined = temperature
            .iter()
            .copied()
            .filter(|value| !value.is_nan())
            .collect::<Vec<_>>();
        let temperature = if mean(&defined) > KELVIN_DETECTION_THRESHOLD {
            info!("Temperature series looks like Kelvin, converting to Celsius");
            temperature
                .into_iter()
                .map(|value| {
                    if value.is_nan() {
                        Ok(value)
                    } else {
                        kelvin_to_celsius(value)
                    }
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            temperature
        };
        self.temperature = Some(temperature);
        Ok(self)
    }

    fn check_companion_length(&self, name: &str, len: usize) -> Result<()> {
        if len != self.len() {
            return Err(PvSynthError::InvalidConfiguration(format!(
                "{name} series has {len} values but irradiance has {}",
                self.len()
            )));
        }
        Ok(())
    }

    pub fn index(&self) -> &TimeIndex {
        &self.index
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        self.index.timestamps()
    }

    pub fn global_horizontal(&self) -> &[f64] {
        &self.global_horizontal
    }

    pub fn diffuse_fraction(&self) -> Option<&[f64]> {
        self.diffuse_fraction.as_deref()
    }

    pub fn temperature(&self) -> Option<&[f64]> {
        self.temperature.as_deref()
    }

    pub fn len(&self) -> usize {
        self.global_horizontal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.global_horizontal.is_empty()
    }
}

/// Hourly horizontal irradiance, with the input period each hour came from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HourlySeries {
    pub timestamps: Vec<NaiveDateTime>,
    pub global_horizontal: Vec<f64>,
    pub diffuse_fraction: Option<Vec<f64>>,
    pub temperature: Option<Vec<f64>>,
    /// Index into the input series for every hour
    pub period: Vec<usize>,
    pub source_frequency: Option<Frequency>,
}

impl HourlySeries {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// (direct, diffuse) horizontal irradiance per hour, from the supplied
    /// diffuse fraction where there is one, otherwise from the BRL model.
    pub fn horizontal_components(&self, location: &Location) -> Vec<(f64, f64)> {
        match &self.diffuse_fraction {
            Some(diffuse_fraction) if diffuse_fraction.iter().all(|value| !value.is_nan()) => self
                .global_horizontal
                .iter()
                .zip(diffuse_fraction)
                .map(|(ghi, fraction)| split_global(*ghi, *fraction))
                .collect(),
            supplied => {
                let estimated = DiffuseFractionEstimator::new(*location)
                    .split(&self.timestamps, &self.global_horizontal);
                match supplied {
                    // estimate only the gaps in a partially supplied fraction
                    Some(diffuse_fraction) => estimated
                        .into_iter()
                        .zip(diffuse_fraction)
                        .zip(&self.global_horizontal)
                        .map(|((estimate, fraction), ghi)| {
                            if fraction.is_nan() {
                                estimate
                            } else {
                                split_global(*ghi, *fraction)
                            }
                        })
                        .collect(),
                    None => estimated,
                }
            }
        }
    }

    fn push_day(&mut self, day: &SyntheticDay, period: usize, series: &IrradianceSeries) {
        let hourly = if day.daily_total.is_nan() {
            [f64::NAN; HOURS_PER_DAY as usize]
        } else {
            day.hourly()
        };
        self.timestamps.extend(hours_of_day(day.date));
        self.global_horizontal.extend(hourly);
        self.period
            .extend(repeat_n(period, HOURS_PER_DAY as usize));
        if let (Some(target), Some(source)) =
            (self.diffuse_fraction.as_mut(), series.diffuse_fraction())
        {
            target.extend(repeat_n(source[period], HOURS_PER_DAY as usize));
        }
        if let (Some(target), Some(source)) = (self.temperature.as_mut(), series.temperature()) {
            target.extend(repeat_n(source[period], HOURS_PER_DAY as usize));
        }
    }
}

/// What to do when a cell has no usable PDF for a month.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PdfFallback {
    /// Use the period mean as a single representative day
    #[default]
    MeanDay,
    Fail,
}

#[derive(Clone, Copy)]
pub struct PdfOptions<'a> {
    pub store: &'a dyn PdfStore,
    pub fallback: PdfFallback,
}

/// Expand `series` to hourly resolution for `location`.
///
/// `frequency` is either declared or detected from the timestamps. PDFs are
/// drawn from when `pdfs` is given, which is only possible for annual,
/// seasonal and monthly data. Hourly input is passed through unchanged.
pub fn synthesize_hourly(
    series: &IrradianceSeries,
    location: &Location,
    frequency: FrequencyTag,
    pdfs: Option<&PdfOptions>,
) -> Result<HourlySeries> {
    let frequency = series.index().resolve_frequency(frequency)?;
    if pdfs.is_some() && !frequency.supports_pdfs() {
        return Err(PvSynthError::PdfsNotSupported(frequency));
    }

    if frequency == Frequency::Hourly {
        return Ok(HourlySeries {
            timestamps: series.timestamps().to_vec(),
            global_horizontal: series.global_horizontal().to_vec(),
            diffuse_fraction: series.diffuse_fraction().map(<[f64]>::to_vec),
            temperature: series.temperature().map(<[f64]>::to_vec),
            period: (0..series.len()).collect(),
            source_frequency: Some(frequency),
        });
    }

    let mut hourly = HourlySeries {
        diffuse_fraction: series.diffuse_fraction().map(|_| vec![]),
        temperature: series.temperature().map(|_| vec![]),
        source_frequency: Some(frequency),
        ..Default::default()
    };

    for (period, (timestamp, mean_irradiance)) in series
        .timestamps()
        .iter()
        .zip(series.global_horizontal())
        .enumerate()
    {
        let days = match pdfs {
            Some(pdfs) => {
                pdf_days(location, timestamp, *mean_irradiance, frequency, pdfs)?
            }
            None => mean_days(location, timestamp, *mean_irradiance, frequency),
        };
        for day in &days {
            hourly.push_day(day, period, series);
        }
    }

    debug!(
        "Synthesised {} hours from {} {frequency} values",
        hourly.len(),
        series.len()
    );
    Ok(hourly)
}

/// Representative days carrying the period mean.
fn mean_days(
    location: &Location,
    timestamp: &NaiveDateTime,
    mean_irradiance: f64,
    frequency: Frequency,
) -> Vec<SyntheticDay> {
    let daily_total = mean_irradiance_to_daily_total(mean_irradiance);
    let year = timestamp.year();
    let dates = match frequency {
        Frequency::Annual => [(3, 31), (9, 30)]
            .into_iter()
            .filter_map(|(month, day)| NaiveDate::from_ymd_opt(year, month, day))
            .collect(),
        _ => vec![normalise_period_timestamp(timestamp, frequency).date()],
    };
    dates
        .into_iter()
        .map(|date| SyntheticDay::new(location, date, daily_total))
        .collect()
}

/// Months whose distributions represent the period.
fn representative_months(timestamp: &NaiveDateTime, frequency: Frequency) -> Vec<u32> {
    match frequency {
        Frequency::Annual => ANNUAL_REPRESENTATIVE_MONTHS.to_vec(),
        _ => vec![timestamp.month()],
    }
}

/// Daily values spread deterministically over the distribution.
fn draw_days(pdf: &MonthlyPdf, count: u32) -> impl Iterator<Item = f64> + '_ {
    (0..count).map(|day| pdf.quantile((0.5 + day as f64 * GOLDEN_RATIO_CONJUGATE).fract()))
}

/// One day per calendar day of the representative months, drawn from the
/// PDFs and rescaled to the period mean.
fn pdf_days(
    location: &Location,
    timestamp: &NaiveDateTime,
    mean_irradiance: f64,
    frequency: Frequency,
    pdfs: &PdfOptions,
) -> Result<Vec<SyntheticDay>> {
    let year = timestamp.year();
    let mut draws: Vec<(NaiveDate, f64)> = vec![];

    for month in representative_months(timestamp, frequency) {
        let pdf = match pdfs
            .store
            .lookup(location.latitude, location.longitude, month)
        {
            Ok(pdf) => pdf,
            Err(err) if err.is_recoverable() && pdfs.fallback == PdfFallback::MeanDay => {
                warn!("{err}, using the period mean instead");
                return Ok(mean_days(location, timestamp, mean_irradiance, frequency));
            }
            Err(err) => return Err(err),
        };
        draws.extend(
            (1..=days_in_month(year, month))
                .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
                .zip(draw_days(pdf, days_in_month(year, month))),
        );
    }

    let draw_mean = mean(&draws.iter().map(|(_, value)| *value).collect::<Vec<_>>());
    let period_total = mean_irradiance_to_daily_total(mean_irradiance);

    Ok(draws
        .into_iter()
        .map(|(date, value)| {
            let daily_total = if draw_mean > 0. {
                value * period_total / draw_mean
            } else {
                period_total
            };
            SyntheticDay::new(location, date, daily_total)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::upsampling::pdf::{GriddedPdfStore, PdfRecord};
    use crate::time_index::parse_timestamp;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn timestamps(raw: &[&str]) -> Vec<NaiveDateTime> {
        raw.iter().map(|r| parse_timestamp(r).unwrap()).collect()
    }

    #[fixture]
    fn location() -> Location {
        Location::new(45., 7.).unwrap()
    }

    #[fixture]
    fn monthly() -> IrradianceSeries {
        IrradianceSeries::new(
            timestamps(&["2015-06-01", "2015-07-01", "2015-08-01"]),
            vec![250., 200., 180.],
        )
        .unwrap()
    }

    #[fixture]
    fn store() -> GriddedPdfStore {
        let records = (1..=12)
            .flat_map(|month| {
                (0..4).map(move |bin| PdfRecord {
                    lat: 45.,
                    lon: 7.,
                    month,
                    bin,
                    xk: 1. + bin as f64,
                    pk: 0.25,
                })
            })
            .collect::<Vec<_>>();
        GriddedPdfStore::from_records(records).unwrap()
    }

    #[rstest]
    fn test_monthly_without_pdfs_gives_one_day_per_month(
        monthly: IrradianceSeries,
        location: Location,
    ) {
        let hourly =
            synthesize_hourly(&monthly, &location, FrequencyTag::Monthly, None).unwrap();
        assert_eq!(hourly.len(), 3 * 24);
        assert_eq!(hourly.timestamps[24], parse_timestamp("2015-07-15").unwrap());
        assert_eq!(hourly.period[30], 1);
        let july: f64 = hourly.global_horizontal[24..48].iter().sum();
        assert_relative_eq!(july, 200. * 24., max_relative = 1e-12);
    }

    #[rstest]
    fn test_annual_without_pdfs_gives_spring_and_autumn_days(location: Location) {
        let series = IrradianceSeries::new(
            timestamps(&["2010-01-01", "2011-01-01"]),
            vec![150., 160.],
        )
        .unwrap();
        let hourly = synthesize_hourly(&series, &location, FrequencyTag::Detect, None).unwrap();
        assert_eq!(hourly.len(), 4 * 24);
        assert_eq!(hourly.timestamps[0], parse_timestamp("2010-03-31").unwrap());
        assert_eq!(hourly.timestamps[24], parse_timestamp("2010-09-30").unwrap());
        assert_eq!(hourly.period[3 * 24], 1);
        let spring: f64 = hourly.global_horizontal[0..24].iter().sum();
        assert_relative_eq!(spring, 150. * 24., max_relative = 1e-12);
    }

    #[fixture]
    fn seasonal() -> IrradianceSeries {
        IrradianceSeries::new(
            timestamps(&["2015-01-01", "2015-04-01", "2015-07-01", "2015-10-01"]),
            vec![60., 180., 240., 110.],
        )
        .unwrap()
    }

    #[rstest]
    fn test_seasonal_without_pdfs_gives_mid_month_days(
        seasonal: IrradianceSeries,
        location: Location,
    ) {
        let hourly = synthesize_hourly(&seasonal, &location, FrequencyTag::Seasonal, None).unwrap();
        assert_eq!(hourly.source_frequency, Some(Frequency::Seasonal));
        assert_eq!(hourly.len(), 4 * 24);
        assert_eq!(hourly.timestamps[0], parse_timestamp("2015-01-15").unwrap());
        assert_eq!(
            hourly.timestamps[2 * 24],
            parse_timestamp("2015-07-15").unwrap()
        );
        for (period, mean_irradiance) in seasonal.global_horizontal().iter().enumerate() {
            let hours = period * 24..(period + 1) * 24;
            assert_relative_eq!(
                hourly.global_horizontal[hours.clone()].iter().sum::<f64>(),
                mean_irradiance * 24.,
                max_relative = 1e-12
            );
            assert!(hourly.period[hours].iter().all(|index| *index == period));
        }
    }

    #[rstest]
    fn test_seasonal_with_pdfs_draws_the_period_month(
        seasonal: IrradianceSeries,
        location: Location,
        store: GriddedPdfStore,
    ) {
        let options = PdfOptions {
            store: &store,
            fallback: PdfFallback::Fail,
        };
        let hourly =
            synthesize_hourly(&seasonal, &location, FrequencyTag::Seasonal, Some(&options))
                .unwrap();
        assert_eq!(hourly.len(), (31 + 30 + 31 + 31) * 24);
        assert_eq!(
            hourly.timestamps[31 * 24],
            parse_timestamp("2015-04-01").unwrap()
        );
        assert_eq!(
            hourly.timestamps[(31 + 30) * 24],
            parse_timestamp("2015-07-01").unwrap()
        );
        let april = &hourly.global_horizontal[31 * 24..61 * 24];
        assert_relative_eq!(
            april.iter().sum::<f64>() / 30.,
            180. * 24.,
            max_relative = 1e-9
        );
        assert!(hourly.period[31 * 24..61 * 24].iter().all(|index| *index == 1));
    }

    #[rstest]
    fn test_daily_and_hourly_reject_pdfs(location: Location, store: GriddedPdfStore) {
        let daily = IrradianceSeries::new(
            timestamps(&["2015-06-01", "2015-06-02"]),
            vec![250., 200.],
        )
        .unwrap();
        let options = PdfOptions {
            store: &store,
            fallback: PdfFallback::MeanDay,
        };
        assert!(matches!(
            synthesize_hourly(&daily, &location, FrequencyTag::Detect, Some(&options)),
            Err(PvSynthError::PdfsNotSupported(Frequency::Daily))
        ));
    }

    #[rstest]
    fn test_hourly_input_passes_through(location: Location) {
        let series = IrradianceSeries::new(
            timestamps(&["2015-06-01 10:00", "2015-06-01 11:00", "2015-06-01 12:00"]),
            vec![400., 500., 550.],
        )
        .unwrap();
        let hourly = synthesize_hourly(&series, &location, FrequencyTag::Detect, None).unwrap();
        assert_eq!(hourly.global_horizontal, vec![400., 500., 550.]);
        assert_eq!(hourly.period, vec![0, 1, 2]);
    }

    #[rstest]
    fn test_monthly_with_pdfs_draws_every_day_and_keeps_mean(
        monthly: IrradianceSeries,
        location: Location,
        store: GriddedPdfStore,
    ) {
        let options = PdfOptions {
            store: &store,
            fallback: PdfFallback::Fail,
        };
        let hourly =
            synthesize_hourly(&monthly, &location, FrequencyTag::Monthly, Some(&options))
                .unwrap();
        assert_eq!(hourly.len(), (30 + 31 + 31) * 24);

        let july = &hourly.global_horizontal[30 * 24..61 * 24];
        assert_relative_eq!(
            july.iter().sum::<f64>() / 31.,
            200. * 24.,
            max_relative = 1e-9
        );
        let daily_totals = july
            .chunks(24)
            .map(|day| day.iter().sum::<f64>())
            .collect::<Vec<_>>();
        assert!(daily_totals.windows(2).any(|pair| (pair[0] - pair[1]).abs() > 1.));
    }

    #[rstest]
    fn test_annual_with_pdfs_uses_march_and_september(location: Location, store: GriddedPdfStore) {
        let series = IrradianceSeries::new(timestamps(&["2015-01-01"]), vec![150.]).unwrap();
        let options = PdfOptions {
            store: &store,
            fallback: PdfFallback::Fail,
        };
        let hourly =
            synthesize_hourly(&series, &location, FrequencyTag::Annual, Some(&options)).unwrap();
        assert_eq!(hourly.len(), (31 + 30) * 24);
        assert_eq!(hourly.timestamps[0], parse_timestamp("2015-03-01").unwrap());
        assert_eq!(
            hourly.timestamps[31 * 24],
            parse_timestamp("2015-09-01").unwrap()
        );
    }

    #[rstest]
    fn test_missing_pdf_falls_back_or_fails(monthly: IrradianceSeries, store: GriddedPdfStore) {
        let elsewhere = Location::new(-30., 120.).unwrap();
        let fallback = PdfOptions {
            store: &store,
            fallback: PdfFallback::MeanDay,
        };
        let hourly =
            synthesize_hourly(&monthly, &elsewhere, FrequencyTag::Monthly, Some(&fallback))
                .unwrap();
        assert_eq!(hourly.len(), 3 * 24);

        let strict = PdfOptions {
            fallback: PdfFallback::Fail,
            ..fallback
        };
        assert!(matches!(
            synthesize_hourly(&monthly, &elsewhere, FrequencyTag::Monthly, Some(&strict)),
            Err(PvSynthError::MissingPdf { month: 6, .. })
        ));
    }

    #[rstest]
    fn test_companions_are_broadcast(monthly: IrradianceSeries, location: Location) {
        let series = monthly
            .with_diffuse_fraction(vec![0.3, 0.4, 0.5])
            .unwrap()
            .with_temperature(vec![290., 295., 293.])
            .unwrap();
        let hourly = synthesize_hourly(&series, &location, FrequencyTag::Monthly, None).unwrap();
        let diffuse_fraction = hourly.diffuse_fraction.as_ref().unwrap();
        assert_eq!(diffuse_fraction[30], 0.4);
        let temperature = hourly.temperature.as_ref().unwrap();
        assert_relative_eq!(temperature[50], 19.85, epsilon = 1e-9);

        let components = hourly.horizontal_components(&location);
        let (direct, diffuse) = components[36];
        assert_relative_eq!(diffuse, 0.4 * hourly.global_horizontal[36], epsilon = 1e-9);
        assert_relative_eq!(direct + diffuse, hourly.global_horizontal[36], epsilon = 1e-9);
    }

    #[rstest]
    fn test_celsius_temperature_is_kept(monthly: IrradianceSeries) {
        let series = monthly.with_temperature(vec![18., 22., 21.]).unwrap();
        assert_eq!(series.temperature().unwrap(), &[18., 22., 21.]);
    }

    #[rstest]
    fn test_invalid_series() {
        assert!(IrradianceSeries::new(timestamps(&["2015-01-01"]), vec![-1.]).is_err());
        assert!(IrradianceSeries::new(timestamps(&["2015-01-01"]), vec![]).is_err());
    }

    #[rstest]
    fn test_missing_value_stays_missing(location: Location) {
        let series = IrradianceSeries::new(
            timestamps(&["2015-06-01", "2015-06-02"]),
            vec![f64::NAN, 200.],
        )
        .unwrap();
        let hourly = synthesize_hourly(&series, &location, FrequencyTag::Daily, None).unwrap();
        assert!(hourly.global_horizontal[..24].iter().all(|value| value.is_nan()));
        assert!(hourly.global_horizontal[24..].iter().all(|value| !value.is_nan()));
    }
}
