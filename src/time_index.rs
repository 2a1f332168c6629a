use crate::core::units::{HOURS_PER_DAY, MINUTES_PER_HOUR};
use crate::errors::{PvSynthError, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use itertools::Itertools;
use serde::Deserialize;
use strum::{Display, EnumString};
use tracing::{debug, warn};

/// Temporal resolution of a series, coarsest first.
#[derive(Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Frequency {
    #[strum(to_string = "annual", serialize = "A")]
    Annual,
    #[strum(to_string = "seasonal", serialize = "S")]
    Seasonal,
    #[strum(to_string = "monthly", serialize = "M")]
    Monthly,
    #[strum(to_string = "daily", serialize = "D")]
    Daily,
    #[strum(to_string = "hourly", serialize = "H")]
    Hourly,
}

impl Frequency {
    pub fn supports_pdfs(self) -> bool {
        matches!(
            self,
            Frequency::Annual | Frequency::Seasonal | Frequency::Monthly
        )
    }

    /// Bounds, in days, of a spacing consistent with this frequency.
    fn spacing_days(self) -> (f64, f64) {
        match self {
            Frequency::Annual => (365., 366.),
            Frequency::Seasonal => (89., 92.),
            Frequency::Monthly => (28., 31.),
            Frequency::Daily => (1., 1.),
            Frequency::Hourly => (1. / 24., 1. / 24.),
        }
    }
}

/// Frequency as declared by the caller; `Detect` infers it from the timestamps.
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, EnumString, PartialEq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FrequencyTag {
    #[default]
    Detect,
    #[serde(alias = "A")]
    #[strum(to_string = "annual", serialize = "A")]
    Annual,
    #[serde(alias = "S")]
    #[strum(to_string = "seasonal", serialize = "S")]
    Seasonal,
    #[serde(alias = "M")]
    #[strum(to_string = "monthly", serialize = "M")]
    Monthly,
    #[serde(alias = "D")]
    #[strum(to_string = "daily", serialize = "D")]
    Daily,
    #[serde(alias = "H")]
    #[strum(to_string = "hourly", serialize = "H")]
    Hourly,
}

impl FrequencyTag {
    pub fn declared(self) -> Option<Frequency> {
        match self {
            FrequencyTag::Detect => None,
            FrequencyTag::Annual => Some(Frequency::Annual),
            FrequencyTag::Seasonal => Some(Frequency::Seasonal),
            FrequencyTag::Monthly => Some(Frequency::Monthly),
            FrequencyTag::Daily => Some(Frequency::Daily),
            FrequencyTag::Hourly => Some(Frequency::Hourly),
        }
    }
}

const SPACING_TOLERANCE_DAYS: f64 = 1. / (24. * 60.);

/// An ordered sequence of timestamps.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeIndex {
    timestamps: Vec<NaiveDateTime>,
}

impl TimeIndex {
    pub fn new(timestamps: Vec<NaiveDateTime>) -> Result<Self> {
        if let Some((earlier, later)) = timestamps
            .iter()
            .tuple_windows()
            .find(|(earlier, later)| later <= earlier)
        {
            return Err(PvSynthError::InvalidConfiguration(format!(
                "timestamps must be strictly increasing, found {later} after {earlier}"
            )));
        }
        Ok(Self { timestamps })
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Infers the frequency from the spacing of consecutive timestamps.
    ///
    /// Gaps of 89-92 days are read as seasonal, which cannot be told apart from
    /// irregular monthly data with missing months.
    pub fn detect_frequency(&self) -> Result<Frequency> {
        if self.timestamps.len() < 2 {
            return Err(PvSynthError::FrequencyDetection(
                "at least two timestamps are needed".into(),
            ));
        }
        let gaps = self
            .timestamps
            .iter()
            .tuple_windows()
            .map(|(earlier, later)| (*later - *earlier).num_seconds() as f64 / 86_400.)
            .collect::<Vec<f64>>();

        [
            Frequency::Hourly,
            Frequency::Daily,
            Frequency::Monthly,
            Frequency::Seasonal,
            Frequency::Annual,
        ]
        .into_iter()
        .find(|frequency| {
            let (lower, upper) = frequency.spacing_days();
            gaps.iter().all(|gap| {
                *gap >= lower - SPACING_TOLERANCE_DAYS && *gap <= upper + SPACING_TOLERANCE_DAYS
            })
        })
        .ok_or_else(|| {
            PvSynthError::FrequencyDetection(format!(
                "irregular spacing between {} and {} days",
                gaps.iter().copied().fold(f64::INFINITY, f64::min),
                gaps.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            ))
        })
    }

    /// Resolves a declared or detected frequency.
    pub fn resolve_frequency(&self, tag: FrequencyTag) -> Result<Frequency> {
        let detected = self.detect_frequency();
        match (tag.declared(), detected) {
            (None, detected) => {
                let frequency = detected?;
                debug!("Detected frequency: {frequency}");
                Ok(frequency)
            }
            (Some(declared), Ok(detected)) => {
                if declared != detected {
                    warn!(
                        "Declared frequency {declared} does not match detected frequency {detected}, using {declared}"
                    );
                }
                Ok(declared)
            }
            (Some(declared), Err(err)) => {
                debug!("Frequency detection failed ({err}), using declared frequency {declared}");
                Ok(declared)
            }
        }
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match (first_of_next, NaiveDate::from_ymd_opt(year, month, 1)) {
        (Some(next), Some(first)) => (next - first).num_days() as u32,
        _ => 30,
    }
}

pub fn day_of_year(timestamp: &NaiveDateTime) -> u32 {
    timestamp.ordinal()
}

/// Hour of the day including minutes, e.g. 13.5 for 13:30.
pub fn decimal_hour(timestamp: &NaiveDateTime) -> f64 {
    timestamp.hour() as f64
        + (timestamp.minute() as f64 + timestamp.second() as f64 / 60.) / MINUTES_PER_HOUR as f64
}

pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// The 24 hour-beginning timestamps of a day.
pub fn hours_of_day(date: NaiveDate) -> impl Iterator<Item = NaiveDateTime> {
    let start = start_of_day(date);
    (0..HOURS_PER_DAY as i64).map(move |hour| start + Duration::hours(hour))
}

/// Moves a period timestamp to the canonical position for its frequency:
/// annual periods to 1 January, seasonal and monthly periods to the middle
/// of the month, daily periods to midnight.
pub fn normalise_period_timestamp(
    timestamp: &NaiveDateTime,
    frequency: Frequency,
) -> NaiveDateTime {
    let date = match frequency {
        Frequency::Annual => NaiveDate::from_ymd_opt(timestamp.year(), 1, 1),
        Frequency::Seasonal | Frequency::Monthly => NaiveDate::from_ymd_opt(
            timestamp.year(),
            timestamp.month(),
            days_in_month(timestamp.year(), timestamp.month()) / 2,
        ),
        Frequency::Daily => Some(timestamp.date()),
        Frequency::Hourly => return *timestamp,
    };
    date.map(start_of_day).unwrap_or(*timestamp)
}

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parses ISO-like timestamps, plain dates and CMIP5-style `%Y%m%d.%f` day fractions.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(timestamp);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(start_of_day(date));
    }
    parse_cmip5_timestamp(raw)
}

fn parse_cmip5_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let unparseable = || PvSynthError::UnparseableTimestamp(raw.to_string());
    let (day_part, fraction_part) = raw.split_once('.').unwrap_or((raw, "0"));
    if day_part.len() != 8 {
        return Err(unparseable());
    }
    let date = NaiveDate::parse_from_str(day_part, "%Y%m%d").map_err(|_| unparseable())?;
    let fraction: f64 = format!("0.{fraction_part}")
        .parse()
        .map_err(|_| unparseable())?;
    let hour = (HOURS_PER_DAY as f64 * fraction) as i64;
    Ok(start_of_day(date) + Duration::hours(hour))
}
