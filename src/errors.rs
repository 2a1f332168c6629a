use crate::time_index::Frequency;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum PvSynthError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("No PDF bins available for lat {latitude}, lon {longitude}, month {month}")]
    MissingPdf {
        latitude: f64,
        longitude: f64,
        month: u32,
    },
    #[error("Could not parse timestamp '{0}' (non-standard calendars are not supported)")]
    UnparseableTimestamp(String),
    #[error("Could not determine the frequency of the time series: {0}")]
    FrequencyDetection(String),
    #[error("PDFs can only be used with annual, seasonal or monthly data, not {0}")]
    PdfsNotSupported(Frequency),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("A temperature of {kelvin}ºK was encountered, which is less than absolute zero")]
    BelowAbsoluteZero { kelvin: f64 },
    #[error("Run was cancelled before this cell was processed")]
    Cancelled,
}

impl PvSynthError {
    pub(crate) fn invalid_geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry(message.into())
    }

    /// Whether the mean-day fallback may be used instead of surfacing this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MissingPdf { .. })
    }
}

pub type Result<T> = std::result::Result<T, PvSynthError>;
