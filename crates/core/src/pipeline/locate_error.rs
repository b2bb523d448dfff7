use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::shared::cancellation::Interrupt;

/// Why a localization run failed.
///
/// Every failure is reported whole: no variant carries partial match data.
#[derive(Error, Debug)]
pub enum LocateError {
    #[error("reference image unavailable: {0}")]
    ReferenceUnavailable(String),
    #[error("frame extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("face matching failed: {0}")]
    MatchingFailed(String),
    #[error("run cancelled")]
    Cancelled,
    #[error("run exceeded its {}s time budget", .0.as_secs_f64())]
    TimedOut(Duration),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("pipeline already executed")]
    AlreadyExecuted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ReferenceUnavailable,
    ExtractionFailed,
    MatchingFailed,
    Cancelled,
    TimedOut,
    InvalidConfig,
    AlreadyExecuted,
}

impl LocateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ReferenceUnavailable(_) => ErrorKind::ReferenceUnavailable,
            Self::ExtractionFailed(_) => ErrorKind::ExtractionFailed,
            Self::MatchingFailed(_) => ErrorKind::MatchingFailed,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::TimedOut(_) => ErrorKind::TimedOut,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::AlreadyExecuted => ErrorKind::AlreadyExecuted,
        }
    }

    /// Structured form handed to callers outside the pipeline.
    pub fn report(&self) -> FailureReport {
        FailureReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl From<Interrupt> for LocateError {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Cancelled => Self::Cancelled,
            Interrupt::TimedOut(budget) => Self::TimedOut(budget),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    pub kind: ErrorKind,
    pub message: String,
}
