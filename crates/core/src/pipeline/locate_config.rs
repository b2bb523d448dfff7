use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::locate_error::LocateError;
use crate::shared::constants::{
    DEFAULT_BATCH_PAUSE, DEFAULT_BATCH_SIZE, DEFAULT_RUN_TIMEOUT, DEFAULT_SAMPLING_RATE,
};

/// Tunables for one localization run.
#[derive(Clone, Debug, PartialEq)]
pub struct LocateConfig {
    /// Frames sampled per second of video.
    pub sampling_rate: f64,
    /// Maximum frames per matcher call.
    pub batch_size: usize,
    /// Idle time between consecutive batches.
    pub batch_pause: Duration,
    /// Budget for the whole run; `None` disables the deadline.
    pub run_timeout: Option<Duration>,
    /// Parent of the per-run work area; the system temp dir when `None`.
    pub work_root: Option<PathBuf>,
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self {
            sampling_rate: DEFAULT_SAMPLING_RATE,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_pause: DEFAULT_BATCH_PAUSE,
            run_timeout: Some(DEFAULT_RUN_TIMEOUT),
            work_root: None,
        }
    }
}

impl LocateConfig {
    pub fn validate(&self) -> Result<(), LocateError> {
        if !self.sampling_rate.is_finite() || self.sampling_rate <= 0.0 {
            return Err(LocateError::InvalidConfig(format!(
                "sampling rate must be a positive number, got {}",
                self.sampling_rate
            )));
        }
        if self.batch_size == 0 {
            return Err(LocateError::InvalidConfig(
                "batch size must be at least 1".into(),
            ));
        }
        if self.run_timeout == Some(Duration::ZERO) {
            return Err(LocateError::InvalidConfig(
                "run timeout must be positive; use None to disable it".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = LocateConfig::default();
        assert_eq!(config.sampling_rate, 2.0);
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.batch_pause, Duration::from_millis(300));
        assert_eq!(config.run_timeout, Some(Duration::from_secs(15 * 60)));
        assert!(config.work_root.is_none());
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case(0.0)]
    #[case(-1.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn test_rejects_bad_sampling_rate(#[case] sampling_rate: f64) {
        let config = LocateConfig {
            sampling_rate,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LocateError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let config = LocateConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LocateError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_zero_timeout_but_accepts_none() {
        let zero = LocateConfig {
            run_timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        let none = LocateConfig {
            run_timeout: None,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
        assert!(none.validate().is_ok());
    }
}
