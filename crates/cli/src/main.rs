use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;

use facefinder_core::matching::infrastructure::face_detection::DEFAULT_CONFIDENCE;
use facefinder_core::matching::infrastructure::onnx_face_matcher::OnnxFaceMatcher;
use facefinder_core::pipeline::locate_config::LocateConfig;
use facefinder_core::pipeline::locate_error::LocateError;
use facefinder_core::pipeline::locate_match_use_case::{LocateMatchUseCase, LocateOutcome};
use facefinder_core::pipeline::pipeline_logger::LogPipelineLogger;
use facefinder_core::publishing::infrastructure::local_file_publisher::LocalFilePublisher;
use facefinder_core::shared::constants::{
    DEFAULT_BATCH_PAUSE, DEFAULT_BATCH_SIZE, DEFAULT_RUN_TIMEOUT, DEFAULT_SAMPLING_RATE,
};
use facefinder_core::video::infrastructure::ffmpeg_frame_sampler::FfmpegFrameSampler;

/// Find the moment a reference face appears in a video.
///
/// Prints the best match as JSON; `timestamp` is null when no frame matched.
#[derive(Parser)]
#[command(name = "facefinder")]
struct Cli {
    /// Video to search.
    video: PathBuf,

    /// Image containing the face to look for.
    reference: PathBuf,

    /// Frames sampled per second of video.
    #[arg(long, default_value_t = DEFAULT_SAMPLING_RATE)]
    sampling_rate: f64,

    /// Frames sent to the matcher per batch.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Pause between batches in milliseconds.
    #[arg(long, default_value_t = DEFAULT_BATCH_PAUSE.as_millis() as u64)]
    batch_pause_ms: u64,

    /// Abort the run after this many seconds (0 = no limit).
    #[arg(long, default_value_t = DEFAULT_RUN_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// Directory for temporary frame files (default: system temp dir).
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f64,

    /// Directory with bundled model files, checked before downloading.
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Pretty-print the JSON result.
    #[arg(long)]
    pretty: bool,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let pretty = cli.pretty;
    match run(cli) {
        Ok(outcome) => print_json(&outcome, pretty),
        Err(e) => {
            print_json(&e.report(), pretty);
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<LocateOutcome, LocateError> {
    validate(&cli)?;
    let config = to_config(&cli);
    config.validate()?;

    log::debug!(
        "Searching {} for the face in {}",
        cli.video.display(),
        cli.reference.display()
    );
    // Models are resolved on first use by the matcher.
    let matcher = OnnxFaceMatcher::with_default_models(cli.models_dir.as_deref(), cli.confidence)
        .with_progress(Box::new(download_progress));

    let mut use_case = LocateMatchUseCase::new(
        Box::new(FfmpegFrameSampler::new()),
        Box::new(LocalFilePublisher::new()),
        Box::new(matcher),
        config,
        Some(Box::new(LogPipelineLogger::new())),
        None,
    );
    use_case.execute(&cli.video, &cli.reference)
}

fn validate(cli: &Cli) -> Result<(), LocateError> {
    if !cli.video.is_file() {
        return Err(LocateError::ExtractionFailed(format!(
            "Video file not found: {}",
            cli.video.display()
        )));
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(LocateError::InvalidConfig(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )));
    }
    if let Some(dir) = &cli.models_dir {
        if !dir.is_dir() {
            return Err(LocateError::InvalidConfig(format!(
                "Models directory not found: {}",
                dir.display()
            )));
        }
    }
    Ok(())
}

fn to_config(cli: &Cli) -> LocateConfig {
    LocateConfig {
        sampling_rate: cli.sampling_rate,
        batch_size: cli.batch_size,
        batch_pause: Duration::from_millis(cli.batch_pause_ms),
        run_timeout: (cli.timeout_secs > 0).then(|| Duration::from_secs(cli.timeout_secs)),
        work_root: cli.work_dir.clone(),
    }
}

fn download_progress(name: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {name}... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading {name}... {downloaded} bytes");
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match rendered {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: cannot serialize result: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facefinder_core::pipeline::locate_error::ErrorKind;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("facefinder").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_match_core_config() {
        let cli = parse(&["clip.mp4", "face.png"]);

        assert_eq!(to_config(&cli), LocateConfig::default());
        assert!(!cli.pretty);
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let cli = parse(&["clip.mp4", "face.png", "--timeout-secs", "0"]);
        assert_eq!(to_config(&cli).run_timeout, None);
    }

    #[test]
    fn test_flags_reach_config() {
        let cli = parse(&[
            "clip.mp4",
            "face.png",
            "--sampling-rate",
            "4",
            "--batch-size",
            "10",
            "--batch-pause-ms",
            "50",
            "--work-dir",
            "/tmp/runs",
        ]);

        let config = to_config(&cli);

        assert_eq!(config.sampling_rate, 4.0);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.batch_pause, Duration::from_millis(50));
        assert_eq!(config.work_root, Some(PathBuf::from("/tmp/runs")));
    }

    #[test]
    fn test_missing_video_is_extraction_failure() {
        let cli = parse(&["/nonexistent/clip.mp4", "face.png"]);
        let err = validate(&cli).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExtractionFailed);
    }

    #[test]
    fn test_missing_reference_fails_without_resolving_models() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"").unwrap();
        let video = video.to_string_lossy().into_owned();
        let reference = dir.path().join("missing.png");
        let reference = reference.to_string_lossy().into_owned();
        let work = dir.path().to_string_lossy().into_owned();

        let cli = parse(&[
            video.as_str(),
            reference.as_str(),
            "--work-dir",
            work.as_str(),
        ]);

        let err = run(cli).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferenceUnavailable);
    }

    #[test]
    fn test_confidence_out_of_range_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"").unwrap();
        let video = video.to_string_lossy().into_owned();

        let cli = parse(&[video.as_str(), "face.png", "--confidence", "1.5"]);

        assert!(matches!(validate(&cli), Err(LocateError::InvalidConfig(_))));
    }
}
