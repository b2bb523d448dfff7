use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::matching::domain::face_matcher::{FaceMatcher, FrameDistance};
use crate::matching::domain::match_aggregator::{timestamp_for, MatchAggregator, MatchCandidate};
use crate::pipeline::batch_scheduler::BatchScheduler;
use crate::pipeline::frame_extractor::FrameExtractor;
use crate::pipeline::locate_config::LocateConfig;
use crate::pipeline::locate_error::LocateError;
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::pipeline::run_context::RunContext;
use crate::publishing::domain::frame_publisher::FramePublisher;
use crate::shared::cancellation::{CancellationToken, RunControl};
use crate::shared::video_asset::VideoAsset;
use crate::video::domain::frame_sampler::FrameSampler;

/// Result of a completed run, with or without a match.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocateOutcome {
    /// Seconds into the video, rounded to two decimals.
    pub timestamp: Option<f64>,
    pub frame_index: Option<u32>,
    pub distance: Option<f64>,
    pub video_duration: f64,
    pub sampling_rate: f64,
}

impl LocateOutcome {
    fn no_match(video: &VideoAsset, sampling_rate: f64) -> Self {
        Self {
            timestamp: None,
            frame_index: None,
            distance: None,
            video_duration: video.duration_secs(),
            sampling_rate,
        }
    }

    fn matched(video: &VideoAsset, sampling_rate: f64, best: MatchCandidate) -> Self {
        Self {
            timestamp: Some(timestamp_for(best.sequence, sampling_rate)),
            frame_index: Some(best.sequence),
            distance: Some(best.distance),
            video_duration: video.duration_secs(),
            sampling_rate,
        }
    }

    pub fn is_match(&self) -> bool {
        self.frame_index.is_some()
    }
}

/// Finds the moment a reference face best matches a face in a video.
///
/// Publishes the reference, samples the video into frames, scores them
/// against the reference in sequential batches and reports the closest
/// frame as a timestamp. The run's work area, published handles and
/// matcher session are released on every exit path.
///
/// Single-use: `execute` consumes the owned components, so calling it
/// twice fails with `AlreadyExecuted`.
pub struct LocateMatchUseCase {
    sampler: Option<Box<dyn FrameSampler>>,
    publisher: Option<Box<dyn FramePublisher>>,
    matcher: Option<Box<dyn FaceMatcher>>,
    config: LocateConfig,
    logger: Box<dyn PipelineLogger>,
    cancel: CancellationToken,
}

impl LocateMatchUseCase {
    pub fn new(
        sampler: Box<dyn FrameSampler>,
        publisher: Box<dyn FramePublisher>,
        matcher: Box<dyn FaceMatcher>,
        config: LocateConfig,
        logger: Option<Box<dyn PipelineLogger>>,
        cancel: Option<CancellationToken>,
    ) -> Self {
        Self {
            sampler: Some(sampler),
            publisher: Some(publisher),
            matcher: Some(matcher),
            config,
            logger: logger.unwrap_or_else(|| Box::new(NullPipelineLogger)),
            cancel: cancel.unwrap_or_default(),
        }
    }

    pub fn execute(&mut self, video: &Path, reference: &Path) -> Result<LocateOutcome, LocateError> {
        self.config.validate()?;
        let (Some(sampler), Some(publisher), Some(matcher)) =
            (self.sampler.take(), self.publisher.take(), self.matcher.take())
        else {
            return Err(LocateError::AlreadyExecuted);
        };

        let control = RunControl::new(self.cancel.clone(), self.config.run_timeout);
        let mut ctx = RunContext::new(self.config.work_root.as_deref(), publisher, matcher);
        let started = Instant::now();

        let result = self.run(&mut ctx, FrameExtractor::new(sampler), &control, video, reference);
        ctx.teardown();

        self.logger
            .timing("run", started.elapsed().as_secs_f64() * 1000.0);
        match &result {
            Ok(outcome) => match (outcome.frame_index, outcome.timestamp, outcome.distance) {
                (Some(frame), Some(timestamp), Some(distance)) => self.logger.info(&format!(
                    "Best match: frame {frame} at {timestamp:.2}s (distance {distance:.3})"
                )),
                _ => self.logger.info("No match found"),
            },
            Err(e) => log::error!("Run failed: {e}"),
        }
        self.logger.summary();
        result
    }

    fn run(
        &mut self,
        ctx: &mut RunContext,
        mut extractor: FrameExtractor,
        control: &RunControl,
        video: &Path,
        reference: &Path,
    ) -> Result<LocateOutcome, LocateError> {
        let rate = self.config.sampling_rate;

        // Cheap check first: a bad reference must fail before any transcoding.
        let reference = ctx
            .publisher()
            .publish_reference(reference)
            .map_err(|e| LocateError::ReferenceUnavailable(e.to_string()))?;

        let asset = extractor.probe(video)?;
        self.logger.info(&format!(
            "Video duration {:.2}s, sampling at {rate} fps",
            asset.duration_secs()
        ));

        let extract_started = Instant::now();
        let frames_dir = ctx.frames_dir()?;
        let frames = extractor.extract(&asset, rate, &frames_dir, control)?;
        self.logger
            .timing("extract", extract_started.elapsed().as_secs_f64() * 1000.0);
        self.logger.metric("frames", frames.len() as f64);
        if frames.is_empty() {
            self.logger.info("No frames extracted; nothing to match");
            return Ok(LocateOutcome::no_match(&asset, rate));
        }

        let mut handles = Vec::with_capacity(frames.len());
        for frame in frames.frames() {
            let published = ctx
                .publisher()
                .publish_frame(frame)
                .map_err(|e| LocateError::ExtractionFailed(format!("cannot publish frame: {e}")))?;
            handles.extend(published);
        }
        if handles.len() < frames.len() {
            log::warn!(
                "{} frames disappeared before publishing",
                frames.len() - handles.len()
            );
        }

        let scheduler = BatchScheduler::new(self.config.batch_size, self.config.batch_pause);
        self.logger.info(&format!(
            "Matching {} frames in {} batches",
            handles.len(),
            scheduler.batch_count(handles.len())
        ));

        control.checkpoint()?;
        let warm_started = Instant::now();
        let matcher = ctx.open_matcher()?;
        matcher
            .warm_up(&reference, control)
            .map_err(|e| matcher_error(control, "warm-up", e))?;
        self.logger
            .timing("warm_up", warm_started.elapsed().as_secs_f64() * 1000.0);

        let batches = scheduler.for_each_batch(
            &handles,
            control,
            self.logger.as_mut(),
            |index, batch| {
                matcher
                    .match_batch(&reference, batch, control)
                    .map(|distances| {
                        distances
                            .into_iter()
                            .filter_map(to_candidate)
                            .collect::<Vec<MatchCandidate>>()
                    })
                    .map_err(|e| matcher_error(control, &format!("batch {}", index + 1), e))
            },
        )?;

        let mut aggregator = MatchAggregator::new();
        for candidates in batches {
            aggregator.observe(candidates);
        }
        self.logger
            .metric("scored_frames", aggregator.observed() as f64);

        Ok(match aggregator.best_match() {
            Some(best) => LocateOutcome::matched(&asset, rate, best),
            None => LocateOutcome::no_match(&asset, rate),
        })
    }
}

/// A matcher stopped by the run's control reports a generic error.
fn matcher_error(
    control: &RunControl,
    stage: &str,
    error: Box<dyn std::error::Error>,
) -> LocateError {
    match control.checkpoint() {
        Err(interrupt) => interrupt.into(),
        Ok(()) => LocateError::MatchingFailed(format!("{stage}: {error}")),
    }
}

fn to_candidate(result: FrameDistance) -> Option<MatchCandidate> {
    match result.frame.sequence() {
        Some(sequence) => Some(MatchCandidate::new(sequence, result.distance)),
        None => {
            log::warn!("Matcher scored unnumbered handle {}", result.frame.url());
            None
        }
    }
}
