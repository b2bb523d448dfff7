/// One frame's distance to the reference face. Lower is more similar.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchCandidate {
    pub sequence: u32,
    pub distance: f64,
}

impl MatchCandidate {
    pub fn new(sequence: u32, distance: f64) -> Self {
        Self { sequence, distance }
    }
}

/// Tracks the closest match seen so far across all batches of a run.
///
/// A candidate replaces the held best only when strictly closer, so among
/// equal distances the first one observed wins. Batches arrive in frame
/// order, which makes that the lowest frame number.
#[derive(Debug, Default)]
pub struct MatchAggregator {
    best: Option<MatchCandidate>,
    observed: usize,
}

impl MatchAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe<I>(&mut self, candidates: I)
    where
        I: IntoIterator<Item = MatchCandidate>,
    {
        for candidate in candidates {
            if !candidate.distance.is_finite() || candidate.distance < 0.0 {
                log::warn!(
                    "Ignoring invalid distance {} for frame {}",
                    candidate.distance,
                    candidate.sequence
                );
                continue;
            }
            self.observed += 1;
            match self.best {
                Some(best) if candidate.distance >= best.distance => {}
                _ => self.best = Some(candidate),
            }
        }
    }

    pub fn best_match(&self) -> Option<MatchCandidate> {
        self.best
    }

    /// Number of valid candidates observed.
    pub fn observed(&self) -> usize {
        self.observed
    }
}

/// Converts a frame sequence number to seconds, rounded to two decimals.
///
/// Frame `k` represents the instant `k / sampling_rate`.
pub fn timestamp_for(sequence: u32, sampling_rate: f64) -> f64 {
    (sequence as f64 / sampling_rate * 100.0).round() / 100.0
}
