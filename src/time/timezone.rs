//! Detects and retroactively corrects local clock jumps within a single
//! producer's stream.
//!
//! Local device clocks sometimes roll forward on a timezone or DST change
//! and roll back once NTP resyncs. The corrector refuses to rewrite history
//! it can't corroborate: a jump is only applied retroactively once the
//! stream demonstrably returns to its pre-jump trajectory for at least
//! `min_suspect_lines` entries.

use crate::settings::TimezoneSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Stable,
    Suspect {
        start_idx: usize,
        baseline_at_jump: i64,
        delta: i64,
        count: usize,
    },
}

/// A confirmed retroactive correction: add `delta` to every entry whose
/// index falls in `[start, end]` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetroSegment {
    pub start: usize,
    pub end: usize,
    pub delta: i64,
}

pub struct TimezoneCorrector {
    jump_threshold_ms: i64,
    min_suspect_lines: usize,
    return_tolerance_ms: i64,
    state: State,
    baseline: Option<i64>,
    pending: Vec<RetroSegment>,
}

impl TimezoneCorrector {
    pub fn new(settings: &TimezoneSettings) -> Self {
        Self {
            jump_threshold_ms: settings.jump_threshold_ms,
            min_suspect_lines: settings.min_suspect_lines,
            return_tolerance_ms: settings.return_tolerance_ms,
            state: State::Stable,
            baseline: None,
            pending: Vec::new(),
        }
    }

    /// Feed the next raw (unadjusted) timestamp at stream index `idx`.
    /// Returns the ts to use immediately; entries already emitted for a
    /// since-confirmed suspect window are corrected via
    /// [`TimezoneCorrector::drain_retro_segments`].
    pub fn adjust(&mut self, raw_ts: i64, idx: usize) -> i64 {
        match self.state {
            State::Stable => {
                let Some(baseline) = self.baseline else {
                    self.baseline = Some(raw_ts);
                    return raw_ts;
                };
                let diff = raw_ts - baseline;
                if diff.abs() <= self.jump_threshold_ms {
                    self.baseline = Some(raw_ts);
                    raw_ts
                } else {
                    let delta = baseline - raw_ts;
                    self.state = State::Suspect {
                        start_idx: idx,
                        baseline_at_jump: baseline,
                        delta,
                        count: 1,
                    };
                    raw_ts
                }
            }
            State::Suspect {
                start_idx,
                baseline_at_jump,
                delta,
                count,
            } => {
                let returned = (raw_ts - baseline_at_jump).abs() <= self.return_tolerance_ms;
                if returned {
                    if count >= self.min_suspect_lines {
                        self.pending.push(RetroSegment {
                            start: start_idx,
                            end: idx.saturating_sub(1),
                            delta,
                        });
                    }
                    self.baseline = Some(raw_ts);
                    self.state = State::Stable;
                    raw_ts
                } else {
                    self.state = State::Suspect {
                        start_idx,
                        baseline_at_jump,
                        delta,
                        count: count + 1,
                    };
                    raw_ts
                }
            }
        }
    }

    /// Returns and clears any retro segments confirmed by the most recent
    /// [`TimezoneCorrector::adjust`] call. Callers apply `ts += delta` to
    /// already-buffered entries in `[start, end]`.
    pub fn drain_retro_segments(&mut self) -> Vec<RetroSegment> {
        std::mem::take(&mut self.pending)
    }

    /// Call at end of stream: any still-pending suspect window is unconfirmed
    /// and its delta is discarded rather than guessed.
    pub fn finalize_suspected(&mut self) {
        self.state = State::Stable;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> TimezoneSettings {
        TimezoneSettings {
            jump_threshold_ms: 1000,
            min_suspect_lines: 2,
            return_tolerance_ms: 50,
        }
    }

    #[test]
    fn test_stable_stream_has_no_retro_segments() {
        let mut tzc = TimezoneCorrector::new(&settings());
        for (idx, ts) in [100, 99, 98, 97].into_iter().enumerate() {
            assert_eq!(tzc.adjust(ts, idx), ts);
            assert!(tzc.drain_retro_segments().is_empty());
        }
        tzc.finalize_suspected();
        assert!(tzc.drain_retro_segments().is_empty());
    }

    #[test]
    fn test_jump_then_confirmed_return_yields_retro_segment() {
        let mut tzc = TimezoneCorrector::new(&settings());
        let raw = [100i64, 99, 98, 97, 1_000_000, 1_000_001, 1_000_002, 96, 95];
        let mut segments = Vec::new();
        for (idx, ts) in raw.iter().enumerate() {
            tzc.adjust(*ts, idx);
            segments.extend(tzc.drain_retro_segments());
        }
        assert_eq!(segments.len(), 1);
        let seg = segments[0];
        assert_eq!(seg.start, 4);
        assert_eq!(seg.end, 6);
        assert_eq!(seg.delta, 97 - 1_000_000);

        // Apply the delta the way PerTypeStager would, to already-buffered entries.
        let mut corrected: Vec<i64> = raw.to_vec();
        for entry in corrected.iter_mut().take(seg.end + 1).skip(seg.start) {
            *entry += seg.delta;
        }
        assert_eq!(corrected, vec![100, 99, 98, 97, 97, 98, 99, 96, 95]);
    }

    #[test]
    fn test_unconfirmed_jump_discarded_at_stream_end() {
        let mut tzc = TimezoneCorrector::new(&settings());
        for (idx, ts) in [100i64, 99, 98].into_iter().enumerate() {
            tzc.adjust(ts, idx);
        }
        tzc.adjust(1_000_000, 3);
        tzc.finalize_suspected();
        assert!(tzc.drain_retro_segments().is_empty());
    }

    #[test]
    fn test_brief_blip_below_min_suspect_lines_is_not_corrected() {
        let mut tzc = TimezoneCorrector::new(&settings());
        for (idx, ts) in [100i64, 99, 98].into_iter().enumerate() {
            tzc.adjust(ts, idx);
        }
        // Jump once, then immediately return: count==1 < min_suspect_lines(2).
        tzc.adjust(1_000_000, 3);
        tzc.adjust(98, 4);
        assert!(tzc.drain_retro_segments().is_empty());
    }
}
