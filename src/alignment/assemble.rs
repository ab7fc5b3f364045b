use crate::alignment::trace::AlignedUnit;
use crate::config::FrameTiming;
use crate::error::SegmentationError;
use crate::types::Segment;

/// Converts frame-indexed units into time-stamped segments.
#[derive(Debug, Clone, Copy)]
pub struct SegmentationAssembler {
    timing: FrameTiming,
    trim_boundary_silence: bool,
}

impl SegmentationAssembler {
    pub fn new(timing: FrameTiming, trim_boundary_silence: bool) -> Self {
        Self {
            timing,
            trim_boundary_silence,
        }
    }

    pub fn timing(&self) -> FrameTiming {
        self.timing
    }

    /// Seconds at which `frame` begins. The window-centre offset applies to
    /// every boundary except the start of the recording.
    pub fn frame_begin_s(&self, frame: u32) -> f64 {
        let time = f64::from(frame) * self.timing.frame_shift_ms / 1000.0;
        if frame == 0 {
            time
        } else {
            time + self.timing.window_offset_s()
        }
    }

    /// Seconds at which the inclusive `frame` ends.
    pub fn frame_end_s(&self, frame: u32) -> f64 {
        (f64::from(frame) + 1.0) * self.timing.frame_shift_ms / 1000.0
            + self.timing.window_offset_s()
    }

    pub fn assemble(&self, units: &[AlignedUnit]) -> Result<Vec<Segment>, SegmentationError> {
        let mut segments: Vec<Segment> = units
            .iter()
            .map(|unit| Segment {
                label: unit.label.clone(),
                begin_s: self.frame_begin_s(unit.begin_frame),
                end_s: self.frame_end_s(unit.end_frame),
                begin_frame: unit.begin_frame,
                end_frame: unit.end_frame,
                is_silence: unit.is_silence,
            })
            .collect();

        if self.trim_boundary_silence {
            if segments.last().is_some_and(|s| s.is_silence) {
                segments.pop();
            }
            if segments.first().is_some_and(|s| s.is_silence) {
                segments.remove(0);
            }
        }

        for pair in segments.windows(2) {
            if pair[0].end_frame.checked_add(1) != Some(pair[1].begin_frame) {
                return Err(SegmentationError::parse(
                    0,
                    None,
                    format!(
                        "segments '{}' and '{}' are not contiguous",
                        pair[0].label, pair[1].label
                    ),
                ));
            }
        }
        if let Some(segment) = segments.iter().find(|s| s.end_s <= s.begin_s) {
            return Err(SegmentationError::parse(
                0,
                None,
                format!(
                    "segment '{}' has non-positive duration ({:.4}s..{:.4}s)",
                    segment.label, segment.begin_s, segment.end_s
                ),
            ));
        }

        tracing::trace!(segments = segments.len(), "segments assembled");
        Ok(segments)
    }
}

impl Default for SegmentationAssembler {
    fn default() -> Self {
        Self::new(FrameTiming::default(), false)
    }
}
