use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::SegmentationError;

/// Where the engine reads an utterance's acoustics from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Waveform(PathBuf),
    /// HTK parameter file (precomputed MFCC).
    Features(PathBuf),
}

impl InputSource {
    pub fn path(&self) -> &Path {
        match self {
            Self::Waveform(path) | Self::Features(path) => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub id: String,
    pub words: Vec<String>,
    pub input: InputSource,
    /// Directory retained artifacts (`<id>.dfa`, `<id>.dict`, `<id>.log`) are written to.
    pub directory: PathBuf,
}

impl Utterance {
    pub fn new(id: impl Into<String>, words: Vec<String>, input: InputSource) -> Self {
        let directory = input
            .path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            id: id.into(),
            words,
            input,
            directory,
        }
    }
}

/// One aligned unit. Interval is [begin_s, end_s).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Segment {
    pub label: String,
    pub begin_s: f64,
    pub end_s: f64,
    /// First frame covered by the unit.
    pub begin_frame: u32,
    /// Last frame covered by the unit (inclusive).
    pub end_frame: u32,
    #[serde(default)]
    pub is_silence: bool,
}

impl Segment {
    pub fn duration_s(&self) -> f64 {
        self.end_s - self.begin_s
    }
}

/// Utterance id to ordered segments, in corpus processing order.
pub type SegmentationResult = IndexMap<String, Vec<Segment>>;

#[derive(Debug, Default)]
pub struct SegmentationOutcome {
    pub segments: SegmentationResult,
    /// Per-utterance failures collected under `FailurePolicy::Continue`.
    pub failures: Vec<SegmentationError>,
}

impl SegmentationOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
