use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::SegmentationError;

/// Unit granularity requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitGranularity {
    #[default]
    Phoneme,
    Word,
}

/// How triphone context is resolved at word boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriphoneContext {
    /// Neighbouring words contribute context; silence is a boundary.
    #[default]
    CrossWord,
    /// Every word boundary is a boundary context.
    WithinWord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    AbortOnFirst,
    Continue,
}

/// Frame-to-time conversion of the feature front-end.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, serde::Serialize)]
#[serde(default)]
pub struct FrameTiming {
    pub frame_shift_ms: f64,
    pub window_ms: f64,
    /// Shift boundaries by half an analysis window (all but the first begin),
    /// matching segmentation-kit `.lab` timings.
    pub center_on_window: bool,
}

impl FrameTiming {
    pub const DEFAULT_FRAME_SHIFT_MS: f64 = 10.0;
    pub const DEFAULT_WINDOW_MS: f64 = 25.0;

    pub fn frame_shift_s(&self) -> f64 {
        self.frame_shift_ms / 1000.0
    }

    pub fn window_offset_s(&self) -> f64 {
        if self.center_on_window {
            self.window_ms / 2.0 / 1000.0
        } else {
            0.0
        }
    }

    pub fn with_frame_shift_ms(self, frame_shift_ms: f64) -> Self {
        Self {
            frame_shift_ms,
            ..self
        }
    }
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self {
            frame_shift_ms: Self::DEFAULT_FRAME_SHIFT_MS,
            window_ms: Self::DEFAULT_WINDOW_MS,
            center_on_window: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, serde::Serialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Do not bracket transcripts with silB/silE and drop boundary silences from results.
    pub disable_silence_at_ends: bool,
    /// Keep `<id>.dfa`, `<id>.dict` and `<id>.log` next to the input.
    pub leave_dict: bool,
    /// Pass `-debug` to the engine and log its stderr.
    pub debug: bool,
    pub triphone: bool,
    /// Read `<id>.mfc` HTK parameter files instead of waveforms.
    pub input_mfcc: bool,
    pub granularity: UnitGranularity,
    pub triphone_context: TriphoneContext,
    pub failure_policy: FailurePolicy,
    pub max_concurrent_engines: usize,
    pub engine_timeout_ms: Option<u64>,
    pub frame_timing: FrameTiming,
    /// Convert hiragana words missing from the lexicon into phonemes.
    pub kana_fallback: bool,
}

impl SegmenterConfig {
    pub fn load(path: &Path) -> Result<Self, SegmentationError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| SegmentationError::io(format!("read {}", path.display()), e))?;
        serde_json::from_str(&data)
            .map_err(|e| SegmentationError::json(format!("parse {}", path.display()), e))
    }

    pub fn engine_timeout(&self) -> Option<Duration> {
        self.engine_timeout_ms.map(Duration::from_millis)
    }

    pub(crate) fn validate(&self) -> Result<(), SegmentationError> {
        if self.max_concurrent_engines == 0 {
            return Err(SegmentationError::configuration(
                "max_concurrent_engines must be at least 1",
            ));
        }
        if self.engine_timeout_ms == Some(0) {
            return Err(SegmentationError::configuration(
                "engine_timeout_ms must be positive when set",
            ));
        }
        let timing = &self.frame_timing;
        if !(timing.frame_shift_ms.is_finite() && timing.frame_shift_ms > 0.0) {
            return Err(SegmentationError::configuration(format!(
                "frame_shift_ms must be a positive number, got {}",
                timing.frame_shift_ms
            )));
        }
        if !(timing.window_ms.is_finite() && timing.window_ms >= 0.0) {
            return Err(SegmentationError::configuration(format!(
                "window_ms must be a non-negative number, got {}",
                timing.window_ms
            )));
        }
        if self.triphone && self.granularity == UnitGranularity::Word {
            tracing::debug!("triphone model with word granularity: unit labels stay words");
        }
        Ok(())
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            disable_silence_at_ends: false,
            leave_dict: false,
            debug: false,
            triphone: false,
            input_mfcc: false,
            granularity: UnitGranularity::Phoneme,
            triphone_context: TriphoneContext::CrossWord,
            failure_policy: FailurePolicy::AbortOnFirst,
            max_concurrent_engines: 1,
            engine_timeout_ms: None,
            frame_timing: FrameTiming::default(),
            kana_fallback: false,
        }
    }
}

/// Location of the Julius executable and acoustic models.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub executable: PathBuf,
    pub monophone_hmm: PathBuf,
    pub triphone_hmm: PathBuf,
    /// Logical-to-physical HMM list, required for triphone models.
    pub triphone_hlist: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

impl EngineConfig {
    pub const DEFAULT_EXECUTABLE: &'static str = "julius";
    pub const MONOPHONE_HMM_FILE: &'static str = "hmmdefs_monof_mix16_gid.binhmm";
    pub const TRIPHONE_HMM_FILE: &'static str = "hmmdefs_ptm_gid.binhmm";
    pub const TRIPHONE_HLIST_FILE: &'static str = "logicalTri";

    /// Standard segmentation-kit model layout under `model_dir`.
    pub fn from_model_dir(model_dir: &Path) -> Self {
        Self {
            executable: PathBuf::from(Self::DEFAULT_EXECUTABLE),
            monophone_hmm: model_dir.join(Self::MONOPHONE_HMM_FILE),
            triphone_hmm: model_dir.join(Self::TRIPHONE_HMM_FILE),
            triphone_hlist: Some(model_dir.join(Self::TRIPHONE_HLIST_FILE)),
            extra_args: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, SegmentationError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| SegmentationError::io(format!("read {}", path.display()), e))?;
        serde_json::from_str(&data)
            .map_err(|e| SegmentationError::json(format!("parse {}", path.display()), e))
    }

    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    pub(crate) fn validate(&self, config: &SegmenterConfig) -> Result<(), SegmentationError> {
        if self.executable.as_os_str().is_empty() {
            return Err(SegmentationError::configuration("engine executable is empty"));
        }
        let hmm = if config.triphone {
            &self.triphone_hmm
        } else {
            &self.monophone_hmm
        };
        if hmm.as_os_str().is_empty() {
            return Err(SegmentationError::configuration(format!(
                "no acoustic model configured for {} mode",
                if config.triphone { "triphone" } else { "monophone" }
            )));
        }
        if config.triphone && self.triphone_hlist.is_none() {
            return Err(SegmentationError::configuration(
                "triphone mode requires triphone_hlist",
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_model_dir(Path::new("models"))
    }
}
