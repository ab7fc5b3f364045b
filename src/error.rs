use std::fmt;

use thiserror::Error;

/// Pipeline stage an utterance failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Input,
    Transcript,
    Dictionary,
    Grammar,
    Engine,
    Parse,
    Assemble,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Transcript => "transcript",
            Self::Dictionary => "dictionary",
            Self::Grammar => "grammar",
            Self::Engine => "engine",
            Self::Parse => "parse",
            Self::Assemble => "assemble",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat classification of [`SegmentationError`], looking through the
/// per-utterance wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    LexiconMiss,
    LexiconFormat,
    DictionaryBuild,
    EngineInvocation,
    EngineTimeout,
    Cancelled,
    AlignmentParse,
    Configuration,
    Io,
    Json,
}

#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("no pronunciation for word '{word}'{detail_suffix}")]
    LexiconMiss { word: String, detail_suffix: String },
    #[error("lexicon line {line_no}: {message}")]
    LexiconFormat { line_no: usize, message: String },
    #[error("dictionary build failed: {message}")]
    DictionaryBuild { message: String },
    #[error("engine invocation failed: `{command}` ({detail}){stderr_suffix}")]
    EngineInvocation {
        command: String,
        detail: String,
        stderr_suffix: String,
    },
    #[error("engine timed out after {timeout_ms}ms: `{command}`{stderr_suffix}")]
    EngineTimeout {
        command: String,
        timeout_ms: u64,
        stderr_suffix: String,
    },
    #[error("engine run cancelled: `{command}`")]
    Cancelled { command: String },
    #[error("alignment trace{}: {message}{line_suffix}", line_label(.line_no))]
    AlignmentParse {
        line_no: usize,
        message: String,
        line_suffix: String,
    },
    #[error("invalid configuration: {message}")]
    Configuration { message: String },
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON parse error while {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("utterance '{utterance_id}' failed at {stage} stage: {source}")]
    Utterance {
        utterance_id: String,
        stage: Stage,
        #[source]
        source: Box<SegmentationError>,
    },
}

impl SegmentationError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn dictionary(message: impl Into<String>) -> Self {
        Self::DictionaryBuild {
            message: message.into(),
        }
    }

    pub(crate) fn lexicon_miss(word: impl Into<String>, detail: Option<String>) -> Self {
        Self::LexiconMiss {
            word: word.into(),
            detail_suffix: detail.map(|d| format!(" ({d})")).unwrap_or_default(),
        }
    }

    pub(crate) fn parse(line_no: usize, line: Option<&str>, message: impl Into<String>) -> Self {
        let line_suffix = match line.map(str::trim) {
            Some(text) if !text.is_empty() => format!(": '{text}'"),
            _ => String::new(),
        };
        Self::AlignmentParse {
            line_no,
            message: message.into(),
            line_suffix,
        }
    }

    pub(crate) fn from_engine_failure(command: String, detail: String, stderr: &str) -> Self {
        Self::EngineInvocation {
            command,
            detail,
            stderr_suffix: stderr_suffix(stderr),
        }
    }

    pub(crate) fn from_engine_timeout(command: String, timeout_ms: u64, stderr: &str) -> Self {
        Self::EngineTimeout {
            command,
            timeout_ms,
            stderr_suffix: stderr_suffix(stderr),
        }
    }

    /// Attaches utterance context. An error that already carries context is
    /// returned unchanged.
    pub fn in_utterance(self, utterance_id: impl Into<String>, stage: Stage) -> Self {
        match self {
            wrapped @ Self::Utterance { .. } => wrapped,
            other => Self::Utterance {
                utterance_id: utterance_id.into(),
                stage,
                source: Box::new(other),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LexiconMiss { .. } => ErrorKind::LexiconMiss,
            Self::LexiconFormat { .. } => ErrorKind::LexiconFormat,
            Self::DictionaryBuild { .. } => ErrorKind::DictionaryBuild,
            Self::EngineInvocation { .. } => ErrorKind::EngineInvocation,
            Self::EngineTimeout { .. } => ErrorKind::EngineTimeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::AlignmentParse { .. } => ErrorKind::AlignmentParse,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Io { .. } => ErrorKind::Io,
            Self::Json { .. } => ErrorKind::Json,
            Self::Utterance { source, .. } => source.kind(),
        }
    }

    pub fn utterance_id(&self) -> Option<&str> {
        match self {
            Self::Utterance { utterance_id, .. } => Some(utterance_id),
            _ => None,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Utterance { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

fn line_label(line_no: &usize) -> String {
    if *line_no == 0 {
        String::new()
    } else {
        format!(" line {line_no}")
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("; stderr: {trimmed}")
    }
}
