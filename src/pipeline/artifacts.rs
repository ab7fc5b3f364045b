use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::SegmentationError;

/// Where an utterance's `.dfa`, `.dict` and `.log` live while the engine runs.
/// Temporary scopes are removed on drop.
#[derive(Debug)]
pub enum ArtifactScope {
    Temporary { dir: TempDir, stem: String },
    Retained { dir: PathBuf, stem: String },
}

impl ArtifactScope {
    pub fn temporary(stem: &str) -> Result<Self, SegmentationError> {
        let dir = tempfile::Builder::new()
            .prefix("segmentation-kit-")
            .tempdir()
            .map_err(|e| SegmentationError::io("create artifact directory", e))?;
        Ok(Self::Temporary {
            dir,
            stem: stem.to_string(),
        })
    }

    pub fn retained(dir: &Path, stem: &str) -> Self {
        Self::Retained {
            dir: dir.to_path_buf(),
            stem: stem.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        match self {
            Self::Temporary { dir, .. } => dir.path(),
            Self::Retained { dir, .. } => dir,
        }
    }

    pub fn is_retained(&self) -> bool {
        matches!(self, Self::Retained { .. })
    }

    fn path_with(&self, extension: &str) -> PathBuf {
        let stem = match self {
            Self::Temporary { stem, .. } | Self::Retained { stem, .. } => stem,
        };
        self.dir().join(format!("{stem}.{extension}"))
    }

    pub fn dictionary_path(&self) -> PathBuf {
        self.path_with("dict")
    }

    pub fn grammar_path(&self) -> PathBuf {
        self.path_with("dfa")
    }

    pub fn log_path(&self) -> PathBuf {
        self.path_with("log")
    }

    pub fn write_dictionary(&self, contents: &str) -> Result<PathBuf, SegmentationError> {
        write(self.dictionary_path(), contents)
    }

    pub fn write_grammar(&self, contents: &str) -> Result<PathBuf, SegmentationError> {
        write(self.grammar_path(), contents)
    }

    pub fn write_log(&self, contents: &str) -> Result<PathBuf, SegmentationError> {
        write(self.log_path(), contents)
    }
}

fn write(path: PathBuf, contents: &str) -> Result<PathBuf, SegmentationError> {
    std::fs::write(&path, contents)
        .map_err(|e| SegmentationError::io(format!("write {}", path.display()), e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporary_scope_is_removed_on_drop() {
        let scope = ArtifactScope::temporary("utt").unwrap();
        let dict = scope.write_dictionary("0 [w_0] silB\n").unwrap();
        let dir = scope.dir().to_path_buf();
        assert!(dict.is_file());
        assert_eq!(dict.file_name().unwrap(), "utt.dict");
        drop(scope);
        assert!(!dir.exists());
    }

    #[test]
    fn retained_scope_writes_next_to_input() {
        let corpus = tempfile::tempdir().unwrap();
        let scope = ArtifactScope::retained(corpus.path(), "utt");
        scope.write_grammar("0 0 1 0 1\n1 -1 -1 1 0\n").unwrap();
        scope.write_log("trace").unwrap();
        drop(scope);
        assert!(corpus.path().join("utt.dfa").is_file());
        assert!(corpus.path().join("utt.log").is_file());
    }
}
