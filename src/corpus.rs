//! Corpus discovery: `<id>.wav` (or `.WAV`) next to `<id>.txt`, plus
//! `<id>.mfc` in feature-input mode.

use std::path::{Path, PathBuf};

use crate::error::{SegmentationError, Stage};
use crate::types::{InputSource, Utterance};

pub const TRANSCRIPT_EXTENSION: &str = "txt";
pub const FEATURE_EXTENSION: &str = "mfc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusEntry {
    pub id: String,
    pub waveform: PathBuf,
    pub transcript: PathBuf,
    pub features: PathBuf,
}

impl CorpusEntry {
    fn new(waveform: PathBuf, id: String) -> Self {
        let transcript = waveform.with_extension(TRANSCRIPT_EXTENSION);
        let features = waveform.with_extension(FEATURE_EXTENSION);
        Self {
            id,
            waveform,
            transcript,
            features,
        }
    }

    /// Reads the transcript and resolves the engine input. Errors carry the
    /// utterance id.
    pub fn load(&self, input_mfcc: bool) -> Result<Utterance, SegmentationError> {
        let input = if input_mfcc {
            if !self.features.is_file() {
                return Err(SegmentationError::configuration(format!(
                    "feature input requested but {} does not exist",
                    self.features.display()
                ))
                .in_utterance(&self.id, Stage::Input));
            }
            InputSource::Features(self.features.clone())
        } else {
            InputSource::Waveform(self.waveform.clone())
        };
        if !self.transcript.is_file() {
            return Err(SegmentationError::configuration(format!(
                "no transcript {} for {}",
                self.transcript.display(),
                self.waveform.display()
            ))
            .in_utterance(&self.id, Stage::Transcript));
        }
        let words = read_transcript(&self.transcript)
            .map_err(|e| e.in_utterance(&self.id, Stage::Transcript))?;
        Ok(Utterance::new(self.id.clone(), words, input))
    }
}

/// Lists utterances under `data_dir`, sorted by id.
pub fn discover(data_dir: &Path) -> Result<Vec<CorpusEntry>, SegmentationError> {
    if !data_dir.exists() {
        return Err(SegmentationError::configuration(format!(
            "no such data directory: '{}'",
            data_dir.display()
        )));
    }
    if !data_dir.is_dir() {
        return Err(SegmentationError::configuration(format!(
            "'{}' is not a directory",
            data_dir.display()
        )));
    }

    let read_dir = std::fs::read_dir(data_dir)
        .map_err(|e| SegmentationError::io(format!("list {}", data_dir.display()), e))?;
    let mut entries = Vec::new();
    for item in read_dir {
        let item =
            item.map_err(|e| SegmentationError::io(format!("list {}", data_dir.display()), e))?;
        let path = item.path();
        if !path.is_file() {
            continue;
        }
        let is_wav = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "wav" || ext == "WAV");
        if !is_wav {
            continue;
        }
        let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
            tracing::warn!(path = %path.display(), "skipping waveform with non UTF-8 name");
            continue;
        };
        entries.push(CorpusEntry::new(path.clone(), id.to_string()));
    }
    entries.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.waveform.cmp(&b.waveform)));
    if let Some(pair) = entries.windows(2).find(|pair| pair[0].id == pair[1].id) {
        return Err(SegmentationError::configuration(format!(
            "utterance id '{}' is ambiguous: {} and {}",
            pair[0].id,
            pair[0].waveform.display(),
            pair[1].waveform.display()
        )));
    }

    tracing::debug!(
        data_dir = %data_dir.display(),
        utterances = entries.len(),
        "corpus discovered"
    );
    Ok(entries)
}

/// Words of a UTF-8 transcript, in order; blank lines are ignored.
pub fn read_transcript(path: &Path) -> Result<Vec<String>, SegmentationError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| SegmentationError::io(format!("read transcript {}", path.display()), e))?;
    Ok(text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .flat_map(str::split_whitespace)
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn touch(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn discover_sorts_and_accepts_upper_case_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.wav", "");
        touch(dir.path(), "a.WAV", "");
        touch(dir.path(), "a.txt", "");
        touch(dir.path(), "notes.md", "");
        std::fs::create_dir(dir.path().join("c.wav")).unwrap();

        let entries = discover(dir.path()).unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(entries[0].transcript, dir.path().join("a.txt"));
        assert_eq!(entries[0].features, dir.path().join("a.mfc"));
    }

    #[test]
    fn missing_directory_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover(&dir.path().join("absent")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        touch(dir.path(), "file", "");
        let err = discover(&dir.path().join("file")).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn transcript_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "t.txt", "hello  world\n\n \t\nagain\n");
        let words = read_transcript(&dir.path().join("t.txt")).unwrap();
        assert_eq!(words, ["hello", "world", "again"]);
    }

    #[test]
    fn feature_mode_requires_mfc_file() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "u.wav", "");
        touch(dir.path(), "u.txt", "hello\n");
        let entry = discover(dir.path()).unwrap().remove(0);

        let err = entry.load(true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.stage(), Some(Stage::Input));
        assert_eq!(err.utterance_id(), Some("u"));

        let utterance = entry.load(false).unwrap();
        assert_eq!(utterance.id, "u");
        assert_eq!(utterance.words, ["hello"]);
        assert_eq!(utterance.directory, dir.path());
    }

    #[test]
    fn missing_transcript_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "u.wav", "");
        let entry = discover(dir.path()).unwrap().remove(0);
        let err = entry.load(false).unwrap_err();
        assert!(err.to_string().contains("no transcript"));
        assert_eq!(err.stage(), Some(Stage::Transcript));
    }
}
