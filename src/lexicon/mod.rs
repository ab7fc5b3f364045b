//! Word to pronunciation lookup.
//!
//! The [`Lexicon`] is loaded once and shared read-only across utterances.
//! Words it does not know can be resolved per utterance by a fallback
//! [`PronunciationSource`] such as [`kana::KanaTranscriber`].

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::SegmentationError;

pub mod kana;

/// Ordered phoneme symbols of one pronunciation variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pronunciation {
    phones: Vec<String>,
}

impl Pronunciation {
    pub fn new<I, S>(phones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            phones: phones.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a whitespace-delimited phone string.
    pub fn parse(text: &str) -> Self {
        Self::new(text.split_whitespace())
    }

    pub fn phones(&self) -> &[String] {
        &self.phones
    }

    pub fn len(&self) -> usize {
        self.phones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phones.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.phones.first().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.phones.last().map(String::as_str)
    }

    pub fn to_phone_string(&self) -> String {
        self.phones.join(" ")
    }
}

pub trait PronunciationSource: Send + Sync {
    /// Returns every pronunciation variant of `word`, or `LexiconMiss`.
    fn pronounce(&self, word: &str) -> Result<Vec<Pronunciation>, SegmentationError>;
}

#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    entries: HashMap<String, Vec<Pronunciation>>,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_path(path: &Path) -> Result<Self, SegmentationError> {
        let file = File::open(path)
            .map_err(|e| SegmentationError::io(format!("open lexicon {}", path.display()), e))?;
        let lexicon = Self::from_reader(BufReader::new(file))?;
        tracing::info!(
            path = %path.display(),
            words = lexicon.len(),
            "lexicon loaded"
        );
        Ok(lexicon)
    }

    /// Reads `word phone phone ...` lines. Repeated words add variants, `#`
    /// starts a comment line and a bracketed Julius output field after the
    /// word is ignored.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, SegmentationError> {
        let mut lexicon = Self::new();
        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.map_err(|e| SegmentationError::io("read lexicon line", e))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split_whitespace().peekable();
            let Some(word) = fields.next() else {
                continue;
            };
            if fields
                .peek()
                .is_some_and(|f| f.starts_with('[') && f.ends_with(']'))
            {
                fields.next();
            }
            let pronunciation = Pronunciation::new(fields);
            if pronunciation.is_empty() {
                return Err(SegmentationError::LexiconFormat {
                    line_no,
                    message: format!("word '{word}' has no phonemes"),
                });
            }
            lexicon.insert(word, pronunciation);
        }
        Ok(lexicon)
    }

    /// Builds a lexicon from `(word, ["p h o n e s", ...])` pairs.
    pub fn from_entries<I, W, P>(entries: I) -> Result<Self, SegmentationError>
    where
        I: IntoIterator<Item = (W, Vec<P>)>,
        W: Into<String>,
        P: AsRef<str>,
    {
        let mut lexicon = Self::new();
        for (idx, (word, variants)) in entries.into_iter().enumerate() {
            let word = word.into();
            if variants.is_empty() {
                return Err(SegmentationError::LexiconFormat {
                    line_no: idx + 1,
                    message: format!("word '{word}' has no pronunciations"),
                });
            }
            for variant in variants {
                let pronunciation = Pronunciation::parse(variant.as_ref());
                if pronunciation.is_empty() {
                    return Err(SegmentationError::LexiconFormat {
                        line_no: idx + 1,
                        message: format!("word '{word}' has an empty pronunciation"),
                    });
                }
                lexicon.insert(word.clone(), pronunciation);
            }
        }
        Ok(lexicon)
    }

    pub fn insert(&mut self, word: impl Into<String>, pronunciation: Pronunciation) {
        let variants = self.entries.entry(word.into()).or_default();
        if !variants.contains(&pronunciation) {
            variants.push(pronunciation);
        }
    }

    /// Exact lookup, then lowercase lookup.
    pub fn get(&self, word: &str) -> Option<&[Pronunciation]> {
        self.entries
            .get(word)
            .or_else(|| self.entries.get(&word.to_lowercase()))
            .map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PronunciationSource for Lexicon {
    fn pronounce(&self, word: &str) -> Result<Vec<Pronunciation>, SegmentationError> {
        self.get(word)
            .filter(|variants| !variants.is_empty())
            .map(<[Pronunciation]>::to_vec)
            .ok_or_else(|| SegmentationError::lexicon_miss(word, None))
    }
}
