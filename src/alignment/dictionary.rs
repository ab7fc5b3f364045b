//! Per-utterance pronunciation dictionary.
//!
//! Entries are indexed in grammar order: the engine reports units
//! positionally, so entry `i` is both Julius category `i` and output symbol
//! `w_i`.

use std::fmt::Write as _;

use crate::alignment::triphone::{self, SILENCE_BEGIN, SILENCE_END};
use crate::config::TriphoneContext;
use crate::error::{ErrorKind, SegmentationError};
use crate::lexicon::{Lexicon, Pronunciation, PronunciationSource};

const RESERVED_PHONE_CHARS: [char; 4] = ['[', ']', '-', '+'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    LeadingSilence,
    Word,
    TrailingSilence,
}

impl EntryKind {
    pub fn is_silence(self) -> bool {
        !matches!(self, Self::Word)
    }
}

/// One pronunciation variant with its expanded unit labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryVariant {
    pub pronunciation: Pronunciation,
    /// Monophones, or triphone labels when context expansion is enabled.
    pub units: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryEntry {
    pub index: usize,
    /// Transcript word, or the silence symbol for silence entries.
    pub label: String,
    pub kind: EntryKind,
    pub variants: Vec<EntryVariant>,
}

impl DictionaryEntry {
    pub fn output_symbol(&self) -> String {
        format!("w_{}", self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    entries: Vec<DictionaryEntry>,
    triphone: bool,
}

impl Dictionary {
    pub fn entries(&self) -> &[DictionaryEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&DictionaryEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_triphone(&self) -> bool {
        self.triphone
    }

    /// Julius `.dict` text: `"{i} [w_{i}] {phones}"` per variant. Phones stay
    /// monophones; the engine applies its own HMM list.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            for variant in &entry.variants {
                let _ = writeln!(
                    out,
                    "{0} [w_{0}] {1}",
                    entry.index,
                    variant.pronunciation.to_phone_string()
                );
            }
        }
        out
    }
}

pub struct DictionaryBuilder<'a> {
    lexicon: &'a Lexicon,
    fallback: Option<&'a dyn PronunciationSource>,
    silence_at_ends: bool,
    triphone: Option<TriphoneContext>,
}

impl<'a> DictionaryBuilder<'a> {
    pub fn new(lexicon: &'a Lexicon) -> Self {
        Self {
            lexicon,
            fallback: None,
            silence_at_ends: true,
            triphone: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Option<&'a dyn PronunciationSource>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_silence_at_ends(mut self, enabled: bool) -> Self {
        self.silence_at_ends = enabled;
        self
    }

    /// Enables triphone expansion with the given word-boundary rule.
    pub fn with_triphone(mut self, context: Option<TriphoneContext>) -> Self {
        self.triphone = context;
        self
    }

    pub fn build(&self, words: &[String]) -> Result<Dictionary, SegmentationError> {
        if words.is_empty() {
            return Err(SegmentationError::dictionary("transcript has no words"));
        }

        let mut slots: Vec<(String, EntryKind, Vec<Pronunciation>)> =
            Vec::with_capacity(words.len() + 2);
        if self.silence_at_ends {
            slots.push(silence_slot(SILENCE_BEGIN, EntryKind::LeadingSilence));
        }
        for word in words {
            let variants = self.resolve(word)?;
            for pronunciation in &variants {
                validate_pronunciation(word, pronunciation)?;
            }
            slots.push((word.clone(), EntryKind::Word, variants));
        }
        if self.silence_at_ends {
            slots.push(silence_slot(SILENCE_END, EntryKind::TrailingSilence));
        }

        let entries = slots
            .iter()
            .enumerate()
            .map(|(index, (label, kind, variants))| {
                let (left_outer, right_outer) = match self.triphone {
                    Some(rule) => (
                        outer_context(&slots, index, rule, Edge::Left),
                        outer_context(&slots, index, rule, Edge::Right),
                    ),
                    None => (None, None),
                };
                let variants = variants
                    .iter()
                    .map(|pronunciation| EntryVariant {
                        units: match self.triphone {
                            Some(_) => triphone::expand(
                                pronunciation.phones(),
                                left_outer.as_deref(),
                                right_outer.as_deref(),
                            ),
                            None => pronunciation.phones().to_vec(),
                        },
                        pronunciation: pronunciation.clone(),
                    })
                    .collect();
                DictionaryEntry {
                    index,
                    label: label.clone(),
                    kind: *kind,
                    variants,
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            entries = entries.len(),
            triphone = self.triphone.is_some(),
            "dictionary built"
        );
        Ok(Dictionary {
            entries,
            triphone: self.triphone.is_some(),
        })
    }

    fn resolve(&self, word: &str) -> Result<Vec<Pronunciation>, SegmentationError> {
        match self.lexicon.pronounce(word) {
            Ok(variants) => Ok(variants),
            Err(err) if err.kind() == ErrorKind::LexiconMiss => match self.fallback {
                Some(fallback) => fallback.pronounce(word),
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }
}

fn silence_slot(symbol: &str, kind: EntryKind) -> (String, EntryKind, Vec<Pronunciation>) {
    (
        symbol.to_string(),
        kind,
        vec![Pronunciation::new([symbol])],
    )
}

fn validate_pronunciation(word: &str, pronunciation: &Pronunciation) -> Result<(), SegmentationError> {
    if pronunciation.is_empty() {
        return Err(SegmentationError::dictionary(format!(
            "word '{word}' expands to an empty pronunciation"
        )));
    }
    if let Some(phone) = pronunciation
        .phones()
        .iter()
        .find(|phone| phone.is_empty() || phone.contains(RESERVED_PHONE_CHARS))
    {
        return Err(SegmentationError::dictionary(format!(
            "word '{word}' has unusable phone symbol '{phone}'"
        )));
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum Edge {
    Left,
    Right,
}

/// Context a neighbouring entry contributes across a word boundary, if it
/// is unambiguous across all of its variants.
fn outer_context(
    slots: &[(String, EntryKind, Vec<Pronunciation>)],
    index: usize,
    rule: TriphoneContext,
    edge: Edge,
) -> Option<String> {
    if rule == TriphoneContext::WithinWord {
        return None;
    }
    let neighbour = match edge {
        Edge::Left => index.checked_sub(1).and_then(|i| slots.get(i)),
        Edge::Right => slots.get(index + 1),
    }?;
    if neighbour.1.is_silence() {
        return None;
    }
    let mut phones = neighbour.2.iter().map(|pronunciation| match edge {
        Edge::Left => pronunciation.last(),
        Edge::Right => pronunciation.first(),
    });
    let first = phones.next()??;
    if phones.all(|phone| phone == Some(first)) && !triphone::is_silence_phone(first) {
        Some(first.to_string())
    } else {
        None
    }
}
