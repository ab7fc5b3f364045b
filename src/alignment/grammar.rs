use std::fmt::Write as _;

use crate::alignment::dictionary::Dictionary;
use crate::error::SegmentationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrammarNode {
    /// Index of the dictionary entry (Julius category) this node consumes.
    pub entry_index: usize,
    pub is_silence: bool,
}

/// Linear forced path through the dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    nodes: Vec<GrammarNode>,
}

impl Grammar {
    pub fn compile(dictionary: &Dictionary) -> Result<Self, SegmentationError> {
        if dictionary.is_empty() {
            return Err(SegmentationError::dictionary(
                "cannot compile a grammar from an empty dictionary",
            ));
        }
        let nodes = dictionary
            .entries()
            .iter()
            .map(|entry| GrammarNode {
                entry_index: entry.index,
                is_silence: entry.kind.is_silence(),
            })
            .collect();
        let grammar = Self { nodes };
        grammar.check_references(dictionary)?;
        Ok(grammar)
    }

    pub fn nodes(&self) -> &[GrammarNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn check_references(&self, dictionary: &Dictionary) -> Result<(), SegmentationError> {
        for (position, node) in self.nodes.iter().enumerate() {
            match dictionary.get(node.entry_index) {
                Some(entry) if entry.index == node.entry_index && !entry.variants.is_empty() => {}
                _ => {
                    return Err(SegmentationError::dictionary(format!(
                        "grammar node {position} references missing dictionary entry {}",
                        node.entry_index
                    )))
                }
            }
        }
        Ok(())
    }

    /// Julius `.dfa` text. The decoder walks the category sequence in reverse,
    /// so state `i` consumes category `n - i - 1`; state `n` accepts.
    pub fn render_dfa(&self) -> String {
        let n = self.nodes.len();
        let mut out = String::new();
        for state in 0..n {
            let category = self.nodes[n - state - 1].entry_index;
            let initial = u8::from(state == 0);
            let _ = writeln!(out, "{state} {category} {} 0 {initial}", state + 1);
        }
        let _ = writeln!(out, "{n} -1 -1 1 0");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::dictionary::DictionaryBuilder;
    use crate::lexicon::Lexicon;

    fn dictionary(silence: bool) -> Dictionary {
        let lexicon =
            Lexicon::from_entries([("hello", vec!["h e l o"]), ("world", vec!["w er l d"])])
                .unwrap();
        DictionaryBuilder::new(&lexicon)
            .with_silence_at_ends(silence)
            .build(&["hello".to_string(), "world".to_string()])
            .unwrap()
    }

    #[test]
    fn compile_follows_dictionary_order() {
        let grammar = Grammar::compile(&dictionary(true)).unwrap();
        let order: Vec<_> = grammar.nodes().iter().map(|n| n.entry_index).collect();
        assert_eq!(order, [0, 1, 2, 3]);
        let silence: Vec<_> = grammar.nodes().iter().map(|n| n.is_silence).collect();
        assert_eq!(silence, [true, false, false, true]);
    }

    #[test]
    fn render_dfa_matches_segmentation_kit() {
        let grammar = Grammar::compile(&dictionary(true)).unwrap();
        assert_eq!(
            grammar.render_dfa(),
            "0 3 1 0 1\n1 2 2 0 0\n2 1 3 0 0\n3 0 4 0 0\n4 -1 -1 1 0\n"
        );
    }

    #[test]
    fn render_dfa_without_silence() {
        let grammar = Grammar::compile(&dictionary(false)).unwrap();
        assert_eq!(grammar.render_dfa(), "0 1 1 0 1\n1 0 2 0 0\n2 -1 -1 1 0\n");
    }

    #[test]
    fn dangling_reference_is_rejected() {
        let dict = dictionary(false);
        let grammar = Grammar {
            nodes: vec![GrammarNode {
                entry_index: 7,
                is_silence: false,
            }],
        };
        assert!(grammar.check_references(&dict).is_err());
    }
}
