//! Hiragana reading to Julius phoneme conversion.
//!
//! Readings are matched greedily, longest kana sequence first, against the
//! segmentation-kit conversion table. `ー` lengthens the preceding vowel.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::SegmentationError;
use crate::lexicon::{Pronunciation, PronunciationSource};

const LONG_VOWEL_MARK: char = 'ー';
const LONG_SUFFIX: char = ':';

/// Three-kana sequences (voiced `う゛` followed by a small kana).
const TRIGRAMS: &[(&str, &str)] = &[
    ("う゛ぁ", "b a"),
    ("う゛ぃ", "b i"),
    ("う゛ぇ", "b e"),
    ("う゛ぉ", "b o"),
    ("う゛ゅ", "by u"),
];

/// Two-kana sequences. The first occurrence of a key wins.
const DIGRAMS: &[(&str, &str)] = &[
    ("ぅ゛", "b u"),
    ("あぁ", "a a"),
    ("いぃ", "i i"),
    ("いぇ", "i e"),
    ("いゃ", "y a"),
    ("うぅ", "u:"),
    ("えぇ", "e e"),
    ("おぉ", "o:"),
    ("かぁ", "k a:"),
    ("きぃ", "k i:"),
    ("くぅ", "k u:"),
    ("くゃ", "ky a"),
    ("くゅ", "ky u"),
    ("くょ", "ky o"),
    ("けぇ", "k e:"),
    ("こぉ", "k o:"),
    ("がぁ", "g a:"),
    ("ぎぃ", "g i:"),
    ("ぐぅ", "g u:"),
    ("ぐゃ", "gy a"),
    ("ぐゅ", "gy u"),
    ("ぐょ", "gy o"),
    ("げぇ", "g e:"),
    ("ごぉ", "g o:"),
    ("さぁ", "s a:"),
    ("しぃ", "sh i:"),
    ("すぅ", "s u:"),
    ("すゃ", "sh a"),
    ("すゅ", "sh u"),
    ("すょ", "sh o"),
    ("せぇ", "s e:"),
    ("そぉ", "s o:"),
    ("ざぁ", "z a:"),
    ("じぃ", "j i:"),
    ("ずぅ", "z u:"),
    ("ずゃ", "zy a"),
    ("ずゅ", "zy u"),
    ("ずょ", "zy o"),
    ("ぜぇ", "z e:"),
    ("ぞぉ", "z o:"),
    ("たぁ", "t a:"),
    ("ちぃ", "ch i:"),
    ("つぁ", "ts a"),
    ("つぃ", "ts i"),
    ("つぅ", "ts u:"),
    ("つゃ", "ch a"),
    ("つゅ", "ch u"),
    ("つょ", "ch o"),
    ("つぇ", "ts e"),
    ("つぉ", "ts o"),
    ("てぇ", "t e:"),
    ("とぉ", "t o:"),
    ("だぁ", "d a:"),
    ("ぢぃ", "j i:"),
    ("づぅ", "d u:"),
    ("づゃ", "zy a"),
    ("づゅ", "zy u"),
    ("づょ", "zy o"),
    ("でぇ", "d e:"),
    ("どぉ", "d o:"),
    ("なぁ", "n a:"),
    ("にぃ", "n i:"),
    ("ぬぅ", "n u:"),
    ("ぬゃ", "ny a"),
    ("ぬゅ", "ny u"),
    ("ぬょ", "ny o"),
    ("ねぇ", "n e:"),
    ("のぉ", "n o:"),
    ("はぁ", "h a:"),
    ("ひぃ", "h i:"),
    ("ふぅ", "f u:"),
    ("ふゃ", "hy a"),
    ("ふゅ", "hy u"),
    ("ふょ", "hy o"),
    ("へぇ", "h e:"),
    ("ほぉ", "h o:"),
    ("ばぁ", "b a:"),
    ("びぃ", "b i:"),
    ("ぶぅ", "b u:"),
    ("ぶゅ", "by u"),
    ("べぇ", "b e:"),
    ("ぼぉ", "b o:"),
    ("ぱぁ", "p a:"),
    ("ぴぃ", "p i:"),
    ("ぷぅ", "p u:"),
    ("ぷゃ", "py a"),
    ("ぷゅ", "py u"),
    ("ぷょ", "py o"),
    ("ぺぇ", "p e:"),
    ("ぽぉ", "p o:"),
    ("まぁ", "m a:"),
    ("みぃ", "m i:"),
    ("むぅ", "m u:"),
    ("むゃ", "my a"),
    ("むゅ", "my u"),
    ("むょ", "my o"),
    ("めぇ", "m e:"),
    ("もぉ", "m o:"),
    ("やぁ", "y a:"),
    ("ゆぅ", "y u:"),
    ("ゆゃ", "y a:"),
    ("ゆゅ", "y u:"),
    ("ゆょ", "y o:"),
    ("よぉ", "y o:"),
    ("らぁ", "r a:"),
    ("りぃ", "r i:"),
    ("るぅ", "r u:"),
    ("るゃ", "ry a"),
    ("るゅ", "ry u"),
    ("るょ", "ry o"),
    ("れぇ", "r e:"),
    ("ろぉ", "r o:"),
    ("わぁ", "w a:"),
    ("をぉ", "o:"),
    ("う゛", "b u"),
    ("でぃ", "d i"),
    ("でゃ", "dy a"),
    ("でゅ", "dy u"),
    ("でょ", "dy o"),
    ("てぃ", "t i"),
    ("てゃ", "ty a"),
    ("てゅ", "ty u"),
    ("てょ", "ty o"),
    ("すぃ", "s i"),
    ("ずぁ", "z u a"),
    ("ずぃ", "z i"),
    ("ずぇ", "z e"),
    ("ずぉ", "z o"),
    ("きゃ", "ky a"),
    ("きゅ", "ky u"),
    ("きょ", "ky o"),
    ("しゃ", "sh a"),
    ("しゅ", "sh u"),
    ("しぇ", "sh e"),
    ("しょ", "sh o"),
    ("ちゃ", "ch a"),
    ("ちゅ", "ch u"),
    ("ちぇ", "ch e"),
    ("ちょ", "ch o"),
    ("とぅ", "t u"),
    ("とゃ", "ty a"),
    ("とゅ", "ty u"),
    ("とょ", "ty o"),
    ("どぁ", "d o a"),
    ("どぅ", "d u"),
    ("どゃ", "dy a"),
    ("どゅ", "dy u"),
    ("どょ", "dy o"),
    ("にゃ", "ny a"),
    ("にゅ", "ny u"),
    ("にょ", "ny o"),
    ("ひゃ", "hy a"),
    ("ひゅ", "hy u"),
    ("ひょ", "hy o"),
    ("みゃ", "my a"),
    ("みゅ", "my u"),
    ("みょ", "my o"),
    ("りゃ", "ry a"),
    ("りゅ", "ry u"),
    ("りょ", "ry o"),
    ("ぎゃ", "gy a"),
    ("ぎゅ", "gy u"),
    ("ぎょ", "gy o"),
    ("ぢぇ", "j e"),
    ("ぢゃ", "j a"),
    ("ぢゅ", "j u"),
    ("ぢょ", "j o"),
    ("じぇ", "j e"),
    ("じゃ", "j a"),
    ("じゅ", "j u"),
    ("じょ", "j o"),
    ("びゃ", "by a"),
    ("びゅ", "by u"),
    ("びょ", "by o"),
    ("ぴゃ", "py a"),
    ("ぴゅ", "py u"),
    ("ぴょ", "py o"),
    ("うぁ", "u a"),
    ("うぃ", "w i"),
    ("うぇ", "w e"),
    ("うぉ", "w o"),
    ("ふぁ", "f a"),
    ("ふぃ", "f i"),
    ("ふぇ", "f e"),
    ("ふぉ", "f o"),
];

const MONOGRAMS: &[(&str, &str)] = &[
    ("あ", "a"),
    ("い", "i"),
    ("う", "u"),
    ("え", "e"),
    ("お", "o"),
    ("か", "k a"),
    ("き", "k i"),
    ("く", "k u"),
    ("け", "k e"),
    ("こ", "k o"),
    ("さ", "s a"),
    ("し", "sh i"),
    ("す", "s u"),
    ("せ", "s e"),
    ("そ", "s o"),
    ("た", "t a"),
    ("ち", "ch i"),
    ("つ", "ts u"),
    ("て", "t e"),
    ("と", "t o"),
    ("な", "n a"),
    ("に", "n i"),
    ("ぬ", "n u"),
    ("ね", "n e"),
    ("の", "n o"),
    ("は", "h a"),
    ("ひ", "h i"),
    ("ふ", "f u"),
    ("へ", "h e"),
    ("ほ", "h o"),
    ("ま", "m a"),
    ("み", "m i"),
    ("む", "m u"),
    ("め", "m e"),
    ("も", "m o"),
    ("ら", "r a"),
    ("り", "r i"),
    ("る", "r u"),
    ("れ", "r e"),
    ("ろ", "r o"),
    ("が", "g a"),
    ("ぎ", "g i"),
    ("ぐ", "g u"),
    ("げ", "g e"),
    ("ご", "g o"),
    ("ざ", "z a"),
    ("じ", "j i"),
    ("ず", "z u"),
    ("ぜ", "z e"),
    ("ぞ", "z o"),
    ("だ", "d a"),
    ("ぢ", "j i"),
    ("づ", "z u"),
    ("で", "d e"),
    ("ど", "d o"),
    ("ば", "b a"),
    ("び", "b i"),
    ("ぶ", "b u"),
    ("べ", "b e"),
    ("ぼ", "b o"),
    ("ぱ", "p a"),
    ("ぴ", "p i"),
    ("ぷ", "p u"),
    ("ぺ", "p e"),
    ("ぽ", "p o"),
    ("や", "y a"),
    ("ゆ", "y u"),
    ("よ", "y o"),
    ("わ", "w a"),
    ("ゐ", "i"),
    ("ゑ", "e"),
    ("ん", "N"),
    ("っ", "q"),
    ("ぁ", "a"),
    ("ぃ", "i"),
    ("ぅ", "u"),
    ("ぇ", "e"),
    ("ぉ", "o"),
    ("ゎ", "w a"),
    ("を", "o"),
];

fn table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut map = HashMap::new();
        for &(kana, phones) in TRIGRAMS.iter().chain(DIGRAMS).chain(MONOGRAMS) {
            map.entry(kana).or_insert(phones);
        }
        map
    })
}

/// Rewrites composed and combining voiced marks into the `う゛` spelling the
/// table uses.
fn normalize(reading: &str) -> String {
    reading
        .trim()
        .replace('ゔ', "う゛")
        .replace('\u{3099}', "゛")
}

/// Converts a hiragana reading into phoneme symbols.
pub fn kana_to_phonemes(reading: &str) -> Result<Vec<String>, SegmentationError> {
    let normalized = normalize(reading);
    let chars: Vec<(usize, char)> = normalized.char_indices().collect();
    let table = table();
    let mut phones: Vec<String> = Vec::new();
    let mut pos = 0usize;

    while pos < chars.len() {
        let (start, ch) = chars[pos];
        if ch.is_whitespace() {
            pos += 1;
            continue;
        }
        if ch == LONG_VOWEL_MARK {
            let Some(prev) = phones.last_mut() else {
                return Err(SegmentationError::lexicon_miss(
                    reading,
                    Some("reading starts with a long vowel mark".to_string()),
                ));
            };
            if !prev.ends_with(LONG_SUFFIX) {
                prev.push(LONG_SUFFIX);
            }
            pos += 1;
            continue;
        }

        let matched = (1..=3).rev().find_map(|width| {
            let end_pos = pos + width;
            if end_pos > chars.len() {
                return None;
            }
            let end = chars.get(end_pos).map_or(normalized.len(), |&(idx, _)| idx);
            table
                .get(&normalized[start..end])
                .map(|phones| (width, *phones))
        });
        let Some((width, converted)) = matched else {
            return Err(SegmentationError::lexicon_miss(
                reading,
                Some(format!("unsupported character '{ch}'")),
            ));
        };
        phones.extend(converted.split_whitespace().map(str::to_string));
        pos += width;
    }

    if phones.is_empty() {
        return Err(SegmentationError::lexicon_miss(
            reading,
            Some("empty reading".to_string()),
        ));
    }
    Ok(phones)
}

/// Pronunciation fallback for hiragana transcripts.
#[derive(Debug, Clone, Copy, Default)]
pub struct KanaTranscriber;

impl PronunciationSource for KanaTranscriber {
    fn pronounce(&self, word: &str) -> Result<Vec<Pronunciation>, SegmentationError> {
        kana_to_phonemes(word).map(|phones| vec![Pronunciation::new(phones)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn joined(reading: &str) -> String {
        kana_to_phonemes(reading).expect("supported reading").join(" ")
    }

    #[test]
    fn converts_plain_syllables() {
        assert_eq!(joined("こんにちは"), "k o N n i ch i h a");
        assert_eq!(joined("かった"), "k a q t a");
    }

    #[test]
    fn prefers_longest_sequence() {
        assert_eq!(joined("きょう"), "ky o u");
        assert_eq!(joined("しゃしん"), "sh a sh i N");
        assert_eq!(joined("う゛ぁいおりん"), "b a i o r i N");
    }

    #[test]
    fn precomposed_vu_is_normalized() {
        assert_eq!(joined("ゔぁ"), "b a");
    }

    #[test]
    fn long_vowel_mark_extends_previous_phone() {
        assert_eq!(joined("らーめん"), "r a: m e N");
        assert_eq!(joined("すーーぷ"), "s u: p u");
    }

    #[test]
    fn small_vowel_digraph_lengthens() {
        assert_eq!(joined("かぁ"), "k a:");
    }

    #[test]
    fn unsupported_character_is_a_lexicon_miss() {
        let err = kana_to_phonemes("かanji").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LexiconMiss);
        assert!(err.to_string().contains("unsupported character 'a'"));
    }

    #[test]
    fn leading_long_vowel_mark_is_rejected() {
        let err = kana_to_phonemes("ーあ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LexiconMiss);
    }

    #[test]
    fn transcriber_yields_single_variant() {
        let variants = KanaTranscriber.pronounce("さくら").unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].to_phone_string(), "s a k u r a");
    }
}
