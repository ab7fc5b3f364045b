//! Context-dependent unit labels in HTK `left-center+right` notation.

pub const SILENCE_BEGIN: &str = "silB";
pub const SILENCE_END: &str = "silE";
pub const SHORT_PAUSE: &str = "sp";
const SILENCE: &str = "sil";

/// Silence-like phones never carry context and never act as context.
pub fn is_silence_phone(phone: &str) -> bool {
    matches!(phone, SILENCE_BEGIN | SILENCE_END | SHORT_PAUSE | SILENCE)
}

/// Formats a triphone label. A `None` context is a boundary and is omitted.
pub fn triphone_label(left: Option<&str>, center: &str, right: Option<&str>) -> String {
    if is_silence_phone(center) {
        return center.to_string();
    }
    let left = left.filter(|phone| !is_silence_phone(phone));
    let right = right.filter(|phone| !is_silence_phone(phone));
    match (left, right) {
        (Some(l), Some(r)) => format!("{l}-{center}+{r}"),
        (Some(l), None) => format!("{l}-{center}"),
        (None, Some(r)) => format!("{center}+{r}"),
        (None, None) => center.to_string(),
    }
}

/// Strips left and right context from a unit label.
pub fn center_phone(label: &str) -> &str {
    let without_left = label.split_once('-').map_or(label, |(_, rest)| rest);
    without_left
        .split_once('+')
        .map_or(without_left, |(center, _)| center)
}

/// Expands `phones` into triphone labels given the contexts outside the
/// sequence.
pub fn expand(phones: &[String], left_outer: Option<&str>, right_outer: Option<&str>) -> Vec<String> {
    let last = phones.len().saturating_sub(1);
    phones
        .iter()
        .enumerate()
        .map(|(idx, phone)| {
            let left = if idx == 0 {
                left_outer
            } else {
                Some(phones[idx - 1].as_str())
            };
            let right = if idx == last {
                right_outer
            } else {
                Some(phones[idx + 1].as_str())
            };
            triphone_label(left, phone, right)
        })
        .collect()
}
