//! Clean model replies before they reach the speech engine.

/// Punctuation the speech engine is allowed to see, besides word characters
/// and whitespace.
const KEPT_PUNCTUATION: &[char] = &[
    '\'', '.', ',', '?', '!', ':', '"', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}', '(',
    ')', '-',
];

/// Replace long dashes with a pause, drop markdown stars and any other
/// symbol outside [`KEPT_PUNCTUATION`], and collapse runs of whitespace.
///
/// ```rust
/// use sorting_hat::tts::filter_for_speech;
///
/// assert_eq!(filter_for_speech("*Tesla*\u{2014}for you!"), "Tesla, for you!");
/// ```
pub fn filter_for_speech(text: &str) -> String {
    let replaced = text.replace('\u{2014}', ", ").replace('*', "");
    let kept: String = replaced
        .chars()
        .filter(|&c| {
            c.is_alphanumeric() || c == '_' || c.is_whitespace() || KEPT_PUNCTUATION.contains(&c)
        })
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_symbols_and_collapses_whitespace() {
        assert_eq!(
            filter_for_speech("  Hello   #student @ the\tacademy! "),
            "Hello student the academy!"
        );
    }

    #[test]
    fn keeps_quotes_and_parentheses() {
        let text = "\u{201C}Darwin\u{201D} (the curious one) - it's yours: yes?";
        assert_eq!(filter_for_speech(text), text);
    }

    #[test]
    fn only_symbols_filters_to_empty() {
        assert_eq!(filter_for_speech("*** ### $$$"), "");
    }

    #[test]
    fn non_latin_letters_survive() {
        assert_eq!(filter_for_speech("你好，同学"), "你好同学");
    }
}
