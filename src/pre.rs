//! Pre-tokenizer: splitting, normalization and escaping of raw text.
//!
//! Splitting is driven by one Unicode regex whose matches rejoin to exactly
//! the (normalized) input; that round trip is what makes detokenization
//! reversible. Each split word is then escaped into alphabet space with its
//! `(ws, up)` sidecar flags. Reserved tokens can be fenced off so that they
//! pass through splitting and escaping unchanged.

use std::collections::HashSet;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::alphabet::{Encoding, Escaped};
use crate::Error;

/// Default pre-split regex, one leading optional space merged into the
/// following word, then: lowercase run | capitalized word | ALL-UPPER run
/// not followed by lowercase | digit run | repeated whitespace char |
/// repeated other char.
pub const SPLIT_REGEX: &str = r"( ?(?:[\p{Ll}\p{Lo}\p{Lm}]+|(?:\p{Lu}\p{Ll}|\p{Lt})[\p{Ll}\p{Lo}\p{Lm}]*|\p{Lu}\p{Lu}[\p{Lu}\p{Lo}\p{Lm}]*(?!\p{Ll})|\d+|(?<! )(\s)\2*|(.)\3*))";

pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";
pub const PRE_TOKEN: &str = "[PRE]";
pub const SOT_TOKEN: &str = "[SOT]";
pub const EOT_TOKEN: &str = "[EOT]";
pub const MSK_TOKEN: &str = "[MSK]";
pub const CLS_TOKEN: &str = "[CLS]";
pub const FEED_TOKEN: &str = "[FEED]";
pub const EMIT_TOKEN: &str = "[EMIT]";
pub const CUR_TOKEN: &str = "[CUR]";

/// The reserved tokens in their fixed vocabulary order; `[PAD]` gets id 0.
pub fn default_reserved_tokens() -> Vec<String> {
    [
        PAD_TOKEN, UNK_TOKEN, PRE_TOKEN, SOT_TOKEN, EOT_TOKEN, MSK_TOKEN, CLS_TOKEN,
        FEED_TOKEN, EMIT_TOKEN, CUR_TOKEN,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn ws_or_control_regex() -> &'static fancy_regex::Regex {
    static RE: OnceLock<fancy_regex::Regex> = OnceLock::new();
    RE.get_or_init(|| fancy_regex::Regex::new(r"\p{Z}(?<! )|\p{Cc}(?<![\t\n])").unwrap())
}

fn alpha_or_num_regex() -> &'static fancy_regex::Regex {
    static RE: OnceLock<fancy_regex::Regex> = OnceLock::new();
    RE.get_or_init(|| fancy_regex::Regex::new(r"\p{N}|(\p{L}(?<!\p{Lm}))+").unwrap())
}

/// Unicode normalization applied before splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// NFC, plus non-ASCII whitespace/controls to space, plus stripping of
    /// format characters and uncombined diacritics (unless preserved).
    Default,
    /// [`Default`](Normalization::Default) plus NFKC folding of digits and
    /// letters only (`²` → `2`, math italic `𝑀` → `M`).
    Ipt,
    /// NFC only.
    Nfc,
}

/// Construction options for [`PreTokenizer`].
#[derive(Debug, Clone)]
pub struct PreTokenizerOptions {
    pub normalization: Option<Normalization>,
    /// Override for [`SPLIT_REGEX`].
    pub split_regex: Option<String>,
    pub reserved_tokens: Vec<String>,
    pub preserve_soft_hyphen: bool,
    pub preserve_format_and_diacritic: bool,
}

impl Default for PreTokenizerOptions {
    fn default() -> Self {
        PreTokenizerOptions {
            normalization: Some(Normalization::Default),
            split_regex: None,
            reserved_tokens: default_reserved_tokens(),
            preserve_soft_hyphen: false,
            preserve_format_and_diacritic: false,
        }
    }
}

#[derive(Debug)]
pub struct PreTokenizer {
    encoding: Encoding,
    normalization: Option<Normalization>,
    split_regex: fancy_regex::Regex,
    reserved_tokens: Vec<String>,
    reserved_set: HashSet<String>,
    reserved_regex: Option<regex::Regex>,
    preserve_soft_hyphen: bool,
    preserve_format_and_diacritic: bool,
    clean_regex: Option<fancy_regex::Regex>,
}

impl PreTokenizer {
    pub fn new(alphabet: &str, options: PreTokenizerOptions) -> Result<Self, Error> {
        let pattern = options.split_regex.as_deref().unwrap_or(SPLIT_REGEX);
        let split_regex = fancy_regex::Regex::new(pattern)
            .map_err(|e| Error::Config(format!("invalid split regex: {e}")))?;

        let reserved_set: HashSet<String> = options.reserved_tokens.iter().cloned().collect();
        let reserved_regex = if options.reserved_tokens.is_empty() {
            None
        } else {
            let alternation = options
                .reserved_tokens
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|");
            Some(
                regex::Regex::new(&format!("({alternation})"))
                    .map_err(|e| Error::Config(format!("invalid reserved tokens: {e}")))?,
            )
        };

        let clean_pattern = match (options.preserve_format_and_diacritic, options.preserve_soft_hyphen)
        {
            (false, false) => Some(r"\p{Cf}|\p{M}"),
            (false, true) => Some(r"\p{Cf}(?<!\x{AD})|\p{M}"),
            (true, false) => Some(r"\x{AD}"),
            (true, true) => None,
        };
        let clean_regex = clean_pattern
            .map(fancy_regex::Regex::new)
            .transpose()
            .map_err(|e| Error::Config(format!("invalid clean regex: {e}")))?;

        Ok(PreTokenizer {
            encoding: Encoding::new(alphabet),
            normalization: options.normalization,
            split_regex,
            reserved_tokens: options.reserved_tokens,
            reserved_set,
            reserved_regex,
            preserve_soft_hyphen: options.preserve_soft_hyphen,
            preserve_format_and_diacritic: options.preserve_format_and_diacritic,
            clean_regex,
        })
    }

    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    pub fn normalization(&self) -> Option<Normalization> {
        self.normalization
    }

    pub fn reserved_tokens(&self) -> &[String] {
        &self.reserved_tokens
    }

    pub fn is_reserved(&self, word: &str) -> bool {
        self.reserved_set.contains(word)
    }

    /// Normalize text according to the configured mode.
    pub fn normalize(&self, text: &str) -> String {
        let mut text = match self.normalization {
            Some(_) => text.nfc().collect::<String>(),
            None => text.to_string(),
        };

        if matches!(self.normalization, Some(Normalization::Default | Normalization::Ipt)) {
            text = ws_or_control_regex().replace_all(&text, " ").into_owned();
        }

        if self.normalization == Some(Normalization::Ipt) {
            text = alpha_or_num_regex()
                .replace_all(&text, |caps: &fancy_regex::Captures| {
                    caps[0].nfkc().collect::<String>()
                })
                .into_owned();
        }

        if let Some(clean) = &self.clean_regex {
            text = clean.replace_all(&text, "").into_owned();
        }

        text
    }

    fn split_normalized(&self, text: &str) -> Vec<String> {
        self.split_regex
            .find_iter(text)
            .filter_map(|m| m.ok())
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Split text into words after normalization. Rejoining the words
    /// reproduces the normalized text exactly.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, false, None)
    }

    /// Split with optional reserved-token fences: fenced tokens come out as
    /// single words, everything between them splits normally.
    pub fn split_with(
        &self,
        text: &str,
        handle_reserved: bool,
        allowed_reserved: Option<&[String]>,
    ) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let text = self.normalize(text);

        let fences = if handle_reserved { self.reserved_regex.as_ref() } else { None };
        match fences {
            None => self.split_normalized(&text),
            Some(regex) => {
                let mut words = Vec::new();
                let mut last = 0;
                for m in regex.find_iter(&text) {
                    if allowed_reserved.is_some_and(|allowed| {
                        !allowed.iter().any(|t| t == m.as_str())
                    }) {
                        continue;
                    }
                    if m.start() > last {
                        words.extend(self.split_normalized(&text[last..m.start()]));
                    }
                    words.push(m.as_str().to_string());
                    last = m.end();
                }
                if last < text.len() {
                    words.extend(self.split_normalized(&text[last..]));
                }
                words
            }
        }
    }

    /// Escape one word; reserved tokens pass through unchanged when
    /// `handle_reserved` is set.
    pub fn escape(
        &self,
        word: &str,
        handle_reserved: bool,
        allowed_reserved: Option<&[String]>,
    ) -> Escaped {
        if handle_reserved
            && self.reserved_set.contains(word)
            && allowed_reserved.map_or(true, |allowed| allowed.iter().any(|t| t == word))
        {
            return Escaped::plain(word);
        }
        self.encoding.escape(word)
    }

    /// Split, normalize and escape text.
    pub fn split_and_escape(&self, text: &str) -> Vec<Escaped> {
        self.split_and_escape_with(text, false, None).0
    }

    /// Split, normalize and escape text, returning byte ranges
    /// `(offset, len)` of each word in the normalized text.
    pub fn split_and_escape_with(
        &self,
        text: &str,
        handle_reserved: bool,
        allowed_reserved: Option<&[String]>,
    ) -> (Vec<Escaped>, Vec<(usize, usize)>) {
        let text = if self.preserve_soft_hyphen {
            text.to_string()
        } else {
            text.replace('\u{00AD}', "")
        };
        let words = self.split_with(&text, handle_reserved, allowed_reserved);
        let mut ranges = Vec::with_capacity(words.len());
        let mut offset = 0;
        for word in &words {
            ranges.push((offset, word.len()));
            offset += word.len();
        }
        let escaped = words
            .iter()
            .map(|w| self.escape(w, handle_reserved, allowed_reserved))
            .collect();
        (escaped, ranges)
    }

    /// Unescape a marked word; reserved tokens pass through when
    /// `handle_reserved` is set.
    pub fn unescape(&self, escaped: &str, handle_reserved: bool) -> String {
        if handle_reserved && self.reserved_set.contains(escaped) {
            return escaped.to_string();
        }
        self.encoding.unescape(escaped)
    }

    /// Unescape an [`Escaped`] word with its sidecar flags.
    pub fn unescape_escaped(&self, escaped: &Escaped, handle_reserved: bool) -> String {
        if handle_reserved && self.reserved_set.contains(&escaped.word) {
            return escaped.word.clone();
        }
        crate::alphabet::unescape_parts(&escaped.word, escaped.ws, escaped.up)
    }

    /// Unescape marked words and join them back into text. Reserved tokens
    /// become empty strings when `omit_reserved` is set.
    pub fn unescape_and_join(&self, words: &[String], omit_reserved: bool) -> String {
        self.unescape_and_join_with_ranges(words, omit_reserved).0
    }

    /// As [`unescape_and_join`](Self::unescape_and_join), also returning the
    /// byte range `(offset, len)` of each word in the output text.
    pub fn unescape_and_join_with_ranges(
        &self,
        words: &[String],
        omit_reserved: bool,
    ) -> (String, Vec<(usize, usize)>) {
        let unescaped: Vec<String> = words
            .iter()
            .map(|w| {
                if self.reserved_set.contains(w) {
                    if omit_reserved { String::new() } else { w.clone() }
                } else {
                    self.encoding.unescape(w)
                }
            })
            .collect();
        let mut ranges = Vec::with_capacity(unescaped.len());
        let mut offset = 0;
        for w in &unescaped {
            ranges.push((offset, w.len()));
            offset += w.len();
        }
        (unescaped.concat(), ranges)
    }

    pub(crate) fn to_data(&self) -> PreData {
        PreData {
            alphabet: self.encoding.alphabet().to_string(),
            normalization: self.normalization,
            split_regex: self.split_regex.as_str().to_string(),
            reserved_tokens: self.reserved_tokens.clone(),
            preserve_soft_hyphen: self.preserve_soft_hyphen,
        }
    }

    pub(crate) fn from_data(data: PreData) -> Result<PreTokenizer, Error> {
        PreTokenizer::new(
            &data.alphabet,
            PreTokenizerOptions {
                normalization: data.normalization,
                split_regex: Some(data.split_regex),
                reserved_tokens: data.reserved_tokens,
                preserve_soft_hyphen: data.preserve_soft_hyphen,
                preserve_format_and_diacritic: false,
            },
        )
    }
}

/// Serialized form of a [`PreTokenizer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PreData {
    pub alphabet: String,
    pub normalization: Option<Normalization>,
    pub split_regex: String,
    pub reserved_tokens: Vec<String>,
    pub preserve_soft_hyphen: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::eu24_alphabet;

    fn pre(normalization: Option<Normalization>) -> PreTokenizer {
        PreTokenizer::new(
            &eu24_alphabet(),
            PreTokenizerOptions { normalization, ..PreTokenizerOptions::default() },
        )
        .unwrap()
    }

    #[test]
    fn test_split_rejoins_to_input() {
        let pre = pre(Some(Normalization::Ipt));
        let examples = [
            "Resistivity is_commonly represented  by the Greek letter ρ (rho).",
            "   indentation",
            "\n\nnew paragraph",
            "\t\t\ttabbed text",
            "### heading 3",
        ];
        for example in examples {
            let words = pre.split(example);
            assert!(words.len() > 1, "{example:?} should split into multiple words");
            assert_eq!(words.concat(), pre.normalize(example));
        }
    }

    #[test]
    fn test_split_heading() {
        let pre = pre(Some(Normalization::Ipt));
        assert_eq!(pre.split("### heading 3"), vec!["###", " heading", " 3"]);
    }

    #[test]
    fn test_split_case_classes() {
        let pre = pre(Some(Normalization::Ipt));
        assert_eq!(pre.split("fooBar BAZ"), vec!["foo", "Bar", " BAZ"]);
    }

    #[test]
    fn test_normalize_default() {
        let pre = pre(Some(Normalization::Default));
        assert_eq!(pre.normalize("\u{000C}"), " ");
        assert_eq!(pre.normalize("\t"), "\t");
        assert_eq!(pre.normalize("\u{00AD}"), "");
        assert_eq!(pre.normalize("²"), "²");
        assert_eq!(pre.normalize("\u{200B}"), "");
    }

    #[test]
    fn test_normalize_ipt_folds_alphanumerics() {
        let pre = pre(Some(Normalization::Ipt));
        assert_eq!(pre.normalize("²"), "2");
        assert_eq!(pre.normalize("𝑀"), "M");
        // symbol-only sequences stay intact
        assert_eq!(pre.normalize("→"), "→");
        assert_eq!(pre.normalize("ρ"), "ρ");
    }

    #[test]
    fn test_escape_with_reserved() {
        let pre = PreTokenizer::new(
            &eu24_alphabet(),
            PreTokenizerOptions {
                normalization: Some(Normalization::Ipt),
                reserved_tokens: vec!["[RESERVED]".to_string()],
                ..PreTokenizerOptions::default()
            },
        )
        .unwrap();
        let esc = pre.escape("[RESERVED]", true, None);
        assert_eq!(esc.word, "[RESERVED]");
        // without handling, the uppercase letters are lowercased and escaped
        let esc = pre.escape("[RESERVED]", false, None);
        assert_ne!(esc.word, "[RESERVED]");
    }

    #[test]
    fn test_split_and_escape_reserved_fences() {
        let pre = PreTokenizer::new(
            &eu24_alphabet(),
            PreTokenizerOptions {
                normalization: Some(Normalization::Ipt),
                reserved_tokens: vec!["[RESERVED]".to_string()],
                ..PreTokenizerOptions::default()
            },
        )
        .unwrap();
        let (words, _) =
            pre.split_and_escape_with("[RESERVED][RESERVED]Resistivity[RESERVED]is [RESERVED]", true, None);
        let marked: Vec<String> = words.iter().map(Escaped::marked).collect();
        assert_eq!(
            marked,
            vec!["[RESERVED]", "[RESERVED]", "Yresistivity", "[RESERVED]", "is", "G", "[RESERVED]"]
        );
    }

    #[test]
    fn test_split_and_escape_ranges() {
        let pre = pre(Some(Normalization::Ipt));
        let text = "Resistivity is represented by ρ.";
        let (words, ranges) = pre.split_and_escape_with(text, false, None);
        assert_eq!(words.len(), ranges.len());
        let normalized = pre.normalize(text);
        for (word, (start, len)) in words.iter().zip(&ranges) {
            let original = &normalized[*start..start + len];
            assert_eq!(pre.unescape_escaped(word, false), original);
        }
    }

    #[test]
    fn test_unescape_and_join_roundtrip() {
        let pre = pre(Some(Normalization::Ipt));
        let text = "The SI unit of electrical resistivity is the ohm-meter (Ω⋅m).";
        let (words, ranges_before) = pre.split_and_escape_with(text, false, None);
        let marked: Vec<String> = words.iter().map(Escaped::marked).collect();
        let (joined, ranges_after) = pre.unescape_and_join_with_ranges(&marked, true);
        assert_eq!(joined, pre.normalize(text));
        assert_eq!(ranges_before, ranges_after);
    }

    #[test]
    fn test_pre_data_roundtrip() {
        let original = pre(Some(Normalization::Ipt));
        let json = serde_json::to_string(&original.to_data()).unwrap();
        let data: PreData = serde_json::from_str(&json).unwrap();
        let loaded = PreTokenizer::from_data(data).unwrap();
        assert_eq!(loaded.split("### heading 3"), original.split("### heading 3"));
        assert_eq!(loaded.normalization(), Some(Normalization::Ipt));
    }
}
