//! Alphabet definitions and the reversible escape codec.
//!
//! Encoded words are strings over a fixed alphabet: a shared ASCII block
//! (digits, punctuation and the reserved escape letters) plus a
//! language-specific block of lowercase letters. Uppercase Latin letters
//! never appear in encoded words; they are reserved for escape sequences.
//!
//! Escape format:
//! - space, newline, tab and soft hyphen map to the single letters
//!   `G`, `N`, `T`, `H`
//! - any other codepoint outside the alphabet maps to one `U<HH>` group per
//!   UTF-8 byte, `HH` in uppercase hex (`火` → `UE7U81UAB`)
//! - a leading single space and leading upper/title case are carried beside
//!   the escaped string as `(ws, up)` sidecar flags, or reattached as `G`
//!   and `Y`/`YY` prefixes in the marked form

use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

use regex::Regex;

/// Lowercase letters shared by all Latin-script languages.
pub const MIN_LATIN_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";
pub const MIN_CYRILLIC_ALPHABET: &str = "абвгдеёжзийклмнопрстуфхцчшщъыьэюя";
pub const MIN_GREEK_ALPHABET: &str = "αβγδεζηθικλμνξοπρστυφχψω";

pub const ASCII_DIGITS: &str = "0123456789";
pub const ASCII_PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// End-of-word marker. Never produced by the escape itself; the model
/// appends it to complete words.
pub const EOW: char = 'X';
/// Case marker in the marked escape form (`Y` title, `YY` upper).
pub const UPPER_MARK: char = 'Y';
/// Prefix of a `U<HH>` UTF-8 byte escape.
pub const UTF8_MARK: char = 'U';
/// Hex digits used inside `U<HH>` groups.
pub const HEX_LETTERS: &str = "ABCDEF";

pub const SPACE_MARK: char = 'G';
pub const SHY_MARK: char = 'H';
pub const NEWLINE_MARK: char = 'N';
pub const TAB_MARK: char = 'T';
/// The four single-letter whitespace/soft-hyphen escapes.
pub const ESCAPE_MARKS: &str = "GHNT";

/// Additional punctuation beyond printable ASCII.
pub const EXT_PUNCTUATION: &str = "’»«›‹„“”·¡¿…–—‐†‡§";

/// The ASCII block present in every alphabet.
pub fn ascii_all() -> String {
    format!("{ESCAPE_MARKS}{ASCII_DIGITS}{ASCII_PUNCTUATION}")
}

/// Extra lowercase letters for a language, keyed by ISO 639-1 code.
///
/// Returns `None` for unknown codes. English needs no letters beyond the
/// base Latin block and maps to the empty string.
pub fn lang_extra_letters(lang: &str) -> Option<&'static str> {
    match lang {
        "bg" => Some("абвгдеёжзийклмнопрстуфхцчшщъыьэюяйцъ"),
        "hr" => Some("čćžđš"),
        "cs" => Some("áčďéěíňóřšťúůýž"),
        "da" => Some("æøå"),
        "nl" => Some("ëéèïí"),
        "en" => Some(""),
        "et" => Some("äõöüšž"),
        "fi" => Some("åäö"),
        "fr" => Some("àâæçéèêëîïôœùûüÿ"),
        "de" => Some("äöüß"),
        "el" => Some("αβγδεζηθικλμνξοπρστυφχψωάέήίύώόϊϋΐΰς"),
        "hu" => Some("áéíóöőúüű"),
        "ga" => Some("áéíóú"),
        "it" => Some("àèéìíîòóùú"),
        "lv" => Some("āčēģīķļņšūž"),
        "lt" => Some("ąčęėįšųūž"),
        "mt" => Some("ċġħiż"),
        "pl" => Some("ąćęłńóśźż"),
        "pt" => Some("áâãàçéêíóôõú"),
        "ro" => Some("âîășț"),
        "sk" => Some("áäčďéíĺľňóôŕšťúýž"),
        "sl" => Some("čšž"),
        "es" => Some("áéíñóúü"),
        "sv" => Some("åäö"),
        "no" => Some("æøå"),
        "is" => Some("áðéíóúýæö"),
        "ru" => Some("абвгдеёжзийклмнопрстуфхцчшщъыьэюяйцъы"),
        "tr" => Some("çğıöşü"),
        _ => None,
    }
}

fn compose_alphabet(letters: &str) -> String {
    let sorted: String = letters.chars().collect::<BTreeSet<char>>().into_iter().collect();
    format!("{}{}{}", ascii_all(), EXT_PUNCTUATION, sorted)
}

/// Base Latin alphabet only.
pub fn min_alphabet() -> String {
    compose_alphabet(MIN_LATIN_ALPHABET)
}

/// German, English, French.
pub fn eu3_alphabet() -> String {
    alphabet_for_langs(&["de", "en", "fr"])
}

/// German, English, Spanish, French, Italian.
pub fn eu5_alphabet() -> String {
    alphabet_for_langs(&["de", "en", "es", "fr", "it"])
}

/// The 24 official EU languages.
pub fn eu24_alphabet() -> String {
    alphabet_for_langs(&[
        "bg", "cs", "da", "de", "el", "en", "es", "et", "fi", "fr", "ga", "hr",
        "hu", "it", "lt", "lv", "mt", "nl", "pl", "pt", "ro", "sk", "sl", "sv",
    ])
}

/// Compose an alphabet from the base Latin block plus the extra letters of
/// the given languages. Unknown codes are skipped with a warning.
pub fn alphabet_for_langs(langs: &[&str]) -> String {
    let mut letters = String::from(MIN_LATIN_ALPHABET);
    for lang in langs {
        match lang_extra_letters(lang) {
            Some(extra) => letters.push_str(extra),
            None => tracing::warn!(lang = %lang, "no alphabet defined for language"),
        }
    }
    compose_alphabet(&letters)
}

fn escape_char_into(c: char, out: &mut String) {
    match c {
        ' ' => out.push(SPACE_MARK),
        '\n' => out.push(NEWLINE_MARK),
        '\t' => out.push(TAB_MARK),
        '\u{00AD}' => out.push(SHY_MARK),
        _ => {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).as_bytes() {
                out.push(UTF8_MARK);
                out.push_str(&format!("{b:02X}"));
            }
        }
    }
}

fn unescape_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:U[0-9A-F]{2})+|[GHNT]").unwrap())
}

fn unescape_group(group: &str) -> String {
    match group {
        "G" => " ".to_string(),
        "H" => "\u{00AD}".to_string(),
        "N" => "\n".to_string(),
        "T" => "\t".to_string(),
        _ => {
            // a run of U<HH> groups decodes as one UTF-8 byte sequence
            let hex: String = group.chars().filter(|&c| c != UTF8_MARK).collect();
            let mut bytes = Vec::with_capacity(hex.len() / 2);
            for i in (0..hex.len()).step_by(2) {
                match u8::from_str_radix(&hex[i..i + 2], 16) {
                    Ok(b) => bytes.push(b),
                    Err(_) => return "?".to_string(),
                }
            }
            String::from_utf8(bytes).unwrap_or_else(|_| "?".to_string())
        }
    }
}

fn unescape_chars(s: &str) -> String {
    unescape_regex()
        .replace_all(s, |caps: &regex::Captures| unescape_group(&caps[0]))
        .into_owned()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
    }
}

fn apply_case(word: String, up: u8) -> String {
    match up {
        1 => capitalize(&word),
        2 => word.to_uppercase(),
        _ => word,
    }
}

/// Unescape a word given separately carried `(ws, up)` sidecar flags.
pub fn unescape_parts(escaped: &str, ws: u8, up: u8) -> String {
    let word = apply_case(unescape_chars(escaped), up);
    if ws > 0 {
        format!(" {word}")
    } else {
        word
    }
}

/// Unescape a marked word: a leading `G` restores the space, a leading `Y`
/// or `YY` restores title or upper case.
pub fn unescape(escaped: &str) -> String {
    if escaped.is_empty() {
        return String::new();
    }
    if escaped == "G" {
        return " ".to_string();
    }
    let mut word = escaped;
    let mut ws = 0u8;
    let mut up = 0u8;
    if word.starts_with(SPACE_MARK) {
        ws = 1;
        word = &word[1..];
    }
    if word.starts_with(UPPER_MARK) {
        up = if word.len() > 1 && word.as_bytes()[1] == UPPER_MARK as u8 { 2 } else { 1 };
        word = &word[up as usize..];
    }
    unescape_parts(word, ws, up)
}

/// A word escaped into alphabet space, with its case/whitespace sidecars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escaped {
    pub word: String,
    /// 1 when the original word carried a single leading space.
    pub ws: u8,
    /// 0 = lowercase, 1 = title case, 2 = all upper case.
    pub up: u8,
}

impl Escaped {
    pub fn plain(word: impl Into<String>) -> Self {
        Escaped { word: word.into(), ws: 0, up: 0 }
    }

    /// The marked single-string form: `G`·ws + `Y`·up + escaped word.
    pub fn marked(&self) -> String {
        let mut out = String::new();
        for _ in 0..self.ws {
            out.push(SPACE_MARK);
        }
        for _ in 0..self.up {
            out.push(UPPER_MARK);
        }
        out.push_str(&self.word);
        out
    }
}

/// Escapes and unescapes words over a fixed alphabet.
#[derive(Debug, Clone)]
pub struct Encoding {
    alphabet: String,
    alphabet_set: HashSet<char>,
}

impl Encoding {
    pub fn new(alphabet: &str) -> Self {
        Encoding {
            alphabet: alphabet.to_string(),
            alphabet_set: alphabet.chars().collect(),
        }
    }

    pub fn alphabet(&self) -> &str {
        &self.alphabet
    }

    pub fn contains(&self, c: char) -> bool {
        self.alphabet_set.contains(&c)
    }

    /// Escape a word into alphabet space with `(ws, up)` sidecars.
    pub fn escape(&self, word: &str) -> Escaped {
        if word.is_empty() {
            return Escaped::plain("");
        }
        if word == " " {
            return Escaped::plain(SPACE_MARK.to_string());
        }

        let mut rest = word;
        let mut ws = 0u8;
        let mut chars = word.chars();
        let first = chars.next();
        let second = chars.next();
        if first == Some(' ') && second != Some(' ') {
            ws = 1;
            rest = &word[1..];
        }

        let mut chars = rest.chars();
        let first = chars.next();
        let second = chars.next();
        let up = if first.is_some_and(char::is_uppercase) {
            if second.is_some_and(char::is_uppercase) { 2 } else { 1 }
        } else {
            0
        };

        // lower always, to guard against splits landing before uppercase letters
        let lowered = rest.to_lowercase();
        let mut escaped = String::with_capacity(lowered.len());
        for c in lowered.chars() {
            if self.alphabet_set.contains(&c) {
                escaped.push(c);
            } else {
                escape_char_into(c, &mut escaped);
            }
        }
        Escaped { word: escaped, ws, up }
    }

    /// Escape into the marked single-string form.
    pub fn escape_marked(&self, word: &str) -> String {
        self.escape(word).marked()
    }

    /// See the module-level [`unescape`].
    pub fn unescape(&self, escaped: &str) -> String {
        unescape(escaped)
    }
}
