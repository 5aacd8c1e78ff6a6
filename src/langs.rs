//! Language sets as fixed-width bitmasks.
//!
//! A mask is a bitset over the model's ordered language list. One uniform
//! 64-bit width keeps the tying code simple; more than 64 languages is a
//! configuration error.

use crate::rules::SuffixRule;
use crate::Error;

pub type LangMask = u64;

/// Maximum number of languages a single model can tie over.
pub const MAX_LANGS: usize = 64;

/// Mask with the low `n` bits set.
pub fn full_mask(n: usize) -> LangMask {
    if n >= MAX_LANGS {
        LangMask::MAX
    } else {
        (1 << n) - 1
    }
}

/// Per-rule language masks. Language-agnostic rules get the all-ones mask;
/// a rule naming a language outside `langs` is a configuration error.
pub fn rules_masks(langs: &[String], rules: &[SuffixRule]) -> Result<Vec<LangMask>, Error> {
    if langs.len() > MAX_LANGS {
        return Err(Error::Config(format!(
            "{} languages exceed the {MAX_LANGS}-bit mask width",
            langs.len()
        )));
    }
    let mut masks = Vec::with_capacity(rules.len());
    for rule in rules {
        let mask = match rule.langs() {
            None => full_mask(langs.len()),
            Some(rule_langs) => {
                let mut mask = 0;
                for lang in rule_langs {
                    let bit = langs.iter().position(|l| l == lang).ok_or_else(|| {
                        Error::Config(format!("rule language {lang:?} not in language list"))
                    })?;
                    mask |= 1 << bit;
                }
                mask
            }
        };
        masks.push(mask);
    }
    Ok(masks)
}

/// Mask for a set of query languages. `None` (or an empty / all-unknown set)
/// means no restriction.
pub fn langs_mask(langs: &[String], query: Option<&[&str]>) -> Option<LangMask> {
    let query = query?;
    if query.is_empty() {
        return None;
    }
    let mut mask = 0;
    for lang in query {
        if let Some(bit) = langs.iter().position(|l| l == lang) {
            mask |= 1 << bit;
        }
    }
    if mask == 0 {
        None
    } else {
        Some(mask)
    }
}

/// Mask for a single optional query language.
pub fn lang_mask(langs: &[String], query: Option<&str>) -> Option<LangMask> {
    match query {
        None => None,
        Some(lang) => langs_mask(langs, Some(&[lang])),
    }
}
