//! Decomposition of escaped words into (base, rule, span) triples.
//!
//! The fast path joins stem matches against suffix matches via three tries:
//! the base trie (op-less rules), a suffix trie, and a stem trie keyed by
//! `op.apply(base)` for every admissible (base, rule-with-op) pair. The stem
//! trie is the expensive one; it is built lazily on first use so that
//! one-shot encodes and `force_slow` training never pay for it.
//!
//! The slow path instead matches suffixes back-to-front and attempts
//! `op.revert` on the remaining stem.
//!
//! All span indices are byte offsets into the escaped word; minimum base
//! lengths count characters.

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::alphabet::{EOW, SPACE_MARK};
use crate::langs::{self, LangMask};
use crate::rules::SuffixRule;
use crate::trie::{DictTrie, LookupTrie};
use crate::Error;

/// One decomposition edge: `(base_id, rule_id, start, end)` with
/// `word[start..end] = rule.apply(vocab[base_id])`.
pub type Decomposition = (u32, u32, usize, usize);

#[derive(Debug)]
struct StemIndex {
    trie: LookupTrie<(usize, usize)>,
}

#[derive(Debug)]
pub struct Morpher {
    langs: Vec<String>,
    vocab: Vec<String>,
    rules: Vec<SuffixRule>,
    vocab_langs: Option<Vec<LangMask>>,
    rules_langs: Vec<LangMask>,
    min_base_length: usize,
    any_op: bool,
    vocab_char_len: Vec<usize>,
    base_trie: DictTrie<usize>,
    suffix_trie: LookupTrie<usize>,
    reverse_suffix_trie: LookupTrie<usize>,
    stem_index: OnceLock<Option<StemIndex>>,
}

impl Morpher {
    pub fn new(
        langs: Vec<String>,
        vocab: Vec<String>,
        rules: Vec<SuffixRule>,
        vocab_langs: Option<Vec<LangMask>>,
        rules_langs: Option<Vec<LangMask>>,
        min_base_length: usize,
        prebuild_stem_trie: bool,
    ) -> Result<Self, Error> {
        if rules.len() < 2 {
            return Err(Error::Config(
                "need at least the two default rules (empty rule, end of word rule)".to_string(),
            ));
        }
        if !(rules[0].suffix.is_empty() && rules[0].is_default_shape()) {
            return Err(Error::Config("first rule must be the default empty rule".to_string()));
        }
        if !(rules[1].suffix == EOW.to_string() && rules[1].is_default_shape()) {
            return Err(Error::Config(
                "second rule must be the default end-of-word rule".to_string(),
            ));
        }
        if let Some(vl) = &vocab_langs {
            if vl.len() != vocab.len() {
                return Err(Error::Config("vocab_langs must match vocab length".to_string()));
            }
        }
        let rules_langs = match rules_langs {
            Some(masks) => {
                if masks.len() != rules.len() {
                    return Err(Error::Config("rules_langs must match rules length".to_string()));
                }
                masks
            }
            None => langs::rules_masks(&langs, &rules)?,
        };

        let any_op = rules.iter().any(|r| r.op.is_some());
        let vocab_char_len = vocab.iter().map(|v| v.chars().count()).collect();
        let base_trie = DictTrie::from_pairs(vocab.iter().enumerate().map(|(i, v)| (v, i)));
        let suffix_trie =
            LookupTrie::from_pairs(rules.iter().enumerate().map(|(i, r)| (&r.suffix, i)));
        let reverse_suffix_trie = LookupTrie::from_pairs(
            rules
                .iter()
                .enumerate()
                .map(|(i, r)| (r.suffix.chars().rev().collect::<String>(), i)),
        );

        let morpher = Morpher {
            langs,
            vocab,
            rules,
            vocab_langs,
            rules_langs,
            min_base_length,
            any_op,
            vocab_char_len,
            base_trie,
            suffix_trie,
            reverse_suffix_trie,
            stem_index: OnceLock::new(),
        };
        if prebuild_stem_trie {
            let _ = morpher.stem_index();
        }
        Ok(morpher)
    }

    pub fn langs(&self) -> &[String] {
        &self.langs
    }

    pub fn vocab(&self) -> &[String] {
        &self.vocab
    }

    pub fn rules(&self) -> &[SuffixRule] {
        &self.rules
    }

    pub fn min_base_length(&self) -> usize {
        self.min_base_length
    }

    fn min_len_for(&self, rule: &SuffixRule) -> usize {
        rule.min_base_length.unwrap_or(self.min_base_length)
    }

    fn stem_index(&self) -> Option<&StemIndex> {
        if !self.any_op {
            return None;
        }
        self.stem_index
            .get_or_init(|| {
                let mut pairs: HashSet<(String, usize, usize)> = HashSet::new();
                for (j, rule) in self.rules.iter().enumerate() {
                    let Some(op) = &rule.op else { continue };
                    for (i, base) in self.vocab.iter().enumerate() {
                        if self.vocab_char_len[i] < self.min_len_for(rule) {
                            continue;
                        }
                        if let Some(vl) = &self.vocab_langs {
                            if vl[i] & self.rules_langs[j] == 0 {
                                continue;
                            }
                        }
                        if op.can_apply(base) {
                            let stem = op.apply(base);
                            if !op.can_revert(&stem) {
                                debug_assert!(
                                    false,
                                    "op of rule {j} cannot revert stem {stem:?} of base {base:?}"
                                );
                                continue;
                            }
                            pairs.insert((stem, i, j));
                        }
                    }
                }
                if pairs.is_empty() {
                    None
                } else {
                    Some(StemIndex {
                        trie: LookupTrie::from_pairs(
                            pairs.into_iter().map(|(stem, i, j)| (stem, (i, j))),
                        ),
                    })
                }
            })
            .as_ref()
    }

    /// All valid decompositions of `word`, optionally restricted to a
    /// language mask. `force_slow` avoids building the stem trie.
    pub fn decompose(
        &self,
        word: &str,
        lang_mask: Option<LangMask>,
        force_slow: bool,
    ) -> Vec<Decomposition> {
        if force_slow {
            self.decompose_slow(word, lang_mask)
        } else {
            self.decompose_fast(word, lang_mask)
        }
    }

    /// Convenience wrapper resolving language names to a mask.
    pub fn decompose_langs(
        &self,
        word: &str,
        query: Option<&[&str]>,
        force_slow: bool,
    ) -> Vec<Decomposition> {
        self.decompose(word, langs::langs_mask(&self.langs, query), force_slow)
    }

    /// Decompositions of one part as `(base_id, rule_id)`: the part must
    /// equal `op.apply(base) + suffix` in full.
    fn decompose_single(&self, part: &str, lang_mask: Option<LangMask>, out: &mut Vec<(u32, u32)>) {
        let eow = part.ends_with(EOW);
        let reversed: String = part.chars().rev().collect();
        for (suffix_len, rule_ids) in self.reverse_suffix_trie.prefixes_and_values(&reversed) {
            let stem = &part[..part.len() - suffix_len];
            let suffix = &part[part.len() - suffix_len..];
            if eow && !suffix.ends_with(EOW) {
                continue;
            }
            for &rule_idx in rule_ids {
                let rule = &self.rules[rule_idx];
                if let Some(mask) = lang_mask {
                    if rule_idx > 1 && self.rules_langs[rule_idx] & mask == 0 {
                        continue;
                    }
                }
                let base = match &rule.op {
                    None => {
                        if stem.is_empty() {
                            continue;
                        }
                        stem.to_string()
                    }
                    Some(op) => {
                        if !op.can_revert(stem) {
                            continue;
                        }
                        op.revert(stem)
                    }
                };
                // short bases are reserved for the default rules 0 and 1
                if rule_idx >= 2 && base.chars().count() < self.min_len_for(rule) {
                    continue;
                }
                let Some(&base_idx) = self.base_trie.get(&base) else { continue };
                if !rule.matches_constraint(&base) {
                    continue;
                }
                if let Some(vl) = &self.vocab_langs {
                    if let Some(mask) = lang_mask {
                        if vl[base_idx] & mask == 0 {
                            continue;
                        }
                    }
                    if rule_idx > 1 && vl[base_idx] & self.rules_langs[rule_idx] == 0 {
                        continue;
                    }
                }
                out.push((base_idx as u32, rule_idx as u32));
            }
        }
    }

    /// Slow path: enumerate every span and revert-match it. No stem trie.
    pub fn decompose_slow(&self, word: &str, lang_mask: Option<LangMask>) -> Vec<Decomposition> {
        let mut bounds: Vec<usize> = word.char_indices().map(|(i, _)| i).collect();
        bounds.push(word.len());
        let mut out = Vec::new();
        let mut part_ids = Vec::new();
        for (bi, &i) in bounds.iter().enumerate() {
            for &j in &bounds[bi + 1..] {
                part_ids.clear();
                self.decompose_single(&word[i..j], lang_mask, &mut part_ids);
                out.extend(part_ids.iter().map(|&(b, r)| (b, r, i, j)));
            }
        }
        out
    }

    /// Fast path: join stem-trie and suffix-trie prefix matches. Builds the
    /// stem trie on first use.
    pub fn decompose_fast(&self, word: &str, lang_mask: Option<LangMask>) -> Vec<Decomposition> {
        let stem_index = self.stem_index();
        let n = word.len();

        // (stem_len, base_idx, rule restricted to) per start position
        let mut stems: Vec<Vec<(usize, usize, Option<usize>)>> = vec![Vec::new(); n];
        // (suffix_len, rule_idx) per join position; the empty rule always applies
        let mut rules_at: Vec<Vec<(usize, usize)>> = vec![vec![(0, 0)]; n + 1];

        for (i, _) in word.char_indices() {
            let tail = &word[i..];

            if i > 0 {
                for (suffix_len, rule_ids) in self.suffix_trie.prefixes_and_values(tail) {
                    for &rule_idx in rule_ids {
                        if rule_idx == 0 {
                            continue;
                        }
                        if let Some(mask) = lang_mask {
                            if rule_idx > 1 && self.rules_langs[rule_idx] & mask == 0 {
                                continue;
                            }
                        }
                        rules_at[i].push((suffix_len, rule_idx));
                    }
                }
            }

            for (base_len, &base_idx) in self.base_trie.prefixes_and_values(tail) {
                stems[i].push((base_len, base_idx, None));
            }

            if let Some(index) = stem_index {
                for (stem_len, pairs) in index.trie.prefixes_and_values(tail) {
                    for &(base_idx, rule_idx) in pairs {
                        stems[i].push((stem_len, base_idx, Some(rule_idx)));
                    }
                }
            }
        }

        let mut out = Vec::new();
        for (i, _) in word.char_indices() {
            for &(stem_len, base_idx, allowed_rule) in &stems[i] {
                let base = &self.vocab[base_idx];
                let j = i + stem_len;
                for &(suffix_len, rule_idx) in &rules_at[j] {
                    if allowed_rule.is_some_and(|allowed| allowed != rule_idx) {
                        continue;
                    }
                    let rule = &self.rules[rule_idx];
                    if rule_idx >= 2 && self.vocab_char_len[base_idx] < self.min_len_for(rule) {
                        continue;
                    }
                    // op rules only reach a base through its stem-trie entry
                    if allowed_rule.is_none() && rule.op.is_some() {
                        continue;
                    }
                    if !rule.matches_constraint(base) {
                        continue;
                    }
                    if let Some(vl) = &self.vocab_langs {
                        if let Some(mask) = lang_mask {
                            if vl[base_idx] & mask == 0 {
                                continue;
                            }
                        }
                        if rule_idx > 1 && vl[base_idx] & self.rules_langs[rule_idx] == 0 {
                            continue;
                        }
                    }
                    out.push((base_idx as u32, rule_idx as u32, i, j + suffix_len));
                }
            }
        }
        out
    }

    /// Compose `(base_id, rule_id)` pairs back into surface parts.
    pub fn compose(&self, ids: &[(u32, u32)]) -> Vec<String> {
        ids.iter()
            .filter_map(|&(base_id, rule_id)| {
                let base = self.vocab.get(base_id as usize)?;
                let rule = self.rules.get(rule_id as usize)?;
                Some(rule.apply(base))
            })
            .collect()
    }

    /// Human-readable markup for a token sequence, e.g. `ru[n->nn]+ingX`.
    /// Parts are joined with `|`; escaped spaces render as spaces.
    pub fn format(&self, ids: &[(u32, u32)]) -> String {
        let parts: Vec<String> = ids
            .iter()
            .filter_map(|&(base_id, rule_id)| {
                let base = self.vocab.get(base_id as usize)?;
                let rule = self.rules.get(rule_id as usize)?;
                let marked = match &rule.op {
                    Some(op) if op.apply(base) != *base => op.format_markup(base),
                    _ => base.clone(),
                };
                let marked = marked.replace(SPACE_MARK, " ");
                Some(format!("{marked}+{}", rule.suffix))
            })
            .collect();
        parts.join("|")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{default_rules, suffix_rules, MorphOp, RegexOp};

    fn en_rules() -> Vec<SuffixRule> {
        let doubling = MorphOp::Regex(
            RegexOp::new(r"([bdfgklmnprst])$", "$1$1", r"([bdfgklmnprst])\1$", "$1").unwrap(),
        );
        let mut rules = default_rules();
        rules.extend(suffix_rules("en", &["ing", "s", "ed"], None, None).unwrap());
        rules.extend(suffix_rules("en", &["ing", "er"], Some(doubling), None).unwrap());
        rules
    }

    fn morpher(vocab: &[&str], rules: Vec<SuffixRule>) -> Morpher {
        Morpher::new(
            vec!["en".to_string()],
            vocab.iter().map(|s| s.to_string()).collect(),
            rules,
            None,
            None,
            2,
            false,
        )
        .unwrap()
    }

    fn spans(decs: &[Decomposition], word_len: usize) -> Vec<Decomposition> {
        decs.iter().copied().filter(|&(_, _, i, j)| i == 0 && j == word_len).collect()
    }

    #[test]
    fn test_fast_and_slow_agree() {
        let m = morpher(&["run", "ru", "ning"], en_rules());
        let word = "runningX";
        let mut fast = m.decompose(word, None, false);
        let mut slow = m.decompose(word, None, true);
        fast.sort_unstable();
        slow.sort_unstable();
        assert_eq!(fast, slow);
        assert!(!fast.is_empty());
    }

    #[test]
    fn test_doubling_rule_spans_word() {
        let m = morpher(&["run"], en_rules());
        let word = "runningX";
        let full = spans(&m.decompose(word, None, false), word.len());
        // run + [n->nn]ing + X
        assert!(full.iter().any(|&(b, r, _, _)| {
            m.vocab()[b as usize] == "run" && m.rules()[r as usize].suffix == "ingX"
        }));
        for (b, r, i, j) in m.decompose(word, None, false) {
            let surface = m.rules()[r as usize].apply(&m.vocab()[b as usize]);
            assert_eq!(surface, &word[i..j]);
        }
    }

    #[test]
    fn test_min_base_length_gates_non_default_rules() {
        let mut rules = default_rules();
        rules.extend(suffix_rules("en", &["s"], None, None).unwrap());
        let m = morpher(&["a", "ab"], rules);
        // "a" is below the minimum base length: only default rules may use it
        let decs = m.decompose("asX", None, true);
        assert!(!decs
            .iter()
            .any(|&(b, r, _, _)| m.vocab()[b as usize] == "a" && r >= 2));
        // "ab" is long enough
        let decs = m.decompose("absX", None, true);
        assert!(decs
            .iter()
            .any(|&(b, r, _, _)| m.vocab()[b as usize] == "ab"
                && m.rules()[r as usize].suffix == "sX"));
    }

    #[test]
    fn test_lang_mask_filters_rules() {
        let mut rules = default_rules();
        rules.extend(suffix_rules("de", &["ung"], None, None).unwrap());
        let m = Morpher::new(
            vec!["de".to_string(), "en".to_string()],
            vec!["tag".to_string()],
            rules,
            None,
            None,
            2,
            false,
        )
        .unwrap();
        let de = langs::langs_mask(m.langs(), Some(&["de"]));
        let en = langs::langs_mask(m.langs(), Some(&["en"]));
        let with_de = m.decompose("tagungX", de, true);
        let with_en = m.decompose("tagungX", en, true);
        assert!(with_de.iter().any(|&(_, r, _, _)| m.rules()[r as usize].suffix == "ungX"));
        assert!(!with_en.iter().any(|&(_, r, _, _)| m.rules()[r as usize].suffix == "ungX"));
    }

    #[test]
    fn test_compose_inverts_decompose() {
        let m = morpher(&["run"], en_rules());
        let word = "runningX";
        let full: Vec<(u32, u32)> = spans(&m.decompose(word, None, false), word.len())
            .iter()
            .map(|&(b, r, _, _)| (b, r))
            .collect();
        for &(b, r) in &full {
            assert_eq!(m.compose(&[(b, r)]).concat(), word);
        }
    }

    #[test]
    fn test_format_markup() {
        let m = morpher(&["run", "tr"], en_rules());
        let run_id = m.vocab().iter().position(|v| v == "run").unwrap() as u32;
        let ing_id = m
            .rules()
            .iter()
            .position(|r| r.suffix == "ingX" && r.op.is_some())
            .unwrap() as u32;
        assert_eq!(m.format(&[(run_id, ing_id)]), "ru[n->nn]+ingX");
    }

    #[test]
    fn test_missing_default_rules_rejected() {
        let rules = suffix_rules("en", &["ing"], None, None).unwrap();
        let result = Morpher::new(
            vec!["en".to_string()],
            vec!["run".to_string()],
            rules,
            None,
            None,
            2,
            false,
        );
        assert!(result.is_err());
    }
}
