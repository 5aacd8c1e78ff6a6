//! Unigram-style EM training over the morphological lattice.
//!
//! The trainer generates a large candidate pool from word substrings, then
//! alternates expectation (posterior edge marginals summed over the corpus)
//! with a digamma M-step, pruning the vocabulary between iterations until
//! the target size is reached. Protected tokens — reserved tokens, the
//! alphabet, the escape letters and the seed lists — are never pruned.
//!
//! The corpus is sharded into interleaved stripes and processed on rayon
//! workers; the model is read-only within a pass and the reductions are
//! elementwise sums and bitwise ORs.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use crate::alphabet::{self, EOW, ESCAPE_MARKS, NEWLINE_MARK, SHY_MARK, SPACE_MARK, TAB_MARK, UTF8_MARK};
use crate::langs::{full_mask, LangMask};
use crate::model::{Model, ModelConfig, DEFAULT_ALPHA, DEFAULT_BETA, MIN_LOGIT};
use crate::pre::{default_reserved_tokens, UNK_TOKEN};
use crate::rules::SuffixRule;
use crate::Error;

/// Single digits, double digits and `000`.
pub fn default_number_seed() -> Vec<String> {
    let mut seed: Vec<String> = (0..10).map(|d| format!("{d}")).collect();
    seed.extend((0..100).map(|d| format!("{d:02}")));
    seed.push("000".to_string());
    seed
}

/// Runs of escaped spaces, newlines and tabs in power-of-two lengths.
pub fn default_ws_seed() -> Vec<String> {
    let mut seed = Vec::new();
    for i in 0..4 {
        let n = 1usize << i;
        for mark in [SPACE_MARK, NEWLINE_MARK, TAB_MARK] {
            seed.push(mark.to_string().repeat(n));
        }
    }
    seed
}

/// Markup character runs in power-of-two lengths.
pub fn default_markup_seed() -> Vec<String> {
    let mut seed = Vec::new();
    for i in 0..4 {
        let n = 1usize << i;
        for c in ['#', '=', '-', '+', '*', '_'] {
            seed.push(c.to_string().repeat(n));
        }
    }
    seed
}

/// All `U<HH>` groups that can open or continue a multi-byte UTF-8
/// sequence, guaranteeing escape coverage for arbitrary codepoints.
pub fn default_utf8_seed() -> Vec<String> {
    let mut seed = Vec::new();
    let ranges: [(u32, u32); 4] = [
        (0xC0, 0x20), // multi-byte start: 110xxxxx
        (0xE0, 0x10), // multi-byte start: 1110xxxx
        (0xF0, 0x08), // multi-byte start: 11110xxx
        (0x80, 0x40), // continuation: 10xxxxxx
    ];
    for (start, count) in ranges {
        for b in start..start + count {
            seed.push(format!("{UTF8_MARK}{b:02X}"));
        }
    }
    seed
}

/// The full default seed list: digits, whitespace runs, markup runs and
/// UTF-8 prefix bytes.
pub fn default_seed_tokens() -> Vec<String> {
    let mut seed = default_number_seed();
    seed.extend(default_ws_seed());
    seed.extend(default_markup_seed());
    seed.extend(default_utf8_seed());
    seed
}

#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub vocab_size: usize,
    pub alphabet: String,
    /// The single-letter escapes; protected alongside the alphabet.
    pub escape_chars: String,
    pub reserved_tokens: Vec<String>,
    pub unk_token: String,
    /// Candidate pool size = `spread_factor × vocab_size`.
    pub spread_factor: f64,
    pub max_token_length: usize,
    /// Only substrings matching this (anchored) regex become candidates.
    pub token_regex: Option<String>,
    /// Word counts are raised to this exponent before training.
    pub discount_exponent: f64,
    pub min_count: f64,
    pub seed_tokens: Vec<String>,
    /// Logit forced onto seed tokens at finalization.
    pub seed_token_logit: Option<f32>,
    pub skip_numbers: bool,
    pub iterations: usize,
    pub alpha: f32,
    pub beta: f32,
    pub min_base_len: usize,
    pub tie_by_langs: bool,
    /// Upsample languages whose total count falls below this fraction of
    /// the dominant language.
    pub min_balance_langs: Option<f64>,
    /// Worker count; 0 uses all available cores.
    pub workers: usize,
    /// Never build the stem trie; slow-path decomposition throughout.
    pub force_slow: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            vocab_size: 24 * 1024,
            alphabet: alphabet::eu3_alphabet(),
            escape_chars: ESCAPE_MARKS.to_string(),
            reserved_tokens: default_reserved_tokens(),
            unk_token: UNK_TOKEN.to_string(),
            spread_factor: 16.0,
            max_token_length: 12,
            token_regex: None,
            discount_exponent: 1.0,
            min_count: 1.0,
            seed_tokens: default_seed_tokens(),
            seed_token_logit: Some(0.0),
            skip_numbers: true,
            iterations: 10,
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
            min_base_len: 2,
            tie_by_langs: false,
            min_balance_langs: None,
            workers: 0,
            force_slow: false,
        }
    }
}

#[derive(Debug, Clone)]
struct PreparedWord {
    word: String,
    count: f64,
    lang: Option<String>,
}

/// Splits a list into `n` interleaved stripes, balancing work across
/// shards more evenly than contiguous slabs.
pub(crate) fn chunk_list<T: Clone>(items: &[T], n: usize) -> Vec<Vec<T>> {
    let n = n.max(1);
    (0..n)
        .map(|i| items.iter().skip(i).step_by(n).cloned().collect())
        .collect()
}

pub struct Trainer {
    config: TrainerConfig,
    protected_list: Vec<String>,
    protected: HashSet<String>,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Result<Self, Error> {
        if config.iterations < 2 {
            return Err(Error::Config("training needs at least two iterations".into()));
        }
        // reserved tokens come first, then alphabet and seed tokens
        let mut protected_list = config.reserved_tokens.clone();
        let mut protected: HashSet<String> = protected_list.iter().cloned().collect();
        if protected.len() != protected_list.len() {
            return Err(Error::Config("duplicate tokens in reserved tokens".into()));
        }
        let singles = config.escape_chars.chars().chain(config.alphabet.chars());
        for token in singles.map(String::from).chain(config.seed_tokens.iter().cloned()) {
            if protected.insert(token.clone()) {
                protected_list.push(token);
            }
        }
        Ok(Trainer { config, protected_list, protected })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn protected_tokens(&self) -> &[String] {
        &self.protected_list
    }

    fn workers(&self) -> usize {
        if self.config.workers > 0 {
            self.config.workers
        } else {
            rayon::current_num_threads().max(1)
        }
    }

    /// Train a model from word counts. Words must already be escaped and
    /// normalized. Supply `words_by_lang` for balancing and language tying;
    /// both views may be given together.
    pub fn train(
        &self,
        rules: Vec<SuffixRule>,
        words: Option<HashMap<String, f64>>,
        words_by_lang: Option<HashMap<String, HashMap<String, f64>>>,
        eval_words: &[String],
    ) -> Result<Model, Error> {
        if words.is_none() && words_by_lang.is_none() {
            return Err(Error::Config("either words or words_by_lang must be provided".into()));
        }

        let mut langs: Vec<String> = rules
            .iter()
            .filter_map(|r| r.langs())
            .flatten()
            .cloned()
            .chain(words_by_lang.iter().flat_map(|m| m.keys().cloned()))
            .collect();
        langs.sort();
        langs.dedup();

        let words = self.prepare_words(words, words_by_lang.as_ref());

        tracing::info!(words = words.len(), "building initial candidates");
        let mut candidates = self.generate_candidates(&words)?;
        let candidate_set: HashSet<&String> = candidates.iter().collect();
        let missing: Vec<String> = self
            .protected_list
            .iter()
            .filter(|t| !candidate_set.contains(*t))
            .cloned()
            .collect();
        drop(candidate_set);
        candidates.extend(missing);

        let prune_rate = 1.0
            - (candidates.len() as f64 / self.config.vocab_size as f64)
                .powf(-1.0 / (self.config.iterations as f64 - 1.0));

        let mut final_pass = false;
        let mut trained: Option<Model> = None;
        for it in 0..self.config.iterations {
            tracing::info!(iteration = it, candidates = candidates.len(), "EM iteration");
            let mut model = Model::new(
                candidates.clone(),
                rules.clone(),
                vec![0.0; candidates.len()],
                vec![0.0; rules.len()],
                ModelConfig {
                    alpha: self.config.alpha,
                    beta: self.config.beta,
                    min_base_len: self.config.min_base_len,
                    langs: Some(langs.clone()),
                    ..ModelConfig::default()
                },
            )?;
            model.reset_logits();

            let sub_iterations = if final_pass { 3 } else { 2 };
            for sub in 0..sub_iterations {
                let (nll, m_vocab, m_rules) = self.step_e(&model, &words)?;
                model.update_logits(&m_vocab, &m_rules);
                tracing::info!(iteration = it, sub, nll, "E/M step");
            }

            self.eval_model(&model, eval_words);

            if final_pass {
                trained = Some(model);
                break;
            }

            let mut prune_count = ((candidates.len() as f64 * prune_rate) as i64)
                .min(candidates.len() as i64 - self.config.vocab_size as i64);
            if it + 2 == self.config.iterations || prune_count == 0 {
                prune_count = candidates.len() as i64 - self.config.vocab_size as i64;
                final_pass = true;
            }

            if prune_count > 0 {
                let remove = self.prune(&model, &words, prune_count as usize)?;
                candidates.retain(|c| !remove.contains(c));
                tracing::info!(pruned = remove.len(), left = candidates.len(), "pruned tokens");
            }
            trained = Some(model);
        }

        let mut model =
            trained.ok_or_else(|| Error::Config("training produced no model".into()))?;
        self.finalize_model(&mut model)?;

        if self.config.tie_by_langs {
            self.tie_model(&mut model, &words)?;
            self.eval_model(&model, eval_words);
            let untied = model
                .vocab_langs()
                .map(|vl| vl[self.protected_list.len()..].iter().filter(|&&m| m == 0).count())
                .unwrap_or(0);
            tracing::info!(untied, "language tying complete");
        }

        Ok(model)
    }

    /// Balance, filter and discount word counts; resolve each word's
    /// primary language; strip the trailing soft hyphen of continuation
    /// words and append the end-of-word marker to all others.
    fn prepare_words(
        &self,
        words: Option<HashMap<String, f64>>,
        words_by_lang: Option<&HashMap<String, HashMap<String, f64>>>,
    ) -> Vec<PreparedWord> {
        let mut counts: HashMap<String, f64> = words.unwrap_or_default();

        if let Some(by_lang) = words_by_lang {
            if let Some(min_balance) = self.config.min_balance_langs {
                let totals: HashMap<&String, f64> = by_lang
                    .iter()
                    .map(|(lang, lw)| (lang, lw.values().sum::<f64>()))
                    .collect();
                let dominant = totals.values().cloned().fold(0.0, f64::max);
                for (lang, lang_words) in by_lang {
                    let total = totals[lang];
                    let factor = if total < min_balance * dominant && total > 0.0 {
                        min_balance * dominant / total
                    } else {
                        1.0
                    };
                    tracing::info!(lang = %lang, factor, "upsampling language");
                    for (word, count) in lang_words {
                        if self.config.reserved_tokens.contains(word) {
                            continue;
                        }
                        *counts.entry(word.clone()).or_insert(0.0) += count * factor;
                    }
                }
            } else {
                for lang_words in by_lang.values() {
                    for (word, count) in lang_words {
                        *counts.entry(word.clone()).or_insert(0.0) += count;
                    }
                }
            }
        }

        let mut surviving: Vec<(String, f64)> = counts
            .into_iter()
            .filter(|(word, count)| {
                *count >= self.config.min_count
                    && !word.is_empty()
                    && !self.protected.contains(word)
                    && !(self.config.skip_numbers
                        && word.chars().all(|c| c.is_ascii_digit()))
            })
            .map(|(word, count)| (word, count.powf(self.config.discount_exponent)))
            .collect();
        surviving.sort_by(|a, b| a.0.cmp(&b.0));

        let mut prepared = Vec::with_capacity(surviving.len());
        for (word, count) in surviving {
            let lang = if self.config.tie_by_langs {
                words_by_lang.and_then(|by_lang| {
                    if by_lang.len() > 1 {
                        by_lang
                            .iter()
                            .map(|(lang, lw)| (lang, lw.get(&word).copied().unwrap_or(0.0)))
                            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(a.0)))
                            .map(|(lang, _)| lang.clone())
                    } else {
                        None
                    }
                })
            } else {
                None
            };
            let word = if word.chars().count() > 1 && word.ends_with(SHY_MARK) {
                word[..word.len() - 1].to_string()
            } else {
                format!("{word}{EOW}")
            };
            prepared.push(PreparedWord { word, count, lang });
        }
        prepared
    }

    /// Count every admissible substring and keep the heaviest
    /// `spread_factor × vocab_size` as the initial candidate pool.
    fn generate_candidates(&self, words: &[PreparedWord]) -> Result<Vec<String>, Error> {
        let token_regex = self
            .config
            .token_regex
            .as_deref()
            .map(|p| {
                regex::Regex::new(&format!("^(?:{p})"))
                    .map_err(|e| Error::Config(format!("invalid token regex: {e}")))
            })
            .transpose()?;

        let mut counts: HashMap<String, f64> = HashMap::new();
        for pw in words {
            let word = &pw.word;
            let mut bounds: Vec<usize> = word.char_indices().map(|(i, _)| i).collect();
            bounds.push(word.len());
            // avoid dangling end-of-word markers
            let char_len = bounds.len() - 1;
            let usable = if word.ends_with(EOW) { char_len - 1 } else { char_len };
            for i in 0..usable {
                let hi = (i + self.config.max_token_length).min(usable);
                for j in (i + 2)..=hi {
                    let token = &word[bounds[i]..bounds[j]];
                    if token_regex.as_ref().is_some_and(|re| !re.is_match(token)) {
                        continue;
                    }
                    *counts.entry(token.to_string()).or_insert(0.0) += pw.count;
                }
            }
        }

        let mut ranked: Vec<(String, f64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let pool = (self.config.vocab_size as f64 * self.config.spread_factor) as usize;
        ranked.truncate(pool);
        Ok(ranked.into_iter().map(|(token, _)| token).collect())
    }

    /// One E-step over the corpus: per-word NLL plus expected counts,
    /// sharded across workers.
    fn step_e(
        &self,
        model: &Model,
        words: &[PreparedWord],
    ) -> Result<(f64, Vec<f64>, Vec<f64>), Error> {
        let force_slow = self.config.force_slow;
        let chunks = chunk_list(words, self.workers());
        let results: Result<Vec<_>, Error> = chunks
            .par_iter()
            .map(|chunk| step_e_single(model, chunk, force_slow))
            .collect();

        let mut nll_sum = 0.0;
        let mut total = 0.0;
        let mut m_vocab = vec![0.0; model.vocab().len()];
        let mut m_rules = vec![0.0; model.rules().len()];
        for (chunk_nll, chunk_total, chunk_vocab, chunk_rules) in results? {
            nll_sum += chunk_nll;
            total += chunk_total;
            add_arrays(&mut m_vocab, &chunk_vocab);
            add_arrays(&mut m_rules, &chunk_rules);
        }
        Ok((nll_sum / total, m_vocab, m_rules))
    }

    /// Removal losses per vocabulary entry, sharded across workers.
    fn compute_losses(&self, model: &Model, words: &[PreparedWord]) -> Result<Vec<f64>, Error> {
        let force_slow = self.config.force_slow;
        let chunks = chunk_list(words, self.workers());
        let results: Result<Vec<_>, Error> = chunks
            .par_iter()
            .map(|chunk| {
                let mut losses = vec![0.0; model.vocab().len()];
                for pw in chunk {
                    model.add_vocab_loss(
                        &pw.word,
                        pw.count,
                        pw.lang.as_deref(),
                        &mut losses,
                        force_slow,
                    )?;
                }
                Ok(losses)
            })
            .collect();

        let mut losses = vec![0.0; model.vocab().len()];
        for chunk_losses in results? {
            add_arrays(&mut losses, &chunk_losses);
        }
        Ok(losses)
    }

    /// Select tokens to remove: clamped-logit tokens first, then smallest
    /// summed removal loss. Protected tokens never leave.
    fn prune(
        &self,
        model: &Model,
        words: &[PreparedWord],
        prune_count: usize,
    ) -> Result<HashSet<String>, Error> {
        let mut unused: HashSet<String> = HashSet::new();
        for (token, &logit) in model.vocab().iter().zip(model.vocab_logits()) {
            if logit <= MIN_LOGIT && !self.protected.contains(token) {
                unused.insert(token.clone());
            }
        }
        if unused.len() > prune_count {
            return Ok(unused);
        }

        let losses = self.compute_losses(model, words)?;
        let mut ranked: Vec<(f64, &String)> = Vec::new();
        for (token, &loss) in model.vocab().iter().zip(&losses) {
            if !self.protected.contains(token) {
                ranked.push((loss, token));
            }
        }
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));
        Ok(ranked.into_iter().take(prune_count).map(|(_, v)| v.clone()).collect())
    }

    /// Log the encodings of the evaluation words.
    fn eval_model(&self, model: &Model, eval_words: &[String]) {
        if eval_words.is_empty() {
            return;
        }
        tracing::info!(vocab = model.vocab().len(), "evaluating model");
        for word in eval_words {
            let ids = model.encode_with(word, None, true, false);
            tracing::info!(word = %word, encoding = %model.format_ids(&ids), "eval");
        }
    }

    /// Sort protected tokens to the head in reserved-list order, the rest
    /// by descending logit; zero the reserved logits; fix the UNK id;
    /// override seed-token logits.
    fn finalize_model(&self, model: &mut Model) -> Result<(), Error> {
        let token_order: HashMap<&String, usize> =
            self.protected_list.iter().enumerate().map(|(i, t)| (t, i)).collect();
        let mut order: Vec<usize> = (0..model.vocab().len()).collect();
        let keys: Vec<f64> = model
            .vocab()
            .iter()
            .enumerate()
            .map(|(i, v)| match token_order.get(v) {
                Some(&rank) => rank as f64,
                None => 1e6 - f64::from(model.vocab_logits()[i]),
            })
            .collect();
        order.sort_by(|&a, &b| keys[a].total_cmp(&keys[b]).then_with(|| a.cmp(&b)));
        model.rearrange_vocab(&order)?;

        for id in 0..self.config.reserved_tokens.len() as u32 {
            model.set_vocab_logit(id, 0.0);
        }
        let unk = model.vocab_lookup(&self.config.unk_token).ok_or_else(|| {
            Error::Config(format!("unknown token {:?} missing from vocab", self.config.unk_token))
        })?;
        model.set_unk_token_id(unk);

        if let Some(seed_logit) = self.config.seed_token_logit {
            for token in &self.config.seed_tokens {
                if let Some(id) = model.vocab_lookup(token) {
                    model.set_vocab_logit(id, seed_logit);
                }
            }
        }
        Ok(())
    }

    /// Accumulate per-base language masks by encoding every word under its
    /// own language; protected tokens get the all-ones mask.
    fn tie_model(&self, model: &mut Model, words: &[PreparedWord]) -> Result<(), Error> {
        let force_slow = self.config.force_slow;
        let langs = model.langs().to_vec();
        let all = full_mask(langs.len());
        let chunks = chunk_list(words, self.workers());
        let partials: Vec<Vec<LangMask>> = chunks
            .par_iter()
            .map(|chunk| {
                let mut vocab_langs = vec![0; model.vocab().len()];
                for pw in chunk {
                    let ids = model.encode_with(&pw.word, pw.lang.as_deref(), force_slow, true);
                    let mask = match &pw.lang {
                        Some(lang) => langs
                            .iter()
                            .position(|l| l == lang)
                            .map_or(all, |bit| 1 << bit),
                        None => all,
                    };
                    for (base_id, _) in ids {
                        vocab_langs[base_id as usize] |= mask;
                    }
                }
                vocab_langs
            })
            .collect();

        let mut vocab_langs = vec![0; model.vocab().len()];
        for partial in partials {
            for (acc, mask) in vocab_langs.iter_mut().zip(partial) {
                *acc |= mask;
            }
        }
        for mask in vocab_langs.iter_mut().take(self.protected_list.len()) {
            *mask = all;
        }
        model.update_tied_langs(langs, vocab_langs)
    }
}

fn step_e_single(
    model: &Model,
    words: &[PreparedWord],
    force_slow: bool,
) -> Result<(f64, f64, Vec<f64>, Vec<f64>), Error> {
    let mut m_vocab = vec![0.0; model.vocab().len()];
    let mut m_rules = vec![0.0; model.rules().len()];
    let mut nll = 0.0;
    let mut total = 0.0;
    for pw in words {
        nll -= model.add_marginal(
            &pw.word,
            pw.count,
            pw.lang.as_deref(),
            &mut m_vocab,
            &mut m_rules,
            force_slow,
        )?;
        total += pw.count;
    }
    Ok((nll, total, m_vocab, m_rules))
}

fn add_arrays(acc: &mut [f64], other: &[f64]) {
    for (a, b) in acc.iter_mut().zip(other) {
        *a += b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_list_interleaves() {
        let chunks = chunk_list(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10], 3);
        assert_eq!(chunks, vec![vec![1, 4, 7, 10], vec![2, 5, 8], vec![3, 6, 9]]);
        assert_eq!(chunks.iter().map(Vec::len).sum::<usize>(), 10);
    }

    #[test]
    fn test_default_seeds_cover_utf8_prefixes() {
        let seed = default_utf8_seed();
        assert_eq!(seed.len(), 32 + 16 + 8 + 64);
        assert!(seed.contains(&"UC0".to_string()));
        assert!(seed.contains(&"UBF".to_string()));
    }

    #[test]
    fn test_duplicate_reserved_tokens_rejected() {
        let config = TrainerConfig {
            reserved_tokens: vec!["[PAD]".to_string(), "[PAD]".to_string()],
            ..TrainerConfig::default()
        };
        assert!(matches!(Trainer::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_protected_order_reserved_first() {
        let trainer = Trainer::new(TrainerConfig::default()).unwrap();
        let protected = trainer.protected_tokens();
        assert_eq!(&protected[..10], &default_reserved_tokens()[..]);
        assert!(protected.len() > 10);
    }

    #[test]
    fn test_prepare_words_appends_eow_and_strips_shy() {
        let config = TrainerConfig { skip_numbers: true, ..TrainerConfig::default() };
        let trainer = Trainer::new(config).unwrap();
        let mut words = HashMap::new();
        words.insert("haus".to_string(), 3.0);
        words.insert("tagungsH".to_string(), 2.0);
        words.insert("123".to_string(), 5.0);
        let prepared = trainer.prepare_words(Some(words), None);
        let by_word: HashMap<&str, f64> =
            prepared.iter().map(|p| (p.word.as_str(), p.count)).collect();
        assert_eq!(by_word.get("hausX"), Some(&3.0));
        assert_eq!(by_word.get("tagungs"), Some(&2.0));
        assert!(!by_word.contains_key("123X"), "pure digit words are skipped");
    }

    #[test]
    fn test_generate_candidates_respects_length_and_eow() {
        let trainer = Trainer::new(TrainerConfig {
            vocab_size: 100,
            spread_factor: 10.0,
            max_token_length: 3,
            ..TrainerConfig::default()
        })
        .unwrap();
        let words = vec![PreparedWord { word: "abcdX".to_string(), count: 1.0, lang: None }];
        let candidates = trainer.generate_candidates(&words).unwrap();
        assert!(candidates.contains(&"ab".to_string()));
        assert!(candidates.contains(&"abc".to_string()));
        assert!(!candidates.contains(&"abcd".to_string()), "length cap");
        assert!(!candidates.iter().any(|c| c.contains('X')), "no dangling EOW markers");
    }

    #[test]
    fn test_min_balance_upsamples() {
        let trainer = Trainer::new(TrainerConfig {
            min_balance_langs: Some(0.5),
            ..TrainerConfig::default()
        })
        .unwrap();
        let mut de = HashMap::new();
        de.insert("haus".to_string(), 100.0);
        let mut en = HashMap::new();
        en.insert("house".to_string(), 10.0);
        let mut by_lang = HashMap::new();
        by_lang.insert("de".to_string(), de);
        by_lang.insert("en".to_string(), en);
        let prepared = trainer.prepare_words(None, Some(&by_lang));
        let by_word: HashMap<&str, f64> =
            prepared.iter().map(|p| (p.word.as_str(), p.count)).collect();
        assert_eq!(by_word.get("hausX"), Some(&100.0));
        // 10 < 0.5 * 100, upsampled to 50
        assert_eq!(by_word.get("houseX"), Some(&50.0));
    }
}
