//! End-to-end training runs on tiny corpora.

use std::collections::HashMap;

use morphtok::model::MIN_LOGIT;
use morphtok::pre::default_reserved_tokens;
use morphtok::rules::{default_rules, suffix_rules, SuffixRule};
use morphtok::{Trainer, TrainerConfig};

fn tiny_config(vocab_size: usize) -> TrainerConfig {
    TrainerConfig {
        vocab_size,
        alphabet: "abcdefghijklmnopqrstuvwxyz".to_string(),
        spread_factor: 4.0,
        max_token_length: 8,
        seed_tokens: Vec::new(),
        iterations: 3,
        workers: 1,
        force_slow: true,
        ..TrainerConfig::default()
    }
}

fn rules() -> Vec<SuffixRule> {
    let mut rules = default_rules();
    rules.extend(suffix_rules("en", &["ing", "s", "ed"], None, None).unwrap());
    rules
}

fn corpus() -> HashMap<String, f64> {
    let mut words = HashMap::new();
    for (word, count) in [
        ("walking", 40.0),
        ("walks", 30.0),
        ("walked", 30.0),
        ("talking", 25.0),
        ("talks", 20.0),
        ("talked", 20.0),
        ("jumping", 15.0),
        ("jumps", 12.0),
        ("jumped", 10.0),
        ("sing", 8.0),
        ("song", 6.0),
    ] {
        words.insert(word.to_string(), count);
    }
    words
}

#[test]
fn test_training_reaches_target_size() {
    let reserved = default_reserved_tokens().len();
    // protected = reserved + the four escape letters + the alphabet
    let protected = reserved + 4 + 26;
    let vocab_size = protected + 20;
    let trainer = Trainer::new(tiny_config(vocab_size)).unwrap();
    let model = trainer.train(rules(), Some(corpus()), None, &[]).unwrap();

    assert_eq!(model.vocab().len(), vocab_size);

    // reserved tokens hold the leading slots in order, with zeroed logits
    for (i, token) in default_reserved_tokens().iter().enumerate() {
        assert_eq!(&model.vocab()[i], token);
        assert_eq!(model.vocab_logits()[i], 0.0);
    }
    assert_eq!(model.unk_token_id(), 1);
    assert_eq!(&model.vocab()[model.unk_token_id() as usize], "[UNK]");

    // non-protected tail is sorted by descending logit
    let tail = &model.vocab_logits()[protected..];
    for pair in tail.windows(2) {
        assert!(pair[0] >= pair[1]);
    }
}

#[test]
fn test_trained_model_encodes_corpus_words() {
    let reserved = default_reserved_tokens().len();
    let vocab_size = reserved + 26 + 24;
    let trainer = Trainer::new(tiny_config(vocab_size)).unwrap();
    let model = trainer.train(rules(), Some(corpus()), None, &[]).unwrap();

    for word in ["walking", "talks", "jumped", "walked"] {
        let ids = model.encode_with(word, None, true, false);
        assert!(
            !ids.iter().any(|&(v, _)| v == model.unk_token_id()),
            "UNK while encoding {word}"
        );
        assert_eq!(model.decode(&ids, false), word);
    }
    // frequent stems should survive pruning as whole bases
    assert!(model.vocab().iter().any(|v| v == "walk" || v == "walking"));
}

#[test]
fn test_protected_tokens_survive_pruning() {
    let reserved = default_reserved_tokens().len();
    let protected = reserved + 4 + 26;
    let vocab_size = protected + 8;
    let trainer = Trainer::new(tiny_config(vocab_size)).unwrap();
    let model = trainer.train(rules(), Some(corpus()), None, &[]).unwrap();

    assert_eq!(model.vocab().len(), vocab_size);
    for c in "abcdefghijklmnopqrstuvwxyzGHNT".chars() {
        assert!(
            model.vocab_lookup(&c.to_string()).is_some(),
            "protected token {c:?} was pruned"
        );
    }
    // the eight learned survivors all carry usable logits
    let tail = &model.vocab_logits()[protected..];
    assert_eq!(tail.len(), 8);
    assert!(tail.iter().all(|&l| l >= MIN_LOGIT));
}

#[test]
fn test_language_tying_masks() {
    let mut rules = default_rules();
    rules.extend(suffix_rules("en", &["ing", "s"], None, None).unwrap());
    rules.extend(suffix_rules("de", &["ung", "en"], None, None).unwrap());

    let mut en = HashMap::new();
    for (w, c) in [("walking", 20.0), ("walks", 15.0), ("talking", 10.0)] {
        en.insert(w.to_string(), c);
    }
    let mut de = HashMap::new();
    for (w, c) in [("zeitung", 20.0), ("zeitungen", 15.0), ("warten", 10.0)] {
        de.insert(w.to_string(), c);
    }
    let mut by_lang = HashMap::new();
    by_lang.insert("en".to_string(), en);
    by_lang.insert("de".to_string(), de);

    let reserved = default_reserved_tokens().len();
    let config = TrainerConfig {
        tie_by_langs: true,
        vocab_size: reserved + 26 + 16,
        ..tiny_config(reserved + 26 + 16)
    };
    let trainer = Trainer::new(config).unwrap();
    let model = trainer.train(rules, None, Some(by_lang), &[]).unwrap();

    let vocab_langs = model.vocab_langs().expect("tying must set vocab_langs");
    assert_eq!(vocab_langs.len(), model.vocab().len());
    assert_eq!(model.langs(), &["de".to_string(), "en".to_string()]);

    // protected tokens are usable from every language
    for &mask in &vocab_langs[..reserved] {
        assert_eq!(mask, 0b11);
    }
}

#[test]
fn test_single_view_required() {
    let trainer = Trainer::new(tiny_config(64)).unwrap();
    assert!(trainer.train(rules(), None, None, &[]).is_err());
}
