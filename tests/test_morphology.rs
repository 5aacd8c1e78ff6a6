//! Language-rule scenarios: English suffixes with stem ops, German
//! interfixes and the ge- prefix op.

use morphtok::alphabet::EOW;
use morphtok::morpher::Morpher;
use morphtok::rules::{
    default_rules, interfix_rules, merge_duplicates, sort_rules, suffix_rules, MorphOp, RegexOp,
    SuffixRule,
};

fn en_rules() -> Vec<SuffixRule> {
    let y_to_i = MorphOp::Regex(RegexOp::new(r"y$", "i", r"i$", "y").unwrap());
    let doubling = MorphOp::Regex(
        RegexOp::new(r"([bdfgklmnprst])$", "$1$1", r"([bdfgklmnprst])\1$", "$1").unwrap(),
    );
    let mut rules = default_rules();
    rules.extend(
        suffix_rules("en", &["e", "ed", "ely", "er", "ers", "es", "est"], None, Some("[^e]$"))
            .unwrap(),
    );
    rules.extend(suffix_rules("en", &["s"], None, Some("([^es]|ee)$")).unwrap());
    rules.extend(
        suffix_rules("en", &["able", "ables", "ably", "ible", "ibly", "ing", "ings", "ly"], None, None)
            .unwrap(),
    );
    rules.extend(suffix_rules("en", &["ed", "er", "ers", "es"], Some(y_to_i), None).unwrap());
    rules.extend(
        suffix_rules(
            "en",
            &["able", "ables", "ably", "er", "ers", "ing", "ings"],
            Some(doubling),
            None,
        )
        .unwrap(),
    );
    rules
}

fn de_rules() -> Vec<SuffixRule> {
    let ge_prefix = MorphOp::Regex(RegexOp::new("^", "ge", "^ge", "").unwrap());
    let mut rules = default_rules();
    rules.extend(
        suffix_rules("de", &["e", "em", "en", "er", "ern", "es"], None, Some("[^e]$")).unwrap(),
    );
    rules.extend(suffix_rules("de", &["ung", "ungen"], None, Some("[^ea]$")).unwrap());
    rules.extend(suffix_rules("de", &["t", "te", "ten"], Some(ge_prefix), None).unwrap());
    rules.extend(interfix_rules("de", &["s"], None, Some("([^es]|ee)$")).unwrap());
    rules.extend(interfix_rules("de", &["ungs"], None, Some("[^ea]$")).unwrap());
    rules
}

fn base_of(example: &str) -> String {
    // bases in the expectation markup read like "tr[y->i]+es" or "hous+e"
    let marked = example.split('+').next().unwrap();
    match (marked.find('['), marked.find(']')) {
        (Some(open), Some(close)) => {
            let from = marked[open + 1..close].split("->").next().unwrap();
            format!("{}{}{}", &marked[..open], from, &marked[close + 1..])
        }
        _ => marked.to_string(),
    }
}

fn assert_decompositions(rules: Vec<SuffixRule>, langs: &[&str], examples: &[(&str, &str)]) {
    let bases: Vec<String> = examples.iter().map(|(_, exp)| base_of(exp)).collect();
    let morpher = Morpher::new(
        langs.iter().map(|s| s.to_string()).collect(),
        bases,
        rules,
        None,
        None,
        2,
        false,
    )
    .unwrap();

    for (word, expected) in examples {
        let word = format!("{word}{EOW}");
        let formatted: Vec<String> = morpher
            .decompose(&word, None, false)
            .into_iter()
            .filter(|&(_, _, i, j)| i == 0 && j == word.len())
            .map(|(b, r, _, _)| morpher.format(&[(b, r)]))
            .collect();
        assert!(
            formatted.iter().any(|f| f.trim_end_matches(EOW) == *expected),
            "expected {expected:?} among decompositions of {word:?}: {formatted:?}"
        );
    }
}

#[test]
fn test_english_suffix_rules() {
    let examples = [
        ("tries", "tr[y->i]+es"),
        ("house", "hous+e"),
        ("houses", "hous+es"),
        ("loved", "lov+ed"),
        ("nicer", "nic+er"),
        ("lovers", "lov+ers"),
        ("nicely", "nic+ely"),
        ("nicest", "nic+est"),
        ("days", "day+s"),
        ("trees", "tree+s"),
        ("proudly", "proud+ly"),
        ("loving", "lov+ing"),
        ("feelings", "feel+ings"),
        ("lovable", "lov+able"),
        ("studied", "stud[y->i]+ed"),
        ("running", "ru[n->nn]+ing"),
        ("runnings", "ru[n->nn]+ings"),
        ("controller", "contro[l->ll]+er"),
        ("controllable", "contro[l->ll]+able"),
    ];
    assert_decompositions(en_rules(), &["en"], &examples);
}

#[test]
fn test_german_rules() {
    let examples = [
        ("tage", "tag+e"),
        ("tagen", "tag+en"),
        ("meinung", "mein+ung"),
        ("meinungen", "mein+ungen"),
        ("gesagt", "[->ge]sag+t"),
    ];
    assert_decompositions(de_rules(), &["de"], &examples);
}

#[test]
fn test_german_interfix_is_not_end_of_word() {
    let mut rules = default_rules();
    rules.extend(interfix_rules("de", &["ungs"], None, None).unwrap());
    let morpher = Morpher::new(
        vec!["de".to_string()],
        vec!["tag".to_string()],
        rules,
        None,
        None,
        2,
        false,
    )
    .unwrap();

    // "tagungs" carries no end-of-word marker: the interfix spans to the
    // end and the bare end-of-word rule is not selected
    let decs = morpher.decompose("tagungs", None, false);
    let full: Vec<_> = decs.iter().filter(|&&(_, _, i, j)| i == 0 && j == 7).collect();
    assert!(!full.is_empty());
    for &&(_, r, _, _) in &full {
        assert!(!morpher.rules()[r as usize].suffix.ends_with(EOW));
    }

    // with the marker, the interfix no longer reaches the final position
    let decs = morpher.decompose("tagungsX", None, false);
    assert!(!decs.iter().any(|&(_, _, i, j)| i == 0 && j == 8));
}

#[test]
fn test_merge_and_sort_full_table() {
    let mut rules = de_rules();
    rules.extend(en_rules());
    let merged = merge_duplicates(&rules).unwrap();
    let sorted = sort_rules(merged).unwrap();

    assert_eq!(sorted[0].suffix, "");
    assert_eq!(sorted[1].suffix, EOW.to_string());
    assert!(sorted[0].op.is_none() && sorted[0].constraint().is_none());
    assert!(sorted[1].op.is_none() && sorted[1].constraint().is_none());

    // the identical "eX" rules of both languages merged into one
    let e_rules: Vec<_> =
        sorted.iter().filter(|r| r.suffix == "eX" && r.op.is_none()).collect();
    assert_eq!(e_rules.len(), 1);
    assert_eq!(e_rules[0].langs(), Some(&["de".to_string(), "en".to_string()][..]));

    // suffix order holds past the defaults
    for pair in sorted[2..].windows(2) {
        assert!(pair[0].suffix <= pair[1].suffix);
    }
}

#[test]
fn test_stem_op_roundtrip_invariant() {
    for rule in en_rules().iter().chain(de_rules().iter()) {
        let Some(op) = &rule.op else { continue };
        for base in ["run", "try", "control", "sag", "stud", "big"] {
            if op.can_apply(base) {
                let stem = op.apply(base);
                assert!(op.can_revert(&stem), "{rule} cannot revert {stem:?}");
                let reverted = op.revert(&stem);
                assert_eq!(op.apply(&reverted), stem, "{rule} roundtrip on {base:?}");
            }
        }
    }
}
