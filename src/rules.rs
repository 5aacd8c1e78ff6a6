//! Morphological rules: suffixes with optional stem-altering operations.
//!
//! A [`SuffixRule`] turns a vocabulary base into a surface form by applying
//! its operation to the base (base → stem) and appending its suffix. The
//! reverse direction strips the suffix and reverts the operation. Rule 0 is
//! always the empty continuation rule, rule 1 the bare end-of-word rule.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::alphabet::EOW;
use crate::Error;

/// Default penalty for interfix rules.
pub const SMALL_PENALTY: f32 = 0.75;
/// Penalty for rules that should only fire as a last resort.
pub const LARGE_PENALTY: f32 = 1.5;

fn compile(pattern: &str) -> Result<Regex, Error> {
    Regex::new(pattern).map_err(|e| Error::Config(format!("invalid rule regex {pattern:?}: {e}")))
}

/// A regex-substitution stem operation.
///
/// Substitutions use the regex crate's `$N` group syntax. `apply` must be
/// revertible: whenever `can_apply(base)` holds, `revert(apply(base))` must
/// reproduce a base with the same surface form.
#[derive(Debug, Clone)]
pub struct RegexOp {
    apply_regex: Regex,
    apply_sub: String,
    revert_regex: Regex,
    revert_sub: String,
}

impl RegexOp {
    pub fn new(
        apply_regex: &str,
        apply_sub: &str,
        revert_regex: &str,
        revert_sub: &str,
    ) -> Result<Self, Error> {
        Ok(RegexOp {
            apply_regex: compile(apply_regex)?,
            apply_sub: apply_sub.to_string(),
            revert_regex: compile(revert_regex)?,
            revert_sub: revert_sub.to_string(),
        })
    }

    pub fn apply(&self, base: &str) -> String {
        self.apply_regex.replace_all(base, self.apply_sub.as_str()).into_owned()
    }

    pub fn can_apply(&self, base: &str) -> bool {
        self.apply_regex.is_match(base)
    }

    pub fn revert(&self, stem: &str) -> String {
        self.revert_regex.replace_all(stem, self.revert_sub.as_str()).into_owned()
    }

    pub fn can_revert(&self, stem: &str) -> bool {
        self.revert_regex.is_match(stem)
    }

    pub fn is_same(&self, other: &RegexOp) -> bool {
        self.apply_regex.as_str() == other.apply_regex.as_str()
            && self.apply_sub == other.apply_sub
            && self.revert_regex.as_str() == other.revert_regex.as_str()
            && self.revert_sub == other.revert_sub
    }

    /// An op whose apply pattern matches anywhere, e.g. `^` for prefixation.
    pub fn is_unconditional(&self) -> bool {
        self.apply_regex.as_str().chars().all(|c| "^$.+*?".contains(c))
    }

    /// Render the base with the substitution spelled out inline, e.g.
    /// `ru[n->nn]` for the doubling op applied to `run`.
    pub fn format_markup(&self, base: &str) -> String {
        self.apply_regex
            .replace_all(base, |caps: &regex::Captures| {
                let mut repl = self.apply_sub.clone();
                for i in (1..caps.len()).rev() {
                    let text = caps.get(i).map_or("", |m| m.as_str());
                    repl = repl.replace(&format!("${i}"), text);
                }
                format!("[{}->{}]", &caps[0], repl)
            })
            .into_owned()
    }
}

/// A morphological stem operation. Modeled as a tagged sum with room for
/// future variants; regexes are compiled once at rule load.
#[derive(Debug, Clone)]
pub enum MorphOp {
    Regex(RegexOp),
}

impl MorphOp {
    pub fn apply(&self, base: &str) -> String {
        match self {
            MorphOp::Regex(op) => op.apply(base),
        }
    }

    pub fn can_apply(&self, base: &str) -> bool {
        match self {
            MorphOp::Regex(op) => op.can_apply(base),
        }
    }

    pub fn revert(&self, stem: &str) -> String {
        match self {
            MorphOp::Regex(op) => op.revert(stem),
        }
    }

    pub fn can_revert(&self, stem: &str) -> bool {
        match self {
            MorphOp::Regex(op) => op.can_revert(stem),
        }
    }

    pub fn is_same(&self, other: &MorphOp) -> bool {
        match (self, other) {
            (MorphOp::Regex(a), MorphOp::Regex(b)) => a.is_same(b),
        }
    }

    pub fn is_unconditional(&self) -> bool {
        match self {
            MorphOp::Regex(op) => op.is_unconditional(),
        }
    }

    pub fn format_markup(&self, base: &str) -> String {
        match self {
            MorphOp::Regex(op) => op.format_markup(base),
        }
    }
}

/// A suffix rule: optional stem op, suffix, constraint, penalty and
/// language set.
#[derive(Debug, Clone)]
pub struct SuffixRule {
    pub suffix: String,
    langs: Option<Vec<String>>,
    pub op: Option<MorphOp>,
    constraint: Option<Regex>,
    pub penalty: f32,
    pub min_base_length: Option<usize>,
}

impl SuffixRule {
    pub fn new(suffix: impl Into<String>, langs: Option<&[&str]>) -> Self {
        let mut rule = SuffixRule {
            suffix: suffix.into(),
            langs: None,
            op: None,
            constraint: None,
            penalty: 0.0,
            min_base_length: None,
        };
        rule.set_langs(langs.map(|ls| ls.iter().map(|s| s.to_string()).collect()));
        rule
    }

    pub fn with_op(mut self, op: MorphOp) -> Self {
        self.op = Some(op);
        self
    }

    pub fn with_constraint(mut self, pattern: &str) -> Result<Self, Error> {
        self.constraint = Some(compile(pattern)?);
        Ok(self)
    }

    pub fn with_penalty(mut self, penalty: f32) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn with_min_base_length(mut self, len: usize) -> Self {
        self.min_base_length = Some(len);
        self
    }

    fn set_langs(&mut self, langs: Option<Vec<String>>) {
        self.langs = langs.filter(|ls| !ls.is_empty()).map(|mut ls| {
            ls.sort();
            ls.dedup();
            ls
        });
    }

    /// The rule's language set; `None` means language-agnostic.
    pub fn langs(&self) -> Option<&[String]> {
        self.langs.as_deref()
    }

    pub fn any_lang(&self) -> bool {
        self.langs.is_none()
    }

    pub fn constraint(&self) -> Option<&Regex> {
        self.constraint.as_ref()
    }

    /// True when the rule has no constraint or the base matches it.
    pub fn matches_constraint(&self, base: &str) -> bool {
        self.constraint.as_ref().map_or(true, |re| re.is_match(base))
    }

    /// Transform a base into its surface form. Only valid when
    /// [`can_apply`](Self::can_apply) holds.
    pub fn apply(&self, base: &str) -> String {
        let stem = match &self.op {
            Some(op) => op.apply(base),
            None => base.to_string(),
        };
        format!("{stem}{}", self.suffix)
    }

    pub fn can_apply(&self, base: &str) -> bool {
        self.op.as_ref().map_or(true, |op| op.can_apply(base))
    }

    /// Recover the base from a surface form. Only valid when
    /// [`can_revert`](Self::can_revert) holds.
    pub fn revert(&self, word: &str) -> String {
        let stem = &word[..word.len() - self.suffix.len()];
        match &self.op {
            Some(op) => op.revert(stem),
            None => stem.to_string(),
        }
    }

    pub fn can_revert(&self, word: &str) -> bool {
        if self.suffix.is_empty() && word.ends_with(EOW) {
            return false;
        }
        if !(word.len() > self.suffix.len() && word.ends_with(&self.suffix)) {
            return false;
        }
        match &self.op {
            None => true,
            Some(op) => op.can_revert(&word[..word.len() - self.suffix.len()]),
        }
    }

    /// Same `(suffix, op)` pair; languages, constraints and penalties are
    /// not compared.
    pub fn is_same(&self, other: &SuffixRule) -> bool {
        self.suffix == other.suffix
            && match (&self.op, &other.op) {
                (None, None) => true,
                (Some(a), Some(b)) => a.is_same(b),
                _ => false,
            }
    }

    /// True for the default continuation rule (slot 0) or the bare
    /// end-of-word rule (slot 1).
    pub fn is_default_shape(&self) -> bool {
        (self.suffix.is_empty() || self.suffix == EOW.to_string())
            && self.op.is_none()
            && self.constraint.is_none()
    }

    pub fn drop_constraint(&self) -> SuffixRule {
        let mut rule = self.clone();
        rule.constraint = None;
        rule
    }

    pub fn drop_penalty(&self) -> SuffixRule {
        let mut rule = self.clone();
        rule.penalty = 0.0;
        rule
    }

    pub fn add_penalty(&self, bias: f32) -> SuffixRule {
        let mut rule = self.clone();
        rule.penalty += bias;
        rule
    }
}

impl std::fmt::Display for SuffixRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.op {
            Some(MorphOp::Regex(op)) => write!(
                f,
                "suffix(-{},re({:?},{:?}))",
                self.suffix,
                op.apply_regex.as_str(),
                op.apply_sub
            ),
            None => write!(f, "suffix(-{})", self.suffix),
        }
    }
}

/// The two mandatory rules: empty continuation and bare end-of-word.
pub fn default_rules() -> Vec<SuffixRule> {
    vec![SuffixRule::new("", None), SuffixRule::new(EOW.to_string(), None)]
}

/// Word-end rules for a language: `X` is appended to each suffix.
pub fn suffix_rules(
    lang: &str,
    suffixes: &[&str],
    op: Option<MorphOp>,
    constraint: Option<&str>,
) -> Result<Vec<SuffixRule>, Error> {
    suffixes
        .iter()
        .map(|s| {
            let suffix = if s.ends_with(EOW) { s.to_string() } else { format!("{s}{EOW}") };
            let mut rule = SuffixRule::new(suffix, Some(&[lang]));
            if let Some(op) = &op {
                rule = rule.with_op(op.clone());
            }
            if let Some(pattern) = constraint {
                rule = rule.with_constraint(pattern)?;
            }
            Ok(rule)
        })
        .collect()
}

/// Word-interior rules for a language. Interfixes carry a small penalty by
/// default so that plain suffixes win ties.
pub fn interfix_rules(
    lang: &str,
    interfixes: &[&str],
    op: Option<MorphOp>,
    constraint: Option<&str>,
) -> Result<Vec<SuffixRule>, Error> {
    interfixes
        .iter()
        .map(|s| {
            let mut rule = SuffixRule::new(*s, Some(&[lang])).with_penalty(SMALL_PENALTY);
            if let Some(op) = &op {
                rule = rule.with_op(op.clone());
            }
            if let Some(pattern) = constraint {
                rule = rule.with_constraint(pattern)?;
            }
            Ok(rule)
        })
        .collect()
}

/// Coalesce rules with identical `(suffix, op)`: language sets union,
/// constraint-less wins (else patterns are or-joined), penalty takes the
/// minimum.
pub fn merge_duplicates(rules: &[SuffixRule]) -> Result<Vec<SuffixRule>, Error> {
    let mut result: Vec<SuffixRule> = Vec::new();
    for rule in rules {
        match result.iter_mut().find(|r| r.is_same(rule)) {
            None => result.push(rule.clone()),
            Some(existing) => {
                let merged_langs = match (&existing.langs, &rule.langs) {
                    (Some(a), Some(b)) => {
                        let mut ls = a.clone();
                        ls.extend(b.iter().cloned());
                        Some(ls)
                    }
                    _ => None,
                };
                existing.set_langs(merged_langs);
                let merged_constraint = match (&existing.constraint, &rule.constraint) {
                    (Some(a), Some(b)) if a.as_str() != b.as_str() => {
                        Some(compile(&format!("({}|{})", a.as_str(), b.as_str()))?)
                    }
                    (Some(a), Some(_)) => Some(a.clone()),
                    _ => None,
                };
                existing.constraint = merged_constraint;
                existing.penalty = existing.penalty.min(rule.penalty);
            }
        }
    }
    Ok(result)
}

/// Order rules so that slot 0 is the empty rule and slot 1 the end-of-word
/// rule; the rest sort by suffix, then penalty.
pub fn sort_rules(rules: Vec<SuffixRule>) -> Result<Vec<SuffixRule>, Error> {
    let empty: Vec<&SuffixRule> =
        rules.iter().filter(|r| r.suffix.is_empty() && r.is_default_shape()).collect();
    let eow: Vec<&SuffixRule> =
        rules.iter().filter(|r| r.suffix == EOW.to_string() && r.is_default_shape()).collect();
    if empty.len() != 1 {
        return Err(Error::Config("need exactly one default empty rule".to_string()));
    }
    if eow.len() != 1 {
        return Err(Error::Config("need exactly one default end-of-word rule".to_string()));
    }
    let rule0 = empty[0].clone();
    let rule1 = eow[0].clone();
    let mut rest: Vec<SuffixRule> =
        rules.into_iter().filter(|r| !r.is_default_shape()).collect();
    rest.sort_by(|a, b| {
        a.suffix.cmp(&b.suffix).then_with(|| a.penalty.total_cmp(&b.penalty))
    });
    let mut out = vec![rule0, rule1];
    out.extend(rest);
    Ok(out)
}

// -- persistence --------------------------------------------------------

/// Serialized form of a [`MorphOp`]. The tag admits future variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OpData {
    #[serde(rename = "regex")]
    Regex {
        apply_regex: String,
        apply_sub: String,
        revert_regex: String,
        revert_sub: String,
    },
}

/// Serialized form of a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RuleData {
    #[serde(rename = "suffix")]
    Suffix {
        langs: Option<Vec<String>>,
        suffix: String,
        op: Option<OpData>,
        constraint_regex: Option<String>,
        penalty: f32,
        min_base_length: Option<usize>,
    },
}

impl From<&MorphOp> for OpData {
    fn from(op: &MorphOp) -> OpData {
        match op {
            MorphOp::Regex(op) => OpData::Regex {
                apply_regex: op.apply_regex.as_str().to_string(),
                apply_sub: op.apply_sub.clone(),
                revert_regex: op.revert_regex.as_str().to_string(),
                revert_sub: op.revert_sub.clone(),
            },
        }
    }
}

impl TryFrom<OpData> for MorphOp {
    type Error = Error;

    fn try_from(data: OpData) -> Result<MorphOp, Error> {
        match data {
            OpData::Regex { apply_regex, apply_sub, revert_regex, revert_sub } => {
                Ok(MorphOp::Regex(RegexOp::new(
                    &apply_regex,
                    &apply_sub,
                    &revert_regex,
                    &revert_sub,
                )?))
            }
        }
    }
}

impl From<&SuffixRule> for RuleData {
    fn from(rule: &SuffixRule) -> RuleData {
        RuleData::Suffix {
            langs: rule.langs.clone(),
            suffix: rule.suffix.clone(),
            op: rule.op.as_ref().map(OpData::from),
            constraint_regex: rule.constraint.as_ref().map(|re| re.as_str().to_string()),
            penalty: rule.penalty,
            min_base_length: rule.min_base_length,
        }
    }
}

impl TryFrom<RuleData> for SuffixRule {
    type Error = Error;

    fn try_from(data: RuleData) -> Result<SuffixRule, Error> {
        match data {
            RuleData::Suffix { langs, suffix, op, constraint_regex, penalty, min_base_length } => {
                let mut rule = SuffixRule {
                    suffix,
                    langs: None,
                    op: op.map(MorphOp::try_from).transpose()?,
                    constraint: constraint_regex.as_deref().map(compile).transpose()?,
                    penalty,
                    min_base_length,
                };
                rule.set_langs(langs);
                Ok(rule)
            }
        }
    }
}

/// Parse a rule table from JSON. The content of language tables is data,
/// not logic; unknown type tags fail loudly.
pub fn rules_from_json(json: &str) -> Result<Vec<SuffixRule>, Error> {
    let data: Vec<RuleData> = serde_json::from_str(json)
        .map_err(|e| Error::Config(format!("invalid rule table: {e}")))?;
    data.into_iter().map(SuffixRule::try_from).collect()
}

pub fn rules_to_json(rules: &[SuffixRule]) -> Result<String, Error> {
    let data: Vec<RuleData> = rules.iter().map(RuleData::from).collect();
    serde_json::to_string(&data).map_err(|e| Error::Format(e.to_string()))
}

pub fn load_rules<P: AsRef<Path>>(path: P) -> Result<Vec<SuffixRule>, Error> {
    rules_from_json(&std::fs::read_to_string(path)?)
}

pub fn save_rules<P: AsRef<Path>>(path: P, rules: &[SuffixRule]) -> Result<(), Error> {
    std::fs::write(path, rules_to_json(rules)?)?;
    Ok(())
}
