//! # morphtok
//!
//! Morphological subword tokenizer for multilingual text.
//!
//! Instead of purely statistical subwords, every word is decomposed into
//! pairs of a *base* drawn from a learned vocabulary and a *morphological
//! rule* (a suffix plus an optional stem-altering operation), so `running`
//! can encode as base `run` with the doubling `ing` rule — rendered as
//! `ru[n->nn]+ingX`.
//!
//! ## Pieces
//!
//! - [`alphabet`]: reversible ASCII escape codec with case/whitespace
//!   sidecar flags
//! - [`pre`]: regex pre-splitter and Unicode normalizer
//! - [`rules`]: suffix rules with regex stem operations
//! - [`morpher`]: trie-indexed decomposer
//! - [`lattice`]: Viterbi and forward/backward sums over decompositions
//! - [`model`]: vocabulary, rules and logits; encode/decode
//! - [`trainer`]: unigram-style EM training with pruning and language tying
//! - [`Tokenizer`]: the text-level façade tying it all together
//!
//! ## Example
//!
//! ```
//! use morphtok::alphabet::eu24_alphabet;
//! use morphtok::model::{Model, ModelConfig};
//! use morphtok::pre::{PreTokenizer, PreTokenizerOptions};
//! use morphtok::rules::{default_rules, suffix_rules};
//! use morphtok::Tokenizer;
//!
//! # fn main() -> Result<(), morphtok::Error> {
//! let mut rules = default_rules();
//! rules.extend(suffix_rules("en", &["ing", "s"], None, None)?);
//!
//! let mut vocab = morphtok::pre::default_reserved_tokens();
//! vocab.extend(["run", "jump"].map(String::from));
//! let nv = vocab.len();
//! let nr = rules.len();
//!
//! let mut model = Model::new(vocab, rules, vec![0.0; nv], vec![0.0; nr],
//!                            ModelConfig { unk_token_id: 1, ..ModelConfig::default() })?;
//! model.reset_logits();
//! let pre = PreTokenizer::new(&eu24_alphabet(), PreTokenizerOptions::default())?;
//! let tokenizer = Tokenizer::new(pre, model)?;
//!
//! let tokens = tokenizer.tokenize("Jumping runs");
//! assert_eq!(tokenizer.detokenize(&tokens, true), "Jumping runs");
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

pub mod alphabet;
pub mod langs;
pub mod lattice;
pub mod model;
pub mod morpher;
pub mod pre;
pub mod rules;
pub mod trainer;
pub mod trie;
pub mod vocab;

use alphabet::Escaped;
use model::{Model, ModelData};
use pre::{PreData, PreTokenizer};

pub use pre::Normalization;
pub use trainer::{Trainer, TrainerConfig};

/// Token ids are `u32`; vocabulary sizes stay far below that range.
pub type TokenId = u32;

/// Per-call cache mapping escaped words to their model encodings.
pub type WordCache = HashMap<String, Vec<(TokenId, TokenId)>>;

/// One emitted token: vocabulary id, rule id and the case/whitespace flags
/// of its word. Only the first token of a word carries the flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub vocab_id: TokenId,
    pub rule_id: TokenId,
    /// 0 = lowercase, 1 = title case, 2 = all upper case.
    pub case_id: u8,
    /// 1 when the word carried a single leading space.
    pub space_id: u8,
}

impl Token {
    /// Pack rule and flags into one property id: `rule_id·6 + up·2 + ws`.
    /// Valid because `up ∈ {0,1,2}` and `ws ∈ {0,1}`.
    pub fn merged(&self) -> (TokenId, TokenId) {
        (self.vocab_id, self.rule_id * 6 + u32::from(self.case_id) * 2 + u32::from(self.space_id))
    }

    /// Unpack a `(vocab_id, property_id)` pair.
    pub fn from_merged(vocab_id: TokenId, prop_id: TokenId) -> Token {
        Token {
            vocab_id,
            rule_id: prop_id / 6,
            case_id: (prop_id % 6 / 2) as u8,
            space_id: (prop_id % 2) as u8,
        }
    }
}

/// Options for [`Tokenizer::tokenize_with`].
#[derive(Debug, Clone, Default)]
pub struct TokenizeOptions {
    /// Fence reserved tokens off from splitting and escaping.
    pub handle_reserved: bool,
    /// Restrict handled reserved tokens to this list.
    pub allowed_reserved: Option<Vec<String>>,
    /// Slow-path decomposition; avoids building the stem trie.
    pub force_slow: bool,
}

/// Text-level tokenizer: pre-tokenizer plus model, with a word cache and
/// packed property ids.
pub struct Tokenizer {
    pre: PreTokenizer,
    model: Model,
    thumbprint: Option<String>,
    reserved_ids: HashSet<TokenId>,
}

impl Tokenizer {
    /// Combine a pre-tokenizer and a model into a tokenizer
    ///
    /// The thumbprint is derived from the model.
    ///
    /// # Arguments
    ///
    /// * `pre` - The pre-tokenizer used to split and escape text
    /// * `model` - The trained model used to encode escaped words
    ///
    /// # Returns
    ///
    /// Returns `Ok(Tokenizer)` on success, or `Err(Error)` if a reserved
    /// token of the pre-tokenizer is missing from the model's vocabulary.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use morphtok::alphabet::eu3_alphabet;
    /// use morphtok::pre::{PreTokenizer, PreTokenizerOptions};
    /// use morphtok::rules::default_rules;
    /// use morphtok::{Tokenizer, Trainer, TrainerConfig};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let word_counts = std::collections::HashMap::new();
    /// let trainer = Trainer::new(TrainerConfig::default())?;
    /// let model = trainer.train(default_rules(), Some(word_counts), None, &[])?;
    /// let pre = PreTokenizer::new(&eu3_alphabet(), PreTokenizerOptions::default())?;
    /// let tokenizer = Tokenizer::new(pre, model)?;
    /// # Ok(())
    /// # }
    /// ```
    #[must_use = "new returns a Result that must be handled"]
    pub fn new(pre: PreTokenizer, model: Model) -> Result<Self, Error> {
        let thumbprint = model.thumbprint();
        Self::from_parts(pre, model, Some(thumbprint))
    }

    /// Assemble a tokenizer from its parts, keeping a caller-supplied
    /// thumbprint
    ///
    /// # Arguments
    ///
    /// * `pre` - The pre-tokenizer used to split and escape text
    /// * `model` - The trained model used to encode escaped words
    /// * `thumbprint` - An identifying digest carried through save/load,
    ///   or `None`
    ///
    /// # Returns
    ///
    /// Returns `Ok(Tokenizer)` on success, or `Err(Error)` if a reserved
    /// token of the pre-tokenizer is missing from the model's vocabulary.
    #[must_use = "from_parts returns a Result that must be handled"]
    pub fn from_parts(
        pre: PreTokenizer,
        model: Model,
        thumbprint: Option<String>,
    ) -> Result<Self, Error> {
        let mut reserved_ids = HashSet::new();
        for token in pre.reserved_tokens() {
            let id = model.vocab_lookup(token).ok_or_else(|| {
                Error::Config(format!("reserved token {token:?} missing from vocabulary"))
            })?;
            reserved_ids.insert(id);
        }
        Ok(Tokenizer { pre, model, thumbprint, reserved_ids })
    }

    /// Get the pre-tokenizer
    ///
    /// # Returns
    ///
    /// The pre-tokenizer used for splitting, normalization and escaping.
    pub fn pre(&self) -> &PreTokenizer {
        &self.pre
    }

    /// Get the model
    ///
    /// # Returns
    ///
    /// The model that encodes escaped words into `(base, rule)` pairs.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Get the tokenizer thumbprint
    ///
    /// # Returns
    ///
    /// The identifying digest of the model shape, or `None` if the
    /// tokenizer was assembled without one.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use morphtok::Tokenizer;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let tokenizer = Tokenizer::load("tokenizer.json")?;
    /// println!("Thumbprint: {:?}", tokenizer.thumbprint());
    /// # Ok(())
    /// # }
    /// ```
    pub fn thumbprint(&self) -> Option<&str> {
        self.thumbprint.as_deref()
    }

    /// Get the vocabulary size
    ///
    /// # Returns
    ///
    /// The total number of bases in the vocabulary, reserved tokens
    /// included.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use morphtok::Tokenizer;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let tokenizer = Tokenizer::load("tokenizer.json")?;
    /// println!("Vocabulary size: {}", tokenizer.vocab_size());
    /// # Ok(())
    /// # }
    /// ```
    pub fn vocab_size(&self) -> usize {
        self.model.vocab().len()
    }

    /// Check if a vocabulary id belongs to a reserved token
    ///
    /// # Arguments
    ///
    /// * `id` - The vocabulary id to check
    ///
    /// # Returns
    ///
    /// Returns true if the id names one of the reserved tokens (e.g.
    /// `[PAD]`, `[UNK]`), false otherwise.
    pub fn is_reserved_id(&self, id: TokenId) -> bool {
        self.reserved_ids.contains(&id)
    }

    /// Tokenize text with default options
    ///
    /// # Arguments
    ///
    /// * `text` - The input text to tokenize
    ///
    /// # Returns
    ///
    /// Returns a vector of [`Token`]s; only the first token of each word
    /// carries the case/whitespace flags.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use morphtok::Tokenizer;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let tokenizer = Tokenizer::load("tokenizer.json")?;
    /// let tokens = tokenizer.tokenize("Hello world");
    /// println!("{} tokens", tokens.len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        self.tokenize_with(text, &TokenizeOptions::default())
    }

    /// Tokenize text with explicit options
    ///
    /// # Arguments
    ///
    /// * `text` - The input text to tokenize
    /// * `options` - Reserved-token handling and decomposition options
    ///
    /// # Returns
    ///
    /// Returns a vector of [`Token`]s for the input text.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use morphtok::{TokenizeOptions, Tokenizer};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let tokenizer = Tokenizer::load("tokenizer.json")?;
    /// let options = TokenizeOptions { handle_reserved: true, ..TokenizeOptions::default() };
    /// let tokens = tokenizer.tokenize_with("[SOT]Hello world[EOT]", &options);
    /// # Ok(())
    /// # }
    /// ```
    pub fn tokenize_with(&self, text: &str, options: &TokenizeOptions) -> Vec<Token> {
        let mut cache = WordCache::new();
        self.tokenize_cached(text, options, &mut cache)
    }

    /// Tokenize with a caller-owned word cache, short-circuiting repeated
    /// words across calls
    ///
    /// # Arguments
    ///
    /// * `text` - The input text to tokenize
    /// * `options` - Reserved-token handling and decomposition options
    /// * `cache` - Map from escaped words to their model encodings,
    ///   consulted before encoding and updated afterwards
    ///
    /// # Returns
    ///
    /// Returns a vector of [`Token`]s for the input text.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use morphtok::{TokenizeOptions, Tokenizer, WordCache};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let tokenizer = Tokenizer::load("tokenizer.json")?;
    /// let options = TokenizeOptions::default();
    /// let mut cache = WordCache::new();
    /// for line in ["first line", "second line"] {
    ///     let tokens = tokenizer.tokenize_cached(line, &options, &mut cache);
    ///     println!("{}: {} tokens", line, tokens.len());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn tokenize_cached(
        &self,
        text: &str,
        options: &TokenizeOptions,
        cache: &mut WordCache,
    ) -> Vec<Token> {
        let (words, _) = self.pre.split_and_escape_with(
            text,
            options.handle_reserved,
            options.allowed_reserved.as_deref(),
        );
        self.encode_words(&words, options, cache).0
    }

    /// Tokenize, also returning the byte range of each word in the
    /// normalized text and a token → word index map
    ///
    /// # Arguments
    ///
    /// * `text` - The input text to tokenize
    /// * `options` - Reserved-token handling and decomposition options
    ///
    /// # Returns
    ///
    /// Returns `(tokens, ranges, token_to_word)`: the tokens, one
    /// `(offset, len)` byte range per word into the normalized text, and
    /// for each token the index of the word it belongs to.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use morphtok::{TokenizeOptions, Tokenizer};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let tokenizer = Tokenizer::load("tokenizer.json")?;
    /// let (tokens, ranges, token_to_word) =
    ///     tokenizer.tokenize_with_ranges("Hello world", &TokenizeOptions::default());
    /// for (token, &word_idx) in tokens.iter().zip(&token_to_word) {
    ///     let (start, len) = ranges[word_idx];
    ///     println!("{:?} covers bytes {}..{}", token, start, start + len);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn tokenize_with_ranges(
        &self,
        text: &str,
        options: &TokenizeOptions,
    ) -> (Vec<Token>, Vec<(usize, usize)>, Vec<usize>) {
        let (words, ranges) = self.pre.split_and_escape_with(
            text,
            options.handle_reserved,
            options.allowed_reserved.as_deref(),
        );
        let mut cache = WordCache::new();
        let (tokens, token_to_word) = self.encode_words(&words, options, &mut cache);
        (tokens, ranges, token_to_word)
    }

    /// Tokenize words that are already split and escaped, given in the
    /// marked form (leading `G` for the space flag, `Y`/`YY` for case)
    ///
    /// # Arguments
    ///
    /// * `words` - Marked escaped words, e.g. from
    ///   [`Escaped::marked`](alphabet::Escaped::marked)
    /// * `options` - Reserved-token handling and decomposition options
    ///
    /// # Returns
    ///
    /// Returns a vector of [`Token`]s, with the parsed flags on the first
    /// token of each word.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use morphtok::{TokenizeOptions, Tokenizer};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let tokenizer = Tokenizer::load("tokenizer.json")?;
    /// // "Yhello" is title-cased, "Gworld" carries a leading space
    /// let tokens =
    ///     tokenizer.tokenize_pretokenized(&["Yhello", "Gworld"], &TokenizeOptions::default());
    /// # Ok(())
    /// # }
    /// ```
    pub fn tokenize_pretokenized(&self, words: &[&str], options: &TokenizeOptions) -> Vec<Token> {
        let escaped: Vec<Escaped> = words
            .iter()
            .map(|&marked| {
                if options.handle_reserved && self.pre.is_reserved(marked) {
                    return Escaped::plain(marked);
                }
                let mut word = marked;
                let mut ws = 0u8;
                let mut up = 0u8;
                if word.len() > 1 {
                    let bytes = word.as_bytes();
                    if bytes[0] == alphabet::SPACE_MARK as u8
                        && bytes[1] != alphabet::SPACE_MARK as u8
                    {
                        ws = 1;
                        word = &word[1..];
                    }
                    let bytes = word.as_bytes();
                    if !bytes.is_empty() && bytes[0] == alphabet::UPPER_MARK as u8 {
                        up = if bytes.len() > 1 && bytes[1] == alphabet::UPPER_MARK as u8 {
                            2
                        } else {
                            1
                        };
                        word = &word[up as usize..];
                    }
                }
                Escaped { word: word.to_string(), ws, up }
            })
            .collect();
        let mut cache = WordCache::new();
        self.encode_words(&escaped, options, &mut cache).0
    }

    fn encode_words(
        &self,
        words: &[Escaped],
        options: &TokenizeOptions,
        cache: &mut WordCache,
    ) -> (Vec<Token>, Vec<usize>) {
        let mut tokens = Vec::new();
        let mut token_to_word = Vec::new();
        for (word_idx, escaped) in words.iter().enumerate() {
            let ids = match cache.get(&escaped.word) {
                Some(ids) => ids.clone(),
                None => {
                    let ids = self.encode_word(&escaped.word, options);
                    cache.insert(escaped.word.clone(), ids.clone());
                    ids
                }
            };
            for (k, &(vocab_id, rule_id)) in ids.iter().enumerate() {
                let (case_id, space_id) =
                    if k == 0 { (escaped.up, escaped.ws) } else { (0, 0) };
                tokens.push(Token { vocab_id, rule_id, case_id, space_id });
                token_to_word.push(word_idx);
            }
        }
        (tokens, token_to_word)
    }

    fn encode_word(&self, word: &str, options: &TokenizeOptions) -> Vec<(TokenId, TokenId)> {
        if options.handle_reserved && self.pre.is_reserved(word) {
            let allowed = options
                .allowed_reserved
                .as_ref()
                .map_or(true, |allowed| allowed.iter().any(|t| t == word));
            if allowed {
                if let Some(id) = self.model.vocab_lookup(word) {
                    return vec![(id, 0)];
                }
            }
        }
        self.model.encode_with(word, None, options.force_slow, false)
    }

    /// Pack tokens into `(vocab_id, property_id)` pairs
    ///
    /// # Arguments
    ///
    /// * `tokens` - The tokens to pack
    ///
    /// # Returns
    ///
    /// Returns one `(vocab_id, rule_id·6 + up·2 + ws)` pair per token.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use morphtok::Tokenizer;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let tokenizer = Tokenizer::load("tokenizer.json")?;
    /// let tokens = tokenizer.tokenize("Hello world");
    /// let packed = Tokenizer::merge_ids(&tokens);
    /// assert_eq!(Tokenizer::split_ids(&packed), tokens);
    /// # Ok(())
    /// # }
    /// ```
    pub fn merge_ids(tokens: &[Token]) -> Vec<(TokenId, TokenId)> {
        tokens.iter().map(Token::merged).collect()
    }

    /// Unpack `(vocab_id, property_id)` pairs
    ///
    /// # Arguments
    ///
    /// * `ids` - Pairs produced by [`merge_ids`](Self::merge_ids)
    ///
    /// # Returns
    ///
    /// Returns the unpacked [`Token`]s with rule id and flags restored.
    pub fn split_ids(ids: &[(TokenId, TokenId)]) -> Vec<Token> {
        ids.iter().map(|&(v, p)| Token::from_merged(v, p)).collect()
    }

    /// Reassemble text from tokens
    ///
    /// A token ends its word when its rule ends in the end-of-word marker
    /// or its vocabulary id is reserved; reserved tokens never merge into
    /// surrounding words.
    ///
    /// # Arguments
    ///
    /// * `tokens` - The tokens to detokenize
    /// * `omit_reserved` - If true, reserved tokens become empty strings
    ///   in the output
    ///
    /// # Returns
    ///
    /// Returns the reassembled text.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use morphtok::Tokenizer;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let tokenizer = Tokenizer::load("tokenizer.json")?;
    /// let tokens = tokenizer.tokenize("Hello world");
    /// let text = tokenizer.detokenize(&tokens, true);
    /// assert_eq!(text, "Hello world");
    /// # Ok(())
    /// # }
    /// ```
    pub fn detokenize(&self, tokens: &[Token], omit_reserved: bool) -> String {
        self.detokenize_parts(tokens, omit_reserved).0
    }

    /// Detokenize packed `(vocab_id, property_id)` pairs
    ///
    /// # Arguments
    ///
    /// * `ids` - Pairs produced by [`merge_ids`](Self::merge_ids)
    /// * `omit_reserved` - If true, reserved tokens become empty strings
    ///   in the output
    ///
    /// # Returns
    ///
    /// Returns the reassembled text.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use morphtok::Tokenizer;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let tokenizer = Tokenizer::load("tokenizer.json")?;
    /// let packed = Tokenizer::merge_ids(&tokenizer.tokenize("Hello world"));
    /// let text = tokenizer.detokenize_merged(&packed, true);
    /// # Ok(())
    /// # }
    /// ```
    pub fn detokenize_merged(&self, ids: &[(TokenId, TokenId)], omit_reserved: bool) -> String {
        self.detokenize(&Self::split_ids(ids), omit_reserved)
    }

    /// As [`detokenize`](Self::detokenize), also returning the byte range
    /// of each word in the output and a token → word index map
    ///
    /// # Arguments
    ///
    /// * `tokens` - The tokens to detokenize
    /// * `omit_reserved` - If true, reserved tokens become empty strings
    ///   in the output
    ///
    /// # Returns
    ///
    /// Returns `(text, ranges, token_to_word)`: the reassembled text, one
    /// `(offset, len)` byte range per word, and for each token the index
    /// of the word it produced.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use morphtok::Tokenizer;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let tokenizer = Tokenizer::load("tokenizer.json")?;
    /// let tokens = tokenizer.tokenize("Hello world");
    /// let (text, ranges, _token_to_word) = tokenizer.detokenize_with_ranges(&tokens, true);
    /// for (start, len) in ranges {
    ///     println!("word: {:?}", &text[start..start + len]);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn detokenize_with_ranges(
        &self,
        tokens: &[Token],
        omit_reserved: bool,
    ) -> (String, Vec<(usize, usize)>, Vec<usize>) {
        let (text, words, token_to_word) = self.detokenize_parts(tokens, omit_reserved);
        let mut ranges = Vec::with_capacity(words.len());
        let mut offset = 0;
        for word in &words {
            ranges.push((offset, word.len()));
            offset += word.len();
        }
        (text, ranges, token_to_word)
    }

    fn detokenize_parts(
        &self,
        tokens: &[Token],
        omit_reserved: bool,
    ) -> (String, Vec<String>, Vec<usize>) {
        let mut words: Vec<String> = Vec::new();
        let mut token_to_word = Vec::with_capacity(tokens.len());
        let mut current: Vec<(TokenId, TokenId)> = Vec::new();
        let mut current_ws = 0u8;
        let mut current_up = 0u8;
        let mut starting = true;

        for token in tokens {
            if starting {
                current_ws = token.space_id;
                current_up = token.case_id;
                starting = false;
            }

            let reserved = self.reserved_ids.contains(&token.vocab_id);
            let eow = self.model.is_eow_rule(token.rule_id) || reserved;
            current.push((token.vocab_id, token.rule_id));
            token_to_word.push(words.len());

            if eow {
                if reserved {
                    // a stray non-reserved prefix is flushed as its own word
                    if current.len() > 1 {
                        let word = self.model.decode(&current[..current.len() - 1], false);
                        words.push(alphabet::unescape_parts(&word, current_ws, current_up));
                        current.drain(..current.len() - 1);
                        if let Some(last) = token_to_word.last_mut() {
                            *last = words.len();
                        }
                    }
                    if omit_reserved {
                        words.push(String::new());
                    } else {
                        words.push(self.model.decode(&current, false));
                    }
                } else {
                    let word = self.model.decode(&current, false);
                    words.push(alphabet::unescape_parts(&word, current_ws, current_up));
                }
                current.clear();
                starting = true;
            }
        }

        if !current.is_empty() {
            let word = self.model.decode(&current, false);
            if omit_reserved && self.pre.is_reserved(&word) {
                words.push(String::new());
            } else {
                words.push(alphabet::unescape_parts(&word, current_ws, current_up));
            }
        }

        (words.concat(), words, token_to_word)
    }

    // -- persistence ----------------------------------------------------

    /// Serialize the tokenizer to a JSON string
    ///
    /// # Returns
    ///
    /// Returns the `{pre, model, thumbprint}` JSON document, or
    /// `Err(Error)` if serialization fails.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use morphtok::Tokenizer;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let tokenizer = Tokenizer::load("tokenizer.json")?;
    /// let json = tokenizer.to_json()?;
    /// println!("{} bytes", json.len());
    /// # Ok(())
    /// # }
    /// ```
    #[must_use = "to_json returns a Result that must be handled"]
    pub fn to_json(&self) -> Result<String, Error> {
        let data = TokenizerData {
            pre: self.pre.to_data(),
            model: self.model.to_data(),
            thumbprint: self.thumbprint.clone(),
        };
        serde_json::to_string(&data).map_err(|e| Error::Format(e.to_string()))
    }

    /// Deserialize a tokenizer from a JSON string
    ///
    /// # Arguments
    ///
    /// * `json` - A document produced by [`to_json`](Self::to_json)
    ///
    /// # Returns
    ///
    /// Returns `Ok(Tokenizer)` on success, or `Err(Error)` if the JSON is
    /// malformed or describes an invalid configuration.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use morphtok::Tokenizer;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let json = std::fs::read_to_string("tokenizer.json")?;
    /// let tokenizer = Tokenizer::from_json(&json)?;
    /// # Ok(())
    /// # }
    /// ```
    #[must_use = "from_json returns a Result that must be handled"]
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let data: TokenizerData =
            serde_json::from_str(json).map_err(|e| Error::Format(e.to_string()))?;
        let pre = PreTokenizer::from_data(data.pre)?;
        let model = Model::from_data(data.model)?;
        Self::from_parts(pre, model, data.thumbprint)
    }

    /// Save the tokenizer to a JSON file
    ///
    /// # Arguments
    ///
    /// * `path` - Path of the file to write
    ///
    /// # Returns
    ///
    /// Returns `Ok(())` on success, or `Err(Error)` if the file cannot be
    /// written.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use morphtok::Tokenizer;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let tokenizer = Tokenizer::load("tokenizer.json")?;
    /// tokenizer.save("tokenizer-copy.json")?;
    /// # Ok(())
    /// # }
    /// ```
    #[must_use = "save returns a Result that must be handled"]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load a tokenizer saved by [`save`](Self::save)
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the JSON file containing the tokenizer
    ///
    /// # Returns
    ///
    /// Returns `Ok(Tokenizer)` on success, or `Err(Error)` if the file
    /// cannot be read or contains an invalid tokenizer.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use morphtok::Tokenizer;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let tokenizer = Tokenizer::load("tokenizer.json")?;
    /// let tokens = tokenizer.tokenize("Hello world");
    /// # Ok(())
    /// # }
    /// ```
    #[must_use = "load returns a Result that must be handled"]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

#[derive(Serialize, Deserialize)]
struct TokenizerData {
    pre: PreData,
    model: ModelData,
    thumbprint: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No lattice path covers word: {0}")]
    Coverage(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_prop_id_packing() {
        for rule_id in [0u32, 1, 7, 500] {
            for case_id in 0..3u8 {
                for space_id in 0..2u8 {
                    let token = Token { vocab_id: 42, rule_id, case_id, space_id };
                    let (v, p) = token.merged();
                    assert_eq!(Token::from_merged(v, p), token);
                }
            }
        }
    }
}
