//! Word-count extraction and vocabulary file I/O.
//!
//! Training consumes `{word: count}` maps. They are stored either as a JSON
//! object or as JSONL lines of `[word, count]` pairs; the extension decides.

use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::pre::{Normalization, PreTokenizer, PreTokenizerOptions};
use crate::Error;

/// Count split and normalized words across a text iterator. Words are the
/// escape-ready surface forms: normalized, stripped of a single leading
/// space, lowercased.
pub fn extract_vocab<I, S>(
    texts: I,
    normalization: Option<Normalization>,
    min_frequency: Option<u64>,
) -> Result<HashMap<String, f64>, Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let pre = PreTokenizer::new(
        &crate::alphabet::min_alphabet(),
        PreTokenizerOptions { normalization, ..PreTokenizerOptions::default() },
    )?;

    let mut vocab: HashMap<String, f64> = HashMap::new();
    for text in texts {
        for word in pre.split(text.as_ref()) {
            if word.is_empty() {
                continue;
            }
            let word = if word.chars().count() > 1 {
                word.trim_matches(' ').to_string()
            } else {
                word
            };
            let word = word.to_lowercase();
            *vocab.entry(word).or_insert(0.0) += 1.0;
        }
    }
    if let Some(min) = min_frequency {
        vocab.retain(|_, count| *count >= min as f64);
    }
    Ok(vocab)
}

/// Save a vocabulary as `.json` (`{word: count}` object) or `.jsonl`
/// (`[word, count]` lines, heaviest first).
pub fn save_vocab<P: AsRef<Path>>(path: P, vocab: &HashMap<String, f64>) -> Result<(), Error> {
    let path = path.as_ref();
    let extension = path.extension().and_then(|e| e.to_str());
    match extension {
        Some("json") => {
            let ordered: BTreeMap<&String, f64> =
                vocab.iter().map(|(w, &c)| (w, c)).collect();
            let json = serde_json::to_string(&ordered).map_err(|e| Error::Format(e.to_string()))?;
            std::fs::write(path, json)?;
        }
        Some("jsonl") => {
            let mut entries: Vec<(&String, f64)> = vocab.iter().map(|(w, &c)| (w, c)).collect();
            entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            let mut file = std::fs::File::create(path)?;
            for (word, count) in entries {
                let line = serde_json::to_string(&(word, count))
                    .map_err(|e| Error::Format(e.to_string()))?;
                writeln!(file, "{line}")?;
            }
        }
        _ => {
            return Err(Error::Format(format!(
                "unsupported vocabulary file extension: {}",
                path.display()
            )))
        }
    }
    Ok(())
}

/// Load a vocabulary saved by [`save_vocab`].
pub fn load_vocab<P: AsRef<Path>>(path: P) -> Result<HashMap<String, f64>, Error> {
    let path = path.as_ref();
    let extension = path.extension().and_then(|e| e.to_str());
    match extension {
        Some("json") => {
            let json = std::fs::read_to_string(path)?;
            serde_json::from_str(&json).map_err(|e| Error::Format(e.to_string()))
        }
        Some("jsonl") => {
            let reader = BufReader::new(std::fs::File::open(path)?);
            let mut vocab = HashMap::new();
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let (word, count): (String, f64) =
                    serde_json::from_str(&line).map_err(|e| Error::Format(e.to_string()))?;
                vocab.insert(word, count);
            }
            Ok(vocab)
        }
        _ => Err(Error::Format(format!(
            "unsupported vocabulary file extension: {}",
            path.display()
        ))),
    }
}
