use anyhow::{bail, Result};
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use std::collections::HashMap;

/// Marker emitted for tokens missing from the vocabulary.
pub const UNK: &str = "xxunk";
/// Marker used to pad variable-length sequences into rectangular batches.
pub const PAD: &str = "xxpad";
/// Marker prepended at the beginning of each document.
pub const BOS: &str = "xxbos";
/// Marker separating multiple text fields of one example.
pub const FLD: &str = "xxfld";
/// Marker flagging that the next token was capitalized.
pub const TK_MAJ: &str = "xxmaj";
/// Marker flagging that the next token was all-uppercase.
pub const TK_UP: &str = "xxup";
/// Marker flagging a run of a repeated character.
pub const TK_REP: &str = "xxrep";
/// Marker flagging a run of a repeated word.
pub const TK_WREP: &str = "xxwrep";

/// Reserved tokens occupying the lowest IDs of every built vocabulary,
/// in canonical order.
pub const SPECIAL_TOKENS: [&str; 8] = [UNK, PAD, BOS, FLD, TK_MAJ, TK_UP, TK_REP, TK_WREP];

/// A `Vocab` maps tokens to integer IDs and back.
///
/// The forward table `itos` (ID -> token) is the source of truth; the
/// reverse table `stoi` is derived from it and rebuilt on deserialization.
/// When built with [`Vocab::build`], the eight [`SPECIAL_TOKENS`] occupy
/// IDs `0..8` and content tokens follow in descending frequency order.
///
/// # Example
/// ```ignore
/// let docs = vec![vec!["hello".to_string(), "world".to_string()]];
/// let vocab = Vocab::build(&docs, 60_000, 1);
/// let ids = vocab.numericalize(&["hello".to_string()]);
/// assert_eq!(vocab.textify(&ids)?, vec!["hello"]);
/// ```
#[derive(Debug, Clone)]
pub struct Vocab {
    itos: Vec<String>,
    stoi: HashMap<String, i64>,
}

impl Vocab {
    /// Creates a vocabulary from an explicit ID -> token table.
    /// On duplicate tokens, the lowest ID wins.
    pub fn from_itos(itos: Vec<String>) -> Self {
        let mut stoi = HashMap::with_capacity(itos.len());
        for (id, token) in itos.iter().enumerate() {
            stoi.entry(token.clone()).or_insert(id as i64);
        }
        Self { itos, stoi }
    }

    /// Builds a vocabulary from tokenized documents.
    ///
    /// # Arguments
    /// - `docs`: tokenized documents to count frequencies over.
    /// - `max_vocab`: maximum number of content tokens kept (the eight
    ///   [`SPECIAL_TOKENS`] are always present on top of this cap).
    /// - `min_freq`: minimum occurrence count for a token to be kept.
    ///
    /// Content tokens are ordered by descending frequency; ties break
    /// lexicographically so the table is deterministic.
    pub fn build(docs: &[Vec<String>], max_vocab: usize, min_freq: usize) -> Self {
        let mut freq: HashMap<&str, usize> = HashMap::new();
        for doc in docs {
            for token in doc {
                *freq.entry(token.as_str()).or_insert(0) += 1;
            }
        }
        for special in SPECIAL_TOKENS {
            freq.remove(special);
        }

        let mut counted: Vec<(&str, usize)> = freq
            .into_iter()
            .filter(|&(_, count)| count >= min_freq)
            .collect();
        counted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        counted.truncate(max_vocab);

        let itos = SPECIAL_TOKENS
            .iter()
            .map(|s| s.to_string())
            .chain(counted.into_iter().map(|(token, _)| token.to_string()))
            .collect();
        Self::from_itos(itos)
    }

    /// Number of entries in the vocabulary, specials included.
    pub fn len(&self) -> usize {
        self.itos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.itos.is_empty()
    }

    /// The ID -> token table.
    pub fn itos(&self) -> &[String] {
        &self.itos
    }

    /// Looks up a single token, falling back to the unknown-token ID.
    pub fn token_id(&self, token: &str) -> i64 {
        self.stoi
            .get(token)
            .copied()
            .unwrap_or_else(|| self.unk_id())
    }

    pub fn unk_id(&self) -> i64 {
        self.stoi.get(UNK).copied().unwrap_or(0)
    }

    pub fn pad_id(&self) -> i64 {
        self.stoi.get(PAD).copied().unwrap_or(1)
    }

    /// Converts tokens to IDs; unknown tokens map to [`UNK`].
    pub fn numericalize(&self, tokens: &[String]) -> Vec<i64> {
        tokens.iter().map(|t| self.token_id(t)).collect()
    }

    /// Converts IDs back to tokens. Fails on IDs outside the table.
    pub fn textify(&self, ids: &[i64]) -> Result<Vec<String>> {
        ids.iter()
            .map(|&id| match self.itos.get(id as usize) {
                Some(token) => Ok(token.clone()),
                None => bail!(
                    "Token ID {} out of range for vocabulary of size {}",
                    id,
                    self.itos.len()
                ),
            })
            .collect()
    }
}

/// Serialized as the bare `itos` table; `stoi` is rebuilt on load.
impl Serialize for Vocab {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.itos.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Vocab {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let itos = Vec::<String>::deserialize(deserializer)?;
        Ok(Self::from_itos(itos))
    }
}
