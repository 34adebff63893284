use crate::transforms::Transform;
use crate::vocab::{Vocab, BOS};
use anyhow::Result;
use std::sync::Arc;

/// A text-cleanup rule applied to the raw string before splitting.
pub type PreRule = Arc<dyn Fn(String) -> String + Send + Sync>;

/// ============================================================================
/// Splits raw text into lowercase whitespace-delimited tokens.
///
/// This is deliberately a minimal engine: caller-supplied pre-rules handle
/// any domain-specific rewriting (`Fn(String) -> String`, applied in
/// registration order before splitting), and an optional beginning-of-stream
/// marker is prepended per document so that document boundaries survive
/// concatenation into a language-model stream.
///
/// # Example
/// ```ignore
/// let tokenize = Tokenize::new()
///     .with_pre_rule(|s| s.replace("fast ai", "@fastdotai"))
///     .with_bos();
/// let tokens = tokenize.apply("fast ai is a cool project".to_string())?;
/// assert_eq!(tokens[0], "xxbos");
/// assert_eq!(tokens[1], "@fastdotai");
/// ```
#[derive(Clone, Default)]
pub struct Tokenize {
    pre_rules: Vec<PreRule>,
    bos: bool,
}

impl Tokenize {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pre-rule, applied before splitting in registration order.
    pub fn with_pre_rule(mut self, rule: impl Fn(String) -> String + Send + Sync + 'static) -> Self {
        self.pre_rules.push(Arc::new(rule));
        self
    }

    /// Prepends the [`BOS`] marker to every tokenized document.
    pub fn with_bos(mut self) -> Self {
        self.bos = true;
        self
    }
}

impl Transform<String, Vec<String>> for Tokenize {
    fn apply(&self, text: String) -> Result<Vec<String>> {
        let mut text = text;
        for rule in &self.pre_rules {
            text = rule(text);
        }

        let mut tokens = Vec::new();
        if self.bos {
            tokens.push(BOS.to_string());
        }
        tokens.extend(text.split_whitespace().map(|t| t.to_lowercase()));
        Ok(tokens)
    }
}

/// ============================================================================
/// Converts tokenized documents into integer-ID sequences via a shared
/// [`Vocab`]. Unknown tokens map to the vocabulary's unknown-token ID.
///
/// Chains behind [`Tokenize`]:
/// ```ignore
/// let pipeline = Tokenize::new().with_bos().then(Numericalize::new(vocab));
/// let ids: Vec<i64> = pipeline.apply("hello world".to_string())?;
/// ```
#[derive(Debug, Clone)]
pub struct Numericalize {
    vocab: Arc<Vocab>,
}

impl Numericalize {
    pub fn new(vocab: Arc<Vocab>) -> Self {
        Self { vocab }
    }
}

impl Transform<Vec<String>, Vec<i64>> for Numericalize {
    fn apply(&self, tokens: Vec<String>) -> Result<Vec<i64>> {
        Ok(self.vocab.numericalize(&tokens))
    }
}
