use anyhow::{ensure, Result};
use ndarray::{s, Array2, ArrayView1, ArrayView2};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use std::sync::Arc;

/// Configuration for language-model batching.
///
/// Example:
/// ```ignore
/// let cfg = LmConfig::builder()
///     .batch_size(64)
///     .bptt(70)
///     .backwards(false)
///     .shuffle(true)
///     .seed(42)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct LmConfig {
    /// Number of parallel row-streams the corpus is split into.
    pub batch_size: usize,
    /// Window length along the time dimension of each batch.
    pub bptt: usize,
    /// Reverse the token stream so the model reads the corpus end-to-start.
    pub backwards: bool,
    /// Permute document order once per epoch before concatenation.
    pub shuffle: bool,
    /// Base RNG seed; the epoch RNG is `seed + epoch`.
    pub seed: u64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            bptt: 70,
            backwards: false,
            shuffle: false,
            seed: 0,
        }
    }
}

impl LmConfig {
    pub fn builder() -> LmConfigBuilder {
        LmConfigBuilder::default()
    }
}

/// Builder for [`LmConfig`] with method chaining.
#[derive(Default)]
pub struct LmConfigBuilder {
    config: LmConfig,
}

impl LmConfigBuilder {
    /// Set the number of parallel row-streams (must be > 0).
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Set the window length (must be > 0).
    pub fn bptt(mut self, bptt: usize) -> Self {
        self.config.bptt = bptt;
        self
    }

    /// Set whether the stream is read back-to-front.
    pub fn backwards(mut self, backwards: bool) -> Self {
        self.config.backwards = backwards;
        self
    }

    /// Set whether document order is reshuffled every epoch.
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = shuffle;
        self
    }

    /// Set the base RNG seed used for the per-epoch document shuffle.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn build(self) -> LmConfig {
        self.config
    }
}

/// ============================================================================
/// Packs an ordered corpus of variable-length token-ID documents into
/// fixed-width language-model batches.
///
/// Per epoch, the documents are concatenated (in original or reshuffled
/// order) into one flat token stream, which is then split into
/// `batch_size` contiguous row-streams of equal length — `batch_size`
/// parallel reading heads over the corpus, with any remainder tokens
/// truncated. A batch at window `t` pairs `rows[:, t..t+bptt]` with the
/// next-token targets `rows[:, t+1..t+bptt+1]`; row `r` of one batch
/// continues seamlessly into row `r` of the next.
///
/// # Backwards mode
/// With `backwards = true` the stream is reversed in full BEFORE the row
/// split (equivalently: documents concatenated in reverse order, each with
/// its tokens reversed). Read token-by-token across a whole epoch, the
/// backward row-streams are the exact global reverse of the forward ones —
/// not per-batch reversal, and not a reordering of forward batches.
/// Reversing after windowing would break cross-batch continuity, so the
/// reversal never happens post-hoc.
///
/// # Resource model
/// The preloader holds a non-owning `Arc` reference to the caller's
/// documents and materializes one `(batch_size, row_len)` row buffer at
/// construction, refilled in place on the first batch request of each
/// epoch. Batches are zero-copy views into that buffer.
pub struct LanguageModelPreLoader {
    documents: Arc<[Vec<i64>]>,
    config: LmConfig,
    total_tokens: usize,
    row_len: usize,
    rows: Array2<i64>,
    stream: Vec<i64>,
    loaded_epoch: Option<usize>,
}

impl LanguageModelPreLoader {
    /// Creates a preloader over `documents`.
    ///
    /// Fails fast at construction when the configuration is structurally
    /// invalid: zero `batch_size` or `bptt`, or a corpus too short to give
    /// every row-stream at least one input and one target token.
    pub fn new(documents: Arc<[Vec<i64>]>, config: LmConfig) -> Result<Self> {
        ensure!(
            config.batch_size > 0,
            "batch_size must be > 0, but got batch_size={}",
            config.batch_size
        );
        ensure!(
            config.bptt > 0,
            "bptt must be > 0, but got bptt={}",
            config.bptt
        );

        let total_tokens: usize = documents.iter().map(Vec::len).sum();
        let row_len = total_tokens / config.batch_size;
        ensure!(
            row_len >= 2,
            "batch_size {} splits a corpus of {} tokens into rows of {} token(s); \
             every row needs at least one input and one target token",
            config.batch_size,
            total_tokens,
            row_len,
        );

        let rows = Array2::zeros((config.batch_size, row_len));
        Ok(Self {
            documents,
            config,
            total_tokens,
            row_len,
            rows,
            stream: Vec::new(),
            loaded_epoch: None,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    pub fn bptt(&self) -> usize {
        self.config.bptt
    }

    /// Tokens per row-stream (floor of corpus length over `batch_size`).
    pub fn row_len(&self) -> usize {
        self.row_len
    }

    /// Corpus token count before remainder truncation.
    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    /// Number of batches one epoch yields. The final window may be narrower
    /// than `bptt`.
    pub fn batches_per_epoch(&self) -> usize {
        (self.row_len - 1).div_ceil(self.config.bptt)
    }

    /// Returns the `(inputs, targets)` pair for `batch_index` within `epoch`,
    /// both of shape `(batch_size, w)` where `w = min(bptt, remaining)`.
    /// Targets are the inputs shifted one token ahead.
    ///
    /// Views borrow the internal row buffer; requesting a batch from a
    /// different epoch refills the buffer in place.
    pub fn batch(
        &mut self,
        epoch: usize,
        batch_index: usize,
    ) -> Result<(ArrayView2<'_, i64>, ArrayView2<'_, i64>)> {
        ensure!(
            batch_index < self.batches_per_epoch(),
            "batch index {} out of range: epoch has {} batches",
            batch_index,
            self.batches_per_epoch(),
        );
        if self.loaded_epoch != Some(epoch) {
            self.load_epoch(epoch);
        }

        let t = batch_index * self.config.bptt;
        let w = self.config.bptt.min(self.row_len - 1 - t);
        let inputs = self.rows.slice(s![.., t..t + w]);
        let targets = self.rows.slice(s![.., t + 1..t + 1 + w]);
        Ok((inputs, targets))
    }

    /// Rebuilds the row buffer for `epoch`: document order, then the flat
    /// stream in final reading direction, then the contiguous row split.
    fn load_epoch(&mut self, epoch: usize) {
        let mut order: Vec<usize> = (0..self.documents.len()).collect();
        if self.config.shuffle {
            let mut rng =
                StdRng::seed_from_u64(self.config.seed.wrapping_add(epoch as u64));
            order.shuffle(&mut rng);
        }

        // The stream must already be in reading order when it is split into
        // rows; backwards reversal applied any later would only reverse
        // within windows.
        self.stream.clear();
        self.stream.reserve(self.total_tokens);
        if self.config.backwards {
            for &doc in order.iter().rev() {
                self.stream.extend(self.documents[doc].iter().rev());
            }
        } else {
            for &doc in &order {
                self.stream.extend_from_slice(&self.documents[doc]);
            }
        }

        for r in 0..self.config.batch_size {
            let start = r * self.row_len;
            self.rows
                .row_mut(r)
                .assign(&ArrayView1::from(&self.stream[start..start + self.row_len]));
        }
        self.loaded_epoch = Some(epoch);
    }
}
