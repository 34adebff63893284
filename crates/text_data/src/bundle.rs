use crate::collator::{PadCollator, PadSide};
use crate::dataset::TextDataset;
use crate::minibatch::MiniBatch;
use crate::preloader::{LanguageModelPreLoader, LmConfig};
use crate::sampler::{Sampler, SortSampler, SortishSampler};
use crate::transforms::{Numericalize, Tokenize, Transform};
use crate::vocab::Vocab;
use anyhow::{anyhow, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

/// Which half of a [`TextBundle`] to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Valid,
}

/// A prepared text dataset: numericalized train/valid documents, the
/// vocabulary they were encoded with, and the class-label table.
///
/// A bundle is the hand-off point between preparation and training: build
/// it once from raw texts (or pre-tokenized IDs), persist it with
/// [`save`](Self::save), and spin up language-model or classifier loaders
/// from it on demand. All construction-time validation happens here, so a
/// bundle that exists can always produce batches.
#[derive(Debug, Clone)]
pub struct TextBundle {
    train: TextDataset,
    valid: TextDataset,
    vocab: Arc<Vocab>,
    classes: Vec<String>,
}

/// On-disk form of a bundle (`bundle.json`).
#[derive(Serialize, Deserialize)]
struct BundleSnapshot {
    vocab: Vocab,
    classes: Vec<String>,
    train_documents: Vec<Vec<i64>>,
    train_labels: Vec<i64>,
    valid_documents: Vec<Vec<i64>>,
    valid_labels: Vec<i64>,
}

impl TextBundle {
    /// Assembles a bundle from pre-tokenized ID sequences.
    ///
    /// Labels index into `classes`; a label outside that range, or a
    /// document/label count mismatch, fails here rather than mid-epoch.
    pub fn from_ids(
        train_documents: Vec<Vec<i64>>,
        train_labels: Vec<i64>,
        valid_documents: Vec<Vec<i64>>,
        valid_labels: Vec<i64>,
        vocab: Vocab,
        classes: Vec<String>,
    ) -> Result<Self> {
        ensure!(!classes.is_empty(), "Class table must not be empty");
        let train = TextDataset::new(train_documents, train_labels)
            .context("Invalid training split")?;
        let valid = TextDataset::new(valid_documents, valid_labels)
            .context("Invalid validation split")?;
        for (split, dataset) in [("train", &train), ("valid", &valid)] {
            for &label in dataset.labels() {
                ensure!(
                    (0..classes.len() as i64).contains(&label),
                    "{} label {} out of range for {} classes",
                    split,
                    label,
                    classes.len(),
                );
            }
        }
        Ok(Self {
            train,
            valid,
            vocab: Arc::new(vocab),
            classes,
        })
    }

    /// Tokenizes and numericalizes raw labeled texts into a bundle.
    ///
    /// The vocabulary is built from the training split only
    /// (`max_vocab`/`min_freq` as in [`Vocab::build`]); the class table is
    /// the sorted set of label strings seen across both splits.
    pub fn from_texts(
        train_texts: &[String],
        train_labels: &[String],
        valid_texts: &[String],
        valid_labels: &[String],
        tokenizer: &Tokenize,
        max_vocab: usize,
        min_freq: usize,
    ) -> Result<Self> {
        ensure!(
            train_texts.len() == train_labels.len(),
            "Number of training texts ({}) does not match number of labels ({})",
            train_texts.len(),
            train_labels.len(),
        );
        ensure!(
            valid_texts.len() == valid_labels.len(),
            "Number of validation texts ({}) does not match number of labels ({})",
            valid_texts.len(),
            valid_labels.len(),
        );

        let tokenize_all = |texts: &[String]| -> Result<Vec<Vec<String>>> {
            texts
                .iter()
                .map(|text| tokenizer.apply(text.clone()))
                .collect()
        };
        let train_tokens = tokenize_all(train_texts)?;
        let valid_tokens = tokenize_all(valid_texts)?;

        let vocab = Vocab::build(&train_tokens, max_vocab, min_freq);
        let numericalize = Numericalize::new(Arc::new(vocab.clone()));
        let encode_all = |docs: Vec<Vec<String>>| -> Result<Vec<Vec<i64>>> {
            docs.into_iter().map(|doc| numericalize.apply(doc)).collect()
        };
        let train_documents = encode_all(train_tokens)?;
        let valid_documents = encode_all(valid_tokens)?;

        let classes: Vec<String> = train_labels
            .iter()
            .chain(valid_labels)
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let encode_labels = |labels: &[String]| -> Result<Vec<i64>> {
            labels
                .iter()
                .map(|label| {
                    classes
                        .binary_search(label)
                        .map(|class| class as i64)
                        .map_err(|_| anyhow!("Label '{}' missing from class table", label))
                })
                .collect()
        };
        let encoded_train_labels = encode_labels(train_labels)?;
        let encoded_valid_labels = encode_labels(valid_labels)?;

        Self::from_ids(
            train_documents,
            encoded_train_labels,
            valid_documents,
            encoded_valid_labels,
            vocab,
            classes,
        )
    }

    pub fn dataset(&self, split: Split) -> &TextDataset {
        match split {
            Split::Train => &self.train,
            Split::Valid => &self.valid,
        }
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Labels of a split decoded back to their class strings.
    pub fn label_strings(&self, split: Split) -> Result<Vec<String>> {
        self.dataset(split)
            .labels()
            .iter()
            .map(|&label| {
                self.classes
                    .get(label as usize)
                    .cloned()
                    .ok_or_else(|| {
                        anyhow!("Label {} out of range for {} classes", label, self.classes.len())
                    })
            })
            .collect()
    }

    /// Writes the bundle to `dir/bundle.json`, creating `dir` if needed.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let snapshot = BundleSnapshot {
            vocab: (*self.vocab).clone(),
            classes: self.classes.clone(),
            train_documents: self.train.documents().to_vec(),
            train_labels: self.train.labels().to_vec(),
            valid_documents: self.valid.documents().to_vec(),
            valid_labels: self.valid.labels().to_vec(),
        };
        let path = dir.join("bundle.json");
        let file =
            File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), &snapshot)
            .with_context(|| format!("Failed to serialize bundle to {}", path.display()))?;
        Ok(())
    }

    /// Reads a bundle previously written by [`save`](Self::save). The
    /// loaded bundle passes through the same construction-time validation
    /// as a freshly built one.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join("bundle.json");
        let file =
            File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
        let snapshot: BundleSnapshot = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Invalid bundle snapshot at {}", path.display()))?;

        Self::from_ids(
            snapshot.train_documents,
            snapshot.train_labels,
            snapshot.valid_documents,
            snapshot.valid_labels,
            snapshot.vocab,
            snapshot.classes,
        )
    }

    /// Creates a language-model loader over one split's documents.
    pub fn lm_loader(&self, split: Split, config: LmConfig) -> Result<LanguageModelPreLoader> {
        LanguageModelPreLoader::new(self.dataset(split).documents(), config)
    }

    /// Creates a classifier loader over the training split: sortish index
    /// order for padding-efficient yet varied batches, left padding.
    pub fn classifier_train_loader(
        &self,
        batch_size: usize,
        seed: u64,
    ) -> Result<ClassifierLoader<SortishSampler<impl Fn(usize) -> usize + Send + Sync>>> {
        let lengths = self.train.lengths();
        let sampler =
            SortishSampler::new(self.train.len(), move |i| lengths[i], batch_size, seed)?;
        ClassifierLoader::new(
            self.train.clone(),
            sampler,
            PadCollator::new(self.vocab.pad_id(), PadSide::Left),
            batch_size,
        )
    }

    /// Creates a classifier loader over the validation split: fully sorted
    /// index order for reproducible, minimal-padding batches.
    pub fn classifier_valid_loader(
        &self,
        batch_size: usize,
    ) -> Result<ClassifierLoader<SortSampler<impl Fn(usize) -> usize + Send + Sync>>> {
        let lengths = self.valid.lengths();
        let sampler = SortSampler::new(self.valid.len(), move |i| lengths[i]);
        ClassifierLoader::new(
            self.valid.clone(),
            sampler,
            PadCollator::new(self.vocab.pad_id(), PadSide::Left),
            batch_size,
        )
    }
}

/// ============================================================================
/// Iterates a classification split in sampler order, collating each group
/// of `batch_size` indices into a padded [`MiniBatch`].
///
/// The loader owns only cheap handles: an `Arc`-backed dataset clone and
/// the sampler. A trailing partial batch is yielded, not dropped, so every
/// item appears exactly once per epoch.
#[derive(Debug, Clone)]
pub struct ClassifierLoader<S: Sampler<Item = usize>> {
    dataset: TextDataset,
    sampler: S,
    collator: PadCollator,
    batch_size: usize,
}

impl<S: Sampler<Item = usize>> ClassifierLoader<S> {
    pub fn new(
        dataset: TextDataset,
        sampler: S,
        collator: PadCollator,
        batch_size: usize,
    ) -> Result<Self> {
        ensure!(
            batch_size > 0,
            "batch_size must be > 0, but got batch_size={}",
            batch_size
        );
        ensure!(!dataset.is_empty(), "Cannot iterate an empty dataset");
        Ok(Self {
            dataset,
            sampler,
            collator,
            batch_size,
        })
    }

    /// Number of batches per epoch (the last one may be partial).
    pub fn batches_per_epoch(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Yields the epoch's mini-batches in sampler order.
    pub fn iter(&self, epoch: usize) -> impl Iterator<Item = Result<MiniBatch>> + Send + '_ {
        let mut indices = self.sampler.iter(epoch);
        std::iter::from_fn(move || {
            let batch: Vec<usize> = indices.by_ref().take(self.batch_size).collect();
            if batch.is_empty() {
                None
            } else {
                Some(self.collate_indices(&batch))
            }
        })
    }

    fn collate_indices(&self, batch: &[usize]) -> Result<MiniBatch> {
        let mut sequences = Vec::with_capacity(batch.len());
        let mut labels = Vec::with_capacity(batch.len());
        for &index in batch {
            let out_of_bounds = || {
                anyhow!(
                    "Sampler index {} out of bounds for dataset of size {}",
                    index,
                    self.dataset.len()
                )
            };
            sequences.push(self.dataset.ids(index).ok_or_else(out_of_bounds)?);
            labels.push(self.dataset.label(index).ok_or_else(out_of_bounds)?);
        }
        self.collator.collate(&sequences, &labels)
    }
}
