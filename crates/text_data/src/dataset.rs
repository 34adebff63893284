use anyhow::{ensure, Result};
use std::sync::Arc;

/// An immutable, in-memory dataset of tokenized documents with labels.
///
/// Each item is a sequence of integer token IDs plus an integer class label.
/// Documents and labels live behind `Arc<[..]>`, which enables:
/// - Zero-copy clone: cloning only bumps the `Arc` counters
/// - Thread-safe sharing: safe concurrent read access (`Send + Sync`)
///
/// Samplers and loaders hold clones of the dataset and index into it; the
/// token storage itself is never mutated after construction.
#[derive(Debug, Clone)]
pub struct TextDataset {
    documents: Arc<[Vec<i64>]>,
    labels: Arc<[i64]>,
}

impl TextDataset {
    /// Creates a dataset from parallel document/label vectors.
    ///
    /// Fails when the two lengths differ; the mismatch is reported at
    /// construction time rather than surfacing mid-epoch.
    pub fn new(documents: Vec<Vec<i64>>, labels: Vec<i64>) -> Result<Self> {
        ensure!(
            documents.len() == labels.len(),
            "Number of documents ({}) does not match number of labels ({})",
            documents.len(),
            labels.len(),
        );
        Ok(Self {
            documents: documents.into(),
            labels: labels.into(),
        })
    }

    /// Total number of items.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Token IDs of the document at `index`.
    pub fn ids(&self, index: usize) -> Option<&[i64]> {
        self.documents.get(index).map(Vec::as_slice)
    }

    /// Label of the item at `index`.
    pub fn label(&self, index: usize) -> Option<i64> {
        self.labels.get(index).copied()
    }

    /// Token count of the document at `index` — the sampler's length key.
    /// Out-of-range indices count as zero.
    pub fn length(&self, index: usize) -> usize {
        self.documents.get(index).map_or(0, Vec::len)
    }

    /// Token counts for every document, in dataset order.
    pub fn lengths(&self) -> Vec<usize> {
        self.documents.iter().map(Vec::len).collect()
    }

    /// All labels, in dataset order.
    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    /// Shares the ordered document storage (cheap `Arc` clone) for
    /// consumers that linearize the corpus, such as language-model loaders.
    pub fn documents(&self) -> Arc<[Vec<i64>]> {
        self.documents.clone()
    }
}

#[cfg(test)]
mod text_dataset_tests {
    use super::*;

    fn sample_dataset() -> TextDataset {
        TextDataset::new(vec![vec![2, 8, 9], vec![2, 10]], vec![0, 1]).unwrap()
    }

    #[test]
    fn test_creation_and_access() {
        let dataset = sample_dataset();

        assert_eq!(dataset.len(), 2);
        assert!(!dataset.is_empty());
        assert_eq!(dataset.ids(0), Some(&[2i64, 8, 9][..]));
        assert_eq!(dataset.label(1), Some(1));
        assert!(dataset.ids(2).is_none());
    }

    #[test]
    fn test_rejects_mismatched_labels() {
        let result = TextDataset::new(vec![vec![1], vec![2]], vec![0]);
        assert!(result.is_err());
    }

    #[test]
    fn test_lengths_are_token_counts() {
        let dataset = sample_dataset();
        assert_eq!(dataset.lengths(), vec![3, 2]);
        assert_eq!(dataset.length(0), 3);
        assert_eq!(dataset.length(99), 0);
    }

    #[test]
    fn test_concurrent_reads() {
        let dataset = Arc::new(
            TextDataset::new((0..100).map(|i| vec![i]).collect(), (0..100).collect()).unwrap(),
        );

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let dataset = dataset.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        assert_eq!(dataset.ids(i).unwrap(), &[i as i64]);
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }
    }
}
