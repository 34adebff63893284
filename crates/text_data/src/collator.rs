use crate::minibatch::MiniBatch;
use anyhow::{ensure, Result};
use ndarray::{s, Array1, Array2, ArrayView1};

/// Which side of a short sequence receives the padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadSide {
    /// Tokens are right-aligned; recurrent classifiers read padding first
    /// and real content last.
    Left,
    /// Tokens are left-aligned.
    Right,
}

/// Pads a group of variable-length token-ID sequences to the in-batch
/// maximum length and stacks them, with their labels, into a [`MiniBatch`].
///
/// # Example
/// ```ignore
/// let collator = PadCollator::new(vocab.pad_id(), PadSide::Left);
/// let batch = collator.collate(&[&[5, 6, 7], &[8]], &[0, 1])?;
/// assert_eq!(batch.inputs.row(1).to_vec(), vec![pad, pad, 8]);
/// ```
#[derive(Debug, Clone)]
pub struct PadCollator {
    pad_id: i64,
    side: PadSide,
}

impl PadCollator {
    pub fn new(pad_id: i64, side: PadSide) -> Self {
        Self { pad_id, side }
    }

    /// Collates one batch. Fails on an empty batch, a sequence/label count
    /// mismatch, or a batch in which every sequence is empty.
    pub fn collate(&self, sequences: &[&[i64]], labels: &[i64]) -> Result<MiniBatch> {
        ensure!(!sequences.is_empty(), "Cannot collate an empty batch");
        ensure!(
            sequences.len() == labels.len(),
            "Number of sequences ({}) does not match number of labels ({})",
            sequences.len(),
            labels.len(),
        );

        let max_len = sequences
            .iter()
            .map(|ids| ids.len())
            .max()
            .expect("batch is non-empty");
        ensure!(max_len > 0, "Every sequence in the batch is empty");

        let mut inputs = Array2::from_elem((sequences.len(), max_len), self.pad_id);
        for (row, ids) in sequences.iter().enumerate() {
            let offset = match self.side {
                PadSide::Left => max_len - ids.len(),
                PadSide::Right => 0,
            };
            inputs
                .slice_mut(s![row, offset..offset + ids.len()])
                .assign(&ArrayView1::from(*ids));
        }

        Ok(MiniBatch {
            inputs,
            labels: Array1::from_vec(labels.to_vec()),
        })
    }
}

#[cfg(test)]
mod pad_collator_tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_left_padding_right_aligns_tokens() {
        let collator = PadCollator::new(1, PadSide::Left);
        let batch = collator.collate(&[&[5, 6, 7], &[8]], &[0, 1]).unwrap();

        assert_eq!(batch.inputs, array![[5, 6, 7], [1, 1, 8]]);
        assert_eq!(batch.labels, array![0, 1]);
    }

    #[test]
    fn test_right_padding_left_aligns_tokens() {
        let collator = PadCollator::new(1, PadSide::Right);
        let batch = collator.collate(&[&[5, 6, 7], &[8]], &[0, 1]).unwrap();

        assert_eq!(batch.inputs, array![[5, 6, 7], [8, 1, 1]]);
    }

    #[test]
    fn test_equal_lengths_need_no_padding() {
        let collator = PadCollator::new(1, PadSide::Left);
        let batch = collator.collate(&[&[2, 3], &[4, 5]], &[1, 0]).unwrap();

        assert_eq!(batch.inputs, array![[2, 3], [4, 5]]);
        assert_eq!(batch.seq_len(), 2);
    }

    #[test]
    fn test_rejects_degenerate_batches() {
        let collator = PadCollator::new(1, PadSide::Left);

        assert!(collator.collate(&[], &[]).is_err());
        assert!(collator.collate(&[&[1]], &[0, 1]).is_err());
        assert!(collator.collate(&[&[], &[]], &[0, 1]).is_err());
    }
}
