use ndarray::{Array1, Array2};

/// A `MiniBatch` groups several classification examples for model input.
///
/// - `inputs`: token IDs of shape `[batch_size, seq_len]`, where `seq_len`
///   is the longest sequence in the batch (shorter ones are padded by the
///   collator that built the batch).
/// - `labels`: class labels of shape `[batch_size]`, parallel to the rows
///   of `inputs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiniBatch {
    pub inputs: Array2<i64>,
    pub labels: Array1<i64>,
}

impl MiniBatch {
    /// Number of examples in the batch.
    pub fn batch_size(&self) -> usize {
        self.inputs.nrows()
    }

    /// Padded sequence length shared by every row.
    pub fn seq_len(&self) -> usize {
        self.inputs.ncols()
    }
}
