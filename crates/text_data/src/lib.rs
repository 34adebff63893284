pub mod bundle;
pub mod collator;
pub mod dataset;
pub mod minibatch;
pub mod preloader;
pub mod sampler;
pub mod transforms;
pub mod vocab;

pub use bundle::{ClassifierLoader, Split, TextBundle};
pub use collator::{PadCollator, PadSide};
pub use dataset::TextDataset;
pub use minibatch::MiniBatch;
pub use preloader::{LanguageModelPreLoader, LmConfig};
pub use sampler::{Sampler, SortSampler, SortishSampler};
pub use vocab::Vocab;
