pub mod clustering;
pub mod em;
pub mod error;
pub mod likelihood;
pub mod moments;
pub mod simulate;
pub mod svd;
mod utils;

pub use clustering::Clusters;
pub use clustering::NaiveBayesClustering;
pub use clustering::NaiveBayesClusteringBuilder;
pub use em::Em;
pub use em::EmBuilder;
pub use em::EmFit;
pub use em::EmStrategy;
pub use error::FitError;
pub use moments::MomentEstimate;
