use thiserror::Error;

/// Failures of the clustering pipeline, split by the stage that raised
/// them: shape validation, the moment initializer, or the EM refiner.
///
/// EM running out of iterations is not an error; `EmFit::converged`
/// reports it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FitError {
    #[error("dataset has no samples or no features")]
    EmptyDataset,

    #[error("number of clusters must be at least 1")]
    ZeroClusters,

    #[error("requested {k} clusters but the dataset has only {features} features")]
    TooManyClusters { k: usize, features: usize },

    #[error("feature dimension mismatch: expected {expected}, found {found}")]
    FeatureMismatch { expected: usize, found: usize },

    #[error("cluster dimension mismatch: expected {expected}, found {found}")]
    ClusterMismatch { expected: usize, found: usize },

    #[error("moment initialization failed: second-moment matrix has rank {rank}, need at least {k}")]
    RankDeficient { k: usize, rank: usize },

    #[error("moment initialization failed: no feature slice has a positive spectral gap")]
    NoSpectralGap,

    #[error("singular value decomposition did not converge")]
    SvdDidNotConverge,

    #[error("least-squares solve for mixing weights failed: {0}")]
    WeightSolveFailed(&'static str),

    #[error("mixing weights must be nonnegative with a positive sum")]
    InvalidWeights,
}
