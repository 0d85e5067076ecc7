use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommendError>;

#[derive(Error, Debug)]
pub enum RecommendError {
    #[error("Catalog is empty: nothing to recommend from")]
    EmptyCatalog,

    #[error("Title not found in catalog: {0}")]
    TitleNotFound(String),

    #[error("Ambiguous title, catalog contains duplicates: {0}")]
    AmbiguousTitle(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(
        "Similarity index is stale: built against catalog version {built}, current is {current}"
    )]
    StaleIndex { built: u64, current: u64 },

    #[error("Catalog error: {0}")]
    Catalog(String),
}

impl From<csv::Error> for RecommendError {
    fn from(err: csv::Error) -> Self {
        RecommendError::Catalog(err.to_string())
    }
}

impl From<std::io::Error> for RecommendError {
    fn from(err: std::io::Error) -> Self {
        RecommendError::Catalog(err.to_string())
    }
}
