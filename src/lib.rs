pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{RecommendError, Result};
pub use models::{Book, ScoredBook, SimilarBook};
pub use services::{
    content_recommendation, improved_recommendation, simple_recommender, Catalog, IndexCache,
    SimilarityIndex,
};
