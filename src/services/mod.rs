pub mod catalog;
pub mod recommendation;
pub mod similarity;
mod stop_words;

// Re-export public types
pub use catalog::Catalog;
pub use recommendation::{content_recommendation, improved_recommendation, simple_recommender};
pub use similarity::{IndexCache, SimilarityIndex};
