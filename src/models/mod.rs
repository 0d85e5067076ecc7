// Re-export types from book.rs
pub use book::{Book, ScoredBook, SimilarBook};

mod book;
