use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

fn deserialize_f32_from_string<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f32),
    }

    match StringOrFloat::deserialize(deserializer)? {
        StringOrFloat::String(s) => {
            if s.is_empty() {
                Ok(0.0)
            } else {
                f32::from_str(&s).map_err(serde::de::Error::custom)
            }
        }
        StringOrFloat::Float(f) => Ok(f),
    }
}

fn deserialize_u64_from_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInt {
        String(String),
        Int(u64),
        Null,
    }

    match StringOrInt::deserialize(deserializer)? {
        StringOrInt::String(s) => {
            if s.is_empty() {
                Ok(0)
            } else {
                u64::from_str(&s).map_err(serde::de::Error::custom)
            }
        }
        StringOrInt::Int(i) => Ok(i),
        StringOrInt::Null => Ok(0),
    }
}

/// One row of the catalog. `title` doubles as the lookup key for
/// content-based recommendations and must be unique within a catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub book_id: i64,
    pub title: String,
    pub authors: Option<String>,
    pub genres: Option<String>,
    pub description: Option<String>,
    #[serde(
        alias = "rating",
        default,
        deserialize_with = "deserialize_f32_from_string"
    )]
    pub average_rating: f32,
    #[serde(
        alias = "ratingsCount",
        default,
        deserialize_with = "deserialize_u64_from_string"
    )]
    pub ratings_count: u64,
}

/// Output row of the simple (popularity-weighted) recommender.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredBook {
    pub book_id: i64,
    pub title: String,
    pub authors: Option<String>,
    pub score: f64,
}

/// Output row of the content-based recommenders.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarBook {
    pub book_id: i64,
    pub title: String,
    pub authors: Option<String>,
    pub average_rating: f32,
    pub ratings_count: u64,
}

impl SimilarBook {
    pub(crate) fn from_book(book: &Book) -> Self {
        Self {
            book_id: book.book_id,
            title: book.title.clone(),
            authors: book.authors.clone(),
            average_rating: book.average_rating,
            ratings_count: book.ratings_count,
        }
    }
}
