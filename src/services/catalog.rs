use crate::{error::Result, models::Book};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::{
    fs::File,
    io::Read,
    path::Path,
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::{info, warn};

// Process-wide generation counter; every constructed catalog gets a fresh
// version so a similarity index can tell which snapshot it was built from.
static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

/// An ordered, immutable snapshot of the book catalog.
///
/// Row position is the index the similarity matrix is keyed by, so the
/// catalog is never mutated in place; reloading produces a new `Catalog`
/// with a new version stamp.
#[derive(Debug, Clone)]
pub struct Catalog {
    books: Vec<Book>,
    version: u64,
}

#[derive(Debug, Deserialize)]
struct BookCsvRecord {
    book_id: Option<i64>,
    #[serde(alias = "Title")]
    title: Option<String>,
    #[serde(alias = "Authors", alias = "Author")]
    authors: Option<String>,
    #[serde(alias = "Genres", alias = "categories")]
    genres: Option<String>,
    #[serde(alias = "Description")]
    description: Option<String>,
    #[serde(alias = "rating")]
    average_rating: Option<String>,
    ratings_count: Option<String>,
}

/// Validate and clean one CSV record; rows without a usable title cannot
/// be looked up later and are skipped.
fn validate_record(record: BookCsvRecord, row: usize) -> Option<Book> {
    let title = record.title?.trim().to_string();
    if title.is_empty() {
        return None;
    }

    Some(Book {
        book_id: record.book_id.unwrap_or(row as i64),
        title,
        authors: record.authors.map(|s| s.trim().to_string()),
        genres: record.genres.map(|s| s.trim().to_string()),
        description: record.description,
        average_rating: record
            .average_rating
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0.0),
        ratings_count: record
            .ratings_count
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0),
    })
}

impl Catalog {
    /// Wrap an already-loaded set of books into a versioned snapshot.
    pub fn from_books(books: Vec<Book>) -> Self {
        Self {
            books,
            version: NEXT_VERSION.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Load a catalog from a headered CSV file.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let catalog = Self::from_csv_reader(file)?;
        info!(
            "Loaded {} books from {}",
            catalog.len(),
            path.as_ref().display()
        );
        Ok(catalog)
    }

    /// Load a catalog from any CSV source. Records missing a title are
    /// skipped with a warning rather than failing the whole load.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);

        let mut books = Vec::new();
        let mut skipped = 0usize;

        for (row, result) in rdr.deserialize::<BookCsvRecord>().enumerate() {
            let record = result?;
            match validate_record(record, row) {
                Some(book) => books.push(book),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!("Skipped {} catalog records without a title", skipped);
        }

        Ok(Self::from_books(books))
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Generation stamp used to detect stale similarity indexes.
    pub fn version(&self) -> u64 {
        self.version
    }
}
