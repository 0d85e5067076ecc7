use crate::{
    error::{RecommendError, Result},
    models::Book,
    services::{catalog::Catalog, stop_words},
};
use ndarray::{Array2, ArrayView1};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info};

/// Precomputed pairwise text similarity for one catalog snapshot.
///
/// Holds the full N×N cosine similarity matrix over TF-IDF vectors of each
/// book's content blob, plus the title → row lookup. Building it is the
/// dominant cost of the whole system (O(N²) in catalog size), so the result
/// is meant to be built once per snapshot and shared; see [`IndexCache`].
#[derive(Debug)]
pub struct SimilarityIndex {
    matrix: Array2<f32>,
    title_to_row: HashMap<String, usize>,
    catalog_version: u64,
}

/// Concatenated text fields a book is vectorized by. Missing fields
/// contribute an empty string; field order matches the ranking the
/// catalog exports use (authors, title, genres, description).
pub fn content_blob(book: &Book) -> String {
    [
        book.authors.as_deref().unwrap_or(""),
        &book.title,
        book.genres.as_deref().unwrap_or(""),
        book.description.as_deref().unwrap_or(""),
    ]
    .join(" ")
}

// Word tokens: lowercased alphanumeric runs of length >= 2, stop words
// removed. Matches the usual bag-of-words token pattern.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2 && !stop_words::is_stop_word(t))
        .map(str::to_string)
        .collect()
}

// Unigrams plus bigrams over the filtered token stream.
fn terms(tokens: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(tokens.len().saturating_mul(2));
    out.extend(tokens.iter().cloned());
    for pair in tokens.windows(2) {
        out.push(format!("{} {}", pair[0], pair[1]));
    }
    out
}

// L2-normalized TF-IDF vectors, one sparse (column, weight) list per
// document, columns sorted ascending so dot products can merge.
fn tfidf_vectors(documents: &[String]) -> Vec<Vec<(usize, f32)>> {
    let n_docs = documents.len();

    let mut vocabulary: HashMap<String, usize> = HashMap::new();
    let mut doc_terms: Vec<HashMap<usize, f32>> = Vec::with_capacity(n_docs);
    let mut doc_freq: Vec<u32> = Vec::new();

    for doc in documents {
        let tokens = tokenize(doc);
        let mut counts: HashMap<usize, f32> = HashMap::new();

        for term in terms(&tokens) {
            let next_col = vocabulary.len();
            let col = *vocabulary.entry(term).or_insert(next_col);
            if col == doc_freq.len() {
                doc_freq.push(0);
            }
            *counts.entry(col).or_insert(0.0) += 1.0;
        }

        for &col in counts.keys() {
            doc_freq[col] += 1;
        }
        doc_terms.push(counts);
    }

    debug!(
        "Vectorized {} documents into {} terms",
        n_docs,
        vocabulary.len()
    );

    // Smoothed idf: ln((1 + N) / (1 + df)) + 1, never zero or negative.
    let idf: Vec<f32> = doc_freq
        .iter()
        .map(|&df| ((1.0 + n_docs as f32) / (1.0 + df as f32)).ln() + 1.0)
        .collect();

    doc_terms
        .into_iter()
        .map(|counts| {
            let mut vector: Vec<(usize, f32)> = counts
                .into_iter()
                .map(|(col, tf)| (col, tf * idf[col]))
                .collect();
            vector.sort_by_key(|&(col, _)| col);

            let norm = vector.iter().map(|&(_, w)| w * w).sum::<f32>().sqrt();
            if norm > 0.0 {
                for (_, w) in &mut vector {
                    *w /= norm;
                }
            }
            vector
        })
        .collect()
}

// Dot product of two sorted sparse vectors. Both are unit length, so this
// is cosine similarity; zero vectors score 0 against everything.
fn sparse_dot(a: &[(usize, f32)], b: &[(usize, f32)]) -> f32 {
    let (mut i, mut j) = (0, 0);
    let mut sum = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

impl SimilarityIndex {
    /// Build the similarity index for one catalog snapshot.
    pub fn build(catalog: &Catalog) -> Result<Self> {
        if catalog.is_empty() {
            return Err(RecommendError::EmptyCatalog);
        }

        let n = catalog.len();
        let mut title_to_row = HashMap::with_capacity(n);
        for (row, book) in catalog.books().iter().enumerate() {
            if title_to_row.insert(book.title.clone(), row).is_some() {
                return Err(RecommendError::AmbiguousTitle(book.title.clone()));
            }
        }

        let documents: Vec<String> = catalog.books().iter().map(content_blob).collect();
        let vectors = tfidf_vectors(&documents);

        let mut matrix = Array2::<f32>::zeros((n, n));
        for i in 0..n {
            for j in i..n {
                let sim = sparse_dot(&vectors[i], &vectors[j]);
                matrix[[i, j]] = sim;
                matrix[[j, i]] = sim;
            }
        }

        info!("Built similarity index for {} books", n);

        Ok(Self {
            matrix,
            title_to_row,
            catalog_version: catalog.version(),
        })
    }

    /// Resolve a focal title to its catalog row.
    pub fn resolve_title(&self, title: &str) -> Result<usize> {
        self.title_to_row
            .get(title)
            .copied()
            .ok_or_else(|| RecommendError::TitleNotFound(title.to_string()))
    }

    /// Similarity of every book against the book at `row`.
    pub fn similarity_row(&self, row: usize) -> ArrayView1<'_, f32> {
        self.matrix.row(row)
    }

    /// Number of books the index was built over.
    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.nrows() == 0
    }

    pub fn catalog_version(&self) -> u64 {
        self.catalog_version
    }

    /// Refuse to serve a catalog other than the one this index was built
    /// from; row positions are only meaningful for that snapshot.
    pub fn ensure_matches(&self, catalog: &Catalog) -> Result<()> {
        if self.catalog_version != catalog.version() {
            return Err(RecommendError::StaleIndex {
                built: self.catalog_version,
                current: catalog.version(),
            });
        }
        Ok(())
    }
}

/// Caller-owned cache for the similarity index, keyed by catalog version.
///
/// Rebuilding produces a fresh `Arc` snapshot, so readers holding the old
/// index are undisturbed when the catalog is reloaded.
#[derive(Debug, Default)]
pub struct IndexCache {
    cached: Option<Arc<SimilarityIndex>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached index for this catalog snapshot, building it on
    /// first use or after the catalog version changed.
    pub fn get_or_build(&mut self, catalog: &Catalog) -> Result<Arc<SimilarityIndex>> {
        if let Some(index) = &self.cached {
            if index.catalog_version() == catalog.version() {
                debug!("Similarity index cache hit for version {}", catalog.version());
                return Ok(Arc::clone(index));
            }
        }

        info!(
            "Similarity index cache miss, rebuilding for version {}",
            catalog.version()
        );
        let index = Arc::new(SimilarityIndex::build(catalog)?);
        self.cached = Some(Arc::clone(&index));
        Ok(index)
    }
}
