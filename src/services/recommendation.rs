use crate::{
    error::{RecommendError, Result},
    models::{ScoredBook, SimilarBook},
    services::{catalog::Catalog, similarity::SimilarityIndex},
};
use tracing::debug;

/// How many nearest-by-content candidates the improved recommender
/// re-ranks before applying its popularity filter.
const CANDIDATE_POOL_SIZE: usize = 25;

// Popularity thresholds. The corpus-wide one is deliberately stricter than
// the pool-local one: the pool has already been curated by similarity.
const CORPUS_COUNT_QUANTILE: f64 = 0.95;
const POOL_COUNT_QUANTILE: f64 = 0.75;

// Linear-interpolation quantile over an ascending-sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

fn median(sorted: &[f64]) -> f64 {
    quantile(sorted, 0.5)
}

fn sorted_values<F: Fn(usize) -> f64>(len: usize, get: F) -> Vec<f64> {
    let mut values: Vec<f64> = (0..len).map(get).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    values
}

// Bayesian-style blend of a book's own rating with a baseline, weighted
// by how many ratings it has relative to the popularity threshold `m`.
fn weighted_rating(v: f64, m: f64, r: f64, c: f64) -> f64 {
    if v + m == 0.0 {
        return c;
    }
    (v / (v + m)) * r + (m / (m + v)) * c
}

fn ensure_positive_n(n: usize) -> Result<()> {
    if n == 0 {
        return Err(RecommendError::InvalidParameter(
            "n must be positive".to_string(),
        ));
    }
    Ok(())
}

// Stable descending sort of indices by score; ties keep input order.
fn rank_descending(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}

/// Popularity-weighted rating over the whole catalog. No personalization;
/// the same catalog and `n` always produce the same ranking.
pub fn simple_recommender(catalog: &Catalog, n: usize) -> Result<Vec<ScoredBook>> {
    ensure_positive_n(n)?;
    if catalog.is_empty() {
        return Err(RecommendError::EmptyCatalog);
    }

    let books = catalog.books();
    let counts = sorted_values(books.len(), |i| books[i].ratings_count as f64);
    let ratings = sorted_values(books.len(), |i| f64::from(books[i].average_rating));

    let m = quantile(&counts, CORPUS_COUNT_QUANTILE);
    let c = median(&ratings);
    debug!("Simple recommender thresholds: m={:.2}, C={:.4}", m, c);

    let scores: Vec<f64> = books
        .iter()
        .map(|book| {
            weighted_rating(
                book.ratings_count as f64,
                m,
                f64::from(book.average_rating),
                c,
            )
        })
        .collect();

    Ok(rank_descending(&scores)
        .into_iter()
        .take(n)
        .map(|i| ScoredBook {
            book_id: books[i].book_id,
            title: books[i].title.clone(),
            authors: books[i].authors.clone(),
            score: scores[i],
        })
        .collect())
}

// Rows of the focal book's similarity ranking, most similar first, focal
// row excluded. Ties keep catalog order.
fn similarity_ranking(
    catalog: &Catalog,
    index: &SimilarityIndex,
    title: &str,
) -> Result<Vec<usize>> {
    index.ensure_matches(catalog)?;
    let focal = index.resolve_title(title)?;
    let row = index.similarity_row(focal);

    let mut others: Vec<usize> = (0..catalog.len()).filter(|&i| i != focal).collect();
    others.sort_by(|&a, &b| {
        row[b]
            .partial_cmp(&row[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(others)
}

/// Top `n` books most similar to the focal title by content. The focal
/// book itself is never returned; fewer than `n` matches is not an error.
pub fn content_recommendation(
    catalog: &Catalog,
    index: &SimilarityIndex,
    title: &str,
    n: usize,
) -> Result<Vec<SimilarBook>> {
    ensure_positive_n(n)?;
    let ranking = similarity_ranking(catalog, index, title)?;

    Ok(ranking
        .into_iter()
        .take(n)
        .map(|i| SimilarBook::from_book(&catalog.books()[i]))
        .collect())
}

/// Content similarity candidates re-ranked by a pool-local weighted rating
/// and filtered to the popular quartile. May return fewer than `n` rows;
/// the filter is expected to thin the pool.
pub fn improved_recommendation(
    catalog: &Catalog,
    index: &SimilarityIndex,
    title: &str,
    n: usize,
) -> Result<Vec<SimilarBook>> {
    ensure_positive_n(n)?;
    let pool: Vec<usize> = similarity_ranking(catalog, index, title)?
        .into_iter()
        .take(CANDIDATE_POOL_SIZE)
        .collect();

    if pool.is_empty() {
        return Ok(Vec::new());
    }

    let books = catalog.books();
    let counts = sorted_values(pool.len(), |i| books[pool[i]].ratings_count as f64);
    let ratings = sorted_values(pool.len(), |i| f64::from(books[pool[i]].average_rating));

    let m = quantile(&counts, POOL_COUNT_QUANTILE);
    let c = median(&ratings);
    debug!(
        "Improved recommender pool of {}: m75={:.2}, C={:.4}",
        pool.len(),
        m,
        c
    );

    let qualified: Vec<usize> = pool
        .into_iter()
        .filter(|&i| books[i].ratings_count as f64 >= m)
        .collect();

    let scores: Vec<f64> = qualified
        .iter()
        .map(|&i| {
            weighted_rating(
                books[i].ratings_count as f64,
                m,
                f64::from(books[i].average_rating),
                c,
            )
        })
        .collect();

    Ok(rank_descending(&scores)
        .into_iter()
        .take(n)
        .map(|pos| SimilarBook::from_book(&books[qualified[pos]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Book;

    // Disjoint contents give an identity similarity matrix: each book is
    // maximally similar only to itself.
    fn create_test_book(id: i64, title: &str, rating: f32, count: u64) -> Book {
        Book {
            book_id: id,
            title: title.to_string(),
            authors: Some(format!("Author{}", id)),
            genres: None,
            description: Some(format!("Content{}", id)),
            average_rating: rating,
            ratings_count: count,
        }
    }

    fn three_book_catalog() -> Catalog {
        Catalog::from_books(vec![
            create_test_book(1, "Book1", 4.5, 10_000),
            create_test_book(2, "Book2", 4.0, 5_000),
            create_test_book(3, "Book3", 3.5, 2_000),
        ])
    }

    #[test]
    fn test_quantile_interpolates_linearly() {
        let values = [2000.0, 5000.0, 10000.0];
        assert!((quantile(&values, 0.95) - 9500.0).abs() < 1e-9);
        assert!((quantile(&values, 0.5) - 5000.0).abs() < 1e-9);
        assert!((quantile(&[2000.0, 5000.0], 0.75) - 4250.0).abs() < 1e-9);
        assert!((quantile(&[7.0], 0.95) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_simple_recommender_ranks_popular_high_rated_first() {
        let catalog = three_book_catalog();
        let result = simple_recommender(&catalog, 2).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].title, "Book1");
        assert!(result[0].score >= result[1].score);
    }

    #[test]
    fn test_simple_recommender_returns_valid_subset() {
        let catalog = three_book_catalog();
        let result = simple_recommender(&catalog, 10).unwrap();

        // n beyond catalog size returns the whole catalog, still sorted.
        assert_eq!(result.len(), 3);
        for pair in result.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for rec in &result {
            assert!(catalog.books().iter().any(|b| b.book_id == rec.book_id));
        }
    }

    #[test]
    fn test_simple_recommender_rejects_zero_n_and_empty_catalog() {
        let catalog = three_book_catalog();
        assert!(matches!(
            simple_recommender(&catalog, 0),
            Err(RecommendError::InvalidParameter(_))
        ));
        assert!(matches!(
            simple_recommender(&Catalog::from_books(vec![]), 5),
            Err(RecommendError::EmptyCatalog)
        ));
    }

    #[test]
    fn test_singleton_catalog_scores_its_own_rating() {
        let catalog = Catalog::from_books(vec![create_test_book(1, "Only", 4.2, 100)]);
        let result = simple_recommender(&catalog, 1).unwrap();
        assert_eq!(result.len(), 1);
        // With one book, m and C degenerate to its own count and rating.
        assert!((result[0].score - 4.2).abs() < 1e-6);
    }

    #[test]
    fn test_content_recommendation_excludes_focal_title() {
        let catalog = three_book_catalog();
        let index = SimilarityIndex::build(&catalog).unwrap();
        let result = content_recommendation(&catalog, &index, "Book1", 2).unwrap();

        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|b| b.title != "Book1"));
        // Identity matrix: ties broken by catalog order.
        assert_eq!(result[0].title, "Book2");
        assert_eq!(result[1].title, "Book3");
    }

    #[test]
    fn test_content_recommendation_handles_short_catalogs() {
        let catalog = three_book_catalog();
        let index = SimilarityIndex::build(&catalog).unwrap();
        let result = content_recommendation(&catalog, &index, "Book1", 10).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_content_recommendation_unknown_title() {
        let catalog = three_book_catalog();
        let index = SimilarityIndex::build(&catalog).unwrap();
        assert!(matches!(
            content_recommendation(&catalog, &index, "Book9", 2),
            Err(RecommendError::TitleNotFound(_))
        ));
    }

    #[test]
    fn test_content_recommendation_rejects_stale_index() {
        let catalog = three_book_catalog();
        let index = SimilarityIndex::build(&catalog).unwrap();
        let reloaded = three_book_catalog();
        assert!(matches!(
            content_recommendation(&reloaded, &index, "Book1", 2),
            Err(RecommendError::StaleIndex { .. })
        ));
    }

    #[test]
    fn test_improved_recommendation_filters_by_pool_quartile() {
        let catalog = three_book_catalog();
        let index = SimilarityIndex::build(&catalog).unwrap();
        let result = improved_recommendation(&catalog, &index, "Book1", 2).unwrap();

        // Pool is Book2 (5000) and Book3 (2000); the 75th-percentile
        // threshold of 4250 leaves only Book2.
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].title, "Book2");
    }

    #[test]
    fn test_improved_results_come_from_similarity_candidates() {
        let books: Vec<Book> = (1..=40)
            .map(|i| {
                create_test_book(
                    i,
                    &format!("Book{}", i),
                    3.0 + (i % 5) as f32 * 0.3,
                    (i as u64) * 500,
                )
            })
            .collect();
        let catalog = Catalog::from_books(books);
        let index = SimilarityIndex::build(&catalog).unwrap();

        let candidates =
            content_recommendation(&catalog, &index, "Book1", CANDIDATE_POOL_SIZE).unwrap();
        let improved = improved_recommendation(&catalog, &index, "Book1", 10).unwrap();

        assert!(improved.len() <= 10);
        for rec in &improved {
            assert!(candidates.iter().any(|c| c.book_id == rec.book_id));
        }
    }

    #[test]
    fn test_recommenders_are_deterministic() {
        let catalog = three_book_catalog();
        let index = SimilarityIndex::build(&catalog).unwrap();

        let a = simple_recommender(&catalog, 3).unwrap();
        let b = simple_recommender(&catalog, 3).unwrap();
        let ids = |rows: &[ScoredBook]| rows.iter().map(|r| r.book_id).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));

        let c = improved_recommendation(&catalog, &index, "Book2", 2).unwrap();
        let d = improved_recommendation(&catalog, &index, "Book2", 2).unwrap();
        assert_eq!(
            c.iter().map(|r| r.book_id).collect::<Vec<_>>(),
            d.iter().map(|r| r.book_id).collect::<Vec<_>>()
        );
    }
}
