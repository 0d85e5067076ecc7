use anyhow::Result;
use book_recommender::{
    content_recommendation, improved_recommendation, simple_recommender, Catalog, Config,
    SimilarityIndex,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_rows<T: serde::Serialize>(label: &str, rows: &[T]) -> Result<()> {
    println!("{}", label);
    for row in rows {
        println!("{}", serde_json::to_string(row)?);
    }
    Ok(())
}

fn main() -> Result<()> {
    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "book_recommender=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Loading configuration...");
    let config = Config::load()?;

    let catalog = Catalog::from_csv_path(&config.catalog_path)?;

    let top = simple_recommender(&catalog, config.top_n)?;
    print_rows("Top rated (popularity-weighted):", &top)?;

    // An optional focal title drives the content-based recommenders.
    if let Some(title) = std::env::args().nth(1) {
        info!("Building similarity index for focal title '{}'", title);
        let index = SimilarityIndex::build(&catalog)?;

        let similar = content_recommendation(&catalog, &index, &title, config.top_n)?;
        print_rows("Most similar by content:", &similar)?;

        let improved = improved_recommendation(&catalog, &index, &title, config.top_n)?;
        print_rows("Similar, popular and well rated:", &improved)?;
    }

    Ok(())
}
