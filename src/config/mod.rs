use anyhow::Result;
use dotenv::dotenv;
use std::{env, path::PathBuf};

/// Settings for the demo binary; the library itself takes everything as
/// explicit arguments.
#[derive(Debug, Clone)]
pub struct Config {
    pub catalog_path: PathBuf,
    pub top_n: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        Ok(Config {
            catalog_path: env::var("CATALOG_PATH")
                .unwrap_or_else(|_| "data/books_cleaned.csv".to_string())
                .into(),
            top_n: env::var("TOP_N")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
        })
    }
}
