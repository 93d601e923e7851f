use crate::commands::Out;
use crate::{Config, Result};
use std::path::Path;

/// Creates the data directory, its secrets subdirectory and an initial `config.json` that points
/// at `api_url`.
///
/// # Arguments
/// - `expenses_home` - The directory that will be the root of data directory, e.g.
///   `$HOME/expenses`
/// - `api_url` - The base URL of the expense API, e.g. `http://localhost:5000/api`
///
/// # Errors
/// - Returns an error if `api_url` is not an http(s) URL.
/// - Returns an error if any file operations fail.
pub async fn init(expenses_home: &Path, api_url: &str) -> Result<Out<()>> {
    let config = Config::create(expenses_home, api_url).await?;
    Ok(format!(
        "Successfully created the expenses directory at {}",
        config.root().display()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_loadable_config() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("expenses");
        let out = init(&home, "http://localhost:5000/api").await.unwrap();
        assert!(out.message().contains("Successfully created"));
        let config = Config::load(&home).await.unwrap();
        assert_eq!(config.api_url().as_str(), "http://localhost:5000/api");
    }

    #[tokio::test]
    async fn test_init_bad_url() {
        let dir = TempDir::new().unwrap();
        let err = init(dir.path(), "localhost").await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }
}
