//! Metadata command

use archiva_core::{ArchivaConfig, RepositoryMetadata};

use crate::commands::{open_repository, proxy_handler};
use crate::display;
use crate::error::{CliError, Result};

/// Fetch `maven-metadata.xml` from every remote and show the merged result
pub async fn run(config: &ArchivaConfig, repository: &str, path: &str) -> Result<()> {
    let content = open_repository(config, repository)?;
    let handler = proxy_handler(config);

    let path = if path.ends_with("maven-metadata.xml") {
        path.to_string()
    } else {
        format!("{}/maven-metadata.xml", path.trim_end_matches('/'))
    };

    let result = handler.fetch_metadata_from_proxies(&content, &path).await?;
    let Some(asset) = result.asset else {
        return Err(CliError::not_found(repository, path));
    };

    if result.modified {
        display::success(&format!("Updated {}", asset.path()));
    } else {
        display::success(&format!("{} is up to date", asset.path()));
    }
    display::print_metadata(&RepositoryMetadata::read(asset.file_path())?);
    Ok(())
}
