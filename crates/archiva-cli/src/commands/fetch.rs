//! Fetch command

use archiva_core::{ArchivaConfig, ArtifactReference};

use crate::commands::{open_repository, proxy_handler};
use crate::display;
use crate::error::{CliError, Result};

/// Fetch an artifact or a repository path through the proxy connectors.
///
/// `target` is either a repository path (contains `/`) or artifact
/// coordinates `groupId:artifactId:version[:classifier][:type]`.
pub async fn run(config: &ArchivaConfig, repository: &str, target: &str) -> Result<()> {
    let content = open_repository(config, repository)?;
    let handler = proxy_handler(config);

    if !handler.has_proxies(repository) {
        display::warning(&format!("{} has no proxy connectors", repository));
    }

    let (path, fetched) = if target.contains('/') {
        let fetched = handler.fetch_path_from_proxies(&content, target).await?;
        (target.trim_start_matches('/').to_string(), fetched)
    } else {
        let artifact: ArtifactReference = target.parse()?;
        let fetched = handler.fetch_from_proxies(&content, &artifact).await?;
        (content.to_path(&artifact), fetched)
    };

    match fetched {
        Some(asset) => {
            display::success(&format!("Fetched {}", asset.path()));
            println!("{}", asset.file_path().display());
            Ok(())
        }
        None => {
            let local = content.storage().asset(&path)?;
            if local.exists() {
                display::success(&format!("Using local copy of {}", path));
                println!("{}", local.file_path().display());
                Ok(())
            } else {
                Err(CliError::not_found(repository, path))
            }
        }
    }
}
