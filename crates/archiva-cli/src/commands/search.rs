//! Search command

use std::sync::Arc;

use archiva_core::ArchivaConfig;
use archiva_indexer::IndexEngine;

use crate::commands::{open_indexing_contexts, remote_index_downloader};
use crate::display;
use crate::error::Result;

/// Search the local indexes, optionally limited to one repository
pub fn run(
    config: &ArchivaConfig,
    query: &str,
    repository: Option<&str>,
    json_output: bool,
) -> Result<()> {
    let engine = Arc::new(IndexEngine::new());
    let downloader = remote_index_downloader(config, &engine);
    open_indexing_contexts(config, &engine, &downloader)?;

    let mut ids = engine.context_ids();
    ids.sort();
    let mut results = Vec::new();
    for id in ids.iter().filter(|id| repository.is_none_or(|r| r == id.as_str())) {
        if let Some(context) = engine.indexing_context(id) {
            results.extend(context.search(query)?);
        }
    }

    if json_output {
        let json = serde_json::to_string_pretty(
            &results
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "groupId": r.group_id,
                        "artifactId": r.artifact_id,
                        "version": r.version,
                        "classifier": r.classifier,
                        "extension": r.extension,
                        "repository": r.repository_id,
                        "sha1": r.sha1,
                        "size": r.size,
                    })
                })
                .collect::<Vec<_>>(),
        )
        .unwrap_or_default();
        println!("{}", json);
        return Ok(());
    }

    if results.is_empty() {
        display::warning(&format!("No artifacts matching '{}'", query));
        return Ok(());
    }
    display::print_artifacts(&results);
    Ok(())
}
