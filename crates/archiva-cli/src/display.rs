//! Display formatting for CLI output

use archiva_core::RepositoryMetadata;
use archiva_indexer::{ArtifactRecord, ScanStatistics};
use archiva_proxy::{PolicyId, ProxyConnector};
use console::style;

pub fn success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

pub fn warning(message: &str) {
    println!("{} {}", style("⚠").yellow().bold(), message);
}

/// Connectors in evaluation order with their filters and effective policies
pub fn print_connectors(repository: &str, connectors: &[std::sync::Arc<ProxyConnector>]) {
    if connectors.is_empty() {
        warning(&format!("{} has no proxy connectors", repository));
        return;
    }

    println!("{}", style(repository).cyan().bold());
    for connector in connectors {
        let state = if connector.enabled {
            style("enabled").green()
        } else {
            style("disabled").dim()
        };
        println!(
            "  {} {} {} ({}, order {})",
            style("→").blue(),
            style(&connector.target.id).yellow(),
            style(&connector.target.url).dim(),
            state,
            connector.order
        );

        let config = connector.config();
        if !config.white_list.is_empty() {
            println!("      white list: {}", config.white_list.join(", "));
        }
        if !config.black_list.is_empty() {
            println!("      black list: {}", config.black_list.join(", "));
        }
        if let Some(proxy) = &connector.proxy_id {
            println!("      network proxy: {}", proxy);
        }
        for policy in PolicyId::ALL {
            let option = connector.policies.option(policy);
            let option = if option == policy.default_option() {
                style(option).dim()
            } else {
                style(option).bold()
            };
            println!("      {:<28} {}", policy.id(), option);
        }
    }
}

pub fn print_scan_statistics(repository: &str, stats: &ScanStatistics) {
    success(&format!(
        "Indexed {} artifacts of {}",
        stats.artifacts_indexed,
        style(repository).cyan()
    ));
    println!("    files scanned: {}", stats.files_scanned);
    println!("    files skipped: {}", stats.files_skipped);
    if stats.artifacts_removed > 0 {
        println!("    stale entries removed: {}", stats.artifacts_removed);
    }
}

pub fn print_artifacts(records: &[ArtifactRecord]) {
    println!(
        "{:<40} {:<30} {:<15} {:<12} REPO",
        "GROUP", "ARTIFACT", "VERSION", "CLASSIFIER"
    );
    println!("{}", "-".repeat(110));
    for record in records {
        println!(
            "{:<40} {:<30} {:<15} {:<12} {}",
            record.group_id,
            format!("{}.{}", record.artifact_id, record.extension),
            record.version,
            record.classifier.as_deref().unwrap_or("-"),
            record.repository_id
        );
    }
}

pub fn print_metadata(metadata: &RepositoryMetadata) {
    if let Some(group) = &metadata.group_id {
        println!("{:<14} {}", style("groupId").bold(), group);
    }
    if let Some(artifact) = &metadata.artifact_id {
        println!("{:<14} {}", style("artifactId").bold(), artifact);
    }
    if let Some(version) = &metadata.version {
        println!("{:<14} {}", style("version").bold(), version);
    }
    let Some(versioning) = &metadata.versioning else {
        return;
    };
    if let Some(latest) = &versioning.latest {
        println!("{:<14} {}", style("latest").bold(), latest);
    }
    if let Some(release) = &versioning.release {
        println!("{:<14} {}", style("release").bold(), release);
    }
    if let Some(updated) = &versioning.last_updated {
        println!("{:<14} {}", style("lastUpdated").bold(), updated);
    }
    if !metadata.versions().is_empty() {
        println!("{}:", style("versions").bold());
        for version in metadata.versions() {
            println!("    - {}", version);
        }
    }
}
