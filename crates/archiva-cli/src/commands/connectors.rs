//! Connectors command

use archiva_core::ArchivaConfig;
use archiva_proxy::{ConnectorRegistry, PolicyId};

use crate::display;
use crate::error::Result;

/// List the proxy connectors of a managed repository in evaluation order
pub fn run(config: &ArchivaConfig, repository: &str, json_output: bool) -> Result<()> {
    config.managed_repository(repository)?;
    let registry = ConnectorRegistry::from_config(config);
    let connectors = registry.get_proxy_connectors(repository);

    if json_output {
        let json = serde_json::Value::Array(
            connectors
                .iter()
                .map(|c| {
                    let policies: serde_json::Map<String, serde_json::Value> = PolicyId::ALL
                        .into_iter()
                        .map(|p| (p.id().to_string(), c.policies.option(p).into()))
                        .collect();
                    serde_json::json!({
                        "source": c.source_repo_id,
                        "target": c.target.id,
                        "url": c.target.url,
                        "order": c.order,
                        "enabled": c.enabled,
                        "whiteList": c.config().white_list,
                        "blackList": c.config().black_list,
                        "proxyId": c.proxy_id,
                        "policies": policies,
                    })
                })
                .collect(),
        );
        println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        return Ok(());
    }

    display::print_connectors(repository, &connectors);
    Ok(())
}
