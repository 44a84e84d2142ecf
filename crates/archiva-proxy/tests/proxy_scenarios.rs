//! End-to-end fetch pipeline scenarios
//!
//! Most scenarios run against an in-memory transport that records every
//! request, so tests can assert exactly which remotes were contacted.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use archiva_core::checksum::{ChecksumAlgorithm, digest_hex};
use archiva_core::{
    ArchivaConfig, ArtifactReference, ManagedRepository, ManagedRepositoryContent,
    ProxyConnectorConfig, RemoteRepository, RepositoryMetadata,
};
use archiva_proxy::{
    ConnectorRegistry, FailureCache, HttpTransport, ProxyError, RepositoryProxyHandler,
    TransferRequest, TransferStatus, Transport,
};
use async_trait::async_trait;
use tempfile::TempDir;

const ARTIFACT_PATH: &str = "org/example/app/1.0/app-1.0.jar";
const METADATA_PATH: &str = "org/example/app/maven-metadata.xml";

fn artifact() -> ArtifactReference {
    "org.example:app:1.0:jar".parse().unwrap()
}

// ============ Stub transport ============

#[derive(Debug, Clone)]
struct RemoteFile {
    data: Vec<u8>,
    modified: SystemTime,
}

/// In-memory remotes with request recording
#[derive(Debug, Clone, Default)]
struct StubTransport {
    /// remote id -> path -> file
    remotes: Arc<RwLock<HashMap<String, HashMap<String, RemoteFile>>>>,
    /// Remotes failing every request with a transport error
    broken: Arc<RwLock<HashSet<String>>>,
    /// (remote id, path) of every request, in order
    calls: Arc<RwLock<Vec<(String, String)>>>,
}

impl StubTransport {
    fn publish(&self, remote: &str, path: &str, data: &[u8]) {
        self.publish_at(remote, path, data, SystemTime::now() - Duration::from_secs(3600));
    }

    fn publish_at(&self, remote: &str, path: &str, data: &[u8], modified: SystemTime) {
        self.remotes
            .write()
            .unwrap()
            .entry(remote.to_string())
            .or_default()
            .insert(
                path.to_string(),
                RemoteFile {
                    data: data.to_vec(),
                    modified,
                },
            );
    }

    fn break_remote(&self, remote: &str) {
        self.broken.write().unwrap().insert(remote.to_string());
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.read().unwrap().clone()
    }

    /// Remotes asked for `path`, in order
    fn remotes_asked_for(&self, path: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(_, p)| p == path)
            .map(|(r, _)| r)
            .collect()
    }

    fn serve(
        &self,
        request: &TransferRequest<'_>,
        destination: &Path,
        since: Option<SystemTime>,
    ) -> archiva_proxy::Result<TransferStatus> {
        let remote = request.remote.id.clone();
        self.calls
            .write()
            .unwrap()
            .push((remote.clone(), request.path.to_string()));

        if self.broken.read().unwrap().contains(&remote) {
            return Err(ProxyError::NetworkError {
                message: format!("connection refused by {}", remote),
            });
        }

        let file = self
            .remotes
            .read()
            .unwrap()
            .get(&remote)
            .and_then(|files| files.get(request.path))
            .cloned();
        let Some(file) = file else {
            return Ok(TransferStatus::NotFound);
        };

        if since.is_some_and(|since| file.modified <= since) {
            return Ok(TransferStatus::NotModified);
        }

        std::fs::create_dir_all(destination.parent().unwrap())?;
        std::fs::write(destination, &file.data)?;
        Ok(TransferStatus::Downloaded)
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn get(
        &self,
        request: &TransferRequest<'_>,
        destination: &Path,
    ) -> archiva_proxy::Result<TransferStatus> {
        self.serve(request, destination, None)
    }

    async fn get_if_newer(
        &self,
        request: &TransferRequest<'_>,
        destination: &Path,
        since: SystemTime,
    ) -> archiva_proxy::Result<TransferStatus> {
        self.serve(request, destination, Some(since))
    }
}

// ============ Fixture ============

struct Fixture {
    _dir: TempDir,
    content: ManagedRepositoryContent,
    transport: StubTransport,
    handler: RepositoryProxyHandler,
}

impl Fixture {
    fn new(connectors: Vec<ProxyConnectorConfig>) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = ArchivaConfig::default();
        config.managed_repositories.push(ManagedRepository::new(
            "corporate",
            dir.path().join("corporate"),
        ));
        for connector in &connectors {
            if config.remote_repository(&connector.target_repo_id).is_err() {
                config.remote_repositories.push(RemoteRepository::new(
                    &connector.target_repo_id,
                    format!("https://{}.example.com/maven2", connector.target_repo_id),
                ));
            }
        }
        config.proxy_connectors = connectors;

        let transport = StubTransport::default();
        let handler = RepositoryProxyHandler::new(
            Arc::new(ConnectorRegistry::from_config(&config)),
            Arc::new(FailureCache::new(Duration::from_secs(60))),
            Arc::new(transport.clone()),
        )
        .with_work_dir(dir.path().join("work"));
        let content =
            ManagedRepositoryContent::open(config.managed_repository("corporate").unwrap().clone())
                .unwrap();

        Self {
            _dir: dir,
            content,
            transport,
            handler,
        }
    }

    fn local(&self, path: &str) -> std::path::PathBuf {
        self.content.repository().location.join(path)
    }
}

fn connector(target: &str, order: i32) -> ProxyConnectorConfig {
    ProxyConnectorConfig::new("corporate", target).with_order(order)
}

// ============ Artifact scenarios ============

#[tokio::test]
async fn test_fetch_from_single_remote() {
    let fixture = Fixture::new(vec![connector("central", 1)]);
    let sha1 = digest_hex(ChecksumAlgorithm::Sha1, b"remote-bytes");
    fixture.transport.publish("central", ARTIFACT_PATH, b"remote-bytes");
    fixture
        .transport
        .publish("central", &format!("{}.sha1", ARTIFACT_PATH), sha1.as_bytes());

    let asset = fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap()
        .expect("artifact fetched");

    assert_eq!(asset.path(), ARTIFACT_PATH);
    assert_eq!(std::fs::read(asset.file_path()).unwrap(), b"remote-bytes");
    assert!(fixture.local(&format!("{}.sha1", ARTIFACT_PATH)).is_file());
    assert!(fixture.local(&format!("{}.md5", ARTIFACT_PATH)).is_file());
    assert_eq!(
        fixture.transport.calls().len(),
        3,
        "artifact plus two checksum requests"
    );
}

#[tokio::test]
async fn test_not_found_is_cached() {
    let fixture = Fixture::new(vec![connector("central", 1)]);

    let first = fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap();
    assert!(first.is_none());
    assert_eq!(fixture.transport.calls().len(), 1);
    assert!(
        fixture
            .handler
            .failure_cache()
            .has_failed_before(&format!("https://central.example.com/maven2/{}", ARTIFACT_PATH))
    );

    let second = fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap();
    assert!(second.is_none());
    assert_eq!(
        fixture.transport.calls().len(),
        1,
        "cached failure must not reach the network"
    );
}

#[tokio::test]
async fn test_no_connectors_means_no_network() {
    let fixture = Fixture::new(Vec::new());
    let result = fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap();
    assert!(result.is_none());
    assert!(fixture.transport.calls().is_empty());
    assert!(!fixture.handler.has_proxies("corporate"));
}

#[tokio::test]
async fn test_connectors_tried_in_order() {
    let fixture = Fixture::new(vec![
        connector("mirror-b", 2),
        connector("mirror-c", 3),
        connector("mirror-a", 1),
    ]);
    fixture.transport.publish("mirror-c", ARTIFACT_PATH, b"from-c");

    let asset = fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(std::fs::read(asset.file_path()).unwrap(), b"from-c");
    assert_eq!(
        fixture.transport.remotes_asked_for(ARTIFACT_PATH),
        ["mirror-a", "mirror-b", "mirror-c"]
    );
}

#[tokio::test]
async fn test_first_success_wins() {
    let fixture = Fixture::new(vec![connector("first", 1), connector("second", 2)]);
    fixture.transport.publish("first", ARTIFACT_PATH, b"one");
    fixture.transport.publish("second", ARTIFACT_PATH, b"two");

    let asset = fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(std::fs::read(asset.file_path()).unwrap(), b"one");
    assert_eq!(fixture.transport.remotes_asked_for(ARTIFACT_PATH), ["first"]);
}

#[tokio::test]
async fn test_black_list_overrides_white_list() {
    let mut filtered = connector("central", 1);
    filtered.white_list.push("org/example/**".to_string());
    filtered.black_list.push("org/example/app/**".to_string());
    let fixture = Fixture::new(vec![filtered]);
    fixture.transport.publish("central", ARTIFACT_PATH, b"bytes");

    let result = fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap();

    assert!(result.is_none());
    assert!(fixture.transport.calls().is_empty());
}

#[tokio::test]
async fn test_white_list_limits_connector() {
    let mut other = connector("other", 1);
    other.white_list.push("com/other/**".to_string());
    let fixture = Fixture::new(vec![other, connector("central", 2)]);
    fixture.transport.publish("central", ARTIFACT_PATH, b"bytes");

    fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fixture.transport.remotes_asked_for(ARTIFACT_PATH), ["central"]);
}

#[tokio::test]
async fn test_second_fetch_is_not_modified() {
    let fixture = Fixture::new(vec![connector("central", 1)]);
    fixture.transport.publish("central", ARTIFACT_PATH, b"stable");

    let first = fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap()
        .unwrap();
    let modified = first.last_modified().unwrap();
    let calls_after_first = fixture.transport.calls().len();

    let second = fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap()
        .expect("local copy returned");

    assert_eq!(second.path(), first.path());
    assert_eq!(second.last_modified().unwrap(), modified);
    assert_eq!(std::fs::read(second.file_path()).unwrap(), b"stable");
    // Only the conditional request, no checksum traffic
    assert_eq!(fixture.transport.calls().len(), calls_after_first + 1);
}

#[tokio::test]
async fn test_newer_remote_is_downloaded_again() {
    let fixture = Fixture::new(vec![connector("central", 1)]);
    fixture.transport.publish("central", ARTIFACT_PATH, b"v1");
    fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap()
        .unwrap();

    fixture.transport.publish_at(
        "central",
        ARTIFACT_PATH,
        b"v2",
        SystemTime::now() + Duration::from_secs(60),
    );
    let asset = fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(std::fs::read(asset.file_path()).unwrap(), b"v2");
}

#[tokio::test]
async fn test_concurrent_fetches_download_once() {
    let fixture = Fixture::new(vec![connector("central", 1)]);
    fixture.transport.publish("central", ARTIFACT_PATH, b"shared");
    let reference = artifact();

    let (a, b) = tokio::join!(
        fixture.handler.fetch_from_proxies(&fixture.content, &reference),
        fixture.handler.fetch_from_proxies(&fixture.content, &reference),
    );
    assert!(a.unwrap().is_some());
    assert!(b.unwrap().is_some());

    // One full download, then one conditional request answered "not modified"
    assert_eq!(fixture.transport.remotes_asked_for(ARTIFACT_PATH).len(), 2);
    assert_eq!(
        fixture
            .transport
            .remotes_asked_for(&format!("{}.sha1", ARTIFACT_PATH))
            .len(),
        1
    );
}

// ============ Checksum policy ============

#[tokio::test]
async fn test_checksum_fix_rewrites_garbled_files() {
    let fixture = Fixture::new(vec![connector("central", 1).with_policy("checksum", "fix")]);
    fixture.transport.publish("central", ARTIFACT_PATH, b"content");
    fixture
        .transport
        .publish("central", &format!("{}.sha1", ARTIFACT_PATH), b"garbled");

    fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(fixture.local(&format!("{}.sha1", ARTIFACT_PATH))).unwrap(),
        format!(
            "{}  app-1.0.jar",
            digest_hex(ChecksumAlgorithm::Sha1, b"content")
        )
    );
    assert_eq!(
        std::fs::read_to_string(fixture.local(&format!("{}.md5", ARTIFACT_PATH))).unwrap(),
        format!("{}  app-1.0.jar", digest_hex(ChecksumAlgorithm::Md5, b"content"))
    );
}

#[tokio::test]
async fn test_checksum_fail_rejects_corrupted_sha1() {
    let fixture = Fixture::new(vec![connector("central", 1).with_policy("checksum", "fail")]);
    fixture.transport.publish("central", ARTIFACT_PATH, b"content");
    fixture.transport.publish(
        "central",
        &format!("{}.sha1", ARTIFACT_PATH),
        b"0000000000000000000000000000000000000000",
    );

    let err = fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap_err();

    assert!(err.is_download_error());
    assert!(!fixture.local(ARTIFACT_PATH).exists());
    assert!(!fixture.local(&format!("{}.sha1", ARTIFACT_PATH)).exists());
}

#[tokio::test]
async fn test_checksum_fail_falls_through_to_next_remote() {
    let fixture = Fixture::new(vec![
        connector("corrupt", 1).with_policy("checksum", "fail"),
        connector("central", 2).with_policy("checksum", "fail"),
    ]);
    for remote in ["corrupt", "central"] {
        fixture.transport.publish(remote, ARTIFACT_PATH, b"content");
    }
    fixture.transport.publish(
        "corrupt",
        &format!("{}.sha1", ARTIFACT_PATH),
        b"0000000000000000000000000000000000000000",
    );
    fixture.transport.publish(
        "central",
        &format!("{}.sha1", ARTIFACT_PATH),
        digest_hex(ChecksumAlgorithm::Sha1, b"content").as_bytes(),
    );

    let asset = fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(std::fs::read(asset.file_path()).unwrap(), b"content");
}

// ============ Error propagation ============

#[tokio::test]
async fn test_stop_aborts_on_transport_error() {
    let fixture = Fixture::new(vec![
        connector("broken", 1).with_policy("propagate-errors", "stop"),
        connector("central", 2),
    ]);
    fixture.transport.break_remote("broken");
    fixture.transport.publish("central", ARTIFACT_PATH, b"bytes");

    let err = fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap_err();

    match err {
        ProxyError::Download { causes, .. } => {
            assert_eq!(causes.len(), 1);
            assert_eq!(causes[0].remote_id, "broken");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(fixture.transport.remotes_asked_for(ARTIFACT_PATH), ["broken"]);
}

#[tokio::test]
async fn test_queued_error_dropped_on_success() {
    let fixture = Fixture::new(vec![connector("broken", 1), connector("central", 2)]);
    fixture.transport.break_remote("broken");
    fixture.transport.publish("central", ARTIFACT_PATH, b"bytes");

    let asset = fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap();
    assert!(asset.is_some());
    assert!(
        fixture
            .handler
            .failure_cache()
            .has_failed_before(&format!("https://broken.example.com/maven2/{}", ARTIFACT_PATH))
    );
}

#[tokio::test]
async fn test_queued_errors_surface_when_nothing_succeeds() {
    let fixture = Fixture::new(vec![
        connector("broken-1", 1),
        connector("empty", 2),
        connector("broken-2", 3),
    ]);
    fixture.transport.break_remote("broken-1");
    fixture.transport.break_remote("broken-2");

    let err = fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap_err();
    match err {
        ProxyError::Download { path, causes } => {
            assert_eq!(path, ARTIFACT_PATH);
            let remotes: Vec<_> = causes.iter().map(|c| c.remote_id.as_str()).collect();
            assert_eq!(remotes, ["broken-1", "broken-2"]);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_ignored_errors_yield_not_found() {
    let fixture = Fixture::new(vec![
        connector("broken", 1).with_policy("propagate-errors", "ignore"),
    ]);
    fixture.transport.break_remote("broken");

    let result = fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_errors_not_propagated_when_local_copy_exists() {
    let fixture = Fixture::new(vec![
        connector("broken", 1).with_policy("propagate-errors", "stop"),
    ]);
    fixture.transport.break_remote("broken");
    std::fs::create_dir_all(fixture.local(ARTIFACT_PATH).parent().unwrap()).unwrap();
    std::fs::write(fixture.local(ARTIFACT_PATH), b"local").unwrap();

    // not-present: the local copy vetoes propagation
    let result = fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap();
    assert!(result.is_none());
    assert_eq!(std::fs::read(fixture.local(ARTIFACT_PATH)).unwrap(), b"local");
}

// ============ Update policies ============

#[tokio::test]
async fn test_release_policy_never_returns_local_copy() {
    let fixture = Fixture::new(vec![connector("central", 1).with_policy("releases", "never")]);
    fixture.transport.publish("central", ARTIFACT_PATH, b"remote");
    std::fs::create_dir_all(fixture.local(ARTIFACT_PATH).parent().unwrap()).unwrap();
    std::fs::write(fixture.local(ARTIFACT_PATH), b"local").unwrap();

    let asset = fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(std::fs::read(asset.file_path()).unwrap(), b"local");
    assert!(fixture.transport.calls().is_empty());
}

#[tokio::test]
async fn test_snapshot_policy_ignores_releases() {
    let fixture = Fixture::new(vec![connector("central", 1).with_policy("snapshots", "never")]);
    fixture.transport.publish("central", ARTIFACT_PATH, b"release");

    let asset = fixture
        .handler
        .fetch_from_proxies(&fixture.content, &artifact())
        .await
        .unwrap();
    assert!(asset.is_some());
}

#[tokio::test]
async fn test_generic_path_fetch() {
    let fixture = Fixture::new(vec![connector("central", 1).with_policy("releases", "never")]);
    fixture
        .transport
        .publish("central", "archetype-catalog.xml", b"<archetype-catalog/>");

    let asset = fixture
        .handler
        .fetch_path_from_proxies(&fixture.content, "/archetype-catalog.xml")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(asset.path(), "archetype-catalog.xml");
}

// ============ Metadata ============

fn metadata_xml(versions: &[&str], last_updated: &str) -> Vec<u8> {
    let versions: String = versions
        .iter()
        .map(|v| format!("<version>{}</version>", v))
        .collect();
    format!(
        "<metadata><groupId>org.example</groupId><artifactId>app</artifactId>\
         <versioning><versions>{}</versions><lastUpdated>{}</lastUpdated></versioning></metadata>",
        versions, last_updated
    )
    .into_bytes()
}

#[tokio::test]
async fn test_metadata_merged_across_remotes() {
    let fixture = Fixture::new(vec![connector("central", 1), connector("mirror", 2)]);
    fixture.transport.publish(
        "central",
        METADATA_PATH,
        &metadata_xml(&["1.0", "1.1"], "20240101000000"),
    );
    fixture.transport.publish(
        "mirror",
        METADATA_PATH,
        &metadata_xml(&["1.1", "1.2"], "20240301000000"),
    );

    let result = fixture
        .handler
        .fetch_metadata_from_proxies(&fixture.content, METADATA_PATH)
        .await
        .unwrap();

    assert!(result.modified);
    let asset = result.asset.unwrap();
    let merged = RepositoryMetadata::read(asset.file_path()).unwrap();
    assert_eq!(merged.versions(), ["1.0", "1.1", "1.2"]);
    let versioning = merged.versioning.unwrap();
    assert_eq!(versioning.release.as_deref(), Some("1.2"));
    assert_eq!(versioning.last_updated.as_deref(), Some("20240301000000"));

    assert!(fixture.local("org/example/app/maven-metadata-central.xml").is_file());
    assert!(fixture.local("org/example/app/maven-metadata-mirror.xml").is_file());
    assert!(fixture.local("org/example/app/maven-metadata.xml.sha1").is_file());

    // Both remotes consulted, unlike artifacts
    assert_eq!(
        fixture.transport.remotes_asked_for(METADATA_PATH),
        ["central", "mirror"]
    );

    let again = fixture
        .handler
        .fetch_metadata_from_proxies(&fixture.content, METADATA_PATH)
        .await
        .unwrap();
    assert!(!again.modified);
    assert!(again.asset.is_some());
}

#[tokio::test]
async fn test_metadata_failures_not_cached() {
    let fixture = Fixture::new(vec![connector("broken", 1).with_policy("propagate-errors", "stop")]);
    fixture.transport.break_remote("broken");

    for _ in 0..2 {
        let result = fixture
            .handler
            .fetch_metadata_from_proxies(&fixture.content, METADATA_PATH)
            .await
            .unwrap();
        assert!(result.asset.is_none());
        assert!(!result.modified);
    }

    assert_eq!(fixture.transport.remotes_asked_for(METADATA_PATH).len(), 2);
    assert!(fixture.handler.failure_cache().is_empty());
}

// ============ HTTP end-to-end ============

#[tokio::test]
async fn test_http_transport_end_to_end() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/maven2/{}", ARTIFACT_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jar-from-central".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/maven2/{}.sha1", ARTIFACT_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "{}  app-1.0.jar",
            digest_hex(ChecksumAlgorithm::Sha1, b"jar-from-central")
        )))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = ArchivaConfig::default();
    config
        .managed_repositories
        .push(ManagedRepository::new("corporate", dir.path().join("corporate")));
    config.remote_repositories.push(RemoteRepository::new(
        "central",
        format!("{}/maven2", server.uri()),
    ));
    config.proxy_connectors.push(
        ProxyConnectorConfig::new("corporate", "central")
            .with_order(1)
            .with_policy("checksum", "fail"),
    );

    let handler = RepositoryProxyHandler::new(
        Arc::new(ConnectorRegistry::from_config(&config)),
        Arc::new(FailureCache::new(Duration::from_secs(60))),
        Arc::new(HttpTransport::new()),
    );
    let content =
        ManagedRepositoryContent::open(config.managed_repository("corporate").unwrap().clone())
            .unwrap();

    let asset = handler
        .fetch_from_proxies(&content, &artifact())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(std::fs::read(asset.file_path()).unwrap(), b"jar-from-central");
    assert!(asset.file_path().with_extension("jar.sha1").is_file());
    // The remote publishes no md5; the sha1 alone satisfies "fail"
    assert!(!asset.file_path().with_extension("jar.md5").exists());
}
