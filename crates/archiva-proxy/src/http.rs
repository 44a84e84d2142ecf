//! HTTP transport
//!
//! Redirects are followed manually so credentials configured for a remote
//! repository are never sent to another origin.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use archiva_core::NetworkProxy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, IF_MODIFIED_SINCE, LAST_MODIFIED, LOCATION};
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::error::{ProxyError, Result};
use crate::transport::{TransferRequest, TransferStatus, Transport};

const MAX_REDIRECTS: u32 = 10;
const USER_AGENT: &str = concat!("archiva/", env!("CARGO_PKG_VERSION"));

/// Transport backed by reqwest
#[derive(Debug, Default)]
pub struct HttpTransport {
    /// One client per network proxy; `None` is the direct client
    clients: Mutex<HashMap<Option<String>, reqwest::Client>>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self, proxy: Option<&NetworkProxy>) -> Result<reqwest::Client> {
        let key = proxy.map(|p| p.id.clone());
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder()
            // Redirects are handled in `send` to keep credentials on their origin
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(USER_AGENT);

        if let Some(proxy) = proxy {
            let mut http_proxy = reqwest::Proxy::all(proxy.url())?;
            if let (Some(user), Some(password)) = (&proxy.username, &proxy.password) {
                http_proxy = http_proxy.basic_auth(user, password);
            }
            builder = builder.proxy(http_proxy);
        }

        let client = builder.build().map_err(|e| ProxyError::NetworkError {
            message: e.to_string(),
        })?;
        clients.insert(key, client.clone());
        Ok(client)
    }

    /// Send a GET, following redirects; credentials and extra headers only go
    /// to the remote's own origin
    async fn send(
        &self,
        request: &TransferRequest<'_>,
        since: Option<SystemTime>,
    ) -> Result<reqwest::Response> {
        let client = self.client(request.network_proxy)?;
        let auth = request
            .remote
            .credentials
            .as_ref()
            .map(|c| c.resolve())
            .transpose()?
            .map(|c| c.auth_header());

        // Credentials belong to the remote, not to whatever host the URL names
        let origin = request.remote.url.as_str();
        let mut current_url = request.url.clone();
        let mut redirects = 0;

        loop {
            let mut builder = client.get(&current_url).timeout(request.remote.timeout);

            if same_origin(origin, &current_url) {
                for (name, value) in &request.remote.extra_headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                if let Some(auth) = &auth {
                    builder = builder.header(AUTHORIZATION, auth.as_str());
                }
            } else if auth.is_some() {
                tracing::warn!(
                    "{} is outside the origin of {} - credentials not forwarded",
                    current_url,
                    origin
                );
            }

            if let Some(since) = since {
                builder = builder.header(IF_MODIFIED_SINCE, http_date(since));
            }

            let response = builder.send().await?;
            let status = response.status();

            if status.is_redirection() && status != StatusCode::NOT_MODIFIED {
                redirects += 1;
                if redirects > MAX_REDIRECTS {
                    return Err(ProxyError::NetworkError {
                        message: format!("Too many redirects (max {})", MAX_REDIRECTS),
                    });
                }

                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| ProxyError::NetworkError {
                        message: "Redirect without Location header".to_string(),
                    })?;

                let base = Url::parse(&current_url)?;
                current_url = base.join(location)?.to_string();
                continue;
            }

            return Ok(response);
        }
    }

    async fn transfer(
        &self,
        request: &TransferRequest<'_>,
        destination: &Path,
        since: Option<SystemTime>,
    ) -> Result<TransferStatus> {
        let response = self.send(request, since).await?;
        let status = response.status();
        let url = response.url().to_string();

        match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => return Ok(TransferStatus::NotFound),
            StatusCode::NOT_MODIFIED => return Ok(TransferStatus::NotModified),
            StatusCode::UNAUTHORIZED => return Err(ProxyError::AuthRequired { url }),
            StatusCode::FORBIDDEN => return Err(ProxyError::AuthFailed { url }),
            s if !s.is_success() => {
                return Err(ProxyError::HttpError {
                    status: s.as_u16(),
                    url,
                });
            }
            _ => {}
        }

        // Servers ignoring If-Modified-Since still report Last-Modified
        if let (Some(since), Some(remote_modified)) = (since, last_modified(&response))
            && remote_modified <= since
        {
            return Ok(TransferStatus::NotModified);
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        tracing::debug!("Downloaded {} ({} bytes)", url, written);
        Ok(TransferStatus::Downloaded)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        request: &TransferRequest<'_>,
        destination: &Path,
    ) -> Result<TransferStatus> {
        self.transfer(request, destination, None).await
    }

    async fn get_if_newer(
        &self,
        request: &TransferRequest<'_>,
        destination: &Path,
        since: SystemTime,
    ) -> Result<TransferStatus> {
        self.transfer(request, destination, Some(since)).await
    }
}

/// Check if two URLs have the same origin (scheme, host, port)
pub fn same_origin(url1: &str, url2: &str) -> bool {
    match (Url::parse(url1), Url::parse(url2)) {
        (Ok(u1), Ok(u2)) => {
            u1.scheme() == u2.scheme()
                && u1.host() == u2.host()
                && u1.port_or_known_default() == u2.port_or_known_default()
        }
        _ => false,
    }
}

fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

fn last_modified(response: &reqwest::Response) -> Option<SystemTime> {
    let value = response.headers().get(LAST_MODIFIED)?.to_str().ok()?;
    let parsed = DateTime::parse_from_rfc2822(value).ok()?;
    Some(SystemTime::from(parsed.with_timezone(&Utc)))
}
