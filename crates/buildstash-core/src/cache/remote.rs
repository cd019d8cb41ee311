use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use super::tarball::archive_extension;
use super::{ArtifactCache, CacheError, CacheKey, CachedArtifact, Result, StagingArea};
use crate::config::ConfigError;

/// Default per-request timeout for REST calls
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(4);

/// HTTP client shared by remote caches
///
/// Constructed once by the owner and cloned into each cache; clones share the
/// same connection pool.
#[derive(Debug, Clone)]
pub struct RestClient {
    agent: ureq::Agent,
}

impl RestClient {
    /// `timeout` bounds connecting and each individual read or write, not the
    /// whole transfer, so large archives can still stream through.
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        Self { agent }
    }

    /// Send a request, mapping 404 to `Ok(None)` and any other non-2xx status
    /// or transport failure to an error
    fn send(
        &self,
        method: &str,
        url: &str,
        body: Option<(File, u64)>,
    ) -> Result<Option<ureq::Response>> {
        debug!("Sending {} request to {}", method, url);
        let request = self.agent.request(method, url);
        let result = match body {
            Some((file, len)) => request
                .set("Content-Length", &len.to_string())
                .send(file),
            None => request.call(),
        };

        match result {
            Ok(response) if (200..300).contains(&response.status()) => Ok(Some(response)),
            Ok(response) => Err(http_error(method, url, response)),
            Err(ureq::Error::Status(404, _)) => {
                debug!("404 returned for {} request to {}", method, url);
                Ok(None)
            }
            Err(ureq::Error::Status(_, response)) => Err(http_error(method, url, response)),
            Err(ureq::Error::Transport(transport)) => Err(CacheError::Transport {
                method: method.to_string(),
                url: url.to_string(),
                reason: transport.to_string(),
            }),
        }
    }
}

impl Default for RestClient {
    fn default() -> Self {
        Self::new(DEFAULT_REMOTE_TIMEOUT)
    }
}

fn http_error(method: &str, url: &str, response: ureq::Response) -> CacheError {
    CacheError::Http {
        method: method.to_string(),
        url: url.to_string(),
        status: response.status(),
        reason: response.status_text().to_string(),
    }
}

/// Artifact cache backed by a RESTful service
///
/// Keys map to `{base_url}/{id}/{hash}.{ext}`. Archives are built and
/// unpacked by the staging area, which is also consulted first on reads so
/// bytes already present locally are never fetched again.
#[derive(Debug)]
pub struct RemoteArtifactCache {
    base_url: String,
    client: RestClient,
    staging: Arc<dyn StagingArea>,
}

impl RemoteArtifactCache {
    pub fn new(
        url_base: &str,
        staging: Arc<dyn StagingArea>,
        client: RestClient,
    ) -> std::result::Result<Self, ConfigError> {
        let parsed = Url::parse(url_base).map_err(|_| ConfigError::InvalidSpec {
            spec: url_base.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme {
                url: url_base.to_string(),
            });
        }

        Ok(Self {
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            client,
            staging,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn staging(&self) -> &Arc<dyn StagingArea> {
        &self.staging
    }

    pub fn url_for_key(&self, key: &CacheKey) -> String {
        format!(
            "{}/{}/{}.{}",
            self.base_url,
            key.id,
            key.hash,
            archive_extension(self.staging.compression())
        )
    }

    fn fetch(&self, key: &CacheKey) -> Result<Option<CachedArtifact>> {
        let url = self.url_for_key(key);
        let Some(response) = self.client.send("GET", &url, None)? else {
            return Ok(None);
        };
        let mut reader = response.into_reader();
        self.staging.store_and_extract(key, &mut reader).map(Some)
    }
}

impl ArtifactCache for RemoteArtifactCache {
    fn artifact_root(&self) -> &Path {
        self.staging.artifact_root()
    }

    fn has(&self, key: &CacheKey) -> bool {
        if self.staging.has(key) {
            return true;
        }
        match self.client.send("HEAD", &self.url_for_key(key), None) {
            Ok(response) => response.is_some(),
            Err(e) => {
                warn!("Error while checking remote artifact cache: {}", e);
                false
            }
        }
    }

    fn try_insert(&self, key: &CacheKey, paths: &[PathBuf]) -> Result<()> {
        let staged = self.staging.stage(key, paths)?;
        let file = File::open(staged.path()).map_err(|e| CacheError::io(staged.path(), e))?;
        let len = file
            .metadata()
            .map_err(|e| CacheError::io(staged.path(), e))?
            .len();

        let url = self.url_for_key(key);
        match self.client.send("PUT", &url, Some((file, len)))? {
            Some(_) => Ok(()),
            None => Err(CacheError::Http {
                method: "PUT".to_string(),
                url,
                status: 404,
                reason: "Not Found".to_string(),
            }),
        }
    }

    fn use_cached_files(&self, key: &CacheKey) -> Option<CachedArtifact> {
        if self.staging.has(key) {
            return self.staging.use_cached_files(key);
        }
        match self.fetch(key) {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!("Error while reading from remote artifact cache: {}", e);
                None
            }
        }
    }

    fn delete(&self, key: &CacheKey) -> Result<()> {
        self.staging.delete(key)?;
        self.client
            .send("DELETE", &self.url_for_key(key), None)
            .map(|_| ())
    }

    /// Only the staging area is pruned; server-side expiry belongs to the server
    fn prune(&self, max_age_hours: u64) -> Result<usize> {
        self.staging.prune(max_age_hours)
    }
}
