use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use super::{
    ArtifactCache, CombinedArtifactCache, LocalArtifactCache, Pinger, RemoteArtifactCache,
    RestClient, Result, StagingArea, TempArtifactCache,
};
use crate::config::{CacheConfig, CacheSpec, DEFAULT_COMPRESSION};

/// A cache built from a [`CacheSpec`], with its concrete tiers exposed
#[derive(Debug, Clone)]
pub enum BuiltCache {
    Local(Arc<LocalArtifactCache>),
    Remote(Arc<RemoteArtifactCache>),
    Combined {
        local: Arc<LocalArtifactCache>,
        remote: Arc<RemoteArtifactCache>,
        combined: Arc<CombinedArtifactCache>,
    },
}

impl BuiltCache {
    pub fn as_cache(&self) -> Arc<dyn ArtifactCache> {
        match self {
            BuiltCache::Local(local) => local.clone(),
            BuiltCache::Remote(remote) => remote.clone(),
            BuiltCache::Combined { combined, .. } => combined.clone(),
        }
    }
}

/// Turns cache specs into cache instances for one task
#[derive(Debug, Clone)]
pub struct CacheFactory {
    artifact_root: PathBuf,
    task_name: Option<String>,
    compression: u32,
    client: RestClient,
    pinger: Pinger,
}

impl CacheFactory {
    /// A relative `artifact_root` is resolved against the working directory
    /// here, so absolute input paths can be archived relative to it.
    pub fn new(artifact_root: impl Into<PathBuf>) -> Self {
        let artifact_root = artifact_root.into();
        Self {
            artifact_root: std::path::absolute(&artifact_root).unwrap_or(artifact_root),
            task_name: None,
            compression: DEFAULT_COMPRESSION,
            client: RestClient::default(),
            pinger: Pinger::default(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let mut factory = Self::new(&config.artifact_root)
            .with_compression(config.compression)
            .with_client(RestClient::new(config.remote_timeout()))
            .with_pinger(Pinger::new(config.ping_timeout(), config.ping_tries));
        factory.task_name = config.task_name.clone();
        factory
    }

    pub fn with_task_name(mut self, task_name: impl Into<String>) -> Self {
        self.task_name = Some(task_name.into());
        self
    }

    pub fn with_compression(mut self, compression: u32) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_client(mut self, client: RestClient) -> Self {
        self.client = client;
        self
    }

    pub fn with_pinger(mut self, pinger: Pinger) -> Self {
        self.pinger = pinger;
        self
    }

    pub fn artifact_root(&self) -> &Path {
        &self.artifact_root
    }

    /// Build the cache described by `spec`
    ///
    /// `Ok(None)` means no remote candidate answered and there is no local
    /// tier to fall back on; callers proceed without caching. A pair whose
    /// remote is unreachable degrades to its local tier.
    pub fn build(&self, spec: &CacheSpec) -> Result<Option<BuiltCache>> {
        match spec {
            CacheSpec::Local(path) => Ok(Some(BuiltCache::Local(self.build_local(path)?))),
            CacheSpec::Url(_) | CacheSpec::UrlList(_) => Ok(self
                .build_remote(spec.remote_urls(), None)?
                .map(BuiltCache::Remote)),
            CacheSpec::Pair { local, remote } => {
                let local = self.build_local(local)?;
                let Some(remote) = self.build_remote(remote, Some(local.clone()))? else {
                    warn!("{} falling back to local artifact cache only", self.task_label());
                    return Ok(Some(BuiltCache::Local(local)));
                };
                let tiers: Vec<Arc<dyn ArtifactCache>> = vec![local.clone(), remote.clone()];
                let combined = Arc::new(CombinedArtifactCache::new(tiers)?);
                Ok(Some(BuiltCache::Combined {
                    local,
                    remote,
                    combined,
                }))
            }
        }
    }

    fn build_local(&self, path: &Path) -> Result<Arc<LocalArtifactCache>> {
        let path = match &self.task_name {
            Some(task_name) => path.join(task_name),
            None => path.to_path_buf(),
        };
        let local = LocalArtifactCache::new(&self.artifact_root, &path, self.compression)?;
        info!(
            "{} using local artifact cache at {}",
            self.task_label(),
            local.cache_root().display()
        );
        Ok(Arc::new(local))
    }

    fn build_remote(
        &self,
        candidates: &[String],
        local: Option<Arc<LocalArtifactCache>>,
    ) -> Result<Option<Arc<RemoteArtifactCache>>> {
        let Some(best) = self.pinger.select_fastest(candidates) else {
            warn!(
                "{} has no reachable artifact cache in {}",
                self.task_label(),
                candidates.join("|")
            );
            return Ok(None);
        };

        let url = match &self.task_name {
            Some(task_name) => format!("{}/{}", best.trim_end_matches('/'), task_name),
            None => best,
        };
        let staging: Arc<dyn StagingArea> = match local {
            Some(local) => local,
            None => Arc::new(TempArtifactCache::new(&self.artifact_root, self.compression)?),
        };
        let remote = RemoteArtifactCache::new(&url, staging, self.client.clone())?;
        info!(
            "{} using remote artifact cache at {}",
            self.task_label(),
            remote.base_url()
        );
        Ok(Some(Arc::new(remote)))
    }

    fn task_label(&self) -> &str {
        self.task_name.as_deref().unwrap_or("buildstash")
    }
}
