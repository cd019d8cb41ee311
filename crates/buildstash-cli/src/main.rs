use anyhow::{bail, Context};
use buildstash_core::cache::{ArtifactCache, CacheFactory, CacheKey};
use buildstash_core::config::{CacheConfig, CacheSpec, CliOverrides, DEFAULT_CONFIG_FILE};
use buildstash_core::fingerprint::{Field, SourcesField};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Buildstash - content-addressed artifact caching for builds
#[derive(Parser, Debug)]
#[command(name = "buildstash")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to buildstash.yaml (or .json) configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Root that cached paths are archived relative to
    #[arg(long, value_name = "DIR", global = true)]
    artifact_root: Option<PathBuf>,

    /// Cache to read from; repeat to give a [local, remote] pair
    #[arg(long, value_name = "SPEC", global = true)]
    read_from: Vec<String>,

    /// Cache to write to; repeat to give a [local, remote] pair
    #[arg(long, value_name = "SPEC", global = true)]
    write_to: Vec<String>,

    /// gzip level, 0 for uncompressed archives
    #[arg(long, value_name = "LEVEL", global = true)]
    compression: Option<u32>,

    /// Namespace appended to every cache location
    #[arg(long, value_name = "NAME", global = true)]
    task_name: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default configuration file
    Init,
    /// Print the fingerprint of a set of source files
    Fingerprint {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<String>,
    },
    /// Report whether the read cache holds an artifact
    Has { id: String, hash: String },
    /// Insert paths into the write cache
    Put {
        id: String,
        hash: String,
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },
    /// Extract an artifact from the read cache into the artifact root
    Get { id: String, hash: String },
    /// Delete an artifact from the write cache
    Delete { id: String, hash: String },
    /// Remove artifacts older than the given age from the write cache
    Prune {
        #[arg(long, value_name = "HOURS")]
        max_age_hours: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG still applies; --verbose raises the floor to debug
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let load = || load_config(&cli);

    match &cli.command {
        Command::Init => {
            let path = cli
                .config
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            init_config(&path)
        }
        Command::Fingerprint { files } => fingerprint(files),
        Command::Has { id, hash } => {
            let config = load()?;
            let key = CacheKey::new(id, hash);
            let hit = match open_cache(&config, config.read_spec()?, "readFrom")? {
                Some(cache) => cache.has(&key),
                None => false,
            };
            println!("{}", if hit { "hit" } else { "miss" });
            Ok(())
        }
        Command::Put { id, hash, paths } => {
            let config = load()?;
            let key = CacheKey::new(id, hash);
            let cache = require_cache(&config, config.write_spec()?, "writeTo")?;
            cache
                .try_insert(&key, paths)
                .with_context(|| format!("Failed to insert {}", key))?;
            info!("Inserted {} path(s) under {}", paths.len(), key);
            Ok(())
        }
        Command::Get { id, hash } => {
            let config = load()?;
            let key = CacheKey::new(id, hash);
            let artifact = open_cache(&config, config.read_spec()?, "readFrom")?
                .and_then(|cache| cache.use_cached_files(&key));
            let Some(artifact) = artifact else {
                bail!("No cached artifact for {}", key);
            };
            for path in &artifact.paths {
                println!("{}", path.display());
            }
            Ok(())
        }
        Command::Delete { id, hash } => {
            let config = load()?;
            let key = CacheKey::new(id, hash);
            let cache = require_cache(&config, config.write_spec()?, "writeTo")?;
            cache
                .delete(&key)
                .with_context(|| format!("Failed to delete {}", key))?;
            Ok(())
        }
        Command::Prune { max_age_hours } => {
            let config = load()?;
            let cache = require_cache(&config, config.write_spec()?, "writeTo")?;
            let removed = cache.prune(*max_age_hours)?;
            println!("Pruned {} artifact(s)", removed);
            Ok(())
        }
    }
}

fn init_config(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    CacheConfig::init_file(path)?;
    println!("Created {}", path.display());
    Ok(())
}

/// Explicit `--config`, else `buildstash.yaml` in the working directory if
/// present, else defaults; command-line flags override either way.
fn load_config(cli: &Cli) -> anyhow::Result<CacheConfig> {
    let mut config = match &cli.config {
        Some(path) => CacheConfig::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            CacheConfig::from_file(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => CacheConfig::default(),
    };
    config.merge(&CliOverrides {
        artifact_root: cli.artifact_root.clone(),
        read_from: cli.read_from.clone(),
        write_to: cli.write_to.clone(),
        compression: cli.compression,
        task_name: cli.task_name.clone(),
    });
    debug!("Resolved configuration: {:?}", config);
    Ok(config)
}

fn fingerprint(files: &[String]) -> anyhow::Result<()> {
    let field = Field::new(SourcesField::new(".", "", files.to_vec()));
    println!("{}", field.fingerprint()?);
    Ok(())
}

/// `Ok(None)` when the configured remote caches are all unreachable
fn open_cache(
    config: &CacheConfig,
    spec: Option<CacheSpec>,
    setting: &str,
) -> anyhow::Result<Option<Arc<dyn ArtifactCache>>> {
    let Some(spec) = spec else {
        bail!("No cache configured: set {} in the config file or on the command line", setting);
    };
    let built = CacheFactory::from_config(config).build(&spec)?;
    Ok(built.map(|built| built.as_cache()))
}

fn require_cache(
    config: &CacheConfig,
    spec: Option<CacheSpec>,
    setting: &str,
) -> anyhow::Result<Arc<dyn ArtifactCache>> {
    match open_cache(config, spec, setting)? {
        Some(cache) => Ok(cache),
        None => bail!("No reachable artifact cache for {}", setting),
    }
}
