use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::debug;
use url::Url;

pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_PING_TRIES: u32 = 2;

/// Measures round trips to candidate cache servers
///
/// Caches are supposed to be close, so pings use a short timeout and only a
/// couple of tries; a no-op build should not stall on an unreachable host.
#[derive(Debug, Clone)]
pub struct Pinger {
    agent: ureq::Agent,
    tries: u32,
}

impl Pinger {
    pub fn new(timeout: Duration, tries: u32) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .redirects(0)
            .build();
        Self {
            agent,
            tries: tries.max(1),
        }
    }

    /// Fastest round trip to the server behind `url`, `None` if unreachable
    ///
    /// Any HTTP response counts as reachable, whatever its status.
    pub fn ping(&self, url: &str) -> Option<Duration> {
        let origin = Url::parse(url).ok()?.join("/").ok()?;
        let mut best: Option<Duration> = None;
        for _ in 0..self.tries {
            let start = Instant::now();
            let reachable = match self.agent.head(origin.as_str()).call() {
                Ok(_) | Err(ureq::Error::Status(..)) => true,
                Err(ureq::Error::Transport(_)) => false,
            };
            if reachable {
                let elapsed = start.elapsed();
                best = Some(best.map_or(elapsed, |b| b.min(elapsed)));
            }
        }
        best
    }

    /// Ping every url in parallel, preserving input order
    pub fn pings(&self, urls: &[String]) -> Vec<(String, Option<Duration>)> {
        urls.par_iter()
            .map(|url| (url.clone(), self.ping(url)))
            .collect()
    }

    /// Pick the lowest-latency url from a `|`-separated list
    ///
    /// A single url is returned without pinging. `None` means no candidate
    /// answered.
    pub fn select_best(&self, spec: &str) -> Option<String> {
        let urls: Vec<String> = spec
            .split('|')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(String::from)
            .collect();
        self.select_fastest(&urls)
    }

    /// Like [`Pinger::select_best`] over an already split candidate list
    pub fn select_fastest(&self, urls: &[String]) -> Option<String> {
        if urls.len() <= 1 {
            return urls.first().cloned();
        }

        let timings = self.pings(urls);
        let report: Vec<String> = timings
            .iter()
            .map(|(url, time)| match time {
                Some(time) => format!("{}: {:.3} secs", url, time.as_secs_f64()),
                None => format!("{}: unreachable", url),
            })
            .collect();
        debug!("Artifact cache server ping times: {}", report.join(", "));

        let best = timings
            .into_iter()
            .filter_map(|(url, time)| time.map(|time| (url, time)))
            .min_by_key(|(_, time)| *time)
            .map(|(url, _)| url);
        if let Some(url) = &best {
            debug!("Best artifact cache is {}", url);
        }
        best
    }
}

impl Default for Pinger {
    fn default() -> Self {
        Self::new(DEFAULT_PING_TIMEOUT, DEFAULT_PING_TRIES)
    }
}
