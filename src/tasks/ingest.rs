//! Startup ingestion: manifest to probed clip library.
//!
//! The manifest fetch is the only fatal step. Every entry is then probed
//! concurrently (bounded) for its dimensions; a clip whose probe fails is
//! kept and classified square, never dropped.

use crate::config::Configuration;
use crate::library::Clip;
use crate::manifest::{self, Manifest, ManifestEntry};
use crate::probe::{self, HttpFetch, MediaFetch, ProbeOptions};
use anyhow::Result;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Fetch the manifest and probe every clip. Fatal only when the manifest
/// itself is unreachable or malformed.
pub async fn load_library(cfg: &Configuration, client: &reqwest::Client) -> Result<Vec<Clip>> {
    let manifest = manifest::fetch(client, &cfg.manifest_url).await?;
    let fetch = HttpFetch::new(client.clone());
    Ok(probe_all(manifest, &fetch, cfg.probe_options(), cfg.probe_concurrency).await)
}

/// Probe all manifest entries with at most `concurrency` in flight,
/// preserving manifest order in the returned library.
pub async fn probe_all<F>(
    manifest: Manifest,
    fetch: &F,
    opts: ProbeOptions,
    concurrency: usize,
) -> Vec<Clip>
where
    F: MediaFetch + Clone + Send + Sync + 'static,
{
    let total = manifest.videos.len();
    let mut results: Vec<Option<Clip>> = std::iter::repeat_with(|| None).take(total).collect();
    let mut pending = manifest.videos.into_iter().enumerate();
    let mut in_flight: JoinSet<(usize, ManifestEntry, probe::ClipMetadata)> = JoinSet::new();

    loop {
        while in_flight.len() < concurrency.max(1) {
            let Some((index, entry)) = pending.next() else {
                break;
            };
            let fetch = fetch.clone();
            let opts = opts.clone();
            in_flight.spawn(async move {
                let meta = probe::probe(&fetch, &entry.address, &opts).await;
                (index, entry, meta)
            });
        }
        match in_flight.join_next().await {
            Some(Ok((index, entry, meta))) => {
                results[index] = Some(Clip {
                    title: entry.display_title(),
                    address: entry.address,
                    width: meta.width,
                    height: meta.height,
                    orientation: meta.orientation,
                });
            }
            Some(Err(err)) => {
                // A probe task died; the entry it carried is lost with it.
                warn!(error = %err, "probe task failed");
            }
            None => break,
        }
    }

    let clips: Vec<Clip> = results.into_iter().flatten().collect();
    info!(probed = clips.len(), total, "clip library ready");
    clips
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orient::Orientation;
    use anyhow::anyhow;
    use std::collections::HashMap;
    use std::future::Future;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct MapFetch {
        bodies: HashMap<String, Vec<u8>>,
    }

    impl MediaFetch for MapFetch {
        fn fetch_head(
            &self,
            address: &str,
            _limit: u64,
        ) -> impl Future<Output = anyhow::Result<Vec<u8>>> + Send {
            let body = self.bodies.get(address).cloned();
            async move { body.ok_or_else(|| anyhow!("unreachable")) }
        }
    }

    fn mp4_with_dimensions(width: u32, height: u32) -> Vec<u8> {
        let mut tkhd_body = vec![0u8; 84];
        tkhd_body[76..80].copy_from_slice(&(width << 16).to_be_bytes());
        tkhd_body[80..84].copy_from_slice(&(height << 16).to_be_bytes());
        let boxed = |kind: &[u8; 4], body: &[u8]| {
            let mut out = Vec::new();
            out.extend_from_slice(&((body.len() as u32) + 8).to_be_bytes());
            out.extend_from_slice(kind);
            out.extend_from_slice(body);
            out
        };
        let trak = boxed(b"trak", &boxed(b"tkhd", &tkhd_body));
        boxed(b"moov", &trak)
    }

    fn entry(address: &str) -> ManifestEntry {
        ManifestEntry {
            address: address.to_string(),
            title: None,
        }
    }

    fn opts() -> ProbeOptions {
        ProbeOptions {
            timeout: Duration::from_millis(200),
            head_bytes: 64 * 1024,
            square_tolerance: 0.08,
        }
    }

    #[tokio::test]
    async fn probes_preserve_manifest_order_and_degrade_failures() {
        let mut fetch = MapFetch::default();
        fetch
            .bodies
            .insert("wide.mp4".to_string(), mp4_with_dimensions(1920, 1080));
        fetch
            .bodies
            .insert("tall.mp4".to_string(), mp4_with_dimensions(1080, 1920));

        let manifest = Manifest {
            videos: vec![entry("wide.mp4"), entry("broken.mp4"), entry("tall.mp4")],
        };
        let clips = probe_all(manifest, &fetch, opts(), 2).await;

        assert_eq!(clips.len(), 3, "failed probes keep their clip");
        assert_eq!(clips[0].address, "wide.mp4");
        assert_eq!(clips[0].orientation, Orientation::Landscape);
        assert_eq!(clips[1].address, "broken.mp4");
        assert_eq!(clips[1].orientation, Orientation::Square);
        assert_eq!(clips[2].orientation, Orientation::Portrait);
    }

    #[tokio::test]
    async fn empty_manifest_is_an_empty_library() {
        let fetch = MapFetch::default();
        let clips = probe_all(Manifest::default(), &fetch, opts(), 4).await;
        assert!(clips.is_empty());
    }
}
