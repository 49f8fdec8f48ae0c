//! Clip manifest: the JSON document listing what the screensaver may play.
//!
//! The manifest is the only input whose failure is fatal. Everything below
//! the `videos` field is treated leniently: a missing or non-array field is
//! an empty library, and entries without a usable address are skipped.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    pub address: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub videos: Vec<ManifestEntry>,
}

impl ManifestEntry {
    /// Display title, defaulting to the address' final path segment.
    pub fn display_title(&self) -> String {
        match &self.title {
            Some(title) if !title.is_empty() => title.clone(),
            _ => self
                .address
                .rsplit('/')
                .next()
                .filter(|s| !s.is_empty())
                .unwrap_or(self.address.as_str())
                .to_string(),
        }
    }
}

/// Parse manifest bytes. Top-level JSON must parse (malformed manifests are
/// fatal); a missing or non-array `videos` field degrades to an empty
/// library rather than an error.
pub fn parse(raw: &[u8]) -> Result<Manifest> {
    let doc: Value = serde_json::from_slice(raw).context("manifest is not valid JSON")?;
    let entries = match doc.get("videos") {
        Some(Value::Array(entries)) => entries.as_slice(),
        Some(_) => {
            warn!("manifest `videos` field is not an array; treating library as empty");
            return Ok(Manifest::default());
        }
        None => {
            warn!("manifest has no `videos` field; treating library as empty");
            return Ok(Manifest::default());
        }
    };

    let mut videos = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match serde_json::from_value::<ManifestEntry>(entry.clone()) {
            Ok(entry) if !entry.address.is_empty() => videos.push(entry),
            Ok(_) => warn!(index, "manifest entry has an empty address; skipping"),
            Err(err) => warn!(index, error = %err, "unusable manifest entry; skipping"),
        }
    }
    Ok(Manifest { videos })
}

/// Fetch and parse the manifest. Any failure here halts startup; the caller
/// surfaces the diagnostic.
pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<Manifest> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("fetching manifest from {url}"))?
        .error_for_status()
        .with_context(|| format!("manifest request to {url} was refused"))?;
    let raw = response
        .bytes()
        .await
        .with_context(|| format!("reading manifest body from {url}"))?;
    let manifest = parse(&raw)?;
    info!(url, clips = manifest.videos.len(), "manifest loaded");
    Ok(manifest)
}
