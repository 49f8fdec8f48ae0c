//! Clip metadata probing.
//!
//! Fetches a bounded head of the media and walks the MP4 box tree for the
//! first video track's pixel dimensions. Probing never fails outward: any
//! fetch error, parse failure or timeout degrades to zero dimensions, which
//! classifies as square, so one bad clip can never block startup.

use crate::orient::{Orientation, classify};
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Probed dimensions plus the orientation derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipMetadata {
    pub width: u32,
    pub height: u32,
    pub orientation: Orientation,
}

#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub timeout: Duration,
    pub head_bytes: u64,
    pub square_tolerance: f64,
}

/// Seam to the cache/network layer. The engine only ever needs the first
/// `limit` bytes of a clip to read its container metadata.
pub trait MediaFetch {
    fn fetch_head(&self, address: &str, limit: u64)
    -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// HTTP-backed fetcher. The offline cache sits transparently behind plain
/// GETs; a cache miss is just a slower response.
#[derive(Debug, Clone)]
pub struct HttpFetch {
    client: reqwest::Client,
}

impl HttpFetch {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl MediaFetch for HttpFetch {
    fn fetch_head(
        &self,
        address: &str,
        limit: u64,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send {
        let client = self.client.clone();
        let address = address.to_string();
        async move {
            let response = client
                .get(&address)
                .header(reqwest::header::RANGE, format!("bytes=0-{}", limit.saturating_sub(1)))
                .send()
                .await
                .with_context(|| format!("requesting media head for {address}"))?
                .error_for_status()
                .with_context(|| format!("media request for {address} was refused"))?;
            let mut raw = response
                .bytes()
                .await
                .with_context(|| format!("reading media head for {address}"))?
                .to_vec();
            // Servers that ignore Range send the whole file.
            raw.truncate(limit as usize);
            Ok(raw)
        }
    }
}

/// Probe one clip. Resolves within `opts.timeout` no matter what, degrading
/// to `{0, 0, square}` on any failure.
pub async fn probe<F: MediaFetch>(fetch: &F, address: &str, opts: &ProbeOptions) -> ClipMetadata {
    let head = timeout(opts.timeout, fetch.fetch_head(address, opts.head_bytes)).await;
    let dims = match head {
        Ok(Ok(bytes)) => match mp4_dimensions(&bytes) {
            Some(dims) => Some(dims),
            None => {
                warn!(address, "no readable track dimensions; classifying square");
                None
            }
        },
        Ok(Err(err)) => {
            warn!(address, error = %err, "media head fetch failed; classifying square");
            None
        }
        Err(_) => {
            warn!(address, timeout = ?opts.timeout, "probe timed out; classifying square");
            None
        }
    };
    let (width, height) = dims.unwrap_or((0, 0));
    let orientation = classify(width, height, opts.square_tolerance);
    debug!(address, width, height, %orientation, "probed clip");
    ClipMetadata {
        width,
        height,
        orientation,
    }
}

/// Walk the MP4 box tree (`moov` → `trak` → `tkhd`) and return the first
/// non-zero track width/height. Truncated input ends the walk quietly.
fn mp4_dimensions(raw: &[u8]) -> Option<(u32, u32)> {
    scan_boxes(raw, 0)
}

fn scan_boxes(raw: &[u8], depth: u8) -> Option<(u32, u32)> {
    // trak nests at most two levels below the file root.
    if depth > 2 {
        return None;
    }
    let mut offset = 0usize;
    while offset + 8 <= raw.len() {
        let declared = u32::from_be_bytes(raw[offset..offset + 4].try_into().ok()?) as u64;
        let kind = &raw[offset + 4..offset + 8];
        let (header, size) = match declared {
            0 => (8usize, (raw.len() - offset) as u64),
            1 => {
                if offset + 16 > raw.len() {
                    return None;
                }
                let large = u64::from_be_bytes(raw[offset + 8..offset + 16].try_into().ok()?);
                (16usize, large)
            }
            _ => (8usize, declared),
        };
        if size < header as u64 {
            return None;
        }
        let body_start = offset + header;
        let body_end = offset.checked_add(size as usize)?.min(raw.len());
        if body_start > raw.len() {
            return None;
        }
        let body = &raw[body_start..body_end];

        if kind == b"tkhd" {
            if let Some(dims) = tkhd_dimensions(body) {
                return Some(dims);
            }
        } else if kind == b"moov" || kind == b"trak" {
            if let Some(dims) = scan_boxes(body, depth + 1) {
                return Some(dims);
            }
        }

        // A box running past the fetched head clamps to the buffer and the
        // walk ends there.
        offset = body_end;
    }
    None
}

/// Width/height live at the tail of the track header as 16.16 fixed point.
/// Audio tracks carry zeros there, so zero pairs are skipped by the caller.
fn tkhd_dimensions(body: &[u8]) -> Option<(u32, u32)> {
    let version = *body.first()?;
    let fields = match version {
        0 => 76usize,
        1 => 88usize,
        _ => return None,
    };
    if body.len() < fields + 8 {
        return None;
    }
    let width = u32::from_be_bytes(body[fields..fields + 4].try_into().ok()?) >> 16;
    let height = u32::from_be_bytes(body[fields + 4..fields + 8].try_into().ok()?) >> 16;
    if width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}
