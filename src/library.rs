//! Clip library and orientation buckets.
//!
//! Clips are immutable once probed. The index partitions them by their own
//! orientation and remembers the most recent pick per bucket so back-to-back
//! repeats stay rare without ever risking an unbounded reroll loop.

use crate::orient::Orientation;
use rand::Rng;
use rand::rngs::StdRng;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// One playable video entry with probed dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clip {
    pub address: String,
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub orientation: Orientation,
}

/// How many rerolls we spend dodging the previous pick before accepting a
/// repeat. A collision after that is fine; looping forever is not.
const RESAMPLE_ATTEMPTS: usize = 6;

/// Clips grouped by orientation, plus the last pick per bucket.
#[derive(Debug, Default)]
pub struct BucketIndex {
    // BTreeMap keeps whole-library fallback picks reproducible under a seed.
    buckets: BTreeMap<Orientation, Vec<Arc<Clip>>>,
    last_pick: HashMap<Orientation, Arc<Clip>>,
}

impl BucketIndex {
    /// Group `clips` by their own orientation. Rebuilt wholesale whenever the
    /// clip set changes; nothing is maintained incrementally.
    pub fn build(clips: impl IntoIterator<Item = Clip>) -> Self {
        let mut buckets: BTreeMap<Orientation, Vec<Arc<Clip>>> = BTreeMap::new();
        for clip in clips {
            buckets
                .entry(clip.orientation)
                .or_default()
                .push(Arc::new(clip));
        }
        for (orientation, bucket) in &buckets {
            debug!(%orientation, clips = bucket.len(), "bucket built");
        }
        Self {
            buckets,
            last_pick: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn bucket_len(&self, orientation: Orientation) -> usize {
        self.buckets.get(&orientation).map_or(0, Vec::len)
    }

    /// Pick from one bucket. Empty bucket yields `None`; a singleton bucket
    /// repeats its only clip; larger buckets reroll against the previous
    /// pick a bounded number of times and then accept the collision.
    pub fn pick_next(&mut self, orientation: Orientation, rng: &mut StdRng) -> Option<Arc<Clip>> {
        let bucket = self.buckets.get(&orientation)?;
        if bucket.is_empty() {
            return None;
        }
        if bucket.len() == 1 {
            let only = Arc::clone(&bucket[0]);
            self.last_pick.insert(orientation, Arc::clone(&only));
            return Some(only);
        }

        let previous = self.last_pick.get(&orientation).map(|c| c.address.clone());
        let mut choice = Arc::clone(&bucket[rng.random_range(0..bucket.len())]);
        if let Some(previous) = previous {
            for _ in 0..RESAMPLE_ATTEMPTS {
                if choice.address != previous {
                    break;
                }
                choice = Arc::clone(&bucket[rng.random_range(0..bucket.len())]);
            }
        }
        self.last_pick.insert(orientation, Arc::clone(&choice));
        Some(choice)
    }

    /// Pick for a screen orientation with the mandatory fallback chain:
    /// requested bucket, then square, then anything at all. Rotation must
    /// never stall merely because one bucket is empty.
    pub fn pick_for_screen(
        &mut self,
        orientation: Orientation,
        rng: &mut StdRng,
    ) -> Option<Arc<Clip>> {
        if let Some(clip) = self.pick_next(orientation, rng) {
            return Some(clip);
        }
        if orientation != Orientation::Square {
            if let Some(clip) = self.pick_next(Orientation::Square, rng) {
                debug!(requested = %orientation, "bucket empty; fell back to square");
                return Some(clip);
            }
        }
        self.pick_any(rng)
    }

    fn pick_any(&mut self, rng: &mut StdRng) -> Option<Arc<Clip>> {
        let total = self.len();
        if total == 0 {
            return None;
        }
        let mut index = rng.random_range(0..total);
        for bucket in self.buckets.values() {
            if index < bucket.len() {
                let choice = Arc::clone(&bucket[index]);
                debug!(clip = %choice.title, "fell back to whole-library pick");
                self.last_pick
                    .insert(choice.orientation, Arc::clone(&choice));
                return Some(choice);
            }
            index -= bucket.len();
        }
        None
    }
}
