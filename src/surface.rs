//! Playback surfaces.
//!
//! The engine drives two interchangeable surfaces through the [`Surface`]
//! trait: transport commands, opacity, and one awaitable "first decodable
//! progress" signal per load. The display shell owns the real rendering;
//! [`SimSurface`] is the in-tree backend, advancing a simulated transport on
//! the tokio clock. It powers the headless soak mode and the timing tests.

use crate::events::PlaybackEvent;
use crate::session::SurfaceId;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::trace;

/// One opaque playback resource.
///
/// Backends must honor two timing contracts: `first_progress` resolves once
/// the most recent `load` has produced decodable progress (and never before),
/// and `begin_fade` reaches `target` within `over`.
pub trait Surface: Send {
    fn id(&self) -> SurfaceId;
    /// Assign a new source and rewind. Resets the first-progress signal.
    fn load(&mut self, address: &str);
    fn play(&mut self);
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    fn set_rate(&mut self, rate: f64);
    fn set_position(&mut self, seconds: f64);
    fn position(&self) -> f64;
    fn duration(&self) -> Option<f64>;
    fn set_opacity(&mut self, opacity: f32);
    fn opacity(&self) -> f32;
    fn begin_fade(&mut self, target: f32, over: Duration);
    fn first_progress(&mut self) -> impl Future<Output = ()> + Send;
}

/// Tuning for the simulated backend.
#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Duration assumed for sources not listed in `durations`.
    pub default_duration: f64,
    pub durations: HashMap<String, f64>,
    /// Sources that never produce progress (stuck download, bad codec).
    pub unplayable: HashSet<String>,
    /// Transport tick cadence.
    pub tick: Duration,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            default_duration: 12.0,
            durations: HashMap::new(),
            unplayable: HashSet::new(),
            tick: Duration::from_millis(50),
        }
    }
}

#[derive(Debug)]
struct SimState {
    source: Option<String>,
    playing: bool,
    rate: f64,
    position: f64,
    duration: Option<f64>,
    opacity: f32,
    generation: u64,
    error_reported: u64,
}

impl SimState {
    fn new() -> Self {
        Self {
            source: None,
            playing: false,
            rate: 1.0,
            position: 0.0,
            duration: None,
            opacity: 0.0,
            generation: 0,
            error_reported: 0,
        }
    }
}

/// Simulated playback surface: a looping transport advanced by a background
/// tick task that reports progress through the shared playback channel.
#[derive(Debug)]
pub struct SimSurface {
    id: SurfaceId,
    options: SimOptions,
    state: Arc<Mutex<SimState>>,
    started_rx: watch::Receiver<u64>,
    driver: JoinHandle<()>,
}

impl SimSurface {
    /// Spawns the transport tick task; must run inside a tokio runtime.
    pub fn new(id: SurfaceId, options: SimOptions, events: mpsc::Sender<PlaybackEvent>) -> Self {
        let state = Arc::new(Mutex::new(SimState::new()));
        let (started_tx, started_rx) = watch::channel(0u64);
        let driver = tokio::spawn(drive_transport(
            id,
            Arc::clone(&state),
            started_tx,
            events,
            options.tick,
        ));
        Self {
            id,
            options,
            state,
            started_rx,
            driver,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for SimSurface {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn drive_transport(
    id: SurfaceId,
    state: Arc<Mutex<SimState>>,
    started_tx: watch::Sender<u64>,
    events: mpsc::Sender<PlaybackEvent>,
    tick: Duration,
) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let dt = tick.as_secs_f64();
    loop {
        interval.tick().await;
        let mut emits: Vec<PlaybackEvent> = Vec::new();
        {
            let mut st = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if !st.playing || st.source.is_none() {
                continue;
            }
            match st.duration {
                Some(duration) => {
                    st.position += st.rate * dt;
                    if *started_tx.borrow() < st.generation {
                        let _ = started_tx.send(st.generation);
                    }
                    if st.position >= duration {
                        emits.push(PlaybackEvent::Ended { surface: id });
                        // Looping transport: wrap instead of sticking at the end.
                        st.position %= duration;
                    }
                    emits.push(PlaybackEvent::Progress {
                        surface: id,
                        position: st.position,
                        duration: Some(duration),
                    });
                }
                None => {
                    if st.error_reported < st.generation {
                        st.error_reported = st.generation;
                        emits.push(PlaybackEvent::Error {
                            surface: id,
                            detail: "source never became decodable".to_string(),
                        });
                    }
                }
            }
        }
        for event in emits {
            if events.send(event).await.is_err() {
                return;
            }
        }
    }
}

impl Surface for SimSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn load(&mut self, address: &str) {
        let duration = if self.options.unplayable.contains(address) {
            None
        } else {
            Some(
                self.options
                    .durations
                    .get(address)
                    .copied()
                    .unwrap_or(self.options.default_duration),
            )
        };
        let mut st = self.lock();
        st.source = Some(address.to_string());
        st.position = 0.0;
        st.duration = duration;
        st.generation += 1;
        trace!(surface = %self.id, address, generation = st.generation, "sim load");
    }

    fn play(&mut self) {
        self.lock().playing = true;
    }

    fn pause(&mut self) {
        self.lock().playing = false;
    }

    fn is_paused(&self) -> bool {
        !self.lock().playing
    }

    fn set_rate(&mut self, rate: f64) {
        self.lock().rate = rate;
    }

    fn set_position(&mut self, seconds: f64) {
        let mut st = self.lock();
        let ceiling = st.duration.unwrap_or(seconds);
        st.position = seconds.clamp(0.0, ceiling.max(0.0));
    }

    fn position(&self) -> f64 {
        self.lock().position
    }

    fn duration(&self) -> Option<f64> {
        self.lock().duration
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.lock().opacity = opacity.clamp(0.0, 1.0);
    }

    fn opacity(&self) -> f32 {
        self.lock().opacity
    }

    fn begin_fade(&mut self, target: f32, _over: Duration) {
        // The simulated compositor has no easing; it lands on the target at
        // once, which satisfies the reach-target-within-duration contract.
        self.set_opacity(target);
    }

    fn first_progress(&mut self) -> impl Future<Output = ()> + Send {
        let generation = self.lock().generation;
        let mut started = self.started_rx.clone();
        async move {
            loop {
                if *started.borrow() >= generation {
                    return;
                }
                if started.changed().await.is_err() {
                    // Driver gone; let the caller's timeout decide.
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}
