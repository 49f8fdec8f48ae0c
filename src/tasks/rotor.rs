//! Rotation controller: the single entry point that keeps playback moving.
//!
//! One `select!` loop owns the player, the bucket index, the session and the
//! end-of-clip watcher, and consumes surface events, user intents and its own
//! timer deadlines. Every rotation funnels through `rotate`, and rotations
//! serialize through the loop body, so two transitions can never race onto
//! the same idle surface.

use crate::config::Configuration;
use crate::events::{ControlEvent, Displayed, PlaybackEvent};
use crate::library::{BucketIndex, Clip};
use crate::orient::{Orientation, classify};
use crate::player::{DualPlayer, LoadOutcome};
use crate::session::Session;
use crate::settings::SettingsStore;
use crate::surface::Surface;
use crate::watcher::{Action, EndWatcher};
use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drive the rotation loop until cancellation.
///
/// An empty library is not an error; the loop idles until told otherwise.
#[allow(clippy::too_many_arguments)]
pub async fn run<S: Surface>(
    player: DualPlayer<S>,
    index: BucketIndex,
    session: Session,
    cfg: Configuration,
    settings: SettingsStore,
    mut control_rx: Receiver<ControlEvent>,
    mut playback_rx: Receiver<PlaybackEvent>,
    displayed_tx: Sender<Displayed>,
    cancel: CancellationToken,
    seed: Option<u64>,
) -> Result<()> {
    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let screen = (cfg.screen_width, cfg.screen_height);
    let screen_orientation = classify(screen.0, screen.1, cfg.square_tolerance);
    let mut rotor = Rotor {
        watcher: EndWatcher::new(cfg.watcher_tuning()),
        player,
        index,
        session,
        settings,
        displayed_tx,
        cancel: cancel.clone(),
        rng,
        screen,
        screen_orientation,
        resize_settle: cfg.resize_settle,
        square_tolerance: cfg.square_tolerance,
        decel_deadline: None,
        resize_deadline: None,
        overlay_visible: false,
        fullscreen: false,
    };

    info!(
        clips = rotor.index.len(),
        orientation = %rotor.screen_orientation,
        "rotation loop starting"
    );
    rotor.rotate().await;

    loop {
        select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting rotation loop");
                break;
            }

            maybe_event = playback_rx.recv() => {
                match maybe_event {
                    Some(event) => rotor.handle_playback(event).await,
                    None => {
                        warn!("surface event channel closed");
                        break;
                    }
                }
            }

            maybe_intent = control_rx.recv() => {
                match maybe_intent {
                    Some(intent) => rotor.handle_control(intent).await,
                    None => {
                        // Control producers ended; playback carries on.
                        debug!("control channel closed");
                    }
                }
            }

            // Deceleration ramp tick, armed only while a clip is exiting.
            _ = sleep_until(rotor.decel_deadline.unwrap_or_else(Instant::now)),
                if rotor.decel_deadline.is_some() =>
            {
                rotor.on_decel_tick().await;
            }

            // Resize settle: viewport changes debounce before re-evaluating.
            _ = sleep_until(rotor.resize_deadline.unwrap_or_else(Instant::now)),
                if rotor.resize_deadline.is_some() =>
            {
                rotor.on_resize_settle().await;
            }
        }
    }

    Ok(())
}

struct Rotor<S: Surface> {
    watcher: EndWatcher,
    player: DualPlayer<S>,
    index: BucketIndex,
    session: Session,
    settings: SettingsStore,
    displayed_tx: Sender<Displayed>,
    cancel: CancellationToken,
    rng: StdRng,
    screen: (u32, u32),
    screen_orientation: Orientation,
    resize_settle: Duration,
    square_tolerance: f64,
    decel_deadline: Option<Instant>,
    resize_deadline: Option<Instant>,
    overlay_visible: bool,
    fullscreen: bool,
}

impl<S: Surface> Rotor<S> {
    /// Pick the next clip for the current screen orientation and hand it the
    /// screen. Loops while loads stall so a dead clip cannot end playback;
    /// each lap is bounded by the first-progress timeout.
    async fn rotate(&mut self) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            let Some(clip) = self
                .index
                .pick_for_screen(self.screen_orientation, &mut self.rng)
            else {
                info!("clip library is empty; nothing to rotate to");
                return;
            };
            // Any ramp on the outgoing clip is obsolete the moment the next
            // load begins.
            self.decel_deadline = None;
            let outcome = self.player.transition(&clip, &mut self.session).await;
            self.watcher.clip_started();
            match outcome {
                LoadOutcome::Ready => {
                    info!(
                        clip = %clip.title,
                        orientation = %clip.orientation,
                        surface = %self.session.active,
                        "now playing"
                    );
                    let _ = self.displayed_tx.send(Displayed(Arc::clone(&clip))).await;
                    return;
                }
                LoadOutcome::Stalled => {
                    warn!(clip = %clip.title, "clip never became decodable; rotating on");
                }
            }
        }
    }

    async fn handle_playback(&mut self, event: PlaybackEvent) {
        let action = match event {
            PlaybackEvent::Progress {
                surface,
                position,
                duration,
            } => self
                .watcher
                .observe_progress(&mut self.session, surface, position, duration),
            PlaybackEvent::Ended { surface } => {
                self.watcher.observe_ended(&mut self.session, surface)
            }
            PlaybackEvent::Error { surface, detail } => {
                let action = self.watcher.observe_error(&mut self.session, surface);
                if action != Action::None {
                    warn!(%surface, detail, "active surface errored");
                }
                action
            }
        };
        self.apply(action).await;
    }

    async fn on_decel_tick(&mut self) {
        self.decel_deadline = None;
        let (position, duration) = {
            let active = self.player.active(&self.session);
            (active.position(), active.duration())
        };
        let action = self.watcher.on_tick(&mut self.session, position, duration);
        self.apply(action).await;
    }

    async fn apply(&mut self, action: Action) {
        match action {
            Action::None => {}
            Action::BeginRamp { rate } => {
                debug!(rate, "end of clip approaching; ramping down");
                self.player.active_mut(&self.session).set_rate(rate);
                self.arm_decel_tick();
            }
            Action::SetRate { rate } => {
                self.player.active_mut(&self.session).set_rate(rate);
                self.arm_decel_tick();
            }
            Action::Finish { honor_hold } => {
                self.decel_deadline = None;
                self.player.hold_active_at_end(&self.session);
                if honor_hold && self.session.hold_enabled && !self.session.hold.is_zero() {
                    debug!(hold = ?self.session.hold, "holding last frame");
                    sleep(self.session.hold).await;
                }
                self.rotate().await;
            }
        }
    }

    fn arm_decel_tick(&mut self) {
        self.decel_deadline = Some(Instant::now() + self.watcher.tick_interval());
    }

    async fn handle_control(&mut self, intent: ControlEvent) {
        match intent {
            ControlEvent::NextClip => {
                info!("manual next-clip request");
                self.rotate().await;
            }
            ControlEvent::ToggleOverlay => {
                self.overlay_visible = !self.overlay_visible;
                info!(visible = self.overlay_visible, "admin overlay toggled");
            }
            ControlEvent::ToggleFullscreen => {
                self.fullscreen = !self.fullscreen;
                info!(fullscreen = self.fullscreen, "fullscreen toggled");
            }
            ControlEvent::SetHoldMillis(ms) => {
                self.session.hold = Duration::from_millis(ms);
                self.persist(|s| s.hold_ms = ms);
            }
            ControlEvent::SetFadeMillis(ms) => {
                self.session.fade = Duration::from_millis(ms);
                self.persist(|s| s.fade_ms = ms);
            }
            ControlEvent::SetHoldEnabled(enabled) => {
                self.session.hold_enabled = enabled;
                self.persist(|s| s.hold_enabled = enabled);
            }
            ControlEvent::SetTransition(style) => {
                self.session.style = style;
                self.persist(|s| s.transition = style);
            }
            ControlEvent::ScreenResized { width, height } => {
                self.screen = (width, height);
                self.resize_deadline = Some(Instant::now() + self.resize_settle);
            }
        }
    }

    fn persist(&mut self, apply: impl FnOnce(&mut crate::settings::Settings)) {
        if let Err(err) = self.settings.update(apply) {
            warn!(error = %err, "failed to persist settings; continuing");
        }
    }

    async fn on_resize_settle(&mut self) {
        self.resize_deadline = None;
        let orientation = classify(self.screen.0, self.screen.1, self.square_tolerance);
        if orientation != self.screen_orientation {
            info!(
                width = self.screen.0,
                height = self.screen.1,
                %orientation,
                "screen orientation changed; rotating"
            );
            self.screen_orientation = orientation;
            self.rotate().await;
        } else {
            debug!(width = self.screen.0, height = self.screen.1, "resize settled; same orientation");
        }
    }
}

/// Deterministic rotation plan for the `--plan` dry run: which clips would
/// play, in order, for a fixed screen.
pub fn simulate_rotation(
    clips: Vec<Clip>,
    screen: (u32, u32),
    square_tolerance: f64,
    iterations: usize,
    seed: Option<u64>,
) -> Vec<Arc<Clip>> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut index = BucketIndex::build(clips);
    let orientation = classify(screen.0, screen.1, square_tolerance);
    let mut plan = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        match index.pick_for_screen(orientation, &mut rng) {
            Some(clip) => plan.push(clip),
            None => break,
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orient::{DEFAULT_SQUARE_TOLERANCE, classify};

    fn clip(address: &str, width: u32, height: u32) -> Clip {
        Clip {
            address: address.to_string(),
            title: address.to_string(),
            width,
            height,
            orientation: classify(width, height, DEFAULT_SQUARE_TOLERANCE),
        }
    }

    #[test]
    fn plan_prefers_the_matching_bucket() {
        let plan = simulate_rotation(
            vec![clip("wide.mp4", 1920, 1080), clip("tall.mp4", 1080, 1920)],
            (1920, 1080),
            DEFAULT_SQUARE_TOLERANCE,
            6,
            Some(7),
        );
        assert_eq!(plan.len(), 6);
        assert!(plan.iter().all(|c| c.address == "wide.mp4"));
    }

    #[test]
    fn plan_is_reproducible_under_a_seed() {
        let clips = || {
            vec![
                clip("a.mp4", 1920, 1080),
                clip("b.mp4", 1280, 720),
                clip("c.mp4", 2560, 1440),
            ]
        };
        let first = simulate_rotation(clips(), (1920, 1080), DEFAULT_SQUARE_TOLERANCE, 24, Some(3));
        let second =
            simulate_rotation(clips(), (1920, 1080), DEFAULT_SQUARE_TOLERANCE, 24, Some(3));
        let first: Vec<_> = first.iter().map(|c| c.address.clone()).collect();
        let second: Vec<_> = second.iter().map(|c| c.address.clone()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn plan_on_empty_library_is_empty() {
        let plan = simulate_rotation(Vec::new(), (1920, 1080), DEFAULT_SQUARE_TOLERANCE, 4, Some(1));
        assert!(plan.is_empty());
    }
}
