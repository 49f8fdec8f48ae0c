//! Dual-surface player.
//!
//! Owns the two playback surfaces and the single authoritative role flip.
//! A transition always loads the incoming clip into the idle surface first,
//! performs the configured visual handoff, pauses the outgoing surface and
//! only then swaps roles, so observers never see two active surfaces.

use crate::library::Clip;
use crate::session::{Session, SurfaceId, TransitionStyle};
use crate::surface::Surface;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Outcome of loading a clip into a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The surface reported decodable progress.
    Ready,
    /// No progress within the bounded wait; the transition proceeds and the
    /// caller is expected to rotate again.
    Stalled,
}

#[derive(Debug, Clone)]
pub struct PlayerOptions {
    /// Bounded wait for decodable progress after a load.
    pub first_progress_timeout: Duration,
    /// Optional pause between loading the next clip and starting the
    /// visual handoff.
    pub inter_clip_delay: Duration,
}

/// Position clamp applied when parking a surface on its final frame, so a
/// looping transport cannot wrap back to zero.
pub const END_CLAMP_SECS: f64 = 0.01;

pub struct DualPlayer<S: Surface> {
    a: S,
    b: S,
    options: PlayerOptions,
}

impl<S: Surface> DualPlayer<S> {
    /// Both surfaces start hidden; the session decides which role is active.
    pub fn new(mut a: S, mut b: S, options: PlayerOptions) -> Self {
        debug_assert_eq!(a.id(), SurfaceId::A);
        debug_assert_eq!(b.id(), SurfaceId::B);
        a.set_opacity(0.0);
        b.set_opacity(0.0);
        Self { a, b, options }
    }

    pub fn surface(&self, id: SurfaceId) -> &S {
        match id {
            SurfaceId::A => &self.a,
            SurfaceId::B => &self.b,
        }
    }

    fn surface_mut(&mut self, id: SurfaceId) -> &mut S {
        match id {
            SurfaceId::A => &mut self.a,
            SurfaceId::B => &mut self.b,
        }
    }

    pub fn active<'a>(&'a self, session: &Session) -> &'a S {
        self.surface(session.active)
    }

    pub fn active_mut<'a>(&'a mut self, session: &Session) -> &'a mut S {
        self.surface_mut(session.active)
    }

    /// Park the active surface on its last frame.
    pub fn hold_active_at_end(&mut self, session: &Session) {
        let surface = self.surface_mut(session.active);
        surface.pause();
        if let Some(duration) = surface.duration() {
            surface.set_position((duration - END_CLAMP_SECS).max(0.0));
        }
    }

    /// Load `clip` into the idle surface and wait (bounded) for it to become
    /// decodable. `exiting` is cleared here, the instant the new clip begins
    /// loading, which stops a fast observer from re-arming the end watcher
    /// against the outgoing surface.
    async fn load_into_idle(&mut self, clip: &Clip, session: &mut Session) -> LoadOutcome {
        session.exiting = false;
        session.rate = 1.0;
        let timeout_window = self.options.first_progress_timeout;
        let idle = self.surface_mut(session.active.other());
        idle.load(&clip.address);
        idle.set_rate(session.rate);
        idle.play();
        match timeout(timeout_window, idle.first_progress()).await {
            Ok(()) => LoadOutcome::Ready,
            Err(_) => {
                warn!(clip = %clip.title, surface = %session.active.other(), "no decodable progress; proceeding stalled");
                LoadOutcome::Stalled
            }
        }
    }

    /// Hand the screen to `clip`: load into idle, optional inter-clip delay,
    /// visual handoff per the session's style, then pause the outgoing
    /// surface and flip roles.
    pub async fn transition(&mut self, clip: &Clip, session: &mut Session) -> LoadOutcome {
        let outcome = self.load_into_idle(clip, session).await;

        if !self.options.inter_clip_delay.is_zero() {
            sleep(self.options.inter_clip_delay).await;
        }

        let fade = session.fade;
        let incoming = session.active.other();
        let outgoing = session.active;
        match session.style {
            TransitionStyle::Crossfade => {
                self.surface_mut(incoming).begin_fade(1.0, fade);
                self.surface_mut(outgoing).begin_fade(0.0, fade);
                sleep(fade).await;
            }
            TransitionStyle::Fade => {
                let half = fade / 2;
                self.surface_mut(outgoing).begin_fade(0.0, half);
                sleep(half).await;
                self.surface_mut(incoming).set_opacity(1.0);
            }
            TransitionStyle::Cut => {
                self.surface_mut(incoming).set_opacity(1.0);
                self.surface_mut(outgoing).set_opacity(0.0);
            }
        }

        // Settle the post-transition invariant regardless of style: exactly
        // one visible surface, the hidden one paused.
        let hidden = self.surface_mut(outgoing);
        hidden.set_opacity(0.0);
        hidden.pause();
        self.surface_mut(incoming).set_opacity(1.0);
        session.active = incoming;
        debug!(clip = %clip.title, surface = %incoming, style = %session.style, "transition complete");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PlaybackEvent;
    use crate::orient::Orientation;
    use crate::session::Session;
    use crate::settings::Settings;
    use crate::surface::{SimOptions, SimSurface};
    use std::collections::HashMap;
    use tokio::sync::mpsc;

    fn clip(address: &str) -> Clip {
        Clip {
            address: address.to_string(),
            title: address.to_string(),
            width: 1920,
            height: 1080,
            orientation: Orientation::Landscape,
        }
    }

    fn player_with(
        options: SimOptions,
    ) -> (DualPlayer<SimSurface>, mpsc::Receiver<PlaybackEvent>) {
        let (tx, rx) = mpsc::channel(256);
        let a = SimSurface::new(SurfaceId::A, options.clone(), tx.clone());
        let b = SimSurface::new(SurfaceId::B, options, tx);
        let player = DualPlayer::new(
            a,
            b,
            PlayerOptions {
                first_progress_timeout: Duration::from_secs(5),
                inter_clip_delay: Duration::ZERO,
            },
        );
        (player, rx)
    }

    fn session(style: TransitionStyle) -> Session {
        let mut session = Session::new(&Settings::default());
        session.style = style;
        session.fade = Duration::from_millis(400);
        session
    }

    fn assert_handoff_invariant(player: &DualPlayer<SimSurface>, session: &Session) {
        let active = player.surface(session.active);
        let idle = player.surface(session.active.other());
        assert_eq!(active.opacity(), 1.0);
        assert!(!active.is_paused());
        assert_eq!(idle.opacity(), 0.0);
        assert!(idle.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn crossfade_swaps_roles_and_settles_opacities() {
        let (mut player, _rx) = player_with(SimOptions::default());
        let mut session = session(TransitionStyle::Crossfade);
        assert_eq!(session.active, SurfaceId::A);

        let outcome = player.transition(&clip("one.mp4"), &mut session).await;
        assert_eq!(outcome, LoadOutcome::Ready);
        assert_eq!(session.active, SurfaceId::B);
        assert_handoff_invariant(&player, &session);

        let outcome = player.transition(&clip("two.mp4"), &mut session).await;
        assert_eq!(outcome, LoadOutcome::Ready);
        assert_eq!(session.active, SurfaceId::A);
        assert_handoff_invariant(&player, &session);
    }

    #[tokio::test(start_paused = true)]
    async fn cut_and_fade_styles_satisfy_the_same_invariant() {
        for style in [TransitionStyle::Cut, TransitionStyle::Fade] {
            let (mut player, _rx) = player_with(SimOptions::default());
            let mut session = session(style);
            player.transition(&clip("one.mp4"), &mut session).await;
            assert_handoff_invariant(&player, &session);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn loading_clears_exiting_and_resets_rate() {
        let (mut player, _rx) = player_with(SimOptions::default());
        let mut session = session(TransitionStyle::Cut);
        session.exiting = true;
        session.rate = 0.5;
        player.transition(&clip("one.mp4"), &mut session).await;
        assert!(!session.exiting);
        assert_eq!(session.rate, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn unplayable_clip_stalls_but_transition_completes() {
        let mut options = SimOptions::default();
        options.unplayable.insert("bad.mp4".to_string());
        let (mut player, _rx) = player_with(options);
        let mut session = session(TransitionStyle::Crossfade);

        let outcome = player.transition(&clip("bad.mp4"), &mut session).await;
        assert_eq!(outcome, LoadOutcome::Stalled);
        assert_eq!(session.active, SurfaceId::B);
    }

    #[tokio::test(start_paused = true)]
    async fn hold_parks_near_the_end() {
        let mut options = SimOptions::default();
        options.durations = HashMap::from([("one.mp4".to_string(), 5.0)]);
        let (mut player, _rx) = player_with(options);
        let mut session = session(TransitionStyle::Cut);
        player.transition(&clip("one.mp4"), &mut session).await;

        player.hold_active_at_end(&session);
        let active = player.surface(session.active);
        assert!(active.is_paused());
        assert!(active.position() > 4.9 && active.position() < 5.0);
    }
}
