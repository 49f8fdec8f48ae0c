//! Shared playback-session state.
//!
//! The session is the one blob of mutable state the watcher, player and
//! rotation controller agree on. It is passed explicitly; nothing reads it
//! from ambient scope.

use crate::settings::Settings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Stable identity of the two playback surfaces.
///
/// Which one is visible is tracked by `Session::active` and flipped only by
/// the player's swap; the ids themselves never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceId {
    A,
    B,
}

impl SurfaceId {
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::B => f.write_str("B"),
        }
    }
}

/// Visual style used when handing the screen from one clip to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionStyle {
    /// Both surfaces fade simultaneously over the full fade duration.
    Crossfade,
    /// Outgoing fades over half the duration, then the incoming snaps
    /// visible. Asymmetric on purpose; it reads as a fade-through.
    Fade,
    /// Instantaneous swap.
    Cut,
}

impl TransitionStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crossfade => "crossfade",
            Self::Fade => "fade",
            Self::Cut => "cut",
        }
    }
}

impl fmt::Display for TransitionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable state of one playback rotation session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Which surface is currently visible.
    pub active: SurfaceId,
    /// Playback rate applied to the active surface.
    pub rate: f64,
    /// True from end-approach detection until the next clip begins loading.
    pub exiting: bool,
    pub style: TransitionStyle,
    pub hold_enabled: bool,
    /// Pause on the final frame before advancing.
    pub hold: Duration,
    /// Duration of crossfade/fade transitions.
    pub fade: Duration,
}

impl Session {
    /// Fresh session; surface A starts out visible.
    pub fn new(settings: &Settings) -> Self {
        Self {
            active: SurfaceId::A,
            rate: 1.0,
            exiting: false,
            style: settings.transition,
            hold_enabled: settings.hold_enabled,
            hold: Duration::from_millis(settings.hold_ms),
            fade: Duration::from_millis(settings.fade_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_ids_alternate() {
        assert_eq!(SurfaceId::A.other(), SurfaceId::B);
        assert_eq!(SurfaceId::B.other(), SurfaceId::A);
        assert_eq!(SurfaceId::A.other().other(), SurfaceId::A);
    }

    #[test]
    fn session_starts_calm() {
        let session = Session::new(&Settings::default());
        assert_eq!(session.active, SurfaceId::A);
        assert!(!session.exiting);
        assert_eq!(session.rate, 1.0);
    }
}
