use crate::library::Clip;
use crate::session::{SurfaceId, TransitionStyle};
use std::sync::Arc;

/// Transport-level signals emitted by the playback surfaces.
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    /// Decodable progress on a surface. `duration` is unknown until the
    /// backend has parsed enough of the media.
    Progress {
        surface: SurfaceId,
        position: f64,
        duration: Option<f64>,
    },
    /// The surface ran out of media.
    Ended { surface: SurfaceId },
    /// The surface failed to start or errored mid-play.
    Error { surface: SurfaceId, detail: String },
}

impl PlaybackEvent {
    pub fn surface(&self) -> SurfaceId {
        match self {
            Self::Progress { surface, .. }
            | Self::Ended { surface }
            | Self::Error { surface, .. } => *surface,
        }
    }
}

/// User intents and environment signals consumed by the rotation controller.
#[derive(Debug, Clone)]
pub enum ControlEvent {
    NextClip,
    ToggleOverlay,
    ToggleFullscreen,
    SetHoldMillis(u64),
    SetFadeMillis(u64),
    SetHoldEnabled(bool),
    SetTransition(TransitionStyle),
    ScreenResized { width: u32, height: u32 },
}

/// Emitted after a clip has been handed the screen.
#[derive(Debug, Clone)]
pub struct Displayed(pub Arc<Clip>);
