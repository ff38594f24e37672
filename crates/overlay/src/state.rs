use std::sync::Arc;

use foundation::geom::ScreenPoint;
use metadata::descriptor::Descriptor;
use picking::registry::Entity;
use serde::Serialize;

use crate::placement::Placement;

/// Where an overlay points (`point`) and where its box goes (`placement`).
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Anchor {
    pub point: ScreenPoint,
    pub placement: Placement,
}

/// Metadata shown inside the overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Details {
    Loading,
    Ready(Arc<Descriptor>),
    /// The lookup failed; the overlay renders a "no data" fallback.
    Unavailable(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Mode {
    Idle,
    Hovering,
    Pinned,
}

/// The single overlay the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum OverlayState {
    #[default]
    Idle,
    /// Transient tooltip following the hovered entity.
    Hovering {
        entity: Entity,
        anchor: Anchor,
        details: Details,
    },
    /// Persistent detail panel; stays until closed or replaced by another pin.
    Pinned {
        entity: Entity,
        anchor: Anchor,
        details: Details,
    },
}

impl OverlayState {
    pub fn mode(&self) -> Mode {
        match self {
            OverlayState::Idle => Mode::Idle,
            OverlayState::Hovering { .. } => Mode::Hovering,
            OverlayState::Pinned { .. } => Mode::Pinned,
        }
    }

    pub fn is_pinned(&self) -> bool {
        matches!(self, OverlayState::Pinned { .. })
    }

    pub fn entity(&self) -> Option<&Entity> {
        match self {
            OverlayState::Idle => None,
            OverlayState::Hovering { entity, .. } | OverlayState::Pinned { entity, .. } => {
                Some(entity)
            }
        }
    }

    pub fn anchor(&self) -> Option<&Anchor> {
        match self {
            OverlayState::Idle => None,
            OverlayState::Hovering { anchor, .. } | OverlayState::Pinned { anchor, .. } => {
                Some(anchor)
            }
        }
    }

    pub fn details(&self) -> Option<&Details> {
        match self {
            OverlayState::Idle => None,
            OverlayState::Hovering { details, .. } | OverlayState::Pinned { details, .. } => {
                Some(details)
            }
        }
    }

    pub(crate) fn anchor_mut(&mut self) -> Option<&mut Anchor> {
        match self {
            OverlayState::Idle => None,
            OverlayState::Hovering { anchor, .. } | OverlayState::Pinned { anchor, .. } => {
                Some(anchor)
            }
        }
    }

    pub(crate) fn details_mut(&mut self) -> Option<&mut Details> {
        match self {
            OverlayState::Idle => None,
            OverlayState::Hovering { details, .. } | OverlayState::Pinned { details, .. } => {
                Some(details)
            }
        }
    }
}
