use foundation::geom::{Extent, ScreenPoint};
use foundation::ids::EntityKey;
use picking::registry::Entity;
use tracing::{debug, trace};

use crate::config::OverlayConfig;
use crate::placement::{PlacementRules, place};
use crate::state::{Anchor, Details, OverlayState};

/// Transition counter. Async results captured under an older generation are
/// discarded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DetailsUpdate {
    Applied,
    /// The generation or entity no longer matches; nothing changed.
    Stale,
}

/// Owns the single [`OverlayState`] and its generation counter.
///
/// Transitions:
/// - `Idle -> Hovering` on a hover with an entity.
/// - `Hovering -> Idle` on a hover with no entity.
/// - `Hovering(a) -> Hovering(b)` on a hover with a different entity.
/// - `any -> Pinned` on a pin request.
/// - `Pinned -> Idle` on close.
///
/// Every transition bumps the generation. Hovers are not consumed while
/// pinned, and hovering the current entity again is a no-op. Details updates
/// and anchor moves change the snapshot without a transition.
#[derive(Debug, Clone)]
pub struct OverlayStateMachine {
    state: OverlayState,
    generation: Generation,
    viewport: Extent,
    rules: PlacementRules,
    hover_box: Extent,
    pinned_box: Extent,
}

impl OverlayStateMachine {
    pub fn new(config: &OverlayConfig) -> Self {
        Self {
            state: OverlayState::Idle,
            generation: Generation::default(),
            viewport: config.viewport.sanitized(),
            rules: config.placement,
            hover_box: config.hover_box,
            pinned_box: config.pinned_box,
        }
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn viewport(&self) -> Extent {
        self.viewport
    }

    /// Applies a hover change. `target` carries the hovered entity and the
    /// screen point its anchor is placed from.
    ///
    /// Returns the new generation when a transition happened.
    pub fn hover_changed(&mut self, target: Option<(Entity, ScreenPoint)>) -> Option<Generation> {
        if self.state.is_pinned() {
            trace!("hover ignored while pinned");
            return None;
        }
        match target {
            None => {
                if matches!(self.state, OverlayState::Idle) {
                    return None;
                }
                Some(self.transition(OverlayState::Idle))
            }
            Some((entity, point)) => {
                if self.state.entity().is_some_and(|current| current.key == entity.key) {
                    return None;
                }
                let anchor = self.anchor_for(point, self.hover_box);
                Some(self.transition(OverlayState::Hovering {
                    entity,
                    anchor,
                    details: Details::Loading,
                }))
            }
        }
    }

    /// Pins `entity` with its panel anchored at the click point. Accepted from
    /// every state, including pinning the already pinned entity again.
    pub fn pin(&mut self, entity: Entity, at: ScreenPoint) -> Generation {
        let anchor = self.anchor_for(at, self.pinned_box);
        self.transition(OverlayState::Pinned {
            entity,
            anchor,
            details: Details::Loading,
        })
    }

    /// Closes the pinned panel. Only a pinned overlay can be closed.
    pub fn close(&mut self) -> Option<Generation> {
        if !self.state.is_pinned() {
            trace!("close ignored; no pinned panel");
            return None;
        }
        Some(self.transition(OverlayState::Idle))
    }

    /// Stores metadata for the active entity if the request that produced it
    /// still belongs to the current generation.
    pub fn apply_details(
        &mut self,
        generation: Generation,
        key: &EntityKey,
        details: Details,
    ) -> DetailsUpdate {
        if generation != self.generation {
            debug!(
                %key,
                captured = generation.0,
                current = self.generation.0,
                "discarding stale metadata"
            );
            return DetailsUpdate::Stale;
        }
        if self.state.entity().is_none_or(|entity| entity.key != *key) {
            debug!(%key, "discarding metadata for an inactive entity");
            return DetailsUpdate::Stale;
        }
        match self.state.details_mut() {
            Some(slot) => {
                *slot = details;
                DetailsUpdate::Applied
            }
            None => DetailsUpdate::Stale,
        }
    }

    /// Moves the hovering anchor to `point`. Pinned panels stay where they
    /// were clicked. Returns whether the snapshot changed.
    pub fn reanchor(&mut self, point: ScreenPoint) -> bool {
        if !matches!(self.state, OverlayState::Hovering { .. }) {
            return false;
        }
        let anchor = self.anchor_for(point, self.hover_box);
        self.replace_anchor(anchor)
    }

    /// Records a new viewport size and re-places the active overlay.
    pub fn set_viewport(&mut self, viewport: Extent) -> bool {
        let viewport = viewport.sanitized();
        if viewport == self.viewport {
            return false;
        }
        debug!(w = viewport.w, h = viewport.h, "viewport resized");
        self.viewport = viewport;

        let (point, size) = match &self.state {
            OverlayState::Idle => return false,
            OverlayState::Hovering { anchor, .. } => (anchor.point, self.hover_box),
            OverlayState::Pinned { anchor, .. } => (anchor.point, self.pinned_box),
        };
        let anchor = self.anchor_for(point, size);
        self.replace_anchor(anchor)
    }

    fn anchor_for(&self, point: ScreenPoint, size: Extent) -> Anchor {
        Anchor {
            point,
            placement: place(point, self.viewport, size, &self.rules),
        }
    }

    fn replace_anchor(&mut self, anchor: Anchor) -> bool {
        match self.state.anchor_mut() {
            Some(current) if *current != anchor => {
                *current = anchor;
                true
            }
            _ => false,
        }
    }

    fn transition(&mut self, next: OverlayState) -> Generation {
        let from = self.state.mode();
        self.state = next;
        self.generation = self.generation.next();
        debug!(
            ?from,
            to = ?self.state.mode(),
            entity = self.state.entity().map(|e| e.key.as_str()),
            generation = self.generation.0,
            "overlay transition"
        );
        self.generation
    }
}
