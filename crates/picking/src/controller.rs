use std::sync::Arc;

use foundation::geom::ScreenPoint;
use foundation::ids::EntityKey;
use foundation::time::Millis;
use runtime::throttle::Throttle;
use tracing::{debug, trace};

use crate::registry::{Entity, EntityRegistry};
use crate::renderer::Renderer;

/// Default pick interval: one pick per ~60 Hz frame.
pub const DEFAULT_PICK_INTERVAL_MS: u64 = 16;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointerSample {
    pub at: ScreenPoint,
    pub timestamp: Millis,
}

/// Normalized interaction intent derived from raw pointer input.
#[derive(Debug, Clone, PartialEq)]
pub enum PickIntent {
    /// The entity under the cursor changed (`None`: nothing under the cursor).
    /// `at` is the pointer position the pick was made at.
    HoverChanged { entity: Option<Entity>, at: ScreenPoint },
    PinRequested { entity: Entity, at: ScreenPoint },
}

/// Turns raw pointer/click events into [`PickIntent`]s.
///
/// - Pointer moves are throttled to one pick per interval, collapsing bursts to
///   the latest sample. A sample parked by the throttle is released by
///   [`PickController::tick`].
/// - Clicks are never throttled.
/// - Until [`PickController::set_ready`] is called, all input is ignored.
/// - `pinned` suppresses hover picking entirely.
#[derive(Debug)]
pub struct PickController {
    registry: Arc<EntityRegistry>,
    throttle: Throttle<PointerSample>,
    ready: bool,
    hovered: Option<EntityKey>,
    picks: u64,
}

impl PickController {
    pub fn new(registry: Arc<EntityRegistry>, interval_ms: u64) -> Self {
        Self {
            registry,
            throttle: Throttle::new(interval_ms),
            ready: false,
            hovered: None,
            picks: 0,
        }
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn set_ready(&mut self) {
        if !self.ready {
            debug!("renderer ready; accepting pointer input");
        }
        self.ready = true;
    }

    /// Key of the entity the last hover pick resolved to.
    pub fn hovered(&self) -> Option<&EntityKey> {
        self.hovered.as_ref()
    }

    /// Forgets the hovered entity so the next hover pick reports a change even
    /// if it lands on the same entity again.
    pub fn clear_hover(&mut self) {
        self.hovered = None;
    }

    /// Number of renderer picks performed so far (hover and click).
    pub fn pick_count(&self) -> u64 {
        self.picks
    }

    pub fn has_pending_sample(&self) -> bool {
        self.throttle.has_pending()
    }

    pub fn handle_pointer_move<R: Renderer>(
        &mut self,
        renderer: &R,
        sample: PointerSample,
        pinned: bool,
    ) -> Option<PickIntent> {
        if !self.ready {
            return None;
        }
        if pinned {
            self.throttle.cancel();
            return None;
        }
        let sample = self.throttle.offer(sample.timestamp, sample)?;
        self.hover_pick(renderer, sample.at)
    }

    /// Releases a collapsed pointer sample whose throttle window has elapsed.
    pub fn tick<R: Renderer>(&mut self, renderer: &R, now: Millis, pinned: bool) -> Option<PickIntent> {
        if !self.ready {
            return None;
        }
        if pinned {
            self.throttle.cancel();
            return None;
        }
        let sample = self.throttle.poll(now)?;
        self.hover_pick(renderer, sample.at)
    }

    /// Picks at the click position.
    ///
    /// A hit always yields `PinRequested`, whatever the current mode. A miss is
    /// a no-op: dismissing a pin takes an explicit close.
    pub fn handle_click<R: Renderer>(&mut self, renderer: &R, at: ScreenPoint) -> Option<PickIntent> {
        if !self.ready {
            return None;
        }
        let entity = self.pick_entity(renderer, at)?;
        // The click outranks any hover sample still parked for this frame.
        self.throttle.cancel();
        self.hovered = None;
        Some(PickIntent::PinRequested { entity, at })
    }

    fn hover_pick<R: Renderer>(&mut self, renderer: &R, at: ScreenPoint) -> Option<PickIntent> {
        let entity = self.pick_entity(renderer, at);
        let key = entity.as_ref().map(|e| e.key.clone());
        if key == self.hovered {
            return None;
        }
        trace!(from = ?self.hovered, to = ?key, "hover changed");
        self.hovered = key;
        Some(PickIntent::HoverChanged { entity, at })
    }

    fn pick_entity<R: Renderer>(&mut self, renderer: &R, at: ScreenPoint) -> Option<Entity> {
        self.picks += 1;
        let label = match renderer.pick(at) {
            Ok(label) => label?,
            Err(err) => {
                trace!(%err, "pick failed; treating as empty");
                return None;
            }
        };
        let entity = self.registry.resolve(&label);
        if entity.is_none() {
            debug!(label = %label, "renderer returned an unknown entity");
        }
        entity.cloned()
    }
}
