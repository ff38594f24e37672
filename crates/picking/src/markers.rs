use foundation::geom::{Extent, ScreenPoint};
use foundation::ids::EntityKey;
use serde::Deserialize;

use crate::renderer::{PickError, Renderer};

/// A circular hit target drawn over the globe.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Marker {
    pub key: EntityKey,
    /// What the scene reports when this marker is picked.
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl Marker {
    pub fn center(&self) -> ScreenPoint {
        ScreenPoint::new(self.x, self.y)
    }
}

/// Screen-space marker layer that implements the renderer picking surface.
///
/// Used by the probe tool to replay recorded sessions without a GPU scene, and
/// by tests as a deterministic renderer.
///
/// Ordering contract:
/// - The marker whose center is closest to the pick point wins.
/// - Ties go to the marker inserted first.
///
/// Markers whose center leaves the viewport (after [`MarkerLayer::pan`]) are
/// treated as rotated behind the globe: they neither pick nor project.
#[derive(Debug, Clone)]
pub struct MarkerLayer {
    viewport: Extent,
    markers: Vec<Marker>,
    pan: (f64, f64),
}

impl MarkerLayer {
    pub fn new(viewport: Extent) -> Self {
        Self {
            viewport,
            markers: Vec::new(),
            pan: (0.0, 0.0),
        }
    }

    pub fn with_markers(viewport: Extent, markers: impl IntoIterator<Item = Marker>) -> Self {
        let mut layer = Self::new(viewport);
        layer.markers.extend(markers);
        layer
    }

    pub fn push(&mut self, marker: Marker) {
        self.markers.push(marker);
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn set_viewport(&mut self, viewport: Extent) {
        self.viewport = viewport;
    }

    /// Shifts every marker, approximating the globe rotating under the camera.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.pan.0 += dx;
        self.pan.1 += dy;
    }

    fn screen_position(&self, marker: &Marker) -> Option<ScreenPoint> {
        let p = marker.center().offset(self.pan.0, self.pan.1);
        self.viewport.contains(p).then_some(p)
    }
}

impl Renderer for MarkerLayer {
    fn pick(&self, at: ScreenPoint) -> Result<Option<String>, PickError> {
        if self.viewport.is_empty() {
            return Err(PickError::NotReady);
        }
        if !at.is_finite() || !self.viewport.contains(at) {
            return Err(PickError::OutOfBounds { x: at.x, y: at.y });
        }

        let mut best: Option<(f64, &Marker)> = None;
        for marker in &self.markers {
            let Some(center) = self.screen_position(marker) else {
                continue;
            };
            let d2 = center.distance_squared(at);
            if d2 > marker.radius * marker.radius {
                continue;
            }
            // Strict comparison keeps the earlier marker on ties.
            if best.is_none_or(|(bd, _)| d2 < bd) {
                best = Some((d2, marker));
            }
        }

        Ok(best.map(|(_, m)| m.label.clone()))
    }

    fn project_to_screen(&self, key: &EntityKey) -> Option<ScreenPoint> {
        let marker = self.markers.iter().find(|m| &m.key == key)?;
        self.screen_position(marker)
    }
}
