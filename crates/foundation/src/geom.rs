//! Screen-space geometry primitives.
//!
//! All values are in CSS pixels with the origin at the top-left corner of the
//! viewport; `y` grows downward.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A position on screen.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A width/height pair (viewport or overlay box size).
#[derive(Debug, Copy, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Extent {
    pub w: f64,
    pub h: f64,
}

impl Extent {
    pub const fn new(w: f64, h: f64) -> Self {
        Self { w, h }
    }

    /// Negative or non-finite dimensions collapse to zero.
    pub fn sanitized(self) -> Self {
        let fix = |v: f64| if v.is_finite() { v.max(0.0) } else { 0.0 };
        Self::new(fix(self.w), fix(self.h))
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0.0 || self.h <= 0.0
    }

    /// Whether `point` lies inside `[0, w] x [0, h]`.
    pub fn contains(&self, point: ScreenPoint) -> bool {
        point.x >= 0.0 && point.y >= 0.0 && point.x <= self.w && point.y <= self.h
    }
}
