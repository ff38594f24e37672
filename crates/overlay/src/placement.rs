use foundation::geom::{Extent, ScreenPoint};
use serde::{Deserialize, Serialize};

pub const DEFAULT_OFFSET: f64 = 24.0;
pub const DEFAULT_MARGIN: f64 = 16.0;
pub const DEFAULT_CHROME_BAND: f64 = 80.0;

/// Spacing rules for overlay placement, in pixels.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementRules {
    /// Gap between the anchor and the box corner nearest to it.
    pub offset: f64,
    /// Minimum distance between the box and every viewport edge.
    pub margin: f64,
    /// Height of the reserved band at the top of the viewport (header/nav).
    pub chrome_band: f64,
}

impl Default for PlacementRules {
    fn default() -> Self {
        Self {
            offset: DEFAULT_OFFSET,
            margin: DEFAULT_MARGIN,
            chrome_band: DEFAULT_CHROME_BAND,
        }
    }
}

/// Top-left corner of an overlay box.
///
/// `flipped_horizontally` is set when the box sits left of its anchor, so the
/// presentation layer can mirror the pointer decoration.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub flipped_horizontally: bool,
}

/// Positions a `size` box next to `anchor` inside `viewport`.
///
/// The box goes down-right of the anchor by default; it flips left when it
/// would cross the right margin and up when it would cross the bottom margin.
/// It never rises into the chrome band.
///
/// Postcondition, whenever the box fits (`size.w <= viewport.w - 2*margin`,
/// `size.h <= viewport.h - chrome_band - 2*margin`):
/// - `x` in `[margin, viewport.w - size.w - margin]`
/// - `y` in `[chrome_band + margin, viewport.h - size.h - margin]`
///
/// A box that does not fit is pinned to the left/top bounds.
pub fn place(anchor: ScreenPoint, viewport: Extent, size: Extent, rules: &PlacementRules) -> Placement {
    let viewport = viewport.sanitized();
    let size = size.sanitized();
    let offset = non_negative(rules.offset);
    let margin = non_negative(rules.margin);
    let top = non_negative(rules.chrome_band) + margin;
    let ax = finite_or_zero(anchor.x);
    let ay = finite_or_zero(anchor.y);

    let mut x = ax + offset;
    let mut y = ay + offset;
    let mut flipped_horizontally = false;

    if x + size.w + margin > viewport.w {
        x = ax - size.w - offset;
        flipped_horizontally = true;
        if x < margin {
            x = margin;
        }
    }

    if y + size.h + margin > viewport.h {
        y = ay - size.h - offset;
    }
    if y < top {
        y = top;
    }

    // Anchors outside the viewport can still land past the far edges.
    let max_x = (viewport.w - size.w - margin).max(margin);
    let max_y = (viewport.h - size.h - margin).max(top);

    Placement {
        x: x.clamp(margin, max_x),
        y: y.clamp(top, max_y),
        flipped_horizontally,
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

fn non_negative(v: f64) -> f64 {
    finite_or_zero(v).max(0.0)
}
