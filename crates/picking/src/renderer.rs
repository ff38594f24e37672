use foundation::geom::ScreenPoint;
use foundation::ids::EntityKey;

#[derive(Debug, Clone, PartialEq)]
pub enum PickError {
    /// The scene is not interactive yet (e.g. no viewport laid out).
    NotReady,
    OutOfBounds { x: f64, y: f64 },
}

impl std::fmt::Display for PickError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PickError::NotReady => write!(f, "renderer not ready"),
            PickError::OutOfBounds { x, y } => {
                write!(f, "pick coordinate out of bounds: x={x} y={y}")
            }
        }
    }
}

impl std::error::Error for PickError {}

/// The picking surface of the globe renderer.
///
/// `pick` reports a raw label (an entity code or a display name, whatever the
/// scene carries); resolution to a known entity happens in
/// [`crate::EntityRegistry`].
pub trait Renderer {
    fn pick(&self, at: ScreenPoint) -> Result<Option<String>, PickError>;

    /// Current on-screen position of `key`, or `None` if it is not visible
    /// (e.g. rotated to the far side of the globe).
    fn project_to_screen(&self, key: &EntityKey) -> Option<ScreenPoint>;
}

impl<R: Renderer + ?Sized> Renderer for &R {
    fn pick(&self, at: ScreenPoint) -> Result<Option<String>, PickError> {
        (**self).pick(at)
    }

    fn project_to_screen(&self, key: &EntityKey) -> Option<ScreenPoint> {
        (**self).project_to_screen(key)
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn pick(&self, at: ScreenPoint) -> Result<Option<String>, PickError> {
        (**self).pick(at)
    }

    fn project_to_screen(&self, key: &EntityKey) -> Option<ScreenPoint> {
        (**self).project_to_screen(key)
    }
}
