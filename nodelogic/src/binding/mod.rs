//! Bindings mirror a subset of an engine node's properties onto an
//! external renderer's own scene objects. The engine is deliberately
//! ignorant of any concrete renderer; it only knows the trait contract
//! in [`renderer`].

pub mod appearance_binding;
pub mod camera_binding;
pub mod node_binding;
pub mod renderer;

pub use appearance_binding::AppearanceBinding;
pub use camera_binding::{CameraBinding, ProjectionKind};
pub use node_binding::NodeBinding;
pub use renderer::{RenderAppearanceHandle, RenderCameraHandle, RenderNodeHandle, RotationConvention};
