//! The collaborator contract a binding pushes values through. The engine
//! never depends on a concrete renderer crate: a binding is attached to
//! anything implementing these traits, including the mock used in tests.

use glam::Vec3;

use nodelogic_value::PropertyValue;

/// Euler rotation order, or a raw quaternion. Fixed per [`super::node_binding::NodeBinding`]
/// at creation time; chosen to match the attached renderer's convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RotationConvention {
    EulerXYZ,
    EulerXZY,
    EulerYXZ,
    EulerYZX,
    EulerZXY,
    EulerZYX,
    Quaternion,
}

impl RotationConvention {
    pub fn is_quaternion(self) -> bool {
        matches!(self, RotationConvention::Quaternion)
    }
}

/// What a renderer exposes about one of its appearance's uniforms, used
/// to derive an [`super::appearance_binding::AppearanceBinding`]'s inputs on attach.
pub struct UniformDescriptor {
    pub name: String,
    pub ty: nodelogic_value::PropertyType,
}

pub trait RenderNodeHandle {
    fn set_visibility(&mut self, visible: bool) -> Result<(), String>;
    fn set_rotation_euler(&mut self, euler_degrees: Vec3, convention: RotationConvention) -> Result<(), String>;
    fn set_rotation_quaternion(&mut self, quat: glam::Vec4) -> Result<(), String>;
    fn set_translation(&mut self, t: Vec3) -> Result<(), String>;
    fn set_scaling(&mut self, s: Vec3) -> Result<(), String>;
}

pub trait RenderAppearanceHandle {
    fn uniform_descriptors(&self) -> Vec<UniformDescriptor>;
    fn set_uniform(&mut self, name: &str, value: &PropertyValue) -> Result<(), String>;
}

pub trait RenderCameraHandle {
    fn set_viewport(&mut self, offset_x: i32, offset_y: i32, width: i32, height: i32) -> Result<(), String>;
    fn set_perspective_frustum(&mut self, fov: f32, aspect: f32, near: f32, far: f32) -> Result<(), String>;
    fn set_orthographic_frustum(
        &mut self,
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) -> Result<(), String>;
}
