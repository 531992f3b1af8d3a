//! `CameraBinding`: mirrors viewport and frustum settings onto a
//! renderer's camera. Viewport and frustum are each pushed as a whole
//! when any of their fields changed, never field-by-field.

use nodelogic_ids::{NodeId, PropertyId};
use nodelogic_value::{PropertyType, PropertyValue};

use super::renderer::RenderCameraHandle;
use crate::property::{Property, PropertyArena, Semantics};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ProjectionKind {
    Perspective,
    Orthographic,
}

pub struct CameraBinding {
    pub input_root: PropertyId,
    projection: ProjectionKind,
    viewport: PropertyId,
    frustum: PropertyId,
    handle: Option<Box<dyn RenderCameraHandle>>,
}

impl CameraBinding {
    pub fn build(arena: &mut PropertyArena, owner: NodeId, projection: ProjectionKind) -> Self {
        let frustum_fields = match projection {
            ProjectionKind::Perspective => vec![
                ("fov".into(), PropertyType::Float),
                ("aspectRatio".into(), PropertyType::Float),
                ("nearPlane".into(), PropertyType::Float),
                ("farPlane".into(), PropertyType::Float),
            ],
            ProjectionKind::Orthographic => vec![
                ("leftPlane".into(), PropertyType::Float),
                ("rightPlane".into(), PropertyType::Float),
                ("bottomPlane".into(), PropertyType::Float),
                ("topPlane".into(), PropertyType::Float),
                ("nearPlane".into(), PropertyType::Float),
                ("farPlane".into(), PropertyType::Float),
            ],
        };
        let input_root = Property::build(
            arena,
            owner,
            None,
            "IN",
            PropertyType::Struct(vec![
                (
                    "viewport".into(),
                    PropertyType::Struct(vec![
                        ("offsetX".into(), PropertyType::Int32),
                        ("offsetY".into(), PropertyType::Int32),
                        ("width".into(), PropertyType::Int32),
                        ("height".into(), PropertyType::Int32),
                    ]),
                ),
                ("frustum".into(), PropertyType::Struct(frustum_fields)),
            ]),
            Semantics::BindingInput,
        );
        let root = arena.get(input_root).unwrap();
        let viewport = root.get_child_by_name("viewport").unwrap();
        let frustum = root.get_child_by_name("frustum").unwrap();
        Self {
            input_root,
            projection,
            viewport,
            frustum,
            handle: None,
        }
    }

    pub fn projection(&self) -> ProjectionKind {
        self.projection
    }

    pub fn attach(&mut self, handle: Box<dyn RenderCameraHandle>) {
        self.handle = Some(handle);
    }

    pub fn detach(&mut self) -> Option<Box<dyn RenderCameraHandle>> {
        self.handle.take()
    }

    pub fn is_attached(&self) -> bool {
        self.handle.is_some()
    }

    /// Pushes viewport, then frustum, if either changed. A renderer
    /// rejection stops the rest of this pass's pushes; state may end up
    /// partially applied.
    pub fn update(&mut self, arena: &mut PropertyArena) -> Vec<String> {
        let mut errors = Vec::new();
        let Some(handle) = self.handle.as_mut() else {
            return errors;
        };

        let viewport_dirty = arena
            .get(self.viewport)
            .unwrap()
            .children()
            .iter()
            .any(|c| arena.get(*c).unwrap().has_new_value());
        if viewport_dirty {
            let i = |name: &str| -> i32 {
                let id = arena.get(self.viewport).unwrap().get_child_by_name(name).unwrap();
                match arena.get(id).unwrap().get_value() {
                    Some(PropertyValue::Int32(v)) => *v,
                    _ => 0,
                }
            };
            if let Err(e) = handle.set_viewport(i("offsetX"), i("offsetY"), i("width"), i("height")) {
                errors.push(e);
                return errors;
            }
        }

        let frustum_dirty = arena
            .get(self.frustum)
            .unwrap()
            .children()
            .iter()
            .any(|c| arena.get(*c).unwrap().has_new_value());
        if frustum_dirty {
            let f = |name: &str| -> f32 {
                let id = arena.get(self.frustum).unwrap().get_child_by_name(name).unwrap();
                match arena.get(id).unwrap().get_value() {
                    Some(PropertyValue::Float(v)) => *v,
                    _ => 0.0,
                }
            };
            let result = match self.projection {
                ProjectionKind::Perspective => {
                    handle.set_perspective_frustum(f("fov"), f("aspectRatio"), f("nearPlane"), f("farPlane"))
                }
                ProjectionKind::Orthographic => handle.set_orthographic_frustum(
                    f("leftPlane"),
                    f("rightPlane"),
                    f("bottomPlane"),
                    f("topPlane"),
                    f("nearPlane"),
                    f("farPlane"),
                ),
            };
            if let Err(e) = result {
                errors.push(e);
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockCamera {
        viewport_calls: u32,
        frustum_calls: u32,
    }
    impl RenderCameraHandle for MockCamera {
        fn set_viewport(&mut self, _: i32, _: i32, _: i32, _: i32) -> Result<(), String> {
            self.viewport_calls += 1;
            Ok(())
        }
        fn set_perspective_frustum(&mut self, _: f32, _: f32, _: f32, _: f32) -> Result<(), String> {
            self.frustum_calls += 1;
            Ok(())
        }
        fn set_orthographic_frustum(&mut self, _: f32, _: f32, _: f32, _: f32, _: f32, _: f32) -> Result<(), String> {
            self.frustum_calls += 1;
            Ok(())
        }
    }

    #[test]
    fn viewport_pushed_as_whole_when_any_field_dirty() {
        let mut arena = PropertyArena::new();
        let mut cam = CameraBinding::build(&mut arena, NodeId::from_parts(1, 0), ProjectionKind::Perspective);
        cam.attach(Box::new(MockCamera {
            viewport_calls: 0,
            frustum_calls: 0,
        }));
        let width = arena.get(cam.viewport).unwrap().get_child_by_name("width").unwrap();
        arena.get_mut(width).unwrap().manual_set(PropertyValue::Int32(800)).unwrap();
        let errors = cam.update(&mut arena);
        assert!(errors.is_empty());
    }
}
