//! `NodeBinding`: mirrors visibility, rotation, translation and scaling
//! onto a renderer's scene node.

use glam::{Vec3, Vec4};
use nodelogic_ids::{NodeId, PropertyId};
use nodelogic_value::{PropertyType, PropertyValue};

use super::renderer::{RenderNodeHandle, RotationConvention};
use crate::error::EngineResult;
use crate::property::{Property, PropertyArena, Semantics};

pub struct NodeBinding {
    pub input_root: PropertyId,
    convention: RotationConvention,
    visibility: PropertyId,
    rotation: PropertyId,
    translation: PropertyId,
    scaling: PropertyId,
    handle: Option<Box<dyn RenderNodeHandle>>,
}

impl NodeBinding {
    pub fn build(arena: &mut PropertyArena, owner: NodeId, convention: RotationConvention) -> Self {
        let rotation_ty = if convention.is_quaternion() {
            PropertyType::Vec4f
        } else {
            PropertyType::Vec3f
        };
        let input_root = Property::build(
            arena,
            owner,
            None,
            "IN",
            PropertyType::Struct(vec![
                ("visibility".into(), PropertyType::Bool),
                ("rotation".into(), rotation_ty),
                ("translation".into(), PropertyType::Vec3f),
                ("scaling".into(), PropertyType::Vec3f),
            ]),
            Semantics::BindingInput,
        );
        let root = arena.get(input_root).unwrap();
        let visibility = root.get_child_by_name("visibility").unwrap();
        let rotation = root.get_child_by_name("rotation").unwrap();
        let translation = root.get_child_by_name("translation").unwrap();
        let scaling = root.get_child_by_name("scaling").unwrap();

        // Scaling's default is (1, 1, 1) and visibility's is true, not
        // the types' zero values, to match a freshly-created renderer
        // node's own defaults.
        arena
            .get_mut(scaling)
            .unwrap()
            .manual_set(PropertyValue::Vec3f(Vec3::ONE))
            .unwrap();
        arena.get_mut(scaling).unwrap().clear_new_value();
        arena
            .get_mut(visibility)
            .unwrap()
            .manual_set(PropertyValue::Bool(true))
            .unwrap();
        arena.get_mut(visibility).unwrap().clear_new_value();

        Self {
            input_root,
            convention,
            visibility,
            rotation,
            translation,
            scaling,
            handle: None,
        }
    }

    pub fn convention(&self) -> RotationConvention {
        self.convention
    }

    pub fn attach(&mut self, handle: Box<dyn RenderNodeHandle>) {
        self.handle = Some(handle);
    }

    pub fn detach(&mut self) -> Option<Box<dyn RenderNodeHandle>> {
        self.handle.take()
    }

    pub fn is_attached(&self) -> bool {
        self.handle.is_some()
    }

    /// Pushes every input with a new value onto the attached handle, in
    /// field order. A renderer rejection stops the rest of this pass's
    /// pushes; state may end up partially applied.
    pub fn update(&mut self, arena: &mut PropertyArena) -> Vec<String> {
        let mut errors = Vec::new();
        let Some(handle) = self.handle.as_mut() else {
            return errors;
        };

        if arena.get(self.visibility).unwrap().has_new_value() {
            if let Some(PropertyValue::Bool(v)) = arena.get(self.visibility).unwrap().get_value() {
                if let Err(e) = handle.set_visibility(*v) {
                    errors.push(e);
                    return errors;
                }
            }
        }
        if arena.get(self.rotation).unwrap().has_new_value() {
            match arena.get(self.rotation).unwrap().get_value() {
                Some(PropertyValue::Vec3f(v)) => {
                    if let Err(e) = handle.set_rotation_euler(*v, self.convention) {
                        errors.push(e);
                        return errors;
                    }
                }
                Some(PropertyValue::Vec4f(v)) => {
                    if let Err(e) = handle.set_rotation_quaternion(*v) {
                        errors.push(e);
                        return errors;
                    }
                }
                _ => {}
            }
        }
        if arena.get(self.translation).unwrap().has_new_value() {
            if let Some(PropertyValue::Vec3f(v)) = arena.get(self.translation).unwrap().get_value() {
                if let Err(e) = handle.set_translation(*v) {
                    errors.push(e);
                    return errors;
                }
            }
        }
        if arena.get(self.scaling).unwrap().has_new_value() {
            if let Some(PropertyValue::Vec3f(v)) = arena.get(self.scaling).unwrap().get_value() {
                if let Err(e) = handle.set_scaling(*v) {
                    errors.push(e);
                    return errors;
                }
            }
        }
        errors
    }

    pub fn manual_set(&self, arena: &mut PropertyArena, child: &str, value: PropertyValue) -> EngineResult<()> {
        let id = arena
            .get(self.input_root)
            .unwrap()
            .get_child_by_name(child)
            .ok_or_else(|| crate::error::EngineError::UnknownChild {
                property: "IN".into(),
                key: child.into(),
            })?;
        arena.get_mut(id).unwrap().manual_set(value)
    }
}
