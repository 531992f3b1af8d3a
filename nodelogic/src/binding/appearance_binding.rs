//! `AppearanceBinding`: exposes a renderer appearance's uniforms as
//! dynamically-shaped inputs, derived only once a handle is attached.

use nodelogic_ids::{NodeId, PropertyId};
use nodelogic_value::PropertyValue;

use super::renderer::RenderAppearanceHandle;
use crate::property::{Property, PropertyArena, Semantics};

pub struct AppearanceBinding {
    /// `None` until a handle is attached; the shape is not known before
    /// then since it comes from the renderer's uniform descriptors.
    pub input_root: Option<PropertyId>,
    owner: NodeId,
    uniform_ids: Vec<(String, PropertyId)>,
    handle: Option<Box<dyn RenderAppearanceHandle>>,
}

impl AppearanceBinding {
    pub fn new(owner: NodeId) -> Self {
        Self {
            input_root: None,
            owner,
            uniform_ids: Vec::new(),
            handle: None,
        }
    }

    /// Attaching builds `IN`'s children from the handle's uniform
    /// descriptors. No values are pushed to the renderer as part of
    /// attaching; the next `update()` call pushes whatever is dirty.
    pub fn attach(&mut self, arena: &mut PropertyArena, handle: Box<dyn RenderAppearanceHandle>) {
        let descriptors = handle.uniform_descriptors();
        let fields: Vec<_> = descriptors
            .iter()
            .map(|d| (d.name.as_str().into(), d.ty.clone()))
            .collect();
        let input_root = Property::build(
            arena,
            self.owner,
            None,
            "IN",
            nodelogic_value::PropertyType::Struct(fields),
            Semantics::BindingInput,
        );
        let root = arena.get(input_root).unwrap();
        self.uniform_ids = descriptors
            .iter()
            .map(|d| (d.name.clone(), root.get_child_by_name(&d.name).unwrap()))
            .collect();
        self.input_root = Some(input_root);
        self.handle = Some(handle);
    }

    pub fn detach(&mut self) -> Option<Box<dyn RenderAppearanceHandle>> {
        self.handle.take()
    }

    pub fn is_attached(&self) -> bool {
        self.handle.is_some()
    }

    /// Pushes every dirty uniform, in declaration order. A renderer
    /// rejection stops the rest of this pass's pushes.
    pub fn update(&mut self, arena: &mut PropertyArena) -> Vec<String> {
        let mut errors = Vec::new();
        let Some(handle) = self.handle.as_mut() else {
            return errors;
        };
        for (name, id) in &self.uniform_ids {
            let prop = arena.get(*id).unwrap();
            if !prop.has_new_value() {
                continue;
            }
            if let Some(value) = prop.get_value() {
                if let Err(e) = handle.set_uniform(name, value) {
                    errors.push(e);
                    break;
                }
            }
        }
        errors
    }
}
