//! The typed hierarchical property model (C1): every input and output of
//! every node is a [`Property`] living in a single engine-wide
//! [`PropertyArena`], addressed by [`PropertyId`] rather than by pointer.

pub mod arena;
pub mod semantics;

pub use arena::PropertyArena;
pub use semantics::Semantics;

use std::sync::Arc;

use nodelogic_ids::{NodeId, PropertyId};
use nodelogic_value::{PropertyType, PropertyValue};

use crate::error::{EngineError, EngineResult};

/// What a property holds: either a leaf value, or named/indexed children.
#[derive(Clone, Debug)]
pub enum PropertyData {
    Leaf(PropertyValue),
    /// Struct children, keyed by name, in declaration order.
    Struct(Vec<(Arc<str>, PropertyId)>),
    /// Array children, 0-based internally (user-visible index in the
    /// script language is 1-based — translated at the script boundary).
    Array(Vec<PropertyId>),
}

#[derive(Clone, Debug)]
pub struct Property {
    id: PropertyId,
    /// Empty for unnamed array elements.
    name: Arc<str>,
    ty: PropertyType,
    semantics: Semantics,
    owner: NodeId,
    parent: Option<PropertyId>,
    data: PropertyData,
    has_new_value: bool,
    is_linked_input: bool,
}

impl Property {
    /// Recursively build a property (and its children, if any) from a
    /// [`PropertyType`] descriptor, initializing every leaf to its zero
    /// value. Returns the id of the newly built root.
    pub fn build(
        arena: &mut PropertyArena,
        owner: NodeId,
        parent: Option<PropertyId>,
        name: impl Into<Arc<str>>,
        ty: PropertyType,
        semantics: Semantics,
    ) -> PropertyId {
        let name = name.into();
        match &ty {
            PropertyType::Struct(fields) => {
                let fields = fields.clone();
                let id = arena.insert(|id| Property {
                    id,
                    name: name.clone(),
                    ty: ty.clone(),
                    semantics,
                    owner,
                    parent,
                    data: PropertyData::Struct(Vec::new()),
                    has_new_value: false,
                    is_linked_input: false,
                });
                let children: Vec<(Arc<str>, PropertyId)> = fields
                    .into_iter()
                    .map(|(fname, fty)| {
                        let child = Property::build(
                            arena,
                            owner,
                            Some(id),
                            fname.clone(),
                            fty,
                            semantics,
                        );
                        (fname, child)
                    })
                    .collect();
                arena.get_mut(id).unwrap().data = PropertyData::Struct(children);
                id
            }
            PropertyType::Array { len, element } => {
                let element = (**element).clone();
                let id = arena.insert(|id| Property {
                    id,
                    name: name.clone(),
                    ty: ty.clone(),
                    semantics,
                    owner,
                    parent,
                    data: PropertyData::Array(Vec::new()),
                    has_new_value: false,
                    is_linked_input: false,
                });
                let children: Vec<PropertyId> = (0..*len)
                    .map(|_| {
                        Property::build(arena, owner, Some(id), "", element.clone(), semantics)
                    })
                    .collect();
                arena.get_mut(id).unwrap().data = PropertyData::Array(children);
                id
            }
            leaf => {
                let value = PropertyValue::zero_for(leaf).expect("leaf type has a zero value");
                arena.insert(|id| Property {
                    id,
                    name: name.clone(),
                    ty: ty.clone(),
                    semantics,
                    owner,
                    parent,
                    data: PropertyData::Leaf(value),
                    has_new_value: false,
                    is_linked_input: false,
                })
            }
        }
    }

    // ---- accessors ----

    pub fn id(&self) -> PropertyId {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn ty(&self) -> &PropertyType {
        &self.ty
    }
    pub fn semantics(&self) -> Semantics {
        self.semantics
    }
    pub fn owner(&self) -> NodeId {
        self.owner
    }
    pub fn parent(&self) -> Option<PropertyId> {
        self.parent
    }
    pub fn has_new_value(&self) -> bool {
        self.has_new_value
    }
    pub fn is_linked_input(&self) -> bool {
        self.is_linked_input
    }
    pub fn set_is_linked_input(&mut self, linked: bool) {
        self.is_linked_input = linked;
    }
    pub fn clear_new_value(&mut self) {
        self.has_new_value = false;
    }
    pub fn data(&self) -> &PropertyData {
        &self.data
    }

    pub fn get_child_by_name(&self, name: &str) -> Option<PropertyId> {
        match &self.data {
            PropertyData::Struct(children) => {
                children.iter().find(|(n, _)| n.as_ref() == name).map(|(_, id)| *id)
            }
            _ => None,
        }
    }

    pub fn get_child_by_index(&self, index: usize) -> Option<PropertyId> {
        match &self.data {
            PropertyData::Struct(children) => children.get(index).map(|(_, id)| *id),
            PropertyData::Array(children) => children.get(index).copied(),
            PropertyData::Leaf(_) => None,
        }
    }

    /// Struct/array child count, vector component count (2/3/4), or 0.
    pub fn child_count(&self) -> usize {
        match &self.data {
            PropertyData::Struct(children) => children.len(),
            PropertyData::Array(children) => children.len(),
            PropertyData::Leaf(_) => self.ty.child_count(),
        }
    }

    pub fn children(&self) -> Vec<PropertyId> {
        match &self.data {
            PropertyData::Struct(children) => children.iter().map(|(_, id)| *id).collect(),
            PropertyData::Array(children) => children.clone(),
            PropertyData::Leaf(_) => Vec::new(),
        }
    }

    pub fn get_value(&self) -> Option<&PropertyValue> {
        match &self.data {
            PropertyData::Leaf(v) => Some(v),
            _ => None,
        }
    }

    // ---- write-path policy (three internal setters) ----

    /// Manual set: permitted for `BindingInput`, or for `ScriptInput` when
    /// it has no incoming link. Marks `has_new_value` even if the new
    /// value equals the old one (determinism over efficiency).
    pub fn manual_set(&mut self, value: PropertyValue) -> EngineResult<()> {
        match self.semantics {
            Semantics::BindingInput => {}
            Semantics::ScriptInput if !self.is_linked_input => {}
            _ => {
                return Err(EngineError::SemanticsViolation {
                    property: self.name.to_string(),
                    message: "cannot manually set a ScriptOutput, or a linked ScriptInput"
                        .into(),
                });
            }
        }
        self.write_leaf(value)
    }

    /// Script-output set: only permitted from inside the owning script's
    /// `run`, on a `ScriptOutput` property.
    pub fn script_output_set(&mut self, value: PropertyValue) -> EngineResult<()> {
        if self.semantics != Semantics::ScriptOutput {
            return Err(EngineError::SemanticsViolation {
                property: self.name.to_string(),
                message: "only a ScriptOutput may be written from run()".into(),
            });
        }
        self.write_leaf(value)
    }

    /// Link propagation set: copies the source value verbatim into a
    /// `ScriptInput`/`BindingInput` target.
    pub fn link_propagate_set(&mut self, value: PropertyValue) -> EngineResult<()> {
        if !self.semantics.can_be_link_target() {
            return Err(EngineError::SemanticsViolation {
                property: self.name.to_string(),
                message: "link target must be a ScriptInput or BindingInput".into(),
            });
        }
        self.write_leaf(value)
    }

    fn write_leaf(&mut self, value: PropertyValue) -> EngineResult<()> {
        if !value.matches_type(&self.ty) {
            return Err(EngineError::TypeMismatch {
                expected: self.ty.clone(),
                found: value.type_of(),
            });
        }
        self.data = PropertyData::Leaf(value);
        self.has_new_value = true;
        Ok(())
    }

    /// Marks `has_new_value` on a compound root after its children were
    /// rewritten out-of-band (struct/array link propagation). Does not
    /// touch children: deep-copy intentionally resets `has_new_value`
    /// only at the root (§4.1).
    pub fn mark_new_root(&mut self) {
        self.has_new_value = true;
    }
}

/// Deep-copies the subtree rooted at `src` (living in `arena`, owned by
/// any node) onto the subtree rooted at `dst` (same shape, different
/// owner), overwriting every leaf value. Marks `has_new_value` on `dst`
/// only, never recursively on its children. Fails with `TypeMismatch`
/// if the two subtrees' shapes disagree (callers should have already
/// checked this via the link table, but this guards direct use).
pub fn deep_copy(arena: &mut PropertyArena, src: PropertyId, dst: PropertyId) -> EngineResult<()> {
    let src_prop = arena
        .get(src)
        .expect("deep_copy: source property missing")
        .clone();
    let dst_ty = arena
        .get(dst)
        .expect("deep_copy: destination property missing")
        .ty
        .clone();
    if src_prop.ty != dst_ty {
        return Err(EngineError::TypeMismatch {
            expected: dst_ty,
            found: src_prop.ty,
        });
    }
    copy_children(arena, &src_prop.data, dst)?;
    arena.get_mut(dst).unwrap().mark_new_root();
    Ok(())
}

fn copy_children(arena: &mut PropertyArena, src_data: &PropertyData, dst: PropertyId) -> EngineResult<()> {
    match src_data {
        PropertyData::Leaf(value) => {
            let dst_prop = arena.get_mut(dst).unwrap();
            dst_prop.data = PropertyData::Leaf(value.clone());
        }
        PropertyData::Struct(src_children) => {
            let dst_children = arena.get(dst).unwrap().children();
            for ((_, src_child), dst_child) in src_children.iter().zip(dst_children.iter()) {
                let src_child_data = arena.get(*src_child).unwrap().data.clone();
                copy_children(arena, &src_child_data, *dst_child)?;
            }
        }
        PropertyData::Array(src_children) => {
            let dst_children = arena.get(dst).unwrap().children();
            for (src_child, dst_child) in src_children.iter().zip(dst_children.iter()) {
                let src_child_data = arena.get(*src_child).unwrap().data.clone();
                copy_children(arena, &src_child_data, *dst_child)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodelogic_value::PropertyType;

    fn node_id() -> NodeId {
        NodeId::from_parts(1, 0)
    }

    #[test]
    fn build_leaf_zeroes_value() {
        let mut arena = PropertyArena::new();
        let id = Property::build(
            &mut arena,
            node_id(),
            None,
            "a",
            PropertyType::Int32,
            Semantics::ScriptInput,
        );
        assert_eq!(
            arena.get(id).unwrap().get_value(),
            Some(&PropertyValue::Int32(0))
        );
    }

    #[test]
    fn build_struct_recurses_and_names_children() {
        let mut arena = PropertyArena::new();
        let ty = PropertyType::Struct(vec![
            (Arc::from("x"), PropertyType::Int32),
            (Arc::from("y"), PropertyType::Float),
        ]);
        let id = Property::build(&mut arena, node_id(), None, "s", ty, Semantics::ScriptInput);
        let prop = arena.get(id).unwrap();
        assert_eq!(prop.child_count(), 2);
        let x = prop.get_child_by_name("x").unwrap();
        assert_eq!(arena.get(x).unwrap().name(), "x");
        assert_eq!(arena.get(x).unwrap().parent(), Some(id));
    }

    #[test]
    fn manual_set_blocked_on_script_output() {
        let mut arena = PropertyArena::new();
        let id = Property::build(
            &mut arena,
            node_id(),
            None,
            "out",
            PropertyType::Int32,
            Semantics::ScriptOutput,
        );
        let prop = arena.get_mut(id).unwrap();
        assert!(prop.manual_set(PropertyValue::Int32(1)).is_err());
        assert!(prop.script_output_set(PropertyValue::Int32(1)).is_ok());
    }

    #[test]
    fn manual_set_blocked_when_input_is_linked() {
        let mut arena = PropertyArena::new();
        let id = Property::build(
            &mut arena,
            node_id(),
            None,
            "in",
            PropertyType::Int32,
            Semantics::ScriptInput,
        );
        arena.get_mut(id).unwrap().set_is_linked_input(true);
        let prop = arena.get_mut(id).unwrap();
        assert!(prop.manual_set(PropertyValue::Int32(1)).is_err());
    }

    #[test]
    fn setting_identical_value_still_marks_new() {
        let mut arena = PropertyArena::new();
        let id = Property::build(
            &mut arena,
            node_id(),
            None,
            "in",
            PropertyType::Int32,
            Semantics::BindingInput,
        );
        let prop = arena.get_mut(id).unwrap();
        prop.manual_set(PropertyValue::Int32(0)).unwrap();
        assert!(prop.has_new_value());
    }

    #[test]
    fn deep_copy_struct_preserves_values() {
        let mut arena = PropertyArena::new();
        let ty = PropertyType::Struct(vec![
            (Arc::from("x"), PropertyType::Int32),
            (Arc::from("y"), PropertyType::Float),
        ]);
        let src = Property::build(
            &mut arena,
            node_id(),
            None,
            "src",
            ty.clone(),
            Semantics::ScriptOutput,
        );
        let dst = Property::build(&mut arena, node_id(), None, "dst", ty, Semantics::ScriptInput);

        let src_x = arena.get(src).unwrap().get_child_by_name("x").unwrap();
        arena
            .get_mut(src_x)
            .unwrap()
            .script_output_set(PropertyValue::Int32(7))
            .unwrap();

        deep_copy(&mut arena, src, dst).unwrap();

        let dst_x = arena.get(dst).unwrap().get_child_by_name("x").unwrap();
        assert_eq!(
            arena.get(dst_x).unwrap().get_value(),
            Some(&PropertyValue::Int32(7))
        );
        assert!(arena.get(dst).unwrap().has_new_value());
    }
}
