//! The closed type system a property can be declared with.
//!
//! `PropertyType` is a recursive descriptor: primitive and vector leaves
//! carry no further shape, `Struct` carries its named children in
//! declaration order, and `Array` carries a fixed element count and a
//! single homogeneous element type. Two properties are link-compatible
//! only when their `PropertyType` values are `==`, which for `Struct`
//! and `Array` recursively compares the whole shape.

use std::sync::Arc;

/// Maximum number of elements a script-declared `ARRAY(N, T)` may have.
pub const MAX_ARRAY_LEN: usize = 255;
/// Minimum number of elements a script-declared `ARRAY(N, T)` may have.
pub const MIN_ARRAY_LEN: usize = 1;

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PropertyType {
    Int32,
    Int64,
    Float,
    Bool,
    String,

    Vec2i,
    Vec3i,
    Vec4i,
    Vec2f,
    Vec3f,
    Vec4f,

    /// Named children, in declaration order. Order matters for the
    /// binary schema (field ordering mirrors declaration order) but not
    /// for struct-literal assignment, which matches by name.
    Struct(Vec<(Arc<str>, PropertyType)>),

    /// `len` homogeneous elements of `element`. Arrays of arrays are
    /// rejected at the point of declaration (see `InterfaceError`), not
    /// representable at all in this type.
    Array { len: usize, element: Box<PropertyType> },
}

impl PropertyType {
    pub fn array(len: usize, element: PropertyType) -> Self {
        PropertyType::Array {
            len,
            element: Box::new(element),
        }
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, PropertyType::Struct(_) | PropertyType::Array { .. })
    }

    pub fn is_vector(&self) -> bool {
        matches!(
            self,
            PropertyType::Vec2i
                | PropertyType::Vec3i
                | PropertyType::Vec4i
                | PropertyType::Vec2f
                | PropertyType::Vec3f
                | PropertyType::Vec4f
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, PropertyType::Int32 | PropertyType::Int64)
    }

    /// Component count exposed through the script index operator: 2/3/4
    /// for vectors, struct/array child count otherwise, 0 for scalars.
    pub fn child_count(&self) -> usize {
        match self {
            PropertyType::Vec2i | PropertyType::Vec2f => 2,
            PropertyType::Vec3i | PropertyType::Vec3f => 3,
            PropertyType::Vec4i | PropertyType::Vec4f => 4,
            PropertyType::Struct(fields) => fields.len(),
            PropertyType::Array { len, .. } => *len,
            _ => 0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::Int32 => "Int32",
            PropertyType::Int64 => "Int64",
            PropertyType::Float => "Float",
            PropertyType::Bool => "Bool",
            PropertyType::String => "String",
            PropertyType::Vec2i => "Vec2i",
            PropertyType::Vec3i => "Vec3i",
            PropertyType::Vec4i => "Vec4i",
            PropertyType::Vec2f => "Vec2f",
            PropertyType::Vec3f => "Vec3f",
            PropertyType::Vec4f => "Vec4f",
            PropertyType::Struct(_) => "Struct",
            PropertyType::Array { .. } => "Array",
        }
    }
}
