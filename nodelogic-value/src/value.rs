//! The atomic value stored in a primitive or vector property's value slot.
//!
//! `Struct` and `Array` properties never hold a `PropertyValue` directly —
//! per the data model, compound properties own children instead. This type
//! only needs to cover the eleven leaf types of the closed type system.

use std::fmt;
use std::sync::Arc;

use glam::{IVec2, IVec3, IVec4, Vec2, Vec3, Vec4};

use crate::ty::PropertyType;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PropertyValue {
    Int32(i32),
    Int64(i64),
    Float(f32),
    Bool(bool),
    String(Arc<str>),

    Vec2i(IVec2),
    Vec3i(IVec3),
    Vec4i(IVec4),
    Vec2f(Vec2),
    Vec3f(Vec3),
    Vec4f(Vec4),
}

impl PropertyValue {
    /// The zero value prescribed for a freshly-built leaf property:
    /// `0`, `0.0`, `""`, `false`, or the component-wise zero vector.
    /// Returns `None` for `Struct`/`Array`, which have no direct value.
    pub fn zero_for(ty: &PropertyType) -> Option<PropertyValue> {
        Some(match ty {
            PropertyType::Int32 => PropertyValue::Int32(0),
            PropertyType::Int64 => PropertyValue::Int64(0),
            PropertyType::Float => PropertyValue::Float(0.0),
            PropertyType::Bool => PropertyValue::Bool(false),
            PropertyType::String => PropertyValue::String(Arc::from("")),
            PropertyType::Vec2i => PropertyValue::Vec2i(IVec2::ZERO),
            PropertyType::Vec3i => PropertyValue::Vec3i(IVec3::ZERO),
            PropertyType::Vec4i => PropertyValue::Vec4i(IVec4::ZERO),
            PropertyType::Vec2f => PropertyValue::Vec2f(Vec2::ZERO),
            PropertyType::Vec3f => PropertyValue::Vec3f(Vec3::ZERO),
            PropertyType::Vec4f => PropertyValue::Vec4f(Vec4::ZERO),
            PropertyType::Struct(_) | PropertyType::Array { .. } => return None,
        })
    }

    pub fn type_of(&self) -> PropertyType {
        match self {
            PropertyValue::Int32(_) => PropertyType::Int32,
            PropertyValue::Int64(_) => PropertyType::Int64,
            PropertyValue::Float(_) => PropertyType::Float,
            PropertyValue::Bool(_) => PropertyType::Bool,
            PropertyValue::String(_) => PropertyType::String,
            PropertyValue::Vec2i(_) => PropertyType::Vec2i,
            PropertyValue::Vec3i(_) => PropertyType::Vec3i,
            PropertyValue::Vec4i(_) => PropertyType::Vec4i,
            PropertyValue::Vec2f(_) => PropertyType::Vec2f,
            PropertyValue::Vec3f(_) => PropertyType::Vec3f,
            PropertyValue::Vec4f(_) => PropertyType::Vec4f,
        }
    }

    pub fn matches_type(&self, ty: &PropertyType) -> bool {
        &self.type_of() == ty
    }

    /// Read a vector's component by 0-based index as `f64`, or a scalar
    /// numeric value at index 0. Used by the script index operator.
    pub fn component_f64(&self, index: usize) -> Option<f64> {
        match self {
            PropertyValue::Int32(v) if index == 0 => Some(*v as f64),
            PropertyValue::Int64(v) if index == 0 => Some(*v as f64),
            PropertyValue::Float(v) if index == 0 => Some(*v as f64),
            PropertyValue::Vec2i(v) => v.to_array().get(index).map(|c| *c as f64),
            PropertyValue::Vec3i(v) => v.to_array().get(index).map(|c| *c as f64),
            PropertyValue::Vec4i(v) => v.to_array().get(index).map(|c| *c as f64),
            PropertyValue::Vec2f(v) => v.to_array().get(index).map(|c| *c as f64),
            PropertyValue::Vec3f(v) => v.to_array().get(index).map(|c| *c as f64),
            PropertyValue::Vec4f(v) => v.to_array().get(index).map(|c| *c as f64),
            _ => None,
        }
    }

    /// Write a vector's component by 0-based index from a numeric value.
    /// Integer vectors truncate via `as i32`; returns `false` if `index`
    /// is out of range or the value is not a vector.
    pub fn set_component_f64(&mut self, index: usize, value: f64) -> bool {
        macro_rules! set_vec {
            ($v:expr, $cast:expr) => {{
                let mut arr = $v.to_array();
                match arr.get_mut(index) {
                    Some(slot) => {
                        *slot = $cast(value);
                        *$v = arr.into();
                        true
                    }
                    None => false,
                }
            }};
        }
        match self {
            PropertyValue::Vec2i(v) => set_vec!(v, |x: f64| x as i32),
            PropertyValue::Vec3i(v) => set_vec!(v, |x: f64| x as i32),
            PropertyValue::Vec4i(v) => set_vec!(v, |x: f64| x as i32),
            PropertyValue::Vec2f(v) => set_vec!(v, |x: f64| x as f32),
            PropertyValue::Vec3f(v) => set_vec!(v, |x: f64| x as f32),
            PropertyValue::Vec4f(v) => set_vec!(v, |x: f64| x as f32),
            _ => false,
        }
    }
}

/// `2.0` is a valid assignment to an `Int32`/`Int64` property; `2.5` is not.
#[inline]
pub fn float_is_integral(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Int32(v) => write!(f, "{v}"),
            PropertyValue::Int64(v) => write!(f, "{v}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::String(v) => write!(f, "{:?}", v.as_ref()),
            PropertyValue::Vec2i(v) => write!(f, "({}, {})", v.x, v.y),
            PropertyValue::Vec3i(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            PropertyValue::Vec4i(v) => write!(f, "({}, {}, {}, {})", v.x, v.y, v.z, v.w),
            PropertyValue::Vec2f(v) => write!(f, "({}, {})", v.x, v.y),
            PropertyValue::Vec3f(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            PropertyValue::Vec4f(v) => write!(f, "({}, {}, {}, {})", v.x, v.y, v.z, v.w),
        }
    }
}

macro_rules! from_impl {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for PropertyValue {
            #[inline]
            fn from(v: $ty) -> Self {
                PropertyValue::$variant(v)
            }
        }
    };
}

from_impl!(i32, Int32);
from_impl!(i64, Int64);
from_impl!(f32, Float);
from_impl!(bool, Bool);
from_impl!(IVec2, Vec2i);
from_impl!(IVec3, Vec3i);
from_impl!(IVec4, Vec4i);
from_impl!(Vec2, Vec2f);
from_impl!(Vec3, Vec3f);
from_impl!(Vec4, Vec4f);

impl From<&str> for PropertyValue {
    #[inline]
    fn from(v: &str) -> Self {
        PropertyValue::String(Arc::from(v))
    }
}
impl From<String> for PropertyValue {
    #[inline]
    fn from(v: String) -> Self {
        PropertyValue::String(Arc::from(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_match_spec_defaults() {
        assert_eq!(
            PropertyValue::zero_for(&PropertyType::Int32),
            Some(PropertyValue::Int32(0))
        );
        assert_eq!(
            PropertyValue::zero_for(&PropertyType::String),
            Some(PropertyValue::String(Arc::from("")))
        );
        assert_eq!(PropertyValue::zero_for(&PropertyType::Struct(vec![])), None);
    }

    #[test]
    fn float_integral_check() {
        assert!(float_is_integral(2.0));
        assert!(!float_is_integral(2.5));
        assert!(!float_is_integral(f64::NAN));
    }

    #[test]
    fn vector_component_round_trip() {
        let mut v = PropertyValue::Vec3f(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(v.component_f64(1), Some(2.0));
        assert!(v.set_component_f64(1, 9.0));
        assert_eq!(v.component_f64(1), Some(9.0));
        assert!(!v.set_component_f64(3, 1.0));
    }
}
