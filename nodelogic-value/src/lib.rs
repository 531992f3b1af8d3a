pub mod ty;
pub mod value;

pub use ty::{PropertyType, MAX_ARRAY_LEN, MIN_ARRAY_LEN};
pub use value::{float_is_integral, PropertyValue};
