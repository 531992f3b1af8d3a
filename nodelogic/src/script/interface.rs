use mlua::{Function, Lua, Table};

use nodelogic_value::{PropertyType, MAX_ARRAY_LEN, MIN_ARRAY_LEN};

use super::types_bridge::InterfaceBuilder;
use crate::error::{EngineError, EngineResult};

/// Calls a compiled script's `interface(IN, OUT)` and returns the
/// `(input, output)` shapes it declared. `Type` is already installed in
/// `sandbox` by the host at compile time.
pub fn extract_interface(
    _lua: &Lua,
    name: &str,
    sandbox: &Table,
) -> EngineResult<(PropertyType, PropertyType)> {
    let interface_fn: Function = sandbox.get("interface").map_err(|_| EngineError::InterfaceError {
        name: name.into(),
        message: "script does not define interface(IN, OUT)".into(),
    })?;

    let in_builder = InterfaceBuilder::default();
    let out_builder = InterfaceBuilder::default();
    interface_fn
        .call::<_, ()>((in_builder.clone(), out_builder.clone()))
        .map_err(|e| EngineError::InterfaceError {
            name: name.into(),
            message: e.to_string(),
        })?;

    let in_ty = PropertyType::Struct(
        in_builder.0.borrow().iter().map(|(n, t)| (n.as_str().into(), t.clone())).collect(),
    );
    let out_ty = PropertyType::Struct(
        out_builder.0.borrow().iter().map(|(n, t)| (n.as_str().into(), t.clone())).collect(),
    );

    validate_shape(name, &in_ty)?;
    validate_shape(name, &out_ty)?;
    Ok((in_ty, out_ty))
}

fn validate_shape(name: &str, ty: &PropertyType) -> EngineResult<()> {
    validate_shape_inner(name, ty, false)
}

fn validate_shape_inner(name: &str, ty: &PropertyType, inside_array: bool) -> EngineResult<()> {
    match ty {
        PropertyType::Array { len, element } => {
            if inside_array {
                return Err(EngineError::InterfaceError {
                    name: name.into(),
                    message: "arrays of arrays are not supported".into(),
                });
            }
            if !(MIN_ARRAY_LEN..=MAX_ARRAY_LEN).contains(len) {
                return Err(EngineError::InterfaceError {
                    name: name.into(),
                    message: format!(
                        "array length {len} out of range [{MIN_ARRAY_LEN}, {MAX_ARRAY_LEN}]"
                    ),
                });
            }
            validate_shape_inner(name, element, true)
        }
        PropertyType::Struct(fields) => {
            let mut seen = std::collections::HashSet::new();
            for (fname, fty) in fields {
                if !seen.insert(fname.clone()) {
                    return Err(EngineError::InterfaceError {
                        name: name.into(),
                        message: format!("duplicate field name '{fname}'"),
                    });
                }
                validate_shape_inner(name, fty, false)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_field_name_is_rejected() {
        let ty = PropertyType::Struct(vec![
            ("a".into(), PropertyType::Int32),
            ("a".into(), PropertyType::Float),
        ]);
        assert!(validate_shape("s", &ty).is_err());
    }

    #[test]
    fn array_of_array_is_rejected() {
        let ty = PropertyType::array(2, PropertyType::array(2, PropertyType::Int32));
        assert!(validate_shape("s", &ty).is_err());
    }

    #[test]
    fn array_length_out_of_range_is_rejected() {
        let ty = PropertyType::array(0, PropertyType::Int32);
        assert!(validate_shape("s", &ty).is_err());
    }

    #[test]
    fn array_of_struct_with_array_field_is_accepted() {
        // Array-of-struct where a struct field is itself an array is a
        // legal shape: only direct array-of-array nesting is forbidden.
        let ty = PropertyType::array(
            2,
            PropertyType::Struct(vec![("f".into(), PropertyType::array(3, PropertyType::Int32))]),
        );
        assert!(validate_shape("s", &ty).is_ok());
    }
}
