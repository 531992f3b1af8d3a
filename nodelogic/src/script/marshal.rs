//! Conversion between [`PropertyValue`]/[`Property`] trees and the plain
//! Lua tables scripts read `IN` from and write `OUT` into. Vectors and
//! arrays are 1-indexed on the Lua side; internal storage stays 0-indexed.

use mlua::{Lua, Table, Value};

use nodelogic_ids::PropertyId;
use nodelogic_value::{PropertyType, PropertyValue};

use crate::error::{EngineError, EngineResult};
use crate::property::{PropertyArena, PropertyData};

/// Snapshots the current value of the subtree rooted at `id` into a
/// fresh Lua value, recursing through struct/array children.
pub fn property_to_lua<'lua>(lua: &'lua Lua, arena: &PropertyArena, id: PropertyId) -> mlua::Result<Value<'lua>> {
    let prop = arena.get(id).expect("marshal: dangling property id");
    match prop.data() {
        PropertyData::Leaf(value) => leaf_to_lua(lua, value),
        PropertyData::Struct(fields) => {
            let table = lua.create_table()?;
            for (name, child) in fields {
                table.set(name.as_ref(), property_to_lua(lua, arena, *child)?)?;
            }
            Ok(Value::Table(table))
        }
        PropertyData::Array(items) => {
            let table = lua.create_table()?;
            for (i, child) in items.iter().enumerate() {
                table.set(i + 1, property_to_lua(lua, arena, *child)?)?;
            }
            Ok(Value::Table(table))
        }
    }
}

fn leaf_to_lua<'lua>(lua: &'lua Lua, value: &PropertyValue) -> mlua::Result<Value<'lua>> {
    Ok(match value {
        PropertyValue::Int32(v) => Value::Integer(*v as i64),
        PropertyValue::Int64(v) => Value::Integer(*v),
        PropertyValue::Float(v) => Value::Number(*v as f64),
        PropertyValue::Bool(v) => Value::Boolean(*v),
        PropertyValue::String(v) => Value::String(lua.create_string(v.as_ref())?),
        PropertyValue::Vec2i(v) => vec_to_lua(lua, &[v.x as f64, v.y as f64])?,
        PropertyValue::Vec3i(v) => vec_to_lua(lua, &[v.x as f64, v.y as f64, v.z as f64])?,
        PropertyValue::Vec4i(v) => vec_to_lua(lua, &[v.x as f64, v.y as f64, v.z as f64, v.w as f64])?,
        PropertyValue::Vec2f(v) => vec_to_lua(lua, &[v.x as f64, v.y as f64])?,
        PropertyValue::Vec3f(v) => vec_to_lua(lua, &[v.x as f64, v.y as f64, v.z as f64])?,
        PropertyValue::Vec4f(v) => vec_to_lua(lua, &[v.x as f64, v.y as f64, v.z as f64, v.w as f64])?,
    })
}

fn vec_to_lua<'lua>(lua: &'lua Lua, components: &[f64]) -> mlua::Result<Value<'lua>> {
    let table = lua.create_table()?;
    for (i, c) in components.iter().enumerate() {
        table.set(i + 1, *c)?;
    }
    Ok(Value::Table(table))
}

/// Copies every key present in `table` into the matching child of the
/// subtree rooted at `id`, recursing through struct/array children and
/// marking `has_new_value` on whatever was actually touched. Keys with
/// no matching child are rejected with `UnknownChild`; keys the script
/// did not set are left untouched.
pub fn harvest_table_into(
    name: &str,
    table: &Table,
    arena: &mut PropertyArena,
    id: PropertyId,
) -> EngineResult<bool> {
    let ty = arena.get(id).unwrap().ty().clone();
    let mut touched = false;
    match &ty {
        PropertyType::Struct(_) => {
            let children: Vec<(String, PropertyId)> = match arena.get(id).unwrap().data() {
                PropertyData::Struct(fields) => {
                    fields.iter().map(|(n, c)| (n.to_string(), *c)).collect()
                }
                _ => unreachable!(),
            };
            for pair in table.clone().pairs::<String, Value>() {
                let (key, value) = pair.map_err(|e| EngineError::RuntimeError {
                    name: name.into(),
                    node: arena.get(id).unwrap().owner(),
                    message: e.to_string(),
                    stack_trace: String::new(),
                })?;
                let child = children
                    .iter()
                    .find(|(n, _)| n == &key)
                    .map(|(_, c)| *c)
                    .ok_or_else(|| EngineError::UnknownChild {
                        property: arena.get(id).unwrap().name().to_string(),
                        key: key.clone(),
                    })?;
                if apply_value(name, &value, arena, child)? {
                    touched = true;
                }
            }
        }
        PropertyType::Array { .. } => {
            let children: Vec<PropertyId> = match arena.get(id).unwrap().data() {
                PropertyData::Array(items) => items.clone(),
                _ => unreachable!(),
            };
            for pair in table.clone().pairs::<i64, Value>() {
                let (index, value) = pair.map_err(|e| EngineError::RuntimeError {
                    name: name.into(),
                    node: arena.get(id).unwrap().owner(),
                    message: e.to_string(),
                    stack_trace: String::new(),
                })?;
                let child = *children
                    .get((index - 1).max(0) as usize)
                    .ok_or_else(|| EngineError::UnknownChild {
                        property: arena.get(id).unwrap().name().to_string(),
                        key: index.to_string(),
                    })?;
                if apply_value(name, &value, arena, child)? {
                    touched = true;
                }
            }
        }
        _ => unreachable!("harvest_table_into called on a leaf property"),
    }
    if touched {
        arena.get_mut(id).unwrap().mark_new_root();
    }
    Ok(touched)
}

/// Checks that `value` could legally be assigned to a property of type
/// `ty`, recursing through struct/array shape, without touching any
/// arena. Used to validate an `OUT` write synchronously, at the point
/// of assignment, before it is ever stored.
pub fn validate_lua_shape(value: &Value, ty: &PropertyType) -> Result<(), String> {
    match ty {
        PropertyType::Struct(fields) => {
            let table = match value {
                Value::Table(t) => t,
                _ => return Err("expected a table for a struct value".into()),
            };
            for pair in table.clone().pairs::<String, Value>() {
                let (key, v) = pair.map_err(|e| e.to_string())?;
                let field_ty = fields
                    .iter()
                    .find(|(name, _)| name.as_ref() == key)
                    .map(|(_, ty)| ty)
                    .ok_or_else(|| format!("no field named '{key}'"))?;
                validate_lua_shape(&v, field_ty)?;
            }
            Ok(())
        }
        PropertyType::Array { len, element } => {
            let table = match value {
                Value::Table(t) => t,
                _ => return Err("expected a table for an array value".into()),
            };
            for pair in table.clone().pairs::<i64, Value>() {
                let (index, v) = pair.map_err(|e| e.to_string())?;
                if index < 1 || index as usize > *len {
                    return Err(format!("array index {index} out of range [1, {len}]"));
                }
                validate_lua_shape(&v, element)?;
            }
            Ok(())
        }
        leaf => lua_value_to_property_value(value, leaf).map(|_| ()),
    }
}

fn apply_value(
    name: &str,
    value: &Value,
    arena: &mut PropertyArena,
    id: PropertyId,
) -> EngineResult<bool> {
    let ty = arena.get(id).unwrap().ty().clone();
    if ty.is_compound() {
        let table = match value {
            Value::Table(t) => t,
            _ => {
                return Err(EngineError::ShapeMismatch {
                    property: arena.get(id).unwrap().name().to_string(),
                    message: "expected a table for a struct/array output".into(),
                })
            }
        };
        return harvest_table_into(name, table, arena, id);
    }

    let pv = lua_value_to_property_value(value, &ty).map_err(|message| EngineError::ShapeMismatch {
        property: arena.get(id).unwrap().name().to_string(),
        message,
    })?;
    arena.get_mut(id).unwrap().script_output_set(pv)?;
    Ok(true)
}

fn lua_value_to_property_value(value: &Value, ty: &PropertyType) -> Result<PropertyValue, String> {
    match ty {
        PropertyType::Int32 => as_integral_number(value).map(|n| PropertyValue::Int32(n as i32)),
        PropertyType::Int64 => as_integral_number(value).map(|n| PropertyValue::Int64(n as i64)),
        PropertyType::Float => as_number(value).map(|n| PropertyValue::Float(n as f32)),
        PropertyType::Bool => match value {
            Value::Boolean(b) => Ok(PropertyValue::Bool(*b)),
            _ => Err("expected a boolean".into()),
        },
        PropertyType::String => match value {
            Value::String(s) => Ok(PropertyValue::String(s.to_str().unwrap_or_default().into())),
            _ => Err("expected a string".into()),
        },
        PropertyType::Vec2i => lua_array_f64(value, 2).map(|c| PropertyValue::Vec2i(glam::IVec2::new(c[0] as i32, c[1] as i32))),
        PropertyType::Vec3i => lua_array_f64(value, 3)
            .map(|c| PropertyValue::Vec3i(glam::IVec3::new(c[0] as i32, c[1] as i32, c[2] as i32))),
        PropertyType::Vec4i => lua_array_f64(value, 4)
            .map(|c| PropertyValue::Vec4i(glam::IVec4::new(c[0] as i32, c[1] as i32, c[2] as i32, c[3] as i32))),
        PropertyType::Vec2f => lua_array_f64(value, 2).map(|c| PropertyValue::Vec2f(glam::Vec2::new(c[0] as f32, c[1] as f32))),
        PropertyType::Vec3f => lua_array_f64(value, 3)
            .map(|c| PropertyValue::Vec3f(glam::Vec3::new(c[0] as f32, c[1] as f32, c[2] as f32))),
        PropertyType::Vec4f => lua_array_f64(value, 4)
            .map(|c| PropertyValue::Vec4f(glam::Vec4::new(c[0] as f32, c[1] as f32, c[2] as f32, c[3] as f32))),
        PropertyType::Struct(_) | PropertyType::Array { .. } => {
            Err("compound types are handled recursively".into())
        }
    }
}

fn as_number(value: &Value) -> Result<f64, String> {
    match value {
        Value::Integer(i) => Ok(*i as f64),
        Value::Number(n) => Ok(*n),
        _ => Err("expected a number".into()),
    }
}

fn as_integral_number(value: &Value) -> Result<f64, String> {
    let n = as_number(value)?;
    if !nodelogic_value::float_is_integral(n) {
        return Err(format!("{n} is not a whole number"));
    }
    Ok(n)
}

fn lua_array_f64(value: &Value, len: usize) -> Result<Vec<f64>, String> {
    let table = match value {
        Value::Table(t) => t,
        _ => return Err("expected a vector table".into()),
    };
    let mut out = Vec::with_capacity(len);
    for i in 1..=len {
        let v: Value = table.get(i).map_err(|e| e.to_string())?;
        out.push(as_number(&v)?);
    }
    Ok(out)
}
