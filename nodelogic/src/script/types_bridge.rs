//! The `Type` global and the `IN`/`OUT` builders scripts use inside
//! `interface(IN, OUT)` to declare their property shapes, e.g.
//! `IN.speed = Type:Float()` or `IN.offset = Type:Struct({x = Type:Int32()})`.

use std::cell::RefCell;
use std::rc::Rc;

use mlua::{Lua, MetaMethod, Result as LuaResult, Table, UserData, UserDataMethods, Value};

use nodelogic_value::PropertyType;

/// A type descriptor produced by calling e.g. `Type:Int32()`.
#[derive(Clone)]
pub struct TypeMarker(pub PropertyType);

impl UserData for TypeMarker {}

fn type_marker_from_value(value: &Value) -> LuaResult<PropertyType> {
    match value {
        Value::UserData(ud) => {
            let marker = ud.borrow::<TypeMarker>()?;
            Ok(marker.0.clone())
        }
        other => Err(mlua::Error::FromLuaConversionError {
            from: other.type_name(),
            to: "Type",
            message: Some("expected a value produced by Type:*()".into()),
        }),
    }
}

/// Records `name = TypeMarker` assignments in declaration order; backs
/// both `IN` and `OUT` while `interface()` runs.
#[derive(Clone, Default)]
pub struct InterfaceBuilder(pub Rc<RefCell<Vec<(String, PropertyType)>>>);

impl UserData for InterfaceBuilder {
    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::NewIndex, |_, this, (key, value): (String, Value)| {
            let ty = type_marker_from_value(&value)?;
            this.0.borrow_mut().push((key, ty));
            Ok(())
        });
        methods.add_meta_method(MetaMethod::Index, |_, this, key: String| {
            Ok(this
                .0
                .borrow()
                .iter()
                .find(|(name, _)| name == &key)
                .is_some())
        });
    }
}

/// Installs the `Type` global into `sandbox`. `Type:Int32()` etc. read as
/// method calls (colon syntax) so `Type` itself never needs state.
pub fn install_type_global(lua: &Lua, sandbox: &Table) -> LuaResult<()> {
    let type_table = lua.create_table()?;

    macro_rules! scalar {
        ($name:literal, $ty:expr) => {
            type_table.set(
                $name,
                lua.create_function(|_, _: Table| Ok(TypeMarker($ty)))?,
            )?;
        };
    }
    scalar!("Int32", PropertyType::Int32);
    scalar!("Int64", PropertyType::Int64);
    scalar!("Float", PropertyType::Float);
    scalar!("Bool", PropertyType::Bool);
    scalar!("String", PropertyType::String);
    scalar!("Vec2i", PropertyType::Vec2i);
    scalar!("Vec3i", PropertyType::Vec3i);
    scalar!("Vec4i", PropertyType::Vec4i);
    scalar!("Vec2f", PropertyType::Vec2f);
    scalar!("Vec3f", PropertyType::Vec3f);
    scalar!("Vec4f", PropertyType::Vec4f);

    // Field order matters (it is part of the type's identity), so a
    // struct is declared as a sequence of single-key tables rather than
    // one table literal, whose string-key order Lua does not promise:
    // `Type:Struct({ {x = Type:Int32()}, {y = Type:Float()} })`.
    type_table.set(
        "Struct",
        lua.create_function(|_, (_self, fields): (Table, Table)| {
            let mut out = Vec::new();
            for entry in fields.sequence_values::<Table>() {
                let entry = entry?;
                let (name, value): (String, Value) = entry
                    .pairs::<String, Value>()
                    .next()
                    .ok_or_else(|| mlua::Error::RuntimeError("empty struct field entry".into()))??;
                let ty = type_marker_from_value(&value)?;
                out.push((name.into(), ty));
            }
            Ok(TypeMarker(PropertyType::Struct(out)))
        })?,
    )?;
    type_table.set(
        "Array",
        lua.create_function(|_, (_self, len, element): (Table, usize, Value)| {
            let element_ty = type_marker_from_value(&element)?;
            Ok(TypeMarker(PropertyType::array(len, element_ty)))
        })?,
    )?;

    sandbox.set("Type", type_table)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_markers_produce_the_right_type() {
        let lua = Lua::new();
        let sandbox = lua.create_table().unwrap();
        install_type_global(&lua, &sandbox).unwrap();
        lua.load("return Type:Float()")
            .set_environment(sandbox)
            .eval::<mlua::AnyUserData>()
            .unwrap();
    }

    #[test]
    fn struct_marker_preserves_declaration_order() {
        let lua = Lua::new();
        let sandbox = lua.create_table().unwrap();
        install_type_global(&lua, &sandbox).unwrap();
        let result = lua
            .load("return Type:Struct({ {b = Type:Int32()}, {a = Type:Float()} })")
            .set_environment(sandbox)
            .eval::<mlua::AnyUserData>()
            .unwrap();
        let ty = result.borrow::<TypeMarker>().unwrap().0.clone();
        match ty {
            PropertyType::Struct(fields) => {
                let names: Vec<&str> = fields.iter().map(|(n, _)| n.as_ref()).collect();
                assert_eq!(names, ["b", "a"]);
            }
            other => panic!("expected a struct marker, got {other:?}"),
        }
    }

    #[test]
    fn interface_builder_records_assignment_order() {
        let builder = InterfaceBuilder::default();
        let lua = Lua::new();
        let sandbox = lua.create_table().unwrap();
        install_type_global(&lua, &sandbox).unwrap();
        sandbox.set("IN", builder.clone()).unwrap();
        lua.load("IN.b = Type:Int32(); IN.a = Type:Float()")
            .set_environment(sandbox)
            .exec()
            .unwrap();
        let recorded: Vec<String> = builder.0.borrow().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(recorded, vec!["b".to_string(), "a".to_string()]);
    }
}
