//! Owns the single shared [`mlua::Lua`] runtime every script and module
//! in the engine compiles and runs against. One runtime is shared rather
//! than one per script so that module tables can be handed from one
//! sandbox to another without crossing Lua state boundaries.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use mlua::{Function, Lua, RegistryKey, Table, Value, Variadic};

use crate::error::{EngineError, EngineResult};

use super::interface::extract_interface;
use super::marshal::{harvest_table_into, property_to_lua, validate_lua_shape};
use super::types_bridge::install_type_global;
use nodelogic_ids::{NodeId, PropertyId};
use nodelogic_value::PropertyType;

/// The only globals a script or module may declare at its top level
/// without going through `GLOBAL`.
const ENTRY_POINTS: [&str; 3] = ["interface", "run", "init"];

fn display_lua_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.to_str().unwrap_or("<invalid utf8>").to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        other => format!("{other:?}"),
    }
}

use crate::property::{Property, PropertyArena, Semantics};

/// Base library surface exposed to every sandbox. No `io`, `os`,
/// `package`, `require`, `dofile`, or `load` — a script cannot touch the
/// filesystem, spawn processes, or escape its own sandbox table.
const ALLOWED_GLOBALS: &[&str] = &[
    "pairs", "ipairs", "next", "select", "tostring", "tonumber", "type", "error", "assert",
    "pcall", "xpcall", "unpack", "rawget", "rawset", "rawequal", "rawlen", "string", "math",
    "table",
];

pub struct ScriptHost {
    lua: Lua,
}

/// A compiled, already-sandboxed script: holds the registry key to its
/// `_ENV` table, which carries `interface`, `run`, and optionally `init`
/// as fields.
pub struct ScriptUnit {
    pub name: String,
    /// Kept so a save file can store it and recompile on load.
    pub source: String,
    env: RegistryKey,
    log: Rc<RefCell<Vec<String>>>,
}

/// A compiled module: holds the registry key to the table it returned.
pub struct ModuleUnit {
    pub name: String,
    pub source: String,
    exports: RegistryKey,
}

impl ScriptHost {
    pub fn new() -> Self {
        Self { lua: Lua::new() }
    }

    /// Builds a script/module's `_ENV` table. Reading an undeclared
    /// global is an error (no silent `nil`); writing a name that isn't
    /// already a key is only allowed for a first-time declaration of
    /// `interface`, `run`, or `init` (redeclaring any of the three is
    /// also an error) — anything else must go through the `GLOBAL`
    /// table instead of creating a bare global.
    fn build_sandbox(&self, log: Rc<RefCell<Vec<String>>>) -> mlua::Result<Table> {
        let globals = self.lua.globals();
        let sandbox = self.lua.create_table()?;
        for name in ALLOWED_GLOBALS {
            let v: Value = globals.get(*name)?;
            sandbox.set(*name, v)?;
        }
        let print_log = log;
        let print = self.lua.create_function(move |_, args: Variadic<Value>| {
            let line = args
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.to_str().unwrap_or_default().to_string(),
                    other => format!("{other:?}"),
                })
                .collect::<Vec<_>>()
                .join("\t");
            print_log.borrow_mut().push(line);
            Ok(())
        })?;
        sandbox.set("print", print)?;
        install_type_global(&self.lua, &sandbox)?;
        sandbox.set("GLOBAL", self.lua.create_table()?)?;

        // `interface`/`run`/`init` are never stored as raw keys on
        // `sandbox` itself; they live in this backing table instead, so
        // every later read AND every later write of these three names
        // keeps going through the metamethods below. A raw key, once
        // present, would make Lua skip `__newindex` on the next
        // assignment to it and silently accept a redefinition.
        let entry_values = self.lua.create_table()?;
        let entry_values_key = Rc::new(self.lua.create_registry_value(entry_values)?);

        let meta = self.lua.create_table()?;
        let index_key = entry_values_key.clone();
        let undeclared_read = self.lua.create_function(move |lua, (_, key): (Table, Value)| -> mlua::Result<Value> {
            if let Value::String(s) = &key {
                if let Ok(name) = s.to_str() {
                    if ENTRY_POINTS.contains(&name) {
                        let index_entries: Table = lua.registry_value(&index_key)?;
                        let v: Value = index_entries.raw_get(name)?;
                        if !matches!(v, Value::Nil) {
                            return Ok(v);
                        }
                    }
                }
            }
            Err(mlua::Error::RuntimeError(format!(
                "undeclared global '{}'",
                display_lua_key(&key)
            )))
        })?;
        meta.set("__index", undeclared_read)?;

        let declared_entry_points: Rc<RefCell<HashSet<&'static str>>> = Rc::new(RefCell::new(HashSet::new()));
        let newindex_key = entry_values_key;
        let guard_write = self.lua.create_function(move |lua, (_, key, value): (Table, Value, Value)| -> mlua::Result<()> {
            let key_str = match &key {
                Value::String(s) => s.to_str()?.to_string(),
                other => {
                    return Err(mlua::Error::RuntimeError(format!(
                        "global keys must be strings, got {}",
                        display_lua_key(other)
                    )))
                }
            };
            if let Some(entry) = ENTRY_POINTS.iter().copied().find(|n| *n == key_str) {
                if !declared_entry_points.borrow_mut().insert(entry) {
                    return Err(mlua::Error::RuntimeError(format!(
                        "redefinition of '{entry}' is not allowed"
                    )));
                }
                let newindex_entries: Table = lua.registry_value(&newindex_key)?;
                return newindex_entries.raw_set(key_str, value);
            }
            Err(mlua::Error::RuntimeError(format!(
                "cannot create global '{key_str}'; assign to GLOBAL.{key_str} instead"
            )))
        })?;
        meta.set("__newindex", guard_write)?;
        sandbox.set_metatable(Some(meta));
        Ok(sandbox)
    }

    pub fn compile_module(&self, name: &str, source: &str, imports: &[(&str, &ModuleUnit)]) -> EngineResult<ModuleUnit> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sandbox = self
            .build_sandbox(log)
            .map_err(|e| ParseErr(name, e))?;
        for (bind_name, module) in imports {
            let exported: Table = self
                .lua
                .registry_value(&module.exports)
                .map_err(|e| ParseErr(name, e))?;
            sandbox.raw_set(*bind_name, exported).map_err(|e| ParseErr(name, e))?;
        }
        let exports: Table = self
            .lua
            .load(source)
            .set_name(name)
            .set_environment(sandbox)
            .eval()
            .map_err(|e| EngineError::ParseError {
                name: name.into(),
                message: e.to_string(),
            })?;
        let key = self
            .lua
            .create_registry_value(exports)
            .map_err(|e| ParseErr(name, e))?;
        Ok(ModuleUnit {
            name: name.into(),
            source: source.into(),
            exports: key,
        })
    }

    pub fn compile_script(
        &self,
        name: &str,
        source: &str,
        imports: &[(&str, &ModuleUnit)],
    ) -> EngineResult<ScriptUnit> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sandbox = self.build_sandbox(log.clone()).map_err(|e| ParseErr(name, e))?;
        for (bind_name, module) in imports {
            let exported: Table = self
                .lua
                .registry_value(&module.exports)
                .map_err(|e| ParseErr(name, e))?;
            sandbox.raw_set(*bind_name, exported).map_err(|e| ParseErr(name, e))?;
        }
        self.lua
            .load(source)
            .set_name(name)
            .set_environment(sandbox.clone())
            .exec()
            .map_err(|e| EngineError::ParseError {
                name: name.into(),
                message: e.to_string(),
            })?;
        let env = self
            .lua
            .create_registry_value(sandbox)
            .map_err(|e| ParseErr(name, e))?;
        Ok(ScriptUnit {
            name: name.into(),
            source: source.into(),
            env,
            log,
        })
    }

    pub fn interface(&self, unit: &ScriptUnit) -> EngineResult<(PropertyType, PropertyType)> {
        let sandbox: Table = self
            .lua
            .registry_value(&unit.env)
            .map_err(|e| ParseErr(&unit.name, e))?;
        extract_interface(&self.lua, &unit.name, &sandbox)
    }

    pub fn has_init(&self, unit: &ScriptUnit) -> bool {
        let sandbox: Table = match self.lua.registry_value(&unit.env) {
            Ok(t) => t,
            Err(_) => return false,
        };
        matches!(sandbox.get::<_, Value>("init"), Ok(Value::Function(_)))
    }

    /// Calls `init()` once. Globals written here (rather than into a
    /// local) persist for the script's lifetime inside its own sandbox
    /// table, visible to `run()` as upvalues on subsequent calls.
    pub fn call_init(&self, unit: &ScriptUnit, owner: NodeId) -> EngineResult<()> {
        let sandbox: Table = self
            .lua
            .registry_value(&unit.env)
            .map_err(|e| RuntimeErr(&unit.name, owner, e))?;
        let init: Function = sandbox.get("init").map_err(|e| RuntimeErr(&unit.name, owner, e))?;
        init.call::<_, ()>(()).map_err(|e| RuntimeErr(&unit.name, owner, e).into())
    }

    /// Calls `run(IN, OUT)`. `IN` is a proxy table backed by a snapshot
    /// of the input subtree: every read falls through to the snapshot,
    /// every write is rejected outright. `OUT` is a proxy backed by an
    /// initially empty store: every write is checked against the output
    /// interface's field name and shape before being accepted, so a bad
    /// assignment aborts `run()` at the point it happens rather than
    /// after the fact.
    pub fn call_run(
        &self,
        unit: &ScriptUnit,
        owner: NodeId,
        arena: &mut PropertyArena,
        input_root: PropertyId,
        output_root: PropertyId,
    ) -> EngineResult<()> {
        let sandbox: Table = self
            .lua
            .registry_value(&unit.env)
            .map_err(|e| RuntimeErr(&unit.name, owner, e))?;
        let run: Function = sandbox.get("run").map_err(|e| RuntimeErr(&unit.name, owner, e))?;

        let in_data = match property_to_lua(&self.lua, arena, input_root) {
            Ok(Value::Table(t)) => t,
            _ => self.lua.create_table().map_err(|e| RuntimeErr(&unit.name, owner, e))?,
        };
        let in_table = self.lua.create_table().map_err(|e| RuntimeErr(&unit.name, owner, e))?;
        let in_meta = self.lua.create_table().map_err(|e| RuntimeErr(&unit.name, owner, e))?;
        in_meta.set("__index", in_data).map_err(|e| RuntimeErr(&unit.name, owner, e))?;
        let deny_write = self
            .lua
            .create_function(|_, (_, key, _): (Table, Value, Value)| -> mlua::Result<()> {
                Err(mlua::Error::RuntimeError(format!(
                    "IN is read-only; cannot assign to IN.{}",
                    display_lua_key(&key)
                )))
            })
            .map_err(|e| RuntimeErr(&unit.name, owner, e))?;
        in_meta.set("__newindex", deny_write).map_err(|e| RuntimeErr(&unit.name, owner, e))?;
        in_table.set_metatable(Some(in_meta));

        let out_store = self.lua.create_table().map_err(|e| RuntimeErr(&unit.name, owner, e))?;
        let out_table = self.lua.create_table().map_err(|e| RuntimeErr(&unit.name, owner, e))?;
        let out_meta = self.lua.create_table().map_err(|e| RuntimeErr(&unit.name, owner, e))?;
        out_meta
            .set("__index", out_store.clone())
            .map_err(|e| RuntimeErr(&unit.name, owner, e))?;
        let out_fields = match arena.get(output_root).unwrap().ty() {
            PropertyType::Struct(fields) => fields.clone(),
            _ => Vec::new(),
        };
        let validate_write = {
            let out_store_key = self
                .lua
                .create_registry_value(out_store.clone())
                .map_err(|e| RuntimeErr(&unit.name, owner, e))?;
            self.lua
                .create_function(move |lua, (_, key, value): (Table, Value, Value)| -> mlua::Result<()> {
                    let key_str = match &key {
                        Value::String(s) => s.to_str()?.to_string(),
                        other => {
                            return Err(mlua::Error::RuntimeError(format!(
                                "OUT keys must be strings, got {}",
                                display_lua_key(other)
                            )))
                        }
                    };
                    let field_ty = out_fields
                        .iter()
                        .find(|(name, _)| name.as_ref() == key_str)
                        .map(|(_, ty)| ty)
                        .ok_or_else(|| {
                            mlua::Error::RuntimeError(format!("OUT has no field named '{key_str}'"))
                        })?;
                    validate_lua_shape(&value, field_ty).map_err(|message| {
                        mlua::Error::RuntimeError(format!("OUT.{key_str}: {message}"))
                    })?;
                    let out_store: Table = lua.registry_value(&out_store_key)?;
                    out_store.raw_set(key_str, value)
                })
                .map_err(|e| RuntimeErr(&unit.name, owner, e))?
        };
        out_meta
            .set("__newindex", validate_write)
            .map_err(|e| RuntimeErr(&unit.name, owner, e))?;
        out_table.set_metatable(Some(out_meta));

        run.call::<_, ()>((in_table, out_table))
            .map_err(|e| RuntimeErr(&unit.name, owner, e))?;

        harvest_table_into(&unit.name, &out_store, arena, output_root)?;
        Ok(())
    }

    pub fn drain_log(&self, unit: &ScriptUnit) -> Vec<String> {
        unit.log.borrow_mut().drain(..).collect()
    }
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new()
    }
}

struct ParseErr<'a>(&'a str, mlua::Error);
impl From<ParseErr<'_>> for EngineError {
    fn from(e: ParseErr<'_>) -> Self {
        EngineError::ParseError {
            name: e.0.into(),
            message: e.1.to_string(),
        }
    }
}

struct RuntimeErr<'a>(&'a str, NodeId, mlua::Error);
impl From<RuntimeErr<'_>> for EngineError {
    fn from(e: RuntimeErr<'_>) -> Self {
        let stack_trace = e.2.to_string();
        EngineError::RuntimeError {
            name: e.0.into(),
            node: e.1,
            message: "script raised an error during run()".into(),
            stack_trace,
        }
    }
}

// Shared Property/Semantics imports above are used by callers building
// script IN/OUT roots; re-exported here for convenience.
pub fn build_script_properties(
    arena: &mut PropertyArena,
    owner: NodeId,
    in_ty: PropertyType,
    out_ty: PropertyType,
) -> (PropertyId, PropertyId) {
    let input_root = Property::build(arena, owner, None, "IN", in_ty, Semantics::ScriptInput);
    let output_root = Property::build(arena, owner, None, "OUT", out_ty, Semantics::ScriptOutput);
    (input_root, output_root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ScriptData;
    use nodelogic_value::PropertyValue;

    fn owner() -> NodeId {
        NodeId::from_parts(1, 0)
    }

    fn build(host: &ScriptHost, arena: &mut PropertyArena, source: &str) -> ScriptData {
        let unit = host.compile_script("s", source, &[]).unwrap();
        ScriptData::new(host, arena, owner(), unit, Vec::new()).unwrap()
    }

    #[test]
    fn writing_to_in_is_rejected() {
        let host = ScriptHost::new();
        let mut arena = PropertyArena::new();
        let data = build(
            &host,
            &mut arena,
            r#"
            function interface(IN, OUT)
                IN.a = Type:Int32()
                OUT.b = Type:Int32()
            end
            function run(IN, OUT)
                IN.a = 5
            end
            "#,
        );
        assert!(host
            .call_run(&data.unit, owner(), &mut arena, data.input_root, data.output_root)
            .is_err());
    }

    #[test]
    fn out_shape_mismatch_is_rejected_at_assignment() {
        let host = ScriptHost::new();
        let mut arena = PropertyArena::new();
        let data = build(
            &host,
            &mut arena,
            r#"
            function interface(IN, OUT)
                OUT.b = Type:Int32()
            end
            function run(IN, OUT)
                OUT.b = "not a number"
            end
            "#,
        );
        assert!(host
            .call_run(&data.unit, owner(), &mut arena, data.input_root, data.output_root)
            .is_err());
    }

    #[test]
    fn undeclared_global_read_in_init_is_an_error() {
        let host = ScriptHost::new();
        let mut arena = PropertyArena::new();
        let data = build(
            &host,
            &mut arena,
            r#"
            function interface(IN, OUT)
            end
            function init()
                local x = totally_undeclared
            end
            function run(IN, OUT)
            end
            "#,
        );
        assert!(host.call_init(&data.unit, owner()).is_err());
    }

    #[test]
    fn redefining_an_entry_point_fails_to_compile() {
        let host = ScriptHost::new();
        let err = host.compile_script(
            "s",
            r#"
            function interface(IN, OUT)
            end
            function run(IN, OUT)
            end
            function run(IN, OUT)
            end
            "#,
            &[],
        );
        assert!(err.is_err());
    }

    #[test]
    fn global_table_carries_state_between_init_and_run() {
        let host = ScriptHost::new();
        let mut arena = PropertyArena::new();
        let data = build(
            &host,
            &mut arena,
            r#"
            function interface(IN, OUT)
                OUT.v = Type:Int32()
            end
            function init()
                GLOBAL.counter = 41
            end
            function run(IN, OUT)
                GLOBAL.counter = GLOBAL.counter + 1
                OUT.v = GLOBAL.counter
            end
            "#,
        );
        host.call_init(&data.unit, owner()).unwrap();
        host.call_run(&data.unit, owner(), &mut arena, data.input_root, data.output_root)
            .unwrap();
        let v = arena
            .get(data.output_root)
            .unwrap()
            .get_child_by_name("v")
            .unwrap();
        assert_eq!(arena.get(v).unwrap().get_value(), Some(&PropertyValue::Int32(42)));
    }
}
