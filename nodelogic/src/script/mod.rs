//! The embedded scripting language: a sandboxed Lua runtime (via `mlua`)
//! in which each `Script` node declares a typed `interface(IN, OUT)` and
//! an update body `run(IN, OUT)`, with an optional one-time `init()`.
//! `LuaModule` nodes hold reusable helper code scripts can import.

pub mod host;
pub mod interface;
pub mod marshal;
pub mod module;
pub mod types_bridge;
pub mod unit;

pub use host::{ModuleUnit, ScriptHost, ScriptUnit};
pub use module::LuaModuleData;
pub use unit::ScriptData;
