//! Per-node state for a `Script` node: the compiled [`ScriptUnit`] plus
//! the `IN`/`OUT` property roots built from its declared interface.

use nodelogic_ids::{NodeId, PropertyId};

use super::host::{build_script_properties, ScriptHost, ScriptUnit};
use crate::error::EngineResult;
use crate::property::PropertyArena;

pub struct ScriptData {
    pub unit: ScriptUnit,
    pub input_root: PropertyId,
    pub output_root: PropertyId,
    /// Modules this script imports, so `destroy()` can refuse to remove
    /// a module still in use.
    pub imports: Vec<NodeId>,
    initialized: bool,
}

impl ScriptData {
    pub fn new(
        host: &ScriptHost,
        arena: &mut PropertyArena,
        owner: NodeId,
        unit: ScriptUnit,
        imports: Vec<NodeId>,
    ) -> EngineResult<Self> {
        let (in_ty, out_ty) = host.interface(&unit)?;
        let (input_root, output_root) = build_script_properties(arena, owner, in_ty, out_ty);
        Ok(Self {
            unit,
            input_root,
            output_root,
            imports,
            initialized: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.unit.name
    }

    /// Runs `init()` once (if declared) and then `run()` every call.
    pub fn update(&mut self, host: &ScriptHost, arena: &mut PropertyArena, owner: NodeId) -> EngineResult<Vec<String>> {
        if !self.initialized {
            if host.has_init(&self.unit) {
                host.call_init(&self.unit, owner)?;
            }
            self.initialized = true;
        }
        host.call_run(&self.unit, owner, arena, self.input_root, self.output_root)?;
        Ok(host.drain_log(&self.unit))
    }
}
