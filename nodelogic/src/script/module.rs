//! `LuaModule`: a table of shared helper functions/constants a script can
//! import. Modules may import other modules, forming a DAG; a cycle is
//! rejected at the point the importing module would be added.

use std::collections::{HashMap, HashSet};

use nodelogic_ids::NodeId;

use super::host::ModuleUnit;
use crate::error::EngineError;

pub struct LuaModuleData {
    pub unit: ModuleUnit,
    pub imports: Vec<NodeId>,
}

impl LuaModuleData {
    pub fn new(unit: ModuleUnit, imports: Vec<NodeId>) -> Self {
        Self { unit, imports }
    }
}

/// Checks that adding an edge `importer -> each of imports` would not
/// create a cycle in the existing module import graph. `edges` maps an
/// already-registered module's id to the modules it imports.
pub fn would_cycle(
    edges: &HashMap<NodeId, Vec<NodeId>>,
    importer: NodeId,
    imports: &[NodeId],
) -> Result<(), EngineError> {
    for &imported in imports {
        if imported == importer {
            return Err(EngineError::Cycle {
                from: format!("{imported}"),
                target: format!("{importer}"),
            });
        }
        let mut visited = HashSet::new();
        let mut stack = vec![imported];
        while let Some(current) = stack.pop() {
            if current == importer {
                return Err(EngineError::Cycle {
                    from: format!("{imported}"),
                    target: format!("{importer}"),
                });
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(children) = edges.get(&current) {
                stack.extend(children.iter().copied());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_self_import_is_a_cycle() {
        let edges = HashMap::new();
        let a = NodeId::from_parts(1, 0);
        assert!(would_cycle(&edges, a, &[a]).is_err());
    }

    #[test]
    fn transitive_cycle_is_detected() {
        let a = NodeId::from_parts(1, 0);
        let b = NodeId::from_parts(2, 0);
        let mut edges = HashMap::new();
        edges.insert(b, vec![a]);
        // a wants to import b, but b already imports a.
        assert!(would_cycle(&edges, a, &[b]).is_err());
    }

    #[test]
    fn independent_modules_are_fine() {
        let a = NodeId::from_parts(1, 0);
        let b = NodeId::from_parts(2, 0);
        let edges = HashMap::new();
        assert!(would_cycle(&edges, a, &[b]).is_ok());
    }
}
