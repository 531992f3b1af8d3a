//! The link table: directed edges from a `ScriptOutput` property to a
//! `ScriptInput`/`BindingInput` property, at most one incoming link per
//! target, rejecting anything that would make the node graph cyclic.

use std::collections::{HashMap, HashSet};

use nodelogic_ids::{NodeId, PropertyId};

use crate::error::{EngineError, EngineResult};
use crate::node::NodeArena;
use crate::property::PropertyArena;

#[derive(Default)]
pub struct LinkTable {
    /// target -> source
    incoming: HashMap<PropertyId, PropertyId>,
    /// source -> targets, for fast fan-out during an update pass
    outgoing: HashMap<PropertyId, Vec<PropertyId>>,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_linked(&self, target: PropertyId) -> bool {
        self.incoming.contains_key(&target)
    }

    pub fn source_of(&self, target: PropertyId) -> Option<PropertyId> {
        self.incoming.get(&target).copied()
    }

    pub fn targets_of(&self, source: PropertyId) -> &[PropertyId] {
        self.outgoing.get(&source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every `(source, target)` edge currently in the table.
    pub fn iter(&self) -> impl Iterator<Item = (PropertyId, PropertyId)> + '_ {
        self.incoming.iter().map(|(&target, &source)| (source, target))
    }

    pub fn link(
        &mut self,
        props: &mut PropertyArena,
        nodes: &NodeArena,
        source: PropertyId,
        target: PropertyId,
    ) -> EngineResult<()> {
        let source_prop = props.get(source).ok_or(EngineError::ForeignObject)?;
        let target_prop = props.get(target).ok_or(EngineError::ForeignObject)?;

        if source_prop.owner() == target_prop.owner() {
            return Err(EngineError::SemanticsViolation {
                property: target_prop.name().to_string(),
                message: "cannot link a node's own output to its own input".into(),
            });
        }
        if !source_prop.semantics().can_be_link_source() {
            return Err(EngineError::SemanticsViolation {
                property: source_prop.name().to_string(),
                message: "link source must be a ScriptOutput".into(),
            });
        }
        if !target_prop.semantics().can_be_link_target() {
            return Err(EngineError::SemanticsViolation {
                property: target_prop.name().to_string(),
                message: "link target must be a ScriptInput or BindingInput".into(),
            });
        }
        if source_prop.ty() != target_prop.ty() {
            return Err(EngineError::TypeMismatch {
                expected: source_prop.ty().clone(),
                found: target_prop.ty().clone(),
            });
        }
        if self.incoming.contains_key(&target) {
            return Err(EngineError::LinkExists {
                target: target_prop.name().to_string(),
            });
        }

        let source_owner = source_prop.owner();
        let target_owner = target_prop.owner();
        if self.would_create_cycle(props, nodes, source_owner, target_owner) {
            return Err(EngineError::Cycle {
                from: format!("{source_owner}"),
                target: format!("{target_owner}"),
            });
        }

        self.incoming.insert(target, source);
        self.outgoing.entry(source).or_default().push(target);
        props.get_mut(target).unwrap().set_is_linked_input(true);
        Ok(())
    }

    pub fn unlink(&mut self, props: &mut PropertyArena, source: PropertyId, target: PropertyId) -> EngineResult<()> {
        match self.incoming.get(&target) {
            Some(&existing) if existing == source => {
                self.incoming.remove(&target);
                if let Some(targets) = self.outgoing.get_mut(&source) {
                    targets.retain(|&t| t != target);
                }
                if let Some(p) = props.get_mut(target) {
                    p.set_is_linked_input(false);
                }
                Ok(())
            }
            _ => {
                let name = |id: PropertyId| {
                    props.get(id).map(|p| p.name().to_string()).unwrap_or_default()
                };
                Err(EngineError::NoSuchLink {
                    from: name(source),
                    target: name(target),
                })
            }
        }
    }

    /// `true` if adding an edge `source_owner -> target_owner` would
    /// create a cycle in the node-level dependency graph, i.e. if
    /// `target_owner` can already reach `source_owner` through existing
    /// links.
    fn would_create_cycle(
        &self,
        props: &PropertyArena,
        nodes: &NodeArena,
        source_owner: NodeId,
        target_owner: NodeId,
    ) -> bool {
        let _ = nodes;
        if source_owner == target_owner {
            return true;
        }
        let mut visited = HashSet::new();
        let mut stack = vec![target_owner];
        while let Some(current) = stack.pop() {
            if current == source_owner {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            for (&target, &source) in &self.incoming {
                let edge_target_owner = match props.get(target) {
                    Some(p) => p.owner(),
                    None => continue,
                };
                let edge_source_owner = match props.get(source) {
                    Some(p) => p.owner(),
                    None => continue,
                };
                if edge_source_owner == current {
                    stack.push(edge_target_owner);
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{Property, Semantics};
    use nodelogic_value::PropertyType;

    fn make_leaf(arena: &mut PropertyArena, owner: NodeId, semantics: Semantics) -> PropertyId {
        Property::build(arena, owner, None, "p", PropertyType::Int32, semantics)
    }

    #[test]
    fn link_rejects_same_node() {
        let mut props = PropertyArena::new();
        let nodes = NodeArena::new();
        let owner = NodeId::from_parts(1, 0);
        let out = make_leaf(&mut props, owner, Semantics::ScriptOutput);
        let inp = make_leaf(&mut props, owner, Semantics::ScriptInput);
        let mut links = LinkTable::new();
        assert!(links.link(&mut props, &nodes, out, inp).is_err());
    }

    #[test]
    fn link_rejects_type_mismatch() {
        let mut props = PropertyArena::new();
        let nodes = NodeArena::new();
        let a = NodeId::from_parts(1, 0);
        let b = NodeId::from_parts(2, 0);
        let out = make_leaf(&mut props, a, Semantics::ScriptOutput);
        let inp = Property::build(&mut props, b, None, "p", PropertyType::Float, Semantics::ScriptInput);
        let mut links = LinkTable::new();
        assert!(links.link(&mut props, &nodes, out, inp).is_err());
    }

    #[test]
    fn second_link_to_same_target_is_rejected() {
        let mut props = PropertyArena::new();
        let nodes = NodeArena::new();
        let a = NodeId::from_parts(1, 0);
        let b = NodeId::from_parts(2, 0);
        let c = NodeId::from_parts(3, 0);
        let out1 = make_leaf(&mut props, a, Semantics::ScriptOutput);
        let out2 = make_leaf(&mut props, b, Semantics::ScriptOutput);
        let inp = make_leaf(&mut props, c, Semantics::ScriptInput);
        let mut links = LinkTable::new();
        links.link(&mut props, &nodes, out1, inp).unwrap();
        assert!(links.link(&mut props, &nodes, out2, inp).is_err());
    }

    #[test]
    fn cycle_is_rejected() {
        let mut props = PropertyArena::new();
        let nodes = NodeArena::new();
        let a = NodeId::from_parts(1, 0);
        let b = NodeId::from_parts(2, 0);
        let a_out = make_leaf(&mut props, a, Semantics::ScriptOutput);
        let b_in = make_leaf(&mut props, b, Semantics::ScriptInput);
        let b_out = make_leaf(&mut props, b, Semantics::ScriptOutput);
        let a_in = make_leaf(&mut props, a, Semantics::ScriptInput);
        let mut links = LinkTable::new();
        links.link(&mut props, &nodes, a_out, b_in).unwrap();
        assert!(links.link(&mut props, &nodes, b_out, a_in).is_err());
    }

    #[test]
    fn unlink_then_relink_succeeds() {
        let mut props = PropertyArena::new();
        let nodes = NodeArena::new();
        let a = NodeId::from_parts(1, 0);
        let b = NodeId::from_parts(2, 0);
        let out = make_leaf(&mut props, a, Semantics::ScriptOutput);
        let inp = make_leaf(&mut props, b, Semantics::ScriptInput);
        let mut links = LinkTable::new();
        links.link(&mut props, &nodes, out, inp).unwrap();
        links.unlink(&mut props, out, inp).unwrap();
        assert!(!links.is_linked(inp));
        links.link(&mut props, &nodes, out, inp).unwrap();
        assert!(links.is_linked(inp));
    }
}
