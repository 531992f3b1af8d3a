//! The node dependency graph and the update pass it schedules. One
//! vertex per node, one edge per link (source node -> target node);
//! `update()` visits nodes in topological order, propagating linked
//! values immediately ahead of each node's own evaluation.

use std::collections::HashMap;

use nodelogic_ids::NodeId;

use crate::error::EngineError;
use crate::link::LinkTable;
use crate::node::{Node, NodeArena, NodeKind};
use crate::property::{deep_copy, PropertyArena};
use crate::script::ScriptHost;

/// Deterministic topological order: ties between independently-ready
/// nodes break on ascending `(index, generation)`, so the same graph
/// always schedules the same way regardless of insertion history.
pub fn topo_order(nodes: &NodeArena, props: &PropertyArena, links: &LinkTable) -> Vec<NodeId> {
    let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
    let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for (id, _) in nodes.iter() {
        in_degree.entry(id).or_insert(0);
    }
    for (source, target) in links.iter() {
        let (Some(sp), Some(tp)) = (props.get(source), props.get(target)) else {
            continue;
        };
        let (a, b) = (sp.owner(), tp.owner());
        if a == b {
            continue;
        }
        adjacency.entry(a).or_default().push(b);
        *in_degree.entry(b).or_insert(0) += 1;
    }

    let mut order = Vec::with_capacity(in_degree.len());
    let mut remaining = in_degree;
    loop {
        let mut ready: Vec<NodeId> = remaining
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();
        if ready.is_empty() {
            break;
        }
        ready.sort_by_key(|id| (id.index(), id.generation()));
        let next = ready[0];
        remaining.remove(&next);
        order.push(next);
        if let Some(children) = adjacency.get(&next) {
            for &child in children {
                if let Some(deg) = remaining.get_mut(&child) {
                    *deg = deg.saturating_sub(1);
                }
            }
        }
    }
    // Any node left in `remaining` sits on a cycle the link table should
    // have already rejected; append it at the end rather than drop it
    // silently so it still gets a chance to run.
    let mut leftover: Vec<NodeId> = remaining.into_keys().collect();
    leftover.sort_by_key(|id| (id.index(), id.generation()));
    order.extend(leftover);
    order
}

fn top_level_fields(props: &PropertyArena, root: Option<nodelogic_ids::PropertyId>) -> Vec<nodelogic_ids::PropertyId> {
    root.map(|r| props.get(r).unwrap().children()).unwrap_or_default()
}

/// Runs one full update pass: propagate dirty links, run every node
/// whose inputs changed (or that has never run), then clear every
/// `has_new_value` flag in the arena. Errors are collected per-node
/// rather than aborting the pass.
pub fn update_pass(
    nodes: &mut NodeArena,
    props: &mut PropertyArena,
    links: &LinkTable,
    host: &ScriptHost,
    host_elapsed_us: i64,
) -> Vec<(NodeId, EngineError)> {
    let order = topo_order(nodes, props, links);
    let mut errors = Vec::new();

    for node_id in order {
        let input_root = nodes.get(node_id).unwrap().input_root();
        let mut any_new_input = false;
        for target in top_level_fields(props, input_root) {
            if let Some(source) = links.source_of(target) {
                if props.get(source).unwrap().has_new_value() {
                    let propagated = if props.get(target).unwrap().ty().is_compound() {
                        deep_copy(props, source, target)
                    } else {
                        let value = props.get(source).unwrap().get_value().cloned();
                        match value {
                            Some(v) => props.get_mut(target).unwrap().link_propagate_set(v),
                            None => Ok(()),
                        }
                    };
                    if let Err(e) = propagated {
                        errors.push((node_id, e));
                        continue;
                    }
                    any_new_input = true;
                }
            }
        }

        let header_dirty = nodes.get(node_id).unwrap().header.dirty();
        let inputs_dirty = top_level_fields(props, input_root)
            .iter()
            .any(|id| props.get(*id).unwrap().has_new_value());
        if !(header_dirty || any_new_input || inputs_dirty) {
            continue;
        }

        for e in run_node(nodes, props, host, node_id, host_elapsed_us) {
            errors.push((node_id, e));
        }
        nodes.get_mut(node_id).unwrap().header.clear_dirty();
    }

    for (_, prop) in props.iter_mut() {
        prop.clear_new_value();
    }
    errors
}

fn run_node(
    nodes: &mut NodeArena,
    props: &mut PropertyArena,
    host: &ScriptHost,
    node_id: NodeId,
    host_elapsed_us: i64,
) -> Vec<EngineError> {
    let node: &mut Node = nodes.get_mut(node_id).unwrap();
    match &mut node.kind {
        NodeKind::Script(script) => match script.update(host, props, node_id) {
            Ok(log_lines) => {
                for line in log_lines {
                    log::info!(target: "nodelogic::script", "{}: {}", script.name(), line);
                }
                Vec::new()
            }
            Err(e) => vec![e],
        },
        NodeKind::Timer(timer) => timer.update(props, host_elapsed_us).err().into_iter().collect(),
        NodeKind::Animation(anim) => anim.update(props).err().into_iter().collect(),
        NodeKind::NodeBinding(binding) => as_renderer_rejections(node_id, "NodeBinding", binding.update(props)),
        NodeKind::AppearanceBinding(binding) => {
            as_renderer_rejections(node_id, "AppearanceBinding", binding.update(props))
        }
        NodeKind::CameraBinding(binding) => {
            as_renderer_rejections(node_id, "CameraBinding", binding.update(props))
        }
        NodeKind::LuaModule(_) => Vec::new(),
    }
}

fn as_renderer_rejections(node: NodeId, kind: &str, messages: Vec<String>) -> Vec<EngineError> {
    messages
        .into_iter()
        .map(|message| EngineError::RendererRejected {
            property: format!("{kind}@{node}"),
            message,
        })
        .collect()
}
