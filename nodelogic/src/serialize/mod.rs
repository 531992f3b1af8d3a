//! Binary persistence for a [`crate::engine::LogicEngine`], via
//! `bincode` over a version-tagged `serde` document.
//!
//! A saved file never stores raw [`PropertyId`]/[`NodeId`]s: arena slots
//! are not stable across a load (a fresh engine is built from scratch),
//! so nodes are addressed by name and properties by a path of field
//! names/array indices from their node's `IN` root. Node names must
//! therefore be unique to round-trip through a save; the engine does not
//! enforce that at creation time today (see `DESIGN.md`).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::animation::ChannelDef;
use crate::binding::{ProjectionKind, RotationConvention};
use crate::engine::LogicEngine;
use crate::error::{EngineError, EngineResult};
use crate::node::NodeKind;
use crate::property::{Property, PropertyArena};
use nodelogic_ids::PropertyId;
use nodelogic_value::PropertyValue;

/// `(major, minor, patch)`. A saved file's major version must match
/// exactly; minor/patch are accepted as long as major agrees.
pub const ENGINE_VERSION: (u32, u32, u32) = (1, 0, 0);

#[derive(Serialize, Deserialize)]
struct SavedEngine {
    version: (u32, u32, u32),
    modules: Vec<SavedModule>,
    scripts: Vec<SavedScript>,
    node_bindings: Vec<SavedNodeBinding>,
    camera_bindings: Vec<SavedCameraBinding>,
    timers: Vec<SavedTimer>,
    animations: Vec<SavedAnimation>,
    links: Vec<SavedLink>,
}

#[derive(Serialize, Deserialize)]
struct SavedModule {
    name: String,
    source: String,
    imports: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct SavedScript {
    name: String,
    source: String,
    imports: Vec<String>,
    inputs: Vec<(Vec<PathSegment>, PropertyValue)>,
}

#[derive(Serialize, Deserialize)]
struct SavedNodeBinding {
    name: String,
    convention: RotationConvention,
    inputs: Vec<(Vec<PathSegment>, PropertyValue)>,
}

#[derive(Serialize, Deserialize)]
struct SavedCameraBinding {
    name: String,
    projection: ProjectionKind,
    inputs: Vec<(Vec<PathSegment>, PropertyValue)>,
}

#[derive(Serialize, Deserialize)]
struct SavedTimer {
    name: String,
    inputs: Vec<(Vec<PathSegment>, PropertyValue)>,
}

#[derive(Serialize, Deserialize)]
struct SavedAnimation {
    name: String,
    channels: Vec<SavedChannel>,
    inputs: Vec<(Vec<PathSegment>, PropertyValue)>,
}

#[derive(Serialize, Deserialize)]
struct SavedChannel {
    name: String,
    keyframes: Vec<(f32, PropertyValue)>,
}

#[derive(Serialize, Deserialize)]
struct SavedLink {
    source_node: String,
    source_path: Vec<PathSegment>,
    target_node: String,
    target_path: Vec<PathSegment>,
}

#[derive(Clone, Serialize, Deserialize)]
enum PathSegment {
    Name(String),
    Index(usize),
}

/// Every leaf reachable from `root`, as `(path-from-root, value)` pairs.
/// Struct children are addressed by name, array elements by index.
fn snapshot_leaves(props: &PropertyArena, root: PropertyId) -> Vec<(Vec<PathSegment>, PropertyValue)> {
    let mut out = Vec::new();
    collect_leaves(props, root, &mut Vec::new(), &mut out);
    out
}

fn collect_leaves(
    props: &PropertyArena,
    id: PropertyId,
    path: &mut Vec<PathSegment>,
    out: &mut Vec<(Vec<PathSegment>, PropertyValue)>,
) {
    let prop = props.get(id).expect("live property id");
    match prop.data() {
        crate::property::PropertyData::Leaf(v) => out.push((path.clone(), v.clone())),
        crate::property::PropertyData::Struct(children) => {
            for (name, child) in children {
                path.push(PathSegment::Name(name.to_string()));
                collect_leaves(props, *child, path, out);
                path.pop();
            }
        }
        crate::property::PropertyData::Array(children) => {
            for (idx, child) in children.iter().enumerate() {
                path.push(PathSegment::Index(idx));
                collect_leaves(props, *child, path, out);
                path.pop();
            }
        }
    }
}

fn resolve_path(props: &PropertyArena, root: PropertyId, path: &[PathSegment]) -> Option<PropertyId> {
    let mut current = root;
    for segment in path {
        let prop = props.get(current)?;
        current = match segment {
            PathSegment::Name(n) => prop.get_child_by_name(n)?,
            PathSegment::Index(i) => prop.get_child_by_index(*i)?,
        };
    }
    Some(current)
}

fn path_string(path: &[PathSegment]) -> String {
    path.iter()
        .map(|s| match s {
            PathSegment::Name(n) => n.clone(),
            PathSegment::Index(i) => i.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn restore_inputs(
    props: &mut PropertyArena,
    root: PropertyId,
    inputs: &[(Vec<PathSegment>, PropertyValue)],
    node_name: &str,
) -> EngineResult<()> {
    for (path, value) in inputs {
        let id = resolve_path(props, root, path).ok_or_else(|| EngineError::UnknownChild {
            property: node_name.to_string(),
            key: path_string(path),
        })?;
        props.get_mut(id).unwrap().manual_set(value.clone())?;
    }
    Ok(())
}

pub fn save(engine: &LogicEngine, path: &Path) -> EngineResult<()> {
    let props = engine.properties();
    let mut doc = SavedEngine {
        version: ENGINE_VERSION,
        modules: Vec::new(),
        scripts: Vec::new(),
        node_bindings: Vec::new(),
        camera_bindings: Vec::new(),
        timers: Vec::new(),
        animations: Vec::new(),
        links: Vec::new(),
    };

    for (_, node) in engine.nodes().iter() {
        let name = node.header.name().to_string();
        match &node.kind {
            NodeKind::LuaModule(m) => doc.modules.push(SavedModule {
                name,
                source: m.unit.source.clone(),
                imports: import_names(engine, &m.imports),
            }),
            NodeKind::Script(s) => doc.scripts.push(SavedScript {
                name,
                source: s.unit.source.clone(),
                imports: import_names(engine, &s.imports),
                inputs: snapshot_leaves(props, s.input_root),
            }),
            NodeKind::NodeBinding(b) => doc.node_bindings.push(SavedNodeBinding {
                name,
                convention: b.convention(),
                inputs: snapshot_leaves(props, b.input_root),
            }),
            NodeKind::CameraBinding(b) => doc.camera_bindings.push(SavedCameraBinding {
                name,
                projection: b.projection(),
                inputs: snapshot_leaves(props, b.input_root),
            }),
            NodeKind::Timer(t) => doc.timers.push(SavedTimer {
                name,
                inputs: snapshot_leaves(props, t.input_root),
            }),
            NodeKind::Animation(a) => doc.animations.push(SavedAnimation {
                name,
                channels: a
                    .channel_defs(props)
                    .map(|(n, k)| SavedChannel {
                        name: n.to_string(),
                        keyframes: k.to_vec(),
                    })
                    .collect(),
                inputs: snapshot_leaves(props, a.input_root),
            }),
            NodeKind::AppearanceBinding(_) => {
                // Shape is derived from the attached renderer handle at
                // attach time, so there is nothing durable to persist.
            }
        }
    }

    for (source, target) in engine.link_pairs() {
        let (Some(sp), Some(tp)) = (props.get(source), props.get(target)) else {
            continue;
        };
        let source_node = engine.node(sp.owner()).unwrap();
        let target_node = engine.node(tp.owner()).unwrap();
        doc.links.push(SavedLink {
            source_node: source_node.header.name().to_string(),
            source_path: path_from_owner_root(props, sp),
            target_node: target_node.header.name().to_string(),
            target_path: path_from_owner_root(props, tp),
        });
    }

    let bytes = bincode::serialize(&doc).map_err(|e| EngineError::SerializationError(e.to_string()))?;
    fs::write(path, bytes).map_err(|e| EngineError::SerializationError(e.to_string()))
}

fn import_names(engine: &LogicEngine, imports: &[nodelogic_ids::NodeId]) -> Vec<String> {
    imports
        .iter()
        .map(|id| engine.node(*id).map(|n| n.header.name().to_string()).unwrap_or_default())
        .collect()
}

fn path_from_owner_root(props: &PropertyArena, prop: &Property) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut current = prop.id();
    loop {
        let p = props.get(current).unwrap();
        let Some(parent_id) = p.parent() else {
            break;
        };
        let parent = props.get(parent_id).unwrap();
        match parent.get_child_by_name(p.name()) {
            Some(id) if id == current => segments.push(PathSegment::Name(p.name().to_string())),
            _ => {
                let idx = parent.children().iter().position(|&c| c == current).unwrap_or(0);
                segments.push(PathSegment::Index(idx));
            }
        }
        current = parent_id;
    }
    segments.reverse();
    segments
}

pub fn load(path: &Path) -> EngineResult<LogicEngine> {
    let bytes = fs::read(path).map_err(|e| EngineError::SerializationError(e.to_string()))?;
    let doc: SavedEngine =
        bincode::deserialize(&bytes).map_err(|e| EngineError::SerializationError(e.to_string()))?;
    if doc.version.0 != ENGINE_VERSION.0 {
        return Err(EngineError::SerializationError(format!(
            "incompatible save version {:?}, engine is {:?}",
            doc.version, ENGINE_VERSION
        )));
    }

    let mut engine = LogicEngine::new();

    // Modules first (in file order; an importer always appears after
    // its imports because `create_module` rejects forward references).
    for m in &doc.modules {
        let imports: Vec<&str> = m.imports.iter().map(String::as_str).collect();
        engine.create_module(&m.name, &m.source, &imports)?;
    }
    for s in &doc.scripts {
        let imports: Vec<&str> = s.imports.iter().map(String::as_str).collect();
        let id = engine.create_script(&s.name, &s.source, &imports)?;
        let root = engine.node(id).unwrap().input_root().unwrap();
        restore_inputs(engine.properties_mut(), root, &s.inputs, &s.name)?;
    }
    for b in &doc.node_bindings {
        let id = engine.create_node_binding(&b.name, b.convention);
        let root = engine.node(id).unwrap().input_root().unwrap();
        restore_inputs(engine.properties_mut(), root, &b.inputs, &b.name)?;
    }
    for c in &doc.camera_bindings {
        let id = engine.create_camera_binding(&c.name, c.projection);
        let root = engine.node(id).unwrap().input_root().unwrap();
        restore_inputs(engine.properties_mut(), root, &c.inputs, &c.name)?;
    }
    for t in &doc.timers {
        let id = engine.create_timer(&t.name);
        let root = engine.node(id).unwrap().input_root().unwrap();
        restore_inputs(engine.properties_mut(), root, &t.inputs, &t.name)?;
    }
    for a in &doc.animations {
        let channels = a
            .channels
            .iter()
            .map(|c| ChannelDef {
                name: c.name.clone(),
                keyframes: c.keyframes.clone(),
            })
            .collect();
        let id = engine.create_animation(&a.name, channels)?;
        let root = engine.node(id).unwrap().input_root().unwrap();
        restore_inputs(engine.properties_mut(), root, &a.inputs, &a.name)?;
    }

    for link in &doc.links {
        let source_owner = engine.find_by_name(&link.source_node).ok_or(EngineError::ForeignObject)?;
        let target_owner = engine.find_by_name(&link.target_node).ok_or(EngineError::ForeignObject)?;
        let source_root = engine.node(source_owner).unwrap().output_root().ok_or(EngineError::ForeignObject)?;
        let target_root = engine.node(target_owner).unwrap().input_root().ok_or(EngineError::ForeignObject)?;
        let source = resolve_path(engine.properties(), source_root, &link.source_path)
            .ok_or(EngineError::ForeignObject)?;
        let target = resolve_path(engine.properties(), target_root, &link.target_path)
            .ok_or(EngineError::ForeignObject)?;
        engine.link(source, target)?;
    }

    Ok(engine)
}
