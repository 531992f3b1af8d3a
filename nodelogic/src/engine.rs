//! [`LogicEngine`]: the facade applications drive. Owns every node and
//! property arena, the link table, and the shared script runtime.
//! Every top-level call clears the previous error buffer first, so
//! `get_errors()` always reflects only the most recent call.

use std::collections::HashMap;
use std::path::Path;

use nodelogic_ids::NodeId;

use crate::animation::{AnimationData, ChannelDef};
use crate::binding::{AppearanceBinding, CameraBinding, NodeBinding, ProjectionKind, RotationConvention};
use crate::error::{EngineError, EngineResult};
use crate::graph::update_pass;
use crate::link::LinkTable;
use crate::node::{Node, NodeArena, NodeHeader, NodeKind};
use crate::property::PropertyArena;
use crate::script::{ModuleUnit, ScriptData, ScriptHost, LuaModuleData};
use crate::serialize::{self, ENGINE_VERSION};
use crate::timer::TimerData;

pub struct LogicEngine {
    nodes: NodeArena,
    props: PropertyArena,
    links: LinkTable,
    host: ScriptHost,
    modules_by_name: HashMap<String, NodeId>,
    errors: Vec<(NodeId, EngineError)>,
}

impl LogicEngine {
    pub fn new() -> Self {
        Self {
            nodes: NodeArena::new(),
            props: PropertyArena::new(),
            links: LinkTable::new(),
            host: ScriptHost::new(),
            modules_by_name: HashMap::new(),
            errors: Vec::new(),
        }
    }

    fn resolve_imports(&self, caller: &str, imports: &[&str]) -> EngineResult<Vec<(String, NodeId)>> {
        imports
            .iter()
            .map(|import_name| {
                self.modules_by_name
                    .get(*import_name)
                    .copied()
                    .map(|id| (import_name.to_string(), id))
                    .ok_or_else(|| EngineError::InterfaceError {
                        name: caller.into(),
                        message: format!("unknown module import '{import_name}'"),
                    })
            })
            .collect()
    }

    pub fn create_module(&mut self, name: &str, source: &str, imports: &[&str]) -> EngineResult<NodeId> {
        self.errors.clear();
        let resolved = self.resolve_imports(name, imports)?;
        let import_refs: Vec<(&str, &ModuleUnit)> = resolved
            .iter()
            .map(|(bind_name, id)| {
                let unit = match &self.nodes.get(*id).unwrap().kind {
                    NodeKind::LuaModule(m) => &m.unit,
                    _ => unreachable!("modules_by_name only ever points at LuaModule nodes"),
                };
                (bind_name.as_str(), unit)
            })
            .collect();

        let import_ids: Vec<NodeId> = resolved.iter().map(|(_, id)| *id).collect();
        // The new module's id doesn't exist yet; a self-import is
        // impossible by construction (it can't appear in its own
        // `imports` list before being named), so checking the existing
        // graph against the resolved import ids alone is sufficient.
        crate::script::module::would_cycle(&self.module_edges(), NodeId::nil(), &import_ids)?;
        let unit = self.host.compile_module(name, source, &import_refs)?;
        drop(import_refs);

        let id = self
            .nodes
            .try_insert(|id| -> Result<Node, EngineError> {
                Ok(Node {
                    header: NodeHeader::new(id, name),
                    kind: NodeKind::LuaModule(LuaModuleData::new(unit, import_ids)),
                })
            })
            .expect("LuaModule construction is infallible");
        self.modules_by_name.insert(name.to_string(), id);
        Ok(id)
    }

    fn module_edges(&self) -> HashMap<NodeId, Vec<NodeId>> {
        self.nodes
            .iter()
            .filter_map(|(id, node)| match &node.kind {
                NodeKind::LuaModule(m) => Some((id, m.imports.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn create_script(&mut self, name: &str, source: &str, imports: &[&str]) -> EngineResult<NodeId> {
        self.errors.clear();
        let resolved = self.resolve_imports(name, imports)?;
        let import_refs: Vec<(&str, &ModuleUnit)> = resolved
            .iter()
            .map(|(bind_name, id)| {
                let unit = match &self.nodes.get(*id).unwrap().kind {
                    NodeKind::LuaModule(m) => &m.unit,
                    _ => unreachable!("modules_by_name only ever points at LuaModule nodes"),
                };
                (bind_name.as_str(), unit)
            })
            .collect();
        let import_ids: Vec<NodeId> = resolved.iter().map(|(_, id)| *id).collect();
        let unit = self.host.compile_script(name, source, &import_refs)?;
        drop(import_refs);

        let props = &mut self.props;
        let host = &self.host;
        self.nodes.try_insert(|id| {
            let script_data = ScriptData::new(host, props, id, unit, import_ids)?;
            Ok(Node {
                header: NodeHeader::new(id, name),
                kind: NodeKind::Script(script_data),
            })
        })
    }

    pub fn create_node_binding(&mut self, name: &str, convention: RotationConvention) -> NodeId {
        self.errors.clear();
        let props = &mut self.props;
        self.nodes.insert(|id| Node {
            header: NodeHeader::new(id, name),
            kind: NodeKind::NodeBinding(NodeBinding::build(props, id, convention)),
        })
    }

    pub fn create_appearance_binding(&mut self, name: &str) -> NodeId {
        self.errors.clear();
        self.nodes.insert(|id| Node {
            header: NodeHeader::new(id, name),
            kind: NodeKind::AppearanceBinding(AppearanceBinding::new(id)),
        })
    }

    pub fn create_camera_binding(&mut self, name: &str, projection: ProjectionKind) -> NodeId {
        self.errors.clear();
        let props = &mut self.props;
        self.nodes.insert(|id| Node {
            header: NodeHeader::new(id, name),
            kind: NodeKind::CameraBinding(CameraBinding::build(props, id, projection)),
        })
    }

    pub fn create_timer(&mut self, name: &str) -> NodeId {
        self.errors.clear();
        let props = &mut self.props;
        self.nodes.insert(|id| Node {
            header: NodeHeader::new(id, name),
            kind: NodeKind::Timer(TimerData::build(props, id)),
        })
    }

    pub fn create_animation(&mut self, name: &str, channels: Vec<ChannelDef>) -> EngineResult<NodeId> {
        self.errors.clear();
        let props = &mut self.props;
        self.nodes.try_insert(|id| {
            let data = AnimationData::build(props, id, channels)?;
            Ok(Node {
                header: NodeHeader::new(id, name),
                kind: NodeKind::Animation(data),
            })
        })
    }

    pub fn destroy(&mut self, id: NodeId) -> EngineResult<()> {
        self.errors.clear();
        if !self.nodes.contains(id) {
            return Err(EngineError::ForeignObject);
        }
        let dependents: usize = self
            .nodes
            .iter()
            .filter(|(other_id, node)| {
                *other_id != id
                    && match &node.kind {
                        NodeKind::Script(s) => s.imports.contains(&id),
                        NodeKind::LuaModule(m) => m.imports.contains(&id),
                        _ => false,
                    }
            })
            .count();
        if dependents > 0 {
            let name = self.nodes.get(id).unwrap().header.name().to_string();
            return Err(EngineError::DependencyInUse { name, dependents });
        }
        let name = self.nodes.get(id).unwrap().header.name().to_string();
        self.modules_by_name.remove(&name);
        self.nodes.remove(id);
        Ok(())
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().find(|(_, n)| n.header.name() == name).map(|(id, _)| id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn properties(&self) -> &PropertyArena {
        &self.props
    }

    pub fn properties_mut(&mut self) -> &mut PropertyArena {
        &mut self.props
    }

    pub fn link(&mut self, source: nodelogic_ids::PropertyId, target: nodelogic_ids::PropertyId) -> EngineResult<()> {
        self.errors.clear();
        self.links.link(&mut self.props, &self.nodes, source, target)
    }

    pub fn unlink(&mut self, source: nodelogic_ids::PropertyId, target: nodelogic_ids::PropertyId) -> EngineResult<()> {
        self.errors.clear();
        self.links.unlink(&mut self.props, source, target)
    }

    pub fn is_linked(&self, target: nodelogic_ids::PropertyId) -> bool {
        self.links.is_linked(target)
    }

    pub fn link_pairs(&self) -> impl Iterator<Item = (nodelogic_ids::PropertyId, nodelogic_ids::PropertyId)> + '_ {
        self.links.iter()
    }

    pub fn attach_node_binding(&mut self, id: NodeId, handle: Box<dyn crate::binding::RenderNodeHandle>) -> EngineResult<()> {
        match &mut self.node_mut(id).ok_or(EngineError::ForeignObject)?.kind {
            NodeKind::NodeBinding(b) => {
                b.attach(handle);
                Ok(())
            }
            _ => Err(EngineError::ForeignObject),
        }
    }

    pub fn attach_appearance_binding(
        &mut self,
        id: NodeId,
        handle: Box<dyn crate::binding::RenderAppearanceHandle>,
    ) -> EngineResult<()> {
        let props = &mut self.props;
        match &mut self.nodes.get_mut(id).ok_or(EngineError::ForeignObject)?.kind {
            NodeKind::AppearanceBinding(b) => {
                b.attach(props, handle);
                Ok(())
            }
            _ => Err(EngineError::ForeignObject),
        }
    }

    pub fn attach_camera_binding(&mut self, id: NodeId, handle: Box<dyn crate::binding::RenderCameraHandle>) -> EngineResult<()> {
        match &mut self.node_mut(id).ok_or(EngineError::ForeignObject)?.kind {
            NodeKind::CameraBinding(b) => {
                b.attach(handle);
                Ok(())
            }
            _ => Err(EngineError::ForeignObject),
        }
    }

    /// Runs one update pass over every node. `host_elapsed_us` feeds any
    /// `TimerNode` left in host-clock (auto-tick) mode.
    pub fn update(&mut self, host_elapsed_us: i64) {
        self.errors.clear();
        let failures = update_pass(&mut self.nodes, &mut self.props, &self.links, &self.host, host_elapsed_us);
        self.errors.extend(failures);
    }

    pub fn get_errors(&self) -> &[(NodeId, EngineError)] {
        &self.errors
    }

    pub fn save_to_file(&mut self, path: impl AsRef<Path>) -> EngineResult<()> {
        self.errors.clear();
        serialize::save(self, path.as_ref())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        serialize::load(path.as_ref())
    }

    pub(crate) fn engine_version() -> (u32, u32, u32) {
        ENGINE_VERSION
    }

    pub(crate) fn nodes(&self) -> &NodeArena {
        &self.nodes
    }
}

impl Default for LogicEngine {
    fn default() -> Self {
        Self::new()
    }
}
