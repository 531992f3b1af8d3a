//! Every object the engine manages is a [`Node`]: a [`NodeHeader`] plus a
//! kind-specific payload. Nodes live in a single [`NodeArena`], same as
//! properties live in a single [`crate::property::PropertyArena`].

pub mod arena;
pub mod header;

pub use arena::NodeArena;
pub use header::NodeHeader;

use nodelogic_ids::PropertyId;

use crate::animation::AnimationData;
use crate::binding::{AppearanceBinding, CameraBinding, NodeBinding};
use crate::script::{LuaModuleData, ScriptData};
use crate::timer::TimerData;

pub struct Node {
    pub header: NodeHeader,
    pub kind: NodeKind,
}

pub enum NodeKind {
    Script(ScriptData),
    LuaModule(LuaModuleData),
    NodeBinding(NodeBinding),
    AppearanceBinding(AppearanceBinding),
    CameraBinding(CameraBinding),
    Timer(TimerData),
    Animation(AnimationData),
}

impl Node {
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Script(_) => "Script",
            NodeKind::LuaModule(_) => "LuaModule",
            NodeKind::NodeBinding(_) => "NodeBinding",
            NodeKind::AppearanceBinding(_) => "AppearanceBinding",
            NodeKind::CameraBinding(_) => "CameraBinding",
            NodeKind::Timer(_) => "TimerNode",
            NodeKind::Animation(_) => "AnimationNode",
        }
    }

    /// The property acting as this node's `IN` root, if it has one.
    /// `LuaModule` has no properties at all; bindings expose only an
    /// input root (no outputs).
    pub fn input_root(&self) -> Option<PropertyId> {
        match &self.kind {
            NodeKind::Script(s) => Some(s.input_root),
            NodeKind::LuaModule(_) => None,
            NodeKind::NodeBinding(b) => Some(b.input_root),
            NodeKind::AppearanceBinding(b) => b.input_root,
            NodeKind::CameraBinding(b) => Some(b.input_root),
            NodeKind::Timer(t) => Some(t.input_root),
            NodeKind::Animation(a) => Some(a.input_root),
        }
    }

    /// The property acting as this node's `OUT` root, if it has one.
    /// Bindings never have outputs: they are link targets only.
    pub fn output_root(&self) -> Option<PropertyId> {
        match &self.kind {
            NodeKind::Script(s) => Some(s.output_root),
            NodeKind::Timer(t) => Some(t.output_root),
            NodeKind::Animation(a) => Some(a.output_root),
            NodeKind::LuaModule(_)
            | NodeKind::NodeBinding(_)
            | NodeKind::AppearanceBinding(_)
            | NodeKind::CameraBinding(_) => None,
        }
    }
}
