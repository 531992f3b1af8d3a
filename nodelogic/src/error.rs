//! The closed set of error kinds the engine can raise.
//!
//! Every fallible public operation returns `Result<_, EngineError>`. The
//! facade additionally collects these into an ordered error buffer (see
//! [`crate::engine::LogicEngine::get_errors`]) so a caller driving an
//! `update()` pass can see every node's failure, not just the first.

use nodelogic_ids::NodeId;
use nodelogic_value::PropertyType;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("script '{name}' failed to parse: {message}")]
    ParseError { name: String, message: String },

    #[error("script '{name}' interface() error: {message}")]
    InterfaceError { name: String, message: String },

    #[error("script '{name}' runtime error: {message}\n{stack_trace}")]
    RuntimeError {
        name: String,
        node: NodeId,
        message: String,
        stack_trace: String,
    },

    #[error("type mismatch: expected {expected:?}, found {found:?}")]
    TypeMismatch {
        expected: PropertyType,
        found: PropertyType,
    },

    #[error("shape mismatch assigning to '{property}': {message}")]
    ShapeMismatch { property: String, message: String },

    #[error("no child named/indexed '{key}' on property '{property}'")]
    UnknownChild { property: String, key: String },

    #[error("semantics violation on '{property}': {message}")]
    SemanticsViolation { property: String, message: String },

    #[error("a link already targets '{target}'")]
    LinkExists { target: String },

    #[error("no link exists between '{from}' and '{target}'")]
    NoSuchLink { from: String, target: String },

    #[error("link {from} -> {target} would create a cycle")]
    Cycle { from: String, target: String },

    #[error("object does not belong to this engine")]
    ForeignObject,

    #[error("renderer rejected '{property}': {message}")]
    RendererRejected { property: String, message: String },

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("cannot destroy '{name}': still referenced by {dependents} dependent node(s)")]
    DependencyInUse { name: String, dependents: usize },
}

pub type EngineResult<T> = Result<T, EngineError>;
