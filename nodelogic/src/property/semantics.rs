/// Who is allowed to write a property's value.
///
/// This is the single source of truth for the write-path policy in
/// [`super::Property::manual_set`], [`super::Property::script_output_set`]
/// and [`super::Property::link_propagate_set`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Semantics {
    /// Written by link propagation or by the host; read-only from inside
    /// the owning script's `run`.
    ScriptInput,
    /// Written only from inside the owning script's `run`.
    ScriptOutput,
    /// Written from outside (host, or link propagation from a
    /// `ScriptOutput`); bindings never own outputs.
    BindingInput,
}

impl Semantics {
    pub fn can_be_link_source(self) -> bool {
        matches!(self, Semantics::ScriptOutput)
    }

    pub fn can_be_link_target(self) -> bool {
        matches!(self, Semantics::ScriptInput | Semantics::BindingInput)
    }
}
