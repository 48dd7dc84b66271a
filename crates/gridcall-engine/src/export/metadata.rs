//! Export metadata
//!
//! Immutable descriptions of one exported identity, built once from the
//! declarations (plus generated defaults) at registration time and handed to
//! the host transport alongside the invoker.

/// Host-facing description of one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamMetadata {
    /// Display name
    pub name: String,
    /// Whether the caller may omit the argument
    pub optional: bool,
    /// Whether the host passes a range reference rather than values
    pub by_reference: bool,
}

/// Host-facing description of one exported function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionMetadata {
    /// Namespace the declaring class exports under, when present
    pub namespace: Option<String>,
    /// Fully composed, collision-free display name
    pub name: String,
    /// Function category shown by the host
    pub category: Option<String>,
    /// Description shown by the host
    pub description: Option<String>,
    /// Long help text shown by the host
    pub help: Option<String>,
    /// Parameter descriptions; empty for constant (field) exports
    pub params: Vec<ParamMetadata>,
}

impl FunctionMetadata {
    /// Metadata for a constant export: no parameters.
    pub fn constant(namespace: Option<String>, name: String) -> Self {
        FunctionMetadata {
            namespace,
            name,
            category: None,
            description: None,
            help: None,
            params: Vec::new(),
        }
    }
}
