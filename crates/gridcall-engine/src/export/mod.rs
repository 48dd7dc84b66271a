//! Export surface: definitions, metadata, naming and the function registry.

pub mod definition;
pub mod metadata;
mod naming;
pub mod registry;

pub use definition::{ExportInvoker, FunctionDefinition};
pub use metadata::{FunctionMetadata, ParamMetadata};
pub use registry::{FunctionRegistry, RegistryError, RegistryState};
