//! Function definitions
//!
//! A `FunctionDefinition` binds one metadata record to exactly one invoker
//! and the export number the transport dispatches on. Export numbers are
//! assigned by the registry's strictly increasing counter and are never
//! reused within one registry instance.

use crate::invoke::invoker::{ConstructorInvoker, FieldGetter, MethodInvoker};

use super::metadata::FunctionMetadata;

/// The invoker an export dispatches to.
#[derive(Debug, Clone)]
pub enum ExportInvoker {
    /// Constructor export
    Constructor(ConstructorInvoker),
    /// Method export
    Method(MethodInvoker),
    /// Field (constant) export
    Field(FieldGetter),
}

/// One exported identity: metadata, invoker and stable export number.
#[derive(Debug, Clone)]
pub struct FunctionDefinition {
    export_number: u32,
    metadata: FunctionMetadata,
    invoker: ExportInvoker,
}

impl FunctionDefinition {
    pub(crate) fn new(
        export_number: u32,
        metadata: FunctionMetadata,
        invoker: ExportInvoker,
    ) -> Self {
        FunctionDefinition {
            export_number,
            metadata,
            invoker,
        }
    }

    /// The transport's dispatch key for this export.
    pub fn export_number(&self) -> u32 {
        self.export_number
    }

    /// Host-facing metadata.
    pub fn metadata(&self) -> &FunctionMetadata {
        &self.metadata
    }

    /// Composed display name.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// The bound invoker, for exhaustive matching.
    pub fn invoker(&self) -> &ExportInvoker {
        &self.invoker
    }

    /// The bound method invoker.
    ///
    /// # Panics
    ///
    /// Panics when this definition is not a method export — asking a
    /// definition for the wrong invoker kind is a programming error, not a
    /// recoverable condition.
    pub fn method_invoker(&self) -> &MethodInvoker {
        match &self.invoker {
            ExportInvoker::Method(m) => m,
            _ => panic!("{} is not a method export", self.metadata.name),
        }
    }

    /// The bound constructor invoker.
    ///
    /// # Panics
    ///
    /// Panics when this definition is not a constructor export.
    pub fn constructor_invoker(&self) -> &ConstructorInvoker {
        match &self.invoker {
            ExportInvoker::Constructor(c) => c,
            _ => panic!("{} is not a constructor export", self.metadata.name),
        }
    }

    /// The bound field getter.
    ///
    /// # Panics
    ///
    /// Panics when this definition is not a field export.
    pub fn field_getter(&self) -> &FieldGetter {
        match &self.invoker {
            ExportInvoker::Field(f) => f,
            _ => panic!("{} is not a field export", self.metadata.name),
        }
    }
}
