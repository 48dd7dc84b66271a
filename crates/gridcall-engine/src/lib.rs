//! Gridcall engine
//!
//! The resolution and conversion core that turns explicitly registered
//! native classes into host-callable worksheet functions:
//!
//! - `convert` — priority-ordered bidirectional converters between host
//!   values and native values, with a caching lookup decorator
//! - `invoke` — the resolver that pairs member declarations with converters
//!   and the immutable invokers it produces
//! - `export` — export naming, metadata and the function registry with its
//!   monotonic export numbers
//! - `dispatch` — the total dispatch boundary the host transport calls
//!
//! The shared value model, heap and class declarations live in
//! `gridcall-sdk`; this crate wires them together.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod convert;
pub mod dispatch;
pub mod export;
pub mod invoke;

pub use convert::{
    CachingConverterRegistry, ConfigError, ConvertError, ConverterContext, ConverterLookup,
    ConverterRegistry, TypeConverter, TypeMapping,
};
pub use dispatch::Dispatcher;
pub use export::{
    ExportInvoker, FunctionDefinition, FunctionMetadata, FunctionRegistry, ParamMetadata,
    RegistryError, RegistryState,
};
pub use invoke::{
    ConstructorInvoker, FieldGetter, InvocationError, InvokerResolver, MethodInvoker, ResolveError,
};
