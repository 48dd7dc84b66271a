//! Invoker construction and execution.

pub mod invoker;
pub mod resolver;

pub use invoker::{ConstructorInvoker, FieldGetter, InvocationError, MethodInvoker};
pub use resolver::{InvokerResolver, ResolveError};
