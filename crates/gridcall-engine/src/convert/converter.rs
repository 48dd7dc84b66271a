//! Converter contract
//!
//! A `TypeConverter` is a bidirectional bridge between one host value kind
//! and one native type. Converters are constructed once at registry build
//! time, are immutable afterwards and are shared freely across calculation
//! threads.

use gridcall_sdk::{NativeType, NativeValue, Value, ValueKind};

use super::mapping::TypeMapping;

/// Priority of converters that should win over the general-purpose ones.
pub const PRIORITY_HIGH: i32 = 100;
/// Default converter priority.
pub const PRIORITY_NORMAL: i32 = 0;
/// Priority of catch-all converters; they must never shadow specific ones.
pub const PRIORITY_FALLBACK: i32 = -100;

/// Conversion failures.
///
/// These surface as invocation failures at the call boundary; they are never
/// silently coerced into host values below the dispatch layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConvertError {
    /// The host value's kind does not fit the requested conversion
    #[error("cannot convert a {got:?} value where {expected:?} is required")]
    KindMismatch {
        /// Kind the conversion requires
        expected: ValueKind,
        /// Kind actually supplied
        got: ValueKind,
    },
    /// An object handle no longer resolves to a live native value
    #[error("stale or invalid object handle {0}")]
    StaleHandle(u64),
    /// The native value cannot be represented in the requested form
    #[error("cannot convert {got} to {expected}")]
    Unsupported {
        /// Description of the requested target
        expected: String,
        /// Description of the supplied value
        got: String,
    },
}

/// Bidirectional converter between one host value kind and one native type.
///
/// `to_host` and `to_native` are pure with respect to converter state; the
/// only converters with any environment at all are the context-bound ones
/// (boxing converters holding the heap), and those only append to it.
pub trait TypeConverter: Send + Sync {
    /// Short diagnostic name.
    fn name(&self) -> &'static str;

    /// Selection priority; higher wins, ties break by registration order.
    fn priority(&self) -> i32 {
        PRIORITY_NORMAL
    }

    /// What this converter emits when converting native→host.
    fn native_to_host(&self) -> &TypeMapping;

    /// What this converter accepts when converting host→native.
    fn host_to_native(&self) -> &TypeMapping;

    /// Convert a native value into a host value.
    fn to_host(&self, native: &NativeValue) -> Result<Value, ConvertError>;

    /// Convert a host value into a native value of (a subtype of)
    /// `expected`.
    fn to_native(&self, expected: &NativeType, value: &Value) -> Result<NativeValue, ConvertError>;
}

pub(crate) fn kind_mismatch(expected: ValueKind, value: &Value) -> ConvertError {
    ConvertError::KindMismatch {
        expected,
        got: value.kind(),
    }
}

pub(crate) fn unsupported(expected: impl Into<String>, got: impl Into<String>) -> ConvertError {
    ConvertError::Unsupported {
        expected: expected.into(),
        got: got.into(),
    }
}
