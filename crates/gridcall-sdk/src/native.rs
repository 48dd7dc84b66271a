//! Native value and type model
//!
//! Where `value.rs` models the host's side of the boundary, this module
//! models the native side: the types an embedder can declare on exported
//! members (`NativeType`) and the runtime data that crosses a member body's
//! boundary (`NativeValue`).
//!
//! There is no runtime reflection. Assignability is decided over an explicit
//! type table: `Any` is the top type, classes subtype through the
//! [`ClassTable`](crate::class::ClassTable)'s declared superclass chains,
//! arrays are covariant in their component, and `Host` types follow the
//! host-kind lattice.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::class::{ClassId, ClassTable};
use crate::value::{Value, ValueKind};

// ============================================================================
// NativeType
// ============================================================================

/// Declared type of an exported member's parameter or return.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NativeType {
    /// No value (void return)
    Unit,
    /// Boolean
    Bool,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
    /// 64-bit float
    F64,
    /// Owned string
    Str,
    /// Byte buffer
    Bytes,
    /// A raw host value of the given kind, passed through unconverted
    Host(ValueKind),
    /// Array with the given component type
    Array(Box<NativeType>),
    /// Registered exported class
    Class(ClassId),
    /// Top type — any native value
    Any,
}

impl NativeType {
    /// Whether a value of type `other` is acceptable where `self` is
    /// declared. Class subtyping is resolved through `classes`.
    pub fn is_assignable_from(&self, other: &NativeType, classes: &ClassTable) -> bool {
        match (self, other) {
            (NativeType::Any, _) => true,
            (NativeType::Host(a), NativeType::Host(b)) => a.is_assignable_from(*b),
            (NativeType::Array(a), NativeType::Array(b)) => {
                a.is_assignable_from(b, classes)
            }
            (NativeType::Class(a), NativeType::Class(b)) => classes.is_subclass(*b, *a),
            (a, b) => a == b,
        }
    }

    /// The host-visible kind an export declares for a parameter or return of
    /// this type.
    pub fn default_kind(&self) -> ValueKind {
        match self {
            NativeType::Unit => ValueKind::Nil,
            NativeType::Bool => ValueKind::Bool,
            NativeType::I32 | NativeType::I64 | NativeType::F64 => ValueKind::Num,
            NativeType::Str => ValueKind::Str,
            NativeType::Bytes => ValueKind::BigData,
            NativeType::Host(kind) => *kind,
            NativeType::Array(_) => ValueKind::Array,
            NativeType::Class(_) | NativeType::Any => ValueKind::Object,
        }
    }

    /// Whether this is a raw host-value type (passthrough target).
    pub fn is_host(&self) -> bool {
        matches!(self, NativeType::Host(_))
    }

    /// Display name, resolving class ids through `classes`.
    pub fn name(&self, classes: &ClassTable) -> String {
        match self {
            NativeType::Unit => "unit".to_string(),
            NativeType::Bool => "bool".to_string(),
            NativeType::I32 => "i32".to_string(),
            NativeType::I64 => "i64".to_string(),
            NativeType::F64 => "f64".to_string(),
            NativeType::Str => "str".to_string(),
            NativeType::Bytes => "bytes".to_string(),
            NativeType::Host(kind) => format!("host<{kind:?}>"),
            NativeType::Array(c) => format!("[{}]", c.name(classes)),
            NativeType::Class(id) => classes.name(*id).unwrap_or("<unknown>").to_string(),
            NativeType::Any => "any".to_string(),
        }
    }
}

// ============================================================================
// ObjectRef
// ============================================================================

/// Shared reference to an instance of a registered class.
///
/// The payload is type-erased; member bodies recover it with
/// [`ObjectRef::downcast_ref`]. Equality is reference identity plus class —
/// two refs are equal only when they share the same allocation.
#[derive(Clone)]
pub struct ObjectRef {
    class: ClassId,
    object: Arc<dyn Any + Send + Sync>,
}

impl ObjectRef {
    /// Wrap `value` as an instance of `class`.
    pub fn new<T: Any + Send + Sync>(class: ClassId, value: T) -> Self {
        ObjectRef {
            class,
            object: Arc::new(value),
        }
    }

    /// The class this instance was registered under.
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Borrow the payload as `T`, if that is its concrete type.
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && Arc::ptr_eq(&self.object, &other.object)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef(class {})", self.class.index())
    }
}

// ============================================================================
// NativeValue
// ============================================================================

/// One native datum crossing the member-body boundary.
///
/// Converters turn host [`Value`]s into these before invocation and turn
/// returned ones back into host values. `Null` is the translation of a
/// missing/nil host argument for non-host-typed parameters; `Host` carries
/// a raw host value for passthrough parameters.
#[derive(Debug, Clone)]
pub enum NativeValue {
    /// No value (void return)
    Unit,
    /// Absent value
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit signed integer
    I32(i32),
    /// 64-bit signed integer
    I64(i64),
    /// 64-bit float
    F64(f64),
    /// Owned string
    Str(String),
    /// Byte buffer
    Bytes(Vec<u8>),
    /// Raw host value (passthrough)
    Host(Value),
    /// Array with its component type
    Array(NativeType, Vec<NativeValue>),
    /// Instance of a registered class
    Object(ObjectRef),
}

impl NativeValue {
    /// Get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NativeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i32.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            NativeValue::I32(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as i64, widening an i32.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NativeValue::I64(i) => Some(*i),
            NativeValue::I32(i) => Some(*i as i64),
            _ => None,
        }
    }

    /// Get as f64, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NativeValue::F64(f) => Some(*f),
            NativeValue::I32(i) => Some(*i as f64),
            NativeValue::I64(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as object reference.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            NativeValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Whether this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    /// Display name of this value's type, resolving classes through
    /// `classes`. Used for the `type_name` carried by boxed object values.
    pub fn type_name(&self, classes: &ClassTable) -> String {
        match self {
            NativeValue::Unit => "unit".to_string(),
            NativeValue::Null => "null".to_string(),
            NativeValue::Bool(_) => "bool".to_string(),
            NativeValue::I32(_) => "i32".to_string(),
            NativeValue::I64(_) => "i64".to_string(),
            NativeValue::F64(_) => "f64".to_string(),
            NativeValue::Str(_) => "str".to_string(),
            NativeValue::Bytes(_) => "bytes".to_string(),
            NativeValue::Host(v) => format!("host<{:?}>", v.kind()),
            NativeValue::Array(c, _) => format!("[{}]", c.name(classes)),
            NativeValue::Object(o) => {
                classes.name(o.class()).unwrap_or("<unknown>").to_string()
            }
        }
    }
}

impl PartialEq for NativeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NativeValue::Unit, NativeValue::Unit) => true,
            (NativeValue::Null, NativeValue::Null) => true,
            (NativeValue::Bool(a), NativeValue::Bool(b)) => a == b,
            (NativeValue::I32(a), NativeValue::I32(b)) => a == b,
            (NativeValue::I64(a), NativeValue::I64(b)) => a == b,
            (NativeValue::F64(a), NativeValue::F64(b)) => a == b,
            (NativeValue::Str(a), NativeValue::Str(b)) => a == b,
            (NativeValue::Bytes(a), NativeValue::Bytes(b)) => a == b,
            (NativeValue::Host(a), NativeValue::Host(b)) => a == b,
            (NativeValue::Array(at, a), NativeValue::Array(bt, b)) => at == bt && a == b,
            (NativeValue::Object(a), NativeValue::Object(b)) => a == b,
            _ => false,
        }
    }
}

// ============================================================================
// NativeCallError and argument helpers
// ============================================================================

/// Failure raised by a member body ("target threw").
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct NativeCallError(pub String);

impl NativeCallError {
    /// Create from any displayable message.
    pub fn msg(message: impl Into<String>) -> Self {
        NativeCallError(message.into())
    }
}

impl From<String> for NativeCallError {
    fn from(s: String) -> Self {
        NativeCallError(s)
    }
}

impl From<&str> for NativeCallError {
    fn from(s: &str) -> Self {
        NativeCallError(s.to_string())
    }
}

fn arg_at<'a>(args: &'a [NativeValue], index: usize) -> Result<&'a NativeValue, NativeCallError> {
    args.get(index)
        .ok_or_else(|| NativeCallError::msg(format!("missing argument {index}")))
}

/// Extract argument `index` as f64.
pub fn arg_f64(args: &[NativeValue], index: usize) -> Result<f64, NativeCallError> {
    arg_at(args, index)?
        .as_f64()
        .ok_or_else(|| NativeCallError::msg(format!("argument {index}: expected f64")))
}

/// Extract argument `index` as i32.
pub fn arg_i32(args: &[NativeValue], index: usize) -> Result<i32, NativeCallError> {
    arg_at(args, index)?
        .as_i32()
        .ok_or_else(|| NativeCallError::msg(format!("argument {index}: expected i32")))
}

/// Extract argument `index` as i64.
pub fn arg_i64(args: &[NativeValue], index: usize) -> Result<i64, NativeCallError> {
    arg_at(args, index)?
        .as_i64()
        .ok_or_else(|| NativeCallError::msg(format!("argument {index}: expected i64")))
}

/// Extract argument `index` as bool.
pub fn arg_bool(args: &[NativeValue], index: usize) -> Result<bool, NativeCallError> {
    arg_at(args, index)?
        .as_bool()
        .ok_or_else(|| NativeCallError::msg(format!("argument {index}: expected bool")))
}

/// Extract argument `index` as a string slice.
pub fn arg_str<'a>(args: &'a [NativeValue], index: usize) -> Result<&'a str, NativeCallError> {
    arg_at(args, index)?
        .as_str()
        .ok_or_else(|| NativeCallError::msg(format!("argument {index}: expected string")))
}

/// Extract argument `index` as a typed reference to a registered class
/// instance.
pub fn arg_object<'a, T: Any + Send + Sync>(
    args: &'a [NativeValue],
    index: usize,
) -> Result<&'a T, NativeCallError> {
    arg_at(args, index)?
        .as_object()
        .and_then(|o| o.downcast_ref::<T>())
        .ok_or_else(|| NativeCallError::msg(format!("argument {index}: expected object")))
}

/// Borrow the invocation target as `T`, failing when absent or of another
/// type.
pub fn target_object<'a, T: Any + Send + Sync>(
    target: Option<&'a ObjectRef>,
) -> Result<&'a T, NativeCallError> {
    target
        .and_then(|o| o.downcast_ref::<T>())
        .ok_or_else(|| NativeCallError::msg("invalid invocation target"))
}
