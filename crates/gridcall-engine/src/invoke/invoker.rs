//! Invokers
//!
//! An invoker is one concrete, immutable callable built by the resolver: a
//! member body plus the per-parameter converters, vararg handling and
//! result conversion resolved for it. Invokers are safe to call from any
//! number of calculation threads; the target object's own thread-safety is
//! the caller's concern.

use std::sync::Arc;

use gridcall_sdk::{
    ClassId, ConstructorBody, FieldBody, Grid, MethodBody, NativeType, NativeValue, ObjectRef,
    Value, ValueKind,
};

use crate::convert::converter::{unsupported, ConvertError, TypeConverter};

/// Invocation failures, exhaustively enumerated so the dispatch boundary can
/// downgrade them with a total match.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    /// Wrong number of arguments for the invoker's signature
    #[error("{name}: expected {expected} argument(s), got {got}")]
    ArityMismatch {
        /// Export name of the member
        name: String,
        /// Declared argument count (minimum for varargs)
        expected: usize,
        /// Supplied argument count
        got: usize,
    },
    /// An instance member was invoked without a target
    #[error("{name}: instance member invoked without a target object")]
    MissingTarget {
        /// Export name of the member
        name: String,
    },
    /// The supplied target is not an instance of the declaring class
    #[error("{name}: target is not an object of the declaring class")]
    WrongTarget {
        /// Export name of the member
        name: String,
    },
    /// A handle argument no longer resolves to a live value
    #[error("stale or invalid object handle {0}")]
    BadHandle(u64),
    /// An argument could not be converted to its native parameter type
    #[error("{name}, argument {index}: {source}")]
    ArgumentConversion {
        /// Export name of the member
        name: String,
        /// Zero-based argument position
        index: usize,
        /// Underlying conversion failure
        source: ConvertError,
    },
    /// The member's result could not be converted back to a host value
    #[error("{name}, result: {source}")]
    ResultConversion {
        /// Export name of the member
        name: String,
        /// Underlying conversion failure
        source: ConvertError,
    },
    /// The member body itself failed
    #[error("{name}: {message}")]
    TargetFailed {
        /// Export name of the member
        name: String,
        /// Failure message raised by the body
        message: String,
    },
}

/// Per-parameter conversion step.
#[derive(Clone)]
pub(crate) enum ArgConverter {
    /// Apply a resolved converter
    Convert(Arc<dyn TypeConverter>),
    /// Identity: wrap the raw host value (host-typed parameters only)
    Passthrough,
}

/// Result conversion step.
#[derive(Clone)]
pub(crate) enum ResultConverter {
    /// Apply a resolved converter (boxing converters included)
    Convert(Arc<dyn TypeConverter>),
    /// Identity: unwrap the raw host value
    Passthrough,
}

fn convert_arg(
    name: &str,
    index: usize,
    ty: &NativeType,
    conv: &ArgConverter,
    value: &Value,
) -> Result<NativeValue, InvocationError> {
    // Missing (and empty-cell) arguments become native null, except for
    // scalar host-typed parameters, which see the raw marker. A host-array
    // parameter has no single cell to hand over, so it gets null like any
    // other typed parameter.
    if (value.is_missing() || value.is_nil()) && !ty.is_host() {
        return Ok(NativeValue::Null);
    }
    let converted = match conv {
        ArgConverter::Convert(c) => c.to_native(ty, value),
        ArgConverter::Passthrough => passthrough_arg(ty, value),
    };
    converted.map_err(|source| InvocationError::ArgumentConversion {
        name: name.to_string(),
        index,
        source,
    })
}

fn passthrough_arg(ty: &NativeType, value: &Value) -> Result<NativeValue, ConvertError> {
    match ty {
        NativeType::Host(_) => Ok(NativeValue::Host(value.clone())),
        NativeType::Array(inner) if inner.is_host() => match value {
            Value::Array(grid) => Ok(NativeValue::Array(
                (**inner).clone(),
                grid.cells().iter().map(|c| NativeValue::Host(c.clone())).collect(),
            )),
            other => Err(ConvertError::KindMismatch {
                expected: ValueKind::Array,
                got: other.kind(),
            }),
        },
        other => Err(unsupported("host-typed parameter", format!("{other:?}"))),
    }
}

fn convert_result(
    name: &str,
    result: &ResultConverter,
    native: NativeValue,
) -> Result<Value, InvocationError> {
    // Void results surface as the host's missing marker.
    if matches!(native, NativeValue::Unit) {
        return Ok(Value::Missing);
    }
    let converted = match result {
        ResultConverter::Convert(c) => c.to_host(&native),
        ResultConverter::Passthrough => passthrough_result(&native),
    };
    converted.map_err(|source| InvocationError::ResultConversion {
        name: name.to_string(),
        source,
    })
}

fn passthrough_result(native: &NativeValue) -> Result<Value, ConvertError> {
    match native {
        NativeValue::Host(v) => Ok(v.clone()),
        NativeValue::Array(_, elems) => {
            let cells = elems
                .iter()
                .map(|e| match e {
                    NativeValue::Host(v) => Ok(v.clone()),
                    other => Err(unsupported("host value", format!("{other:?}"))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(Grid::row(cells)))
        }
        other => Err(unsupported("host value", format!("{other:?}"))),
    }
}

/// Convert one call's arguments, packing varargs into a single trailing
/// native array (zero-length when no trailing arguments were supplied).
fn convert_args(
    name: &str,
    params: &[NativeType],
    element: Option<&NativeType>,
    converters: &[ArgConverter],
    varargs: bool,
    args: &[Value],
) -> Result<Vec<NativeValue>, InvocationError> {
    let fixed = if varargs { params.len() - 1 } else { params.len() };
    if varargs {
        if args.len() < fixed {
            return Err(InvocationError::ArityMismatch {
                name: name.to_string(),
                expected: fixed,
                got: args.len(),
            });
        }
    } else if args.len() != params.len() {
        return Err(InvocationError::ArityMismatch {
            name: name.to_string(),
            expected: params.len(),
            got: args.len(),
        });
    }

    let mut native = Vec::with_capacity(params.len());
    for i in 0..fixed {
        native.push(convert_arg(name, i, &params[i], &converters[i], &args[i])?);
    }
    if varargs {
        let element = element.expect("vararg invoker without element type");
        let mut packed = Vec::with_capacity(args.len() - fixed);
        for (j, value) in args[fixed..].iter().enumerate() {
            packed.push(convert_arg(name, fixed + j, element, &converters[fixed], value)?);
        }
        native.push(NativeValue::Array(element.clone(), packed));
    }
    Ok(native)
}

// ============================================================================
// MethodInvoker
// ============================================================================

/// One resolved, callable method export.
#[derive(Clone)]
pub struct MethodInvoker {
    pub(crate) class: ClassId,
    pub(crate) name: String,
    pub(crate) is_static: bool,
    pub(crate) varargs: bool,
    pub(crate) params: Vec<NativeType>,
    pub(crate) element: Option<NativeType>,
    pub(crate) converters: Vec<ArgConverter>,
    pub(crate) result: ResultConverter,
    pub(crate) body: MethodBody,
    pub(crate) host_params: Vec<ValueKind>,
    pub(crate) host_result: ValueKind,
}

impl MethodInvoker {
    /// Perform one call: convert arguments, invoke the body, convert the
    /// result. `target` is required for instance methods and ignored for
    /// static ones.
    pub fn invoke(
        &self,
        target: Option<&ObjectRef>,
        args: &[Value],
    ) -> Result<Value, InvocationError> {
        if !self.is_static && target.is_none() {
            return Err(InvocationError::MissingTarget {
                name: self.name.clone(),
            });
        }
        let native = convert_args(
            &self.name,
            &self.params,
            self.element.as_ref(),
            &self.converters,
            self.varargs,
            args,
        )?;
        let result = (self.body)(if self.is_static { None } else { target }, &native).map_err(
            |e| InvocationError::TargetFailed {
                name: self.name.clone(),
                message: e.to_string(),
            },
        )?;
        convert_result(&self.name, &self.result, result)
    }

    /// Export name of this method.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declaring class.
    pub fn declaring_class(&self) -> ClassId {
        self.class
    }

    /// Whether the method takes no instance target.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Whether the trailing parameter is variable-arity.
    pub fn is_varargs(&self) -> bool {
        self.varargs
    }

    /// Host-visible parameter kinds this invoker was resolved for.
    pub fn host_params(&self) -> &[ValueKind] {
        &self.host_params
    }

    /// Host-visible result kind.
    pub fn host_result(&self) -> ValueKind {
        self.host_result
    }
}

impl std::fmt::Debug for MethodInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodInvoker")
            .field("name", &self.name)
            .field("is_static", &self.is_static)
            .field("varargs", &self.varargs)
            .field("params", &self.params)
            .finish()
    }
}

// ============================================================================
// ConstructorInvoker
// ============================================================================

/// One resolved, callable constructor export.
///
/// Constructor results are always boxed into the heap: the freshly built
/// instance goes out as an object reference.
#[derive(Clone)]
pub struct ConstructorInvoker {
    pub(crate) class: ClassId,
    pub(crate) name: String,
    pub(crate) varargs: bool,
    pub(crate) params: Vec<NativeType>,
    pub(crate) element: Option<NativeType>,
    pub(crate) converters: Vec<ArgConverter>,
    pub(crate) result: Arc<dyn TypeConverter>,
    pub(crate) body: ConstructorBody,
    pub(crate) host_params: Vec<ValueKind>,
}

impl ConstructorInvoker {
    /// Build one new instance from host arguments.
    pub fn new_instance(&self, args: &[Value]) -> Result<Value, InvocationError> {
        let native = convert_args(
            &self.name,
            &self.params,
            self.element.as_ref(),
            &self.converters,
            self.varargs,
            args,
        )?;
        let result = (self.body)(&native).map_err(|e| InvocationError::TargetFailed {
            name: self.name.clone(),
            message: e.to_string(),
        })?;
        convert_result(
            &self.name,
            &ResultConverter::Convert(Arc::clone(&self.result)),
            result,
        )
    }

    /// Export name of this constructor.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declaring class.
    pub fn declaring_class(&self) -> ClassId {
        self.class
    }

    /// Whether the trailing parameter is variable-arity.
    pub fn is_varargs(&self) -> bool {
        self.varargs
    }

    /// Host-visible parameter kinds this invoker was resolved for.
    pub fn host_params(&self) -> &[ValueKind] {
        &self.host_params
    }
}

impl std::fmt::Debug for ConstructorInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstructorInvoker")
            .field("name", &self.name)
            .field("varargs", &self.varargs)
            .field("params", &self.params)
            .finish()
    }
}

// ============================================================================
// FieldGetter
// ============================================================================

/// One resolved, readable field export.
#[derive(Clone)]
pub struct FieldGetter {
    pub(crate) class: ClassId,
    pub(crate) name: String,
    pub(crate) is_static: bool,
    pub(crate) ty: NativeType,
    pub(crate) result: ResultConverter,
    pub(crate) body: FieldBody,
    pub(crate) host_result: ValueKind,
}

impl FieldGetter {
    /// Read the field. `target` is required for instance fields.
    pub fn get(&self, target: Option<&ObjectRef>) -> Result<Value, InvocationError> {
        if !self.is_static && target.is_none() {
            return Err(InvocationError::MissingTarget {
                name: self.name.clone(),
            });
        }
        let result = (self.body)(if self.is_static { None } else { target }).map_err(|e| {
            InvocationError::TargetFailed {
                name: self.name.clone(),
                message: e.to_string(),
            }
        })?;
        convert_result(&self.name, &self.result, result)
    }

    /// Export name of this field.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declaring class.
    pub fn declaring_class(&self) -> ClassId {
        self.class
    }

    /// Whether the field belongs to the class rather than an instance.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Declared native type of the field.
    pub fn field_type(&self) -> &NativeType {
        &self.ty
    }

    /// Host-visible result kind.
    pub fn host_result(&self) -> ValueKind {
        self.host_result
    }
}

impl std::fmt::Debug for FieldGetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldGetter")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("is_static", &self.is_static)
            .finish()
    }
}
