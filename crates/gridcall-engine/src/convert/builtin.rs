//! Built-in converters
//!
//! The compile-time-known converter set the default registry is built from.
//! Specific converters sit at normal (or high) priority; the boxing
//! `ObjectConverter` is the catch-all and registers at fallback priority so
//! it can never shadow a specific converter.
//!
//! Round-trip law: for every converter here, `to_native(to_host(x))`
//! reproduces `x` for all supported `x`, with one documented exception —
//! `NumI64Converter` emits host numbers and therefore loses precision above
//! 2^53.

use std::sync::Arc;

use gridcall_sdk::{Grid, HostObject, NativeType, NativeValue, Value, ValueKind};

use super::converter::{kind_mismatch, unsupported, ConvertError, TypeConverter, PRIORITY_FALLBACK, PRIORITY_HIGH};
use super::mapping::TypeMapping;
use super::registry::{ConfigError, ConverterContext};

/// Constructor shape shared by every registered converter implementation.
pub type ConverterFactory =
    fn(&ConverterContext) -> Result<Arc<dyn TypeConverter>, ConfigError>;

/// The explicit registration list that stands in for converter discovery.
/// Order matters within a priority bucket: earlier entries win ties.
pub(crate) fn builtin_factories() -> &'static [ConverterFactory] {
    const FACTORIES: &[ConverterFactory] = &[
        |_| Ok(Arc::new(StrConverter::new())),
        |_| Ok(Arc::new(BoolConverter::new())),
        |_| Ok(Arc::new(F64Converter::new())),
        |_| Ok(Arc::new(I32Converter::new())),
        |_| Ok(Arc::new(NumI32Converter::new())),
        |_| Ok(Arc::new(NumI64Converter::new())),
        |_| Ok(Arc::new(BytesConverter::new())),
        |_| Ok(Arc::new(F64GridConverter::new())),
        |_| Ok(Arc::new(StrGridConverter::new())),
        |_| Ok(Arc::new(ValueGridConverter::new())),
        |_| Ok(Arc::new(HostValueConverter::new())),
        |ctx| Ok(Arc::new(ObjectConverter::new(ctx.clone()))),
    ];
    FACTORIES
}

// ============================================================================
// Scalar converters
// ============================================================================

/// Host strings ↔ native strings.
pub struct StrConverter {
    mapping: TypeMapping,
}

impl StrConverter {
    /// Create the converter.
    pub fn new() -> Self {
        StrConverter {
            mapping: TypeMapping::new(ValueKind::Str, NativeType::Str),
        }
    }
}

impl TypeConverter for StrConverter {
    fn name(&self) -> &'static str {
        "str"
    }

    fn native_to_host(&self) -> &TypeMapping {
        &self.mapping
    }

    fn host_to_native(&self) -> &TypeMapping {
        &self.mapping
    }

    fn to_host(&self, native: &NativeValue) -> Result<Value, ConvertError> {
        match native {
            NativeValue::Str(s) => Ok(Value::Str(s.clone())),
            other => Err(unsupported("str", format!("{other:?}"))),
        }
    }

    fn to_native(&self, _expected: &NativeType, value: &Value) -> Result<NativeValue, ConvertError> {
        match value {
            Value::Str(s) => Ok(NativeValue::Str(s.clone())),
            other => Err(kind_mismatch(ValueKind::Str, other)),
        }
    }
}

/// Host booleans ↔ native booleans.
pub struct BoolConverter {
    mapping: TypeMapping,
}

impl BoolConverter {
    /// Create the converter.
    pub fn new() -> Self {
        BoolConverter {
            mapping: TypeMapping::new(ValueKind::Bool, NativeType::Bool),
        }
    }
}

impl TypeConverter for BoolConverter {
    fn name(&self) -> &'static str {
        "bool"
    }

    fn native_to_host(&self) -> &TypeMapping {
        &self.mapping
    }

    fn host_to_native(&self) -> &TypeMapping {
        &self.mapping
    }

    fn to_host(&self, native: &NativeValue) -> Result<Value, ConvertError> {
        match native {
            NativeValue::Bool(b) => Ok(Value::Bool(*b)),
            other => Err(unsupported("bool", format!("{other:?}"))),
        }
    }

    fn to_native(&self, _expected: &NativeType, value: &Value) -> Result<NativeValue, ConvertError> {
        match value {
            Value::Bool(b) => Ok(NativeValue::Bool(*b)),
            other => Err(kind_mismatch(ValueKind::Bool, other)),
        }
    }
}

/// Host numbers ↔ native f64.
pub struct F64Converter {
    mapping: TypeMapping,
}

impl F64Converter {
    /// Create the converter.
    pub fn new() -> Self {
        F64Converter {
            mapping: TypeMapping::new(ValueKind::Num, NativeType::F64),
        }
    }
}

impl TypeConverter for F64Converter {
    fn name(&self) -> &'static str {
        "f64"
    }

    fn native_to_host(&self) -> &TypeMapping {
        &self.mapping
    }

    fn host_to_native(&self) -> &TypeMapping {
        &self.mapping
    }

    fn to_host(&self, native: &NativeValue) -> Result<Value, ConvertError> {
        match native {
            NativeValue::F64(f) => Ok(Value::Num(*f)),
            other => Err(unsupported("f64", format!("{other:?}"))),
        }
    }

    fn to_native(&self, _expected: &NativeType, value: &Value) -> Result<NativeValue, ConvertError> {
        match value {
            Value::Num(n) => Ok(NativeValue::F64(*n)),
            // Hosts deliver integer literals as either kind.
            Value::Int(i) => Ok(NativeValue::F64(*i as f64)),
            other => Err(kind_mismatch(ValueKind::Num, other)),
        }
    }
}

/// Host integers ↔ native i32. High priority so i32 results surface as host
/// integers rather than numbers.
pub struct I32Converter {
    mapping: TypeMapping,
}

impl I32Converter {
    /// Create the converter.
    pub fn new() -> Self {
        I32Converter {
            mapping: TypeMapping::new(ValueKind::Int, NativeType::I32),
        }
    }
}

impl TypeConverter for I32Converter {
    fn name(&self) -> &'static str {
        "i32"
    }

    fn priority(&self) -> i32 {
        PRIORITY_HIGH
    }

    fn native_to_host(&self) -> &TypeMapping {
        &self.mapping
    }

    fn host_to_native(&self) -> &TypeMapping {
        &self.mapping
    }

    fn to_host(&self, native: &NativeValue) -> Result<Value, ConvertError> {
        match native {
            NativeValue::I32(i) => Ok(Value::Int(*i)),
            other => Err(unsupported("i32", format!("{other:?}"))),
        }
    }

    fn to_native(&self, _expected: &NativeType, value: &Value) -> Result<NativeValue, ConvertError> {
        match value {
            Value::Int(i) => Ok(NativeValue::I32(*i)),
            Value::Num(n) => Ok(NativeValue::I32(*n as i32)),
            other => Err(kind_mismatch(ValueKind::Int, other)),
        }
    }
}

/// Host numbers ↔ native i32, truncating. Serves i32 parameters on exports
/// whose host-visible kind is `Num`.
pub struct NumI32Converter {
    mapping: TypeMapping,
}

impl NumI32Converter {
    /// Create the converter.
    pub fn new() -> Self {
        NumI32Converter {
            mapping: TypeMapping::new(ValueKind::Num, NativeType::I32),
        }
    }
}

impl TypeConverter for NumI32Converter {
    fn name(&self) -> &'static str {
        "num-i32"
    }

    fn native_to_host(&self) -> &TypeMapping {
        &self.mapping
    }

    fn host_to_native(&self) -> &TypeMapping {
        &self.mapping
    }

    fn to_host(&self, native: &NativeValue) -> Result<Value, ConvertError> {
        match native {
            NativeValue::I32(i) => Ok(Value::Num(*i as f64)),
            other => Err(unsupported("i32", format!("{other:?}"))),
        }
    }

    fn to_native(&self, _expected: &NativeType, value: &Value) -> Result<NativeValue, ConvertError> {
        match value {
            Value::Num(n) => Ok(NativeValue::I32(*n as i32)),
            Value::Int(i) => Ok(NativeValue::I32(*i)),
            other => Err(kind_mismatch(ValueKind::Num, other)),
        }
    }
}

/// Host numbers ↔ native i64, truncating.
///
/// Lossy on the way out: values above 2^53 cannot be represented exactly as
/// host numbers. Documented round-trip exception.
pub struct NumI64Converter {
    mapping: TypeMapping,
}

impl NumI64Converter {
    /// Create the converter.
    pub fn new() -> Self {
        NumI64Converter {
            mapping: TypeMapping::new(ValueKind::Num, NativeType::I64),
        }
    }
}

impl TypeConverter for NumI64Converter {
    fn name(&self) -> &'static str {
        "num-i64"
    }

    fn native_to_host(&self) -> &TypeMapping {
        &self.mapping
    }

    fn host_to_native(&self) -> &TypeMapping {
        &self.mapping
    }

    fn to_host(&self, native: &NativeValue) -> Result<Value, ConvertError> {
        match native {
            NativeValue::I64(i) => Ok(Value::Num(*i as f64)),
            NativeValue::I32(i) => Ok(Value::Num(*i as f64)),
            other => Err(unsupported("i64", format!("{other:?}"))),
        }
    }

    fn to_native(&self, _expected: &NativeType, value: &Value) -> Result<NativeValue, ConvertError> {
        match value {
            Value::Num(n) => Ok(NativeValue::I64(*n as i64)),
            Value::Int(i) => Ok(NativeValue::I64(*i as i64)),
            other => Err(kind_mismatch(ValueKind::Num, other)),
        }
    }
}

/// Host big-data buffers ↔ native byte vectors.
pub struct BytesConverter {
    mapping: TypeMapping,
}

impl BytesConverter {
    /// Create the converter.
    pub fn new() -> Self {
        BytesConverter {
            mapping: TypeMapping::new(ValueKind::BigData, NativeType::Bytes),
        }
    }
}

impl TypeConverter for BytesConverter {
    fn name(&self) -> &'static str {
        "bytes"
    }

    fn native_to_host(&self) -> &TypeMapping {
        &self.mapping
    }

    fn host_to_native(&self) -> &TypeMapping {
        &self.mapping
    }

    fn to_host(&self, native: &NativeValue) -> Result<Value, ConvertError> {
        match native {
            NativeValue::Bytes(b) => Ok(Value::BigData(b.clone())),
            other => Err(unsupported("bytes", format!("{other:?}"))),
        }
    }

    fn to_native(&self, _expected: &NativeType, value: &Value) -> Result<NativeValue, ConvertError> {
        match value {
            Value::BigData(b) => Ok(NativeValue::Bytes(b.clone())),
            other => Err(kind_mismatch(ValueKind::BigData, other)),
        }
    }
}

// ============================================================================
// Grid converters
// ============================================================================

fn cell_to_f64(cell: &Value) -> Result<f64, ConvertError> {
    match cell {
        Value::Num(n) => Ok(*n),
        Value::Int(i) => Ok(*i as f64),
        other => Err(kind_mismatch(ValueKind::Num, other)),
    }
}

/// Host grids ↔ native f64 arrays. Grids flatten row-major; native arrays
/// come back as a single host row.
pub struct F64GridConverter {
    mapping: TypeMapping,
}

impl F64GridConverter {
    /// Create the converter.
    pub fn new() -> Self {
        F64GridConverter {
            mapping: TypeMapping::new(
                ValueKind::Array,
                NativeType::Array(Box::new(NativeType::F64)),
            ),
        }
    }
}

impl TypeConverter for F64GridConverter {
    fn name(&self) -> &'static str {
        "f64-grid"
    }

    fn native_to_host(&self) -> &TypeMapping {
        &self.mapping
    }

    fn host_to_native(&self) -> &TypeMapping {
        &self.mapping
    }

    fn to_host(&self, native: &NativeValue) -> Result<Value, ConvertError> {
        match native {
            NativeValue::Array(_, elems) => {
                let cells = elems
                    .iter()
                    .map(|e| {
                        e.as_f64()
                            .map(Value::Num)
                            .ok_or_else(|| unsupported("f64", format!("{e:?}")))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array(Grid::row(cells)))
            }
            other => Err(unsupported("[f64]", format!("{other:?}"))),
        }
    }

    fn to_native(&self, _expected: &NativeType, value: &Value) -> Result<NativeValue, ConvertError> {
        match value {
            Value::Array(grid) => {
                let elems = grid
                    .cells()
                    .iter()
                    .map(|c| cell_to_f64(c).map(NativeValue::F64))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(NativeValue::Array(NativeType::F64, elems))
            }
            other => Err(kind_mismatch(ValueKind::Array, other)),
        }
    }
}

/// Host grids ↔ native string arrays.
pub struct StrGridConverter {
    mapping: TypeMapping,
}

impl StrGridConverter {
    /// Create the converter.
    pub fn new() -> Self {
        StrGridConverter {
            mapping: TypeMapping::new(
                ValueKind::Array,
                NativeType::Array(Box::new(NativeType::Str)),
            ),
        }
    }
}

impl TypeConverter for StrGridConverter {
    fn name(&self) -> &'static str {
        "str-grid"
    }

    fn native_to_host(&self) -> &TypeMapping {
        &self.mapping
    }

    fn host_to_native(&self) -> &TypeMapping {
        &self.mapping
    }

    fn to_host(&self, native: &NativeValue) -> Result<Value, ConvertError> {
        match native {
            NativeValue::Array(_, elems) => {
                let cells = elems
                    .iter()
                    .map(|e| {
                        e.as_str()
                            .map(Value::str)
                            .ok_or_else(|| unsupported("str", format!("{e:?}")))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array(Grid::row(cells)))
            }
            other => Err(unsupported("[str]", format!("{other:?}"))),
        }
    }

    fn to_native(&self, _expected: &NativeType, value: &Value) -> Result<NativeValue, ConvertError> {
        match value {
            Value::Array(grid) => {
                let elems = grid
                    .cells()
                    .iter()
                    .map(|c| match c {
                        Value::Str(s) => Ok(NativeValue::Str(s.clone())),
                        other => Err(kind_mismatch(ValueKind::Str, other)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(NativeValue::Array(NativeType::Str, elems))
            }
            other => Err(kind_mismatch(ValueKind::Array, other)),
        }
    }
}

/// Host grids ↔ native arrays of raw host values, for members that want the
/// cells untyped.
pub struct ValueGridConverter {
    mapping: TypeMapping,
}

impl ValueGridConverter {
    /// Create the converter.
    pub fn new() -> Self {
        ValueGridConverter {
            mapping: TypeMapping::new(
                ValueKind::Array,
                NativeType::Array(Box::new(NativeType::Host(ValueKind::Any))),
            ),
        }
    }
}

impl TypeConverter for ValueGridConverter {
    fn name(&self) -> &'static str {
        "value-grid"
    }

    fn native_to_host(&self) -> &TypeMapping {
        &self.mapping
    }

    fn host_to_native(&self) -> &TypeMapping {
        &self.mapping
    }

    fn to_host(&self, native: &NativeValue) -> Result<Value, ConvertError> {
        match native {
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
            other => Err(unsupported("[host]", format!("{other:?}"))),
        }
    }

    fn to_native(&self, _expected: &NativeType, value: &Value) -> Result<NativeValue, ConvertError> {
        match value {
            Value::Array(grid) => {
                let elems = grid
                    .cells()
                    .iter()
                    .map(|c| NativeValue::Host(c.clone()))
                    .collect();
                Ok(NativeValue::Array(
                    NativeType::Host(ValueKind::Any),
                    elems,
                ))
            }
            other => Err(kind_mismatch(ValueKind::Array, other)),
        }
    }
}

// ============================================================================
// Passthrough and boxing
// ============================================================================

/// Wraps raw host values for members that declare host-typed parameters or
/// returns outside of full passthrough mode.
pub struct HostValueConverter {
    mapping: TypeMapping,
}

impl HostValueConverter {
    /// Create the converter.
    pub fn new() -> Self {
        HostValueConverter {
            mapping: TypeMapping::new(ValueKind::Any, NativeType::Host(ValueKind::Any)),
        }
    }
}

impl TypeConverter for HostValueConverter {
    fn name(&self) -> &'static str {
        "host-value"
    }

    fn native_to_host(&self) -> &TypeMapping {
        &self.mapping
    }

    fn host_to_native(&self) -> &TypeMapping {
        &self.mapping
    }

    fn to_host(&self, native: &NativeValue) -> Result<Value, ConvertError> {
        match native {
            NativeValue::Host(v) => Ok(v.clone()),
            other => Err(unsupported("host value", format!("{other:?}"))),
        }
    }

    fn to_native(&self, _expected: &NativeType, value: &Value) -> Result<NativeValue, ConvertError> {
        Ok(NativeValue::Host(value.clone()))
    }
}

/// The catch-all: boxes any native value into the heap on the way out and
/// resolves object handles on the way in.
///
/// Every `to_host` call mints a fresh handle — equal-but-distinct results
/// are deliberately not deduplicated.
pub struct ObjectConverter {
    ctx: ConverterContext,
    mapping: TypeMapping,
}

impl ObjectConverter {
    /// Create the converter bound to the given heap and class table.
    pub fn new(ctx: ConverterContext) -> Self {
        ObjectConverter {
            ctx,
            mapping: TypeMapping::new(ValueKind::Object, NativeType::Any),
        }
    }
}

impl TypeConverter for ObjectConverter {
    fn name(&self) -> &'static str {
        "object"
    }

    fn priority(&self) -> i32 {
        PRIORITY_FALLBACK
    }

    fn native_to_host(&self) -> &TypeMapping {
        &self.mapping
    }

    fn host_to_native(&self) -> &TypeMapping {
        &self.mapping
    }

    fn to_host(&self, native: &NativeValue) -> Result<Value, ConvertError> {
        let type_name = native.type_name(&self.ctx.classes);
        let handle = self.ctx.heap.allocate(native.clone());
        Ok(Value::Object(HostObject { type_name, handle }))
    }

    fn to_native(&self, expected: &NativeType, value: &Value) -> Result<NativeValue, ConvertError> {
        let obj = match value {
            Value::Object(obj) => obj,
            other => return Err(kind_mismatch(ValueKind::Object, other)),
        };
        let native = self
            .ctx
            .heap
            .get(obj.handle)
            .ok_or(ConvertError::StaleHandle(obj.handle.to_bits()))?;
        // A typed parameter only accepts instances of (a subclass of) its
        // declared class.
        if let NativeType::Class(want) = expected {
            match native.as_object() {
                Some(r) if self.ctx.classes.is_subclass(r.class(), *want) => {}
                _ => {
                    return Err(unsupported(
                        self.ctx.classes.name(*want).unwrap_or("<unknown>"),
                        native.type_name(&self.ctx.classes),
                    ))
                }
            }
        }
        Ok(native)
    }
}
