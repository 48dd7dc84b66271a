//! Gridcall SDK
//!
//! This crate provides everything an embedder needs to expose native types
//! to the calculation host:
//! - Host value model (tagged `Value` union and its kinds)
//! - Handle heap (stable, revocable handles to native values)
//! - Native value/type model crossing the member-body boundary
//! - Class and member declaration surface (explicit registration in place
//!   of runtime reflection)
//!
//! The conversion and dispatch machinery lives in `gridcall-engine`.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod class;
pub mod heap;
pub mod native;
pub mod value;

pub use class::{
    ClassBuilder, ClassDef, ClassError, ClassId, ClassTable, Constructor, ConstructorBody,
    ExportAttrs, Field, FieldBody, Method, MethodBody, ParamSpec, ResultStyle,
};
pub use heap::{Handle, Heap};
pub use native::{
    arg_bool, arg_f64, arg_i32, arg_i64, arg_object, arg_str, target_object, NativeCallError,
    NativeType, NativeValue, ObjectRef,
};
pub use value::{CellRange, Grid, HostError, HostObject, SheetId, Value, ValueKind};
