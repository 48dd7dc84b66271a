//! Bidirectional conversion between host values and native values.

pub mod builtin;
pub mod converter;
pub mod mapping;
pub mod registry;

pub use converter::{ConvertError, TypeConverter, PRIORITY_FALLBACK, PRIORITY_HIGH, PRIORITY_NORMAL};
pub use mapping::TypeMapping;
pub use registry::{
    CachingConverterRegistry, ConfigError, ConverterContext, ConverterLookup, ConverterRegistry,
};
