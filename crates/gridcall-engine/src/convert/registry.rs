//! Converter registry
//!
//! An ordered collection of converters, queried in two directions:
//! by host→native mapping when the requested kind is known, or by native
//! type alone when choosing how to surface an arbitrary return value.
//!
//! Lookup is a linear scan in descending priority order; within one
//! priority bucket, registration order decides and the first assignable
//! match wins. That makes registration order part of the observable
//! contract: catch-alls belong at fallback priority.

use std::sync::Arc;

use dashmap::DashMap;
use gridcall_sdk::{ClassTable, Heap, NativeType};

use super::builtin::builtin_factories;
use super::converter::TypeConverter;
use super::mapping::TypeMapping;

/// Registry build failures. Fatal: a registry with a missing converter is a
/// misconfiguration, not something to limp along with.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// A converter implementation could not be constructed
    #[error("failed to construct converter {name}: {reason}")]
    ConverterInit {
        /// Converter name
        name: &'static str,
        /// Construction failure detail
        reason: String,
    },
}

/// Shared environment handed to context-bound converters at construction.
#[derive(Clone)]
pub struct ConverterContext {
    /// Handle heap used by boxing converters
    pub heap: Arc<Heap>,
    /// Class table used for assignability and display names
    pub classes: Arc<ClassTable>,
}

impl std::fmt::Debug for ConverterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterContext").finish_non_exhaustive()
    }
}

/// The two query forms every registry answers.
///
/// Matching is a pure function of static types, which is what makes the
/// caching decorator sound.
pub trait ConverterLookup: Send + Sync {
    /// Highest-priority converter whose host→native mapping is assignable
    /// from `mapping`.
    fn find_converter(&self, mapping: &TypeMapping) -> Option<Arc<dyn TypeConverter>>;

    /// Highest-priority converter whose native→host mapping can emit
    /// (a supertype of) `ty`.
    fn find_for_native(&self, ty: &NativeType) -> Option<Arc<dyn TypeConverter>>;
}

/// Priority-ordered converter collection.
///
/// Immutable and freely shared once built.
pub struct ConverterRegistry {
    classes: Arc<ClassTable>,
    // Sorted by descending priority; ties keep registration order.
    converters: Vec<Arc<dyn TypeConverter>>,
}

impl ConverterRegistry {
    /// Create an empty registry over the given class table.
    pub fn new(classes: Arc<ClassTable>) -> Self {
        ConverterRegistry {
            classes,
            converters: Vec::new(),
        }
    }

    /// Build a registry holding all built-in converters.
    ///
    /// Each entry of the built-in list is constructed in order; a factory
    /// failure aborts the build — it is a configuration error, never
    /// silently dropped.
    pub fn with_builtins(ctx: &ConverterContext) -> Result<Self, ConfigError> {
        let mut registry = ConverterRegistry::new(Arc::clone(&ctx.classes));
        for factory in builtin_factories() {
            registry.register(factory(ctx)?);
        }
        Ok(registry)
    }

    /// Add a converter, keeping the priority ordering stable.
    pub fn register(&mut self, converter: Arc<dyn TypeConverter>) {
        let priority = converter.priority();
        // Insert after every converter of equal or higher priority so ties
        // keep registration order.
        let at = self
            .converters
            .partition_point(|c| c.priority() >= priority);
        self.converters.insert(at, converter);
    }

    /// Registered converters in query order.
    pub fn converters(&self) -> &[Arc<dyn TypeConverter>] {
        &self.converters
    }
}

impl ConverterLookup for ConverterRegistry {
    fn find_converter(&self, mapping: &TypeMapping) -> Option<Arc<dyn TypeConverter>> {
        self.converters
            .iter()
            .find(|c| c.host_to_native().is_assignable_from(mapping, &self.classes))
            .cloned()
    }

    fn find_for_native(&self, ty: &NativeType) -> Option<Arc<dyn TypeConverter>> {
        self.converters
            .iter()
            .find(|c| {
                c.native_to_host()
                    .native
                    .is_assignable_from(ty, &self.classes)
            })
            .cloned()
    }
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("converters", &self.converters.len())
            .finish()
    }
}

/// Memoizing decorator over any [`ConverterLookup`].
///
/// Both query forms are cached — hits and misses alike — in concurrent maps
/// keyed by the exact queried mapping or type, not by the matched
/// converter's own mapping.
pub struct CachingConverterRegistry<R: ConverterLookup> {
    inner: R,
    by_mapping: DashMap<TypeMapping, Option<Arc<dyn TypeConverter>>>,
    by_native: DashMap<NativeType, Option<Arc<dyn TypeConverter>>>,
}

impl<R: ConverterLookup> CachingConverterRegistry<R> {
    /// Wrap `inner` with memo tables.
    pub fn new(inner: R) -> Self {
        CachingConverterRegistry {
            inner,
            by_mapping: DashMap::new(),
            by_native: DashMap::new(),
        }
    }

    /// Number of memoized mapping queries, for diagnostics.
    pub fn cached_mappings(&self) -> usize {
        self.by_mapping.len()
    }
}

impl<R: ConverterLookup> ConverterLookup for CachingConverterRegistry<R> {
    fn find_converter(&self, mapping: &TypeMapping) -> Option<Arc<dyn TypeConverter>> {
        if let Some(hit) = self.by_mapping.get(mapping) {
            return hit.clone();
        }
        let found = self.inner.find_converter(mapping);
        self.by_mapping.insert(mapping.clone(), found.clone());
        found
    }

    fn find_for_native(&self, ty: &NativeType) -> Option<Arc<dyn TypeConverter>> {
        if let Some(hit) = self.by_native.get(ty) {
            return hit.clone();
        }
        let found = self.inner.find_for_native(ty);
        self.by_native.insert(ty.clone(), found.clone());
        found
    }
}

impl<R: ConverterLookup> std::fmt::Debug for CachingConverterRegistry<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingConverterRegistry")
            .field("by_mapping", &self.by_mapping.len())
            .field("by_native", &self.by_native.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::converter::{ConvertError, PRIORITY_FALLBACK, PRIORITY_HIGH};
    use gridcall_sdk::{NativeValue, Value, ValueKind};

    fn test_ctx() -> ConverterContext {
        ConverterContext {
            heap: Arc::new(Heap::new()),
            classes: Arc::new(ClassTable::new()),
        }
    }

    /// Minimal converter with a configurable mapping and priority.
    struct Probe {
        name: &'static str,
        priority: i32,
        mapping: TypeMapping,
    }

    impl Probe {
        fn new(name: &'static str, priority: i32, kind: ValueKind, native: NativeType) -> Arc<Self> {
            Arc::new(Probe {
                name,
                priority,
                mapping: TypeMapping::new(kind, native),
            })
        }
    }

    impl TypeConverter for Probe {
        fn name(&self) -> &'static str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn native_to_host(&self) -> &TypeMapping {
            &self.mapping
        }

        fn host_to_native(&self) -> &TypeMapping {
            &self.mapping
        }

        fn to_host(&self, _native: &NativeValue) -> Result<Value, ConvertError> {
            Ok(Value::Nil)
        }

        fn to_native(
            &self,
            _expected: &NativeType,
            _value: &Value,
        ) -> Result<NativeValue, ConvertError> {
            Ok(NativeValue::Null)
        }
    }

    #[test]
    fn builtins_resolve_the_common_mappings() {
        let registry = ConverterRegistry::with_builtins(&test_ctx()).unwrap();
        let num_i32 = registry
            .find_converter(&TypeMapping::new(ValueKind::Num, NativeType::I32))
            .unwrap();
        assert_eq!(num_i32.name(), "num-i32");

        let boxing = registry
            .find_converter(&TypeMapping::new(ValueKind::Object, NativeType::Any))
            .unwrap();
        assert_eq!(boxing.name(), "object");

        // Native-side query prefers the high-priority specific converter.
        assert_eq!(registry.find_for_native(&NativeType::I32).unwrap().name(), "i32");
        assert_eq!(registry.find_for_native(&NativeType::F64).unwrap().name(), "f64");
    }

    #[test]
    fn lower_priority_catch_all_never_shadows_specific() {
        let mut registry = ConverterRegistry::new(Arc::new(ClassTable::new()));
        // Deliberately register the catch-all first.
        registry.register(Probe::new(
            "catch-all",
            PRIORITY_FALLBACK,
            ValueKind::Any,
            NativeType::Any,
        ));
        registry.register(Probe::new("specific", 0, ValueKind::Num, NativeType::F64));

        let found = registry
            .find_converter(&TypeMapping::new(ValueKind::Num, NativeType::F64))
            .unwrap();
        assert_eq!(found.name(), "specific");

        // The catch-all still answers queries nothing else matches.
        let found = registry
            .find_converter(&TypeMapping::new(ValueKind::Err, NativeType::Unit))
            .unwrap();
        assert_eq!(found.name(), "catch-all");
    }

    #[test]
    fn equal_priority_ties_break_by_registration_order() {
        let mut registry = ConverterRegistry::new(Arc::new(ClassTable::new()));
        registry.register(Probe::new("first", 0, ValueKind::Num, NativeType::F64));
        registry.register(Probe::new("second", 0, ValueKind::Num, NativeType::F64));
        registry.register(Probe::new("eager", PRIORITY_HIGH, ValueKind::Num, NativeType::F64));

        let found = registry
            .find_converter(&TypeMapping::new(ValueKind::Num, NativeType::F64))
            .unwrap();
        assert_eq!(found.name(), "eager");

        let order: Vec<_> = registry.converters().iter().map(|c| c.name()).collect();
        assert_eq!(order, ["eager", "first", "second"]);
    }

    #[test]
    fn caching_memoizes_hits_and_misses() {
        let registry = ConverterRegistry::with_builtins(&test_ctx()).unwrap();
        let cached = CachingConverterRegistry::new(registry);

        let mapping = TypeMapping::new(ValueKind::Num, NativeType::F64);
        let first = cached.find_converter(&mapping).unwrap();
        let second = cached.find_converter(&mapping).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cached.cached_mappings(), 1);

        // Misses are memoized too.
        let miss = TypeMapping::new(ValueKind::Err, NativeType::Unit);
        assert!(cached.find_converter(&miss).is_none());
        assert!(cached.find_converter(&miss).is_none());
        assert_eq!(cached.cached_mappings(), 2);
    }
}
