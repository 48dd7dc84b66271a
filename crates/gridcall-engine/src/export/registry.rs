//! Function registry
//!
//! Turns registered classes into a flat set of `FunctionDefinition`s with
//! globally unique display names and monotonically assigned, never-reused
//! export numbers, then pushes them to the host transport callback.
//!
//! The registry is a one-way state machine: `Empty → Scanning → Resolved →
//! Registered`. Registration runs once, single-threaded, at startup; after
//! that the registry is a read-only lookup table for the dispatcher.

use std::sync::Arc;

use gridcall_sdk::{ClassDef, ClassId, NativeType, ParamSpec, ValueKind};
use rustc_hash::FxHashMap;

use crate::invoke::resolver::{InvokerResolver, ResolveError};

use super::definition::{ExportInvoker, FunctionDefinition};
use super::metadata::{FunctionMetadata, ParamMetadata};
use super::naming::{compose, NameAllocator};

/// Registration failures. All of these are configuration errors surfaced at
/// startup; none occur on the call path.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    /// The class id is not present in the class table
    #[error("unknown class id {0}")]
    UnknownClass(u32),
    /// Classes cannot be added once invokers have been resolved
    #[error("registry is frozen; classes cannot be added after resolution")]
    Frozen,
    /// Invoker resolution failed
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Lifecycle of a [`FunctionRegistry`]. Transitions are one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// No classes added yet
    Empty,
    /// Candidate classes collected, invokers not yet built
    Scanning,
    /// Invokers and metadata attached, export numbers assigned
    Resolved,
    /// Definitions pushed to the transport callback
    Registered,
}

/// Registry of every exported function.
pub struct FunctionRegistry {
    resolver: InvokerResolver,
    pending: Vec<ClassId>,
    definitions: Vec<FunctionDefinition>,
    by_name: FxHashMap<String, usize>,
    by_export: FxHashMap<u32, usize>,
    next_export: u32,
    state: RegistryState,
}

impl FunctionRegistry {
    /// Create an empty registry over the given resolver.
    pub fn new(resolver: InvokerResolver) -> Self {
        FunctionRegistry {
            resolver,
            pending: Vec::new(),
            definitions: Vec::new(),
            by_name: FxHashMap::default(),
            by_export: FxHashMap::default(),
            next_export: 0,
            state: RegistryState::Empty,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RegistryState {
        self.state
    }

    /// Queue a class for export. Every constructor, method and field of the
    /// class becomes an export candidate.
    pub fn add_class(&mut self, class: ClassId) -> Result<(), RegistryError> {
        match self.state {
            RegistryState::Empty | RegistryState::Scanning => {}
            _ => return Err(RegistryError::Frozen),
        }
        if self.resolver.classes().get(class).is_none() {
            return Err(RegistryError::UnknownClass(class.index()));
        }
        self.pending.push(class);
        self.state = RegistryState::Scanning;
        Ok(())
    }

    /// Build invokers, metadata, names and export numbers for every queued
    /// candidate. Idempotent: calling again after resolution is a no-op and
    /// never reassigns export numbers.
    pub fn resolve(&mut self) -> Result<(), RegistryError> {
        match self.state {
            RegistryState::Resolved | RegistryState::Registered => return Ok(()),
            RegistryState::Empty | RegistryState::Scanning => {}
        }
        let mut names = NameAllocator::new();
        let classes = Arc::clone(self.resolver.classes());
        for &class in &self.pending.clone() {
            let def = classes
                .get(class)
                .ok_or(RegistryError::UnknownClass(class.index()))?;
            self.resolve_constructors(class, def, &mut names)?;
            self.resolve_methods(class, def, &mut names)?;
            self.resolve_fields(class, def, &mut names)?;
        }
        self.state = RegistryState::Resolved;
        Ok(())
    }

    /// Push every definition to the transport callback exactly once.
    ///
    /// Resolves first when needed. A second call is a no-op: previously
    /// assigned export numbers are untouched and nothing is pushed twice.
    pub fn register_functions(
        &mut self,
        callback: &mut dyn FnMut(&FunctionDefinition),
    ) -> Result<(), RegistryError> {
        if self.state == RegistryState::Registered {
            return Ok(());
        }
        self.resolve()?;
        for def in &self.definitions {
            callback(def);
        }
        self.state = RegistryState::Registered;
        Ok(())
    }

    /// All definitions in export-number order.
    pub fn definitions(&self) -> &[FunctionDefinition] {
        &self.definitions
    }

    /// Look up a definition by export number.
    pub fn find_by_export(&self, export_number: u32) -> Option<&FunctionDefinition> {
        self.by_export
            .get(&export_number)
            .map(|&i| &self.definitions[i])
    }

    /// Look up a definition by composed display name.
    pub fn find_by_name(&self, name: &str) -> Option<&FunctionDefinition> {
        self.by_name.get(name).map(|&i| &self.definitions[i])
    }

    // ------------------------------------------------------------------
    // Candidate resolution
    // ------------------------------------------------------------------

    fn resolve_constructors(
        &mut self,
        class: ClassId,
        def: &ClassDef,
        names: &mut NameAllocator,
    ) -> Result<(), RegistryError> {
        for (index, ctor) in def.constructors().iter().enumerate() {
            let requested = requested_kinds(&ctor.params, ctor.varargs);
            let invokers =
                self.resolver
                    .constructor_invokers(class, &requested, ctor.result_style)?;
            // Inapplicable candidates are dropped silently; this is the
            // overload-filtering path, not an error.
            let Some(invoker) = invokers.into_iter().nth(index).flatten() else {
                continue;
            };
            let base = ctor
                .export_name
                .clone()
                .unwrap_or_else(|| def.name().to_string());
            let metadata = FunctionMetadata {
                namespace: def.attrs().namespace.clone(),
                name: names.claim(compose(def.attrs(), &base)),
                category: def.attrs().category.clone(),
                description: def.attrs().description.clone(),
                help: None,
                params: param_metadata(&ctor.params, &ctor.param_meta, ctor.varargs),
            };
            self.push_definition(metadata, ExportInvoker::Constructor(invoker));
        }
        Ok(())
    }

    fn resolve_methods(
        &mut self,
        class: ClassId,
        def: &ClassDef,
        names: &mut NameAllocator,
    ) -> Result<(), RegistryError> {
        // Index of each method within its same-name family, so candidate
        // identity lines up with the resolver's family-ordered output.
        let mut family_index: FxHashMap<&str, usize> = FxHashMap::default();
        for method in def.methods() {
            let index = {
                let slot = family_index.entry(method.name.as_str()).or_insert(0);
                let index = *slot;
                *slot += 1;
                index
            };
            let requested = requested_kinds(&method.params, method.varargs);
            let invokers = self.resolver.method_invokers(
                class,
                &method.name,
                &requested,
                method.result_style,
            )?;
            let Some(invoker) = invokers.into_iter().nth(index).flatten() else {
                continue;
            };
            let base = method
                .export_name
                .clone()
                .unwrap_or_else(|| format!("{}.{}", def.name(), method.name));
            let metadata = FunctionMetadata {
                namespace: def.attrs().namespace.clone(),
                name: names.claim(compose(def.attrs(), &base)),
                category: def.attrs().category.clone(),
                description: def.attrs().description.clone(),
                help: None,
                params: param_metadata(&method.params, &method.param_meta, method.varargs),
            };
            self.push_definition(metadata, ExportInvoker::Method(invoker));
        }
        Ok(())
    }

    fn resolve_fields(
        &mut self,
        class: ClassId,
        def: &ClassDef,
        names: &mut NameAllocator,
    ) -> Result<(), RegistryError> {
        for field in def.fields() {
            let getter = self
                .resolver
                .field_getter(class, &field.name, field.result_style)?;
            let base = field
                .export_name
                .clone()
                .unwrap_or_else(|| format!("{}.{}", def.name(), field.name));
            let metadata = FunctionMetadata::constant(
                def.attrs().namespace.clone(),
                names.claim(compose(def.attrs(), &base)),
            );
            self.push_definition(metadata, ExportInvoker::Field(getter));
        }
        Ok(())
    }

    fn push_definition(&mut self, metadata: FunctionMetadata, invoker: ExportInvoker) {
        let export_number = self.next_export;
        self.next_export += 1;
        let index = self.definitions.len();
        self.by_name.insert(metadata.name.clone(), index);
        self.by_export.insert(export_number, index);
        self.definitions
            .push(FunctionDefinition::new(export_number, metadata, invoker));
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("state", &self.state)
            .field("definitions", &self.definitions.len())
            .finish()
    }
}

/// Host-visible kinds an export declares: one per parameter, derived from
/// the declared native types; a vararg member advertises its fixed
/// parameters plus one position of the element kind.
fn requested_kinds(params: &[NativeType], varargs: bool) -> Vec<ValueKind> {
    if varargs && !params.is_empty() {
        let fixed = params.len() - 1;
        let mut kinds: Vec<ValueKind> = params[..fixed].iter().map(NativeType::default_kind).collect();
        let element_kind = match &params[fixed] {
            NativeType::Array(component) => component.default_kind(),
            other => other.default_kind(),
        };
        kinds.push(element_kind);
        kinds
    } else {
        params.iter().map(NativeType::default_kind).collect()
    }
}

fn param_metadata(
    params: &[NativeType],
    meta: &[ParamSpec],
    varargs: bool,
) -> Vec<ParamMetadata> {
    params
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let spec = meta.get(i);
            let trailing_vararg = varargs && i + 1 == params.len();
            ParamMetadata {
                name: spec
                    .map(|s| s.name.clone())
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| format!("arg{i}")),
                optional: trailing_vararg || spec.is_some_and(|s| s.optional),
                by_reference: spec.is_some_and(|s| s.by_reference),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::registry::{
        CachingConverterRegistry, ConverterContext, ConverterRegistry,
    };
    use gridcall_sdk::{
        arg_f64, ClassBuilder, ClassTable, Constructor, Field, Heap, Method, NativeValue,
        ObjectRef,
    };

    fn registry_for(classes: ClassTable) -> (FunctionRegistry, Arc<ClassTable>) {
        let classes = Arc::new(classes);
        let ctx = ConverterContext {
            heap: Arc::new(Heap::new()),
            classes: Arc::clone(&classes),
        };
        let converters = CachingConverterRegistry::new(
            ConverterRegistry::with_builtins(&ctx).unwrap(),
        );
        let resolver = InvokerResolver::new(Arc::new(converters), Arc::clone(&classes));
        (FunctionRegistry::new(resolver), classes)
    }

    fn point_table() -> (ClassTable, ClassId) {
        let mut classes = ClassTable::new();
        let point = classes.reserve("Point");
        classes
            .define(
                point,
                ClassBuilder::new()
                    // Two unnamed overloaded constructors plus a named one.
                    .constructor(Constructor::new(vec![NativeType::F64], move |args| {
                        let x = arg_f64(args, 0)?;
                        Ok(NativeValue::Object(ObjectRef::new(point, (x, x))))
                    }))
                    .constructor(Constructor::new(
                        vec![NativeType::F64, NativeType::F64],
                        move |args| {
                            Ok(NativeValue::Object(ObjectRef::new(
                                point,
                                (arg_f64(args, 0)?, arg_f64(args, 1)?),
                            )))
                        },
                    ))
                    .constructor(
                        Constructor::new(vec![], move |_| {
                            Ok(NativeValue::Object(ObjectRef::new(point, (0.0, 0.0))))
                        })
                        .export_name("PointOrigin"),
                    ),
            )
            .unwrap();
        (classes, point)
    }

    #[test]
    fn unnamed_overloads_are_suffixed_in_member_order() {
        let (classes, point) = point_table();
        let (mut registry, _classes) = registry_for(classes);
        registry.add_class(point).unwrap();
        registry.resolve().unwrap();

        let names: Vec<_> = registry.definitions().iter().map(|d| d.name()).collect();
        assert_eq!(names, ["Point", "Point_$2", "PointOrigin"]);
    }

    #[test]
    fn export_numbers_are_monotonic_and_unique() {
        let (classes, point) = point_table();
        let (mut registry, _classes) = registry_for(classes);
        registry.add_class(point).unwrap();
        registry.resolve().unwrap();

        let numbers: Vec<_> = registry
            .definitions()
            .iter()
            .map(|d| d.export_number())
            .collect();
        assert_eq!(numbers, [0, 1, 2]);
        assert_eq!(registry.find_by_export(1).unwrap().name(), "Point_$2");
        assert!(registry.find_by_export(99).is_none());
    }

    #[test]
    fn register_functions_is_idempotent() {
        let (classes, point) = point_table();
        let (mut registry, _classes) = registry_for(classes);
        registry.add_class(point).unwrap();

        let mut pushed = Vec::new();
        registry
            .register_functions(&mut |def| pushed.push((def.export_number(), def.name().to_string())))
            .unwrap();
        assert_eq!(pushed.len(), 3);
        assert_eq!(registry.state(), RegistryState::Registered);

        let before = pushed.clone();
        registry
            .register_functions(&mut |def| pushed.push((def.export_number(), def.name().to_string())))
            .unwrap();
        assert_eq!(pushed, before, "second registration must not push again");
        let numbers: Vec<_> = registry
            .definitions()
            .iter()
            .map(|d| d.export_number())
            .collect();
        assert_eq!(numbers, [0, 1, 2]);
    }

    #[test]
    fn classes_cannot_be_added_after_resolution() {
        let (classes, point) = point_table();
        let (mut registry, _classes) = registry_for(classes);
        registry.add_class(point).unwrap();
        registry.resolve().unwrap();
        assert!(matches!(
            registry.add_class(point),
            Err(RegistryError::Frozen)
        ));
    }

    #[test]
    fn namespace_and_prefix_compose_into_names() {
        let mut classes = ClassTable::new();
        let fin = classes.reserve("Bond");
        classes
            .define(
                fin,
                ClassBuilder::new()
                    .namespace("Fin.")
                    .prefix("X")
                    .method(Method::new(
                        "price",
                        vec![NativeType::F64],
                        NativeType::F64,
                        |_, args| Ok(NativeValue::F64(arg_f64(args, 0)?)),
                    ))
                    .field(Field::new("YEAR_DAYS", NativeType::F64, |_| {
                        Ok(NativeValue::F64(360.0))
                    })),
            )
            .unwrap();
        let (mut registry, _classes) = registry_for(classes);
        registry.add_class(fin).unwrap();
        registry.resolve().unwrap();

        assert!(registry.find_by_name("Fin.XBond.price").is_some());
        assert!(registry.find_by_name("Fin.XBond.YEAR_DAYS").is_some());
        let constant = registry.find_by_name("Fin.XBond.YEAR_DAYS").unwrap();
        assert!(constant.metadata().params.is_empty());
    }

    #[test]
    fn vararg_trailing_parameter_is_advertised_optional() {
        let mut classes = ClassTable::new();
        let calc = classes.reserve("Calc");
        classes
            .define(
                calc,
                ClassBuilder::new().method(
                    Method::new(
                        "sum",
                        vec![
                            NativeType::Str,
                            NativeType::Array(Box::new(NativeType::F64)),
                        ],
                        NativeType::F64,
                        |_, _| Ok(NativeValue::F64(0.0)),
                    )
                    .static_()
                    .varargs()
                    .param_meta(vec![ParamSpec::named("label")]),
                ),
            )
            .unwrap();
        let (mut registry, _classes) = registry_for(classes);
        registry.add_class(calc).unwrap();
        registry.resolve().unwrap();

        let def = registry.find_by_name("Calc.sum").unwrap();
        let params = &def.metadata().params;
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "label");
        assert!(!params[0].optional);
        assert_eq!(params[1].name, "arg1");
        assert!(params[1].optional);
    }
}
