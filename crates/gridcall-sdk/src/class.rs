//! Class and member declarations
//!
//! The explicit registration surface that stands in for annotation scanning:
//! an embedder declares each exported type once, listing its constructors,
//! methods and fields together with their native signatures, export
//! metadata and the body closure that performs the actual call.
//!
//! Registration is two-phase so member bodies can capture class ids:
//! [`ClassTable::reserve`] hands out the id first, [`ClassTable::define`]
//! attaches the members. Member order inside a definition is contractual —
//! it drives both invoker-array alignment in the resolver and collision
//! suffixing in the naming pass.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::native::{NativeCallError, NativeType, NativeValue, ObjectRef};

/// Identifier of a registered class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(u32);

impl ClassId {
    /// Positional index of this class in its table.
    pub fn index(self) -> u32 {
        self.0
    }
}

/// How an exported member's return value is converted back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStyle {
    /// Use the best specific converter for the declared return type, fall
    /// back to boxing when none exists
    Simplest,
    /// Always box the result into the heap and return an object reference
    Object,
    /// Return the raw host value unconverted (declared types are host types)
    Passthrough,
}

/// Declaration errors raised while building a class table.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassError {
    /// A class name was reserved twice
    #[error("class name already registered: {0}")]
    DuplicateName(String),
    /// A class id was not reserved in this table
    #[error("unknown class id {0}")]
    UnknownClass(u32),
    /// `define` was called twice for the same id
    #[error("class already defined: {0}")]
    AlreadyDefined(String),
}

// ============================================================================
// Member declarations
// ============================================================================

/// Body of a constructor: arguments in, new instance (or raw value) out.
pub type ConstructorBody =
    Arc<dyn Fn(&[NativeValue]) -> Result<NativeValue, NativeCallError> + Send + Sync>;

/// Body of a method: optional target plus arguments in, result out.
pub type MethodBody = Arc<
    dyn Fn(Option<&ObjectRef>, &[NativeValue]) -> Result<NativeValue, NativeCallError>
        + Send
        + Sync,
>;

/// Body of a field getter: optional target in, field value out.
pub type FieldBody =
    Arc<dyn Fn(Option<&ObjectRef>) -> Result<NativeValue, NativeCallError> + Send + Sync>;

/// Export metadata for one parameter.
#[derive(Debug, Clone, Default)]
pub struct ParamSpec {
    /// Display name shown by the host
    pub name: String,
    /// Whether the caller may omit this argument
    pub optional: bool,
    /// Whether the host should pass a range reference rather than values
    pub by_reference: bool,
}

impl ParamSpec {
    /// Named, required, by-value parameter.
    pub fn named(name: impl Into<String>) -> Self {
        ParamSpec {
            name: name.into(),
            ..ParamSpec::default()
        }
    }

    /// Mark the parameter optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Mark the parameter as passed by reference.
    pub fn by_reference(mut self) -> Self {
        self.by_reference = true;
        self
    }
}

/// One exported constructor.
#[derive(Clone)]
pub struct Constructor {
    /// Explicit export name, when the declaration carries one
    pub export_name: Option<String>,
    /// Declared parameter types; for varargs the trailing entry is the
    /// array parameter
    pub params: Vec<NativeType>,
    /// Whether the trailing parameter is variable-arity
    pub varargs: bool,
    /// Result conversion style (`Simplest` is rejected at resolution time)
    pub result_style: ResultStyle,
    /// Per-parameter export metadata, aligned with `params`
    pub param_meta: Vec<ParamSpec>,
    /// Invocation body
    pub body: ConstructorBody,
}

impl Constructor {
    /// Declare a constructor with the given parameter types and body.
    pub fn new<F>(params: Vec<NativeType>, body: F) -> Self
    where
        F: Fn(&[NativeValue]) -> Result<NativeValue, NativeCallError> + Send + Sync + 'static,
    {
        Constructor {
            export_name: None,
            params,
            varargs: false,
            result_style: ResultStyle::Object,
            param_meta: Vec::new(),
            body: Arc::new(body),
        }
    }

    /// Set an explicit export name.
    pub fn export_name(mut self, name: impl Into<String>) -> Self {
        self.export_name = Some(name.into());
        self
    }

    /// Mark the trailing parameter variable-arity.
    pub fn varargs(mut self) -> Self {
        self.varargs = true;
        self
    }

    /// Override the result conversion style.
    pub fn result_style(mut self, style: ResultStyle) -> Self {
        self.result_style = style;
        self
    }

    /// Attach per-parameter export metadata.
    pub fn param_meta(mut self, meta: Vec<ParamSpec>) -> Self {
        self.param_meta = meta;
        self
    }
}

impl std::fmt::Debug for Constructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constructor")
            .field("export_name", &self.export_name)
            .field("params", &self.params)
            .field("varargs", &self.varargs)
            .finish()
    }
}

/// One exported method.
#[derive(Clone)]
pub struct Method {
    /// Native member name (also the default export base name suffix)
    pub name: String,
    /// Explicit export name, when the declaration carries one
    pub export_name: Option<String>,
    /// Whether the method takes no instance target
    pub is_static: bool,
    /// Declared parameter types
    pub params: Vec<NativeType>,
    /// Declared return type
    pub ret: NativeType,
    /// Whether the trailing parameter is variable-arity
    pub varargs: bool,
    /// Result conversion style
    pub result_style: ResultStyle,
    /// Per-parameter export metadata, aligned with `params`
    pub param_meta: Vec<ParamSpec>,
    /// Invocation body
    pub body: MethodBody,
}

impl Method {
    /// Declare an instance method.
    pub fn new<F>(name: impl Into<String>, params: Vec<NativeType>, ret: NativeType, body: F) -> Self
    where
        F: Fn(Option<&ObjectRef>, &[NativeValue]) -> Result<NativeValue, NativeCallError>
            + Send
            + Sync
            + 'static,
    {
        Method {
            name: name.into(),
            export_name: None,
            is_static: false,
            params,
            ret,
            varargs: false,
            result_style: ResultStyle::Simplest,
            param_meta: Vec::new(),
            body: Arc::new(body),
        }
    }

    /// Mark the method static (no instance target).
    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Set an explicit export name.
    pub fn export_name(mut self, name: impl Into<String>) -> Self {
        self.export_name = Some(name.into());
        self
    }

    /// Mark the trailing parameter variable-arity.
    pub fn varargs(mut self) -> Self {
        self.varargs = true;
        self
    }

    /// Override the result conversion style.
    pub fn result_style(mut self, style: ResultStyle) -> Self {
        self.result_style = style;
        self
    }

    /// Attach per-parameter export metadata.
    pub fn param_meta(mut self, meta: Vec<ParamSpec>) -> Self {
        self.param_meta = meta;
        self
    }
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("is_static", &self.is_static)
            .field("params", &self.params)
            .field("ret", &self.ret)
            .field("varargs", &self.varargs)
            .finish()
    }
}

/// One exported field, read through a getter body.
#[derive(Clone)]
pub struct Field {
    /// Native field name
    pub name: String,
    /// Explicit export name, when the declaration carries one
    pub export_name: Option<String>,
    /// Whether the field belongs to the class rather than an instance
    pub is_static: bool,
    /// Declared field type
    pub ty: NativeType,
    /// Result conversion style
    pub result_style: ResultStyle,
    /// Getter body
    pub get: FieldBody,
}

impl Field {
    /// Declare an instance field getter.
    pub fn new<F>(name: impl Into<String>, ty: NativeType, get: F) -> Self
    where
        F: Fn(Option<&ObjectRef>) -> Result<NativeValue, NativeCallError> + Send + Sync + 'static,
    {
        Field {
            name: name.into(),
            export_name: None,
            is_static: false,
            ty,
            result_style: ResultStyle::Simplest,
            get: Arc::new(get),
        }
    }

    /// Mark the field static.
    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Set an explicit export name.
    pub fn export_name(mut self, name: impl Into<String>) -> Self {
        self.export_name = Some(name.into());
        self
    }

    /// Override the result conversion style.
    pub fn result_style(mut self, style: ResultStyle) -> Self {
        self.result_style = style;
        self
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("is_static", &self.is_static)
            .finish()
    }
}

// ============================================================================
// Class definitions
// ============================================================================

/// Class-level export metadata.
#[derive(Debug, Clone, Default)]
pub struct ExportAttrs {
    /// Namespace prepended to every member's export name. Carries its own
    /// terminator, typically a trailing punctuation character.
    pub namespace: Option<String>,
    /// Additional prefix composed between namespace and base name
    pub prefix: Option<String>,
    /// Function category shown by the host
    pub category: Option<String>,
    /// Class description shown by the host
    pub description: Option<String>,
}

/// One registered class: identity, supertype, attributes and members.
#[derive(Debug)]
pub struct ClassDef {
    name: String,
    superclass: Option<ClassId>,
    attrs: ExportAttrs,
    constructors: Vec<Constructor>,
    methods: Vec<Method>,
    fields: Vec<Field>,
}

impl ClassDef {
    /// Simple class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared superclass, if any.
    pub fn superclass(&self) -> Option<ClassId> {
        self.superclass
    }

    /// Class-level export metadata.
    pub fn attrs(&self) -> &ExportAttrs {
        &self.attrs
    }

    /// Constructors in declaration order.
    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    /// Methods in declaration order.
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Methods sharing the given name, in declaration order.
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Method> + 'a {
        self.methods.iter().filter(move |m| m.name == name)
    }
}

/// Builder collecting one class definition for [`ClassTable::define`].
#[derive(Debug, Default)]
pub struct ClassBuilder {
    superclass: Option<ClassId>,
    attrs: ExportAttrs,
    constructors: Vec<Constructor>,
    methods: Vec<Method>,
    fields: Vec<Field>,
}

impl ClassBuilder {
    /// Start an empty definition.
    pub fn new() -> Self {
        ClassBuilder::default()
    }

    /// Declare the superclass.
    pub fn superclass(mut self, id: ClassId) -> Self {
        self.superclass = Some(id);
        self
    }

    /// Set the export namespace.
    pub fn namespace(mut self, ns: impl Into<String>) -> Self {
        self.attrs.namespace = Some(ns.into());
        self
    }

    /// Set the export prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.attrs.prefix = Some(prefix.into());
        self
    }

    /// Set the host category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.attrs.category = Some(category.into());
        self
    }

    /// Set the class description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.attrs.description = Some(description.into());
        self
    }

    /// Add a constructor.
    pub fn constructor(mut self, ctor: Constructor) -> Self {
        self.constructors.push(ctor);
        self
    }

    /// Add a method.
    pub fn method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    /// Add a field.
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }
}

struct ClassEntry {
    def: ClassDef,
    defined: bool,
}

/// Registry of all exported classes.
///
/// Read-only after setup; the engine shares it behind an `Arc`.
#[derive(Default)]
pub struct ClassTable {
    entries: Vec<ClassEntry>,
    by_name: FxHashMap<String, ClassId>,
}

impl ClassTable {
    /// Create an empty table.
    pub fn new() -> Self {
        ClassTable::default()
    }

    /// Reserve an id for `name` without defining members yet, so bodies in
    /// the upcoming definition can capture the id.
    pub fn reserve(&mut self, name: impl Into<String>) -> ClassId {
        let name = name.into();
        if let Some(id) = self.by_name.get(&name) {
            return *id;
        }
        let id = ClassId(self.entries.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.entries.push(ClassEntry {
            def: ClassDef {
                name,
                superclass: None,
                attrs: ExportAttrs::default(),
                constructors: Vec::new(),
                methods: Vec::new(),
                fields: Vec::new(),
            },
            defined: false,
        });
        id
    }

    /// Attach a definition to a reserved id.
    pub fn define(&mut self, id: ClassId, builder: ClassBuilder) -> Result<(), ClassError> {
        let entry = self
            .entries
            .get_mut(id.0 as usize)
            .ok_or(ClassError::UnknownClass(id.0))?;
        if entry.defined {
            return Err(ClassError::AlreadyDefined(entry.def.name.clone()));
        }
        entry.def.superclass = builder.superclass;
        entry.def.attrs = builder.attrs;
        entry.def.constructors = builder.constructors;
        entry.def.methods = builder.methods;
        entry.def.fields = builder.fields;
        entry.defined = true;
        Ok(())
    }

    /// Reserve and define in one step.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        builder: ClassBuilder,
    ) -> Result<ClassId, ClassError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(ClassError::DuplicateName(name));
        }
        let id = self.reserve(name);
        self.define(id, builder)?;
        Ok(id)
    }

    /// Look up a class id by name.
    pub fn find(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    /// The definition behind `id`.
    pub fn get(&self, id: ClassId) -> Option<&ClassDef> {
        self.entries.get(id.0 as usize).map(|e| &e.def)
    }

    /// The simple name behind `id`.
    pub fn name(&self, id: ClassId) -> Option<&str> {
        self.get(id).map(ClassDef::name)
    }

    /// Whether `sub` is `sup` or inherits from it through declared
    /// superclass chains.
    pub fn is_subclass(&self, sub: ClassId, sup: ClassId) -> bool {
        let mut current = Some(sub);
        while let Some(id) = current {
            if id == sup {
                return true;
            }
            current = self.get(id).and_then(ClassDef::superclass);
        }
        false
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no classes are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ClassTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassTable")
            .field("len", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_method(name: &str) -> Method {
        Method::new(name, vec![], NativeType::Unit, |_, _| Ok(NativeValue::Unit))
    }

    #[test]
    fn reserve_then_define() {
        let mut table = ClassTable::new();
        let id = table.reserve("Point");
        assert_eq!(table.find("Point"), Some(id));
        assert!(table.get(id).unwrap().methods().is_empty());

        table
            .define(id, ClassBuilder::new().method(unit_method("norm")))
            .unwrap();
        assert_eq!(table.get(id).unwrap().methods().len(), 1);
        assert!(matches!(
            table.define(id, ClassBuilder::new()),
            Err(ClassError::AlreadyDefined(_))
        ));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut table = ClassTable::new();
        table.register("A", ClassBuilder::new()).unwrap();
        assert!(matches!(
            table.register("A", ClassBuilder::new()),
            Err(ClassError::DuplicateName(_))
        ));
    }

    #[test]
    fn subclass_chains() {
        let mut table = ClassTable::new();
        let base = table.register("Base", ClassBuilder::new()).unwrap();
        let mid = table
            .register("Mid", ClassBuilder::new().superclass(base))
            .unwrap();
        let leaf = table
            .register("Leaf", ClassBuilder::new().superclass(mid))
            .unwrap();
        let other = table.register("Other", ClassBuilder::new()).unwrap();

        assert!(table.is_subclass(leaf, base));
        assert!(table.is_subclass(leaf, leaf));
        assert!(!table.is_subclass(base, leaf));
        assert!(!table.is_subclass(other, base));
    }

    #[test]
    fn member_order_is_preserved() {
        let mut table = ClassTable::new();
        let id = table
            .register(
                "Calc",
                ClassBuilder::new()
                    .method(unit_method("b"))
                    .method(unit_method("a"))
                    .method(unit_method("b")),
            )
            .unwrap();
        let def = table.get(id).unwrap();
        let names: Vec<_> = def.methods().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["b", "a", "b"]);
        assert_eq!(def.methods_named("b").count(), 2);
    }
}
