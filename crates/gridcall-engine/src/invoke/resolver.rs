//! Invoker resolution engine
//!
//! Given a member family (every constructor of a class, or every method
//! sharing one name) and the tuple of host value kinds a declared export
//! accepts, the resolver decides which members are applicable and builds one
//! invoker per applicable member.
//!
//! The output array always mirrors the member enumeration order, with `None`
//! at inapplicable positions, so callers can align invoker identity with
//! member identity across resolution modes. An all-`None` result is not an
//! error here; registration decides whether to drop the candidate or raise.

use std::sync::Arc;

use gridcall_sdk::{ClassDef, ClassId, ClassTable, NativeType, ResultStyle, ValueKind};

use crate::convert::converter::TypeConverter;
use crate::convert::mapping::TypeMapping;
use crate::convert::registry::ConverterLookup;
use crate::invoke::invoker::{
    ArgConverter, ConstructorInvoker, FieldGetter, MethodInvoker, ResultConverter,
};

/// Resolution failures. These are configuration-time errors; a member that
/// is merely inapplicable is reported as `None` in the output, not as an
/// error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    /// The class id is not registered
    #[error("unknown class id {0}")]
    UnknownClass(u32),
    /// No field with the requested name
    #[error("{class}: no field named {field}")]
    UnknownField {
        /// Class name
        class: String,
        /// Requested field name
        field: String,
    },
    /// No boxing converter is registered, so object results are impossible
    #[error("no object converter registered; object results cannot be produced")]
    NoObjectConverter,
    /// Constructors have no simplest/boxed ambiguity to resolve
    #[error("{class}: constructors cannot use the simplest result style")]
    SimplestConstructor {
        /// Class name
        class: String,
    },
    /// A varargs member must declare a trailing array parameter
    #[error("{class}.{member}: varargs member must end in an array parameter")]
    MalformedVarargs {
        /// Class name
        class: String,
        /// Member name
        member: String,
    },
    /// Passthrough results require a host-typed declared return
    #[error("passthrough result requires a host-typed return, declared {ty}")]
    PassthroughResult {
        /// Declared return type name
        ty: String,
    },
}

/// Builds invokers by pairing member declarations with converters.
pub struct InvokerResolver {
    registry: Arc<dyn ConverterLookup>,
    classes: Arc<ClassTable>,
}

impl InvokerResolver {
    /// Create a resolver over the given converter registry and class table.
    pub fn new(registry: Arc<dyn ConverterLookup>, classes: Arc<ClassTable>) -> Self {
        InvokerResolver { registry, classes }
    }

    /// The class table this resolver reads declarations from.
    pub fn classes(&self) -> &Arc<ClassTable> {
        &self.classes
    }

    fn class(&self, id: ClassId) -> Result<&ClassDef, ResolveError> {
        self.classes
            .get(id)
            .ok_or(ResolveError::UnknownClass(id.index()))
    }

    /// Build one invoker per constructor of `class`, `None` where the
    /// constructor is not applicable to the requested kinds.
    pub fn constructor_invokers(
        &self,
        class: ClassId,
        requested: &[ValueKind],
        style: ResultStyle,
    ) -> Result<Vec<Option<ConstructorInvoker>>, ResolveError> {
        let def = self.class(class)?;
        if style == ResultStyle::Simplest {
            return Err(ResolveError::SimplestConstructor {
                class: def.name().to_string(),
            });
        }
        // Constructor results are always boxed, whatever the argument style.
        let boxing = self.object_converter()?;

        let mut out = Vec::with_capacity(def.constructors().len());
        for ctor in def.constructors() {
            let element = if ctor.varargs {
                Some(self.vararg_element(def.name(), "constructor", &ctor.params)?)
            } else {
                None
            };
            let resolved =
                self.resolve_member_args(&ctor.params, element.as_ref(), requested, style);
            out.push(resolved.map(|(converters, host_params)| ConstructorInvoker {
                class,
                name: def.name().to_string(),
                varargs: ctor.varargs,
                params: ctor.params.clone(),
                element,
                converters,
                result: Arc::clone(&boxing),
                body: Arc::clone(&ctor.body),
                host_params,
            }));
        }
        Ok(out)
    }

    /// Build one invoker per method of `class` named `name`, `None` where
    /// the overload is not applicable to the requested kinds.
    pub fn method_invokers(
        &self,
        class: ClassId,
        name: &str,
        requested: &[ValueKind],
        style: ResultStyle,
    ) -> Result<Vec<Option<MethodInvoker>>, ResolveError> {
        let def = self.class(class)?;
        let mut out = Vec::new();
        for method in def.methods_named(name) {
            let element = if method.varargs {
                Some(self.vararg_element(def.name(), &method.name, &method.params)?)
            } else {
                None
            };
            let Some((converters, host_params)) =
                self.resolve_member_args(&method.params, element.as_ref(), requested, style)
            else {
                out.push(None);
                continue;
            };
            let (result, host_result) = self.result_converter(&method.ret, style)?;
            out.push(Some(MethodInvoker {
                class,
                name: format!("{}.{}", def.name(), method.name),
                is_static: method.is_static,
                varargs: method.varargs,
                params: method.params.clone(),
                element,
                converters,
                result,
                body: Arc::clone(&method.body),
                host_params,
                host_result,
            }));
        }
        Ok(out)
    }

    /// Build the getter for the named field.
    pub fn field_getter(
        &self,
        class: ClassId,
        field: &str,
        style: ResultStyle,
    ) -> Result<FieldGetter, ResolveError> {
        let def = self.class(class)?;
        let decl = def
            .fields()
            .iter()
            .find(|f| f.name == field)
            .ok_or_else(|| ResolveError::UnknownField {
                class: def.name().to_string(),
                field: field.to_string(),
            })?;
        let (result, host_result) = self.result_converter(&decl.ty, style)?;
        Ok(FieldGetter {
            class,
            name: format!("{}.{}", def.name(), decl.name),
            is_static: decl.is_static,
            ty: decl.ty.clone(),
            result,
            body: Arc::clone(&decl.get),
            host_result,
        })
    }

    // ------------------------------------------------------------------
    // Applicability
    // ------------------------------------------------------------------

    /// Element type of a varargs member's trailing array parameter.
    ///
    /// A varargs declaration without a trailing array parameter is a
    /// registration mistake, not an inapplicable overload, so it errors
    /// instead of yielding `None`.
    fn vararg_element(
        &self,
        class: &str,
        member: &str,
        params: &[NativeType],
    ) -> Result<NativeType, ResolveError> {
        match params.last() {
            Some(NativeType::Array(component)) => Ok((**component).clone()),
            _ => Err(ResolveError::MalformedVarargs {
                class: class.to_string(),
                member: member.to_string(),
            }),
        }
    }

    /// Converter array for one member against one requested kind tuple.
    ///
    /// Returns `None` when the member is inapplicable: wrong arity, or some
    /// position has no assignable converter. For varargs, `element` is the
    /// trailing array's component type; it collapses to one element-converter
    /// entry, and every excess position must resolve to that same converter.
    fn resolve_member_args(
        &self,
        params: &[NativeType],
        element: Option<&NativeType>,
        requested: &[ValueKind],
        style: ResultStyle,
    ) -> Option<(Vec<ArgConverter>, Vec<ValueKind>)> {
        let Some(element) = element else {
            if params.len() != requested.len() {
                return None;
            }
            let mut converters = Vec::with_capacity(params.len());
            for (param, kind) in params.iter().zip(requested) {
                converters.push(self.arg_converter(param, *kind, style)?);
            }
            return Some((converters, requested.to_vec()));
        };

        // `vararg_element` guaranteed the trailing array parameter.
        let fixed = params.len() - 1;
        if requested.len() < fixed {
            return None;
        }

        let mut converters = Vec::with_capacity(params.len());
        for i in 0..fixed {
            converters.push(self.arg_converter(&params[i], requested[i], style)?);
        }

        let excess = &requested[fixed..];
        let element_conv = if excess.is_empty() {
            // Zero trailing arguments still get a packer; pick the element
            // converter through the component's natural host kind.
            self.arg_converter(element, element.default_kind(), style)?
        } else {
            let first = self.arg_converter(element, excess[0], style)?;
            for kind in &excess[1..] {
                let next = self.arg_converter(element, *kind, style)?;
                if !same_arg_converter(&first, &next) {
                    return None;
                }
            }
            first
        };
        converters.push(element_conv);
        Some((converters, requested.to_vec()))
    }

    fn arg_converter(
        &self,
        param: &NativeType,
        kind: ValueKind,
        style: ResultStyle,
    ) -> Option<ArgConverter> {
        if style == ResultStyle::Passthrough {
            match param {
                NativeType::Host(_) => return Some(ArgConverter::Passthrough),
                NativeType::Array(inner) if inner.is_host() => {
                    return Some(ArgConverter::Passthrough)
                }
                // Mixed signatures fall through to normal converter search.
                _ => {}
            }
        }
        self.registry
            .find_converter(&TypeMapping::new(kind, param.clone()))
            .map(ArgConverter::Convert)
    }

    fn result_converter(
        &self,
        ret: &NativeType,
        style: ResultStyle,
    ) -> Result<(ResultConverter, ValueKind), ResolveError> {
        match style {
            // Passthrough results hand the raw native value to the host, so
            // only host-representable returns may declare the style.
            ResultStyle::Passthrough => match ret {
                NativeType::Unit | NativeType::Host(_) => {
                    Ok((ResultConverter::Passthrough, ret.default_kind()))
                }
                NativeType::Array(inner) if inner.is_host() => {
                    Ok((ResultConverter::Passthrough, ValueKind::Array))
                }
                other => Err(ResolveError::PassthroughResult {
                    ty: other.name(&self.classes),
                }),
            },
            ResultStyle::Object => {
                let boxing = self.object_converter()?;
                Ok((ResultConverter::Convert(boxing), ValueKind::Object))
            }
            ResultStyle::Simplest => match self.registry.find_for_native(ret) {
                Some(conv) => {
                    let kind = conv.native_to_host().kind;
                    Ok((ResultConverter::Convert(conv), kind))
                }
                None => {
                    let boxing = self.object_converter()?;
                    Ok((ResultConverter::Convert(boxing), ValueKind::Object))
                }
            },
        }
    }

    fn object_converter(&self) -> Result<Arc<dyn TypeConverter>, ResolveError> {
        self.registry
            .find_converter(&TypeMapping::new(ValueKind::Object, NativeType::Any))
            .ok_or(ResolveError::NoObjectConverter)
    }
}

impl std::fmt::Debug for InvokerResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvokerResolver").finish_non_exhaustive()
    }
}

fn same_arg_converter(a: &ArgConverter, b: &ArgConverter) -> bool {
    match (a, b) {
        (ArgConverter::Passthrough, ArgConverter::Passthrough) => true,
        (ArgConverter::Convert(a), ArgConverter::Convert(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::registry::{
        CachingConverterRegistry, ConverterContext, ConverterRegistry,
    };
    use gridcall_sdk::{
        arg_f64, arg_i32, ClassBuilder, Constructor, Field, Heap, Method, NativeValue, ObjectRef,
    };

    struct Fixture {
        resolver: InvokerResolver,
        calc: ClassId,
    }

    fn fixture() -> Fixture {
        let mut classes = ClassTable::new();
        let calc = classes.reserve("Calc");
        classes
            .define(
                calc,
                ClassBuilder::new()
                    .constructor(Constructor::new(vec![NativeType::F64], move |args| {
                        Ok(NativeValue::Object(ObjectRef::new(calc, arg_f64(args, 0)?)))
                    }))
                    // Overloaded family: mul/1 and mul/2.
                    .method(
                        Method::new("mul", vec![NativeType::I32], NativeType::I32, |_, args| {
                            Ok(NativeValue::I32(arg_i32(args, 0)? * 2))
                        })
                        .static_(),
                    )
                    .method(
                        Method::new(
                            "mul",
                            vec![NativeType::I32, NativeType::I32],
                            NativeType::I32,
                            |_, args| Ok(NativeValue::I32(arg_i32(args, 0)? * arg_i32(args, 1)?)),
                        )
                        .static_(),
                    )
                    // sum(label, values...)
                    .method(
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
                        .varargs(),
                    )
                    // Raw round-trip, untouched in passthrough mode.
                    .method(
                        Method::new(
                            "echo",
                            vec![NativeType::Host(ValueKind::Any)],
                            NativeType::Host(ValueKind::Any),
                            |_, args| Ok(args[0].clone()),
                        )
                        .static_(),
                    )
                    .field(Field::new("limit", NativeType::F64, |_| {
                        Ok(NativeValue::F64(9.0))
                    })),
            )
            .unwrap();
        let classes = Arc::new(classes);
        let ctx = ConverterContext {
            heap: Arc::new(Heap::new()),
            classes: Arc::clone(&classes),
        };
        let registry = CachingConverterRegistry::new(
            ConverterRegistry::with_builtins(&ctx).unwrap(),
        );
        Fixture {
            resolver: InvokerResolver::new(Arc::new(registry), classes),
            calc,
        }
    }

    #[test]
    fn output_mirrors_member_enumeration_order() {
        let fx = fixture();
        let invokers = fx
            .resolver
            .method_invokers(fx.calc, "mul", &[ValueKind::Num], ResultStyle::Simplest)
            .unwrap();
        assert_eq!(invokers.len(), 2);
        assert!(invokers[0].is_some());
        assert!(invokers[1].is_none());

        let invokers = fx
            .resolver
            .method_invokers(
                fx.calc,
                "mul",
                &[ValueKind::Num, ValueKind::Num],
                ResultStyle::Simplest,
            )
            .unwrap();
        assert!(invokers[0].is_none());
        assert!(invokers[1].is_some());
    }

    #[test]
    fn no_applicable_member_is_all_none_not_an_error() {
        let fx = fixture();
        let invokers = fx
            .resolver
            .method_invokers(
                fx.calc,
                "mul",
                &[ValueKind::Str, ValueKind::Str, ValueKind::Str],
                ResultStyle::Simplest,
            )
            .unwrap();
        assert_eq!(invokers.len(), 2);
        assert!(invokers.iter().all(Option::is_none));
    }

    #[test]
    fn vararg_arity_boundaries() {
        let fx = fixture();
        // Below the fixed count: inapplicable.
        let invokers = fx
            .resolver
            .method_invokers(fx.calc, "sum", &[], ResultStyle::Simplest)
            .unwrap();
        assert!(invokers[0].is_none());

        // Exactly the fixed count: applicable with zero trailing args.
        let invokers = fx
            .resolver
            .method_invokers(fx.calc, "sum", &[ValueKind::Str], ResultStyle::Simplest)
            .unwrap();
        let invoker = invokers[0].as_ref().unwrap();
        assert!(invoker.is_varargs());

        // More than the fixed count.
        let invokers = fx
            .resolver
            .method_invokers(
                fx.calc,
                "sum",
                &[ValueKind::Str, ValueKind::Num, ValueKind::Num],
                ResultStyle::Simplest,
            )
            .unwrap();
        assert!(invokers[0].is_some());
    }

    #[test]
    fn simplest_constructor_fails_fast() {
        let fx = fixture();
        assert!(matches!(
            fx.resolver
                .constructor_invokers(fx.calc, &[ValueKind::Num], ResultStyle::Simplest),
            Err(ResolveError::SimplestConstructor { .. })
        ));
    }

    #[test]
    fn constructor_resolves_with_object_result() {
        let fx = fixture();
        let invokers = fx
            .resolver
            .constructor_invokers(fx.calc, &[ValueKind::Num], ResultStyle::Object)
            .unwrap();
        assert_eq!(invokers.len(), 1);
        let ctor = invokers[0].as_ref().unwrap();
        assert_eq!(ctor.name(), "Calc");
        assert_eq!(ctor.host_params(), &[ValueKind::Num]);
    }

    #[test]
    fn simplest_result_prefers_specific_converter() {
        let fx = fixture();
        let invokers = fx
            .resolver
            .method_invokers(
                fx.calc,
                "mul",
                &[ValueKind::Num, ValueKind::Num],
                ResultStyle::Simplest,
            )
            .unwrap();
        // i32 return surfaces as a host integer, not a boxed object.
        assert_eq!(invokers[1].as_ref().unwrap().host_result(), ValueKind::Int);
    }

    #[test]
    fn object_result_reports_object_kind() {
        let fx = fixture();
        let invokers = fx
            .resolver
            .method_invokers(
                fx.calc,
                "mul",
                &[ValueKind::Num, ValueKind::Num],
                ResultStyle::Object,
            )
            .unwrap();
        assert_eq!(
            invokers[1].as_ref().unwrap().host_result(),
            ValueKind::Object
        );
    }

    #[test]
    fn passthrough_style_requires_a_host_typed_return() {
        let fx = fixture();
        // A host-typed return may hand its value through untouched.
        let invokers = fx
            .resolver
            .method_invokers(fx.calc, "echo", &[ValueKind::Any], ResultStyle::Passthrough)
            .unwrap();
        assert!(invokers[0].is_some());

        // A conventional return cannot: that is a misconfigured export and
        // must fail at resolution, not on the first call.
        assert!(matches!(
            fx.resolver
                .method_invokers(fx.calc, "mul", &[ValueKind::Num], ResultStyle::Passthrough),
            Err(ResolveError::PassthroughResult { .. })
        ));
    }

    #[test]
    fn varargs_without_trailing_array_is_a_configuration_error() {
        let mut classes = ClassTable::new();
        let bad = classes.reserve("Bad");
        classes
            .define(
                bad,
                ClassBuilder::new()
                    // Varargs with no parameters at all.
                    .constructor(
                        Constructor::new(vec![], |_| Ok(NativeValue::Unit)).varargs(),
                    )
                    // Varargs whose trailing parameter is not an array.
                    .method(
                        Method::new("join", vec![NativeType::Str], NativeType::Str, |_, _| {
                            Ok(NativeValue::Str(String::new()))
                        })
                        .static_()
                        .varargs(),
                    ),
            )
            .unwrap();
        let classes = Arc::new(classes);
        let ctx = ConverterContext {
            heap: Arc::new(Heap::new()),
            classes: Arc::clone(&classes),
        };
        let registry = CachingConverterRegistry::new(
            ConverterRegistry::with_builtins(&ctx).unwrap(),
        );
        let resolver = InvokerResolver::new(Arc::new(registry), classes);

        assert!(matches!(
            resolver.method_invokers(bad, "join", &[ValueKind::Str], ResultStyle::Simplest),
            Err(ResolveError::MalformedVarargs { .. })
        ));
        assert!(matches!(
            resolver.constructor_invokers(bad, &[], ResultStyle::Object),
            Err(ResolveError::MalformedVarargs { .. })
        ));
    }

    #[test]
    fn field_getter_resolves_and_unknown_field_errors() {
        let fx = fixture();
        let getter = fx
            .resolver
            .field_getter(fx.calc, "limit", ResultStyle::Simplest)
            .unwrap();
        assert_eq!(getter.name(), "Calc.limit");
        assert_eq!(getter.host_result(), ValueKind::Num);

        assert!(matches!(
            fx.resolver.field_getter(fx.calc, "nope", ResultStyle::Simplest),
            Err(ResolveError::UnknownField { .. })
        ));
    }
}
