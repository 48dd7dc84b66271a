//! Dispatch boundary
//!
//! The single entry point the host transport calls with an export number and
//! raw host values. Dispatch is a total function: every failure inside the
//! engine — unknown export, stale handle, conversion failure, body panic
//! message — is downgraded to the host's error value, never propagated as a
//! Rust error or a panic across the boundary.

use std::sync::Arc;

use gridcall_sdk::{ClassId, ClassTable, Heap, NativeValue, ObjectRef, Value};

use crate::export::definition::ExportInvoker;
use crate::export::registry::FunctionRegistry;
use crate::invoke::invoker::InvocationError;

/// Routes host calls to resolved invokers and downgrades every failure.
pub struct Dispatcher {
    registry: Arc<FunctionRegistry>,
    heap: Arc<Heap>,
    classes: Arc<ClassTable>,
}

impl Dispatcher {
    /// Create a dispatcher over a resolved registry.
    pub fn new(registry: Arc<FunctionRegistry>, heap: Arc<Heap>, classes: Arc<ClassTable>) -> Self {
        Dispatcher {
            registry,
            heap,
            classes,
        }
    }

    /// Execute the export identified by `export_number` with the given host
    /// arguments. Never fails: any engine-side error comes back as the
    /// host's error value.
    pub fn dispatch(&self, export_number: u32, args: &[Value]) -> Value {
        let Some(def) = self.registry.find_by_export(export_number) else {
            return Value::error();
        };
        let result = match def.invoker() {
            ExportInvoker::Constructor(ctor) => ctor.new_instance(args),
            ExportInvoker::Method(method) => {
                if method.is_static() {
                    method.invoke(None, args)
                } else {
                    self.resolve_target(method.name(), method.declaring_class(), args)
                        .and_then(|target| method.invoke(Some(&target), &args[1..]))
                }
            }
            ExportInvoker::Field(field) => {
                if field.is_static() {
                    field.get(None)
                } else {
                    self.resolve_target(field.name(), field.declaring_class(), args)
                        .and_then(|target| field.get(Some(&target)))
                }
            }
        };
        match result {
            Ok(value) => value,
            Err(err) => downgrade(err),
        }
    }

    /// The first argument of an instance call is the target handle; pull the
    /// live object out of the heap and check it belongs to the declaring
    /// class.
    fn resolve_target(
        &self,
        name: &str,
        class: ClassId,
        args: &[Value],
    ) -> Result<ObjectRef, InvocationError> {
        let Some(Value::Object(host)) = args.first() else {
            return Err(InvocationError::MissingTarget {
                name: name.to_string(),
            });
        };
        let value = self
            .heap
            .get(host.handle)
            .ok_or_else(|| InvocationError::BadHandle(host.handle.to_bits()))?;
        let NativeValue::Object(target) = value else {
            return Err(InvocationError::WrongTarget {
                name: name.to_string(),
            });
        };
        if !self.classes.is_subclass(target.class(), class) {
            return Err(InvocationError::WrongTarget {
                name: name.to_string(),
            });
        }
        Ok(target)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

/// Downgrade one invocation failure to the host's error value.
///
/// The match is deliberately exhaustive, with no wildcard arm: adding a new
/// failure variant must force a decision here about how the host sees it.
fn downgrade(err: InvocationError) -> Value {
    match err {
        InvocationError::ArityMismatch { .. } => Value::error(),
        InvocationError::MissingTarget { .. } => Value::error(),
        InvocationError::WrongTarget { .. } => Value::error(),
        InvocationError::BadHandle(_) => Value::error(),
        InvocationError::ArgumentConversion { .. } => Value::error(),
        InvocationError::ResultConversion { .. } => Value::error(),
        InvocationError::TargetFailed { .. } => Value::error(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::registry::{
        CachingConverterRegistry, ConverterContext, ConverterRegistry,
    };
    use crate::invoke::resolver::InvokerResolver;
    use gridcall_sdk::{
        arg_i32, target_object, ClassBuilder, ClassTable, Constructor, Field, HostError, Method,
        NativeType, ObjectRef, ValueKind,
    };

    struct Fixture {
        dispatcher: Dispatcher,
        heap: Arc<Heap>,
    }

    fn fixture() -> Fixture {
        let mut classes = ClassTable::new();
        let counter = classes.reserve("Counter");
        classes
            .define(
                counter,
                ClassBuilder::new()
                    .constructor(Constructor::new(vec![NativeType::I32], move |args| {
                        Ok(NativeValue::Object(ObjectRef::new(
                            counter,
                            arg_i32(args, 0)?,
                        )))
                    }))
                    .method(Method::new(
                        "plus",
                        vec![NativeType::I32],
                        NativeType::I32,
                        |target, args| {
                            let base: &i32 = target_object(target)?;
                            Ok(NativeValue::I32(base + arg_i32(args, 0)?))
                        },
                    ))
                    .method(
                        Method::new("zero", vec![], NativeType::I32, |_, _| {
                            Ok(NativeValue::I32(0))
                        })
                        .static_(),
                    )
                    .field(
                        Field::new("MAX", NativeType::I32, |_| Ok(NativeValue::I32(i32::MAX)))
                            .static_(),
                    ),
            )
            .unwrap();
        let classes = Arc::new(classes);
        let heap = Arc::new(Heap::new());
        let ctx = ConverterContext {
            heap: Arc::clone(&heap),
            classes: Arc::clone(&classes),
        };
        let converters = CachingConverterRegistry::new(
            ConverterRegistry::with_builtins(&ctx).unwrap(),
        );
        let resolver = InvokerResolver::new(Arc::new(converters), Arc::clone(&classes));
        let mut registry = FunctionRegistry::new(resolver);
        registry.add_class(counter).unwrap();
        registry.resolve().unwrap();
        Fixture {
            dispatcher: Dispatcher::new(Arc::new(registry), Arc::clone(&heap), classes),
            heap,
        }
    }

    fn export_of(fx: &Fixture, name: &str) -> u32 {
        fx.dispatcher
            .registry
            .find_by_name(name)
            .unwrap()
            .export_number()
    }

    #[test]
    fn unknown_export_is_an_error_value() {
        let fx = fixture();
        assert_eq!(fx.dispatcher.dispatch(999, &[]), Value::error());
    }

    #[test]
    fn construct_then_call_instance_method() {
        let fx = fixture();
        let ctor = export_of(&fx, "Counter");
        let plus = export_of(&fx, "Counter.plus");

        let instance = fx.dispatcher.dispatch(ctor, &[Value::Num(40.0)]);
        let Value::Object(host) = &instance else {
            panic!("constructor must return an object, got {instance:?}");
        };
        assert_eq!(host.type_name, "Counter");

        let result = fx
            .dispatcher
            .dispatch(plus, &[instance.clone(), Value::Num(2.0)]);
        assert_eq!(result, Value::Int(42));
    }

    #[test]
    fn static_method_ignores_target_slot() {
        let fx = fixture();
        let zero = export_of(&fx, "Counter.zero");
        assert_eq!(fx.dispatcher.dispatch(zero, &[]), Value::Int(0));
    }

    #[test]
    fn static_field_reads_without_target() {
        let fx = fixture();
        let max = export_of(&fx, "Counter.MAX");
        assert_eq!(fx.dispatcher.dispatch(max, &[]), Value::Int(i32::MAX));
    }

    #[test]
    fn released_handle_downgrades_to_error_value() {
        let fx = fixture();
        let ctor = export_of(&fx, "Counter");
        let plus = export_of(&fx, "Counter.plus");

        let instance = fx.dispatcher.dispatch(ctor, &[Value::Num(1.0)]);
        let Value::Object(host) = &instance else {
            panic!("expected object");
        };
        assert!(fx.heap.release(host.handle));

        let result = fx
            .dispatcher
            .dispatch(plus, &[instance.clone(), Value::Num(1.0)]);
        assert_eq!(result, Value::error());
        assert_eq!(result.kind(), ValueKind::Err);
    }

    #[test]
    fn wrong_arity_and_bad_argument_downgrade() {
        let fx = fixture();
        let zero = export_of(&fx, "Counter.zero");
        assert_eq!(
            fx.dispatcher.dispatch(zero, &[Value::Num(1.0)]),
            Value::error()
        );

        let ctor = export_of(&fx, "Counter");
        assert_eq!(
            fx.dispatcher
                .dispatch(ctor, &[Value::Str("nope".to_string())]),
            Value::error()
        );
    }

    #[test]
    fn error_value_carries_the_null_code() {
        assert_eq!(Value::error(), Value::Err(HostError::Null));
    }
}
