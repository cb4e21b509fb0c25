//! Shared catalog fixture for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indexmap::IndexMap;
use interpose_core::{OperationDef, PropertyDef, StructDef, TypeDef, TypeId, ValueType};
use interpose_engine::{
    CallError, ClassBuilder, Interceptor, InvocationContext, Proceed, TypeCatalog, Value,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// Base state of `Hello`; counts how often its body ran.
#[derive(Default)]
pub struct HelloState {
    pub calls: AtomicUsize,
}

pub struct ClockState {
    pub now: i64,
}

#[derive(Default)]
pub struct PersonState {
    pub name: Mutex<String>,
}

/// Returns `"Hello, " + args[0]` without running the original.
pub struct Echo;

impl Interceptor for Echo {
    fn invoke(&self, ctx: &InvocationContext<'_>) -> Result<Value, CallError> {
        let name = ctx.arg(0).and_then(Value::as_str).unwrap_or_default();
        Ok(Value::from(format!("Hello, {}", name)))
    }
}

/// Calls `next()` three times and returns the last result.
pub struct Repeat;

impl Interceptor for Repeat {
    fn invoke(&self, ctx: &InvocationContext<'_>) -> Result<Value, CallError> {
        ctx.next()?;
        ctx.next()?;
        ctx.next()
    }
}

/// Returns a string no matter what the operation declares.
pub struct Mistyped;

impl Interceptor for Mistyped {
    fn invoke(&self, _ctx: &InvocationContext<'_>) -> Result<Value, CallError> {
        Ok(Value::from("not a number"))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("audit backend unavailable")]
pub struct AuditError;

/// Fails every call with its own error type.
pub struct Failing;

impl Interceptor for Failing {
    fn invoke(&self, _ctx: &InvocationContext<'_>) -> Result<Value, CallError> {
        Err(CallError::raised(AuditError))
    }
}

/// Returns a `Point` whose `y` is not a number.
pub struct BadPoint;

impl Interceptor for BadPoint {
    fn invoke(&self, _ctx: &InvocationContext<'_>) -> Result<Value, CallError> {
        Ok(Value::Struct {
            name: "Point".into(),
            fields: vec![Value::I64(1), Value::from("north")],
        })
    }
}

/// `struct Point { x: I64, y: I64 }`
pub fn point_type() -> ValueType {
    ValueType::Struct(StructDef {
        name: "Point".into(),
        fields: IndexMap::from([
            ("x".to_string(), ValueType::I64),
            ("y".to_string(), ValueType::I64),
        ]),
    })
}

/// Starts the deferred invocation from several threads at once.
pub struct FanOut;

impl Interceptor for FanOut {
    fn invoke(&self, ctx: &InvocationContext<'_>) -> Result<Value, CallError> {
        let results: Vec<Result<Value, CallError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8).map(|_| scope.spawn(|| ctx.next())).collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|_| Err(CallError::fault("panicked"))))
                .collect()
        });
        let first = results[0].clone()?;
        for result in &results {
            assert_eq!(result.as_ref().ok(), Some(&first));
        }
        Ok(first)
    }
}

pub struct Fixture {
    pub catalog: Arc<TypeCatalog>,
    /// `interface Greeter { greet(name: String) -> String }`
    pub greeter: TypeId,
    /// `class Hello : Greeter`, greet returns `"Hi " + name`.
    pub hello: TypeId,
    /// `class Slow : Greeter`, greet counts and sleeps before answering.
    pub slow: TypeId,
    /// `interface Counter { count() -> I32; total() -> I64; reset() }`
    pub counter: TypeId,
    /// `abstract class Account { balance() -> I64; abstract owner() -> String }`
    pub account: TypeId,
    /// `interface TimeSource { now() -> I64 }`
    pub time_source: TypeId,
    /// `sealed class Clock : TimeSource`, with a default and a seeded constructor.
    pub clock: TypeId,
    /// `class Person { Name: String }`
    pub person: TypeId,
    /// `class Flaky { load() -> String }`, whose body always fails.
    pub flaky: TypeId,
    /// `interface Locator { locate() -> Point; move_to(target: Point) }`
    pub locator: TypeId,
    pub echo: TypeId,
    pub proceed: TypeId,
    pub repeat: TypeId,
    pub mistyped: TypeId,
    pub failing: TypeId,
    pub fan_out: TypeId,
    pub bad_point: TypeId,
}

fn greet_op() -> OperationDef {
    OperationDef::new(
        "greet",
        vec![("name".into(), ValueType::String)],
        ValueType::String,
    )
}

pub fn fixture() -> Fixture {
    let mut catalog = TypeCatalog::new();

    let greeter = catalog
        .define(TypeDef::interface("Greeter").operation(greet_op()))
        .unwrap();
    let hello = catalog
        .define_class(
            ClassBuilder::new(TypeDef::class("Hello").implements(greeter).operation(greet_op()))
                .body("greet", |this, args| {
                    this.state::<HelloState>()?.calls.fetch_add(1, Ordering::SeqCst);
                    let name = args[0].as_str().unwrap_or_default();
                    Ok(Value::from(format!("Hi {}", name)))
                })
                .default_state(HelloState::default),
        )
        .unwrap();
    let slow = catalog
        .define_class(
            ClassBuilder::new(TypeDef::class("Slow").implements(greeter).operation(greet_op()))
                .body("greet", |this, args| {
                    this.state::<HelloState>()?.calls.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    let name = args[0].as_str().unwrap_or_default();
                    Ok(Value::from(format!("Slowly, {}", name)))
                })
                .default_state(HelloState::default),
        )
        .unwrap();

    let counter = catalog
        .define(
            TypeDef::interface("Counter")
                .operation(OperationDef::new("count", vec![], ValueType::I32))
                .operation(OperationDef::new("total", vec![], ValueType::I64))
                .operation(OperationDef::new("reset", vec![], ValueType::Unit)),
        )
        .unwrap();

    let account = catalog
        .define_class(
            ClassBuilder::new(
                TypeDef::abstract_class("Account")
                    .operation(OperationDef::new("balance", vec![], ValueType::I64))
                    .operation(OperationDef::new("owner", vec![], ValueType::String).into_abstract()),
            )
            .body("balance", |_, _| Ok(Value::I64(100))),
        )
        .unwrap();

    let time_source = catalog
        .define(
            TypeDef::interface("TimeSource")
                .operation(OperationDef::new("now", vec![], ValueType::I64)),
        )
        .unwrap();
    let clock = catalog
        .define_class(
            ClassBuilder::new(
                TypeDef::sealed_class("Clock")
                    .implements(time_source)
                    .operation(OperationDef::new("now", vec![], ValueType::I64)),
            )
            .body("now", |this, _| Ok(Value::I64(this.state::<ClockState>()?.now)))
            .default_state(|| ClockState { now: 1 })
            .constructor(vec![("now".into(), ValueType::I64)], |args| {
                Ok(ClockState {
                    now: args[0].as_i64().unwrap_or_default(),
                })
            }),
        )
        .unwrap();

    let person = catalog
        .define_class(
            ClassBuilder::new(
                TypeDef::class("Person").property(PropertyDef::new("Name", ValueType::String)),
            )
            .body("get_Name", |this, _| {
                let state = this.state::<PersonState>()?;
                let name = state.name.lock().map_err(|_| CallError::fault("poisoned"))?;
                Ok(Value::from(name.clone()))
            })
            .body("set_Name", |this, args| {
                let state = this.state::<PersonState>()?;
                let mut name = state.name.lock().map_err(|_| CallError::fault("poisoned"))?;
                *name = args[0].as_str().unwrap_or_default().to_string();
                Ok(Value::Unit)
            })
            .default_state(PersonState::default),
        )
        .unwrap();

    let flaky = catalog
        .define_class(
            ClassBuilder::new(
                TypeDef::class("Flaky").operation(OperationDef::new("load", vec![], ValueType::String)),
            )
            .body("load", |_, _| Err(CallError::fault("database is down"))),
        )
        .unwrap();

    let locator = catalog
        .define(
            TypeDef::interface("Locator")
                .operation(OperationDef::new("locate", vec![], point_type()))
                .operation(OperationDef::new(
                    "move_to",
                    vec![("target".into(), point_type())],
                    ValueType::Unit,
                )),
        )
        .unwrap();

    let echo = catalog.define_interceptor("Echo", || Echo).unwrap();
    let proceed = catalog.define_interceptor("Proceed", || Proceed).unwrap();
    let repeat = catalog.define_interceptor("Repeat", || Repeat).unwrap();
    let mistyped = catalog.define_interceptor("Mistyped", || Mistyped).unwrap();
    let failing = catalog.define_interceptor("Failing", || Failing).unwrap();
    let fan_out = catalog.define_interceptor("FanOut", || FanOut).unwrap();
    let bad_point = catalog.define_interceptor("BadPoint", || BadPoint).unwrap();

    Fixture {
        catalog: Arc::new(catalog),
        greeter,
        hello,
        slow,
        counter,
        account,
        time_source,
        clock,
        person,
        flaky,
        locator,
        echo,
        proceed,
        repeat,
        mistyped,
        failing,
        fan_out,
        bad_point,
    }
}

/// Number of times the original body of a `Hello` or `Slow` proxy ran.
pub fn base_calls(proxy: &interpose_engine::ProxyObject) -> usize {
    proxy
        .base_instance()
        .and_then(|base| base.downcast_ref::<HelloState>())
        .map(|state| state.calls.load(Ordering::SeqCst))
        .unwrap_or(0)
}
