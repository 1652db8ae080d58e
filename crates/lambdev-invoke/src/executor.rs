//! Invocation executor.
//!
//! Loads the entry point at call time, runs it on its own task with a fresh
//! [`Context`] / [`Callback`] pair, and waits for the first completion
//! signal. Load errors and panics settle as failures; nothing escapes to
//! the caller as a fault.

use std::any::Any;
use std::sync::Arc;

use lambdev_core::{EnvMap, FunctionDescriptor};
use serde_json::Value;
use tracing::{debug, warn};

use crate::completion::{Completion, Outcome};
use crate::context::{Callback, Context};
use crate::error::HandlerError;
use crate::loader::EntryPointLoader;

pub struct Executor {
    loader: Arc<dyn EntryPointLoader>,
}

impl Executor {
    pub fn new(loader: Arc<dyn EntryPointLoader>) -> Self {
        Self { loader }
    }

    /// Invoke `function` with `event` under the given effective environment.
    ///
    /// Resolves once the handler signals on any channel. There is no
    /// timeout: a handler that holds on to its context without signaling
    /// keeps this future pending.
    pub async fn invoke(&self, function: &FunctionDescriptor, event: Value, env: EnvMap) -> Outcome {
        let handler = match self.loader.load(&function.entry_point) {
            Ok(handler) => handler,
            Err(e) => {
                warn!(function = %function.name, error = %e, "failed to load handler");
                return Outcome::Failure(e.into());
            }
        };

        let (completion, settled) = Completion::new();
        let context = Context::new(completion.clone(), &function.name, env);
        let callback = Callback::new(completion.clone());
        debug!(
            function = %function.name,
            request_id = context.aws_request_id(),
            "invoking handler"
        );

        // The handler is called inside the task so a panic in its synchronous
        // part is caught the same way as one in its future.
        let task = tokio::spawn(async move { handler(event, context, callback).await });
        tokio::spawn(async move {
            if let Err(e) = task.await {
                let message = if e.is_panic() {
                    format!("handler panicked: {}", panic_message(e.into_panic()))
                } else {
                    "handler task was cancelled".to_string()
                };
                completion.settle(Outcome::Failure(HandlerError::new(message)));
            }
        });

        settled.await.unwrap_or_else(|_| {
            Outcome::Failure(HandlerError::new(
                "handler finished without signaling completion",
            ))
        })
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    use lambdev_core::EntryPoint;
    use serde_json::json;

    use crate::handler::{handler_fn, sync_handler_fn};
    use crate::loader::HandlerRegistry;

    fn function(handler: &str) -> FunctionDescriptor {
        FunctionDescriptor {
            name: "TestFunction".into(),
            entry_point: EntryPoint::parse("TestFunction", handler, Path::new("/srv")).unwrap(),
            environment: EnvMap::new(),
            events: vec![],
        }
    }

    fn executor(registry: &HandlerRegistry) -> Executor {
        Executor::new(Arc::new(registry.clone()))
    }

    #[tokio::test]
    async fn succeed_channel() {
        let registry = HandlerRegistry::new().with(
            "h.ok",
            sync_handler_fn(|event, context, _| {
                context.succeed(event);
            }),
        );
        let outcome = executor(&registry)
            .invoke(&function("h.ok"), json!({ "x": 1 }), EnvMap::new())
            .await;
        assert_eq!(outcome, Outcome::Success(json!({ "x": 1 })));
    }

    #[tokio::test]
    async fn fail_channel() {
        let registry = HandlerRegistry::new().with(
            "h.fail",
            sync_handler_fn(|_, context, _| {
                context.fail("Some reason");
            }),
        );
        let outcome = executor(&registry)
            .invoke(&function("h.fail"), Value::Null, EnvMap::new())
            .await;
        assert_eq!(outcome, Outcome::Failure("Some reason".into()));
    }

    #[tokio::test]
    async fn callback_channel() {
        let registry = HandlerRegistry::new().with(
            "h.cb",
            sync_handler_fn(|_, _, callback| {
                callback.call(None, json!("via callback"));
            }),
        );
        let outcome = executor(&registry)
            .invoke(&function("h.cb"), Value::Null, EnvMap::new())
            .await;
        assert_eq!(outcome, Outcome::Success(json!("via callback")));
    }

    #[tokio::test]
    async fn first_channel_wins_in_either_order() {
        let registry = HandlerRegistry::new()
            .with(
                "h.succeed_first",
                sync_handler_fn(|_, context, callback| {
                    context.succeed(json!("first"));
                    context.fail("second");
                    callback.call(Some("third".into()), Value::Null);
                }),
            )
            .with(
                "h.fail_first",
                sync_handler_fn(|_, context, callback| {
                    callback.call(Some("first".into()), Value::Null);
                    context.succeed(json!("second"));
                }),
            );
        let exec = executor(&registry);

        let outcome = exec
            .invoke(&function("h.succeed_first"), Value::Null, EnvMap::new())
            .await;
        assert_eq!(outcome, Outcome::Success(json!("first")));

        let outcome = exec
            .invoke(&function("h.fail_first"), Value::Null, EnvMap::new())
            .await;
        assert_eq!(outcome, Outcome::Failure("first".into()));
    }

    #[tokio::test]
    async fn async_settlement_from_spawned_task() {
        let registry = HandlerRegistry::new().with(
            "h.later",
            sync_handler_fn(|_, context, _| {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    context.succeed(json!("later"));
                });
            }),
        );
        let outcome = executor(&registry)
            .invoke(&function("h.later"), Value::Null, EnvMap::new())
            .await;
        assert_eq!(outcome, Outcome::Success(json!("later")));
    }

    #[tokio::test]
    async fn async_handler_future() {
        let registry = HandlerRegistry::new().with(
            "h.async",
            handler_fn(|event, context, _| async move {
                tokio::task::yield_now().await;
                context.succeed(json!({ "echo": event }));
            }),
        );
        let outcome = executor(&registry)
            .invoke(&function("h.async"), json!(7), EnvMap::new())
            .await;
        assert_eq!(outcome, Outcome::Success(json!({ "echo": 7 })));
    }

    #[tokio::test]
    async fn missing_handler_is_failure() {
        let registry = HandlerRegistry::new();
        let outcome = executor(&registry)
            .invoke(&function("h.missing"), Value::Null, EnvMap::new())
            .await;
        assert_eq!(
            outcome,
            Outcome::Failure("no handler registered for h.missing".into())
        );
    }

    #[tokio::test]
    async fn panic_is_failure() {
        let registry = HandlerRegistry::new().with(
            "h.panic",
            sync_handler_fn(|_, _, _| panic!("kaboom")),
        );
        let outcome = executor(&registry)
            .invoke(&function("h.panic"), Value::Null, EnvMap::new())
            .await;
        assert_eq!(outcome, Outcome::Failure("handler panicked: kaboom".into()));
    }

    #[tokio::test]
    async fn panic_after_settlement_keeps_outcome() {
        let registry = HandlerRegistry::new().with(
            "h.late_panic",
            sync_handler_fn(|_, context, _| {
                context.succeed(json!("done"));
                panic!("after the fact");
            }),
        );
        let outcome = executor(&registry)
            .invoke(&function("h.late_panic"), Value::Null, EnvMap::new())
            .await;
        assert_eq!(outcome, Outcome::Success(json!("done")));
    }

    #[tokio::test]
    async fn dropped_without_signal_is_failure() {
        let registry = HandlerRegistry::new().with("h.silent", sync_handler_fn(|_, _, _| {}));
        let outcome = executor(&registry)
            .invoke(&function("h.silent"), Value::Null, EnvMap::new())
            .await;
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn environment_is_passed_explicitly() {
        let registry = HandlerRegistry::new().with(
            "h.env",
            sync_handler_fn(|_, context, _| {
                context.succeed(json!(context.var("STAGE")));
            }),
        );
        let exec = executor(&registry);

        let mut dev = EnvMap::new();
        dev.insert("STAGE".into(), "dev".into());
        let mut prod = EnvMap::new();
        prod.insert("STAGE".into(), "prod".into());

        let func = function("h.env");
        let (a, b) = tokio::join!(
            exec.invoke(&func, Value::Null, dev),
            exec.invoke(&func, Value::Null, prod),
        );
        assert_eq!(a, Outcome::Success(json!("dev")));
        assert_eq!(b, Outcome::Success(json!("prod")));
    }

    #[tokio::test]
    async fn handler_is_resolved_per_invocation() {
        let registry = HandlerRegistry::new().with(
            "h.swap",
            sync_handler_fn(|_, context, _| {
                context.succeed(json!(1));
            }),
        );
        let exec = executor(&registry);
        let func = function("h.swap");
        assert_eq!(
            exec.invoke(&func, Value::Null, EnvMap::new()).await,
            Outcome::Success(json!(1))
        );

        registry.register(
            "h.swap",
            sync_handler_fn(|_, context, _| {
                context.succeed(json!(2));
            }),
        );
        assert_eq!(
            exec.invoke(&func, Value::Null, EnvMap::new()).await,
            Outcome::Success(json!(2))
        );
    }
}
