//! Handler-facing completion channels.
//!
//! [`Context`] carries the `succeed` / `fail` pair plus invocation metadata
//! and the effective environment. [`Callback`] is the node-style
//! `callback(error, result)` convention. Both write into the same
//! [`Completion`].

use std::sync::Arc;

use lambdev_core::EnvMap;
use serde_json::Value;

use crate::completion::{Completion, Outcome};
use crate::error::HandlerError;

/// Invocation context handed to a handler.
#[derive(Clone)]
pub struct Context {
    completion: Completion,
    function_name: Arc<str>,
    request_id: Arc<str>,
    env: Arc<EnvMap>,
}

impl Context {
    pub fn new(completion: Completion, function_name: &str, env: EnvMap) -> Self {
        Self {
            completion,
            function_name: Arc::from(function_name),
            request_id: Arc::from(uuid::Uuid::new_v4().to_string()),
            env: Arc::new(env),
        }
    }

    /// Settle the invocation successfully. Returns `false` if already settled.
    pub fn succeed(&self, value: Value) -> bool {
        self.completion.settle(Outcome::Success(value))
    }

    /// Settle the invocation as failed. Returns `false` if already settled.
    pub fn fail(&self, error: impl Into<HandlerError>) -> bool {
        self.completion.settle(Outcome::Failure(error.into()))
    }

    pub fn is_settled(&self) -> bool {
        self.completion.is_settled()
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn aws_request_id(&self) -> &str {
        &self.request_id
    }

    /// The effective environment of this invocation.
    pub fn env(&self) -> &EnvMap {
        &self.env
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }
}

/// Node-style `callback(error, result)`.
#[derive(Clone)]
pub struct Callback {
    completion: Completion,
}

impl Callback {
    pub fn new(completion: Completion) -> Self {
        Self { completion }
    }

    /// `Some(error)` settles as failure, `None` settles with `result`.
    pub fn call(&self, error: Option<HandlerError>, result: Value) -> bool {
        match error {
            Some(err) => self.completion.settle(Outcome::Failure(err)),
            None => self.completion.settle(Outcome::Success(result)),
        }
    }

    /// Same as [`Callback::call`] with an untyped error: falsy values
    /// (`null`, `false`, `0`, `""`) count as "no error".
    pub fn call_value(&self, error: Value, result: Value) -> bool {
        let error = match error {
            Value::Null | Value::Bool(false) => None,
            Value::Number(ref n) if n.as_f64() == Some(0.0) => None,
            Value::String(ref s) if s.is_empty() => None,
            other => Some(HandlerError::from_value(other)),
        };
        self.call(error, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn channels() -> (Context, Callback, tokio::sync::oneshot::Receiver<Outcome>) {
        let (completion, rx) = Completion::new();
        let mut env = EnvMap::new();
        env.insert("STAGE".into(), "dev".into());
        let context = Context::new(completion.clone(), "MyFunction", env);
        (context, Callback::new(completion), rx)
    }

    #[tokio::test]
    async fn succeed_then_fail() {
        let (context, _callback, rx) = channels();
        assert!(context.succeed(json!("done")));
        assert!(!context.fail("too late"));
        assert_eq!(rx.await.unwrap(), Outcome::Success(json!("done")));
    }

    #[tokio::test]
    async fn fail_then_succeed() {
        let (context, _callback, rx) = channels();
        assert!(context.fail("Some reason"));
        assert!(!context.succeed(json!("too late")));
        assert_eq!(rx.await.unwrap(), Outcome::Failure("Some reason".into()));
    }

    #[tokio::test]
    async fn callback_then_context() {
        let (context, callback, rx) = channels();
        assert!(callback.call(None, json!({ "ok": true })));
        assert!(!context.fail("ignored"));
        assert_eq!(rx.await.unwrap(), Outcome::Success(json!({ "ok": true })));
    }

    #[tokio::test]
    async fn callback_error_settles_failure() {
        let (_context, callback, rx) = channels();
        assert!(callback.call(Some("bad".into()), json!("ignored")));
        assert_eq!(rx.await.unwrap(), Outcome::Failure("bad".into()));
    }

    #[tokio::test]
    async fn callback_value_treats_empty_errors_as_success() {
        for empty in [Value::Null, json!(false), json!(""), json!(0), json!(0.0)] {
            let (_context, callback, rx) = channels();
            callback.call_value(empty, json!(1));
            assert_eq!(rx.await.unwrap(), Outcome::Success(json!(1)));
        }
    }

    #[tokio::test]
    async fn callback_value_non_empty_error_fails() {
        let (_context, callback, rx) = channels();
        callback.call_value(json!({ "message": "nope" }), json!(1));
        assert_eq!(rx.await.unwrap().into_result().unwrap_err().message, "nope");
    }

    #[tokio::test]
    async fn callback_value_non_zero_number_is_an_error() {
        let (_context, callback, rx) = channels();
        callback.call_value(json!(2), json!(1));
        assert!(!rx.await.unwrap().is_success());
    }

    #[test]
    fn context_exposes_env_and_metadata() {
        let (context, _callback, _rx) = channels();
        assert_eq!(context.function_name(), "MyFunction");
        assert_eq!(context.var("STAGE"), Some("dev"));
        assert_eq!(context.var("MISSING"), None);
        assert_eq!(context.aws_request_id().len(), 36);
    }
}
