//! Handler function types.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::context::{Callback, Context};

pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A loaded entry point.
///
/// Handlers report their result through the [`Context`] or [`Callback`]
/// they receive, not through the returned future. They may keep either
/// handle alive past the future's completion to settle later.
pub type Handler = Arc<dyn Fn(Value, Context, Callback) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure as a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Value, Context, Callback) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |event, context, callback| Box::pin(f(event, context, callback)))
}

/// Wrap a synchronous closure as a [`Handler`].
pub fn sync_handler_fn<F>(f: F) -> Handler
where
    F: Fn(Value, Context, Callback) + Send + Sync + 'static,
{
    Arc::new(move |event, context, callback| {
        f(event, context, callback);
        Box::pin(async {})
    })
}
