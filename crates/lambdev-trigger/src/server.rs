//! Development server.
//!
//! `DevServer` binds every endpoint onto one axum router and dispatches each
//! request to the executor: build the event, resolve the environment,
//! invoke, render the outcome.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use axum::Router;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{MethodFilter, MethodRouter, any, on};
use lambdev_core::{EnvironmentResolver, FunctionDescriptor};
use lambdev_invoke::{Executor, Outcome};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::assets::{STATIC_MOUNT, static_router};
use crate::convert::{InboundRequest, status_only};
use crate::endpoint::{Endpoint, RouteMethod};
use crate::factory::{BoundFunction, bind_functions};

pub struct DevServer {
    functions: Vec<BoundFunction>,
    executor: Arc<Executor>,
    env: Arc<EnvironmentResolver>,
    static_folder: Option<PathBuf>,
}

/// Everything one route needs to serve a request.
#[derive(Clone)]
struct Dispatch {
    function: Arc<FunctionDescriptor>,
    endpoint: Arc<Endpoint>,
    executor: Arc<Executor>,
    env: Arc<EnvironmentResolver>,
}

impl DevServer {
    pub fn new(
        functions: Vec<FunctionDescriptor>,
        executor: Arc<Executor>,
        env: Arc<EnvironmentResolver>,
    ) -> Self {
        Self {
            functions: bind_functions(functions),
            executor,
            env,
            static_folder: None,
        }
    }

    pub fn with_static_folder(mut self, folder: Option<PathBuf>) -> Self {
        self.static_folder = folder;
        self
    }

    /// Functions with at least one bound endpoint, in declaration order.
    pub fn functions(&self) -> &[BoundFunction] {
        &self.functions
    }

    pub fn has_endpoints(&self) -> bool {
        !self.functions.is_empty()
    }

    /// Build the router: every endpoint (with its trailing-slash variant)
    /// plus the static folder when one is configured.
    pub fn router(&self) -> Router {
        let mut router = Router::new();
        for bound in &self.functions {
            for endpoint in &bound.endpoints {
                let dispatch = Dispatch {
                    function: bound.function.clone(),
                    endpoint: Arc::new(endpoint.clone()),
                    executor: self.executor.clone(),
                    env: self.env.clone(),
                };
                let Some(method_router) = method_router(&endpoint.method(), dispatch) else {
                    warn!(%endpoint, "method cannot be routed");
                    continue;
                };
                for path in endpoint.route_paths() {
                    router = router.route(&path, method_router.clone());
                }
            }
        }
        if let Some(folder) = &self.static_folder {
            router = router.merge(static_router(folder.clone()));
        }
        router
    }

    /// Serve until `shutdown` flips to `true`.
    ///
    /// With no bound endpoints nothing is bound: a single line is logged and
    /// this returns immediately.
    pub async fn serve(self, addr: SocketAddr, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        if !self.has_endpoints() {
            info!("No Lambdas with Alexa-Skill or HTTP events found");
            return Ok(());
        }

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let port = listener
            .local_addr()
            .context("failed to read listener address")?
            .port();

        self.log_routes(port);
        info!(%addr, "Listening on port {port} for requests 🚀");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
                info!("dev server shutting down");
            })
            .await
            .context("dev server failed")?;
        Ok(())
    }

    fn log_routes(&self, port: u16) {
        for bound in &self.functions {
            for endpoint in &bound.endpoints {
                info!(
                    function = %bound.function.name,
                    "{} http://localhost:{port}{}",
                    endpoint.method(),
                    endpoint.path()
                );
            }
        }
        if let Some(folder) = &self.static_folder {
            info!(
                folder = %folder.display(),
                "Serving static files at http://localhost:{port}{STATIC_MOUNT}/"
            );
        }
    }
}

fn method_router(method: &RouteMethod, dispatch: Dispatch) -> Option<MethodRouter> {
    let handler = move |request: Request| {
        let dispatch = dispatch.clone();
        async move { dispatch.handle(request).await }
    };
    match method {
        RouteMethod::Any => Some(any(handler)),
        RouteMethod::Only(method) => {
            let filter = MethodFilter::try_from(method.clone()).ok()?;
            Some(on(filter, handler))
        }
    }
}

impl Dispatch {
    async fn handle(&self, request: Request) -> Response {
        let inbound = match InboundRequest::from_request(request).await {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "rejecting request");
                return status_only(StatusCode::BAD_REQUEST);
            }
        };

        info!("{}", self.endpoint);
        let event = self.endpoint.build_event(&inbound);
        let env = self.env.resolve(&self.function.environment);

        match self.executor.invoke(&self.function, event, env).await {
            Outcome::Success(value) => {
                info!("{} ➡ Success", self.endpoint);
                debug!(function = %self.function.name, result = %value, "handler result");
                self.endpoint.render_success(value)
            }
            Outcome::Failure(error) => {
                info!("{} ➡ Failure: {}", self.endpoint, error);
                debug!(function = %self.function.name, detail = ?error.detail, "handler error");
                self.endpoint.render_failure(&error)
            }
        }
    }
}
