//! lambdev-trigger — serves function triggers over HTTP.
//!
//! Every recognized trigger of every function becomes an [`Endpoint`] bound
//! on one axum router. A request is turned into an invocation event, run
//! through the [`Executor`](lambdev_invoke::Executor) and its outcome is
//! rendered back as the response.
//!
//! # Architecture
//!
//! ```text
//! HTTP client
//!   │
//!   ▼
//! axum router  (POST /alexa-skill/<fn>, <METHOD> /http/<path>, GET /static/*)
//!   │
//!   ├── InboundRequest::from_request (body, query, headers)
//!   ├── Endpoint::build_event
//!   ├── EnvironmentResolver::resolve (per request)
//!   ├── Executor::invoke ──► Outcome
//!   ├── Endpoint::render_success / render_failure
//!   │
//!   ▼
//! HTTP response
//! ```

pub mod assets;
pub mod convert;
pub mod endpoint;
pub mod error;
pub mod factory;
pub mod server;

pub use endpoint::{Endpoint, RouteMethod};
pub use error::EndpointError;
pub use factory::{BoundFunction, bind_functions, endpoints_for};
pub use server::DevServer;
