//! lambdev-invoke — runs function entry points under the completion contract.
//!
//! # Architecture
//!
//! ```text
//! Executor::invoke(function, event, env)
//!   │
//!   ├── EntryPointLoader::load (every call: registry or executable)
//!   ├── spawn handler(event, Context, Callback)
//!   │      succeed / fail / callback ──► Completion (first signal wins)
//!   │
//!   ▼
//! Outcome::Success(value) | Outcome::Failure(error)
//! ```

pub mod completion;
pub mod context;
pub mod error;
pub mod executor;
pub mod handler;
pub mod loader;
pub mod process;

pub use completion::{Completion, Outcome};
pub use context::{Callback, Context};
pub use error::{HandlerError, InvokeError, InvokeResult};
pub use executor::Executor;
pub use handler::{Handler, HandlerFuture, handler_fn, sync_handler_fn};
pub use loader::{EntryPointLoader, FallbackLoader, HandlerRegistry};
pub use process::ProcessLoader;
