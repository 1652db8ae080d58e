//! Endpoint factory: trigger descriptors → bindable endpoints.

use std::sync::Arc;

use lambdev_core::{FunctionDescriptor, TriggerDescriptor};
use tracing::{debug, warn};

use crate::endpoint::Endpoint;

/// A function together with the endpoints that dispatch to it.
#[derive(Debug, Clone)]
pub struct BoundFunction {
    pub function: Arc<FunctionDescriptor>,
    pub endpoints: Vec<Endpoint>,
}

/// Build one endpoint per recognized trigger of `function`, in declaration
/// order. Triggers that cannot be turned into an endpoint are logged and
/// skipped.
pub fn endpoints_for(function: &FunctionDescriptor) -> Vec<Endpoint> {
    function
        .triggers()
        .iter()
        .filter_map(|trigger| {
            let built = match trigger {
                TriggerDescriptor::Skill => Ok(Endpoint::skill(&function.name)),
                TriggerDescriptor::Http(config) => Endpoint::http(&function.name, config),
            };
            built
                .map_err(|e| warn!(function = %function.name, error = %e, "skipping endpoint"))
                .ok()
        })
        .collect()
}

/// Bind every function's endpoints.
///
/// Functions left without endpoints are dropped. An endpoint whose route
/// clashes with one bound earlier is skipped with a warning; the earlier
/// declaration keeps the route.
pub fn bind_functions(functions: Vec<FunctionDescriptor>) -> Vec<BoundFunction> {
    let mut accepted: Vec<Endpoint> = Vec::new();
    let mut bound = Vec::new();

    for function in functions {
        let mut endpoints = Vec::new();
        for endpoint in endpoints_for(&function) {
            if let Some(existing) = accepted.iter().find(|e| clashes(e, &endpoint)) {
                warn!(
                    endpoint = %endpoint,
                    function = %function.name,
                    conflicts_with = %existing,
                    owner = existing.function_name(),
                    "skipping endpoint with conflicting route"
                );
                continue;
            }
            accepted.push(endpoint.clone());
            endpoints.push(endpoint);
        }

        if endpoints.is_empty() {
            debug!(function = %function.name, "no bindable triggers");
            continue;
        }
        bound.push(BoundFunction {
            function: Arc::new(function),
            endpoints,
        });
    }
    bound
}

/// Whether two endpoints can't share a router.
///
/// Identical paths clash when their methods overlap. Paths that only differ
/// in capture names at the same position can never be registered together.
fn clashes(a: &Endpoint, b: &Endpoint) -> bool {
    let (pa, pb) = (a.path(), b.path());
    if pa == pb {
        return a.method().overlaps(&b.method());
    }
    for (x, y) in pa.split('/').zip(pb.split('/')) {
        match (capture(x), capture(y)) {
            (Some(_), Some(_)) if x != y => return true,
            (Some(_), Some(_)) => {}
            (None, None) if x == y => {}
            _ => return false,
        }
    }
    false
}

fn capture(token: &str) -> Option<&str> {
    token.strip_prefix('{')?.strip_suffix('}')
}
