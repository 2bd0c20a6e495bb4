//! Route registry.
//!
//! # Responsibilities
//! - Map request paths to handlers
//! - Remember which module owns each route
//! - Swap or evict a module's routes as one step
//!
//! # Design Decisions
//! - Lives on the affine thread; mutated only by module loads and reloads,
//!   which are affine operations themselves, so no locking
//! - Exact path match; reserved paths never reach the registry

use std::collections::HashMap;
use std::rc::Rc;

use crate::bridge::HandlerError;
use crate::context::binding::Injected;
use crate::http::Reply;

type HandlerFn = dyn Fn(&mut Injected<'_>) -> Result<Reply, HandlerError>;

/// A callable plus the capabilities it wants injected.
pub struct Handler {
    deps: Vec<String>,
    func: Box<HandlerFn>,
}

impl Handler {
    pub fn new<F>(deps: &[&str], func: F) -> Self
    where
        F: Fn(&mut Injected<'_>) -> Result<Reply, HandlerError> + 'static,
    {
        Self {
            deps: deps.iter().map(|d| d.to_string()).collect(),
            func: Box::new(func),
        }
    }

    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    pub fn call(&self, injected: &mut Injected<'_>) -> Result<Reply, HandlerError> {
        (self.func)(injected)
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler").field("deps", &self.deps).finish()
    }
}

/// A path contributed by a module. Several paths may share one handler.
#[derive(Debug, Clone)]
pub struct Route {
    pub path: String,
    pub handler: Rc<Handler>,
}

impl Route {
    pub fn new<F>(path: impl Into<String>, deps: &[&str], func: F) -> Self
    where
        F: Fn(&mut Injected<'_>) -> Result<Reply, HandlerError> + 'static,
    {
        Self::shared(path, Rc::new(Handler::new(deps, func)))
    }

    pub fn shared(path: impl Into<String>, handler: Rc<Handler>) -> Self {
        Self {
            path: path.into(),
            handler,
        }
    }
}

#[derive(Debug)]
struct RouteEntry {
    origin: String,
    handler: Rc<Handler>,
}

/// Path → handler, tagged with the owning module's origin.
#[derive(Debug, Default)]
pub struct RouteRegistry {
    entries: HashMap<String, RouteEntry>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every route `origin` owns with `routes`.
    pub fn install(&mut self, origin: &str, routes: Vec<Route>) -> usize {
        self.evict(origin);
        let count = routes.len();
        for route in routes {
            let entry = RouteEntry {
                origin: origin.to_string(),
                handler: route.handler,
            };
            if let Some(previous) = self.entries.insert(route.path.clone(), entry) {
                tracing::warn!(
                    path = %route.path,
                    previous = %previous.origin,
                    origin = %origin,
                    "Route taken over by another module"
                );
            }
        }
        count
    }

    /// Remove every route `origin` owns. Returns how many were removed.
    pub fn evict(&mut self, origin: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.origin != origin);
        before - self.entries.len()
    }

    pub fn get(&self, path: &str) -> Option<Rc<Handler>> {
        self.entries.get(path).map(|e| Rc::clone(&e.handler))
    }

    pub fn owner(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(|e| e.origin.as_str())
    }

    /// Registered paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.entries.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constant(path: &str, value: i64) -> Route {
        Route::new(path, &[], move |_| Ok(Reply::Json(json!(value))))
    }

    #[test]
    fn install_replaces_previous_routes_of_origin() {
        let mut registry = RouteRegistry::new();
        registry.install("a", vec![constant("/one", 1), constant("/two", 2)]);
        assert_eq!(registry.paths(), vec!["/one", "/two"]);

        registry.install("a", vec![constant("/three", 3)]);
        assert_eq!(registry.paths(), vec!["/three"]);
        assert_eq!(registry.owner("/three"), Some("a"));
    }

    #[test]
    fn evict_only_touches_its_origin() {
        let mut registry = RouteRegistry::new();
        registry.install("a", vec![constant("/a", 1)]);
        registry.install("b", vec![constant("/b1", 2), constant("/b2", 3)]);

        assert_eq!(registry.evict("b"), 2);
        assert!(registry.get("/b1").is_none());
        assert!(registry.get("/a").is_some());
        assert_eq!(registry.evict("missing"), 0);
    }

    #[test]
    fn later_module_takes_over_path() {
        let mut registry = RouteRegistry::new();
        registry.install("a", vec![constant("/shared", 1)]);
        registry.install("b", vec![constant("/shared", 2)]);
        assert_eq!(registry.owner("/shared"), Some("b"));

        // Evicting the old owner leaves the new one in place.
        registry.evict("a");
        assert_eq!(registry.owner("/shared"), Some("b"));
    }

    #[test]
    fn shared_handler_serves_several_paths() {
        let handler = Rc::new(Handler::new(&["path"], |inj| {
            Ok(Reply::Json(json!(inj.path())))
        }));
        let mut registry = RouteRegistry::new();
        registry.install(
            "list",
            vec![
                Route::shared("/list/components", handler.clone()),
                Route::shared("/list/bodies", handler),
            ],
        );
        let a = registry.get("/list/components").unwrap();
        let b = registry.get("/list/bodies").unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(a.deps(), ["path".to_string()]);
    }
}
