//! Handler modules and the module registry.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::routing::registry::{Route, RouteRegistry};

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("module {origin} failed to load: {reason}")]
    Load { origin: String, reason: String },

    #[error("module {0} is already registered")]
    Duplicate(String),
}

impl ModuleError {
    pub fn load(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        ModuleError::Load {
            origin: origin.into(),
            reason: reason.into(),
        }
    }
}

/// A unit of routes that can be loaded, reloaded and evicted together.
pub trait HandlerModule {
    /// Stable identifier; keys the module registry and tags its routes.
    fn origin(&self) -> &str;

    /// Build (or rebuild) the module's routes.
    fn load(&mut self) -> Result<Vec<Route>, ModuleError>;
}

/// A module defined by a closure.
pub struct FnModule<F> {
    origin: String,
    loader: F,
}

impl<F> FnModule<F>
where
    F: FnMut() -> Result<Vec<Route>, ModuleError>,
{
    pub fn new(origin: impl Into<String>, loader: F) -> Self {
        Self {
            origin: origin.into(),
            loader,
        }
    }
}

impl<F> HandlerModule for FnModule<F>
where
    F: FnMut() -> Result<Vec<Route>, ModuleError>,
{
    fn origin(&self) -> &str {
        &self.origin
    }

    fn load(&mut self) -> Result<Vec<Route>, ModuleError> {
        (self.loader)()
    }
}

/// Last known state of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModuleStatus {
    Loaded,
    ReloadFailed,
}

pub(crate) struct ModuleEntry {
    pub(crate) module: Box<dyn HandlerModule>,
    pub(crate) status: ModuleStatus,
}

/// Loaded modules keyed by origin.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, ModuleEntry>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a module for the first time and install its routes.
    ///
    /// A module that fails its first load is not registered.
    pub fn register(
        &mut self,
        mut module: Box<dyn HandlerModule>,
        routes: &mut RouteRegistry,
    ) -> Result<usize, ModuleError> {
        let origin = module.origin().to_string();
        if self.modules.contains_key(&origin) {
            return Err(ModuleError::Duplicate(origin));
        }
        let contributed = module.load()?;
        let count = routes.install(&origin, contributed);
        self.modules.insert(
            origin,
            ModuleEntry {
                module,
                status: ModuleStatus::Loaded,
            },
        );
        Ok(count)
    }

    pub fn status(&self, origin: &str) -> Option<ModuleStatus> {
        self.modules.get(origin).map(|e| e.status)
    }

    pub fn origins(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = (&String, &mut ModuleEntry)> {
        self.modules.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Reply;
    use serde_json::json;

    fn module(origin: &'static str, path: &'static str) -> Box<dyn HandlerModule> {
        Box::new(FnModule::new(origin, move || {
            Ok(vec![Route::new(path, &[], |_| Ok(Reply::Json(json!(null))))])
        }))
    }

    #[test]
    fn register_installs_routes() {
        let mut modules = ModuleRegistry::new();
        let mut routes = RouteRegistry::new();

        assert_eq!(modules.register(module("a", "/a"), &mut routes).unwrap(), 1);
        assert_eq!(modules.status("a"), Some(ModuleStatus::Loaded));
        assert_eq!(routes.owner("/a"), Some("a"));
    }

    #[test]
    fn duplicate_origin_is_rejected() {
        let mut modules = ModuleRegistry::new();
        let mut routes = RouteRegistry::new();
        modules.register(module("a", "/a"), &mut routes).unwrap();

        let err = modules.register(module("a", "/other"), &mut routes).unwrap_err();
        assert!(matches!(err, ModuleError::Duplicate(ref o) if o == "a"));
        assert!(routes.get("/other").is_none());
    }

    #[test]
    fn failed_first_load_is_not_registered() {
        let mut modules = ModuleRegistry::new();
        let mut routes = RouteRegistry::new();
        let broken = Box::new(FnModule::new("broken", || Err(ModuleError::load("broken", "syntax"))));

        assert!(modules.register(broken, &mut routes).is_err());
        assert!(modules.is_empty());
    }
}
