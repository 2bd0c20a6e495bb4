//! Module reload coordination.
//!
//! Runs on the affine thread as an ordinary ticket, so no request can be
//! looking routes up while they are swapped.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use serde_json::Value;

use crate::observability::metrics;
use crate::routing::module::{ModuleError, ModuleRegistry, ModuleStatus};
use crate::routing::registry::RouteRegistry;

/// Per-module outcome of a reload pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReloadStatus {
    Reloaded,
    Removed,
    Restarting,
}

/// Origin → outcome, serialized as a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReloadReport {
    entries: BTreeMap<String, ReloadStatus>,
}

impl ReloadReport {
    pub fn insert(&mut self, origin: impl Into<String>, status: ReloadStatus) {
        self.entries.insert(origin.into(), status);
    }

    pub fn get(&self, origin: &str) -> Option<ReloadStatus> {
        self.entries.get(origin).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Reload every registered module in place.
///
/// A module that reloads has its routes swapped for the new set. A module
/// that fails (error or panic) has all its routes evicted and is marked
/// `ReloadFailed`; it is retried on the next pass. One failure never stops
/// the others.
pub fn reload_modules(modules: &mut ModuleRegistry, routes: &mut RouteRegistry) -> ReloadReport {
    let mut report = ReloadReport::default();

    for (origin, entry) in modules.entries_mut() {
        let loaded = panic::catch_unwind(AssertUnwindSafe(|| entry.module.load()))
            .unwrap_or_else(|_| Err(ModuleError::load(origin.as_str(), "panicked during reload")));

        match loaded {
            Ok(contributed) => {
                let count = routes.install(origin, contributed);
                entry.status = ModuleStatus::Loaded;
                report.insert(origin.as_str(), ReloadStatus::Reloaded);
                tracing::info!(module = %origin, routes = count, "Module reloaded");
            }
            Err(e) => {
                let evicted = routes.evict(origin);
                entry.status = ModuleStatus::ReloadFailed;
                report.insert(origin.as_str(), ReloadStatus::Removed);
                tracing::warn!(module = %origin, evicted, error = %e, "Module reload failed, routes removed");
            }
        }
    }

    metrics::record_reload(report.len());
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Reply;
    use crate::routing::module::FnModule;
    use crate::routing::registry::Route;
    use serde_json::json;

    fn healthy(origin: &'static str) -> FnModule<impl FnMut() -> Result<Vec<Route>, ModuleError>> {
        let path = format!("/{}", origin);
        FnModule::new(origin, move || {
            Ok(vec![Route::new(path.clone(), &[], |_| Ok(Reply::Json(json!(true))))])
        })
    }

    #[test]
    fn failing_module_is_isolated_and_evicted() {
        let mut modules = ModuleRegistry::new();
        let mut routes = RouteRegistry::new();
        modules.register(Box::new(healthy("a")), &mut routes).unwrap();

        let mut loads = 0;
        let flaky = FnModule::new("b", move || {
            loads += 1;
            if loads > 1 {
                return Err(ModuleError::load("b", "bad edit"));
            }
            Ok(vec![Route::new("/b", &[], |_| Ok(Reply::Json(json!(true))))])
        });
        modules.register(Box::new(flaky), &mut routes).unwrap();
        modules.register(Box::new(healthy("c")), &mut routes).unwrap();

        let report = reload_modules(&mut modules, &mut routes);

        assert_eq!(
            report.to_json(),
            json!({ "a": "Reloaded", "b": "Removed", "c": "Reloaded" })
        );
        assert!(routes.get("/b").is_none());
        assert!(routes.get("/a").is_some() && routes.get("/c").is_some());
        assert_eq!(modules.status("b"), Some(ModuleStatus::ReloadFailed));
    }

    #[test]
    fn panicking_module_does_not_abort_pass() {
        let mut modules = ModuleRegistry::new();
        let mut routes = RouteRegistry::new();
        let mut first = true;
        let fragile = FnModule::new("fragile", move || {
            if !first {
                panic!("loader exploded");
            }
            first = false;
            Ok(vec![])
        });
        modules.register(Box::new(fragile), &mut routes).unwrap();
        modules.register(Box::new(healthy("z")), &mut routes).unwrap();

        let report = reload_modules(&mut modules, &mut routes);
        assert_eq!(report.get("fragile"), Some(ReloadStatus::Removed));
        assert_eq!(report.get("z"), Some(ReloadStatus::Reloaded));
    }

    #[test]
    fn failed_module_is_retried_on_next_pass() {
        let mut modules = ModuleRegistry::new();
        let mut routes = RouteRegistry::new();
        let mut loads = 0;
        let recovering = FnModule::new("r", move || {
            loads += 1;
            if loads == 2 {
                return Err(ModuleError::load("r", "transient"));
            }
            let generation = loads;
            Ok(vec![Route::new("/r", &[], move |_| Ok(Reply::Json(json!(generation))))])
        });
        modules.register(Box::new(recovering), &mut routes).unwrap();

        assert_eq!(reload_modules(&mut modules, &mut routes).get("r"), Some(ReloadStatus::Removed));
        assert!(routes.get("/r").is_none());
        assert_eq!(reload_modules(&mut modules, &mut routes).get("r"), Some(ReloadStatus::Reloaded));
        assert!(routes.get("/r").is_some());
    }
}
