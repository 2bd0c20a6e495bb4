//! Capability binding: call a handler with only what it declared.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use serde_json::Value;

use crate::bridge::error::{BridgeError, HandlerError};
use crate::context::{ContextMap, APP, REQUEST};
use crate::host::Application;
use crate::http::Reply;
use crate::routing::registry::Handler;

/// The capabilities injected into one handler call.
///
/// Anything the handler did not declare is invisible to it.
pub struct Injected<'a> {
    path: &'a str,
    app: Option<&'a mut (dyn Application + 'static)>,
    values: BTreeMap<&'a str, &'a Value>,
}

impl<'a> Injected<'a> {
    pub fn path(&self) -> &'a str {
        self.path
    }

    /// A declared capability.
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.values.get(name).copied()
    }

    /// A declared capability, or a handler error naming it.
    pub fn require(&self, name: &str) -> Result<&'a Value, HandlerError> {
        self.get(name)
            .ok_or_else(|| HandlerError::new(format!("capability '{}' was not declared", name)))
    }

    /// A value from the combined parameter set (`request` must be declared).
    pub fn param(&self, name: &str) -> Option<&'a Value> {
        self.get(REQUEST).and_then(|r| r.get(name))
    }

    /// A string parameter that must be present, else 400.
    pub fn param_str(&self, name: &str) -> Result<&'a str, HandlerError> {
        self.param(name).and_then(Value::as_str).ok_or_else(|| {
            HandlerError::new(format!("missing parameter '{}'", name))
                .with_status(StatusCode::BAD_REQUEST)
        })
    }

    /// The host application (`app` must be declared).
    pub fn app(&mut self) -> Result<&mut (dyn Application + 'static), HandlerError> {
        self.app
            .as_deref_mut()
            .ok_or_else(|| HandlerError::new("capability 'app' was not declared"))
    }

    /// The host application downcast to its concrete type.
    pub fn app_as<T: Application>(&mut self) -> Result<&mut T, HandlerError> {
        let name = std::any::type_name::<T>();
        self.app()?
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(|| HandlerError::new(format!("host application is not a {}", name)))
    }
}

/// Select the handler's declared capabilities out of the context.
pub fn bind<'a>(
    deps: &[String],
    path: &'a str,
    context: &'a ContextMap,
    app: &'a mut (dyn Application + 'static),
) -> Result<Injected<'a>, BridgeError> {
    let mut injected = Injected {
        path,
        app: None,
        values: BTreeMap::new(),
    };
    let mut app = Some(app);

    for dep in deps {
        if dep == APP {
            injected.app = app.take();
            continue;
        }
        match context.get_key_value(dep) {
            Some((name, value)) => {
                injected.values.insert(name.as_str(), value);
            }
            None => {
                return Err(BridgeError::Binding {
                    capability: dep.clone(),
                    path: path.to_string(),
                })
            }
        }
    }

    Ok(injected)
}

/// Bind and call a route handler.
pub fn invoke(
    handler: &Handler,
    path: &str,
    context: &ContextMap,
    app: &mut (dyn Application + 'static),
) -> Result<Reply, BridgeError> {
    let mut injected = bind(handler.deps(), path, context, app)?;
    handler.call(&mut injected).map_err(BridgeError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::RecordingHost;
    use serde_json::json;

    fn context() -> ContextMap {
        ContextMap::builder()
            .insert("path", "/thing")
            .insert("request", json!({ "name": "bolt" }))
            .insert("body", json!({}))
            .build()
    }

    #[test]
    fn only_declared_capabilities_are_visible() {
        let ctx = context();
        let mut host = RecordingHost::default();
        let deps = vec!["request".to_string()];
        let mut injected = bind(&deps, "/thing", &ctx, &mut host).unwrap();

        assert_eq!(injected.param_str("name").unwrap(), "bolt");
        assert!(injected.get("body").is_none());
        assert!(injected.app().is_err());
    }

    #[test]
    fn app_is_bound_on_request() {
        let ctx = context();
        let mut host = RecordingHost::default();
        let deps = vec!["app".to_string(), "path".to_string()];
        let mut injected = bind(&deps, "/thing", &ctx, &mut host).unwrap();

        assert_eq!(injected.app().unwrap().name(), "recording-host");
        assert!(injected.app_as::<RecordingHost>().is_ok());
        assert_eq!(injected.get("path"), Some(&json!("/thing")));
    }

    #[test]
    fn missing_capability_is_a_binding_error() {
        let ctx = context();
        let mut host = RecordingHost::default();
        let deps = vec!["request".to_string(), "env".to_string()];
        let err = bind(&deps, "/thing", &ctx, &mut host).err().unwrap();

        match err {
            BridgeError::Binding { capability, path } => {
                assert_eq!(capability, "env");
                assert_eq!(path, "/thing");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_parameter_is_bad_request() {
        let ctx = context();
        let mut host = RecordingHost::default();
        let deps = vec!["request".to_string()];
        let injected = bind(&deps, "/thing", &ctx, &mut host).unwrap();

        let err = injected.param_str("value").unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }
}
