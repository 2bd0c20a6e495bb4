//! In-process demo host: a tiny parametric box design.
//!
//! Stands in for a real CAD application so the bridge can be driven end to
//! end from the binary and from tests.

use std::any::Any;
use std::collections::BTreeMap;

use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::bridge::HandlerError;
use crate::context::{APP, REQUEST};
use crate::host::Application;
use crate::http::Reply;
use crate::routing::module::{HandlerModule, ModuleError};
use crate::routing::registry::Route;

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub bodies: Vec<String>,
}

/// A named model parameter with its allowed range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameter {
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl Parameter {
    pub fn new(value: f64, min: f64, max: f64) -> Self {
        Self { value, min, max }
    }

    /// Store `value` clamped into range; returns what was stored.
    pub fn set(&mut self, value: f64) -> f64 {
        self.value = value.clamp(self.min, self.max);
        self.value
    }
}

/// The demo design document.
#[derive(Debug)]
pub struct DemoDesign {
    pub components: Vec<Component>,
    pub parameters: BTreeMap<String, Parameter>,
    /// Interactive command the user left running, if any.
    pub active_command: Option<String>,
    pub auto_terminate: bool,
}

impl Default for DemoDesign {
    fn default() -> Self {
        let parameters = [
            ("width", Parameter::new(20.0, 1.0, 500.0)),
            ("depth", Parameter::new(10.0, 1.0, 500.0)),
            ("height", Parameter::new(5.0, 1.0, 500.0)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            components: vec![
                Component {
                    name: "Root".into(),
                    bodies: vec!["Base".into()],
                },
                Component {
                    name: "Lid".into(),
                    bodies: vec!["Lid".into(), "Hinge".into()],
                },
            ],
            parameters,
            active_command: None,
            auto_terminate: true,
        }
    }
}

impl DemoDesign {
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    fn dimension(&self, name: &str) -> f64 {
        self.parameters.get(name).map(|p| p.value).unwrap_or(1.0)
    }

    /// ASCII STL of the box described by `width`, `depth` and `height`.
    pub fn export_stl(&self, solid: &str) -> String {
        let (w, d, h) = (self.dimension("width"), self.dimension("depth"), self.dimension("height"));
        let corner = |i: usize| {
            [
                if i & 1 == 0 { 0.0 } else { w },
                if i & 2 == 0 { 0.0 } else { d },
                if i & 4 == 0 { 0.0 } else { h },
            ]
        };

        let mut out = format!("solid {}\n", solid);
        for (normal, [a, b, c]) in FACES {
            out.push_str(&format!("  facet normal {} {} {}\n    outer loop\n", normal[0], normal[1], normal[2]));
            for vertex in [a, b, c] {
                let [x, y, z] = corner(vertex);
                out.push_str(&format!("      vertex {} {} {}\n", x, y, z));
            }
            out.push_str("    endloop\n  endfacet\n");
        }
        out.push_str(&format!("endsolid {}\n", solid));
        out
    }
}

/// Twelve triangles of a box; corners indexed by bits (x=1, y=2, z=4).
const FACES: [([i8; 3], [usize; 3]); 12] = [
    ([0, 0, -1], [0, 2, 1]),
    ([0, 0, -1], [1, 2, 3]),
    ([0, 0, 1], [4, 5, 6]),
    ([0, 0, 1], [5, 7, 6]),
    ([0, -1, 0], [0, 1, 4]),
    ([0, -1, 0], [1, 5, 4]),
    ([0, 1, 0], [2, 6, 3]),
    ([0, 1, 0], [3, 6, 7]),
    ([-1, 0, 0], [0, 4, 2]),
    ([-1, 0, 0], [2, 4, 6]),
    ([1, 0, 0], [1, 3, 5]),
    ([1, 0, 0], [3, 7, 5]),
];

impl Application for DemoDesign {
    fn name(&self) -> &str {
        "DemoDesign"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn ensure_idle(&mut self) -> Result<(), HandlerError> {
        if let Some(command) = self.active_command.take() {
            tracing::info!(command = %command, "Terminating active command before bridged call");
        }
        Ok(())
    }

    fn alert(&mut self, title: &str, message: &str) {
        tracing::error!(title, message, "Host alert");
    }

    fn set_auto_terminate(&mut self, enabled: bool) {
        self.auto_terminate = enabled;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Business routes over [`DemoDesign`].
#[derive(Debug, Default)]
pub struct DesignModule;

impl DesignModule {
    pub const ORIGIN: &'static str = "design";
}

impl HandlerModule for DesignModule {
    fn origin(&self) -> &str {
        Self::ORIGIN
    }

    fn load(&mut self) -> Result<Vec<Route>, ModuleError> {
        Ok(vec![
            Route::new("/list/components", &[APP], |inj| {
                let design = inj.app_as::<DemoDesign>()?;
                let components: Vec<Value> = design
                    .components
                    .iter()
                    .map(|c| json!({ "name": c.name, "bodies": c.bodies.len() }))
                    .collect();
                Ok(Reply::json(components))
            }),
            Route::new("/list/bodies", &[APP, REQUEST], |inj| {
                let filter = inj.param("component").and_then(Value::as_str);
                let design = inj.app_as::<DemoDesign>()?;
                let bodies: Vec<&String> = match filter {
                    Some(name) => design
                        .component(name)
                        .ok_or_else(|| not_found(format!("component '{}' not found", name)))?
                        .bodies
                        .iter()
                        .collect(),
                    None => design.components.iter().flat_map(|c| &c.bodies).collect(),
                };
                Ok(Reply::json(json!(bodies)))
            }),
            Route::new("/parameter", &[APP, REQUEST], |inj| {
                let name = inj.param_str("name")?;
                let requested = inj.param("value").map(parse_number).transpose()?;
                let design = inj.app_as::<DemoDesign>()?;
                let parameter = design
                    .parameters
                    .get_mut(name)
                    .ok_or_else(|| not_found(format!("parameter '{}' not found", name)))?;

                match requested {
                    Some(value) => {
                        let previous = parameter.value;
                        let stored = parameter.set(value);
                        Ok(Reply::json(json!({ "name": name, "value": stored, "previous": previous })))
                    }
                    None => Ok(Reply::json(json!({
                        "name": name,
                        "value": parameter.value,
                        "min": parameter.min,
                        "max": parameter.max,
                    }))),
                }
            }),
            Route::new("/export/stl", &[APP, REQUEST], |inj| {
                let solid = inj.param("body").and_then(Value::as_str).unwrap_or("Base");
                let design = inj.app_as::<DemoDesign>()?;
                if !design.components.iter().any(|c| c.bodies.iter().any(|b| b == solid)) {
                    return Err(not_found(format!("body '{}' not found", solid)));
                }
                Ok(Reply::binary("model/stl", design.export_stl(solid)))
            }),
        ])
    }
}

fn not_found(message: String) -> HandlerError {
    HandlerError::new(message).with_status(StatusCode::NOT_FOUND)
}

/// Numbers arrive as JSON numbers from POST bodies or strings from queries.
fn parse_number(value: &Value) -> Result<f64, HandlerError> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| {
            HandlerError::new(format!("'{}' is not a number", value)).with_status(StatusCode::BAD_REQUEST)
        })
}
