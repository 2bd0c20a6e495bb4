//! Routes that ship with the bridge itself.
//!
//! Installed directly into the route registry at startup and kept out of the
//! module registry, so reloads never touch or report them.

use serde_json::{json, Value};

use crate::context::{APP, REQUEST, STATUS};
use crate::http::Reply;
use crate::routing::registry::Route;

pub const ORIGIN: &str = "core";

pub fn routes() -> Vec<Route> {
    vec![
        Route::new("/status", &[APP, STATUS], |inj| {
            let uptime = inj
                .require(STATUS)?
                .get("uptime_secs")
                .and_then(Value::as_u64)
                .unwrap_or_default();
            let server_version = inj
                .require(STATUS)?
                .get("version")
                .cloned()
                .unwrap_or(Value::Null);
            let app = inj.app()?;
            Ok(Reply::Json(json!({
                "status": "Server is running",
                "uptime": format_uptime(uptime),
                "version": format!("{} v{}", app.name(), app.version()),
                "server": server_version,
            })))
        }),
        Route::new("/echo", &[REQUEST], |inj| {
            Ok(Reply::Json(inj.require(REQUEST)?.clone()))
        }),
    ]
}

/// Human-readable uptime, coarsest two units.
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;

    if days > 0 {
        format!("{} days, {} hours, {} minutes", days, hours, minutes)
    } else if secs > 3_600 {
        format!("{} hours, {} minutes", hours, minutes)
    } else if secs > 60 {
        format!("{} minutes, {} seconds", minutes, seconds)
    } else {
        format!("{} seconds", secs)
    }
}
