//! The host application seen from the bridge.
//!
//! # Responsibilities
//! - Define the handle the affine thread owns and handlers receive as `app`
//! - Give the executor hooks for pre-ticket preparation and escalation
//!
//! # Design Decisions
//! - No `Send` bound: the handle never leaves the affine thread
//! - Handlers reach the concrete model through `as_any_mut` downcasts

pub mod demo;

use std::any::Any;

use crate::bridge::HandlerError;

/// The protected host model. Only ever touched on the affine thread.
pub trait Application: Any {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Bring the host into a state where the model may be changed.
    ///
    /// Runs before every ticket; an error fails that ticket.
    fn ensure_idle(&mut self) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Blocking, user-visible notification.
    fn alert(&mut self, title: &str, message: &str);

    /// Allow or prevent the host from tearing the bridge down on its own.
    fn set_auto_terminate(&mut self, enabled: bool);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Host that records alerts instead of showing them.
    pub struct RecordingHost {
        pub alerts: Vec<(String, String)>,
        pub auto_terminate: bool,
    }

    impl Default for RecordingHost {
        fn default() -> Self {
            Self {
                alerts: Vec::new(),
                auto_terminate: true,
            }
        }
    }

    impl Application for RecordingHost {
        fn name(&self) -> &str {
            "recording-host"
        }

        fn version(&self) -> &str {
            "1.0"
        }

        fn alert(&mut self, title: &str, message: &str) {
            self.alerts.push((title.to_string(), message.to_string()));
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
}
