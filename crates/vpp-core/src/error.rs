//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Engine error types."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use thiserror::Error;
use vpp_sim::SimError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// `start()` arms a tokio timer and must run inside a runtime.
    #[error("simulation controller must be started from within a tokio runtime")]
    NoRuntime,
    #[error(transparent)]
    Sim(#[from] SimError),
}
