//! Risk assessment dashboard core: form state, validation, submission to the remote
//! scoring service, response interpretation, and render-ready views.

pub mod assessment;
pub mod config;
pub mod error;
pub mod session;
pub mod telemetry;
