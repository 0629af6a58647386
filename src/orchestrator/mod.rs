//! Application-level orchestration.
//!
//! The controller owns the per-request flow (session, run-mode dispatch,
//! teardown sweep); submission processing and page variables live in their own
//! modules so the front-ends only deal with requests and responses.

mod controller;
mod pages;
mod submit;

pub(crate) use controller::Controller;
