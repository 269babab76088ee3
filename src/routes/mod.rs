//! Routers grouped by access level. Access control is applied per router (via
//! Axum layers), not per handler, so a route cannot be exposed by accident.
//!
//! Paths here are relative to `/api/v1`.

/// Routes open to anonymous clients: reads and registration.
pub mod public;

/// Routes behind the `AuthUser` middleware. Object-level rules (author-only
/// edits) are still checked inside the handlers.
pub mod authenticated;
