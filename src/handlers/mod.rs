//! Request handlers, one module per resource.
//!
//! Every handler follows the same sequence: resolve the target (404), apply
//! the object permission rule (401/403), validate the body (400), then make a
//! single repository call.

pub mod comments;
pub mod follows;
pub mod groups;
pub mod posts;
pub mod uploads;
pub mod users;
