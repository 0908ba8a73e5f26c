//! HTTP route handlers, one module per resource.

pub mod attachment;
