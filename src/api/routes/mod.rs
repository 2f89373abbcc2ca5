//! API route declarations

pub mod hook_routes;
