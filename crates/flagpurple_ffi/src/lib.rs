//! Flutter-facing bindings for flagpurple core.

pub mod api;
