//! Team task planner library.
//!
//! Tasks get role- and month-scoped identifiers at creation and can be grouped
//! under super tasks whose status follows their children.

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod identifier;
pub mod notify;
pub mod types;
