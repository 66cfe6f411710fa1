//! JSON HTTP API.
//!
//! Routes call the database layer directly and dispatch any notifications a
//! mutation produced once it has committed.

mod actor;
mod extract;
mod response;
mod server;
mod tasks;
mod users;

pub use actor::{ACTOR_HEADER, Actor};
pub use response::status_for;
pub use server::{AppState, build_router, start_server};
