//! The CampusConnect admin console: events, attendance credit, rewards
//! and students, served over GraphQL.

pub mod config;
pub mod error;
pub mod graphql;
pub mod models;
pub mod server;
pub mod store;
pub mod util;
