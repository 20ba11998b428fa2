pub mod auth;
pub mod capture;
pub mod config;
mod context;
mod error;
mod harvester;
pub mod parser;
pub mod portal;
pub mod tracing;
pub mod types;

pub use auth::{auth_gate, AuthError, AuthGate, AuthHandle};
pub use context::HarvestContext;
pub use error::Error;
pub use harvester::{builder::LectureHarvesterBuilder, LectureHarvester};
