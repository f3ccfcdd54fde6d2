pub mod agent;
pub mod collab;
pub mod config;
pub mod error;
pub mod gate;
pub mod io;
pub mod orchestrator;
pub mod paths;
pub mod pipeline;
pub mod policy;
pub mod prompt;
pub mod shard;
pub mod state;
pub mod store;
pub mod types;

pub use error::{BmadError, Result};
