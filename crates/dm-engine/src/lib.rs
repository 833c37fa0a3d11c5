//! Facade wiring the tabular data components to a storage service

pub mod engine;
pub mod error;
pub mod state;

pub use engine::TabularDataEngine;
pub use error::{EngineError, ErrorKind};
pub use state::{EngineSnapshot, EngineState};
