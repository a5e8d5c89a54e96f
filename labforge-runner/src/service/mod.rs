//! Service layer
//!
//! Business logic of the runner: the execution driver that carries jobs
//! through the engine, the transcript sink it streams progress into, and
//! the startup prewarmer.

mod driver;
mod prewarm;
mod transcript;

pub use driver::ExecutionDriver;
pub use prewarm::{CRITICAL_PACKAGES, PrewarmReport, Prewarmer};
pub use transcript::Transcript;
