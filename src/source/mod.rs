//! Reading sources for the aggregation pipeline.
//!
//! Every source yields an ordered stream of [`SensorReading`] values for a
//! single user.
//!
//! [`SensorReading`]: crate::core::SensorReading

pub mod replay;
pub mod simulator;

// Re-export commonly used types
pub use replay::RawLogReader;
pub use simulator::{ReadingGenerator, Simulator, SimulatorConfig, SimulatorError};
