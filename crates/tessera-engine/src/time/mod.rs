//! Time subsystem.
//!
//! [`fixed_step`] holds the pure accumulator arithmetic of the fixed-timestep
//! loop; [`Clock`] abstracts the wall clock so the loop can be driven by a
//! scripted [`ManualClock`] in tests.

mod clock;
pub mod fixed_step;

pub use clock::{Clock, ManualClock, SystemClock};
pub use fixed_step::{LoopConfig, LoopTime, StepPlan};
