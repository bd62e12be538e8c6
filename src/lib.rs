//! AC power flow in rectangular coordinates.
//!
//! The Newton-Raphson solver works on the real and imaginary voltage
//! components `(e, f)` and can be followed by a three-phase short-circuit
//! analysis of any node.

pub mod basic;
pub mod config;
pub mod error;
pub mod io;
pub mod runner;

pub mod prelude {
    pub use crate::basic::*;
    pub use crate::config::{PowerFlowConfig, RunConfig, ShortCircuitConfig};
    pub use crate::error::{FlowError, Result};
    pub use crate::io::{OutputWriter, read_matrix};
    pub use crate::runner::{FaultReport, RunReport, run};
}
