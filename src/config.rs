use std::path::PathBuf;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::{
    error::{FlowError, Result},
    io::writer::DEFAULT_PREFIX,
};

/// Newton-Raphson settings. Unset fields fall back to the defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerFlowConfig {
    pub max_it: Option<usize>,
    pub tol: Option<f64>,
}

impl PowerFlowConfig {
    pub const DEFAULT_MAX_IT: usize = 100;
    pub const DEFAULT_TOL: f64 = 1e-5;

    pub fn max_it(&self) -> usize {
        self.max_it.unwrap_or(Self::DEFAULT_MAX_IT)
    }

    /// Convergence tolerance, also the snap-to-zero threshold of reported values.
    pub fn tol(&self) -> f64 {
        self.tol.unwrap_or(Self::DEFAULT_TOL)
    }

    /// Checks that the iteration budget is positive and `0 <= tol <= 1`.
    pub fn validate(&self) -> Result<()> {
        if self.max_it() == 0 {
            return Err(FlowError::InvalidIterations);
        }
        let tol = self.tol();
        if !(0.0..=1.0).contains(&tol) {
            return Err(FlowError::InvalidAccuracy(tol));
        }
        Ok(())
    }
}

/// Fault location and model switches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShortCircuitConfig {
    /// 1-based ID of the faulted node.
    pub node: usize,
    /// Impedance between the fault point and ground.
    #[serde(default)]
    pub transition_impedance: Complex64,
    /// Drop load admittances and use unit pre-fault voltages.
    #[serde(default)]
    pub ignore_load: bool,
}

impl ShortCircuitConfig {
    pub fn new(node: usize) -> Self {
        Self {
            node,
            transition_impedance: Complex64::new(0.0, 0.0),
            ignore_load: false,
        }
    }
}

/// Everything a single run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub nodes: PathBuf,
    pub edges: PathBuf,
    /// Skip the first line of both input files.
    #[serde(default)]
    pub remove_first_line: bool,
    /// Print matrices and result tables to stdout.
    #[serde(default)]
    pub verbose: bool,
    /// Prepended to every output file name.
    pub output_prefix: String,
    #[serde(default)]
    pub power_flow: PowerFlowConfig,
    #[serde(default)]
    pub short_circuit: Option<ShortCircuitConfig>,
}

impl RunConfig {
    pub fn new(nodes: impl Into<PathBuf>, edges: impl Into<PathBuf>) -> Self {
        Self {
            nodes: nodes.into(),
            edges: edges.into(),
            remove_first_line: false,
            verbose: false,
            output_prefix: DEFAULT_PREFIX.to_string(),
            power_flow: PowerFlowConfig::default(),
            short_circuit: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.power_flow.validate()
    }
}
