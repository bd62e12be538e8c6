//! Error types for the power flow calculator.
//!
//! Every failure is fatal for a run: library routines return a [`FlowError`]
//! and the binary turns it into a non-zero exit status.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`FlowError`].
pub type Result<T> = std::result::Result<T, FlowError>;

/// Unified error type for all rectflow operations.
#[derive(Error, Debug)]
pub enum FlowError {
    // ============ Format / validation errors ============
    /// Input matrix has the wrong number of columns.
    #[error("Bad input matrix format: {matrix} matrix has {found} columns, {expected} expected")]
    ColumnCount {
        matrix: &'static str,
        expected: usize,
        found: usize,
    },

    /// Node type code is not one of 0 (swing), 1 (PQ), 2 (PV).
    #[error("Bad node type {code} at node {node}")]
    NodeType { node: usize, code: f64 },

    /// The network must contain exactly one swing node.
    #[error("Exactly one swing node expected, found {found}")]
    SwingCount { found: usize },

    /// Edge references a node that does not exist.
    #[error("Bad node offset {id} in edge {edge}")]
    EdgeEndpoint { edge: usize, id: f64 },

    /// Edge with zero series impedance.
    #[error("Edge {edge} has zero series impedance")]
    ZeroImpedance { edge: usize },

    /// Generator node without a usable transient reactance.
    #[error("Node {node} requires a non-zero generator reactance for short-circuit calculation")]
    GeneratorReactance { node: usize },

    /// Short-circuit node outside the valid ID range.
    #[error("Bad short-circuit node {id}, expected an ID in [1, {count}]")]
    ShortCircuitNode { id: usize, count: usize },

    /// Epsilon must lie within [0, 1].
    #[error("Invalid accuracy {0}, expected a value within [0, 1]")]
    InvalidAccuracy(f64),

    /// Iteration budget must be positive.
    #[error("Bad number of iterations. Positive integer expected.")]
    InvalidIterations,

    /// A CSV field could not be parsed as a number.
    #[error("Non-numeric value '{value}' in {path} at line {line}")]
    NotNumeric {
        path: PathBuf,
        line: u64,
        value: String,
    },

    /// A row has a different number of fields than the first data row.
    #[error("Row at line {line} of {path} has {found} fields, {expected} expected")]
    RowWidth {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    // ============ Numerical errors ============
    /// Newton-Raphson iteration did not converge.
    #[error("Power flow did not converge after {iterations} iterations (residual: {residual:.3e})")]
    NotConverged { iterations: usize, residual: f64 },

    /// The sparse linear solver rejected the Jacobian.
    #[error("Linear solve failed: {0}")]
    LinearSolve(&'static str),

    /// The modified admittance matrix could not be inverted.
    #[error("Node impedance matrix is singular")]
    SingularImpedance,

    /// Self impedance plus transition impedance vanishes at the fault node.
    #[error("Fault impedance at node {node} is zero")]
    DegenerateFault { node: usize },

    // ============ I/O errors ============
    /// File could not be opened or written.
    #[error("Failed to access file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV reader or writer failure.
    #[error("Failed to process CSV file '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl FlowError {
    /// Create an I/O error bound to a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a CSV error bound to a path.
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    /// Create a convergence failure error.
    pub fn not_converged(iterations: usize, residual: f64) -> Self {
        Self::NotConverged {
            iterations,
            residual,
        }
    }
}
