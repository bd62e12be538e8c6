#[cfg(feature = "faer")]
mod faer;
#[cfg(feature = "faer")]
pub use self::faer::*;

#[cfg(feature = "rsparse")]
mod rsparse;
#[cfg(feature = "rsparse")]
pub use self::rsparse::*;

#[cfg(feature = "faer")]
pub type DefaultSolver = FaerSolver;

#[cfg(all(not(feature = "faer"), feature = "rsparse"))]
pub type DefaultSolver = RSparseSolver;

#[cfg(not(any(feature = "faer", feature = "rsparse")))]
compile_error!("enable the `rsparse` or `faer` feature to select a sparse solver");

#[allow(non_snake_case)]
/// A trait for solving sparse linear systems `A * x = b` given in CSC form.
///
/// The Newton controller calls this once per iteration with the Jacobian and
/// the mismatch vector; the solution overwrites `b`.
pub trait Solve {
    /// Solves the sparse linear system in place.
    ///
    /// # Parameters
    ///
    /// * `Ap` - Column pointers of the matrix.
    /// * `Ai` - Row indices of the matrix.
    /// * `Ax` - Non-zero values of the matrix.
    /// * `b` - Right-hand side vector, replaced by the solution.
    /// * `n` - Dimension of the system.
    fn solve(
        &mut self,
        Ap: &mut [usize],
        Ai: &mut [usize],
        Ax: &mut [f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str>;
}
