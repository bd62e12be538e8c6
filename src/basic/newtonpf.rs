use nalgebra::DVector;
use tracing::debug;

use super::{
    admittance::NodeAdmittance,
    jacobian::Jacobian,
    network::{Network, NodeType},
    solver::Solve,
};
use crate::error::{FlowError, Result};

/// Newton-Raphson state in rectangular coordinates.
///
/// Owns the voltage components and mismatch vectors and mutates them in place.
/// One call to [`NewtonRaphson::solve`] performs exactly one correction step;
/// the convergence loop belongs to the caller (see [`newton_pf`]).
pub struct NewtonRaphson<'a, S: Solve> {
    network: &'a Network,
    admittance: &'a NodeAdmittance,
    solver: S,
    /// Real voltage components, solver order.
    e: DVector<f64>,
    /// Imaginary voltage components, solver order.
    f: DVector<f64>,
    /// Active power mismatch of every non-swing node.
    delta_p: DVector<f64>,
    /// Reactive power mismatch of PQ nodes.
    delta_q: DVector<f64>,
    /// Squared voltage magnitude mismatch of PV nodes.
    delta_v2: DVector<f64>,
    iterations: usize,
}

impl<'a, S: Solve> NewtonRaphson<'a, S> {
    /// Seeds a flat start and computes the first mismatch vector.
    ///
    /// Every node starts at `e = V`, `f = 0`, where `V` is its specified
    /// voltage magnitude.
    pub fn iterate_init(network: &'a Network, admittance: &'a NodeAdmittance, solver: S) -> Self {
        let n = network.node_count();
        let e = DVector::from_iterator(n, network.nodes().iter().map(|node| node.v));
        let mut nr = Self {
            network,
            admittance,
            solver,
            e,
            f: DVector::zeros(n),
            delta_p: DVector::zeros(network.npq() + network.npv()),
            delta_q: DVector::zeros(network.npq()),
            delta_v2: DVector::zeros(network.npv()),
            iterations: 0,
        };
        nr.update_mismatch();
        nr
    }

    /// Performs one Newton correction step and returns the iteration count.
    ///
    /// Builds the Jacobian, solves `J * dx = F(x)` with the sparse solver,
    /// adds the correction to `e` and `f`, and recomputes the mismatches.
    pub fn solve(&mut self) -> Result<usize> {
        let unknowns = self.delta_p.len();
        let jacobian = Jacobian::new(
            self.admittance,
            &self.e,
            &self.f,
            self.network.npq(),
            self.network.npv(),
        )
        .assemble();
        let mut dx = self.mismatch_vector();

        let n = jacobian.nrows();
        let (mut ap, mut ai, mut ax) = jacobian.disassemble();
        self.solver
            .solve(&mut ap, &mut ai, &mut ax, dx.as_mut_slice(), n)
            .map_err(FlowError::LinearSolve)?;

        for r in 0..unknowns {
            self.f[r] += dx[2 * r];
            self.e[r] += dx[2 * r + 1];
        }
        self.update_mismatch();
        self.iterations += 1;
        Ok(self.iterations)
    }

    /// Largest absolute entry over `ΔP`, `ΔQ` and `ΔV²`.
    ///
    /// Returns NaN as soon as any mismatch is NaN.
    pub fn get_max(&self) -> f64 {
        self.delta_p
            .iter()
            .chain(self.delta_q.iter())
            .chain(self.delta_v2.iter())
            .fold(0.0, |acc: f64, x| {
                if x.is_nan() || acc.is_nan() {
                    f64::NAN
                } else {
                    acc.max(x.abs())
                }
            })
    }

    /// Number of correction steps performed so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Real voltage components in solver order.
    pub fn e(&self) -> &DVector<f64> {
        &self.e
    }

    /// Imaginary voltage components in solver order.
    pub fn f(&self) -> &DVector<f64> {
        &self.f
    }

    pub fn delta_p(&self) -> &DVector<f64> {
        &self.delta_p
    }

    pub fn delta_q(&self) -> &DVector<f64> {
        &self.delta_q
    }

    pub fn delta_v2(&self) -> &DVector<f64> {
        &self.delta_v2
    }

    /// Consumes the controller, returning the converged `(e, f)`.
    pub fn into_voltages(self) -> (DVector<f64>, DVector<f64>) {
        (self.e, self.f)
    }

    /// Mismatches in the interleaved Jacobian row order.
    fn mismatch_vector(&self) -> DVector<f64> {
        let npq = self.network.npq();
        let mut fx = DVector::zeros(2 * self.delta_p.len());
        for (r, dp) in self.delta_p.iter().enumerate() {
            fx[2 * r] = *dp;
            fx[2 * r + 1] = if r < npq {
                self.delta_q[r]
            } else {
                self.delta_v2[r - npq]
            };
        }
        fx
    }

    fn update_mismatch(&mut self) {
        let npq = self.network.npq();
        let jac = Jacobian::new(
            self.admittance,
            &self.e,
            &self.f,
            npq,
            self.network.npv(),
        );
        for (r, node) in self.network.nodes()[..self.delta_p.len()].iter().enumerate() {
            let (e, f) = (self.e[r], self.f[r]);
            let (re, im) = (-jac.a(r), jac.c(r));
            self.delta_p[r] = node.p - (e * re + f * im);
            match node.kind {
                NodeType::PQ => self.delta_q[r] = node.q - (f * re - e * im),
                NodeType::PV => self.delta_v2[r - npq] = node.v * node.v - (e * e + f * f),
                NodeType::Swing => unreachable!("swing node has no mismatch"),
            }
        }
    }
}

/// Runs Newton correction steps until the largest mismatch is within `tol`.
///
/// # Errors
///
/// Returns [`FlowError::NotConverged`] once `max_it` steps have been taken
/// without reaching the tolerance, or when the mismatch stops being finite.
pub fn newton_pf<S: Solve>(nr: &mut NewtonRaphson<'_, S>, tol: f64, max_it: usize) -> Result<usize> {
    loop {
        let max = nr.get_max();
        debug!(iteration = nr.iterations(), residual = max, "newton step");
        if !max.is_finite() {
            return Err(FlowError::not_converged(nr.iterations(), max));
        }
        if max <= tol {
            return Ok(nr.iterations());
        }
        if nr.iterations() >= max_it {
            return Err(FlowError::not_converged(nr.iterations(), max));
        }
        nr.solve()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::{
        admittance::node_admittance,
        network::{NetworkOptions, tests::*},
        solver::DefaultSolver,
    };
    use approx::assert_abs_diff_eq;
    use nalgebra::DMatrix;

    #[test]
    fn test_flat_start() {
        let (nodes, edges) = three_bus();
        let net = Network::init(&nodes, &edges, &NetworkOptions::default()).unwrap();
        let adm = node_admittance(&net);
        let nr = NewtonRaphson::iterate_init(&net, &adm, DefaultSolver::default());
        assert_eq!(nr.e().as_slice(), &[1.0, 1.0, 1.05]);
        assert!(nr.f().iter().all(|f| *f == 0.0));
        assert_eq!(nr.delta_p().len(), 2);
        assert_eq!(nr.delta_q().len(), 2);
        assert_eq!(nr.delta_v2().len(), 0);
        assert!(nr.get_max() > 0.1);
    }

    #[test]
    fn test_three_bus_converges() {
        let (nodes, edges) = three_bus();
        let net = Network::init(&nodes, &edges, &NetworkOptions::default()).unwrap();
        let adm = node_admittance(&net);
        let mut nr = NewtonRaphson::iterate_init(&net, &adm, DefaultSolver::default());
        let iterations = newton_pf(&mut nr, 1e-8, 100).unwrap();
        assert!(iterations <= 6, "took {} iterations", iterations);

        // solver order: node 1, node 3, node 2 (swing)
        assert_abs_diff_eq!(nr.e()[0], 1.0264006284, epsilon = 1e-7);
        assert_abs_diff_eq!(nr.f()[0], -0.0299394812, epsilon = 1e-7);
        assert_abs_diff_eq!(nr.e()[1], 1.0174911374, epsilon = 1e-7);
        assert_abs_diff_eq!(nr.f()[1], -0.0440285491, epsilon = 1e-7);
        assert_eq!(nr.e()[2], 1.05);
        assert_eq!(nr.f()[2], 0.0);
    }

    #[test]
    fn test_pv_magnitude_held() {
        let (nodes, edges) = four_bus_flow_only();
        let net = Network::init(&nodes, &edges, &NetworkOptions::default()).unwrap();
        let adm = node_admittance(&net);
        let mut nr = NewtonRaphson::iterate_init(&net, &adm, DefaultSolver::default());
        newton_pf(&mut nr, 1e-10, 20).unwrap();
        let pv = net.npq();
        let vm = (nr.e()[pv].powi(2) + nr.f()[pv].powi(2)).sqrt();
        assert_abs_diff_eq!(vm, 1.02, epsilon = 1e-9);
        assert_abs_diff_eq!(nr.f()[pv].atan2(nr.e()[pv]), 0.0266542046, epsilon = 1e-7);
    }

    #[test]
    fn test_residual_shrinks_near_solution() {
        let (nodes, edges) = four_bus_flow_only();
        let net = Network::init(&nodes, &edges, &NetworkOptions::default()).unwrap();
        let adm = node_admittance(&net);
        let mut nr = NewtonRaphson::iterate_init(&net, &adm, DefaultSolver::default());
        let mut history = vec![nr.get_max()];
        for _ in 0..4 {
            nr.solve().unwrap();
            history.push(nr.get_max());
        }
        for pair in history.windows(2).skip(1).filter(|p| p[0] > 1e-12) {
            assert!(pair[1] <= pair[0], "residual grew: {:?}", history);
        }
    }

    #[test]
    fn test_iteration_budget_exhausted() {
        let (nodes, edges) = three_bus();
        let net = Network::init(&nodes, &edges, &NetworkOptions::default()).unwrap();
        let adm = node_admittance(&net);
        let mut nr = NewtonRaphson::iterate_init(&net, &adm, DefaultSolver::default());
        let err = newton_pf(&mut nr, 1e-12, 1).unwrap_err();
        assert!(matches!(err, FlowError::NotConverged { iterations: 1, .. }));
    }

    #[test]
    fn test_zero_load_two_bus() {
        let nodes = DMatrix::from_row_slice(2, 5, &[1.04, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        let edges = DMatrix::from_row_slice(1, 6, &[1.0, 2.0, 0.01, 0.1, 0.0, 0.0]);
        let net = Network::init(&nodes, &edges, &NetworkOptions::default()).unwrap();
        let adm = node_admittance(&net);
        let mut nr = NewtonRaphson::iterate_init(&net, &adm, DefaultSolver::default());
        let iterations = newton_pf(&mut nr, 1e-9, 10).unwrap();
        assert!(iterations <= 5);
        assert_abs_diff_eq!(nr.e()[0], 1.04, epsilon = 1e-9);
        assert_abs_diff_eq!(nr.f()[0], 0.0, epsilon = 1e-9);
    }
}
