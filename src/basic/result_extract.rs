use nalgebra::DVector;

use super::{
    admittance::NodeAdmittance,
    jacobian::Jacobian,
    network::{Network, NodeType},
};

/// Power flow solution of one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusResult {
    /// 1-based node ID.
    pub id: usize,
    /// Voltage magnitude.
    pub v: f64,
    /// Voltage angle in radians.
    pub theta: f64,
    /// Active power injection.
    pub p: f64,
    /// Reactive power injection.
    pub q: f64,
}

/// Power flow solution in original node order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowSolution {
    pub buses: Vec<BusResult>,
    /// Newton steps taken to converge.
    pub iterations: usize,
}

#[inline(always)]
fn snap(value: f64, epsilon: f64) -> f64 {
    if value.abs() <= epsilon { 0.0 } else { value }
}

/// Converts converged rectangular voltages into `(V, θ, P, Q)` per node.
///
/// Swing P and Q and PV Q are evaluated from the converged state, everything
/// else keeps its scheduled value. Quantities within `epsilon` of zero are
/// reported as zero. Rows come back in original input order.
pub fn result(
    network: &Network,
    admittance: &NodeAdmittance,
    e: &DVector<f64>,
    f: &DVector<f64>,
    epsilon: f64,
) -> Vec<BusResult> {
    let jac = Jacobian::new(admittance, e, f, network.npq(), network.npv());
    let sorted: Vec<BusResult> = network
        .nodes()
        .iter()
        .enumerate()
        .map(|(r, node)| {
            let (re, im) = (-jac.a(r), jac.c(r));
            let p_calc = e[r] * re + f[r] * im;
            let q_calc = f[r] * re - e[r] * im;
            let (p, q) = match node.kind {
                NodeType::PQ => (node.p, node.q),
                NodeType::PV => (node.p, q_calc),
                NodeType::Swing => (p_calc, q_calc),
            };
            BusResult {
                id: node.id,
                v: snap((e[r] * e[r] + f[r] * f[r]).sqrt(), epsilon),
                theta: snap(f[r].atan2(e[r]), epsilon),
                p: snap(p, epsilon),
                q: snap(q, epsilon),
            }
        })
        .collect();

    // restore the input order through the stored permutation
    network.to_perm().iter().map(|&solver_idx| sorted[solver_idx]).collect()
}
