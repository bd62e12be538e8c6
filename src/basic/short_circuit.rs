use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use num_traits::One;

use super::{
    admittance::NodeAdmittance,
    network::{Network, NodeType},
};
use crate::error::{FlowError, Result};

/// Three-phase short-circuit state built on a converged power flow.
#[derive(Debug, Clone)]
pub struct ShortCircuit {
    /// Node impedance matrix in solver order.
    z_sorted: DMatrix<Complex64>,
    /// Node impedance matrix in original order.
    z: DMatrix<Complex64>,
    /// Pre-fault voltages in solver order.
    pre_fault: DVector<Complex64>,
    /// Solver offset of the faulted node.
    fault: usize,
    /// 1-based ID of the faulted node.
    fault_id: usize,
    /// Solver offset of every original node.
    to_perm: Vec<usize>,
    transition: Complex64,
}

#[inline(always)]
fn snap(value: Complex64, epsilon: f64) -> Complex64 {
    let re = if value.re.abs() <= epsilon { 0.0 } else { value.re };
    let im = if value.im.abs() <= epsilon { 0.0 } else { value.im };
    Complex64::new(re, im)
}

/// Builds the node impedance matrix for the fault node stored in `network`.
///
/// Starting from the admittance matrix, every PQ node gets its load admittance
/// `-conj(P + jQ) / V²` (skipped with `ignore_load`) and every PV or swing node
/// gets its generator admittance `1 / (j x_d)` on the diagonal. The result is
/// inverted densely.
///
/// With `ignore_load` all pre-fault voltages are taken as `1 + j0`. This is a
/// modelling approximation that is not checked for heavily loaded networks.
///
/// # Arguments
///
/// * `e`, `f` - Converged voltage components in solver order.
/// * `transition` - Impedance inserted at the fault point.
pub fn node_impedance(
    network: &Network,
    admittance: &NodeAdmittance,
    e: &DVector<f64>,
    f: &DVector<f64>,
    transition: Complex64,
    ignore_load: bool,
) -> Result<ShortCircuit> {
    let n = network.node_count();
    let fault_id = network
        .fault_node()
        .ok_or(FlowError::ShortCircuitNode { id: 0, count: n })?;

    let mut y = admittance.y_sorted().clone();
    for (r, node) in network.nodes().iter().enumerate() {
        match node.kind {
            NodeType::PQ if ignore_load => {}
            NodeType::PQ => {
                let v2 = e[r] * e[r] + f[r] * f[r];
                y[(r, r)] -= node.s().conj() / v2;
            }
            NodeType::PV | NodeType::Swing => {
                let x_d = node
                    .x_d
                    .filter(|x| *x != 0.0)
                    .ok_or(FlowError::GeneratorReactance { node: node.id })?;
                y[(r, r)] += Complex64::new(0.0, x_d).inv();
            }
        }
    }

    let z_sorted = y.try_inverse().ok_or(FlowError::SingularImpedance)?;
    let to_perm = network.to_perm();
    let z = DMatrix::from_fn(n, n, |i, j| z_sorted[(to_perm[i], to_perm[j])]);

    let pre_fault = if ignore_load {
        DVector::from_element(n, Complex64::one())
    } else {
        DVector::from_fn(n, |r, _| Complex64::new(e[r], f[r]))
    };

    Ok(ShortCircuit {
        z_sorted,
        z,
        pre_fault,
        fault: network.solver_index(fault_id),
        fault_id,
        to_perm: to_perm.to_vec(),
        transition,
    })
}

impl ShortCircuit {
    /// Self impedance at the fault node plus the transition impedance.
    fn fault_impedance(&self) -> Result<Complex64> {
        let zf = self.z_sorted[(self.fault, self.fault)] + self.transition;
        if zf.norm() < f64::EPSILON || !zf.is_finite() {
            return Err(FlowError::DegenerateFault {
                node: self.fault_id,
            });
        }
        Ok(zf)
    }

    /// Fault current `V_f / (Z_ff + Z_t)`.
    pub fn short_circuit_current(&self) -> Result<Complex64> {
        Ok(self.pre_fault[self.fault] / self.fault_impedance()?)
    }

    /// Post-fault node voltages in original order.
    ///
    /// `U_i = V_i - Z_if * V_f / (Z_ff + Z_t)`; real or imaginary parts within
    /// `epsilon` of zero are reported as zero.
    pub fn short_circuit_voltage(&self, epsilon: f64) -> Result<DVector<Complex64>> {
        let current = self.short_circuit_current()?;
        Ok(DVector::from_fn(self.to_perm.len(), |i, _| {
            let r = self.to_perm[i];
            snap(self.pre_fault[r] - self.z_sorted[(r, self.fault)] * current, epsilon)
        }))
    }

    /// Post-fault current of every edge, in edge input order.
    ///
    /// A transformer uses `y * (k² - k + 1) / k²` and the far-side voltage
    /// divided by `k`; a line uses `y + 2 * y0`.
    ///
    /// # Arguments
    ///
    /// * `voltages` - Post-fault voltages in original order, as returned by
    ///   [`ShortCircuit::short_circuit_voltage`].
    pub fn short_circuit_edge_current(
        &self,
        network: &Network,
        voltages: &DVector<Complex64>,
    ) -> Vec<Complex64> {
        network
            .edges()
            .iter()
            .map(|edge| {
                let y = edge.admittance();
                let (u1, u2) = (voltages[edge.from - 1], voltages[edge.to - 1]);
                if edge.is_transformer() {
                    let k = edge.k;
                    let y_eff = y * (k * k - k + 1.0) / (k * k);
                    (u1 - u2 / k) * y_eff
                } else {
                    let y_eff = y + edge.grounding_admittance() * 2.0;
                    (u1 - u2) * y_eff
                }
            })
            .collect()
    }

    /// Node impedance matrix in original order.
    pub fn z(&self) -> &DMatrix<Complex64> {
        &self.z
    }

    /// Node impedance matrix in solver order.
    pub fn z_sorted(&self) -> &DMatrix<Complex64> {
        &self.z_sorted
    }

    /// Real part in original order, as reported.
    pub fn real(&self) -> DMatrix<f64> {
        self.z.map(|v| v.re)
    }

    /// Imaginary part in original order, as reported.
    pub fn imag(&self) -> DMatrix<f64> {
        self.z.map(|v| v.im)
    }

    /// 1-based ID of the faulted node.
    pub fn fault_node(&self) -> usize {
        self.fault_id
    }
}
