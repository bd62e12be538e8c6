use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use num_complex::Complex64;
use num_traits::One;

use super::network::Network;

/// Nodal admittance matrix of a network, kept in both node orders.
///
/// The solver-order copy feeds the Jacobian and mismatch computations, the
/// original-order copy is what gets reported.
#[derive(Debug, Clone)]
pub struct NodeAdmittance {
    /// Admittance in original node order.
    y: DMatrix<Complex64>,
    /// Admittance in solver order.
    y_sorted: DMatrix<Complex64>,
    /// Real part of `y_sorted`.
    g: DMatrix<f64>,
    /// Imaginary part of `y_sorted`.
    b: DMatrix<f64>,
    /// Structural connectivity in original node order.
    adjacency: DMatrix<bool>,
    /// Per solver row: the diagonal followed by the adjacent solver columns.
    neighbors: Vec<Vec<usize>>,
}

/// Creates the incidence matrix of the network.
///
/// Column `idx` describes edge `idx`: `+1` at the near-side node and `-1/k`
/// (or `-1` for a line) at the far-side node, so that `A * diag(y) * A^T`
/// yields `y`, `y/k²` and `-y/k` for a transformer.
fn create_incidence_mat(net: &Network) -> CooMatrix<Complex64> {
    let nodes = net.node_count();
    let edges = net.edges();
    let mut incidence_matrix = CooMatrix::new(nodes, edges.len());
    for (idx, edge) in edges.iter().enumerate() {
        let far = if edge.is_transformer() {
            -Complex64::one() / edge.k
        } else {
            -Complex64::one()
        };
        incidence_matrix.push(edge.from - 1, idx, Complex64::one());
        incidence_matrix.push(edge.to - 1, idx, far);
    }
    incidence_matrix
}

/// Grounding admittance of lines, placed on both diagonals.
fn create_shunt_mat(net: &Network) -> CooMatrix<Complex64> {
    let nodes = net.node_count();
    let mut shunt = CooMatrix::new(nodes, nodes);
    for edge in net.edges().iter().filter(|e| !e.is_transformer()) {
        let y0 = edge.grounding_admittance();
        shunt.push(edge.from - 1, edge.from - 1, y0);
        shunt.push(edge.to - 1, edge.to - 1, y0);
    }
    shunt
}

/// Creates the nodal admittance matrix (Ybus) in original node order.
fn create_ybus(net: &Network) -> CsrMatrix<Complex64> {
    let edges = net.edges();
    let mut diag_admit = CsrMatrix::identity(edges.len());
    diag_admit
        .values_mut()
        .iter_mut()
        .zip(edges)
        .for_each(|(y, edge)| *y = edge.admittance());

    let incidence_matrix = CsrMatrix::from(&create_incidence_mat(net));
    let series = &incidence_matrix * &(&diag_admit * &incidence_matrix.transpose());
    let shunt = CsrMatrix::from(&create_shunt_mat(net));
    &series + &shunt
}

/// Assembles the nodal admittance matrix of the network.
///
/// A line adds `y + y0` to both diagonals and `-y` to both off-diagonals,
/// where `y0` is half its shunt susceptance. A transformer adds `y` to the
/// near-side diagonal, `y/k²` to the far-side diagonal and `-y/k` to both
/// off-diagonals.
pub fn node_admittance(net: &Network) -> NodeAdmittance {
    let n = net.node_count();
    let y = DMatrix::from(&create_ybus(net));

    let from_perm = net.from_perm();
    let y_sorted = DMatrix::from_fn(n, n, |i, j| y[(from_perm[i], from_perm[j])]);

    let mut adjacency = DMatrix::from_element(n, n, false);
    for edge in net.edges().iter().filter(|e| e.from != e.to) {
        adjacency[(edge.from - 1, edge.to - 1)] = true;
        adjacency[(edge.to - 1, edge.from - 1)] = true;
    }

    let neighbors = (0..n)
        .map(|r| {
            std::iter::once(r)
                .chain((0..n).filter(|&c| c != r && adjacency[(from_perm[r], from_perm[c])]))
                .collect()
        })
        .collect();

    NodeAdmittance {
        g: y_sorted.map(|v| v.re),
        b: y_sorted.map(|v| v.im),
        y,
        y_sorted,
        adjacency,
        neighbors,
    }
}

impl NodeAdmittance {
    /// Admittance matrix in original node order.
    pub fn y(&self) -> &DMatrix<Complex64> {
        &self.y
    }

    /// Admittance matrix in solver order.
    pub fn y_sorted(&self) -> &DMatrix<Complex64> {
        &self.y_sorted
    }

    /// Real part in original node order, as reported.
    pub fn real(&self) -> DMatrix<f64> {
        self.y.map(|v| v.re)
    }

    /// Imaginary part in original node order, as reported.
    pub fn imag(&self) -> DMatrix<f64> {
        self.y.map(|v| v.im)
    }

    /// Conductance in solver order.
    pub fn g(&self) -> &DMatrix<f64> {
        &self.g
    }

    /// Susceptance in solver order.
    pub fn b(&self) -> &DMatrix<f64> {
        &self.b
    }

    /// Structural connectivity in original node order.
    pub fn adjacency(&self) -> &DMatrix<bool> {
        &self.adjacency
    }

    /// Solver columns contributing to solver row `r`, diagonal first.
    pub fn neighbors(&self, r: usize) -> &[usize] {
        &self.neighbors[r]
    }
}
