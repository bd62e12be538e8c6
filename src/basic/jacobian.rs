use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CscMatrix};

use super::admittance::NodeAdmittance;

/// Partial derivatives of the mismatch equations in rectangular coordinates.
///
/// With `I = Y * (e + jf)`, the computed injections are
/// `P = e * Re(I) + f * Im(I)` and `Q = f * Re(I) - e * Im(I)`.
/// The six sub-blocks are
///
/// * `H = dP/df`, `N = dP/de` for every non-swing row,
/// * `M = dQ/df`, `L = dQ/de` for PQ rows,
/// * `R = dV²/df`, `S = dV²/de` for PV rows.
///
/// Only the diagonal and structurally adjacent columns are non-zero.
pub struct Jacobian<'a> {
    admittance: &'a NodeAdmittance,
    e: &'a DVector<f64>,
    f: &'a DVector<f64>,
    npq: usize,
    npv: usize,
}

/// Dense copies of the sub-blocks, mainly for inspection.
#[derive(Debug, Clone, PartialEq)]
#[allow(non_snake_case)]
pub struct JacobianBlocks {
    pub H: DMatrix<f64>,
    pub N: DMatrix<f64>,
    pub M: DMatrix<f64>,
    pub L: DMatrix<f64>,
    pub R: DMatrix<f64>,
    pub S: DMatrix<f64>,
}

impl<'a> Jacobian<'a> {
    pub fn new(
        admittance: &'a NodeAdmittance,
        e: &'a DVector<f64>,
        f: &'a DVector<f64>,
        npq: usize,
        npv: usize,
    ) -> Self {
        Self {
            admittance,
            e,
            f,
            npq,
            npv,
        }
    }

    /// Number of unknown nodes, every node but the swing node.
    #[inline(always)]
    pub fn unknowns(&self) -> usize {
        self.npq + self.npv
    }

    /// `G(r,c) * e(r) + B(r,c) * f(r)`
    #[inline(always)]
    pub fn j_elem_g_b(&self, r: usize, c: usize) -> f64 {
        self.admittance.g()[(r, c)] * self.e[r] + self.admittance.b()[(r, c)] * self.f[r]
    }

    /// `B(r,c) * e(r) - G(r,c) * f(r)`
    #[inline(always)]
    pub fn j_elem_b_g(&self, r: usize, c: usize) -> f64 {
        self.admittance.b()[(r, c)] * self.e[r] - self.admittance.g()[(r, c)] * self.f[r]
    }

    /// `Σ B(r,c) * f(c) - G(r,c) * e(c)`, the negated real part of the injected current.
    pub fn a(&self, r: usize) -> f64 {
        let (g, b) = (self.admittance.g(), self.admittance.b());
        self.admittance
            .neighbors(r)
            .iter()
            .map(|&c| b[(r, c)] * self.f[c] - g[(r, c)] * self.e[c])
            .sum()
    }

    /// `Σ G(r,c) * f(c) + B(r,c) * e(c)`, the imaginary part of the injected current.
    pub fn c(&self, r: usize) -> f64 {
        let (g, b) = (self.admittance.g(), self.admittance.b());
        self.admittance
            .neighbors(r)
            .iter()
            .map(|&c| g[(r, c)] * self.f[c] + b[(r, c)] * self.e[c])
            .sum()
    }

    #[inline(always)]
    fn h(&self, r: usize, c: usize, row: &RowSums) -> f64 {
        if r == c {
            row.c - self.j_elem_b_g(r, r)
        } else {
            -self.j_elem_b_g(r, c)
        }
    }

    #[inline(always)]
    fn n(&self, r: usize, c: usize, row: &RowSums) -> f64 {
        if r == c {
            -row.a + self.j_elem_g_b(r, r)
        } else {
            self.j_elem_g_b(r, c)
        }
    }

    #[inline(always)]
    fn m(&self, r: usize, c: usize, row: &RowSums) -> f64 {
        if r == c {
            -row.a - self.j_elem_g_b(r, r)
        } else {
            -self.j_elem_g_b(r, c)
        }
    }

    #[inline(always)]
    fn l(&self, r: usize, c: usize, row: &RowSums) -> f64 {
        if r == c {
            -row.c - self.j_elem_b_g(r, r)
        } else {
            -self.j_elem_b_g(r, c)
        }
    }

    fn row_sums(&self, r: usize) -> RowSums {
        RowSums {
            a: self.a(r),
            c: self.c(r),
        }
    }

    /// Builds the interleaved Jacobian of size `2 * (node - 1)`.
    ///
    /// Row `2r` holds `H`/`N`, row `2r + 1` holds `M`/`L` for PQ rows and
    /// `R`/`S` for PV rows. Column `2c` is the derivative by `f(c)`, column
    /// `2c + 1` the derivative by `e(c)`. Structural entries are always
    /// pushed, so the sparsity pattern is identical across iterations.
    pub fn assemble(&self) -> CscMatrix<f64> {
        let m = self.unknowns();
        let mut coo = CooMatrix::new(2 * m, 2 * m);
        for r in 0..m {
            let row = self.row_sums(r);
            let pq_row = r < self.npq;
            for &c in self.admittance.neighbors(r).iter().filter(|&&c| c < m) {
                coo.push(2 * r, 2 * c, self.h(r, c, &row));
                coo.push(2 * r, 2 * c + 1, self.n(r, c, &row));
                if pq_row {
                    coo.push(2 * r + 1, 2 * c, self.m(r, c, &row));
                    coo.push(2 * r + 1, 2 * c + 1, self.l(r, c, &row));
                } else if c == r {
                    coo.push(2 * r + 1, 2 * c, 2.0 * self.f[r]);
                    coo.push(2 * r + 1, 2 * c + 1, 2.0 * self.e[r]);
                }
            }
        }
        CscMatrix::from(&coo)
    }

    /// Dense sub-blocks: `H`, `N` are `(node-1)²`, `M`, `L` are `PQ × (node-1)`,
    /// `R`, `S` are `PV × (node-1)`.
    #[allow(non_snake_case)]
    pub fn blocks(&self) -> JacobianBlocks {
        let m = self.unknowns();
        let mut H = DMatrix::zeros(m, m);
        let mut N = DMatrix::zeros(m, m);
        let mut M = DMatrix::zeros(self.npq, m);
        let mut L = DMatrix::zeros(self.npq, m);
        let mut R = DMatrix::zeros(self.npv, m);
        let mut S = DMatrix::zeros(self.npv, m);
        for r in 0..m {
            let row = self.row_sums(r);
            for &c in self.admittance.neighbors(r).iter().filter(|&&c| c < m) {
                H[(r, c)] = self.h(r, c, &row);
                N[(r, c)] = self.n(r, c, &row);
                if r < self.npq {
                    M[(r, c)] = self.m(r, c, &row);
                    L[(r, c)] = self.l(r, c, &row);
                }
            }
        }
        for r in 0..self.npv {
            let node = r + self.npq;
            R[(r, node)] = 2.0 * self.f[node];
            S[(r, node)] = 2.0 * self.e[node];
        }
        JacobianBlocks { H, N, M, L, R, S }
    }
}

struct RowSums {
    a: f64,
    c: f64,
}
