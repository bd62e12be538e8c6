use rsparse::{
    data::{self, Numeric, Symb},
    lsolve, lu, sqr, usolve,
};

use super::Solve;

/// LU solver backed by `rsparse`. The symbolic analysis is computed on the
/// first call and reused while the sparsity pattern stays the same.
#[derive(Default)]
pub struct RSparseSolver {
    x: Vec<f64>,
    symbolic: Option<Symb>,
}

#[allow(non_snake_case)]
impl Solve for RSparseSolver {
    fn solve(
        &mut self,
        Ap: &mut [usize],
        Ai: &mut [usize],
        Ax: &mut [f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str> {
        if n == 0 {
            return Ok(());
        }
        if Ap.len() != n + 1 || b.len() != n {
            return Err("dimension mismatch");
        }
        let a = data::Sprs {
            m: n,
            n,
            i: Ai.to_vec(),
            p: Ap.iter().map(|&v| v as isize).collect(),
            x: Ax.to_vec(),
            nzmax: Ax.len(),
        };
        let symbolic = self.symbolic.get_or_insert_with(|| sqr(&a, 1, false));
        self.x.resize(n, 0.0);
        let numeric = lu(&a, symbolic, 1e-6).map_err(|_| "LU factorization failed")?;
        ipvec(&numeric.pinv, b, &mut self.x); // x = P*b
        lsolve(&numeric.l, &mut self.x); // x = L\x
        usolve(&numeric.u, &mut self.x); // x = U\x
        ipvec(&symbolic.q, &self.x, b); // b = Q*x
        if b.iter().any(|v| !v.is_finite()) {
            return Err("singular Jacobian");
        }
        Ok(())
    }
}

fn ipvec<T: Numeric<T>>(p: &Option<Vec<isize>>, b: &[T], x: &mut [T]) {
    match p {
        Some(pvec) => {
            for k in 0..b.len() {
                x[pvec[k] as usize] = b[k];
            }
        }
        None => x.copy_from_slice(b),
    }
}
