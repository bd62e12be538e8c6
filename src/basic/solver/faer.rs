use faer::{
    MatMut,
    linalg::solvers::Solve as _,
    sparse::{
        SparseColMatRef, SymbolicSparseColMatRef,
        linalg::solvers::{Lu, SymbolicLu},
    },
};

use super::Solve;

/// LU solver backed by `faer`, caching the symbolic factorization.
#[derive(Default)]
pub struct FaerSolver {
    symbolic: Option<SymbolicLu<usize>>,
}

#[allow(non_snake_case)]
impl Solve for FaerSolver {
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
        let s = SymbolicSparseColMatRef::new_checked(n, n, Ap, None, Ai);
        let mat = SparseColMatRef::new(s, Ax);
        if self.symbolic.is_none() {
            self.symbolic = Some(SymbolicLu::try_new(s).map_err(|_| "Faer symbolic error")?);
        }
        let symbolic = self.symbolic.clone().ok_or("Faer symbolic error")?;
        let lu = Lu::try_new_with_symbolic(symbolic, mat).map_err(|_| "Faer numerical error")?;
        let rhs = MatMut::from_column_major_slice_mut(b, n, 1);
        lu.solve_in_place(rhs);
        if b.iter().any(|v| !v.is_finite()) {
            return Err("singular Jacobian");
        }
        Ok(())
    }
}
