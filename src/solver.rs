use std::collections::BTreeMap;

use indicatif::ProgressBar;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{factorization::CscCholesky, CooMatrix, CscMatrix};

use argmin::{
    core::{
        observers::{Observe, ObserverMode},
        Error, Executor, Operator, State, KV,
    },
    solver::conjugategradient::ConjugateGradient,
};

use crate::{
    assembler::{progress_bar, GlobalSystem},
    config::{SolverConfig, SolverMethod},
    dof::DOF,
    error::{Result, VemError},
};

/// Fewest constrained dofs that can remove the three planar rigid modes
pub const MIN_CONSTRAINED_DOFS: usize = 3;

/// Runs multiplication for Conjugate Gradient Solver
struct ConjugateGradientOperator<'a> {
    a: &'a CscMatrix<f64>,
}

impl<'a> Operator for ConjugateGradientOperator<'a> {
    type Param = Vec<f64>;
    type Output = Vec<f64>;

    fn apply(&self, x: &Self::Param) -> std::result::Result<Self::Output, Error> {
        let product = self.a * &DVector::from_column_slice(x);
        Ok(product.as_slice().to_vec())
    }
}

/// Observer bar for argmin solver, tracking the squared residual cost
struct ConjugateGradientObserverBar {
    bar: ProgressBar,
    start_mag: Option<f64>,
    final_mag: f64,
}

impl ConjugateGradientObserverBar {
    fn new(target_cost: f64, visible: bool) -> ConjugateGradientObserverBar {
        ConjugateGradientObserverBar {
            bar: progress_bar(1000, visible),
            start_mag: None,
            final_mag: target_cost.log10(),
        }
    }
}

impl<I> Observe<I> for ConjugateGradientObserverBar
where
    I: State<Float = f64>,
{
    fn observe_init(&mut self, _name: &str, _state: &I, _kv: &KV) -> std::result::Result<(), Error> {
        Ok(())
    }

    fn observe_iter(&mut self, state: &I, _kv: &KV) -> std::result::Result<(), Error> {
        let cost = state.get_cost();
        if !cost.is_finite() || cost <= 0.0 {
            return Ok(());
        }

        let cost_mag = cost.log10();
        let start_mag = *self.start_mag.get_or_insert(cost_mag);
        if start_mag > self.final_mag {
            let done = (start_mag - cost_mag) / (start_mag - self.final_mag);
            self.bar.set_position((1000.0 * done.clamp(0.0, 1.0)) as u64);
        }

        Ok(())
    }

    fn observe_final(&mut self, _state: &I) -> std::result::Result<(), Error> {
        self.bar.finish_and_clear();
        Ok(())
    }
}

/// The system restricted to the free dofs.
#[derive(Debug, Clone)]
pub struct ReducedSystem {
    pub stiffness: CscMatrix<f64>,
    pub load: DVector<f64>,
    /// Global dof of every reduced row
    pub free: Vec<usize>,
}

/// Builds the free-dof system by substituting prescribed displacements
///
/// Every stored entry `K[i, j]` with `i` free and `j` prescribed moves
/// `K[i, j] u_j` to the right hand side.
///
/// # Arguments
/// * `system` - The assembled global system
/// * `prescribed` - Prescribed displacement per constrained dof
///
/// # Returns
/// The reduced stiffness matrix and load vector
pub fn reduce(system: &GlobalSystem, prescribed: &BTreeMap<usize, f64>) -> Result<ReducedSystem> {
    let n_dofs = system.num_dofs();
    if let Some((&dof, _)) = prescribed.range(n_dofs..).next() {
        return Err(VemError::Assembly(format!(
            "prescribed dof {dof} outside the {n_dofs} global dofs"
        )));
    }

    // Position of each global dof in the reduced system, if it is free
    let mut reduced_index: Vec<Option<usize>> = vec![None; n_dofs];
    let mut free = Vec::with_capacity(n_dofs - prescribed.len());
    for (dof, slot) in reduced_index.iter_mut().enumerate() {
        if !prescribed.contains_key(&dof) {
            *slot = Some(free.len());
            free.push(dof);
        }
    }

    let mut coo = CooMatrix::new(free.len(), free.len());
    let mut load = DVector::from_iterator(free.len(), free.iter().map(|&d| system.load[d]));

    for (row, col, &value) in system.stiffness.triplet_iter() {
        let Some(local_row) = reduced_index[row] else {
            continue;
        };
        match (reduced_index[col], prescribed.get(&col)) {
            (Some(local_col), _) => coo.push(local_row, local_col, value),
            (None, Some(&u)) => load[local_row] -= value * u,
            (None, None) => {}
        }
    }

    Ok(ReducedSystem {
        stiffness: CscMatrix::from(&coo),
        load,
        free,
    })
}

/// Solves for the displacement of every dof
///
/// # Arguments
/// * `system` - The assembled global system
/// * `prescribed` - Prescribed displacement per constrained dof
/// * `config` - Solver settings
///
/// # Returns
/// The full displacement vector, prescribed values included
pub fn solve(
    system: &GlobalSystem,
    prescribed: &BTreeMap<usize, f64>,
    config: &SolverConfig,
) -> Result<DVector<f64>> {
    let n_dofs = system.num_dofs();
    let constrained = prescribed.len();
    if constrained < MIN_CONSTRAINED_DOFS {
        return Err(VemError::SingularSystem {
            free: n_dofs.saturating_sub(constrained),
            constrained,
            dof: None,
            unconstrained_points: unconstrained_points(n_dofs, prescribed),
        });
    }

    let reduced = reduce(system, prescribed)?;
    debug!(
        "reduced system: {} free dofs, {constrained} prescribed",
        reduced.free.len()
    );

    let mut displacements = DVector::zeros(n_dofs);
    for (&dof, &u) in prescribed {
        displacements[dof] = u;
    }
    if reduced.free.is_empty() {
        return Ok(displacements);
    }

    let start = std::time::Instant::now();
    let solution = match config.method {
        SolverMethod::Cholesky => run_cholesky(&reduced, prescribed, config.singular_tolerance)?,
        SolverMethod::ConjugateGradient => run_conjugate_gradient(&reduced, config)?,
    };
    let elapsed = (std::time::Instant::now() - start).as_secs_f32();
    info!("solved system in {:.3} seconds", elapsed);

    for (&dof, &u) in reduced.free.iter().zip(solution.iter()) {
        displacements[dof] = u;
    }

    Ok(displacements)
}

/// Points none of whose dofs are prescribed
fn unconstrained_points(n_dofs: usize, prescribed: &BTreeMap<usize, f64>) -> Vec<usize> {
    (0..n_dofs.div_ceil(DOF))
        .filter(|&point| {
            let mut dofs = DOF * point..(DOF * point + DOF).min(n_dofs);
            dofs.all(|dof| !prescribed.contains_key(&dof))
        })
        .collect()
}

/// Solves the reduced system with a sparse Cholesky factorization
///
/// A pivot whose squared value falls below `singular_tolerance` times the
/// matching diagonal entry of `K` marks a dof left without stiffness.
fn run_cholesky(
    reduced: &ReducedSystem,
    prescribed: &BTreeMap<usize, f64>,
    singular_tolerance: f64,
) -> Result<DVector<f64>> {
    let n_free = reduced.free.len();
    let singular = |local: Option<usize>| VemError::SingularSystem {
        free: n_free,
        constrained: prescribed.len(),
        dof: local.map(|k| reduced.free[k]),
        unconstrained_points: unconstrained_points(n_free + prescribed.len(), prescribed),
    };

    let k_diagonal = diagonal(&reduced.stiffness);
    if let Some(k) = k_diagonal.iter().position(|&d| d <= 0.0) {
        return Err(singular(Some(k)));
    }

    let cholesky = CscCholesky::factor(&reduced.stiffness).map_err(|err| {
        warn!("cholesky factorization failed: {err:?}");
        singular(None)
    })?;

    let l_diagonal = diagonal(cholesky.l());
    for (k, (&l, &d)) in l_diagonal.iter().zip(k_diagonal.iter()).enumerate() {
        if l * l / d < singular_tolerance {
            return Err(singular(Some(k)));
        }
    }

    let b = DMatrix::from_column_slice(n_free, 1, reduced.load.as_slice());
    let x = cholesky.solve(&b);
    Ok(x.column(0).into_owned())
}

/// Diagonal of a square sparse matrix, zero where nothing is stored
fn diagonal(matrix: &CscMatrix<f64>) -> Vec<f64> {
    let mut result = vec![0.0; matrix.nrows()];
    for (row, col, &value) in matrix.triplet_iter() {
        if row == col {
            result[row] += value;
        }
    }
    result
}

/// Solves the reduced system using the conjugate gradient method.
///
/// The run stops once the residual norm falls below `cg_tolerance` times
/// the load norm. argmin reports the squared residual norm as its cost.
fn run_conjugate_gradient(reduced: &ReducedSystem, config: &SolverConfig) -> Result<DVector<f64>> {
    let n_free = reduced.free.len();
    let load_norm = reduced.load.norm();
    if load_norm == 0.0 {
        return Ok(DVector::zeros(n_free));
    }
    let target_residual = config.cg_tolerance * load_norm;
    let target_cost = target_residual.powi(2);

    let b_flat: Vec<f64> = reduced.load.iter().copied().collect();
    let solver: ConjugateGradient<_, f64> = ConjugateGradient::new(b_flat);
    let initial_guess: Vec<f64> = vec![0.0; n_free];

    let operator = ConjugateGradientOperator {
        a: &reduced.stiffness,
    };
    let observer = ConjugateGradientObserverBar::new(target_cost, config.progress);

    let res = match Executor::new(operator, solver)
        .configure(|state| {
            state
                .param(initial_guess)
                .max_iters(config.cg_max_iters)
                .target_cost(target_cost)
        })
        .add_observer(observer, ObserverMode::NewBest)
        .run()
    {
        Ok(r) => r,
        Err(err) => {
            return Err(VemError::Solver(format!(
                "Conjugate Gradient error: {err}"
            )))
        }
    };

    let best_param = match &res.state().best_param {
        Some(vec) => DVector::from_vec(vec.clone()),
        None => {
            return Err(VemError::Solver(
                "Conjugate Gradient could not produce best parameter".to_owned(),
            ))
        }
    };

    let iterations = res.state().get_iter();
    let best_cost = res.state().get_best_cost();
    if best_cost.is_nan() || best_cost > target_cost {
        return Err(VemError::Solver(format!(
            "Conjugate Gradient did not converge in {iterations} iterations, \
             residual {:e} above target {target_residual:e}",
            best_cost.sqrt()
        )));
    }
    debug!(
        "conjugate gradient converged in {iterations} iterations, relative residual {:e}",
        best_cost.sqrt() / load_norm
    );

    Ok(best_param)
}

/// Recovers the reaction force at every constrained dof
///
/// # Arguments
/// * `system` - The assembled global system
/// * `displacements` - The full displacement vector
/// * `prescribed` - Prescribed displacement per constrained dof
///
/// # Returns
/// `(K u - f)` restricted to the constrained dofs
pub fn reactions(
    system: &GlobalSystem,
    displacements: &DVector<f64>,
    prescribed: &BTreeMap<usize, f64>,
) -> BTreeMap<usize, f64> {
    let internal: DVector<f64> = &system.stiffness * displacements;
    prescribed
        .keys()
        .map(|&dof| (dof, internal[dof] - system.load[dof]))
        .collect()
}
