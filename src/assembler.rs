use indicatif::ProgressBar;
use log::info;
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use rayon::prelude::*;

use crate::{
    config::SolverConfig,
    constraints::ResolvedConstraints,
    datatypes::PointStore,
    dof::DofMap,
    element::VemElement,
    error::{Result, VemError},
    problem::Conditions,
};

/// Assembled, unconstrained global system `K u = f`.
#[derive(Debug, Clone)]
pub struct GlobalSystem {
    pub stiffness: CscMatrix<f64>,
    pub load: DVector<f64>,
}

impl GlobalSystem {
    pub fn num_dofs(&self) -> usize {
        self.load.len()
    }
}

/// Creates a progress bar that stays hidden unless requested
pub(crate) fn progress_bar(len: u64, visible: bool) -> ProgressBar {
    if visible {
        ProgressBar::new(len)
    } else {
        ProgressBar::hidden()
    }
}

/// Computes the stiffness matrix and force vector of every element
///
/// Elements only read shared data, so with `config.parallel` set each one is
/// computed on the rayon pool into its own buffers.
///
/// # Arguments
/// * `elements` - The elements of the problem
/// * `points` - The shared point store
/// * `conditions` - Material and body force of the problem
/// * `constraints` - The resolved constraints
/// * `config` - Stabilization and parallelism settings
/// * `bar` - Progress bar advanced once per element
pub fn compute_elements(
    elements: &mut [VemElement],
    points: &PointStore,
    conditions: &Conditions,
    constraints: &ResolvedConstraints,
    config: &SolverConfig,
    bar: &ProgressBar,
) {
    let compute = |element: &mut VemElement| {
        element.compute_k(points, &conditions.material, config.gamma);
        element.compute_f(points, &conditions.body_force, constraints);
        bar.inc(1);
    };

    if config.parallel {
        elements.par_iter_mut().for_each(compute);
    } else {
        elements.iter_mut().for_each(compute);
    }
}

/// Compiles element matrices into the global stiffness matrix and load vector
///
/// Contributions are scattered in slice order, so a fixed element order
/// gives bit-identical results.
///
/// # Arguments
/// * `elements` - Elements with computed stiffness and force
/// * `dof_map` - The global dof numbering
/// * `nodal_loads` - Concentrated loads as `(dof, value)`
///
/// # Returns
/// The unconstrained global system
pub fn assemble_elements(
    elements: &[VemElement],
    dof_map: &DofMap,
    nodal_loads: &[(usize, f64)],
) -> Result<GlobalSystem> {
    let n_dofs = dof_map.total_dofs();
    let mut coo = CooMatrix::new(n_dofs, n_dofs);
    let mut load = DVector::zeros(n_dofs);

    for (id, element) in elements.iter().enumerate() {
        let dofs = element.dofs();
        if let Some(bad) = dofs.iter().find(|&&d| d >= n_dofs) {
            return Err(VemError::Assembly(format!(
                "element {id} maps to dof {bad} outside the {n_dofs} global dofs"
            )));
        }

        let k = element.stiffness();
        let f = element.force();

        for (local_row, &global_row) in dofs.iter().enumerate() {
            for (local_col, &global_col) in dofs.iter().enumerate() {
                coo.push(global_row, global_col, k[(local_row, local_col)]);
            }
            load[global_row] += f[local_row];
        }
    }

    for &(dof, value) in nodal_loads {
        if dof >= n_dofs {
            return Err(VemError::Assembly(format!(
                "nodal load on dof {dof} outside the {n_dofs} global dofs"
            )));
        }
        load[dof] += value;
    }

    let stiffness = CscMatrix::from(&coo);
    info!(
        "assembled {} elements into {n_dofs} dofs ({} stored entries)",
        elements.len(),
        stiffness.nnz()
    );

    Ok(GlobalSystem { stiffness, load })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        body_force::BodyForce,
        constraints::{Constraint, ConstraintsContainer, Direction, Value},
        datatypes::{Mesh, Point, Polygon, Segment},
        material::Material,
    };
    use nalgebra::DMatrix;

    /// Two quads and a triangle sharing edges
    fn mesh() -> Mesh {
        let points: PointStore = [
            (0.0, 0.0),
            (1.0, 0.0),
            (2.0, 0.0),
            (0.0, 1.0),
            (1.2, 1.1),
            (2.0, 1.0),
            (1.0, 2.0),
        ]
        .iter()
        .map(|&(x, y)| Point::new(x, y))
        .collect();
        Mesh::new(
            points,
            vec![
                Polygon::new(vec![0, 1, 4, 3]),
                Polygon::new(vec![1, 2, 5, 4]),
                Polygon::new(vec![3, 4, 5, 6]),
            ],
        )
    }

    fn computed_elements(mesh: &Mesh, parallel: bool) -> (Vec<VemElement>, ResolvedConstraints) {
        let dof_map = DofMap::new(mesh.points.len());
        let mut container = ConstraintsContainer::new();
        container.add_natural(Constraint::on_segment(
            Segment::new(Point::new(2.0, 0.0), Point::new(2.0, 1.0)),
            Direction::Total,
            Value::function(|_, y| 1.0 + y),
        ));
        let resolved = container.resolve(mesh).unwrap();

        let mut elements: Vec<VemElement> = mesh
            .polygons
            .iter()
            .enumerate()
            .map(|(id, p)| VemElement::new(id, p, &mesh.points, &dof_map).unwrap())
            .collect();
        let conditions = Conditions::new(Material::plane_stress(100.0, 0.25).unwrap())
            .with_body_force(BodyForce::constant(0.0, -1.0));
        let config = SolverConfig {
            parallel,
            ..SolverConfig::default()
        };
        compute_elements(
            &mut elements,
            &mesh.points,
            &conditions,
            &resolved,
            &config,
            &ProgressBar::hidden(),
        );
        (elements, resolved)
    }

    #[test]
    fn global_stiffness_is_symmetric() {
        let mesh = mesh();
        let (elements, resolved) = computed_elements(&mesh, true);
        let system =
            assemble_elements(&elements, &DofMap::new(7), &resolved.nodal_loads).unwrap();
        let k = DMatrix::from(&system.stiffness);

        assert_eq!(k.nrows(), 14);
        for i in 0..14 {
            for j in 0..14 {
                assert_eq!(k[(i, j)], k[(j, i)]);
            }
        }
    }

    #[test]
    fn element_order_does_not_change_the_system() {
        let mesh = mesh();
        let (elements, _) = computed_elements(&mesh, false);
        let dof_map = DofMap::new(7);
        let loads = vec![(3, 2.0), (13, -1.0)];

        let forward = assemble_elements(&elements, &dof_map, &loads).unwrap();
        let mut reversed_elements = elements.clone();
        reversed_elements.reverse();
        let reversed = assemble_elements(&reversed_elements, &dof_map, &loads).unwrap();

        let k_forward = DMatrix::from(&forward.stiffness);
        let k_reversed = DMatrix::from(&reversed.stiffness);
        let scale = k_forward.amax();
        assert!((k_forward - k_reversed).amax() <= 1e-14 * scale);
        assert!((&forward.load - &reversed.load).amax() <= 1e-14);
    }

    #[test]
    fn parallel_and_serial_computation_agree() {
        let mesh = mesh();
        let (parallel, _) = computed_elements(&mesh, true);
        let (serial, _) = computed_elements(&mesh, false);
        for (a, b) in parallel.iter().zip(&serial) {
            assert_eq!(a.stiffness(), b.stiffness());
            assert_eq!(a.force(), b.force());
        }
    }

    #[test]
    fn loads_sum_to_applied_resultant() {
        let mesh = mesh();
        let (elements, resolved) = computed_elements(&mesh, true);
        let system =
            assemble_elements(&elements, &DofMap::new(7), &resolved.nodal_loads).unwrap();

        let fx: f64 = (0..7).map(|p| system.load[2 * p]).sum();
        let fy: f64 = (0..7).map(|p| system.load[2 * p + 1]).sum();
        // traction 1 + y over the right edge integrates to 1.5 in both
        // directions, the body force to minus the mesh area
        let area = 1.15 + 0.95 + 0.9;
        assert!((fx - 1.5).abs() < 1e-12);
        assert!((fy - (1.5 - area)).abs() < 1e-12, "fy = {fy}, area = {area}");
    }

    #[test]
    fn out_of_range_nodal_load_is_rejected() {
        let mesh = mesh();
        let (elements, _) = computed_elements(&mesh, false);
        assert!(matches!(
            assemble_elements(&elements, &DofMap::new(7), &[(14, 1.0)]),
            Err(VemError::Assembly(_))
        ));
    }
}
