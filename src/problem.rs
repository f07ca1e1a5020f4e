use std::collections::BTreeMap;

use log::{debug, info, warn};
use nalgebra::{DVector, Vector3};

use crate::{
    assembler::{assemble_elements, compute_elements, progress_bar, GlobalSystem},
    body_force::BodyForce,
    config::SolverConfig,
    constraints::{ConstraintConflict, ConstraintsContainer, ResolvedConstraints},
    datatypes::Mesh,
    dof::DofMap,
    element::VemElement,
    error::{Result, VemError},
    material::Material,
    solver,
};

/// Material, loading and boundary data of a problem.
#[derive(Debug, Clone)]
pub struct Conditions {
    pub material: Material,
    pub body_force: BodyForce,
    pub constraints: ConstraintsContainer,
}

impl Conditions {
    pub fn new(material: Material) -> Conditions {
        Conditions {
            material,
            body_force: BodyForce::none(),
            constraints: ConstraintsContainer::new(),
        }
    }

    pub fn with_body_force(mut self, body_force: BodyForce) -> Conditions {
        self.body_force = body_force;
        self
    }

    pub fn with_constraints(mut self, constraints: ConstraintsContainer) -> Conditions {
        self.constraints = constraints;
        self
    }
}

/// Result of a solved problem.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Displacement per global dof
    pub displacements: DVector<f64>,
    /// Reaction force per constrained dof
    pub reactions: BTreeMap<usize, f64>,
    pub conflicts: Vec<ConstraintConflict>,
}

impl Solution {
    /// `(ux, uy)` of one point
    pub fn point_displacement(&self, point: usize) -> (f64, f64) {
        (
            self.displacements[2 * point],
            self.displacements[2 * point + 1],
        )
    }
}

/// Projected strain and stress of one element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementStress {
    /// `[e_xx, e_yy, e_xy]`
    pub strain: Vector3<f64>,
    /// `[s_xx, s_yy, s_xy]`
    pub stress: Vector3<f64>,
}

impl ElementStress {
    /// In-plane von Mises magnitude of the stress
    pub fn von_mises(&self) -> f64 {
        let (sxx, syy, sxy) = (self.stress[0], self.stress[1], self.stress[2]);
        f64::sqrt(sxx * sxx - sxx * syy + syy * syy + 3.0 * sxy * sxy)
    }
}

/// A linear elasticity problem on a polygonal mesh.
pub struct Problem {
    mesh: Mesh,
    conditions: Conditions,
    config: SolverConfig,
    dof_map: DofMap,
    elements: Vec<VemElement>,
    constraints: ResolvedConstraints,
    system: Option<GlobalSystem>,
}

impl Problem {
    /// Builds a problem, validating every polygon and resolving the
    /// constraints against the mesh
    ///
    /// # Arguments
    /// * `mesh` - The polygon mesh
    /// * `conditions` - Material, body force and constraints
    /// * `config` - Solver settings
    ///
    /// # Returns
    /// The problem, ready to assemble
    pub fn new(mesh: Mesh, conditions: Conditions, config: SolverConfig) -> Result<Problem> {
        mesh.validate_indices()?;
        let dof_map = DofMap::new(mesh.points.len());

        let elements = mesh
            .polygons
            .iter()
            .enumerate()
            .map(|(id, polygon)| VemElement::new(id, polygon, &mesh.points, &dof_map))
            .collect::<Result<Vec<VemElement>>>()?;

        let constraints = conditions.constraints.resolve(&mesh)?;
        if let Some(&conflict) = constraints.conflicts.first() {
            if config.strict_constraints {
                return Err(conflict.into());
            }
            warn!(
                "{} essential constraint conflicts resolved by precedence",
                constraints.conflicts.len()
            );
        }

        info!(
            "built problem with {} elements, {} points and {} dofs",
            elements.len(),
            mesh.points.len(),
            dof_map.total_dofs()
        );

        Ok(Problem {
            mesh,
            conditions,
            config,
            dof_map,
            elements,
            constraints,
            system: None,
        })
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn dof_map(&self) -> &DofMap {
        &self.dof_map
    }

    pub fn elements(&self) -> &[VemElement] {
        &self.elements
    }

    pub fn constraints(&self) -> &ResolvedConstraints {
        &self.constraints
    }

    /// Computes every element and assembles the global system
    pub fn assemble(&mut self) -> Result<&GlobalSystem> {
        let system = self.build_system()?;
        Ok(self.system.insert(system))
    }

    fn build_system(&mut self) -> Result<GlobalSystem> {
        let start = std::time::Instant::now();

        let bar = progress_bar(self.elements.len() as u64, self.config.progress);
        compute_elements(
            &mut self.elements,
            &self.mesh.points,
            &self.conditions,
            &self.constraints,
            &self.config,
            &bar,
        );
        bar.finish_and_clear();
        debug!("computed {} element matrices", self.elements.len());

        let system = assemble_elements(&self.elements, &self.dof_map, &self.constraints.nodal_loads)?;

        let elapsed = (std::time::Instant::now() - start).as_secs_f32();
        info!("assembled system in {:.3} seconds", elapsed);

        Ok(system)
    }

    /// Assembles the system if needed and solves it
    ///
    /// # Returns
    /// Displacements, reactions at the constrained dofs and the constraint
    /// conflicts found while resolving
    pub fn simulate(&mut self) -> Result<Solution> {
        let system = match self.system.take() {
            Some(system) => system,
            None => self.build_system()?,
        };

        let result = solver::solve(&system, &self.constraints.prescribed, &self.config);
        let solution = result.map(|displacements| {
            let reactions = solver::reactions(&system, &displacements, &self.constraints.prescribed);
            Solution {
                displacements,
                reactions,
                conflicts: self.constraints.conflicts.clone(),
            }
        });
        self.system = Some(system);

        solution
    }

    /// Recovers the projected strain and stress of every element
    pub fn element_stresses(&self, solution: &Solution) -> Result<Vec<ElementStress>> {
        if solution.displacements.len() != self.dof_map.total_dofs() {
            return Err(VemError::Input(format!(
                "solution has {} dofs but the problem has {}",
                solution.displacements.len(),
                self.dof_map.total_dofs()
            )));
        }

        let points = &self.mesh.points;
        let material = &self.conditions.material;
        Ok(self
            .elements
            .iter()
            .map(|element| {
                let strain = element.strain(points, &solution.displacements);
                ElementStress {
                    strain,
                    stress: VemElement::stress_from_strain(material, &strain),
                }
            })
            .collect())
    }
}
