//! Virtual element for 2D linear elasticity on an arbitrary polygon.
//!
//! The element never evaluates interior shape functions. Its stiffness is the
//! sum of a consistency part, exact for linear displacement fields, and a
//! stabilization part acting only on the non-polynomial remainder.

use nalgebra::{DMatrix, DVector, MatrixXx3, Vector3};

use crate::{
    body_force::BodyForce,
    constraints::ResolvedConstraints,
    datatypes::{PointStore, Polygon},
    dof::{DofMap, DOF},
    error::Result,
    geometry::PolygonGeometry,
    material::Material,
};

/// Rigid-body and constant-strain bases of one polygon together with their
/// dual projection matrices. All four are `2n x 3`.
#[derive(Debug, Clone)]
pub struct ProjectionBasis {
    pub hr: MatrixXx3<f64>,
    pub wr: MatrixXx3<f64>,
    pub hc: MatrixXx3<f64>,
    pub wc: MatrixXx3<f64>,
    pub area: f64,
}

impl ProjectionBasis {
    /// Builds the polynomial bases and their duals
    ///
    /// # Arguments
    /// * `geometry` - A validated counterclockwise polygon
    ///
    /// # Returns
    /// The projection basis of the polygon
    pub fn new(geometry: &PolygonGeometry) -> ProjectionBasis {
        let polygon = geometry.polygon;
        let n = polygon.len();
        let area = geometry.area();
        let average = geometry.average();

        let mut hr = MatrixXx3::zeros(DOF * n);
        let mut wr = MatrixXx3::zeros(DOF * n);
        let mut hc = MatrixXx3::zeros(DOF * n);
        let mut wc = MatrixXx3::zeros(DOF * n);

        for i in 0..n {
            let vertex = geometry.vertex(i);
            let prev = polygon.edge(i + n - 1);
            let next = polygon.edge(i);

            let (prev_nx, prev_ny) = geometry.edge_normal(prev);
            let (next_nx, next_ny) = geometry.edge_normal(next);
            let prev_length = geometry.edge_length(prev);
            let next_length = geometry.edge_length(next);

            let qx = (prev_nx * prev_length + next_nx * next_length) / (4.0 * area);
            let qy = (prev_ny * prev_length + next_ny * next_length) / (4.0 * area);

            let dx = vertex.x - average.x;
            let dy = vertex.y - average.y;

            let (rx, ry) = (DOF * i, DOF * i + 1);

            hr[(rx, 0)] = 1.0;
            hr[(rx, 2)] = dy;
            hr[(ry, 1)] = 1.0;
            hr[(ry, 2)] = -dx;

            wr[(rx, 0)] = 1.0 / n as f64;
            wr[(rx, 2)] = qy;
            wr[(ry, 1)] = 1.0 / n as f64;
            wr[(ry, 2)] = -qx;

            hc[(rx, 0)] = dx;
            hc[(rx, 2)] = dy;
            hc[(ry, 1)] = dy;
            hc[(ry, 2)] = dx;

            wc[(rx, 0)] = 2.0 * qx;
            wc[(rx, 2)] = qy;
            wc[(ry, 1)] = 2.0 * qy;
            wc[(ry, 2)] = qx;
        }

        ProjectionBasis {
            hr,
            wr,
            hc,
            wc,
            area,
        }
    }

    /// Projector `Pp = Hr Wrᵗ + Hc Wcᵗ` onto linear displacement fields
    pub fn projector(&self) -> DMatrix<f64> {
        &self.hr * self.wr.transpose() + &self.hc * self.wc.transpose()
    }
}

/// One polygon's local stiffness, local force and dof map.
#[derive(Debug, Clone)]
pub struct VemElement {
    polygon: Polygon,
    dofs: Vec<usize>,
    k: DMatrix<f64>,
    f: DVector<f64>,
}

impl VemElement {
    /// Creates an element after validating its geometry
    ///
    /// # Arguments
    /// * `id` - Position of the polygon in the mesh
    /// * `polygon` - The element polygon
    /// * `points` - The shared point store
    /// * `dof_map` - The global dof numbering
    pub fn new(
        id: usize,
        polygon: &Polygon,
        points: &PointStore,
        dof_map: &DofMap,
    ) -> Result<VemElement> {
        PolygonGeometry::new(polygon, points).validate(id)?;
        let dofs = dof_map.element_dofs(polygon)?;
        let size = dofs.len();

        Ok(VemElement {
            polygon: polygon.clone(),
            dofs,
            k: DMatrix::zeros(size, size),
            f: DVector::zeros(size),
        })
    }

    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    pub fn dofs(&self) -> &[usize] {
        &self.dofs
    }

    pub fn stiffness(&self) -> &DMatrix<f64> {
        &self.k
    }

    pub fn force(&self) -> &DVector<f64> {
        &self.f
    }

    pub fn geometry<'a>(&'a self, points: &'a PointStore) -> PolygonGeometry<'a> {
        PolygonGeometry::new(&self.polygon, points)
    }

    /// Computes the element stiffness matrix
    ///
    /// `K = A Wc D Wcᵗ + (I - Pp)ᵗ Se (I - Pp)` with `Se = γ αS I` and
    /// `αS = A tr(D) / tr(Hcᵗ Hc)`.
    ///
    /// # Arguments
    /// * `points` - The shared point store
    /// * `material` - The model material
    /// * `gamma` - Stabilization scaling
    pub fn compute_k(&mut self, points: &PointStore, material: &Material, gamma: f64) {
        let geometry = self.geometry(points);
        let basis = ProjectionBasis::new(&geometry);
        let size = self.dofs.len();
        let area = basis.area;

        let d = material.material_matrix();
        let consistency = (&basis.wc * d) * basis.wc.transpose() * area;

        let c = (basis.hc.transpose() * &basis.hc).trace();
        let alpha_s = area * material.trace() / c;
        let se = DMatrix::<f64>::identity(size, size) * (gamma * alpha_s);

        let residual = DMatrix::<f64>::identity(size, size) - basis.projector();
        let stabilization = residual.transpose() * se * &residual;

        let k = consistency + stabilization;
        self.k = (&k + k.transpose()) * 0.5;
    }

    /// Computes the element force vector from the body force and the natural
    /// conditions acting on the element's boundary edges.
    pub fn compute_f(
        &mut self,
        points: &PointStore,
        body_force: &BodyForce,
        constraints: &ResolvedConstraints,
    ) {
        let geometry = self.geometry(points);
        let n = self.polygon.len();
        let mut f = body_force.element_vector(&geometry);

        for i in 0..n {
            let load = constraints.edge_load(points, self.polygon.edge(i));
            let j = (i + 1) % n;

            f[DOF * i] += load[0];
            f[DOF * i + 1] += load[1];
            f[DOF * j] += load[2];
            f[DOF * j + 1] += load[3];
        }

        self.f = f;
    }

    /// Gathers the element's nodal displacements from a global vector
    pub fn local_displacements(&self, global: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(self.dofs.len(), self.dofs.iter().map(|&d| global[d]))
    }

    /// Projected constant strain `[e_xx, e_yy, e_xy]` of the element
    pub fn strain(&self, points: &PointStore, global: &DVector<f64>) -> Vector3<f64> {
        let basis = ProjectionBasis::new(&self.geometry(points));
        basis.wc.transpose() * self.local_displacements(global)
    }

    /// Projected constant stress `[s_xx, s_yy, s_xy]` of the element
    pub fn stress(
        &self,
        points: &PointStore,
        material: &Material,
        global: &DVector<f64>,
    ) -> Vector3<f64> {
        VemElement::stress_from_strain(material, &self.strain(points, global))
    }

    /// Stress `[s_xx, s_yy, s_xy]` of a constant strain `[e_xx, e_yy, e_xy]`
    pub fn stress_from_strain(material: &Material, strain: &Vector3<f64>) -> Vector3<f64> {
        let mut stress = material.material_matrix() * strain;
        // D carries 4G on the shear entry, which yields twice s_xy
        stress[2] *= 0.5;
        stress
    }
}
