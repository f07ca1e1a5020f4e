use nalgebra::DVector;

use crate::{
    datatypes::{Mesh, PointStore},
    dof::DOF,
    geometry::PolygonGeometry,
};

/// Error of a discrete displacement field against an exact one.
///
/// When the exact field vanishes the absolute error is returned instead of
/// the relative one.
pub struct DisplacementNorm<F>
where
    F: Fn(f64, f64) -> (f64, f64),
{
    exact: F,
}

impl<F> DisplacementNorm<F>
where
    F: Fn(f64, f64) -> (f64, f64),
{
    pub fn new(exact: F) -> DisplacementNorm<F> {
        DisplacementNorm { exact }
    }

    /// Relative L2 error with vertex quadrature: every vertex of a polygon
    /// carries the weight `A / n`.
    ///
    /// # Arguments
    /// * `mesh` - The mesh the field lives on
    /// * `displacements` - Displacement per global dof
    pub fn relative_l2(&self, mesh: &Mesh, displacements: &DVector<f64>) -> f64 {
        let mut error = 0.0;
        let mut reference = 0.0;

        for polygon in &mesh.polygons {
            let geometry = PolygonGeometry::new(polygon, &mesh.points);
            let weight = geometry.area() / polygon.len() as f64;

            for &vertex in &polygon.vertices {
                let (e, r) = self.squared_terms(&mesh.points, displacements, vertex);
                error += weight * e;
                reference += weight * r;
            }
        }

        ratio(error, reference)
    }

    /// Discrete relative L2 error over the points, unweighted
    pub fn nodal_relative_error(&self, points: &PointStore, displacements: &DVector<f64>) -> f64 {
        let (error, reference) = (0..points.len())
            .map(|p| self.squared_terms(points, displacements, p))
            .fold((0.0, 0.0), |(e, r), (de, dr)| (e + de, r + dr));

        ratio(error, reference)
    }

    fn squared_terms(
        &self,
        points: &PointStore,
        displacements: &DVector<f64>,
        point: usize,
    ) -> (f64, f64) {
        let p = &points[point];
        let (ux, uy) = (self.exact)(p.x, p.y);
        let dx = displacements[DOF * point] - ux;
        let dy = displacements[DOF * point + 1] - uy;
        (dx * dx + dy * dy, ux * ux + uy * uy)
    }
}

fn ratio(error: f64, reference: f64) -> f64 {
    if reference > 0.0 {
        f64::sqrt(error / reference)
    } else {
        f64::sqrt(error)
    }
}
