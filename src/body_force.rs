use nalgebra::DVector;

use crate::{constraints::Value, dof::DOF, geometry::PolygonGeometry};

/// Volumetric load per unit area, one value source per component.
#[derive(Debug, Clone)]
pub struct BodyForce {
    pub x: Value,
    pub y: Value,
}

impl Default for BodyForce {
    fn default() -> Self {
        BodyForce::none()
    }
}

impl BodyForce {
    pub fn new(x: Value, y: Value) -> BodyForce {
        BodyForce { x, y }
    }

    pub fn none() -> BodyForce {
        BodyForce::constant(0.0, 0.0)
    }

    pub fn constant(x: f64, y: f64) -> BodyForce {
        BodyForce::new(Value::Constant(x), Value::Constant(y))
    }

    pub fn is_zero(&self) -> bool {
        matches!(
            (&self.x, &self.y),
            (Value::Constant(x), Value::Constant(y)) if *x == 0.0 && *y == 0.0
        )
    }

    /// Lumps the body force of one polygon onto its vertices: the field is
    /// sampled at the centroid and `area / n` of it goes to every vertex.
    pub fn element_vector(&self, geometry: &PolygonGeometry) -> DVector<f64> {
        let n = geometry.polygon.len();
        let mut result = DVector::zeros(DOF * n);
        if self.is_zero() {
            return result;
        }

        let centroid = geometry.centroid();
        let share = geometry.area() / n as f64;
        let (bx, by) = (self.x.at(&centroid), self.y.at(&centroid));

        for i in 0..n {
            result[DOF * i] = share * bx;
            result[DOF * i + 1] = share * by;
        }

        result
    }
}
