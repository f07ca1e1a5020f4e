use crate::{
    datatypes::{Edge, Point, PointStore, Polygon},
    error::{Result, VemError},
};

/// Read-only view of one polygon over the shared point store.
#[derive(Debug, Clone, Copy)]
pub struct PolygonGeometry<'a> {
    pub polygon: &'a Polygon,
    pub points: &'a PointStore,
}

impl<'a> PolygonGeometry<'a> {
    pub fn new(polygon: &'a Polygon, points: &'a PointStore) -> PolygonGeometry<'a> {
        PolygonGeometry { polygon, points }
    }

    pub fn vertex(&self, local: usize) -> &'a Point {
        &self.points[self.polygon.vertices[local]]
    }

    /// Calculates the signed area with the shoelace formula
    ///
    /// # Returns
    /// The area of the polygon; positive when the vertices are counterclockwise
    pub fn area(&self) -> f64 {
        let n = self.polygon.len();
        let mut twice_area = 0.0;
        for i in 0..n {
            let p = self.vertex(i);
            let q = self.vertex((i + 1) % n);
            twice_area += p.x * q.y - q.x * p.y;
        }
        0.5 * twice_area
    }

    /// Area-weighted centroid of the polygon.
    pub fn centroid(&self) -> Point {
        let n = self.polygon.len();
        let area = self.area();
        let (mut cx, mut cy) = (0.0, 0.0);
        for i in 0..n {
            let p = self.vertex(i);
            let q = self.vertex((i + 1) % n);
            let cross = p.x * q.y - q.x * p.y;
            cx += (p.x + q.x) * cross;
            cy += (p.y + q.y) * cross;
        }
        Point::new(cx / (6.0 * area), cy / (6.0 * area))
    }

    /// Arithmetic mean of the vertices
    pub fn average(&self) -> Point {
        let n = self.polygon.len() as f64;
        let (sx, sy) = (0..self.polygon.len())
            .map(|i| self.vertex(i))
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / n, sy / n)
    }

    pub fn edge_length(&self, edge: Edge) -> f64 {
        self.points[edge.tail].distance(&self.points[edge.head])
    }

    pub fn edge_midpoint(&self, edge: Edge) -> Point {
        let (a, b) = (&self.points[edge.tail], &self.points[edge.head]);
        Point::new(0.5 * (a.x + b.x), 0.5 * (a.y + b.y))
    }

    /// Outward unit normal of a counterclockwise edge: the edge direction
    /// rotated by -90 degrees, divided by the edge length.
    pub fn edge_normal(&self, edge: Edge) -> (f64, f64) {
        let (a, b) = (&self.points[edge.tail], &self.points[edge.head]);
        let length = self.edge_length(edge);
        ((b.y - a.y) / length, -(b.x - a.x) / length)
    }

    /// Rejects polygons the element engine cannot integrate over
    ///
    /// # Arguments
    /// * `id` - Position of the polygon in the mesh, used in the error
    pub fn validate(&self, id: usize) -> Result<()> {
        let geometry_error = |reason: String| VemError::Geometry {
            polygon: id,
            reason,
        };

        if self.polygon.len() < 3 {
            return Err(geometry_error(format!(
                "polygon has {} vertices, at least 3 required",
                self.polygon.len()
            )));
        }
        if let Some(bad) = self
            .polygon
            .vertices
            .iter()
            .find(|&&v| v >= self.points.len())
        {
            return Err(geometry_error(format!("vertex index {bad} is not a known point")));
        }
        for edge in self.polygon.edges() {
            if self.edge_length(edge) == 0.0 {
                return Err(geometry_error(format!(
                    "zero-length edge between points {} and {}",
                    edge.tail, edge.head
                )));
            }
        }

        let area = self.area();
        if !(area > 0.0) {
            return Err(geometry_error(format!(
                "non-positive area {area:e}; polygon is degenerate or clockwise"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn store(coords: &[(f64, f64)]) -> PointStore {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn unit_square_properties() {
        let points = store(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        let polygon = Polygon::new(vec![0, 1, 2, 3]);
        let geom = PolygonGeometry::new(&polygon, &points);

        assert_relative_eq!(geom.area(), 1.0);
        let c = geom.centroid();
        assert_relative_eq!(c.x, 0.5);
        assert_relative_eq!(c.y, 0.5);

        let bottom = polygon.edge(0);
        assert_relative_eq!(geom.edge_length(bottom), 1.0);
        let (nx, ny) = geom.edge_normal(bottom);
        assert_relative_eq!(nx, 0.0);
        assert_relative_eq!(ny, -1.0);
        let right = polygon.edge(1);
        let (nx, ny) = geom.edge_normal(right);
        assert_relative_eq!(nx, 1.0);
        assert_relative_eq!(ny, 0.0);
        let m = geom.edge_midpoint(right);
        assert_relative_eq!(m.y, 0.5);
    }

    #[test]
    fn centroid_differs_from_vertex_average() {
        // trapezoid with a collinear extra vertex on the bottom edge
        let points = store(&[(0.0, 0.0), (1.0, 0.0), (4.0, 0.0), (3.0, 1.0), (0.0, 1.0)]);
        let polygon = Polygon::new(vec![0, 1, 2, 3, 4]);
        let geom = PolygonGeometry::new(&polygon, &points);

        assert_relative_eq!(geom.area(), 3.5);
        let avg = geom.average();
        assert_relative_eq!(avg.x, 1.6);
        let c = geom.centroid();
        // rectangle [0,3]x[0,1] plus triangle (3,0) (4,0) (3,1)
        assert_relative_eq!(c.x, (3.0 * 1.5 + 0.5 * 10.0 / 3.0) / 3.5, epsilon = 1e-12);
        assert_relative_eq!(c.y, (3.0 * 0.5 + 0.5 / 3.0) / 3.5, epsilon = 1e-12);
    }

    #[test]
    fn clockwise_polygon_is_rejected() {
        let points = store(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        let polygon = Polygon::new(vec![0, 3, 2, 1]);
        let geom = PolygonGeometry::new(&polygon, &points);
        assert!(geom.area() < 0.0);
        assert!(matches!(geom.validate(4), Err(VemError::Geometry { polygon: 4, .. })));
    }

    #[test]
    fn collapsed_polygon_is_rejected() {
        let points = store(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        let polygon = Polygon::new(vec![0, 1, 2]);
        assert!(PolygonGeometry::new(&polygon, &points).validate(0).is_err());

        let polygon = Polygon::new(vec![0, 1, 1]);
        assert!(PolygonGeometry::new(&polygon, &points).validate(0).is_err());

        let polygon = Polygon::new(vec![0, 1]);
        assert!(PolygonGeometry::new(&polygon, &points).validate(0).is_err());
    }
}
