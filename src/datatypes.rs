use std::collections::HashMap;

use crate::error::{Result, VemError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        f64::sqrt(f64::powi(self.x - other.x, 2) + f64::powi(self.y - other.y, 2))
    }

    /// Bit pattern used for exact-equality deduplication. Negative zero is
    /// folded onto positive zero.
    fn key(&self) -> (u64, u64) {
        let norm = |v: f64| if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() };
        (norm(self.x), norm(self.y))
    }
}

/// Append-only arena of deduplicated points.
///
/// The index returned by [`PointStore::insert`] is stable for the lifetime of
/// the store and defines dof numbering: point `k` owns dofs `2k` and `2k + 1`.
#[derive(Debug, Clone, Default)]
pub struct PointStore {
    points: Vec<Point>,
    lookup: HashMap<(u64, u64), usize>,
}

impl PointStore {
    pub fn new() -> PointStore {
        PointStore::default()
    }

    /// Inserts a point, returning the index of the existing entry if an
    /// identical point is already stored.
    pub fn insert(&mut self, point: Point) -> usize {
        let key = point.key();
        if let Some(&index) = self.lookup.get(&key) {
            return index;
        }
        let index = self.points.len();
        self.points.push(point);
        self.lookup.insert(key, index);
        index
    }

    pub fn get(&self, index: usize) -> Option<&Point> {
        self.points.get(index)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    pub fn as_slice(&self) -> &[Point] {
        &self.points
    }
}

impl std::ops::Index<usize> for PointStore {
    type Output = Point;

    fn index(&self, index: usize) -> &Point {
        &self.points[index]
    }
}

impl FromIterator<Point> for PointStore {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        let mut store = PointStore::new();
        for point in iter {
            store.insert(point);
        }
        store
    }
}

/// Directed edge between two point indices, tail to head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub tail: usize,
    pub head: usize,
}

impl Edge {
    pub fn new(tail: usize, head: usize) -> Edge {
        Edge { tail, head }
    }

    /// Orientation-independent key, used to match the two sides of a shared
    /// edge.
    pub fn key(&self) -> (usize, usize) {
        if self.tail <= self.head {
            (self.tail, self.head)
        } else {
            (self.head, self.tail)
        }
    }
}

/// Counterclockwise polygon given by indices into a [`PointStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polygon {
    pub vertices: Vec<usize>,
}

impl Polygon {
    pub fn new(vertices: Vec<usize>) -> Polygon {
        Polygon { vertices }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Edge `i` runs from vertex `i` to vertex `(i + 1) mod n`.
    pub fn edge(&self, i: usize) -> Edge {
        let n = self.vertices.len();
        Edge::new(self.vertices[i % n], self.vertices[(i + 1) % n])
    }

    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        (0..self.vertices.len()).map(move |i| self.edge(i))
    }
}

/// Straight boundary segment used as a constraint locus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub const TOLERANCE: f64 = 1e-9;

    pub fn new(start: Point, end: Point) -> Segment {
        Segment { start, end }
    }

    pub fn length(&self) -> f64 {
        self.start.distance(&self.end)
    }

    /// Whether `p` lies on the segment, endpoints included. The tolerance is
    /// relative to the segment length.
    pub fn contains(&self, p: &Point) -> bool {
        let length = self.length();
        let tol = Segment::TOLERANCE * length.max(1.0);

        if length == 0.0 {
            return self.start.distance(p) <= tol;
        }

        let (dx, dy) = (self.end.x - self.start.x, self.end.y - self.start.y);
        let cross = dx * (p.y - self.start.y) - dy * (p.x - self.start.x);
        if (cross / length).abs() > tol {
            return false;
        }

        let along = (dx * (p.x - self.start.x) + dy * (p.y - self.start.y)) / length;
        along >= -tol && along <= length + tol
    }
}

/// Polygonal mesh: the shared point store plus the ordered polygon list.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub points: PointStore,
    pub polygons: Vec<Polygon>,
}

impl Mesh {
    pub fn new(points: PointStore, polygons: Vec<Polygon>) -> Mesh {
        Mesh { points, polygons }
    }

    /// Checks that every polygon only references stored points.
    pub fn validate_indices(&self) -> Result<()> {
        for (id, polygon) in self.polygons.iter().enumerate() {
            if let Some(bad) = polygon
                .vertices
                .iter()
                .find(|&&v| v >= self.points.len())
            {
                return Err(VemError::Geometry {
                    polygon: id,
                    reason: format!(
                        "vertex index {bad} outside point store of {} points",
                        self.points.len()
                    ),
                });
            }
        }
        Ok(())
    }

    /// Edges that belong to exactly one polygon, keyed orientation-free.
    pub fn boundary_edges(&self) -> HashMap<(usize, usize), Edge> {
        let mut counts: HashMap<(usize, usize), (usize, Edge)> = HashMap::new();
        for polygon in &self.polygons {
            for edge in polygon.edges() {
                counts
                    .entry(edge.key())
                    .and_modify(|(count, _)| *count += 1)
                    .or_insert((1, edge));
            }
        }

        counts
            .into_iter()
            .filter(|(_, (count, _))| *count == 1)
            .map(|(key, (_, edge))| (key, edge))
            .collect()
    }

    /// Indices of points that lie on at least one boundary edge, ascending.
    pub fn boundary_points(&self) -> Vec<usize> {
        let mut points: Vec<usize> = self
            .boundary_edges()
            .values()
            .flat_map(|e| [e.tail, e.head])
            .collect();
        points.sort_unstable();
        points.dedup();
        points
    }

    /// Indices of stored points lying on `segment`, ascending.
    pub fn points_on(&self, segment: &Segment) -> Vec<usize> {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, p)| segment.contains(p))
            .map(|(i, _)| i)
            .collect()
    }
}
