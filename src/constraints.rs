//! Essential and natural boundary conditions.
//!
//! Constraints are registered against geometric loci (a point, a set of
//! points or a boundary segment) and resolved once against a concrete mesh:
//! essential constraints become prescribed dof values, natural constraints
//! become per-edge traction integrals and concentrated nodal loads.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use log::{debug, warn};

use crate::{
    datatypes::{Edge, Mesh, Point, PointStore, Segment},
    dof::DOF,
    error::{Result, VemError},
};

/// Displacement or load component(s) targeted by a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Horizontal,
    Vertical,
    Total,
}

impl Direction {
    /// Local component offsets (0 = x, 1 = y) affected by this direction
    pub fn components(self) -> &'static [usize] {
        match self {
            Direction::Horizontal => &[0],
            Direction::Vertical => &[1],
            Direction::Total => &[0, 1],
        }
    }

    fn rank(self) -> u8 {
        match self {
            Direction::Total => 1,
            Direction::Horizontal | Direction::Vertical => 0,
        }
    }
}

/// Source of a prescribed value.
#[derive(Clone)]
pub enum Value {
    Constant(f64),
    Function(Arc<dyn Fn(f64, f64) -> f64 + Send + Sync>),
}

impl Value {
    pub fn function<F>(f: F) -> Value
    where
        F: Fn(f64, f64) -> f64 + Send + Sync + 'static,
    {
        Value::Function(Arc::new(f))
    }

    pub fn at(&self, p: &Point) -> f64 {
        match self {
            Value::Constant(v) => *v,
            Value::Function(f) => f(p.x, p.y),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Constant(v) => write!(f, "Constant({v})"),
            Value::Function(_) => write!(f, "Function(..)"),
        }
    }
}

/// Where a constraint applies.
#[derive(Debug, Clone)]
pub enum Locus {
    Point(usize),
    Points(Vec<usize>),
    Segment(Segment),
}

#[derive(Debug, Clone)]
pub struct Constraint {
    pub locus: Locus,
    pub direction: Direction,
    pub value: Value,
}

impl Constraint {
    pub fn new(locus: Locus, direction: Direction, value: Value) -> Constraint {
        Constraint {
            locus,
            direction,
            value,
        }
    }

    pub fn at_point(point: usize, direction: Direction, value: Value) -> Constraint {
        Constraint::new(Locus::Point(point), direction, value)
    }

    pub fn on_points(points: Vec<usize>, direction: Direction, value: Value) -> Constraint {
        Constraint::new(Locus::Points(points), direction, value)
    }

    pub fn on_segment(segment: Segment, direction: Direction, value: Value) -> Constraint {
        Constraint::new(Locus::Segment(segment), direction, value)
    }

    /// Resolves a point-based locus into point indices, checking them against
    /// the store. Segment loci yield every stored point on the segment.
    fn resolve_points(&self, mesh: &Mesh) -> Result<Vec<usize>> {
        let indices = match &self.locus {
            Locus::Point(p) => vec![*p],
            Locus::Points(ps) => ps.clone(),
            Locus::Segment(segment) => mesh.points_on(segment),
        };

        if let Some(bad) = indices.iter().find(|&&p| p >= mesh.points.len()) {
            return Err(VemError::Assembly(format!(
                "constraint references point {bad} but the mesh has {} points",
                mesh.points.len()
            )));
        }

        Ok(indices)
    }
}

/// Two essential constraints disagreeing on the value of one dof.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintConflict {
    pub dof: usize,
    pub kept: f64,
    pub discarded: f64,
    /// Registration index of the winning essential constraint
    pub kept_constraint: usize,
    pub discarded_constraint: usize,
}

impl From<ConstraintConflict> for VemError {
    fn from(c: ConstraintConflict) -> Self {
        VemError::ConstraintConflict {
            dof: c.dof,
            kept: c.kept,
            discarded: c.discarded,
        }
    }
}

/// Aggregates essential and natural constraints in registration order.
#[derive(Debug, Clone, Default)]
pub struct ConstraintsContainer {
    essential: Vec<Constraint>,
    natural: Vec<Constraint>,
}

impl ConstraintsContainer {
    pub fn new() -> ConstraintsContainer {
        ConstraintsContainer::default()
    }

    pub fn add_essential(&mut self, constraint: Constraint) -> &mut Self {
        self.essential.push(constraint);
        self
    }

    pub fn add_natural(&mut self, constraint: Constraint) -> &mut Self {
        self.natural.push(constraint);
        self
    }

    pub fn essential(&self) -> &[Constraint] {
        &self.essential
    }

    pub fn natural(&self) -> &[Constraint] {
        &self.natural
    }

    /// Resolves every constraint against the mesh
    ///
    /// Essential precedence on a shared dof: a `Total` constraint beats a
    /// `Horizontal`/`Vertical` one, and among equals the last registered
    /// wins. Disagreeing values are reported in `conflicts`.
    ///
    /// # Arguments
    /// * `mesh` - The mesh whose points and boundary edges are targeted
    ///
    /// # Returns
    /// The resolved constraint set
    pub fn resolve(&self, mesh: &Mesh) -> Result<ResolvedConstraints> {
        let mut prescribed: BTreeMap<usize, (f64, u8, usize)> = BTreeMap::new();
        let mut conflicts: Vec<ConstraintConflict> = Vec::new();

        for (id, constraint) in self.essential.iter().enumerate() {
            let points = constraint.resolve_points(mesh)?;
            if points.is_empty() {
                warn!("essential constraint {id} does not touch any mesh point");
            }

            let rank = constraint.direction.rank();
            for p in points {
                let value = constraint.value.at(&mesh.points[p]);

                for &component in constraint.direction.components() {
                    let dof = DOF * p + component;

                    let Some(&(existing, existing_rank, existing_id)) = prescribed.get(&dof)
                    else {
                        prescribed.insert(dof, (value, rank, id));
                        continue;
                    };

                    let replace = rank >= existing_rank;
                    if replace {
                        prescribed.insert(dof, (value, rank, id));
                    }

                    if !values_agree(existing, value) {
                        let conflict = if replace {
                            ConstraintConflict {
                                dof,
                                kept: value,
                                discarded: existing,
                                kept_constraint: id,
                                discarded_constraint: existing_id,
                            }
                        } else {
                            ConstraintConflict {
                                dof,
                                kept: existing,
                                discarded: value,
                                kept_constraint: existing_id,
                                discarded_constraint: id,
                            }
                        };
                        warn!(
                            "dof {dof} prescribed by constraints {} and {}; keeping {} (from {})",
                            existing_id, id, conflict.kept, conflict.kept_constraint
                        );
                        conflicts.push(conflict);
                    }
                }
            }
        }

        let mut natural_edges: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        let mut nodal_loads: BTreeMap<usize, f64> = BTreeMap::new();
        let boundary = mesh.boundary_edges();

        for (id, constraint) in self.natural.iter().enumerate() {
            match &constraint.locus {
                Locus::Segment(segment) => {
                    let mut touched = 0;
                    for (key, edge) in &boundary {
                        if segment.contains(&mesh.points[edge.tail])
                            && segment.contains(&mesh.points[edge.head])
                        {
                            natural_edges.entry(*key).or_default().push(id);
                            touched += 1;
                        }
                    }
                    if touched == 0 {
                        warn!("natural constraint {id} does not cover any boundary edge");
                    }
                }
                Locus::Point(_) | Locus::Points(_) => {
                    for p in constraint.resolve_points(mesh)? {
                        let value = constraint.value.at(&mesh.points[p]);
                        for &component in constraint.direction.components() {
                            *nodal_loads.entry(DOF * p + component).or_insert(0.0) += value;
                        }
                    }
                }
            }
        }

        // keep edge constraint lists in registration order regardless of
        // hash iteration order
        for ids in natural_edges.values_mut() {
            ids.sort_unstable();
        }

        debug!(
            "resolved {} prescribed dofs, {} loaded edges, {} nodal loads",
            prescribed.len(),
            natural_edges.len(),
            nodal_loads.len()
        );

        Ok(ResolvedConstraints {
            prescribed: prescribed
                .into_iter()
                .map(|(dof, (value, _, _))| (dof, value))
                .collect(),
            conflicts,
            natural_edges,
            nodal_loads: nodal_loads.into_iter().collect(),
            natural: self.natural.clone(),
        })
    }
}

fn values_agree(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12 * f64::max(1.0, f64::max(a.abs(), b.abs()))
}

/// Constraint data resolved against one mesh.
#[derive(Debug, Clone)]
pub struct ResolvedConstraints {
    /// Prescribed displacement per constrained dof, ascending by dof
    pub prescribed: BTreeMap<usize, f64>,
    pub conflicts: Vec<ConstraintConflict>,
    /// Boundary edges (orientation-free key) covered by natural constraints
    pub natural_edges: HashMap<(usize, usize), Vec<usize>>,
    /// Concentrated loads as `(dof, value)`, ascending by dof
    pub nodal_loads: Vec<(usize, f64)>,
    natural: Vec<Constraint>,
}

impl ResolvedConstraints {
    pub fn is_prescribed(&self, dof: usize) -> bool {
        self.prescribed.contains_key(&dof)
    }

    /// Consistent nodal forces of the tractions acting on `edge`
    ///
    /// The traction is integrated against the two linear edge shape
    /// functions with 2-point Gauss-Legendre quadrature.
    ///
    /// # Arguments
    /// * `points` - The shared point store
    /// * `edge` - The edge, oriented as in the owning polygon
    ///
    /// # Returns
    /// `[tail_x, tail_y, head_x, head_y]`
    pub fn edge_load(&self, points: &PointStore, edge: Edge) -> [f64; 4] {
        let mut load = [0.0; 4];
        let Some(ids) = self.natural_edges.get(&edge.key()) else {
            return load;
        };

        let (a, b) = (&points[edge.tail], &points[edge.head]);
        let length = a.distance(b);
        let gauss = 1.0 / f64::sqrt(3.0);

        for &id in ids {
            let constraint = &self.natural[id];
            for xi in [-gauss, gauss] {
                let s = 0.5 * (1.0 + xi);
                let p = Point::new(a.x + s * (b.x - a.x), a.y + s * (b.y - a.y));
                let t = constraint.value.at(&p);
                let weight = 0.5 * length;

                for &component in constraint.direction.components() {
                    load[component] += weight * (1.0 - s) * t;
                    load[DOF + component] += weight * s * t;
                }
            }
        }

        load
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::Polygon;
    use approx::assert_relative_eq;

    /// 2x1 strip of unit squares
    fn strip() -> Mesh {
        let points: PointStore = [
            (0.0, 0.0),
            (1.0, 0.0),
            (2.0, 0.0),
            (0.0, 1.0),
            (1.0, 1.0),
            (2.0, 1.0),
        ]
        .iter()
        .map(|&(x, y)| Point::new(x, y))
        .collect();
        Mesh::new(
            points,
            vec![Polygon::new(vec![0, 1, 4, 3]), Polygon::new(vec![1, 2, 5, 4])],
        )
    }

    fn left() -> Segment {
        Segment::new(Point::new(0.0, 0.0), Point::new(0.0, 1.0))
    }

    #[test]
    fn segment_constraint_prescribes_points_on_segment() {
        let mesh = strip();
        let mut container = ConstraintsContainer::new();
        container.add_essential(Constraint::on_segment(
            left(),
            Direction::Total,
            Value::function(|_, y| 2.0 * y),
        ));

        let resolved = container.resolve(&mesh).unwrap();
        let expected: Vec<(usize, f64)> = vec![(0, 0.0), (1, 0.0), (6, 2.0), (7, 2.0)];
        assert_eq!(
            resolved.prescribed.into_iter().collect::<Vec<_>>(),
            expected
        );
        assert!(resolved.conflicts.is_empty());
    }

    #[test]
    fn total_constraint_outranks_later_partial_constraint() {
        let mesh = strip();
        let mut container = ConstraintsContainer::new();
        container
            .add_essential(Constraint::at_point(0, Direction::Total, Value::Constant(1.0)))
            .add_essential(Constraint::at_point(
                0,
                Direction::Horizontal,
                Value::Constant(5.0),
            ));

        let resolved = container.resolve(&mesh).unwrap();
        assert_eq!(resolved.prescribed[&0], 1.0);
        assert_eq!(resolved.prescribed[&1], 1.0);
        assert_eq!(
            resolved.conflicts,
            vec![ConstraintConflict {
                dof: 0,
                kept: 1.0,
                discarded: 5.0,
                kept_constraint: 0,
                discarded_constraint: 1,
            }]
        );
    }

    #[test]
    fn last_registered_wins_among_equal_directions() {
        let mesh = strip();
        let mut container = ConstraintsContainer::new();
        container
            .add_essential(Constraint::at_point(2, Direction::Vertical, Value::Constant(1.0)))
            .add_essential(Constraint::at_point(2, Direction::Vertical, Value::Constant(3.0)))
            .add_essential(Constraint::at_point(2, Direction::Horizontal, Value::Constant(0.0)));

        let resolved = container.resolve(&mesh).unwrap();
        assert_eq!(resolved.prescribed[&5], 3.0);
        assert_eq!(resolved.prescribed[&4], 0.0);
        assert_eq!(resolved.conflicts.len(), 1);
        assert_eq!(resolved.conflicts[0].kept_constraint, 1);

        // a later total constraint overrides both partial ones
        container.add_essential(Constraint::at_point(2, Direction::Total, Value::Constant(-1.0)));
        let resolved = container.resolve(&mesh).unwrap();
        assert_eq!(resolved.prescribed[&4], -1.0);
        assert_eq!(resolved.prescribed[&5], -1.0);
        assert_eq!(resolved.conflicts.len(), 3);
    }

    #[test]
    fn agreeing_overlap_is_not_a_conflict() {
        let mesh = strip();
        let bottom = Segment::new(Point::new(0.0, 0.0), Point::new(2.0, 0.0));
        let field = Value::function(|x, y| x + y);
        let mut container = ConstraintsContainer::new();
        container
            .add_essential(Constraint::on_segment(left(), Direction::Total, field.clone()))
            .add_essential(Constraint::on_segment(bottom, Direction::Total, field));

        let resolved = container.resolve(&mesh).unwrap();
        assert!(resolved.conflicts.is_empty());
        assert_eq!(resolved.prescribed.len(), 8);
    }

    #[test]
    fn out_of_range_point_is_an_assembly_error() {
        let mesh = strip();
        let mut container = ConstraintsContainer::new();
        container.add_essential(Constraint::at_point(6, Direction::Total, Value::Constant(0.0)));
        assert!(matches!(
            container.resolve(&mesh),
            Err(VemError::Assembly(_))
        ));
    }

    #[test]
    fn natural_segment_only_covers_boundary_edges() {
        let mesh = strip();
        // the segment x = 1 is the shared interior edge
        let interior = Segment::new(Point::new(1.0, 0.0), Point::new(1.0, 1.0));
        let right = Segment::new(Point::new(2.0, 0.0), Point::new(2.0, 1.0));
        let mut container = ConstraintsContainer::new();
        container
            .add_natural(Constraint::on_segment(interior, Direction::Horizontal, Value::Constant(1.0)))
            .add_natural(Constraint::on_segment(right, Direction::Horizontal, Value::Constant(1.0)));

        let resolved = container.resolve(&mesh).unwrap();
        assert_eq!(resolved.natural_edges.len(), 1);
        assert_eq!(resolved.natural_edges[&(2, 5)], vec![1]);
    }

    #[test]
    fn edge_load_integrates_linear_traction_exactly() {
        let mesh = strip();
        let right = Segment::new(Point::new(2.0, 0.0), Point::new(2.0, 1.0));
        let mut container = ConstraintsContainer::new();
        container.add_natural(Constraint::on_segment(
            right,
            Direction::Vertical,
            Value::function(|_, y| 6.0 * y),
        ));
        let resolved = container.resolve(&mesh).unwrap();

        // edge from point 2 (y = 0) to point 5 (y = 1): integral of
        // (1 - y) 6y = 1 and of y 6y = 2
        let load = resolved.edge_load(&mesh.points, Edge::new(2, 5));
        assert_relative_eq!(load[0], 0.0);
        assert_relative_eq!(load[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(load[2], 0.0);
        assert_relative_eq!(load[3], 2.0, epsilon = 1e-12);

        let untouched = resolved.edge_load(&mesh.points, Edge::new(0, 1));
        assert_eq!(untouched, [0.0; 4]);
    }

    #[test]
    fn point_loads_accumulate_per_dof() {
        let mesh = strip();
        let mut container = ConstraintsContainer::new();
        container
            .add_natural(Constraint::at_point(5, Direction::Total, Value::Constant(2.0)))
            .add_natural(Constraint::on_points(vec![5, 4], Direction::Vertical, Value::Constant(-1.0)));

        let resolved = container.resolve(&mesh).unwrap();
        assert_eq!(resolved.nodal_loads, vec![(9, -1.0), (10, 2.0), (11, 1.0)]);
    }
}
