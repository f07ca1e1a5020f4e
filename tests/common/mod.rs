#![allow(dead_code)]

use polyvem::{
    Conditions, Constraint, ConstraintsContainer, Direction, Material, Mesh, Point, PointStore,
    Polygon, Problem, Segment, SolverConfig, Value,
};

/// Structured rectangle mesh builder.
///
/// Points are numbered column by column (y fastest), which keeps the
/// stiffness bandwidth small for meshes longer than they are tall.
pub struct Grid {
    pub x: (f64, f64),
    pub y: (f64, f64),
    pub nx: usize,
    pub ny: usize,
    /// Interior corner perturbation as a fraction of the cell size
    pub jitter: f64,
    /// Depth, as a fraction of the cell height, of the midpoint pushed down
    /// into every interior horizontal edge. Cells below such an edge become
    /// non-convex.
    pub dent: f64,
}

impl Grid {
    pub fn new(x: (f64, f64), y: (f64, f64), nx: usize, ny: usize) -> Grid {
        Grid {
            x,
            y,
            nx,
            ny,
            jitter: 0.0,
            dent: 0.0,
        }
    }

    pub fn unit(n: usize) -> Grid {
        Grid::new((0.0, 1.0), (0.0, 1.0), n, n)
    }

    pub fn jitter(mut self, jitter: f64) -> Grid {
        self.jitter = jitter;
        self
    }

    pub fn dent(mut self, dent: f64) -> Grid {
        self.dent = dent;
        self
    }

    pub fn build(&self) -> Mesh {
        let hx = (self.x.1 - self.x.0) / self.nx as f64;
        let hy = (self.y.1 - self.y.0) / self.ny as f64;

        let mut coords = Vec::with_capacity((self.nx + 1) * (self.ny + 1));
        for i in 0..=self.nx {
            for j in 0..=self.ny {
                let interior = i > 0 && i < self.nx && j > 0 && j < self.ny;
                let (dx, dy) = if interior {
                    // fixed pseudo-random pattern
                    let s = f64::sin(12.9898 * i as f64 + 78.233 * j as f64) * 43758.5453;
                    let t = f64::sin(39.3467 * i as f64 + 11.135 * j as f64) * 24634.6345;
                    (
                        self.jitter * hx * (2.0 * s.fract().abs() - 1.0),
                        self.jitter * hy * (2.0 * t.fract().abs() - 1.0),
                    )
                } else {
                    (0.0, 0.0)
                };
                coords.push(Point::new(
                    self.x.0 + i as f64 * hx + dx,
                    self.y.0 + j as f64 * hy + dy,
                ));
            }
        }
        let at = |i: usize, j: usize| coords[i * (self.ny + 1) + j];

        // Each column of corners is followed by the dented midpoints of the
        // horizontal edges to its right, so dof numbers stay local.
        let mut corners = vec![0; coords.len()];
        let mut midpoints = vec![None; self.nx * (self.ny + 1)];
        let mut points = PointStore::new();
        for i in 0..=self.nx {
            for j in 0..=self.ny {
                corners[i * (self.ny + 1) + j] = points.insert(at(i, j));
            }
            if self.dent > 0.0 && i < self.nx {
                for j in 1..self.ny {
                    let (a, b) = (at(i, j), at(i + 1, j));
                    let mid = Point::new(0.5 * (a.x + b.x), 0.5 * (a.y + b.y) - self.dent * hy);
                    midpoints[j * self.nx + i] = Some(points.insert(mid));
                }
            }
        }
        let corner = |i: usize, j: usize| corners[i * (self.ny + 1) + j];

        let mut polygons = Vec::with_capacity(self.nx * self.ny);
        for i in 0..self.nx {
            for j in 0..self.ny {
                let mut vertices = vec![corner(i, j)];
                vertices.extend(midpoints[j * self.nx + i]);
                vertices.push(corner(i + 1, j));
                vertices.push(corner(i + 1, j + 1));
                vertices.extend(midpoints[(j + 1) * self.nx + i]);
                vertices.push(corner(i, j + 1));
                polygons.push(Polygon::new(vertices));
            }
        }

        Mesh::new(points, polygons)
    }
}

/// Prescribes `(ux, uy)` on every boundary point of the mesh
pub fn clamp_boundary<F>(mesh: &Mesh, field: F) -> ConstraintsContainer
where
    F: Fn(f64, f64) -> (f64, f64) + Send + Sync + Clone + 'static,
{
    let boundary = mesh.boundary_points();
    let fx = field.clone();
    let mut constraints = ConstraintsContainer::new();
    constraints
        .add_essential(Constraint::on_points(
            boundary.clone(),
            Direction::Horizontal,
            Value::function(move |x, y| fx(x, y).0),
        ))
        .add_essential(Constraint::on_points(
            boundary,
            Direction::Vertical,
            Value::function(move |x, y| field(x, y).1),
        ));
    constraints
}

pub const BEAM_E: f64 = 1e7;
pub const BEAM_NU: f64 = 0.3;
pub const BEAM_P: f64 = -1000.0;
pub const BEAM_D: f64 = 4.0;
pub const BEAM_L: f64 = 8.0;

fn beam_inertia() -> f64 {
    BEAM_D.powi(3) / 12.0
}

/// Analytic plane strain displacement of the end-loaded cantilever on
/// `[0, L] x [-D/2, D/2]`
pub fn beam_displacement(x: f64, y: f64) -> (f64, f64) {
    let e_bar = BEAM_E / (1.0 - BEAM_NU * BEAM_NU);
    let v_bar = BEAM_NU / (1.0 - BEAM_NU);
    let (p, d, l, i) = (BEAM_P, BEAM_D, BEAM_L, beam_inertia());

    let ux = -p * y / (6.0 * e_bar * i)
        * ((6.0 * l - 3.0 * x) * x + (2.0 + v_bar) * y * y - 1.5 * d * d * (1.0 + v_bar));
    let uy = p / (6.0 * e_bar * i) * (3.0 * v_bar * y * y * (l - x) + (3.0 * l - x) * x * x);
    (ux, uy)
}

/// Parabolic shear traction on the loaded end, integrating to `P`
pub fn beam_traction(y: f64) -> f64 {
    BEAM_P / (2.0 * beam_inertia()) * (BEAM_D * BEAM_D / 4.0 - y * y)
}

/// Cantilever on a regular or jittered grid
pub fn beam_problem(nx: usize, ny: usize, jitter: f64, config: SolverConfig) -> Problem {
    beam_problem_on(beam_grid(nx, ny).jitter(jitter), config)
}

/// `nx` by `ny` cells over `[0, L] x [-D/2, D/2]`
pub fn beam_grid(nx: usize, ny: usize) -> Grid {
    let half = BEAM_D / 2.0;
    Grid::new((0.0, BEAM_L), (-half, half), nx, ny)
}

/// Cantilever with the analytic field on the left edge and the shear load
/// on the right edge
pub fn beam_problem_on(grid: Grid, config: SolverConfig) -> Problem {
    let half = BEAM_D / 2.0;
    let mesh = grid.build();

    let left = Segment::new(Point::new(0.0, -half), Point::new(0.0, half));
    let right = Segment::new(Point::new(BEAM_L, -half), Point::new(BEAM_L, half));

    let mut constraints = ConstraintsContainer::new();
    constraints
        .add_essential(Constraint::on_segment(
            left,
            Direction::Horizontal,
            Value::function(|x, y| beam_displacement(x, y).0),
        ))
        .add_essential(Constraint::on_segment(
            left,
            Direction::Vertical,
            Value::function(|x, y| beam_displacement(x, y).1),
        ))
        .add_natural(Constraint::on_segment(
            right,
            Direction::Vertical,
            Value::function(|_, y| beam_traction(y)),
        ));

    let conditions = Conditions::new(Material::plane_strain(BEAM_E, BEAM_NU).unwrap())
        .with_constraints(constraints);
    Problem::new(mesh, conditions, config).unwrap()
}
