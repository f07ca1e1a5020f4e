//! Lowest-order virtual element solver for 2D linear elasticity on
//! arbitrary polygon meshes.

pub mod assembler;
pub mod body_force;
pub mod config;
pub mod constraints;
pub mod datatypes;
pub mod dof;
pub mod element;
pub mod error;
pub mod geometry;
pub mod material;
pub mod mesher;
pub mod norm;
pub mod post_processor;
pub mod problem;
pub mod solver;

pub use body_force::BodyForce;
pub use config::{OutputConfig, RunConfig, SolverConfig, SolverMethod};
pub use constraints::{Constraint, ConstraintConflict, ConstraintsContainer, Direction, Value};
pub use datatypes::{Mesh, Point, PointStore, Polygon, Segment};
pub use error::{Result, VemError};
pub use material::{Material, PlaneModel};
pub use norm::DisplacementNorm;
pub use problem::{Conditions, ElementStress, Problem, Solution};
