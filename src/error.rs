use thiserror::Error;

pub type Result<T> = std::result::Result<T, VemError>;

#[derive(Debug, Error)]
pub enum VemError {
    #[error("Input error: {0}")]
    Input(String),

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Geometry error in polygon {polygon}: {reason}")]
    Geometry { polygon: usize, reason: String },

    #[error("Material error: {0}")]
    Material(String),

    #[error(
        "Constraint conflict on dof {dof}: kept value {kept}, discarded value {discarded}"
    )]
    ConstraintConflict {
        dof: usize,
        kept: f64,
        discarded: f64,
    },

    #[error("Assembly error: {0}")]
    Assembly(String),

    #[error(
        "Singular system: {free} free dofs, {constrained} constrained dofs{}{}",
        breakdown(.dof),
        listing(.unconstrained_points)
    )]
    SingularSystem {
        free: usize,
        constrained: usize,
        dof: Option<usize>,
        /// Points with no prescribed displacement component
        unconstrained_points: Vec<usize>,
    },

    #[error("Solver error: {0}")]
    Solver(String),
}

fn breakdown(dof: &Option<usize>) -> String {
    match dof {
        Some(d) => format!(", factorization broke down at dof {d}"),
        None => String::new(),
    }
}

/// Longest point list printed in a singular system message
const LISTED_POINTS: usize = 10;

fn listing(points: &[usize]) -> String {
    if points.is_empty() {
        return String::new();
    }
    let shown: Vec<String> = points.iter().take(LISTED_POINTS).map(|p| p.to_string()).collect();
    let rest = points.len().saturating_sub(LISTED_POINTS);
    let more = if rest > 0 {
        format!(" and {rest} more")
    } else {
        String::new()
    };
    format!(", no prescribed component on points [{}]{more}", shown.join(", "))
}

impl VemError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        VemError::Parse {
            line,
            message: message.into(),
        }
    }
}
