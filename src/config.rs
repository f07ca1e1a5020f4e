//! Run configuration, either built in code or loaded from a JSON file.
//!
//! ```json
//! {
//!     "material": { "youngs_modulus": 1e7, "poisson_ratio": 0.3, "model": "plane_strain" },
//!     "body_force": { "x": 0.0, "y": -9.81 },
//!     "solver": { "method": "cholesky", "gamma": 1.0 },
//!     "output": { "precision": "mid" }
//! }
//! ```

use json::JsonValue;
use log::debug;

use crate::{
    body_force::BodyForce,
    error::{Result, VemError},
    material::{Material, PlaneModel},
};

pub const DEFAULT_GAMMA: f64 = 1.0;
pub const DEFAULT_SINGULAR_TOLERANCE: f64 = 1e-10;
pub const MAX_CG_ITER: u64 = 1e6 as u64;
pub const TARGET_CG_RESIDUAL: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverMethod {
    Cholesky,
    ConjugateGradient,
}

impl std::str::FromStr for SolverMethod {
    type Err = VemError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cholesky" => Ok(SolverMethod::Cholesky),
            "conjugate_gradient" | "cg" => Ok(SolverMethod::ConjugateGradient),
            other => Err(VemError::Input(format!(
                "Unknown solver method '{other}', expected cholesky or conjugate_gradient"
            ))),
        }
    }
}

/// Numerical settings of the discretization and the linear solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Stabilization scaling of the element stiffness
    pub gamma: f64,
    /// Smallest accepted ratio of a Cholesky pivot to its diagonal entry
    pub singular_tolerance: f64,
    pub method: SolverMethod,
    pub cg_max_iters: u64,
    /// Target residual of the conjugate gradient, relative to the load norm
    pub cg_tolerance: f64,
    /// Compute element matrices on the rayon thread pool
    pub parallel: bool,
    /// Turn essential constraint conflicts into errors
    pub strict_constraints: bool,
    /// Show progress bars on stderr
    pub progress: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            gamma: DEFAULT_GAMMA,
            singular_tolerance: DEFAULT_SINGULAR_TOLERANCE,
            method: SolverMethod::Cholesky,
            cg_max_iters: MAX_CG_ITER,
            cg_tolerance: TARGET_CG_RESIDUAL,
            parallel: true,
            strict_constraints: false,
            progress: false,
        }
    }
}

/// Settings of the result writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    /// Significant digits of written floating point values
    pub precision: usize,
}

impl OutputConfig {
    pub const SMALL: usize = 6;
    pub const MID: usize = 10;
    pub const LARGE: usize = 16;
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            precision: OutputConfig::SMALL,
        }
    }
}

/// Everything a run needs besides the mesh and its constraints.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub material: Material,
    pub body_force: BodyForce,
    pub solver: SolverConfig,
    pub output: OutputConfig,
}

/// Loads a run configuration from a JSON file
///
/// # Arguments
/// * `input_file` - The path to the configuration file
///
/// # Returns
/// The parsed configuration
pub fn load_run_config(input_file: &str) -> Result<RunConfig> {
    let file_string = match std::fs::read_to_string(input_file) {
        Ok(f) => f,
        Err(err) => {
            return Err(VemError::Input(format!(
                "Unable to open config file {input_file}: {err}"
            )))
        }
    };

    parse_run_config(&file_string)
}

/// Parses a run configuration from a JSON string
pub fn parse_run_config(contents: &str) -> Result<RunConfig> {
    let input_json = match json::parse(contents) {
        Ok(j) => j,
        Err(err) => return Err(VemError::Input(format!("Error in config json: {err}"))),
    };

    if !input_json.has_key("material") {
        return Err(VemError::Input("Config json missing material field".to_owned()));
    }

    let material = parse_material(&input_json["material"])?;
    let body_force = parse_body_force(&input_json["body_force"])?;
    let solver = parse_solver(&input_json["solver"])?;
    let output = parse_output(&input_json["output"])?;

    debug!("loaded run config: {material:?}, {solver:?}, {output:?}");

    Ok(RunConfig {
        material,
        body_force,
        solver,
        output,
    })
}

fn required_f64(section: &JsonValue, section_name: &str, key: &str) -> Result<f64> {
    if !section.has_key(key) {
        return Err(VemError::Input(format!(
            "Config json missing {key} field in {section_name} section"
        )));
    }
    optional_f64(section, section_name, key).map(|v| v.unwrap_or_default())
}

fn optional_f64(section: &JsonValue, section_name: &str, key: &str) -> Result<Option<f64>> {
    if section[key].is_null() {
        return Ok(None);
    }
    match section[key].as_f64() {
        Some(v) => Ok(Some(v)),
        None => Err(VemError::Input(format!(
            "Bad value for {key} in {section_name} section, expected a number"
        ))),
    }
}

fn optional_bool(section: &JsonValue, section_name: &str, key: &str) -> Result<Option<bool>> {
    if section[key].is_null() {
        return Ok(None);
    }
    match section[key].as_bool() {
        Some(v) => Ok(Some(v)),
        None => Err(VemError::Input(format!(
            "Bad value for {key} in {section_name} section, expected true or false"
        ))),
    }
}

fn parse_material(section: &JsonValue) -> Result<Material> {
    let youngs_modulus = required_f64(section, "material", "youngs_modulus")?;
    let poisson_ratio = required_f64(section, "material", "poisson_ratio")?;

    let model = match section["model"].as_str() {
        Some(m) => m.parse()?,
        None if section["model"].is_null() => PlaneModel::PlaneStress,
        None => {
            return Err(VemError::Input(
                "Bad value for model in material section, expected a string".to_owned(),
            ))
        }
    };

    Material::new(youngs_modulus, poisson_ratio, model)
}

fn parse_body_force(section: &JsonValue) -> Result<BodyForce> {
    if section.is_null() {
        return Ok(BodyForce::none());
    }
    let x = optional_f64(section, "body_force", "x")?.unwrap_or(0.0);
    let y = optional_f64(section, "body_force", "y")?.unwrap_or(0.0);
    Ok(BodyForce::constant(x, y))
}

fn parse_solver(section: &JsonValue) -> Result<SolverConfig> {
    let mut config = SolverConfig::default();
    if section.is_null() {
        return Ok(config);
    }

    if let Some(gamma) = optional_f64(section, "solver", "gamma")? {
        if gamma <= 0.0 {
            return Err(VemError::Input(format!(
                "Stabilization gamma must be positive, got {gamma}"
            )));
        }
        config.gamma = gamma;
    }
    if let Some(tol) = optional_f64(section, "solver", "singular_tolerance")? {
        config.singular_tolerance = tol;
    }
    if let Some(tol) = optional_f64(section, "solver", "cg_tolerance")? {
        config.cg_tolerance = tol;
    }
    if !section["cg_max_iters"].is_null() {
        config.cg_max_iters = section["cg_max_iters"].as_u64().ok_or_else(|| {
            VemError::Input(
                "Bad value for cg_max_iters in solver section, expected an integer".to_owned(),
            )
        })?;
    }
    match section["method"].as_str() {
        Some(m) => config.method = m.parse()?,
        None if section["method"].is_null() => {}
        None => {
            return Err(VemError::Input(
                "Bad value for method in solver section, expected a string".to_owned(),
            ))
        }
    }
    if let Some(parallel) = optional_bool(section, "solver", "parallel")? {
        config.parallel = parallel;
    }
    if let Some(strict) = optional_bool(section, "solver", "strict_constraints")? {
        config.strict_constraints = strict;
    }
    if let Some(progress) = optional_bool(section, "solver", "progress")? {
        config.progress = progress;
    }

    Ok(config)
}

fn parse_output(section: &JsonValue) -> Result<OutputConfig> {
    let mut config = OutputConfig::default();
    let precision = &section["precision"];

    if precision.is_null() {
        return Ok(config);
    }

    config.precision = match (precision.as_str(), precision.as_usize()) {
        (Some("small"), _) => OutputConfig::SMALL,
        (Some("mid"), _) => OutputConfig::MID,
        (Some("large"), _) => OutputConfig::LARGE,
        (None, Some(digits)) if digits > 0 => digits,
        _ => {
            return Err(VemError::Input(format!(
                "Bad value for precision in output section: {precision}"
            )))
        }
    };

    Ok(config)
}
