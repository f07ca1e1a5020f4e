use nalgebra::{matrix, SMatrix};

use crate::error::{Result, VemError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneModel {
    PlaneStress,
    PlaneStrain,
}

impl std::str::FromStr for PlaneModel {
    type Err = VemError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plane_stress" => Ok(PlaneModel::PlaneStress),
            "plane_strain" => Ok(PlaneModel::PlaneStrain),
            other => Err(VemError::Input(format!(
                "Unknown material model '{other}', expected plane_stress or plane_strain"
            ))),
        }
    }
}

/// Isotropic linear elastic material for 2D analysis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    youngs_modulus: f64,
    poisson_ratio: f64,
    model: PlaneModel,
}

impl Material {
    /// Creates a validated material
    ///
    /// # Arguments
    /// * `youngs_modulus` - The modulus of elasticity, must be positive
    /// * `poisson_ratio` - The poisson ratio, must be inside (-1, 0.5)
    /// * `model` - Plane stress or plane strain
    pub fn new(youngs_modulus: f64, poisson_ratio: f64, model: PlaneModel) -> Result<Material> {
        if !youngs_modulus.is_finite() || youngs_modulus <= 0.0 {
            return Err(VemError::Material(format!(
                "Young's modulus must be positive and finite, got {youngs_modulus}"
            )));
        }
        if !(poisson_ratio > -1.0 && poisson_ratio < 0.5) {
            return Err(VemError::Material(format!(
                "Poisson ratio must lie in (-1, 0.5), got {poisson_ratio}"
            )));
        }

        Ok(Material {
            youngs_modulus,
            poisson_ratio,
            model,
        })
    }

    pub fn plane_stress(youngs_modulus: f64, poisson_ratio: f64) -> Result<Material> {
        Material::new(youngs_modulus, poisson_ratio, PlaneModel::PlaneStress)
    }

    pub fn plane_strain(youngs_modulus: f64, poisson_ratio: f64) -> Result<Material> {
        Material::new(youngs_modulus, poisson_ratio, PlaneModel::PlaneStrain)
    }

    pub fn youngs_modulus(&self) -> f64 {
        self.youngs_modulus
    }

    pub fn poisson_ratio(&self) -> f64 {
        self.poisson_ratio
    }

    pub fn model(&self) -> PlaneModel {
        self.model
    }

    /// Calculates the stress-strain matrix
    ///
    /// Strains are ordered `[e_xx, e_yy, e_xy]` with the tensor (not
    /// engineering) shear component, so the shear entry is `4G`.
    ///
    /// # Returns
    /// A 3x3 stress-strain matrix
    pub fn material_matrix(&self) -> SMatrix<f64, 3, 3> {
        let v = self.poisson_ratio;
        let e = self.youngs_modulus;

        match self.model {
            PlaneModel::PlaneStress => {
                let mut stress_strain_mat: SMatrix<f64, 3, 3> = matrix![
                    1.0, v, 0.0;
                    v, 1.0, 0.0;
                    0.0, 0.0, 2.0 * (1.0 - v);
                ];
                stress_strain_mat *= e / (1.0 - f64::powi(v, 2));
                stress_strain_mat
            }
            PlaneModel::PlaneStrain => {
                let mut stress_strain_mat: SMatrix<f64, 3, 3> = matrix![
                    1.0 - v, v, 0.0;
                    v, 1.0 - v, 0.0;
                    0.0, 0.0, 2.0 * (1.0 - 2.0 * v);
                ];
                stress_strain_mat *= e / ((1.0 + v) * (1.0 - 2.0 * v));
                stress_strain_mat
            }
        }
    }

    /// Trace of the stress-strain matrix, scales the element stabilization
    pub fn trace(&self) -> f64 {
        self.material_matrix().trace()
    }
}
