use crate::{
    datatypes::Polygon,
    error::{Result, VemError},
};

/// Displacement dofs per point
pub const DOF: usize = 2;

/// Maps points and element vertices to global dof indices.
///
/// Point `k` owns dofs `2k` (x) and `2k + 1` (y). The map is fixed once the
/// point count is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DofMap {
    num_points: usize,
}

impl DofMap {
    pub fn new(num_points: usize) -> DofMap {
        DofMap { num_points }
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn total_dofs(&self) -> usize {
        DOF * self.num_points
    }

    /// Global dof pair of one point
    pub fn point_dofs(&self, point: usize) -> Result<[usize; DOF]> {
        if point >= self.num_points {
            return Err(VemError::Assembly(format!(
                "point {point} has no dofs, only {} points are numbered",
                self.num_points
            )));
        }
        Ok([DOF * point, DOF * point + 1])
    }

    /// Element-local to global dof map
    ///
    /// # Arguments
    /// * `polygon` - The element polygon
    ///
    /// # Returns
    /// A vector of length `2n` whose entry `2v + c` is the global dof of
    /// component `c` of local vertex `v`
    pub fn element_dofs(&self, polygon: &Polygon) -> Result<Vec<usize>> {
        let mut dofs = Vec::with_capacity(DOF * polygon.len());
        for &vertex in &polygon.vertices {
            dofs.extend(self.point_dofs(vertex)?);
        }
        Ok(dofs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_dofs_follow_vertex_order() {
        let map = DofMap::new(10);
        let polygon = Polygon::new(vec![7, 2, 4]);
        assert_eq!(map.element_dofs(&polygon).unwrap(), vec![14, 15, 4, 5, 8, 9]);
        assert_eq!(map.total_dofs(), 20);
    }

    #[test]
    fn unknown_point_is_an_assembly_error() {
        let map = DofMap::new(3);
        assert!(matches!(map.point_dofs(3), Err(VemError::Assembly(_))));
        assert!(map.element_dofs(&Polygon::new(vec![0, 1, 5])).is_err());
    }
}
