use std::io::Write;

use log::info;
use nalgebra::DVector;

use crate::{
    config::OutputConfig,
    datatypes::PointStore,
    dof::DOF,
    error::{Result, VemError},
    problem::ElementStress,
};

/// Formats a value with `precision` significant digits
fn fmt_value(value: f64, precision: usize) -> String {
    format!("{:.*e}", precision.max(1) - 1, value)
}

/// Writes the displacement of every point as `x,y,ux,uy` rows
///
/// # Arguments
/// * `writer` - Destination of the csv text
/// * `points` - The shared point store
/// * `displacements` - Displacement per global dof
/// * `output` - Output settings
pub fn write_displacements<W: Write>(
    writer: &mut W,
    points: &PointStore,
    displacements: &DVector<f64>,
    output: &OutputConfig,
) -> Result<()> {
    if displacements.len() != DOF * points.len() {
        return Err(VemError::Input(format!(
            "{} displacements do not match {} points",
            displacements.len(),
            points.len()
        )));
    }

    let p = output.precision;
    writeln!(writer, "x,y,ux,uy")?;
    for (i, point) in points.iter().enumerate() {
        writeln!(
            writer,
            "{x},{y},{ux},{uy}",
            x = fmt_value(point.x, p),
            y = fmt_value(point.y, p),
            ux = fmt_value(displacements[DOF * i], p),
            uy = fmt_value(displacements[DOF * i + 1], p),
        )?;
    }

    Ok(())
}

/// Writes the projected stress of every element as
/// `element,sxx,syy,sxy` rows
pub fn write_stresses<W: Write>(
    writer: &mut W,
    stresses: &[ElementStress],
    output: &OutputConfig,
) -> Result<()> {
    let p = output.precision;
    writeln!(writer, "element,sxx,syy,sxy")?;
    for (id, element) in stresses.iter().enumerate() {
        writeln!(
            writer,
            "{id},{sxx},{syy},{sxy}",
            sxx = fmt_value(element.stress[0], p),
            syy = fmt_value(element.stress[1], p),
            sxy = fmt_value(element.stress[2], p),
        )?;
    }

    Ok(())
}

/// Writes simulation results to csv files
///
/// # Arguments
/// * `points` - The shared point store
/// * `displacements` - Displacement per global dof
/// * `stresses` - Element stresses, written only with `stress_output`
/// * `displacement_output` - The filename of the displacement csv
/// * `stress_output` - The filename of the element stress csv, if any
/// * `output` - Output settings
pub fn csv_output(
    points: &PointStore,
    displacements: &DVector<f64>,
    stresses: &[ElementStress],
    displacement_output: &str,
    stress_output: Option<&str>,
    output: &OutputConfig,
) -> Result<()> {
    let mut displacement_file = std::io::BufWriter::new(std::fs::File::create(displacement_output)?);
    write_displacements(&mut displacement_file, points, displacements, output)?;
    displacement_file.flush()?;
    info!("wrote displacements to {displacement_output}");

    if let Some(stress_output) = stress_output {
        let mut stress_file = std::io::BufWriter::new(std::fs::File::create(stress_output)?);
        write_stresses(&mut stress_file, stresses, output)?;
        stress_file.flush()?;
        info!("wrote element stresses to {stress_output}");
    }

    Ok(())
}
