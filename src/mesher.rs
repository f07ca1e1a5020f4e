//! Reader for the plain-text mesh description.
//!
//! ```text
//! 4            number of points
//! 0 0          x y
//! 1 0
//! 1 1
//! 0 1
//! 1            number of polygons
//! 4 1 2 3 4    vertex count, then 1-based point indices (counter-clockwise)
//! 2            number of essential records (optional section)
//! 1 1 1        point, fix x (0/1), fix y (0/1)
//! 2 0 1
//! 1            number of natural records (optional section)
//! 3 0 -10      point, load x, load y
//! ```

use log::{debug, info};

use crate::{
    constraints::{Constraint, ConstraintsContainer, Direction, Value},
    datatypes::{Mesh, Point, PointStore, Polygon},
    error::{Result, VemError},
};

enum MeshParseState {
    PointCount,
    Points(usize),
    PolygonCount,
    Polygons(usize),
    EssentialCount,
    Essential(usize),
    NaturalCount,
    Natural(usize),
    Done,
}

/// Essential flags grouped by the components they fix
#[derive(Default)]
struct FixedPoints {
    horizontal: Vec<usize>,
    vertical: Vec<usize>,
    total: Vec<usize>,
}

/// Reads a mesh description file
///
/// # Arguments
/// * `mesh_file` - The path to the mesh file
///
/// # Returns
/// The mesh and the constraints recorded in the file
pub fn read_mesh(mesh_file: &str) -> Result<(Mesh, ConstraintsContainer)> {
    let contents = std::fs::read_to_string(mesh_file)?;
    let (mesh, constraints) = parse_mesh(&contents)?;

    info!(
        "loaded {} points and {} polygons from {mesh_file}",
        mesh.points.len(),
        mesh.polygons.len()
    );

    Ok((mesh, constraints))
}

/// Parses a mesh description
///
/// # Arguments
/// * `contents` - The text of a mesh file
///
/// # Returns
/// The mesh and the constraints recorded in the text
pub fn parse_mesh(contents: &str) -> Result<(Mesh, ConstraintsContainer)> {
    let mut parser_state = MeshParseState::PointCount;

    let mut points = PointStore::new();
    // store index of every point in file order
    let mut point_ids: Vec<usize> = Vec::new();
    let mut polygons: Vec<Polygon> = Vec::new();
    let mut fixed = FixedPoints::default();
    let mut loads: Vec<(usize, f64, f64)> = Vec::new();
    let mut last_line = 0;

    for (line_idx, raw_line) in contents.lines().enumerate() {
        let line_no = line_idx + 1;
        last_line = line_no;

        let fields: Vec<&str> = raw_line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }

        parser_state = match parser_state {
            MeshParseState::PointCount => {
                let count = parse_count(&fields, line_no, "point")?;
                MeshParseState::Points(count).settled()
            }
            MeshParseState::Points(remaining) => {
                let coords = parse_fields::<f64>(&fields, 2, line_no, "point coordinates")?;
                point_ids.push(points.insert(Point::new(coords[0], coords[1])));
                MeshParseState::Points(remaining - 1).settled()
            }
            MeshParseState::PolygonCount => {
                let count = parse_count(&fields, line_no, "polygon")?;
                MeshParseState::Polygons(count).settled()
            }
            MeshParseState::Polygons(remaining) => {
                let k: usize = parse_value(fields[0], line_no, "polygon vertex count")?;
                let indices = parse_fields::<usize>(&fields, k.saturating_add(1), line_no, "polygon")?;
                let vertices = indices[1..]
                    .iter()
                    .map(|&i| lookup(&point_ids, i, line_no))
                    .collect::<Result<Vec<usize>>>()?;
                polygons.push(Polygon::new(vertices));
                MeshParseState::Polygons(remaining - 1).settled()
            }
            MeshParseState::EssentialCount => {
                let count = parse_count(&fields, line_no, "essential record")?;
                MeshParseState::Essential(count).settled()
            }
            MeshParseState::Essential(remaining) => {
                let record = parse_fields::<usize>(&fields, 3, line_no, "essential record")?;
                let point = lookup(&point_ids, record[0], line_no)?;
                match (flag(record[1], line_no)?, flag(record[2], line_no)?) {
                    (true, true) => fixed.total.push(point),
                    (true, false) => fixed.horizontal.push(point),
                    (false, true) => fixed.vertical.push(point),
                    (false, false) => {}
                }
                MeshParseState::Essential(remaining - 1).settled()
            }
            MeshParseState::NaturalCount => {
                let count = parse_count(&fields, line_no, "natural record")?;
                MeshParseState::Natural(count).settled()
            }
            MeshParseState::Natural(remaining) => {
                if fields.len() != 3 {
                    return Err(VemError::parse(
                        line_no,
                        format!("natural record needs 3 fields, found {}", fields.len()),
                    ));
                }
                let point_index: usize = parse_value(fields[0], line_no, "point index")?;
                let point = lookup(&point_ids, point_index, line_no)?;
                let vx: f64 = parse_value(fields[1], line_no, "load")?;
                let vy: f64 = parse_value(fields[2], line_no, "load")?;
                loads.push((point, vx, vy));
                MeshParseState::Natural(remaining - 1).settled()
            }
            MeshParseState::Done => {
                return Err(VemError::parse(line_no, "unexpected record after mesh data"))
            }
        };
    }

    match parser_state {
        MeshParseState::EssentialCount | MeshParseState::NaturalCount | MeshParseState::Done => {}
        MeshParseState::PointCount | MeshParseState::PolygonCount => {
            return Err(VemError::parse(last_line + 1, "unexpected end of mesh data"))
        }
        MeshParseState::Points(n)
        | MeshParseState::Polygons(n)
        | MeshParseState::Essential(n)
        | MeshParseState::Natural(n) => {
            return Err(VemError::parse(
                last_line + 1,
                format!("unexpected end of mesh data, {n} records missing"),
            ))
        }
    }

    let mut constraints = ConstraintsContainer::new();
    for (group, direction) in [
        (fixed.horizontal, Direction::Horizontal),
        (fixed.vertical, Direction::Vertical),
        (fixed.total, Direction::Total),
    ] {
        if !group.is_empty() {
            constraints.add_essential(Constraint::on_points(group, direction, Value::Constant(0.0)));
        }
    }
    for (point, vx, vy) in loads {
        if vx != 0.0 {
            constraints.add_natural(Constraint::at_point(
                point,
                Direction::Horizontal,
                Value::Constant(vx),
            ));
        }
        if vy != 0.0 {
            constraints.add_natural(Constraint::at_point(
                point,
                Direction::Vertical,
                Value::Constant(vy),
            ));
        }
    }

    if points.len() < point_ids.len() {
        debug!(
            "merged {} duplicate points",
            point_ids.len() - points.len()
        );
    }

    Ok((Mesh::new(points, polygons), constraints))
}

impl MeshParseState {
    /// Moves past a section whose records are all read
    fn settled(self) -> MeshParseState {
        match self {
            MeshParseState::Points(0) => MeshParseState::PolygonCount,
            MeshParseState::Polygons(0) => MeshParseState::EssentialCount,
            MeshParseState::Essential(0) => MeshParseState::NaturalCount,
            MeshParseState::Natural(0) => MeshParseState::Done,
            other => other,
        }
    }
}

fn parse_value<T: std::str::FromStr>(field: &str, line_no: usize, what: &str) -> Result<T> {
    field
        .parse()
        .map_err(|_| VemError::parse(line_no, format!("bad {what} '{field}'")))
}

fn parse_fields<T: std::str::FromStr>(
    fields: &[&str],
    expected: usize,
    line_no: usize,
    what: &str,
) -> Result<Vec<T>> {
    if fields.len() != expected {
        return Err(VemError::parse(
            line_no,
            format!("{what} needs {expected} fields, found {}", fields.len()),
        ));
    }
    fields
        .iter()
        .map(|f| parse_value(f, line_no, what))
        .collect()
}

fn parse_count(fields: &[&str], line_no: usize, what: &str) -> Result<usize> {
    if fields.len() != 1 {
        return Err(VemError::parse(
            line_no,
            format!("expected a single {what} count, found {} fields", fields.len()),
        ));
    }
    parse_value(fields[0], line_no, &format!("{what} count"))
}

/// Maps a 1-based file index to the store index of that point
fn lookup(point_ids: &[usize], index: usize, line_no: usize) -> Result<usize> {
    match index.checked_sub(1).and_then(|i| point_ids.get(i)) {
        Some(&id) => Ok(id),
        None => Err(VemError::parse(
            line_no,
            format!(
                "point index {index} out of range 1..={}",
                point_ids.len()
            ),
        )),
    }
}

fn flag(value: usize, line_no: usize) -> Result<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(VemError::parse(
            line_no,
            format!("essential flag must be 0 or 1, found {other}"),
        )),
    }
}
