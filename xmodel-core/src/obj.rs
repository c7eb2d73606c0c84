/// Wavefront OBJ decoder
///
/// Reads positions, normals and faces. Polygons are fan-triangulated and
/// faces without normals are flat shaded. Groups, materials, texture
/// coordinates and smoothing groups are skipped.
use nalgebra::{Point3, Vector3};
use nom::{
    character::complete::{char, i64 as index, space0, space1},
    combinator::{all_consuming, opt},
    multi::separated_list1,
    number::complete::float,
    sequence::{preceded, terminated, tuple},
    IResult,
};

use crate::error::DecodeError;
use crate::geometry::{Mesh, Triangle, Vertex};

/// `v`, `v/vt`, `v//vn` or `v/vt/vn`
type FaceVertex = (i64, Option<i64>);

pub fn parse_obj(input: &str) -> Result<Mesh, DecodeError> {
    let mut positions: Vec<Point3<f32>> = Vec::new();
    let mut normals: Vec<Vector3<f32>> = Vec::new();
    let mut mesh = Mesh::new();

    for (number, raw) in input.lines().enumerate() {
        let line = number + 1;
        let text = raw.split('#').next().unwrap_or("").trim();
        let Some((keyword, rest)) = split_keyword(text) else {
            continue;
        };

        let syntax = |message: &str| DecodeError::Syntax {
            line,
            message: format!("{message}: {text:?}"),
        };

        match keyword {
            "v" => {
                let (_, (x, y, z)) = vector3(rest).map_err(|_| syntax("bad vertex"))?;
                positions.push(Point3::new(x, y, z));
            }
            "vn" => {
                let (_, (x, y, z)) = vector3(rest).map_err(|_| syntax("bad normal"))?;
                normals.push(Vector3::new(x, y, z));
            }
            "f" => {
                let (_, face) = face(rest).map_err(|_| syntax("bad face"))?;
                if face.len() < 3 {
                    return Err(syntax("face needs at least three vertices"));
                }
                let resolved = face
                    .iter()
                    .map(|&(v, n)| resolve_vertex(v, n, &positions, &normals, line))
                    .collect::<Result<Vec<_>, _>>()?;
                for i in 1..resolved.len() - 1 {
                    mesh.add_triangle(build_triangle([resolved[0], resolved[i], resolved[i + 1]]));
                }
            }
            _ => {}
        }
    }

    Ok(mesh)
}

fn split_keyword(text: &str) -> Option<(&str, &str)> {
    if text.is_empty() {
        return None;
    }
    match text.split_once(char::is_whitespace) {
        Some((keyword, rest)) => Some((keyword, rest.trim_start())),
        None => Some((text, "")),
    }
}

fn vector3(input: &str) -> IResult<&str, (f32, f32, f32)> {
    // A trailing `w` component is allowed and ignored.
    terminated(
        tuple((float, preceded(space1, float), preceded(space1, float))),
        opt(preceded(space1, float)),
    )(input)
}

fn face(input: &str) -> IResult<&str, Vec<FaceVertex>> {
    all_consuming(terminated(separated_list1(space1, face_vertex), space0))(input)
}

fn face_vertex(input: &str) -> IResult<&str, FaceVertex> {
    let (input, (position, _texcoord, normal)) = tuple((
        index,
        opt(preceded(char('/'), opt(index))),
        opt(preceded(char('/'), index)),
    ))(input)?;
    Ok((input, (position, normal)))
}

fn resolve_index(index: i64, len: usize, line: usize) -> Result<usize, DecodeError> {
    let resolved = if index > 0 {
        index - 1
    } else {
        len as i64 + index
    };
    if index == 0 || resolved < 0 || resolved >= len as i64 {
        return Err(DecodeError::IndexOutOfRange { line, index });
    }
    Ok(resolved as usize)
}

fn resolve_vertex(
    position: i64,
    normal: Option<i64>,
    positions: &[Point3<f32>],
    normals: &[Vector3<f32>],
    line: usize,
) -> Result<(Point3<f32>, Option<Vector3<f32>>), DecodeError> {
    let p = positions[resolve_index(position, positions.len(), line)?];
    let n = match normal {
        Some(n) => Some(normals[resolve_index(n, normals.len(), line)?]),
        None => None,
    };
    Ok((p, n))
}

fn build_triangle(corners: [(Point3<f32>, Option<Vector3<f32>>); 3]) -> Triangle {
    if corners.iter().all(|(_, n)| n.is_some()) {
        let vertex = |(p, n): (Point3<f32>, Option<Vector3<f32>>)| Vertex {
            position: p,
            normal: n.unwrap_or_else(Vector3::zeros),
        };
        Triangle::new(vertex(corners[0]), vertex(corners[1]), vertex(corners[2]))
    } else {
        Triangle::flat([corners[0].0, corners[1].0, corners[2].0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "# a unit quad\n\
        o quad\n\
        v 0 0 0\n\
        v 1 0 0\n\
        v 1 1 0\n\
        v 0 1 0 1.0\n\
        vt 0 0\n\
        vn 0 0 1\n\
        usemtl none\n\
        f 1//1 2//1 3//1 4//1\n";

    #[test]
    fn test_quad_is_fan_triangulated() {
        let mesh = parse_obj(QUAD).expect("quad parses");
        assert_eq!(mesh.triangles.len(), 2);
        assert_eq!(mesh.triangles[1].vertices[2].position, Point3::new(0.0, 1.0, 0.0));
        assert_eq!(mesh.triangles[0].vertices[0].normal, Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_face_forms_and_negative_indices() {
        let text = "v 0 0 0\nv 2 0 0\nv 0 2 0\nf -3/1 -2/2 -1/3\nf 1 2 3\n";
        let mesh = parse_obj(text).expect("parses");
        assert_eq!(mesh.triangles.len(), 2);
        // no normals given: flat shading from the winding order
        assert_eq!(mesh.triangles[0].vertices[1].normal, Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(mesh.triangles[0].vertices[1].position, mesh.triangles[1].vertices[1].position);
    }

    #[test]
    fn test_out_of_range_index() {
        let err = parse_obj("v 0 0 0\nf 1 2 3\n").unwrap_err();
        assert_eq!(err, DecodeError::IndexOutOfRange { line: 2, index: 2 });
    }

    #[test]
    fn test_malformed_vertex() {
        let err = parse_obj("v 0 zero 0\n").unwrap_err();
        assert!(matches!(err, DecodeError::Syntax { line: 1, .. }));
    }
}
