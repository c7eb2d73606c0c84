/// STL decoder for binary and ASCII formats
use nom::{
    bytes::complete::{tag, take_till},
    character::complete::{multispace0, multispace1},
    multi::many0,
    number::complete::float,
    sequence::preceded,
    IResult,
};

use nalgebra::{Point3, Vector3};

use crate::error::DecodeError;
use crate::geometry::{Mesh, Triangle, Vertex};

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

/// Parse a binary STL file
pub fn parse_binary_stl(data: &[u8]) -> Result<Mesh, DecodeError> {
    if data.len() < HEADER_LEN + 4 {
        return Err(DecodeError::TooSmall);
    }

    let count = read_u32(data, HEADER_LEN) as usize;
    let facets = &data[HEADER_LEN + 4..];
    if facets.len() / FACET_LEN < count {
        return Err(DecodeError::UnexpectedEof);
    }

    let mut mesh = Mesh::with_capacity(count);
    for facet in facets.chunks_exact(FACET_LEN).take(count) {
        // normal, three vertices, then a 2-byte attribute count
        let vector = |index: usize| {
            let offset = index * 12;
            Vector3::new(
                read_f32(facet, offset),
                read_f32(facet, offset + 4),
                read_f32(facet, offset + 8),
            )
        };
        let normal = vector(0);
        let vertex = |index: usize| Vertex {
            position: Point3::from(vector(index)),
            normal,
        };
        mesh.add_triangle(with_face_normal(Triangle::new(vertex(1), vertex(2), vertex(3))));
    }

    Ok(mesh)
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn read_f32(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

/// Many exporters write zero normals; fall back to the winding order.
fn with_face_normal(mut triangle: Triangle) -> Triangle {
    if triangle.vertices[0].normal.norm_squared() == 0.0 {
        let normal = triangle.calculate_normal();
        for vertex in &mut triangle.vertices {
            vertex.normal = normal;
        }
    }
    triangle
}

/// Parse an ASCII STL file
pub fn parse_ascii_stl(input: &str) -> Result<Mesh, DecodeError> {
    match parse_ascii_stl_impl(input) {
        Ok((_, mesh)) => Ok(mesh),
        Err(e) => Err(DecodeError::Syntax {
            line: 0,
            message: format!("invalid ASCII STL: {:?}", e),
        }),
    }
}

fn parse_ascii_stl_impl(input: &str) -> IResult<&str, Mesh> {
    let (input, _) = preceded(multispace0, tag("solid"))(input)?;
    // Optional solid name
    let (input, _) = take_till(|c| c == '\n')(input)?;
    let (input, triangles) = many0(parse_facet)(input)?;
    let (input, _) = preceded(multispace0, tag("endsolid"))(input)?;

    let mut mesh = Mesh::with_capacity(triangles.len());
    for triangle in triangles {
        mesh.add_triangle(with_face_normal(triangle));
    }

    Ok((input, mesh))
}

fn parse_facet(input: &str) -> IResult<&str, Triangle> {
    let (input, _) = preceded(multispace0, tag("facet"))(input)?;
    let (input, _) = preceded(multispace1, tag("normal"))(input)?;
    let (input, normal) = parse_vector3(input)?;
    let (input, _) = preceded(multispace0, tag("outer"))(input)?;
    let (input, _) = preceded(multispace1, tag("loop"))(input)?;
    let (input, v1) = parse_vertex(input, normal)?;
    let (input, v2) = parse_vertex(input, normal)?;
    let (input, v3) = parse_vertex(input, normal)?;
    let (input, _) = preceded(multispace0, tag("endloop"))(input)?;
    let (input, _) = preceded(multispace0, tag("endfacet"))(input)?;

    Ok((input, Triangle::new(v1, v2, v3)))
}

fn parse_vertex(input: &str, normal: (f32, f32, f32)) -> IResult<&str, Vertex> {
    let (input, _) = preceded(multispace0, tag("vertex"))(input)?;
    let (input, (x, y, z)) = parse_vector3(input)?;
    Ok((input, Vertex::new(x, y, z, normal.0, normal.1, normal.2)))
}

fn parse_vector3(input: &str) -> IResult<&str, (f32, f32, f32)> {
    let (input, _) = multispace0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, z) = float(input)?;
    Ok((input, (x, y, z)))
}

/// Detect and parse STL file (binary or ASCII)
pub fn parse_stl(data: &[u8]) -> Result<Mesh, DecodeError> {
    // Binary files may also start with "solid", so only trust ASCII if it parses.
    if data.len() > 5 && &data[0..5] == b"solid" {
        if let Ok(text) = std::str::from_utf8(data) {
            if let Ok(mesh) = parse_ascii_stl(text) {
                return Ok(mesh);
            }
        }
    }

    parse_binary_stl(data)
}
