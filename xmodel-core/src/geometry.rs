/// Geometry primitives for 3D rendering
use nalgebra::{Matrix4, Point3, Vector3};

/// A 3D vertex with position and normal
#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
}

impl Vertex {
    pub fn new(x: f32, y: f32, z: f32, nx: f32, ny: f32, nz: f32) -> Self {
        Self {
            position: Point3::new(x, y, z),
            normal: Vector3::new(nx, ny, nz),
        }
    }
}

/// A triangle face defined by three vertices
#[derive(Debug, Clone)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
}

impl Triangle {
    pub fn new(v0: Vertex, v1: Vertex, v2: Vertex) -> Self {
        Self {
            vertices: [v0, v1, v2],
        }
    }

    /// A triangle whose vertex normals are all the face normal.
    /// Degenerate triangles get a zero normal.
    pub fn flat(points: [Point3<f32>; 3]) -> Self {
        let normal = face_normal(&points);
        let vertex = |p: Point3<f32>| Vertex {
            position: p,
            normal,
        };
        Self::new(vertex(points[0]), vertex(points[1]), vertex(points[2]))
    }

    /// Face normal from the winding order; zero for a degenerate triangle
    pub fn calculate_normal(&self) -> Vector3<f32> {
        face_normal(&self.vertices.map(|v| v.position))
    }
}

fn face_normal(points: &[Point3<f32>; 3]) -> Vector3<f32> {
    (points[1] - points[0])
        .cross(&(points[2] - points[0]))
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(Vector3::zeros)
}

/// A 3D mesh composed of triangles
#[derive(Debug, Clone)]
pub struct Mesh {
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            triangles: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            triangles: Vec::with_capacity(capacity),
        }
    }

    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Build a flat-shaded mesh from packed `x, y, z` triangle positions.
    /// Trailing values that don't complete a triangle are ignored.
    pub fn from_positions(positions: &[f32]) -> Self {
        let mut mesh = Self::with_capacity(positions.len() / 9);
        for chunk in positions.chunks_exact(9) {
            let points = [
                Point3::new(chunk[0], chunk[1], chunk[2]),
                Point3::new(chunk[3], chunk[4], chunk[5]),
                Point3::new(chunk[6], chunk[7], chunk[8]),
            ];
            mesh.add_triangle(Triangle::flat(points));
        }
        mesh
    }

    /// Bounds of every vertex after applying `matrix`
    pub fn bounding_box(&self, matrix: &Matrix4<f32>) -> Aabb {
        let mut aabb = Aabb::empty();
        for triangle in &self.triangles {
            for vertex in &triangle.vertices {
                aabb.expand(&matrix.transform_point(&vertex.position));
            }
        }
        aabb
    }

    /// Axis-aligned cube of edge `size` centred on the origin, 12 outward
    /// facing triangles.
    pub fn cube(size: f32) -> Self {
        let half = size / 2.0;
        let (x, y, z) = (Vector3::x(), Vector3::y(), Vector3::z());
        // (normal, u, v) with u x v = normal
        let faces = [(z, x, y), (-z, y, x), (y, z, x), (-y, x, z), (x, y, z), (-x, z, y)];

        let mut mesh = Self::with_capacity(12);
        for (normal, u, v) in faces {
            let corner = |su: f32, sv: f32| Point3::from((normal + u * su + v * sv) * half);
            let quad = [corner(-1.0, -1.0), corner(1.0, -1.0), corner(1.0, 1.0), corner(-1.0, 1.0)];
            mesh.add_triangle(Triangle::flat([quad[0], quad[1], quad[2]]));
            mesh.add_triangle(Triangle::flat([quad[0], quad[2], quad[3]]));
        }
        mesh
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    /// A box containing nothing; expanding it by a point yields that point.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expand(&mut self, point: &Point3<f32>) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    pub fn union(&mut self, other: &Aabb) {
        if !other.is_empty() {
            self.expand(&other.min);
            self.expand(&other.max);
        }
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f32> {
        if self.is_empty() {
            Vector3::zeros()
        } else {
            self.max - self.min
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_bounds() {
        let cube = Mesh::cube(2.0);
        assert_eq!(cube.triangles.len(), 12);

        let aabb = cube.bounding_box(&Matrix4::identity());
        assert_eq!(aabb.min, Point3::new(-1.0, -1.0, -1.0));
        assert_eq!(aabb.size(), Vector3::new(2.0, 2.0, 2.0));

        for triangle in &cube.triangles {
            let centroid = triangle.vertices.iter().fold(Vector3::zeros(), |acc, v| acc + v.position.coords);
            assert!(triangle.calculate_normal().dot(&centroid) > 0.0);
        }

        let moved = cube.bounding_box(&Matrix4::new_translation(&Vector3::new(5.0, 0.0, 0.0)));
        assert_eq!(moved.center(), Point3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_from_positions() {
        let mesh = Mesh::from_positions(&[
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, // triangle
            9.0, 9.0, // stray values
        ]);
        assert_eq!(mesh.triangles.len(), 1);
        assert_eq!(mesh.triangles[0].vertices[2].normal, Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_empty_bounds() {
        let aabb = Mesh::new().bounding_box(&Matrix4::identity());
        assert!(aabb.is_empty());
        assert_eq!(aabb.size(), Vector3::zeros());
    }

    #[test]
    fn test_face_normal() {
        let triangle = Triangle::new(
            Vertex::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            Vertex::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            Vertex::new(0.0, 1.0, 0.0, 0.0, 0.0, 0.0),
        );
        assert_eq!(triangle.calculate_normal(), Vector3::new(0.0, 0.0, 1.0));
    }
}
