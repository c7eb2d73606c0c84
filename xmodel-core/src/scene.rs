/// Scene graph: nodes, the point light and model normalization
use std::rc::Rc;

use nalgebra::{Matrix4, Point3, Vector3};

use crate::error::{LoadError, LoadResult};
use crate::geometry::{Aabb, Mesh};
use crate::transform::Transform;

/// A node in the scene graph.
///
/// Cloning is deep for transforms and children; mesh data is immutable and
/// shared between clones.
#[derive(Debug, Clone, Default)]
pub struct SceneNode {
    pub transform: Transform,
    pub mesh: Option<Rc<Mesh>>,
    pub children: Vec<SceneNode>,
    /// Extent of the normalized model (largest of X/Y is 1)
    pub size: Option<Vector3<f32>>,
}

impl SceneNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mesh(mesh: Mesh) -> Self {
        Self {
            mesh: Some(Rc::new(mesh)),
            ..Self::default()
        }
    }

    pub fn add(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    pub fn local_matrix(&self) -> Matrix4<f32> {
        self.transform.to_matrix()
    }

    /// Visit every mesh in this subtree with its world matrix.
    pub fn for_each_mesh<F>(&self, parent: &Matrix4<f32>, f: &mut F)
    where
        F: FnMut(&Mesh, &Matrix4<f32>),
    {
        let world = parent * self.local_matrix();
        if let Some(mesh) = &self.mesh {
            f(mesh, &world);
        }
        for child in &self.children {
            child.for_each_mesh(&world, f);
        }
    }

    /// World-space bounds of this subtree, treating this node as a root.
    pub fn bounding_box(&self) -> Aabb {
        let mut aabb = Aabb::empty();
        self.for_each_mesh(&Matrix4::identity(), &mut |mesh, world| {
            aabb.union(&mesh.bounding_box(world));
        });
        aabb
    }

    pub fn triangle_count(&self) -> usize {
        let mut count = 0;
        self.for_each_mesh(&Matrix4::identity(), &mut |mesh, _| {
            count += mesh.triangles.len();
        });
        count
    }
}

/// Rescale `node` so its largest horizontal/vertical extent is one unit and
/// centre it on the origin. The normalized size is recorded on the node.
pub fn normalize(mut node: SceneNode, locator: &str) -> LoadResult<SceneNode> {
    let aabb = node.bounding_box();
    let size = aabb.size();
    let extent = size.x.max(size.y);
    if aabb.is_empty() || extent <= 0.0 || !extent.is_finite() {
        return Err(LoadError::EmptyModel(locator.to_string()));
    }

    let scale = 1.0 / extent;
    let center = aabb.center().coords;
    node.transform.position = (node.transform.position - center) * scale;
    node.transform.scale *= scale;
    node.size = Some(size * scale);
    Ok(node)
}

/// Wrap a normalized model in a container node. The container is what gets
/// placed per element, so the model's own centring transform is preserved.
pub fn create_container(model: SceneNode) -> SceneNode {
    SceneNode {
        size: model.size,
        children: vec![model],
        ..SceneNode::default()
    }
}

/// Point light illuminating the scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: Point3<f32>,
}

/// The scene handed to a renderer: a light plus the nodes currently in it.
#[derive(Debug, Clone)]
pub struct Scene {
    pub light: PointLight,
    pub children: Vec<SceneNode>,
}

impl Scene {
    pub fn new(light: PointLight) -> Self {
        Self {
            light,
            children: Vec::new(),
        }
    }

    pub fn add(&mut self, node: SceneNode) {
        self.children.push(node);
    }

    /// Remove and return the most recently added node.
    pub fn remove_last(&mut self) -> Option<SceneNode> {
        self.children.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Mesh;

    #[test]
    fn test_normalize_wide_model() {
        // 4 x 2 x 2 box centred at (10, 0, 0)
        let mut node = SceneNode::with_mesh(Mesh::cube(2.0));
        node.transform.scale = Vector3::new(2.0, 1.0, 1.0);
        node.transform.position = Vector3::new(10.0, 0.0, 0.0);

        let normalized = normalize(node, "wide.obj").expect("normalizes");
        let aabb = normalized.bounding_box();
        assert!((aabb.center().coords).norm() < 1e-5);
        assert!((aabb.size() - Vector3::new(1.0, 0.5, 0.5)).norm() < 1e-5);
        assert_eq!(normalized.size, Some(Vector3::new(1.0, 0.5, 0.5)));
    }

    #[test]
    fn test_normalize_empty_model_fails() {
        let result = normalize(SceneNode::with_mesh(Mesh::new()), "empty.obj");
        assert_eq!(result.unwrap_err(), LoadError::EmptyModel("empty.obj".into()));
    }

    #[test]
    fn test_clones_share_geometry_not_transforms() {
        let template = create_container(
            normalize(SceneNode::with_mesh(Mesh::cube(1.0)), "cube.obj").expect("normalizes"),
        );
        let mut a = template.clone();
        let b = template.clone();
        a.transform.position = Vector3::new(1.0, 2.0, 3.0);
        a.children[0].transform.scale *= 4.0;

        assert_eq!(b.transform.position, Vector3::zeros());
        assert_eq!(b.children[0].transform.scale, template.children[0].transform.scale);
        assert!(Rc::ptr_eq(
            a.children[0].mesh.as_ref().expect("mesh"),
            b.children[0].mesh.as_ref().expect("mesh"),
        ));
    }

    #[test]
    fn test_scene_add_remove() {
        let mut scene = Scene::new(PointLight {
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
            position: Point3::origin(),
        });
        scene.add(SceneNode::with_mesh(Mesh::cube(1.0)));
        assert_eq!(scene.children.len(), 1);
        assert_eq!(scene.remove_last().map(|n| n.triangle_count()), Some(12));
        assert!(scene.children.is_empty());
    }
}
