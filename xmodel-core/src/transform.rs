/// 3D transformation matrices, rotation state and the DOM transform resolver
use nalgebra::{Matrix3, Matrix4, UnitQuaternion, Vector3};
use tracing::trace;

use crate::css;
use crate::dom::DomElement;

/// Rotation state around three axes (in radians)
#[derive(Debug, Clone, Copy)]
pub struct RotationState {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl RotationState {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    /// Rotate by delta amounts (in radians)
    pub fn rotate(&mut self, dx: f32, dy: f32, dz: f32) {
        self.x += dx;
        self.y += dy;
        self.z += dz;
    }
}

impl Default for RotationState {
    fn default() -> Self {
        Self::zero()
    }
}

/// Position / rotation / scale of a scene node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Decompose an affine matrix into position, rotation and scale.
    ///
    /// A reflection is folded into a negative X scale. Shear is discarded by
    /// taking the closest rotation.
    pub fn from_matrix(matrix: &Matrix4<f32>) -> Self {
        let basis = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let mut scale = Vector3::new(
            basis.column(0).norm(),
            basis.column(1).norm(),
            basis.column(2).norm(),
        );
        if basis.determinant() < 0.0 {
            scale.x = -scale.x;
        }

        let mut rotation = Matrix3::zeros();
        for i in 0..3 {
            let s = if scale[i] != 0.0 { scale[i] } else { 1.0 };
            rotation.set_column(i, &(basis.column(i) / s));
        }

        Self {
            position: matrix.fixed_view::<3, 1>(0, 3).into_owned(),
            rotation: UnitQuaternion::from_matrix(&rotation),
            scale,
        }
    }

    /// Compose back into a matrix (translate * rotate * scale).
    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.scale)
    }

    /// Create a rotation matrix from a rotation state
    pub fn rotation_matrix(rotation: &RotationState) -> Matrix4<f32> {
        let rx = Matrix4::new_rotation(Vector3::new(rotation.x, 0.0, 0.0));
        let ry = Matrix4::new_rotation(Vector3::new(0.0, rotation.y, 0.0));
        let rz = Matrix4::new_rotation(Vector3::new(0.0, 0.0, rotation.z));

        // Apply rotations in order: Z, Y, X
        rz * ry * rx
    }

    /// Create a translation matrix
    pub fn translation_matrix(x: f32, y: f32, z: f32) -> Matrix4<f32> {
        Matrix4::new_translation(&Vector3::new(x, y, z))
    }
}

/// Resolve the accumulated transform of `element` and all its ancestors.
///
/// The result places a unit object at the element's centre, in a Y-up frame
/// whose origin is the document's top-left corner, carrying every ancestor
/// transform applied about its own `transform-origin`. An element with no
/// rendered size gets the identity.
pub fn resolve_element_transform<E: DomElement>(element: &E) -> Matrix4<f32> {
    let width = element.offset_width();
    let height = element.offset_height();
    if width == 0.0 || height == 0.0 {
        return Matrix4::identity();
    }

    // Transforms have to be applied from the root, so walk up collecting
    // nodes, resolving the element's page position on the way.
    let mut stack = Vec::new();
    let mut offset_parent = Some(element.clone());
    let mut pos_x = 0.0;
    let mut pos_y = 0.0;
    for node in element.ancestors_inclusive() {
        if offset_parent.as_ref() == Some(&node) {
            pos_x += node.offset_left();
            pos_y += node.offset_top();
            offset_parent = node.offset_parent();
        }
        pos_x -= node.scroll_left();
        pos_y -= node.scroll_top();
        stack.push(node);
    }

    let mut matrix = Transform::translation_matrix(pos_x + width / 2.0, -(pos_y + height / 2.0), 0.0);

    while let Some(node) = stack.pop() {
        let style = node.computed_style();
        let origin = css::parse_origin_value(&style.transform_origin);
        let transform = css::parse_transform_value(&style.transform);

        // The engine applies transforms about the box centre; CSS uses
        // `transform-origin`. Shift by the difference when there is one.
        let ox = origin.x - node.offset_width() / 2.0;
        let oy = origin.y - node.offset_height() / 2.0;
        let oz = origin.z;

        if ox != 0.0 || oy != 0.0 || oz != 0.0 {
            matrix *= Transform::translation_matrix(ox, -oy, oz)
                * transform
                * Transform::translation_matrix(-ox, oy, -oz);
        } else {
            matrix *= transform;
        }
    }

    trace!(x = pos_x, y = pos_y, "resolved element transform");
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;
    use nalgebra::Point3;

    const EPS: f32 = 1e-4;

    fn position(m: &Matrix4<f32>) -> Vector3<f32> {
        m.transform_point(&Point3::origin()).coords
    }

    #[test]
    fn test_rotation_state() {
        let mut state = RotationState::zero();
        assert_eq!(state.x, 0.0);
        assert_eq!(state.y, 0.0);
        assert_eq!(state.z, 0.0);

        state.rotate(0.1, 0.2, 0.3);
        assert!((state.x - 0.1).abs() < 1e-6);
        assert!((state.y - 0.2).abs() < 1e-6);
        assert!((state.z - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_identity_rotation() {
        let rotation = RotationState::zero();
        let matrix = Transform::rotation_matrix(&rotation);
        assert!((matrix - Matrix4::identity()).norm() < 1e-6);
    }

    #[test]
    fn test_decompose_recompose() {
        let source = Transform {
            position: Vector3::new(12.0, -4.0, 7.5),
            rotation: UnitQuaternion::from_euler_angles(0.3, -0.6, 1.1),
            scale: Vector3::new(2.0, 3.0, 0.5),
        };
        let decomposed = Transform::from_matrix(&source.to_matrix());
        assert!((decomposed.position - source.position).norm() < EPS);
        assert!((decomposed.scale - source.scale).norm() < EPS);
        assert!(decomposed.rotation.angle_to(&source.rotation) < EPS);
    }

    #[test]
    fn test_zero_size_is_identity() {
        let doc = MemoryDocument::new(800.0, 600.0);
        let el = doc.create_element("x-model");
        el.set_box(50.0, 30.0, 0.0, 100.0);
        el.set_transform("matrix(1, 0, 0, 1, 10, 20)");
        doc.root().append_child(&el);
        assert_eq!(resolve_element_transform(&el), Matrix4::identity());
    }

    #[test]
    fn test_untransformed_element_centre() {
        let doc = MemoryDocument::new(800.0, 600.0);
        let el = doc.create_element("x-model");
        el.set_box(50.0, 30.0, 200.0, 100.0);
        doc.root().append_child(&el);

        let m = resolve_element_transform(&el);
        assert!((position(&m) - Vector3::new(150.0, -80.0, 0.0)).norm() < EPS);
        assert!((m.fixed_view::<3, 3>(0, 0).into_owned() - Matrix3::identity()).norm() < EPS);
    }

    #[test]
    fn test_scroll_offsets_are_subtracted() {
        let doc = MemoryDocument::new(800.0, 600.0);
        let scroller = doc.create_element("div");
        scroller.set_box(0.0, 0.0, 800.0, 400.0);
        scroller.set_scroll(25.0, 300.0);
        let el = doc.create_element("x-model");
        el.set_box(100.0, 500.0, 100.0, 100.0);
        doc.root().append_child(&scroller);
        scroller.append_child(&el);

        let m = resolve_element_transform(&el);
        assert!((position(&m) - Vector3::new(125.0, -250.0, 0.0)).norm() < EPS);
    }

    #[test]
    fn test_translate_flips_y() {
        let doc = MemoryDocument::new(800.0, 600.0);
        let el = doc.create_element("x-model");
        el.set_box(0.0, 0.0, 100.0, 100.0);
        el.set_transform("matrix(1, 0, 0, 1, 10, 20)");
        doc.root().append_child(&el);

        let m = resolve_element_transform(&el);
        assert!((position(&m) - Vector3::new(60.0, -70.0, 0.0)).norm() < EPS);
    }

    #[test]
    fn test_transform_origin_corner() {
        // rotate(90deg) about the top-left corner moves the box centre
        // from (50, 50) to (-50, 50) in CSS pixels.
        let doc = MemoryDocument::new(800.0, 600.0);
        let el = doc.create_element("x-model");
        el.set_box(0.0, 0.0, 100.0, 100.0);
        el.set_transform("matrix(0, 1, -1, 0, 0, 0)");
        el.set_transform_origin("0px 0px");
        doc.root().append_child(&el);

        let m = resolve_element_transform(&el);
        assert!((position(&m) - Vector3::new(-50.0, -50.0, 0.0)).norm() < EPS);
    }

    #[test]
    fn test_centre_origin_matches_general_form() {
        let doc = MemoryDocument::new(800.0, 600.0);
        let el = doc.create_element("x-model");
        el.set_box(10.0, 10.0, 100.0, 60.0);
        el.set_transform("matrix(0.8, 0.6, -0.6, 0.8, 5, 5)");
        doc.root().append_child(&el);
        let implicit = resolve_element_transform(&el);

        el.set_transform_origin("50px 30px 0px");
        let explicit = resolve_element_transform(&el);
        assert!((implicit - explicit).norm() < EPS);
    }

    #[test]
    fn test_ancestor_transforms_compose_root_first() {
        let doc = MemoryDocument::new(800.0, 600.0);
        let outer = doc.create_element("div");
        outer.set_box(0.0, 0.0, 100.0, 100.0);
        outer.set_transform("matrix(2, 0, 0, 2, 0, 0)");
        let el = doc.create_element("x-model");
        el.set_box(0.0, 0.0, 100.0, 100.0);
        el.set_transform("matrix(1, 0, 0, 1, 10, 0)");
        doc.root().append_child(&outer);
        outer.append_child(&el);

        // The scale applies to the child's translation.
        let m = resolve_element_transform(&el);
        assert!((position(&m) - Vector3::new(70.0, -50.0, 0.0)).norm() < EPS);
        let t = Transform::from_matrix(&m);
        assert!((t.scale - Vector3::new(2.0, 2.0, 1.0)).norm() < EPS);
    }
}
