/// Cameras that reproduce CSS projection
///
/// Engine space has its origin at the viewport centre, X right, Y up and one
/// unit per CSS pixel. The orthographic camera maps the viewport 1:1; the
/// perspective camera sits `perspective` pixels in front of the `z = 0`
/// plane with a field of view chosen so that plane still maps 1:1.
use nalgebra::{Matrix4, Point3, Vector3, Vector4};

use crate::config::CameraConfig;
use crate::dom::{Bounds, Viewport};

/// Projection mode for rendering
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectionMode {
    Orthographic,
    Perspective,
}

/// Camera configuration for 3D rendering
#[derive(Debug, Clone)]
pub struct Camera {
    pub mode: ProjectionMode,
    pub position: Point3<f32>,
    /// Vertical field of view in degrees (perspective only)
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    // Frustum edges (orthographic only)
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    /// Far plane from configuration; perspective setups may push past it
    configured_far: f32,
    projection: Matrix4<f32>,
}

impl Camera {
    pub fn perspective(config: &CameraConfig) -> Self {
        let mut camera = Self::with_mode(ProjectionMode::Perspective, config);
        camera.update_projection_matrix();
        camera
    }

    pub fn orthographic(config: &CameraConfig) -> Self {
        let mut camera = Self::with_mode(ProjectionMode::Orthographic, config);
        camera.update_projection_matrix();
        camera
    }

    fn with_mode(mode: ProjectionMode, config: &CameraConfig) -> Self {
        Self {
            mode,
            position: Point3::origin(),
            fov: 50.0,
            aspect: 1.0,
            near: config.near,
            far: config.far,
            left: -1.0,
            right: 1.0,
            top: 1.0,
            bottom: -1.0,
            configured_far: config.far,
            projection: Matrix4::identity(),
        }
    }

    /// Recompute the projection matrix from the camera's parameters.
    pub fn update_projection_matrix(&mut self) {
        self.projection = match self.mode {
            ProjectionMode::Perspective => {
                let top = self.near * (self.fov.to_radians() / 2.0).tan();
                let height = 2.0 * top;
                let width = self.aspect * height;
                frustum(-width / 2.0, width / 2.0, top, top - height, self.near, self.far)
            }
            ProjectionMode::Orthographic => {
                orthographic(self.left, self.right, self.top, self.bottom, self.near, self.far)
            }
        };
    }

    pub fn projection_matrix(&self) -> &Matrix4<f32> {
        &self.projection
    }

    /// Create the view matrix (camera transformation). Cameras never rotate.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_translation(&-self.position.coords)
    }

    /// Span `bounds` (client coordinates) with an orthographic projection.
    pub fn set_orthographic_bounds(&mut self, bounds: &Bounds, viewport: Viewport) {
        let half_width = viewport.width / 2.0;
        let half_height = viewport.height / 2.0;
        self.mode = ProjectionMode::Orthographic;
        self.position = Point3::origin();
        self.left = bounds.left - half_width;
        self.right = bounds.right - half_width;
        self.top = half_height - bounds.top;
        self.bottom = half_height - bounds.bottom;
        self.update_projection_matrix();
    }

    /// Configure a perspective projection matching CSS `perspective` and
    /// `perspective-origin` declared on the element whose client rect is
    /// `bounds`.
    ///
    /// A perspective-origin away from the viewport centre shears the
    /// frustum: the projection is wrapped in a translation to the origin and
    /// the matching clip-space translation back.
    pub fn set_perspective(
        &mut self,
        bounds: &Bounds,
        perspective: f32,
        origin: &Vector3<f32>,
        viewport: Viewport,
    ) {
        let half_width = viewport.width / 2.0;
        let half_height = viewport.height / 2.0;
        self.mode = ProjectionMode::Perspective;
        self.fov = (2.0 * (half_height / perspective).atan()).to_degrees();
        self.aspect = viewport.aspect();
        self.position = Point3::new(0.0, 0.0, perspective);
        // The page plane sits `perspective` away and must stay inside far.
        self.far = self.configured_far.max(perspective * 2.0);
        self.update_projection_matrix();

        // `50% 50%` of a viewport-sized element is the unsheared default.
        let origin_x = half_width - bounds.left - origin.x;
        let origin_y = half_height - bounds.top - origin.y;
        if origin_x != 0.0 || origin_y != 0.0 {
            let to_origin = Matrix4::new_translation(&Vector3::new(
                -origin_x / half_width,
                origin_y / half_height,
                0.0,
            ));
            let from_origin = Matrix4::new_translation(&Vector3::new(origin_x, -origin_y, 0.0));
            self.projection = to_origin * self.projection * from_origin;
        }
    }

    /// Project a point to normalized device coordinates. Points behind the
    /// camera yield `None`.
    pub fn project(&self, point: &Point3<f32>, model_matrix: &Matrix4<f32>) -> Option<Point3<f32>> {
        let mvp = self.projection * self.view_matrix() * model_matrix;
        let clip: Vector4<f32> = mvp * point.to_homogeneous();

        // Prevent division by near-zero depth values
        if clip.w <= 1e-6 {
            return None;
        }
        Some(Point3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w))
    }

    /// Project a 3D point to 2D screen space (top-left origin) plus NDC depth.
    /// Points outside the near/far planes are rejected.
    pub fn project_to_screen(
        &self,
        point: &Point3<f32>,
        model_matrix: &Matrix4<f32>,
        width: f32,
        height: f32,
    ) -> Option<(f32, f32, f32)> {
        let ndc = self.project(point, model_matrix)?;
        if ndc.z < -1.0 || ndc.z > 1.0 {
            return None;
        }

        let screen_x = (ndc.x + 1.0) * 0.5 * width;
        let screen_y = (1.0 - ndc.y) * 0.5 * height;
        Some((screen_x, screen_y, ndc.z))
    }
}

fn frustum(left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) -> Matrix4<f32> {
    let x = 2.0 * near / (right - left);
    let y = 2.0 * near / (top - bottom);
    let a = (right + left) / (right - left);
    let b = (top + bottom) / (top - bottom);
    let c = -(far + near) / (far - near);
    let d = -2.0 * far * near / (far - near);
    Matrix4::new(
        x, 0.0, a, 0.0,
        0.0, y, b, 0.0,
        0.0, 0.0, c, d,
        0.0, 0.0, -1.0, 0.0,
    )
}

fn orthographic(left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) -> Matrix4<f32> {
    let w = 1.0 / (right - left);
    let h = 1.0 / (top - bottom);
    let p = 1.0 / (far - near);
    Matrix4::new(
        2.0 * w, 0.0, 0.0, -(right + left) * w,
        0.0, 2.0 * h, 0.0, -(top + bottom) * h,
        0.0, 0.0, -2.0 * p, -(far + near) * p,
        0.0, 0.0, 0.0, 1.0,
    )
}
