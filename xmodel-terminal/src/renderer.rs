/// ASCII rasterizer for terminal rendering
use crossterm::{
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use std::io::Write;
use xmodel_core::{Camera, Mesh, PointLight, Renderer, Scene, Scissor, Triangle, Viewport};

/// Character luminosity ramp for depth/shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Unlit faces still get this much light so silhouettes stay visible.
const AMBIENT: f32 = 0.1;

/// ASCII renderer that converts 3D meshes to terminal characters.
///
/// The page viewport is stretched over the character grid; scissor
/// rectangles arrive in page pixels and are tested per cell.
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    viewport: Viewport,
    scissor: Option<Scissor>,
    depth_buffer: Vec<f32>,
    char_buffer: Vec<char>,
}

impl AsciiRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            viewport: Viewport::new(width as f32, height as f32),
            scissor: None,
            depth_buffer: vec![f32::INFINITY; size],
            char_buffer: vec![' '; size],
        }
    }

    /// Resize the character grid (terminal columns and rows).
    pub fn resize(&mut self, width: usize, height: usize) {
        let size = width * height;
        self.width = width;
        self.height = height;
        self.depth_buffer = vec![f32::INFINITY; size];
        self.char_buffer = vec![' '; size];
    }

    pub fn char_at(&self, x: usize, y: usize) -> char {
        self.char_buffer[y * self.width + x]
    }

    fn render_mesh(&mut self, mesh: &Mesh, world: &Matrix4<f32>, camera: &Camera, light: &PointLight) {
        // Normals follow the inverse transpose; fall back to the plain basis
        // for degenerate (flattened) transforms.
        let basis = world.fixed_view::<3, 3>(0, 0).into_owned();
        let normal_matrix = basis
            .try_inverse()
            .map(|m| m.transpose())
            .unwrap_or(basis);

        for triangle in &mesh.triangles {
            self.render_triangle(triangle, world, &normal_matrix, camera, light);
        }
    }

    fn render_triangle(
        &mut self,
        triangle: &Triangle,
        world: &Matrix4<f32>,
        normal_matrix: &Matrix3<f32>,
        camera: &Camera,
        light: &PointLight,
    ) {
        // Project vertices to screen space
        let mut screen_coords = [(0.0, 0.0, 0.0); 3];
        for (coords, vertex) in screen_coords.iter_mut().zip(&triangle.vertices) {
            match camera.project_to_screen(
                &vertex.position,
                world,
                self.width as f32,
                self.height as f32,
            ) {
                Some(projected) => *coords = projected,
                None => return, // Triangle is clipped
            }
        }

        let centroid = triangle
            .vertices
            .iter()
            .fold(Vector3::zeros(), |acc, v| acc + v.position.coords)
            / 3.0;
        let centroid = world.transform_point(&Point3::from(centroid));
        let normal = (normal_matrix * triangle.vertices[0].normal).normalize();
        let to_light = (light.position - centroid).normalize();

        let energy = light.intensity * light.color.iter().sum::<f32>() / 3.0;
        let diffuse = normal.dot(&to_light).abs() * energy;
        let brightness = if diffuse.is_finite() {
            (AMBIENT + diffuse).min(1.0)
        } else {
            AMBIENT
        };

        // Map brightness to character
        let char_index = (brightness * (LUMINOSITY_RAMP.len() - 1) as f32) as usize;
        let char_index = char_index.min(LUMINOSITY_RAMP.len() - 1);
        let character = LUMINOSITY_RAMP[char_index];

        // Rasterize triangle using scanline algorithm
        self.rasterize_triangle(&screen_coords, character);
    }

    /// Whether the cell at (x, y) lies inside the current scissor.
    fn in_scissor(&self, x: usize, y: usize) -> bool {
        let Some(scissor) = self.scissor else {
            return true;
        };
        let px = (x as f32 + 0.5) / self.width as f32 * self.viewport.width;
        // scissor origin is bottom-left
        let py = self.viewport.height - (y as f32 + 0.5) / self.height as f32 * self.viewport.height;
        px >= scissor.x
            && px < scissor.x + scissor.width
            && py >= scissor.y
            && py < scissor.y + scissor.height
    }

    fn rasterize_triangle(&mut self, coords: &[(f32, f32, f32); 3], character: char) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let (v0, v1, v2) = (coords[0], coords[1], coords[2]);

        // Bounding box
        let min_x = v0.0.min(v1.0).min(v2.0).floor() as i32;
        let max_x = v0.0.max(v1.0).max(v2.0).ceil() as i32;
        let min_y = v0.1.min(v1.1).min(v2.1).floor() as i32;
        let max_y = v0.1.max(v1.1).max(v2.1).ceil() as i32;

        // Clip to screen bounds
        let min_x = min_x.max(0);
        let max_x = max_x.min(self.width as i32 - 1);
        let min_y = min_y.max(0);
        let max_y = max_y.min(self.height as i32 - 1);

        // Scanline rasterization
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                if !self.in_scissor(x as usize, y as usize) {
                    continue;
                }
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;

                // Barycentric coordinates
                if let Some((w0, w1, w2)) = barycentric(
                    (v0.0, v0.1),
                    (v1.0, v1.1),
                    (v2.0, v2.1),
                    (px, py),
                ) {
                    if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                        // Interpolate depth
                        let depth = w0 * v0.2 + w1 * v1.2 + w2 * v2.2;

                        let idx = y as usize * self.width + x as usize;
                        if depth < self.depth_buffer[idx] {
                            self.depth_buffer[idx] = depth;
                            self.char_buffer[idx] = character;
                        }
                    }
                }
            }
        }
    }

    pub fn draw<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = y * self.width + x;
                let c = self.char_buffer[idx];

                // Color based on character intensity
                let color = match c {
                    ' ' | '.' | ':' => Color::DarkGrey,
                    '-' | '=' => Color::Grey,
                    '+' | '*' => Color::White,
                    '#' | '%' | '@' => Color::Cyan,
                    _ => Color::White,
                };

                writer.queue(SetForegroundColor(color))?;
                writer.queue(Print(c))?;
            }
            if y + 1 < self.height {
                writer.queue(Print("\r\n"))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

impl Renderer for AsciiRenderer {
    /// Character grid size (columns, rows)
    type Surface = (usize, usize);

    fn surface(&self) -> Self::Surface {
        (self.width, self.height)
    }

    fn set_size(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn clear(&mut self, _color: [f32; 4]) {
        self.depth_buffer.fill(f32::INFINITY);
        self.char_buffer.fill(' ');
        self.scissor = None;
    }

    fn set_scissor(&mut self, scissor: Scissor) {
        self.scissor = Some(scissor);
    }

    fn render(&mut self, scene: &Scene, camera: &Camera) {
        for node in &scene.children {
            node.for_each_mesh(&Matrix4::identity(), &mut |mesh, world| {
                self.render_mesh(mesh, world, camera, &scene.light);
            });
        }
    }
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmodel_core::{Bounds, LayerConfig, SceneNode};

    fn scene_with_quad() -> Scene {
        // A 200x200 page-pixel square facing the viewer, centred on the page.
        let mut node = SceneNode::with_mesh(Mesh::cube(1.0));
        node.transform.scale = Vector3::new(200.0, 200.0, 200.0);
        let mut scene = Scene::new(LayerConfig::default().light.point_light());
        scene.light.position = Point3::new(0.0, 0.0, 2000.0);
        scene.add(node);
        scene
    }

    fn camera(viewport: Viewport) -> Camera {
        let mut camera = Camera::orthographic(&LayerConfig::default().orthographic);
        camera.set_orthographic_bounds(&viewport.bounds(), viewport);
        camera
    }

    #[test]
    fn test_barycentric_inside() {
        let w = barycentric((0.0, 0.0), (4.0, 0.0), (0.0, 4.0), (1.0, 1.0)).expect("non-degenerate");
        assert!(w.0 > 0.0 && w.1 > 0.0 && w.2 > 0.0);
        assert!(barycentric((0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (1.0, 1.0)).is_none());
    }

    #[test]
    fn test_renders_centered_model() {
        let viewport = Viewport::new(400.0, 400.0);
        let mut renderer = AsciiRenderer::new(40, 20);
        renderer.set_size(viewport);
        renderer.clear([0.0; 4]);
        renderer.render(&scene_with_quad(), &camera(viewport));

        assert_ne!(renderer.char_at(20, 10), ' ');
        assert_eq!(renderer.char_at(1, 1), ' ');
        assert_eq!(renderer.char_at(38, 18), ' ');
    }

    #[test]
    fn test_scissor_limits_drawing() {
        let viewport = Viewport::new(400.0, 400.0);
        let mut renderer = AsciiRenderer::new(40, 20);
        renderer.set_size(viewport);
        renderer.clear([0.0; 4]);
        // Left half of the page only
        let clip = Bounds::new(0.0, 0.0, 200.0, 400.0);
        renderer.set_scissor(Scissor {
            x: clip.left,
            y: viewport.height - clip.bottom,
            width: clip.width(),
            height: clip.height(),
        });
        renderer.render(&scene_with_quad(), &camera(viewport));

        assert_ne!(renderer.char_at(15, 10), ' ');
        assert_eq!(renderer.char_at(25, 10), ' ');

        renderer.clear([0.0; 4]);
        renderer.render(&scene_with_quad(), &camera(viewport));
        assert_ne!(renderer.char_at(25, 10), ' ');
    }

    #[test]
    fn test_draw_writes_every_cell() {
        let renderer = AsciiRenderer::new(3, 2);
        let mut out = Vec::new();
        renderer.draw(&mut out).expect("write to vec");
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(text.matches(' ').count(), 6);
    }
}
