/// WebGL2 renderer drawing into a page-sized overlay canvas
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use js_sys::{Float32Array, Object, Reflect};
use nalgebra::{Matrix3, Matrix4};
use tracing::{debug, error};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    HtmlCanvasElement, WebGl2RenderingContext as Gl, WebGlBuffer, WebGlProgram, WebGlShader,
    WebGlUniformLocation,
};
use xmodel_core::{Camera, Mesh, Renderer, Scene, SceneNode, Scissor, Viewport};

const VERTEX_SHADER: &str = r#"#version 300 es
in vec3 a_position;
in vec3 a_normal;
uniform mat4 u_model;
uniform mat4 u_view_projection;
uniform mat3 u_normal;
out vec3 v_world;
out vec3 v_normal;
void main() {
    vec4 world = u_model * vec4(a_position, 1.0);
    v_world = world.xyz;
    v_normal = u_normal * a_normal;
    gl_Position = u_view_projection * world;
}
"#;

const FRAGMENT_SHADER: &str = r#"#version 300 es
precision highp float;
in vec3 v_world;
in vec3 v_normal;
uniform vec3 u_light_position;
uniform vec3 u_light_color;
out vec4 color;
void main() {
    vec3 n = normalize(v_normal);
    vec3 l = normalize(u_light_position - v_world);
    vec3 lit = vec3(0.1) + u_light_color * abs(dot(n, l));
    color = vec4(min(lit, vec3(1.0)), 1.0);
}
"#;

/// Floats per vertex: position then normal
const STRIDE: usize = 6;

struct Uniforms {
    model: Option<WebGlUniformLocation>,
    view_projection: Option<WebGlUniformLocation>,
    normal: Option<WebGlUniformLocation>,
    light_position: Option<WebGlUniformLocation>,
    light_color: Option<WebGlUniformLocation>,
}

/// Uploaded geometry, valid while the mesh it came from is alive
struct GpuMesh {
    source: Weak<Mesh>,
    buffer: WebGlBuffer,
    vertex_count: i32,
}

pub struct WebGlRenderer {
    canvas: HtmlCanvasElement,
    gl: Gl,
    program: WebGlProgram,
    uniforms: Uniforms,
    position_attrib: u32,
    normal_attrib: u32,
    meshes: HashMap<usize, GpuMesh>,
    pixel_ratio: f32,
}

impl WebGlRenderer {
    /// Create a detached overlay canvas with a WebGL2 context.
    pub fn new() -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let canvas: HtmlCanvasElement = document.create_element("canvas")?.dyn_into()?;

        let style = canvas.style();
        style.set_property("position", "fixed")?;
        style.set_property("left", "0")?;
        style.set_property("top", "0")?;
        style.set_property("pointer-events", "none")?;

        let options = Object::new();
        Reflect::set(&options, &"alpha".into(), &JsValue::TRUE)?;
        Reflect::set(&options, &"antialias".into(), &JsValue::TRUE)?;
        let gl: Gl = canvas
            .get_context_with_context_options("webgl2", &options)?
            .ok_or_else(|| JsValue::from_str("WebGL2 is not available"))?
            .dyn_into()?;

        let vertex = compile_shader(&gl, Gl::VERTEX_SHADER, VERTEX_SHADER)?;
        let fragment = compile_shader(&gl, Gl::FRAGMENT_SHADER, FRAGMENT_SHADER)?;
        let program = link_program(&gl, &vertex, &fragment)?;

        let uniforms = Uniforms {
            model: gl.get_uniform_location(&program, "u_model"),
            view_projection: gl.get_uniform_location(&program, "u_view_projection"),
            normal: gl.get_uniform_location(&program, "u_normal"),
            light_position: gl.get_uniform_location(&program, "u_light_position"),
            light_color: gl.get_uniform_location(&program, "u_light_color"),
        };
        let position_attrib = attrib_location(&gl, &program, "a_position")?;
        let normal_attrib = attrib_location(&gl, &program, "a_normal")?;

        gl.enable(Gl::DEPTH_TEST);
        gl.enable(Gl::SCISSOR_TEST);

        Ok(Self {
            canvas,
            gl,
            program,
            uniforms,
            position_attrib,
            normal_attrib,
            meshes: HashMap::new(),
            pixel_ratio: window.device_pixel_ratio() as f32,
        })
    }

    fn upload(&mut self, mesh: &Rc<Mesh>) -> Option<(WebGlBuffer, i32)> {
        let key = Rc::as_ptr(mesh) as usize;
        if let Some(gpu) = self.meshes.get(&key) {
            if gpu.source.upgrade().is_some_and(|m| Rc::ptr_eq(&m, mesh)) {
                return Some((gpu.buffer.clone(), gpu.vertex_count));
            }
        }

        // Drop uploads whose meshes are gone before adding more.
        let gl = &self.gl;
        self.meshes.retain(|_, gpu| {
            let alive = gpu.source.strong_count() > 0;
            if !alive {
                gl.delete_buffer(Some(&gpu.buffer));
            }
            alive
        });

        let data = interleave(mesh);
        let buffer = self.gl.create_buffer()?;
        self.gl.bind_buffer(Gl::ARRAY_BUFFER, Some(&buffer));
        self.gl.buffer_data_with_array_buffer_view(
            Gl::ARRAY_BUFFER,
            &Float32Array::from(data.as_slice()),
            Gl::STATIC_DRAW,
        );
        let vertex_count = (data.len() / STRIDE) as i32;
        debug!(vertex_count, "uploaded mesh");

        self.meshes.insert(
            key,
            GpuMesh {
                source: Rc::downgrade(mesh),
                buffer: buffer.clone(),
                vertex_count,
            },
        );
        Some((buffer, vertex_count))
    }

    fn draw_node(&mut self, node: &SceneNode, parent: &Matrix4<f32>) {
        let world = parent * node.local_matrix();
        if let Some(mesh) = &node.mesh {
            if let Some((buffer, count)) = self.upload(mesh) {
                let basis = world.fixed_view::<3, 3>(0, 0).into_owned();
                let normal: Matrix3<f32> =
                    basis.try_inverse().map(|m| m.transpose()).unwrap_or(basis);

                let gl = &self.gl;
                gl.uniform_matrix4fv_with_f32_array(self.uniforms.model.as_ref(), false, world.as_slice());
                gl.uniform_matrix3fv_with_f32_array(self.uniforms.normal.as_ref(), false, normal.as_slice());

                gl.bind_buffer(Gl::ARRAY_BUFFER, Some(&buffer));
                let stride = (STRIDE * 4) as i32;
                gl.enable_vertex_attrib_array(self.position_attrib);
                gl.vertex_attrib_pointer_with_i32(self.position_attrib, 3, Gl::FLOAT, false, stride, 0);
                gl.enable_vertex_attrib_array(self.normal_attrib);
                gl.vertex_attrib_pointer_with_i32(self.normal_attrib, 3, Gl::FLOAT, false, stride, 12);
                gl.draw_arrays(Gl::TRIANGLES, 0, count);
            }
        }
        for child in &node.children {
            self.draw_node(child, &world);
        }
    }
}

impl Renderer for WebGlRenderer {
    type Surface = HtmlCanvasElement;

    fn surface(&self) -> Self::Surface {
        self.canvas.clone()
    }

    fn set_size(&mut self, viewport: Viewport) {
        if let Some(window) = web_sys::window() {
            self.pixel_ratio = window.device_pixel_ratio() as f32;
        }
        let width = (viewport.width * self.pixel_ratio) as u32;
        let height = (viewport.height * self.pixel_ratio) as u32;
        if self.canvas.width() != width || self.canvas.height() != height {
            self.canvas.set_width(width);
            self.canvas.set_height(height);
            let style = self.canvas.style();
            let sized = style
                .set_property("width", &format!("{}px", viewport.width))
                .and_then(|_| style.set_property("height", &format!("{}px", viewport.height)));
            if let Err(e) = sized {
                error!(error = ?e, "failed to size canvas");
            }
        }
        self.gl.viewport(0, 0, width as i32, height as i32);
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.gl.disable(Gl::SCISSOR_TEST);
        self.gl.clear_color(color[0], color[1], color[2], color[3]);
        self.gl.clear(Gl::COLOR_BUFFER_BIT | Gl::DEPTH_BUFFER_BIT);
        self.gl.enable(Gl::SCISSOR_TEST);
    }

    fn set_scissor(&mut self, scissor: Scissor) {
        let r = self.pixel_ratio;
        self.gl.scissor(
            (scissor.x * r) as i32,
            (scissor.y * r) as i32,
            (scissor.width * r) as i32,
            (scissor.height * r) as i32,
        );
    }

    fn render(&mut self, scene: &Scene, camera: &Camera) {
        self.gl.use_program(Some(&self.program));

        let view_projection = camera.projection_matrix() * camera.view_matrix();
        self.gl.uniform_matrix4fv_with_f32_array(
            self.uniforms.view_projection.as_ref(),
            false,
            view_projection.as_slice(),
        );
        let light = &scene.light;
        self.gl.uniform3f(
            self.uniforms.light_position.as_ref(),
            light.position.x,
            light.position.y,
            light.position.z,
        );
        self.gl.uniform3f(
            self.uniforms.light_color.as_ref(),
            light.color[0] * light.intensity,
            light.color[1] * light.intensity,
            light.color[2] * light.intensity,
        );

        for node in &scene.children {
            self.draw_node(node, &Matrix4::identity());
        }
    }
}

/// Flatten a mesh into interleaved position/normal vertices.
fn interleave(mesh: &Mesh) -> Vec<f32> {
    let mut data = Vec::with_capacity(mesh.triangles.len() * 3 * STRIDE);
    for triangle in &mesh.triangles {
        for vertex in &triangle.vertices {
            data.extend_from_slice(vertex.position.coords.as_slice());
            data.extend_from_slice(vertex.normal.as_slice());
        }
    }
    data
}

fn compile_shader(gl: &Gl, kind: u32, source: &str) -> Result<WebGlShader, JsValue> {
    let shader = gl
        .create_shader(kind)
        .ok_or_else(|| JsValue::from_str("unable to create shader"))?;
    gl.shader_source(&shader, source);
    gl.compile_shader(&shader);

    if gl
        .get_shader_parameter(&shader, Gl::COMPILE_STATUS)
        .as_bool()
        .unwrap_or(false)
    {
        Ok(shader)
    } else {
        Err(JsValue::from_str(
            &gl.get_shader_info_log(&shader)
                .unwrap_or_else(|| "unknown shader error".into()),
        ))
    }
}

fn link_program(gl: &Gl, vertex: &WebGlShader, fragment: &WebGlShader) -> Result<WebGlProgram, JsValue> {
    let program = gl
        .create_program()
        .ok_or_else(|| JsValue::from_str("unable to create program"))?;
    gl.attach_shader(&program, vertex);
    gl.attach_shader(&program, fragment);
    gl.link_program(&program);

    if gl
        .get_program_parameter(&program, Gl::LINK_STATUS)
        .as_bool()
        .unwrap_or(false)
    {
        Ok(program)
    } else {
        Err(JsValue::from_str(
            &gl.get_program_info_log(&program)
                .unwrap_or_else(|| "unknown link error".into()),
        ))
    }
}

fn attrib_location(gl: &Gl, program: &WebGlProgram, name: &str) -> Result<u32, JsValue> {
    let location = gl.get_attrib_location(program, name);
    u32::try_from(location).map_err(|_| JsValue::from_str(&format!("missing attribute {name}")))
}
