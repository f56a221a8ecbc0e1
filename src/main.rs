//! Terminal demo: a spinning, directionally lit mesh drawn with Braille
//! glyphs. Renders a built-in cube, or an OBJ file passed as the first
//! argument (expected to be roughly unit sized). `q` or `Esc` quits.

use std::env;
use std::error::Error;
use std::time::Duration;

use log::LevelFilter;
use simple_logger::SimpleLogger;

use brasterizer::math::{Mat4, Vec3, Vec4};
use brasterizer::mesh::{Mesh, VERTEX_STRIDE};
use brasterizer::render::{
    AttributeStream, RenderCallback, RenderContext, Shader, ShaderProgram, Uniforms,
};
use brasterizer::terminal::{
    poll_event, CrosstermTerminal, FrameLimiter, Terminal, TerminalEvent,
};

const TARGET_FPS: u32 = 60;
const SPIN_SPEED: f32 = 0.8;
const CAMERA_DISTANCE: f32 = 4.0;
const FOV_Y_DEGREES: f32 = 60.0;
const FAR_PLANE: f32 = 16.0;
const AMBIENT: f32 = 0.15;

// Uniform layout.
const U_MODEL_VIEW: usize = 0; // 16 scalars
const U_MODEL: usize = 16; // 16 scalars, rotation only (for normals)
const U_FOCAL: usize = 32;
const U_ASPECT: usize = 33;
const U_LIGHT: usize = 34; // 3 scalars
const UNIFORM_COUNT: usize = 37;

/// Per-vertex lambert shading: the vertex stage computes a brightness from
/// the world normal and light direction, the fragment stage returns its
/// interpolation.
struct LambertShader {
    model_view: Mat4,
    model: Mat4,
    focal: f32,
    aspect: f32,
    light: Vec3,
}

impl LambertShader {
    fn new(aspect: f32) -> Self {
        Self {
            model_view: Mat4::identity(),
            model: Mat4::identity(),
            focal: 1.0 / (FOV_Y_DEGREES.to_radians() / 2.0).tan(),
            aspect,
            light: Vec3::new(0.5, -0.8, 0.6).normalize(),
        }
    }
}

impl Shader for LambertShader {
    fn prepare(&mut self, uniforms: &mut Uniforms) {
        self.model_view.write_to(&mut uniforms[U_MODEL_VIEW..]);
        self.model.write_to(&mut uniforms[U_MODEL..]);
        uniforms[U_FOCAL] = self.focal;
        uniforms[U_ASPECT] = self.aspect;
        uniforms[U_LIGHT] = self.light.x;
        uniforms[U_LIGHT + 1] = self.light.y;
        uniforms[U_LIGHT + 2] = self.light.z;
    }

    fn vertex(
        &self,
        uniforms: &Uniforms,
        vertices: &[f32],
        index: usize,
        out: &mut AttributeStream,
    ) -> Vec4 {
        let base = index * VERTEX_STRIDE;
        let position = Vec4::point(vertices[base], vertices[base + 1], vertices[base + 2]);
        let normal = Vec4::direction(vertices[base + 3], vertices[base + 4], vertices[base + 5]);

        let model = Mat4::from_slice(&uniforms[U_MODEL..]);
        let light = Vec3::new(
            uniforms[U_LIGHT],
            uniforms[U_LIGHT + 1],
            uniforms[U_LIGHT + 2],
        );
        let world_normal = (model * normal).xyz().normalize();
        let diffuse = world_normal.dot(-light).max(0.0);
        out.push_scalar((AMBIENT + (1.0 - AMBIENT) * diffuse).min(1.0));
        // A constant 1 rides along: its interpolation carries the
        // perspective normalization factor the fragment stage divides out.
        out.push_scalar(1.0);

        let view = Mat4::from_slice(&uniforms[U_MODEL_VIEW..]) * position;
        Vec4::new(
            view.x * uniforms[U_FOCAL] / uniforms[U_ASPECT],
            view.y * uniforms[U_FOCAL],
            view.z,
            FAR_PLANE,
        )
    }

    fn fragment(
        &self,
        _uniforms: &Uniforms,
        attributes: &AttributeStream,
        _out: &mut Vec4,
    ) -> f32 {
        let weight = attributes.raw_value(1);
        (attributes.raw_value(0) / weight).clamp(0.0, 1.0)
    }
}

/// Width/height ratio of the sub-dot canvas behind a terminal of the given
/// cell geometry.
fn dot_aspect(width: u32, height: u32) -> f32 {
    (width * 2) as f32 / (height * 4) as f32
}

fn main() -> Result<(), Box<dyn Error>> {
    SimpleLogger::new().with_level(LevelFilter::Warn).env().init()?;

    let mesh = match env::args().nth(1) {
        Some(path) => Mesh::from_obj(&path)?,
        None => Mesh::cube(),
    };

    let mut terminal = CrosstermTerminal::new()?;
    let (width, height) = terminal.size();

    let callback: RenderCallback = Box::new(move |frame| {
        let _ = terminal.clear();
        if let Err(e) = frame.present(&mut terminal) {
            log::error!("present failed: {}", e);
        }
    });

    let mut context = RenderContext::new(width, height, callback)?;
    let mut program = ShaderProgram::new(LambertShader::new(dot_aspect(width, height)), UNIFORM_COUNT);
    let mut limiter = FrameLimiter::new(TARGET_FPS);
    let mut angle = 0.0f32;

    loop {
        match poll_event(Duration::ZERO)? {
            TerminalEvent::Quit => break,
            TerminalEvent::Resize(new_width, new_height) => {
                context.resize(new_width, new_height)?;
                program.shader_mut().aspect = dot_aspect(new_width, new_height);
            }
            TerminalEvent::None => {}
        }

        let delta = limiter.wait_and_get_delta();
        angle += delta * SPIN_SPEED;

        let model = Mat4::rotation_y(angle) * Mat4::rotation_x(angle * 0.6);
        let shader = program.shader_mut();
        shader.model = model;
        shader.model_view = Mat4::translation(0.0, 0.0, CAMERA_DISTANCE) * model;

        context.clear_frame();
        context.draw_indexed(&mut program, &mesh.vertex_input())?;
        context.present_frame();
    }

    Ok(())
}
