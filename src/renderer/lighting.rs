//! The Phong lighting model used by `shaders/lighting.frag`: light values,
//! their uniform names, and a CPU version of the fragment shader's math.

use glam::{Vec3, Vec4, Vec4Swizzles};

use crate::renderer::shader::Program;

pub const POINT_LIGHT_COUNT: usize = 4;

/// The point light positions of the default scene.
pub const POINT_LIGHT_POSITIONS: [Vec3; POINT_LIGHT_COUNT] = [
    Vec3::new(0.7, 0.2, 2.0),
    Vec3::new(2.3, -3.3, -4.0),
    Vec3::new(-4.0, 2.0, -12.0),
    Vec3::new(0.0, 0.0, -3.0),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

/// What the material's textures hold at a fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    pub diffuse: Vec3,
    pub specular: Vec3,
}

/// Everything the fragment shader needs to know about the fragment and the
/// eye.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    pub position: Vec3,
    pub normal: Vec3,
    pub view_position: Vec3,
    pub surface: SurfaceSample,
    pub shininess: f32,
}

impl Fragment {
    fn view_direction(&self) -> Vec3 {
        (self.view_position - self.position).normalize_or_zero()
    }
}

fn phong(
    light_direction: Vec3,
    fragment: &Fragment,
    ambient: Vec3,
    diffuse: Vec3,
    specular: Vec3,
) -> Vec3 {
    let normal = fragment.normal.normalize_or_zero();
    let diffuse_factor = normal.dot(light_direction).max(0.0);
    let reflected = reflect(-light_direction, normal);
    let specular_factor = fragment
        .view_direction()
        .dot(reflected)
        .max(0.0)
        .powf(fragment.shininess);
    ambient * fragment.surface.diffuse
        + diffuse * diffuse_factor * fragment.surface.diffuse
        + specular * specular_factor * fragment.surface.specular
}

/// GLSL's `reflect`.
fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident - 2.0 * normal.dot(incident) * normal
}

impl DirectionalLight {
    pub fn shade(&self, fragment: &Fragment) -> Vec3 {
        let light_direction = (-self.direction).normalize_or_zero();
        phong(
            light_direction,
            fragment,
            self.ambient,
            self.diffuse,
            self.specular,
        )
    }

    pub fn upload(&self, program: &Program, name: &str) {
        program.set_vec3(&format!("{name}.direction"), self.direction);
        program.set_vec3(&format!("{name}.ambient"), self.ambient);
        program.set_vec3(&format!("{name}.diffuse"), self.diffuse);
        program.set_vec3(&format!("{name}.specular"), self.specular);
    }
}

impl PointLight {
    /// `1 / (constant + linear * d + quadratic * d²)`.
    pub fn attenuation(&self, distance: f32) -> f32 {
        1.0 / (self.constant + self.linear * distance + self.quadratic * distance * distance)
    }

    pub fn shade(&self, fragment: &Fragment) -> Vec3 {
        let to_light = self.position - fragment.position;
        let attenuation = self.attenuation(to_light.length());
        phong(
            to_light.normalize_or_zero(),
            fragment,
            self.ambient,
            self.diffuse,
            self.specular,
        ) * attenuation
    }

    pub fn upload(&self, program: &Program, name: &str) {
        program.set_vec3(&format!("{name}.position"), self.position);
        program.set_vec3(&format!("{name}.ambient"), self.ambient);
        program.set_vec3(&format!("{name}.diffuse"), self.diffuse);
        program.set_vec3(&format!("{name}.specular"), self.specular);
        program.set_float(&format!("{name}.constant"), self.constant);
        program.set_float(&format!("{name}.linear"), self.linear);
        program.set_float(&format!("{name}.quadratic"), self.quadratic);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lights {
    pub directional: DirectionalLight,
    pub points: [PointLight; POINT_LIGHT_COUNT],
}

impl Default for Lights {
    fn default() -> Self {
        let point = |position| PointLight {
            position,
            ambient: Vec3::splat(0.05),
            diffuse: Vec3::splat(0.8),
            specular: Vec3::splat(1.0),
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        };
        Lights {
            directional: DirectionalLight {
                direction: Vec3::new(-0.2, -1.0, -0.3),
                ambient: Vec3::splat(0.05),
                diffuse: Vec3::splat(0.4),
                specular: Vec3::splat(0.5),
            },
            points: POINT_LIGHT_POSITIONS.map(point),
        }
    }
}

impl Lights {
    /// Writes `dirLight` and `pointLights[0..4]` of the current program.
    pub fn upload(&self, program: &Program) {
        self.directional.upload(program, "dirLight");
        for (i, point) in self.points.iter().enumerate() {
            point.upload(program, &format!("pointLights[{i}]"));
        }
    }

    /// The color the lighting shader computes for `fragment`.
    pub fn shade(&self, fragment: &Fragment) -> Vec3 {
        self.points
            .iter()
            .map(|point| point.shade(fragment))
            .fold(self.directional.shade(fragment), |sum, color| sum + color)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Material { shininess: 32.0 }
    }
}

impl Material {
    pub fn upload(&self, program: &Program) {
        program.set_float("material.shininess", self.shininess);
    }
}

impl SurfaceSample {
    /// Builds a sample from RGBA texel values, dropping alpha.
    pub fn from_texels(diffuse: Vec4, specular: Vec4) -> SurfaceSample {
        SurfaceSample {
            diffuse: diffuse.xyz(),
            specular: specular.xyz(),
        }
    }
}
