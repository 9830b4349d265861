//! A linked program together with the uniform locations the renderer uploads to.

use crate::fixed_function::xf;
use crate::host::{HostApi, ProgramObject, UniformLocation};
use crate::state::{PrimitiveAssembly, MAX_LIGHTS, MAX_TEXTURES, VERTEX_CONSTANTS};

/// Combiner constant slots exist per general stage plus one for the final combiner.
pub const COMBINER_CONSTANT_STAGES: usize = 9;
pub const CLIP_REGIONS: usize = 8;

type Loc = Option<UniformLocation>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightLocations {
    pub infinite_half_vector: Loc,
    pub infinite_direction: Loc,
    pub local_position: Loc,
    pub local_attenuation: Loc,
}

/// Uniform locations of one program. Uniforms the program does not use are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLocations {
    pub tex_samplers: [Loc; MAX_TEXTURES],
    /// `[stage][slot]` for `c{slot}_{stage}`.
    pub combiner_constants: [[Loc; 2]; COMBINER_CONSTANT_STAGES],
    pub alpha_ref: Loc,
    pub bump_mat: [Loc; MAX_TEXTURES],
    pub bump_scale: [Loc; MAX_TEXTURES],
    pub bump_offset: [Loc; MAX_TEXTURES],
    pub tex_scale: [Loc; MAX_TEXTURES],
    pub vertex_constants: Vec<Loc>,
    pub surface_size: Loc,
    pub clip_range: Loc,
    pub fog_color: Loc,
    pub fog_param: [Loc; 2],
    pub inv_viewport: Loc,
    pub ltctxa: Vec<Loc>,
    pub ltctxb: Vec<Loc>,
    pub ltc1: Vec<Loc>,
    pub lights: Vec<LightLocations>,
    pub clip_region: [Loc; CLIP_REGIONS],
    pub material_alpha: Loc,
}

impl UniformLocations {
    pub fn resolve(host: &mut dyn HostApi, program: ProgramObject) -> Self {
        let mut loc = |name: String| host.uniform_location(program, &name);
        let mut array = |name: &str, len: usize| -> Vec<Loc> {
            (0..len).map(|i| loc(format!("{name}[{i}]"))).collect()
        };
        let vertex_constants = array("c", VERTEX_CONSTANTS);
        let ltctxa = array("ltctxa", xf::LTCTXA_COUNT);
        let ltctxb = array("ltctxb", xf::LTCTXB_COUNT);
        let ltc1 = array("ltc1", xf::LTC1_COUNT);

        let mut loc = |name: String| host.uniform_location(program, &name);
        let tex_samplers = std::array::from_fn(|i| loc(format!("texSamp{i}")));
        let combiner_constants =
            std::array::from_fn(|stage| std::array::from_fn(|slot| loc(format!("c{slot}_{stage}"))));
        let alpha_ref = loc("alphaRef".to_owned());
        let bump_mat = std::array::from_fn(|i| loc(format!("bumpMat{i}")));
        let bump_scale = std::array::from_fn(|i| loc(format!("bumpScale{i}")));
        let bump_offset = std::array::from_fn(|i| loc(format!("bumpOffset{i}")));
        let tex_scale = std::array::from_fn(|i| loc(format!("texScale{i}")));
        let surface_size = loc("surfaceSize".to_owned());
        let clip_range = loc("clipRange".to_owned());
        let fog_color = loc("fogColor".to_owned());
        let fog_param = std::array::from_fn(|i| loc(format!("fogParam[{i}]")));
        let inv_viewport = loc("invViewport".to_owned());
        let lights = (0..MAX_LIGHTS)
            .map(|i| LightLocations {
                infinite_half_vector: loc(format!("lightInfiniteHalfVector{i}")),
                infinite_direction: loc(format!("lightInfiniteDirection{i}")),
                local_position: loc(format!("lightLocalPosition{i}")),
                local_attenuation: loc(format!("lightLocalAttenuation{i}")),
            })
            .collect();
        let clip_region = std::array::from_fn(|i| loc(format!("clipRegion[{i}]")));
        let material_alpha = loc("material_alpha".to_owned());

        Self {
            tex_samplers,
            combiner_constants,
            alpha_ref,
            bump_mat,
            bump_scale,
            bump_offset,
            tex_scale,
            vertex_constants,
            surface_size,
            clip_range,
            fog_color,
            fog_param,
            inv_viewport,
            ltctxa,
            ltctxb,
            ltc1,
            lights,
            clip_region,
            material_alpha,
        }
    }
}

/// Compiled program bound for draws with one [`crate::ShaderState`].
#[derive(Debug)]
pub struct ShaderBinding {
    pub program: ProgramObject,
    pub primitive_assembly: PrimitiveAssembly,
    pub uniforms: UniformLocations,
    vertex_constants: Box<[[f32; 4]; VERTEX_CONSTANTS]>,
    vertex_constants_valid: bool,
}

impl ShaderBinding {
    /// Resolves uniforms of a freshly linked (or binary-loaded) program and binds sampler
    /// `texSampN` to texture unit N.
    pub fn new(
        host: &mut dyn HostApi,
        program: ProgramObject,
        primitive_assembly: PrimitiveAssembly,
    ) -> Self {
        let uniforms = UniformLocations::resolve(host, program);
        for (unit, location) in uniforms.tex_samplers.iter().enumerate() {
            if let Some(location) = *location {
                host.set_sampler(program, location, unit as u32);
            }
        }
        Self {
            program,
            primitive_assembly,
            uniforms,
            vertex_constants: Box::new([[0.0; 4]; VERTEX_CONSTANTS]),
            vertex_constants_valid: false,
        }
    }

    /// Uploads the vertex constants that differ from what this program last received.
    /// Comparison is bitwise so NaN payloads and signed zeros are not lost. Returns the
    /// number of constants uploaded.
    pub fn upload_vertex_constants(
        &mut self,
        host: &mut dyn HostApi,
        constants: &[[f32; 4]; VERTEX_CONSTANTS],
        force: bool,
    ) -> usize {
        let force = force || !self.vertex_constants_valid;
        let mut uploaded = 0;
        for (i, value) in constants.iter().enumerate() {
            let shadow = &mut self.vertex_constants[i];
            let dirty = bytemuck::cast::<[f32; 4], [u32; 4]>(*shadow)
                != bytemuck::cast::<[f32; 4], [u32; 4]>(*value);
            if !force && !dirty {
                continue;
            }
            *shadow = *value;
            if let Some(location) = self.uniforms.vertex_constants[i] {
                host.upload_vec4(location, *value);
                uploaded += 1;
            }
        }
        self.vertex_constants_valid = true;
        uploaded
    }

    /// Forgets the shadow copy, e.g. after another context touched the program.
    pub fn invalidate_vertex_constants(&mut self) {
        self.vertex_constants_valid = false;
    }
}
