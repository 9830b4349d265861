#![allow(dead_code)]

use std::collections::HashMap;

use aero_nv2a::{
    HostApi, PrimitiveMode, ProgramBinary, ProgramObject, ShaderObject, ShaderStageKind,
    ShaderState, UniformLocation,
};

pub const BINARY_FORMAT: u32 = 0x8741;

/// In-memory stand-in for a GL context. Programs remember the sources they were linked
/// from, so uniform queries and binaries behave like a driver's would.
#[derive(Default)]
pub struct MockHost {
    pub vendor: String,
    next_id: u32,
    shaders: HashMap<u32, (ShaderStageKind, String)>,
    programs: HashMap<u32, Vec<String>>,
    uniforms: HashMap<String, i32>,
    pub compiles: Vec<ShaderStageKind>,
    pub links: usize,
    pub deleted_shaders: Vec<ShaderObject>,
    pub deleted_programs: Vec<ProgramObject>,
    pub binary_loads: usize,
    pub uploads: Vec<(UniformLocation, [f32; 4])>,
    pub samplers: Vec<(ProgramObject, UniformLocation, u32)>,
    /// Compilation fails for any source containing this text.
    pub fail_compile_on: Option<String>,
    pub fail_link: bool,
    pub supports_binaries: bool,
    pub reject_binaries: bool,
}

impl MockHost {
    pub fn new(vendor: &str) -> Self {
        Self {
            vendor: vendor.to_owned(),
            next_id: 1,
            supports_binaries: true,
            ..Default::default()
        }
    }

    fn id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    pub fn program_sources(&self, program: ProgramObject) -> Option<&[String]> {
        self.programs.get(&program.0).map(Vec::as_slice)
    }
}

impl HostApi for MockHost {
    fn vendor(&self) -> String {
        self.vendor.clone()
    }

    fn compile(&mut self, stage: ShaderStageKind, source: &str) -> Result<ShaderObject, String> {
        self.compiles.push(stage);
        if let Some(needle) = &self.fail_compile_on {
            if source.contains(needle.as_str()) {
                return Err(format!("0:1: error: rejected '{needle}'"));
            }
        }
        let id = self.id();
        self.shaders.insert(id, (stage, source.to_owned()));
        Ok(ShaderObject(id))
    }

    fn delete_shader(&mut self, shader: ShaderObject) {
        self.shaders.remove(&shader.0);
        self.deleted_shaders.push(shader);
    }

    fn link(&mut self, shaders: &[ShaderObject]) -> Result<ProgramObject, String> {
        self.links += 1;
        if self.fail_link {
            return Err("link failed".to_owned());
        }
        let mut sources = Vec::with_capacity(shaders.len());
        for shader in shaders {
            let (_, source) = self
                .shaders
                .get(&shader.0)
                .ok_or_else(|| format!("unknown shader {}", shader.0))?;
            sources.push(source.clone());
        }
        let id = self.id();
        self.programs.insert(id, sources);
        Ok(ProgramObject(id))
    }

    fn delete_program(&mut self, program: ProgramObject) {
        self.programs.remove(&program.0);
        self.deleted_programs.push(program);
    }

    fn uniform_location(&mut self, program: ProgramObject, name: &str) -> Option<UniformLocation> {
        let base = name.split('[').next().unwrap_or(name);
        let declared = self.programs.get(&program.0)?.iter().any(|source| {
            source.contains(&format!(" {base};")) || source.contains(&format!(" {base}["))
        });
        if !declared {
            return None;
        }
        let next = self.uniforms.len() as i32;
        Some(UniformLocation(*self.uniforms.entry(name.to_owned()).or_insert(next)))
    }

    fn set_sampler(&mut self, program: ProgramObject, location: UniformLocation, unit: u32) {
        self.samplers.push((program, location, unit));
    }

    fn upload_vec4(&mut self, location: UniformLocation, value: [f32; 4]) {
        self.uploads.push((location, value));
    }

    fn program_binary(&mut self, program: ProgramObject) -> Option<ProgramBinary> {
        if !self.supports_binaries {
            return None;
        }
        let sources = self.programs.get(&program.0)?;
        Some(ProgramBinary {
            format: BINARY_FORMAT,
            bytes: sources.join("\0").into_bytes(),
        })
    }

    fn program_from_binary(&mut self, binary: &ProgramBinary) -> Option<ProgramObject> {
        if self.reject_binaries || binary.format != BINARY_FORMAT {
            return None;
        }
        let text = String::from_utf8(binary.bytes.clone()).ok()?;
        let sources = text.split('\0').map(str::to_owned).collect();
        self.binary_loads += 1;
        let id = self.id();
        self.programs.insert(id, sources);
        Some(ProgramObject(id))
    }
}

/// A translatable state; distinct `seed`s give distinct cache keys.
pub fn state(seed: u32) -> ShaderState {
    let mut state = ShaderState::default();
    state.geom.primitive_mode = PrimitiveMode::Triangles;
    state.psh.combiner_control = 0;
    state.psh.final_inputs_1 = seed << 8;
    state.vsh.surface_scale_factor = 1;
    state
}
