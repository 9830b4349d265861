//! Boundary to the host graphics API that compiles and links the generated GLSL.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStageKind {
    Vertex,
    Geometry,
    Fragment,
}

impl ShaderStageKind {
    pub fn name(self) -> &'static str {
        match self {
            ShaderStageKind::Vertex => "vertex",
            ShaderStageKind::Geometry => "geometry",
            ShaderStageKind::Fragment => "fragment",
        }
    }
}

impl fmt::Display for ShaderStageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Host shader object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderObject(pub u32);

/// Host program object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramObject(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);

/// Driver-specific serialized program, as returned by `glGetProgramBinary`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramBinary {
    pub format: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{stage} shader failed to compile: {log}")]
pub struct CompileError {
    pub stage: ShaderStageKind,
    pub glsl: String,
    pub log: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("shader program failed to link: {log}")]
pub struct LinkError {
    pub log: String,
}

/// Operations the shader cache needs from the host graphics API. Every call is made on
/// the thread that owns the rendering context.
pub trait HostApi {
    /// Identifies the driver; persisted binaries are only reused under the same vendor.
    fn vendor(&self) -> String;

    /// Compiles one stage. `Err` carries the driver's info log.
    fn compile(&mut self, stage: ShaderStageKind, source: &str) -> Result<ShaderObject, String>;

    fn delete_shader(&mut self, shader: ShaderObject);

    /// Links the given stages. `Err` carries the driver's info log.
    fn link(&mut self, shaders: &[ShaderObject]) -> Result<ProgramObject, String>;

    fn delete_program(&mut self, program: ProgramObject);

    fn uniform_location(&mut self, program: ProgramObject, name: &str) -> Option<UniformLocation>;

    /// Binds a sampler uniform to a texture unit.
    fn set_sampler(&mut self, program: ProgramObject, location: UniformLocation, unit: u32);

    fn upload_vec4(&mut self, location: UniformLocation, value: [f32; 4]);

    /// `None` when the driver does not support retrieving program binaries.
    fn program_binary(&mut self, program: ProgramObject) -> Option<ProgramBinary>;

    /// Recreates a program from a binary; `None` when the driver rejects it.
    fn program_from_binary(&mut self, binary: &ProgramBinary) -> Option<ProgramObject>;
}
