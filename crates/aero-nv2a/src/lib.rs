//! NV2A shader translation and program caching.
//!
//! The NV2A runs vertex microcode (or a fixed-function transform and lighting pipeline),
//! synthesizes quads and polygon fill modes in primitive assembly, and shades fragments
//! with texture shader stages feeding register combiners. This crate turns an immutable
//! snapshot of that configuration into GLSL for a host OpenGL 3.3+ context:
//!
//! - [`ShaderState`]: the canonical, byte-comparable configuration key
//! - [`translate`]: vertex, optional geometry and fragment sources for one state
//! - [`ShaderCache`]: content-hashed LRU of linked programs with on-disk persistence
//! - [`HostApi`]: the compile/link/upload boundary the cache drives
//!
//! Translation is pure: equal states always produce byte-identical sources.

pub mod assembler;
pub mod binding;
pub mod cache;
pub mod config;
pub mod fixed_function;
pub mod geom;
pub mod host;
pub mod psh;
pub mod shader_translate;
pub mod state;
pub mod vertex;
pub mod vsh;

pub use binding::{ShaderBinding, UniformLocations};
pub use cache::{
    ShaderCache, ShaderCacheError, ShaderCacheLookup, ShaderCacheLookupSource, ShaderCacheStats,
};
pub use config::ShaderCacheConfig;
pub use geom::GeomError;
pub use host::{
    CompileError, HostApi, LinkError, ProgramBinary, ProgramObject, ShaderObject, ShaderStageKind,
    UniformLocation,
};
pub use shader_translate::{translate, ShaderSources, TranslateError};
pub use state::{
    GeomState, PolygonMode, PrimitiveAssembly, PrimitiveMode, PshState, ShaderState, VshState,
};
pub use vertex::Shading;
pub use vsh::VshError;
