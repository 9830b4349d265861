//! Compiles and links the stages of a [`ShaderState`] into a [`ShaderBinding`].
//!
//! Compiled stage objects are cached by [`ShaderModuleKey`], so programs differing only in
//! their pixel state reuse the same vertex object.

use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::{debug, warn};

use crate::binding::ShaderBinding;
use crate::cache::ShaderCacheError;
use crate::host::{CompileError, HostApi, LinkError, ProgramBinary, ShaderObject, ShaderStageKind};
use crate::shader_translate::{ProgramModules, ShaderModuleKey};
use crate::state::ShaderState;

pub const FALLBACK_VERTEX_SHADER: &str = "#version 400

layout(location = 0) in vec4 v0;

void main() {
  gl_Position = v0;
}
";

pub const FALLBACK_FRAGMENT_SHADER: &str = "#version 400

out vec4 fragColor;

void main() {
  fragColor = vec4(1.0, 0.0, 1.0, 1.0);
}
";

pub struct ProgramAssembler {
    modules: LruCache<ShaderModuleKey, ShaderObject>,
    fallback_on_error: bool,
}

impl ProgramAssembler {
    pub fn new(module_capacity: NonZeroUsize, fallback_on_error: bool) -> Self {
        Self {
            modules: LruCache::new(module_capacity),
            fallback_on_error,
        }
    }

    pub fn cached_modules(&self) -> usize {
        self.modules.len()
    }

    /// Translates, compiles and links `state`. Blocks for the duration of the host
    /// compile.
    pub fn assemble(
        &mut self,
        host: &mut dyn HostApi,
        state: &ShaderState,
    ) -> Result<ShaderBinding, ShaderCacheError> {
        let modules = ProgramModules::for_state(state)?;
        match self.compile_and_link(host, &modules) {
            Ok(binding) => Ok(binding),
            Err(err) if self.fallback_on_error => {
                warn!(
                    hash = %format_args!("{:016x}", state.content_hash()),
                    error = %err,
                    "shader build failed; using fallback program"
                );
                match self.fallback(host, &modules) {
                    Ok(binding) => Ok(binding),
                    Err(_) => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    fn compile_and_link(
        &mut self,
        host: &mut dyn HostApi,
        modules: &ProgramModules,
    ) -> Result<ShaderBinding, ShaderCacheError> {
        let mut shaders = Vec::with_capacity(3);
        for key in modules.iter() {
            shaders.push(self.module(host, key)?);
        }
        let program = host
            .link(&shaders)
            .map_err(|log| ShaderCacheError::Link(LinkError { log }))?;
        Ok(ShaderBinding::new(host, program, modules.primitive_assembly))
    }

    fn module(
        &mut self,
        host: &mut dyn HostApi,
        key: &ShaderModuleKey,
    ) -> Result<ShaderObject, ShaderCacheError> {
        if let Some(shader) = self.modules.get(key) {
            return Ok(*shader);
        }
        let stage = key.stage();
        let source = key.generate()?;
        let shader = compile(host, stage, source)?;
        debug!(%stage, "compiled shader module");
        if let Some((_, evicted)) = self.modules.push(key.clone(), shader) {
            host.delete_shader(evicted);
        }
        Ok(shader)
    }

    /// Position passthrough with a solid magenta fragment; never cached.
    fn fallback(
        &mut self,
        host: &mut dyn HostApi,
        modules: &ProgramModules,
    ) -> Result<ShaderBinding, ShaderCacheError> {
        let vertex = compile(host, ShaderStageKind::Vertex, FALLBACK_VERTEX_SHADER.to_owned())?;
        let fragment = match compile(
            host,
            ShaderStageKind::Fragment,
            FALLBACK_FRAGMENT_SHADER.to_owned(),
        ) {
            Ok(fragment) => fragment,
            Err(err) => {
                host.delete_shader(vertex);
                return Err(err);
            }
        };
        let linked = host.link(&[vertex, fragment]);
        host.delete_shader(vertex);
        host.delete_shader(fragment);
        let program = linked.map_err(|log| ShaderCacheError::Link(LinkError { log }))?;
        Ok(ShaderBinding::new(host, program, modules.primitive_assembly))
    }

    /// Recreates the binding of `state` from a persisted program binary. `None` when the
    /// host rejects the binary or the state no longer translates.
    pub fn from_binary(
        &mut self,
        host: &mut dyn HostApi,
        state: &ShaderState,
        binary: &ProgramBinary,
    ) -> Option<ShaderBinding> {
        let modules = ProgramModules::for_state(state).ok()?;
        let program = host.program_from_binary(binary)?;
        Some(ShaderBinding::new(host, program, modules.primitive_assembly))
    }

    /// Deletes every cached stage object.
    pub fn clear(&mut self, host: &mut dyn HostApi) {
        for (_, shader) in self.modules.iter() {
            host.delete_shader(*shader);
        }
        self.modules.clear();
    }
}

fn compile(
    host: &mut dyn HostApi,
    stage: ShaderStageKind,
    source: String,
) -> Result<ShaderObject, ShaderCacheError> {
    host.compile(stage, &source)
        .map_err(|log| ShaderCacheError::Compile(CompileError { stage, glsl: source, log }))
}
