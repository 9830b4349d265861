use thiserror::Error;

use crate::geom::{self, GeomError};
use crate::host::ShaderStageKind;
use crate::psh;
use crate::state::{GeomState, PrimitiveAssembly, PshState, ShaderState, VshState};
use crate::vertex::{self, Shading};
use crate::vsh::VshError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("vertex program translation failed: {0}")]
    Vertex(#[from] VshError),
    #[error("geometry stage synthesis failed: {0}")]
    Geometry(#[from] GeomError),
    #[error("primitive is drawn natively as {0}; there is no geometry stage to generate")]
    NativePrimitive(PrimitiveAssembly),
}

/// Source text for every stage of one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: String,
    pub geometry: Option<String>,
    pub fragment: String,
    /// Primitive assembly the host must draw with; the geometry stage (if any) consumes
    /// primitives of this kind.
    pub primitive_assembly: PrimitiveAssembly,
}

/// Key of one compiled stage. Programs that share a stage reuse its compiled object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShaderModuleKey {
    Vertex {
        vsh: VshState,
        shading: Shading,
        prefix_outputs: bool,
    },
    Geometry { geom: GeomState, shading: Shading },
    Pixel { psh: PshState, shading: Shading },
}

impl ShaderModuleKey {
    pub fn stage(&self) -> ShaderStageKind {
        match self {
            ShaderModuleKey::Vertex { .. } => ShaderStageKind::Vertex,
            ShaderModuleKey::Geometry { .. } => ShaderStageKind::Geometry,
            ShaderModuleKey::Pixel { .. } => ShaderStageKind::Fragment,
        }
    }

    pub fn generate(&self) -> Result<String, TranslateError> {
        match self {
            ShaderModuleKey::Vertex {
                vsh,
                shading,
                prefix_outputs,
            } => Ok(vertex::generate(vsh, *shading, *prefix_outputs)?),
            ShaderModuleKey::Geometry { geom, shading } => {
                let stage = geom::generate(geom, *shading)?;
                stage
                    .source
                    .ok_or(TranslateError::NativePrimitive(stage.assembly))
            }
            ShaderModuleKey::Pixel { psh, shading } => Ok(psh::translate(psh, *shading)),
        }
    }
}

/// Stage keys of one program, in link order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramModules {
    pub vertex: ShaderModuleKey,
    pub geometry: Option<ShaderModuleKey>,
    pub pixel: ShaderModuleKey,
    pub primitive_assembly: PrimitiveAssembly,
}

impl ProgramModules {
    pub fn for_state(state: &ShaderState) -> Result<Self, TranslateError> {
        let shading = state.shading();
        let geometry = geom::generate(&state.geom, shading)?;
        let has_geometry = geometry.source.is_some();
        Ok(Self {
            vertex: ShaderModuleKey::Vertex {
                vsh: state.vsh.clone(),
                shading,
                prefix_outputs: has_geometry,
            },
            geometry: has_geometry.then_some(ShaderModuleKey::Geometry {
                geom: state.geom,
                shading,
            }),
            pixel: ShaderModuleKey::Pixel {
                psh: state.psh,
                shading,
            },
            primitive_assembly: geometry.assembly,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShaderModuleKey> {
        std::iter::once(&self.vertex)
            .chain(self.geometry.as_ref())
            .chain(std::iter::once(&self.pixel))
    }
}

/// Translates a full shader configuration into GLSL for each stage.
///
/// Output depends only on `state`: byte-identical states produce byte-identical sources.
pub fn translate(state: &ShaderState) -> Result<ShaderSources, TranslateError> {
    let modules = ProgramModules::for_state(state)?;
    let vertex = modules.vertex.generate()?;
    let geometry = modules
        .geometry
        .as_ref()
        .map(ShaderModuleKey::generate)
        .transpose()?;
    let fragment = modules.pixel.generate()?;
    tracing::debug!(
        hash = %format_args!("{:016x}", state.content_hash()),
        assembly = %modules.primitive_assembly,
        geometry = geometry.is_some(),
        "translated shader state"
    );
    Ok(ShaderSources {
        vertex,
        geometry,
        fragment,
        primitive_assembly: modules.primitive_assembly,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{PolygonMode, PrimitiveMode};
    use pretty_assertions::assert_eq;

    fn state_with(primitive_mode: PrimitiveMode, polygon_mode: PolygonMode) -> ShaderState {
        let mut state = ShaderState::default();
        state.geom.primitive_mode = primitive_mode;
        state.geom.polygon_front_mode = polygon_mode;
        state.geom.polygon_back_mode = polygon_mode;
        state
    }

    #[test]
    fn native_triangles_have_no_geometry_stage() {
        let sources = translate(&state_with(PrimitiveMode::Triangles, PolygonMode::Fill)).unwrap();
        assert_eq!(sources.geometry, None);
        assert_eq!(sources.primitive_assembly, PrimitiveAssembly::Triangles);
        assert!(sources.vertex.contains("out vec4 vtxD0;"), "{}", sources.vertex);
        assert!(sources.fragment.starts_with("#version 400\n"), "{}", sources.fragment);
    }

    #[test]
    fn quads_prefix_vertex_outputs() {
        let sources = translate(&state_with(PrimitiveMode::Quads, PolygonMode::Fill)).unwrap();
        assert_eq!(sources.primitive_assembly, PrimitiveAssembly::LinesAdjacency);
        assert!(sources.geometry.is_some());
        assert!(sources.vertex.contains("#define vtxD0 v_vtxD0"), "{}", sources.vertex);
    }

    #[test]
    fn module_keys_follow_geometry() {
        let modules =
            ProgramModules::for_state(&state_with(PrimitiveMode::Quads, PolygonMode::Line)).unwrap();
        let stages: Vec<_> = modules.iter().map(ShaderModuleKey::stage).collect();
        assert_eq!(
            stages,
            [ShaderStageKind::Vertex, ShaderStageKind::Geometry, ShaderStageKind::Fragment]
        );
    }

    #[test]
    fn shading_reaches_every_stage() {
        for (smooth, qualifier) in [(true, "noperspective"), (false, "flat")] {
            let mut state = state_with(PrimitiveMode::Quads, PolygonMode::Fill);
            state.smooth_shading = smooth;
            let sources = translate(&state).unwrap();
            let geometry = sources.geometry.unwrap();
            for stage in [&sources.vertex, &geometry, &sources.fragment] {
                assert!(stage.starts_with("#version 400\n"), "{stage}");
            }
            assert!(
                sources.vertex.contains(&format!("{qualifier} out vec4 v_vtxD0;")),
                "{}",
                sources.vertex
            );
            assert!(geometry.contains(&format!("{qualifier} in vec4 v_vtxD0[];")), "{geometry}");
            assert!(geometry.contains(&format!("{qualifier} out vec4 vtxD0;")), "{geometry}");
            assert!(
                sources.fragment.contains(&format!("{qualifier} in vec4 vtxD0;")),
                "{}",
                sources.fragment
            );
        }
    }

    #[test]
    fn shading_is_part_of_every_module_key() {
        let flat = state_with(PrimitiveMode::Quads, PolygonMode::Fill);
        let mut smooth = flat.clone();
        smooth.smooth_shading = true;
        let flat = ProgramModules::for_state(&flat).unwrap();
        let smooth = ProgramModules::for_state(&smooth).unwrap();
        for (a, b) in flat.iter().zip(smooth.iter()) {
            assert_ne!(a, b);
        }
    }

    #[test]
    fn mismatched_polygon_modes_fail() {
        let mut state = state_with(PrimitiveMode::Triangles, PolygonMode::Fill);
        state.geom.polygon_back_mode = PolygonMode::Line;
        assert!(matches!(
            translate(&state),
            Err(TranslateError::Geometry(GeomError::PolygonModeMismatch { .. }))
        ));
    }

    #[test]
    fn geometry_key_for_native_primitive() {
        let key = ShaderModuleKey::Geometry {
            geom: state_with(PrimitiveMode::Points, PolygonMode::Fill).geom,
            shading: Shading::Flat,
        };
        assert_eq!(
            key.generate(),
            Err(TranslateError::NativePrimitive(PrimitiveAssembly::Points))
        );
    }
}
