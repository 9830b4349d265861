//! Full vertex-stage source: shared declarations, the program body (microcode or fixed
//! function), fog, and the varying outputs consumed by the geometry and pixel stages.

use std::fmt::Write;

use crate::fixed_function::{self, xf};
use crate::state::{FogMode, VertexProgram, VshState, VERTEX_ATTRIBUTES, VERTEX_CONSTANTS};
use crate::vsh::{self, VshError};

/// Interpolation of the color varyings; texture coordinates and fog are always
/// `noperspective` since perspective is applied manually via `vtx_inv_w`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shading {
    Smooth,
    Flat,
}

impl Shading {
    pub fn from_smooth(smooth: bool) -> Self {
        if smooth {
            Shading::Smooth
        } else {
            Shading::Flat
        }
    }

    fn qualifier(self) -> &'static str {
        match self {
            Shading::Smooth => "noperspective",
            Shading::Flat => "flat",
        }
    }

    /// Per-vertex factor the colors are pre-multiplied with.
    pub fn inv_w(self) -> &'static str {
        match self {
            Shading::Smooth => "vtx_inv_w",
            Shading::Flat => "vtx_inv_w_flat",
        }
    }
}

/// Declarations of the vertex data block as seen from one side of a stage boundary.
pub(crate) fn vertex_data(shading: Shading, direction: &str, prefix: &str, suffix: &str) -> String {
    let qualifier = shading.qualifier();
    let mut out = String::new();
    let _ = writeln!(out, "noperspective {direction} float {prefix}vtx_inv_w{suffix};");
    let _ = writeln!(out, "flat {direction} float {prefix}vtx_inv_w_flat{suffix};");
    for name in ["vtxD0", "vtxD1", "vtxB0", "vtxB1"] {
        let _ = writeln!(out, "{qualifier} {direction} vec4 {prefix}{name}{suffix};");
    }
    let _ = writeln!(out, "noperspective {direction} float {prefix}vtxFog{suffix};");
    for i in 0..4 {
        let _ = writeln!(out, "noperspective {direction} vec4 {prefix}vtxT{i}{suffix};");
    }
    out
}

const VARYINGS: [&str; 11] = [
    "vtx_inv_w",
    "vtx_inv_w_flat",
    "vtxD0",
    "vtxD1",
    "vtxB0",
    "vtxB1",
    "vtxFog",
    "vtxT0",
    "vtxT1",
    "vtxT2",
    "vtxT3",
];

/// Generates the vertex stage. With `prefix_outputs` the varyings are renamed `v_*` so a
/// geometry stage can sit between vertex and pixel stages.
pub fn generate(
    vsh_state: &VshState,
    shading: Shading,
    prefix_outputs: bool,
) -> Result<String, VshError> {
    let mut header = String::new();
    header.push_str("#version 400\n\nuniform vec4 clipRange;\nuniform vec2 surfaceSize;\n\n");
    let _ = writeln!(header, "uniform vec4 c[{VERTEX_CONSTANTS}];\n");
    header.push_str("uniform float fogParam[2];\n\n");
    let _ = writeln!(header, "#define fogPlane c[{}]", xf::FOG);
    for (i, base) in xf::TEXTURE_MATRIX.into_iter().enumerate() {
        let _ = writeln!(
            header,
            "#define texMat{i} mat4(c[{}], c[{}], c[{}], c[{}])",
            base,
            base + 1,
            base + 2,
            base + 3
        );
    }
    header.push('\n');
    for reg in [
        "oPos", "oD0", "oD1", "oB0", "oB1", "oPts", "oFog", "oT0", "oT1", "oT2", "oT3",
    ] {
        let _ = writeln!(header, "vec4 {reg} = vec4(0.0,0.0,0.0,1.0);");
    }
    header.push_str(
        "\nvec4 decompress_11_11_10(int cmp) {\n\
         \x20   float x = float(bitfieldExtract(cmp, 0,  11)) / 1023.0;\n\
         \x20   float y = float(bitfieldExtract(cmp, 11, 11)) / 1023.0;\n\
         \x20   float z = float(bitfieldExtract(cmp, 22, 10)) / 511.0;\n\
         \x20   return vec4(x, y, z, 1);\n\
         }\n",
    );

    if prefix_outputs {
        header.push_str(&vertex_data(shading, "out", "v_", ""));
        for name in VARYINGS {
            let _ = writeln!(header, "#define {name} v_{name}");
        }
    } else {
        header.push_str(&vertex_data(shading, "out", "", ""));
    }
    header.push('\n');

    let compressed = |i: usize| vsh_state.compressed_attrs & (1 << i) != 0;
    for i in 0..VERTEX_ATTRIBUTES {
        if compressed(i) {
            let _ = writeln!(header, "layout(location = {i}) in int v{i}_cmp;");
        } else {
            let _ = writeln!(header, "layout(location = {i}) in vec4 v{i};");
        }
    }
    header.push('\n');

    let mut body = String::from("void main() {\n");
    for i in (0..VERTEX_ATTRIBUTES).filter(|&i| compressed(i)) {
        let _ = writeln!(body, "vec4 v{i} = decompress_11_11_10(v{i}_cmp);");
    }

    match &vsh_state.program {
        VertexProgram::FixedFunction(ff) => {
            fixed_function::generate(vsh_state, ff, &mut header, &mut body)
        }
        VertexProgram::Microcode(program) => vsh::translate(program, &mut header, &mut body)?,
    }

    write_fog(vsh_state, &mut body);

    let inv_w = shading.inv_w();
    body.push('\n');
    for color in ["D0", "D1", "B0", "B1"] {
        let _ = writeln!(body, "  vtx{color} = clamp(o{color}, 0.0, 1.0) * {inv_w};");
    }
    body.push_str("  vtxFog = oFog.x * vtx_inv_w;\n");
    for i in 0..4 {
        let _ = writeln!(body, "  vtxT{i} = oT{i} * vtx_inv_w;");
    }
    body.push_str(
        "  gl_Position = oPos;\n\
         \x20 gl_PointSize = oPts.x;\n\
         \x20 gl_ClipDistance[0] = oPos.z - oPos.w*clipRange.z;\n\
         \x20 gl_ClipDistance[1] = oPos.w*clipRange.w - oPos.z;\n\
         \n}\n",
    );

    header.push_str(&body);
    Ok(header)
}

fn write_fog(vsh_state: &VshState, body: &mut String) {
    let fog = &vsh_state.fog;
    if !fog.enable {
        body.push_str("  oFog.xyzw = vec4(1.0);\n");
        return;
    }

    // Microcode programs write the fog distance into oFog themselves.
    if matches!(vsh_state.program, VertexProgram::Microcode(_)) {
        body.push_str("  float fogDistance = oFog.x;\n");
    }

    const INF_GUARD: &str = "  if (isinf(fogDistance)) {\n    fogDistance = 0.0;\n  }\n";
    match fog.mode {
        FogMode::Linear | FogMode::LinearAbs => {
            body.push_str(INF_GUARD);
            body.push_str(
                "  float fogFactor = fogParam[0] + fogDistance * fogParam[1];\n\
                 \x20 fogFactor -= 1.0;\n",
            );
        }
        FogMode::Exp | FogMode::ExpAbs => {
            if fog.mode == FogMode::Exp {
                body.push_str(INF_GUARD);
            }
            body.push_str(
                "  float fogFactor = fogParam[0] + exp2(fogDistance * fogParam[1] * 16.0);\n\
                 \x20 fogFactor -= 1.5;\n",
            );
        }
        FogMode::Exp2 | FogMode::Exp2Abs => {
            body.push_str(
                "  float fogFactor = fogParam[0] + exp2(-fogDistance * fogDistance * fogParam[1] * fogParam[1] * 32.0);\n\
                 \x20 fogFactor -= 1.5;\n",
            );
        }
    }
    if fog.mode.is_abs() {
        body.push_str("  fogFactor = abs(fogFactor);\n");
    }
    body.push_str("  oFog.xyzw = vec4(fogFactor);\n");
}
