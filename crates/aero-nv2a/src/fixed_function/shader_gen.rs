use std::fmt::Write;

use tracing::warn;

use super::xf;
use crate::state::{
    FixedFunctionState, FogGen, LightType, MaterialColorSource, Skinning, Texgen, VshState,
    MAX_TEXTURES,
};

const COMPONENTS: [char; 4] = ['x', 'y', 'z', 'w'];
const PLANE_SUFFIXES: [char; 4] = ['S', 'T', 'R', 'Q'];

fn c_mat4(base: usize) -> String {
    format!(
        "mat4(c[{}], c[{}], c[{}], c[{}])",
        base,
        base + 1,
        base + 2,
        base + 3
    )
}

/// Appends declarations to `header` and the per-vertex transform, lighting, texgen and
/// point-size code to `body`. Ends by computing `vtx_inv_w` like a microcode epilogue.
pub fn generate(vsh: &VshState, ff: &FixedFunctionState, header: &mut String, body: &mut String) {
    write_header(header);

    let (mix, count) = ff.skinning.blend();
    let _ = writeln!(body, "/* Skinning mode {} */", ff.skinning.raw());
    append_skinning(body, mix, count, "vec4", "tPosition", "position", "modelViewMat", "xyzw");
    append_skinning(
        body,
        mix,
        count,
        "vec3",
        "tNormal",
        "vec4(normal, 0.0)",
        "invModelViewMat",
        "xyz",
    );

    if ff.normalization {
        body.push_str("tNormal = normalize(tNormal);\n");
    }

    for (stage, texgen) in ff.texgen.iter().enumerate() {
        write_texgen(body, stage, texgen);
    }

    for (i, &enabled) in ff.texture_matrix_enable.iter().enumerate() {
        if enabled {
            let _ = writeln!(body, "oT{i} = oT{i} * texMat{i};");
        }
    }

    if ff.lighting {
        write_lighting(ff, header, body);
    } else {
        body.push_str("  oD0 = diffuse;\n  oD1 = specular;\n");
    }
    body.push_str("  oB0 = backDiffuse;\n  oB1 = backSpecular;\n");

    if vsh.fog.enable {
        match vsh.fog.gen {
            FogGen::SpecAlpha => {
                body.push_str("  float fogDistance = clamp(specular.a, 0.0, 1.0);\n");
            }
            FogGen::Radial => body.push_str("  float fogDistance = length(tPosition.xyz);\n"),
            FogGen::Planar | FogGen::AbsPlanar => {
                body.push_str(
                    "  float fogDistance = dot(fogPlane.xyz, tPosition.xyz) + fogPlane.w;\n",
                );
                if vsh.fog.gen == FogGen::AbsPlanar {
                    body.push_str("  fogDistance = abs(fogDistance);\n");
                }
            }
            FogGen::FogX => body.push_str("  float fogDistance = fogCoord;\n"),
        }
    }

    // Without skinning the composite matrix already includes the model-view transform.
    if ff.skinning == Skinning::Off {
        body.push_str("  tPosition = position;\n");
    }
    body.push_str(
        "   oPos = invViewport * (tPosition * compositeMat);\n\
         \x20  oPos.z = oPos.z * 2.0 - oPos.w;\n",
    );

    let scale = vsh.surface_scale_factor;
    let point = &vsh.point;
    if point.params_enable {
        let p = point.params.map(|v| v.0);
        let _ = writeln!(body, "  float d_e = length(position * modelViewMat0);");
        let _ = writeln!(
            body,
            "  oPts.x = 1/sqrt({:.6} + {:.6}*d_e + {:.6}*d_e*d_e) + {:.6};",
            p[0], p[1], p[2], p[6]
        );
        let _ = writeln!(
            body,
            "  oPts.x = min(oPts.x*{:.6} + {:.6}, 64.0) * {scale};",
            p[3], p[7]
        );
    } else {
        let _ = writeln!(body, "  oPts.x = {:.6} * {scale};", point.size.0);
    }

    body.push_str(
        "  if (oPos.w == 0.0 || isinf(oPos.w)) {\n\
         \x20   vtx_inv_w = 1.0;\n\
         \x20 } else {\n\
         \x20   vtx_inv_w = 1.0 / oPos.w;\n\
         \x20 }\n\
         \x20 vtx_inv_w_flat = vtx_inv_w;\n",
    );
}

fn write_header(header: &mut String) {
    header.push_str(
        "#define position      v0\n\
         #define weight        v1\n\
         #define normal        v2.xyz\n\
         #define diffuse       v3\n\
         #define specular      v4\n\
         #define fogCoord      v5.x\n\
         #define pointSize     v6\n\
         #define backDiffuse   v7\n\
         #define backSpecular  v8\n\
         #define texture0      v9\n\
         #define texture1      v10\n\
         #define texture2      v11\n\
         #define texture3      v12\n\
         #define reserved1     v13\n\
         #define reserved2     v14\n\
         #define reserved3     v15\n\n",
    );
    let _ = writeln!(header, "uniform vec4 ltctxa[{}];", xf::LTCTXA_COUNT);
    let _ = writeln!(header, "uniform vec4 ltctxb[{}];", xf::LTCTXB_COUNT);
    let _ = writeln!(header, "uniform vec4 ltc1[{}];\n", xf::LTC1_COUNT);

    let _ = writeln!(header, "#define projectionMat {}", c_mat4(xf::PMAT0));
    let _ = writeln!(header, "#define compositeMat {}\n", c_mat4(xf::CMAT0));

    for (i, base) in xf::TEXGEN_PLANES.into_iter().enumerate() {
        for (j, suffix) in PLANE_SUFFIXES.into_iter().enumerate() {
            let _ = writeln!(header, "#define texPlane{suffix}{i} c[{}]", base + j);
        }
        header.push('\n');
    }

    for (i, base) in xf::MODEL_VIEW.into_iter().enumerate() {
        let _ = writeln!(header, "#define modelViewMat{i} {}", c_mat4(base));
    }
    header.push('\n');
    for (i, base) in xf::INV_MODEL_VIEW.into_iter().enumerate() {
        let _ = writeln!(header, "#define invModelViewMat{i} {}", c_mat4(base));
    }
    header.push('\n');

    let _ = writeln!(header, "#define eyePosition c[{}]\n", xf::EYEP);
    let _ = writeln!(
        header,
        "#define lightAmbientColor(i) ltctxb[{} + (i)*6].xyz",
        xf::LTCTXB_L0_AMB
    );
    let _ = writeln!(
        header,
        "#define lightDiffuseColor(i) ltctxb[{} + (i)*6].xyz",
        xf::LTCTXB_L0_DIF
    );
    let _ = writeln!(
        header,
        "#define lightSpecularColor(i) ltctxb[{} + (i)*6].xyz\n",
        xf::LTCTXB_L0_SPC
    );
    let _ = writeln!(
        header,
        "#define lightSpotFalloff(i) ltctxa[{} + (i)*2].xyz",
        xf::LTCTXA_L0_K
    );
    let _ = writeln!(
        header,
        "#define lightSpotDirection(i) ltctxa[{} + (i)*2]\n",
        xf::LTCTXA_L0_SPT
    );
    let _ = writeln!(
        header,
        "#define lightLocalRange(i) ltc1[{} + (i)].x\n",
        xf::LTC1_R0
    );
    let _ = writeln!(
        header,
        "#define sceneAmbientColor ltctxa[{}].xyz",
        xf::LTCTXA_FR_AMB
    );
    let _ = writeln!(
        header,
        "#define materialEmissionColor ltctxa[{}].xyz\n",
        xf::LTCTXA_CM_COL
    );
    header.push_str("uniform mat4 invViewport;\n\n");
}

#[allow(clippy::too_many_arguments)]
fn append_skinning(
    body: &mut String,
    mix: bool,
    count: u32,
    ty: &str,
    output: &str,
    input: &str,
    matrix: &str,
    swizzle: &str,
) {
    if count == 0 {
        let _ = writeln!(body, "{ty} {output} = ({input} * {matrix}0).{swizzle};");
        return;
    }

    let _ = writeln!(body, "{ty} {output} = {ty}(0.0);");
    if mix {
        // The last weight is whatever the explicit ones leave over.
        body.push_str("{\n  float weight_i;\n  float weight_n = 1.0;\n");
        for i in 0..count {
            if i < count - 1 {
                let c = COMPONENTS[i as usize];
                let _ = writeln!(body, "  weight_i = weight.{c};\n  weight_n -= weight_i;");
            } else {
                body.push_str("  weight_i = weight_n;\n");
            }
            let _ = writeln!(
                body,
                "  {output} += ({input} * {matrix}{i}).{swizzle} * weight_i;"
            );
        }
        body.push_str("}\n");
    } else {
        for i in 0..count {
            let c = COMPONENTS[i as usize];
            let _ = writeln!(
                body,
                "{output} += ({input} * {matrix}{i}).{swizzle} * weight.{c};"
            );
        }
    }
}

fn write_texgen(body: &mut String, stage: usize, texgen: &[Texgen; 4]) {
    debug_assert!(stage < MAX_TEXTURES);
    let _ = writeln!(body, "/* Texgen for stage {stage} */");
    for (j, &mode) in texgen.iter().enumerate() {
        let c = COMPONENTS[j];
        let plane = PLANE_SUFFIXES[j];
        let supported = match mode {
            Texgen::SphereMap => j < 2,
            Texgen::ReflectionMap | Texgen::NormalMap => j < 3,
            _ => true,
        };
        if !supported {
            warn!(stage, component = %c, ?mode, "texgen mode not valid for component; passing coordinate through");
        }
        match mode {
            _ if !supported => {
                let _ = writeln!(body, "oT{stage}.{c} = texture{stage}.{c};");
            }
            Texgen::Disable => {
                let _ = writeln!(body, "oT{stage}.{c} = texture{stage}.{c};");
            }
            Texgen::EyeLinear => {
                let _ = writeln!(
                    body,
                    "oT{stage}.{c} = dot(texPlane{plane}{stage}, tPosition);"
                );
            }
            Texgen::ObjectLinear => {
                let _ = writeln!(body, "oT{stage}.{c} = dot(texPlane{plane}{stage}, position);");
            }
            Texgen::SphereMap => {
                body.push_str(
                    "{\n\
                     \x20 vec3 u = normalize(tPosition.xyz);\n\
                     \x20 vec3 r = reflect(u, tNormal);\n\
                     \x20 float invM = 1.0 / (2.0 * length(r + vec3(0.0, 0.0, 1.0)));\n",
                );
                let _ = writeln!(body, "  oT{stage}.{c} = r.{c} * invM + 0.5;\n}}");
            }
            Texgen::ReflectionMap => {
                body.push_str(
                    "{\n\
                     \x20 vec3 u = normalize(tPosition.xyz);\n\
                     \x20 vec3 r = reflect(u, tNormal);\n",
                );
                let _ = writeln!(body, "  oT{stage}.{c} = r.{c};\n}}");
            }
            Texgen::NormalMap => {
                let _ = writeln!(body, "oT{stage}.{c} = tNormal.{c};");
            }
        }
    }
}

fn write_lighting(ff: &FixedFunctionState, header: &mut String, body: &mut String) {
    let alpha_source = match ff.diffuse_src {
        MaterialColorSource::Material => {
            header.push_str("uniform float material_alpha;\n");
            "material_alpha"
        }
        MaterialColorSource::Diffuse => "diffuse.a",
        MaterialColorSource::Specular => "specular.a",
    };

    let ambient = match ff.ambient_src {
        MaterialColorSource::Material => "sceneAmbientColor",
        MaterialColorSource::Diffuse => "diffuse.rgb",
        MaterialColorSource::Specular => "specular.rgb",
    };
    let _ = writeln!(body, "oD0 = vec4({ambient}, {alpha_source});");
    body.push_str("oD0.rgb *= materialEmissionColor.rgb;\n");

    let emission = match ff.emission_src {
        MaterialColorSource::Material => "sceneAmbientColor",
        MaterialColorSource::Diffuse => "diffuse.rgb",
        MaterialColorSource::Specular => "specular.rgb",
    };
    let _ = writeln!(body, "oD0.rgb += {emission};");
    body.push_str("oD1 = vec4(0.0, 0.0, 0.0, specular.a);\n");

    for (i, &light) in ff.lights.iter().enumerate() {
        if light == LightType::Off {
            continue;
        }

        let _ = writeln!(body, "/* Light {i} */ {{");

        if matches!(light, LightType::Local | LightType::Spot) {
            let _ = writeln!(header, "uniform vec3 lightLocalPosition{i};");
            let _ = writeln!(header, "uniform vec3 lightLocalAttenuation{i};");
            let _ = writeln!(
                body,
                "  vec3 VP = lightLocalPosition{i} - tPosition.xyz/tPosition.w;\n\
                 \x20 float d = length(VP);\n\
                 \x20 VP = normalize(VP);\n\
                 \x20 float attenuation = 1.0 / (lightLocalAttenuation{i}.x\n\
                 \x20                              + lightLocalAttenuation{i}.y * d\n\
                 \x20                              + lightLocalAttenuation{i}.z * d * d);\n\
                 \x20 vec3 halfVector = normalize(VP + eyePosition.xyz / eyePosition.w);\n\
                 \x20 float nDotVP = max(0.0, dot(tNormal, VP));\n\
                 \x20 float nDotHV = max(0.0, dot(tNormal, halfVector));"
            );
        }

        match light {
            LightType::Infinite => {
                let _ = writeln!(header, "uniform vec3 lightInfiniteHalfVector{i};");
                let _ = writeln!(header, "uniform vec3 lightInfiniteDirection{i};");
                let _ = writeln!(
                    body,
                    "  float attenuation = 1.0;\n\
                     \x20 float nDotVP = max(0.0, dot(tNormal, normalize(vec3(lightInfiniteDirection{i}))));\n\
                     \x20 float nDotHV = max(0.0, dot(tNormal, vec3(lightInfiniteHalfVector{i})));"
                );
            }
            LightType::Spot => {
                let _ = writeln!(
                    body,
                    "  vec4 spotDir = lightSpotDirection({i});\n\
                     \x20 float invScale = 1/length(spotDir.xyz);\n\
                     \x20 float cosHalfPhi = -invScale*spotDir.w;\n\
                     \x20 float cosHalfTheta = invScale + cosHalfPhi;\n\
                     \x20 float spotDirDotVP = dot(spotDir.xyz, VP);\n\
                     \x20 float rho = invScale*spotDirDotVP;\n\
                     \x20 if (rho > cosHalfTheta) {{\n\
                     \x20 }} else if (rho <= cosHalfPhi) {{\n\
                     \x20   attenuation = 0.0;\n\
                     \x20 }} else {{\n\
                     \x20   attenuation *= spotDirDotVP + spotDir.w;\n\
                     \x20 }}"
                );
            }
            LightType::Local | LightType::Off => {}
        }

        let _ = writeln!(
            body,
            "  float pf;\n\
             \x20 if (nDotVP == 0.0) {{\n\
             \x20   pf = 0.0;\n\
             \x20 }} else {{\n\
             \x20   pf = pow(nDotHV, 0.001);\n\
             \x20 }}\n\
             \x20 vec3 lightAmbient = lightAmbientColor({i}) * attenuation;\n\
             \x20 vec3 lightDiffuse = lightDiffuseColor({i}) * attenuation * nDotVP;\n\
             \x20 vec3 lightSpecular = lightSpecularColor({i}) * pf;"
        );
        body.push_str("  oD0.xyz += lightAmbient;\n");
        body.push_str(match ff.diffuse_src {
            MaterialColorSource::Material => "  oD0.xyz += lightDiffuse;\n",
            MaterialColorSource::Diffuse => "  oD0.xyz += diffuse.xyz * lightDiffuse;\n",
            MaterialColorSource::Specular => "  oD0.xyz += specular.xyz * lightDiffuse;\n",
        });
        body.push_str("  oD1.xyz += specular.xyz * lightSpecular;\n}\n");
    }
}
