//! Texture shader stage: one fetch (or address computation) per texture unit, producing
//! the `tN` registers the combiners read.

use std::fmt::Write;

use tracing::warn;

use super::decode::{DotMapping, TextureMode, TextureStages};
use crate::state::{CompareFunc, ConvolutionFilter, PshState};

pub(super) struct TextureUnits<'a> {
    state: &'a PshState,
    stages: TextureStages,
}

impl<'a> TextureUnits<'a> {
    pub(super) fn new(state: &'a PshState) -> Self {
        Self {
            state,
            stages: TextureStages::from_state(state),
        }
    }

    pub(super) fn mode(&self, unit: usize) -> Option<TextureMode> {
        TextureMode::from_raw(self.stages.modes[unit])
    }

    /// Earlier unit whose result feeds `unit`; out-of-order references read the
    /// previous unit instead.
    fn input_tex(&self, unit: usize) -> usize {
        let input = usize::from(self.stages.input_tex[unit]);
        if unit > 0 && input >= unit {
            warn!(unit, input, "texture stage reads a later stage; using the previous one");
            return unit - 1;
        }
        input
    }

    fn dot_map(&self, unit: usize) -> DotMapping {
        let raw = self.stages.dot_maps[unit];
        let Some(map) = DotMapping::from_raw(raw) else {
            warn!(unit, raw, "reserved dot mapping; using zero_to_one");
            return DotMapping::ZeroToOne;
        };
        if !map.is_exact() {
            warn!(unit, mapping = map.function(), "unimplemented dot mapping");
        }
        map
    }

    /// Writes the declarations of `unit` into `preflight` and its fetch into `vars`.
    pub(super) fn write_unit(&self, unit: usize, preflight: &mut String, vars: &mut String) {
        let i = unit;
        let tex = &self.state.textures[i];
        let sampler = match self.mode(i) {
            Some(mode) if mode_valid_on_unit(mode, i) => self.write_mode(mode, i, preflight, vars),
            Some(mode) => {
                warn!(unit = i, %mode, "texture mode not supported on this unit");
                placeholder(vars, i, mode.name());
                None
            }
            None => {
                warn!(unit = i, raw = self.stages.modes[i], "unknown texture mode");
                placeholder(vars, i, "UNKNOWN");
                None
            }
        };

        let _ = writeln!(preflight, "uniform float texScale{i};");
        if let Some(sampler) = sampler {
            let _ = writeln!(preflight, "uniform {sampler} texSamp{i};");
            // Only units that actually fetch take part in alpha kill.
            if tex.alphakill {
                let _ = writeln!(vars, "if (t{i}.a == 0.0) {{ discard; }};");
            }
        }
    }

    /// Emits the fetch for a mode already checked against the unit, returning the sampler
    /// type it needs.
    fn write_mode(
        &self,
        mode: TextureMode,
        i: usize,
        preflight: &mut String,
        vars: &mut String,
    ) -> Option<&'static str> {
        let tex = &self.state.textures[i];
        let flat_sampler = if tex.rect { "sampler2DRect" } else { "sampler2D" };
        if tex.shadow_map && !matches!(mode, TextureMode::Project2D | TextureMode::Project3D) {
            warn!(unit = i, %mode, "shadow compare not supported for mode; sampling without compare");
        }

        match mode {
            TextureMode::None => {
                placeholder(vars, i, mode.name());
                None
            }
            TextureMode::Project2D => {
                if tex.shadow_map {
                    self.write_shadow_map(i, false, vars);
                } else {
                    let mut lookup = "textureProj";
                    if tex.convolution != ConvolutionFilter::Disabled {
                        // Quincunx is approximated by the gaussian kernel.
                        if tex.rect {
                            lookup = "gaussianFilter2DRectProj";
                        } else {
                            warn!(unit = i, filter = ?tex.convolution, "convolution filter for non-rect 2D texture unimplemented");
                        }
                    }
                    self.apply_border(vars, i, &format!("pT{i}"), "xyz");
                    let _ = writeln!(vars, "pT{i}.xy = texScale{i} * pT{i}.xy;");
                    let _ = writeln!(vars, "vec4 t{i} = {lookup}(texSamp{i}, pT{i}.xyw);");
                }
                Some(flat_sampler)
            }
            TextureMode::Project3D => {
                if tex.shadow_map {
                    self.write_shadow_map(i, true, vars);
                    return Some(flat_sampler);
                }
                self.apply_border(vars, i, &format!("pT{i}"), "xyz");
                let _ = writeln!(vars, "vec4 t{i} = textureProj(texSamp{i}, pT{i}.xyzw);");
                Some("sampler3D")
            }
            TextureMode::Cubemap => {
                let _ = writeln!(vars, "vec4 t{i} = texture(texSamp{i}, pT{i}.xyz / pT{i}.w);");
                Some("samplerCube")
            }
            TextureMode::Passthru => {
                if tex.border_logical_size[0].0 != 0.0 {
                    warn!(unit = i, "border size ignored for passthrough texture stage");
                }
                let _ = writeln!(vars, "vec4 t{i} = pT{i};");
                None
            }
            TextureMode::ClipPlane => {
                placeholder(vars, i, mode.name());
                for (j, component) in "xyzw".chars().enumerate() {
                    let op = if tex.compare_mode[j] { ">=" } else { "<" };
                    let _ = writeln!(vars, "  if(pT{i}.{component} {op} 0.0) {{ discard; }};");
                }
                None
            }
            TextureMode::BumpEnvMap => {
                let src = self.input_tex(i);
                let _ = writeln!(preflight, "uniform mat2 bumpMat{i};");
                if self.state.textures[src].snorm {
                    let _ = writeln!(vars, "vec2 dsdt{i} = t{src}.bg;");
                } else {
                    let _ = writeln!(vars, "vec2 dsdt{i} = vec2(sign3(t{src}.b), sign3(t{src}.g));");
                }
                let _ = writeln!(vars, "dsdt{i} = bumpMat{i} * dsdt{i};");
                let _ = writeln!(
                    vars,
                    "vec4 t{i} = texture(texSamp{i}, texScale{i} * (pT{i}.xy + dsdt{i}));"
                );
                Some(flat_sampler)
            }
            TextureMode::BumpEnvMapLum => {
                let src = self.input_tex(i);
                let _ = writeln!(preflight, "uniform float bumpScale{i};");
                let _ = writeln!(preflight, "uniform float bumpOffset{i};");
                let _ = writeln!(preflight, "uniform mat2 bumpMat{i};");
                if self.state.textures[src].snorm {
                    let _ = writeln!(
                        vars,
                        "vec3 dsdtl{i} = vec3(t{src}.bg, sign3_to_0_to_1(t{src}.r));"
                    );
                } else {
                    let _ = writeln!(
                        vars,
                        "vec3 dsdtl{i} = vec3(sign3(t{src}.b), sign3(t{src}.g), t{src}.r);"
                    );
                }
                let _ = writeln!(vars, "dsdtl{i}.st = bumpMat{i} * dsdtl{i}.st;");
                let _ = writeln!(
                    vars,
                    "vec4 t{i} = texture(texSamp{i}, texScale{i} * (pT{i}.xy + dsdtl{i}.st));"
                );
                let _ = writeln!(
                    vars,
                    "t{i} = t{i} * (bumpScale{i} * dsdtl{i}.p + bumpOffset{i});"
                );
                Some(flat_sampler)
            }
            TextureMode::Brdf | TextureMode::DotReflectSpecularConst => {
                warn!(unit = i, %mode, "unimplemented texture mode; result is zero");
                placeholder(vars, i, mode.name());
                None
            }
            TextureMode::DotSt => {
                let _ = writeln!(vars, "/* PS_TEXTUREMODES_DOT_ST */");
                self.write_dot(i, vars);
                let _ = writeln!(vars, "vec2 dotST{i} = vec2(dot{}, dot{i});", i - 1);
                self.apply_border(vars, i, &format!("dotST{i}"), "xy");
                let _ = writeln!(vars, "vec4 t{i} = texture(texSamp{i}, texScale{i} * dotST{i});");
                Some(flat_sampler)
            }
            TextureMode::DotZw => {
                // Depth replacement is not wired up; only the dot product is kept.
                let _ = writeln!(vars, "/* PS_TEXTUREMODES_DOT_ZW */");
                self.write_dot(i, vars);
                let _ = writeln!(vars, "vec4 t{i} = vec4(0.0);");
                None
            }
            TextureMode::DotReflectDiffuse => {
                let _ = writeln!(vars, "/* PS_TEXTUREMODES_DOT_RFLCT_DIFF */");
                self.write_dot(i, vars);
                let next = i + 1;
                let _ = writeln!(
                    vars,
                    "float dot{i}_n = dot(pT{next}.xyz, {}(t{}));",
                    self.dot_map(next).function(),
                    self.input_tex(next)
                );
                let _ = writeln!(vars, "vec3 n_{i} = vec3(dot{}, dot{i}, dot{i}_n);", i - 1);
                self.apply_border(vars, i, &format!("n_{i}"), "xyz");
                let _ = writeln!(vars, "vec4 t{i} = texture(texSamp{i}, n_{i});");
                Some("samplerCube")
            }
            TextureMode::DotReflectSpecular => {
                let _ = writeln!(vars, "/* PS_TEXTUREMODES_DOT_RFLCT_SPEC */");
                self.write_dot(i, vars);
                let (a, b) = (i - 2, i - 1);
                let _ = writeln!(vars, "vec3 n_{i} = vec3(dot{a}, dot{b}, dot{i});");
                let _ = writeln!(vars, "vec3 e_{i} = vec3(pT{a}.w, pT{b}.w, pT{i}.w);");
                let _ = writeln!(
                    vars,
                    "vec3 rv_{i} = 2*n_{i}*dot(n_{i},e_{i})/dot(n_{i},n_{i}) - e_{i};"
                );
                self.apply_border(vars, i, &format!("rv_{i}"), "xyz");
                let _ = writeln!(vars, "vec4 t{i} = texture(texSamp{i}, rv_{i});");
                Some("samplerCube")
            }
            TextureMode::DotStr3D | TextureMode::DotStrCube => {
                let (name, sampler) = if mode == TextureMode::DotStr3D {
                    (format!("dotSTR{i}"), "sampler3D")
                } else {
                    (format!("dotSTR{i}Cube"), "samplerCube")
                };
                let _ = writeln!(vars, "/* PS_TEXTUREMODES_{} */", mode.name());
                self.write_dot(i, vars);
                let _ = writeln!(vars, "vec3 {name} = vec3(dot{}, dot{}, dot{i});", i - 2, i - 1);
                self.apply_border(vars, i, &name, "xyz");
                let _ = writeln!(vars, "vec4 t{i} = texture(texSamp{i}, {name});");
                Some(sampler)
            }
            TextureMode::DependentAr | TextureMode::DependentGb => {
                let channels = if mode == TextureMode::DependentAr { "AR" } else { "GB" };
                let swizzle = channels.to_ascii_lowercase();
                let name = format!("t{i}{channels}");
                let _ = writeln!(vars, "vec2 {name} = t{}.{swizzle};", self.input_tex(i));
                self.apply_border(vars, i, &name, "xy");
                let _ = writeln!(vars, "vec4 t{i} = texture(texSamp{i}, {name});");
                Some("sampler2D")
            }
            TextureMode::DotProduct => {
                let _ = writeln!(vars, "/* PS_TEXTUREMODES_DOTPRODUCT */");
                self.write_dot(i, vars);
                let _ = writeln!(vars, "vec4 t{i} = vec4(0.0);");
                None
            }
        }
    }

    fn write_dot(&self, i: usize, vars: &mut String) {
        let _ = writeln!(
            vars,
            "float dot{i} = dot(pT{i}.xyz, {}(t{}));",
            self.dot_map(i).function(),
            self.input_tex(i)
        );
    }

    fn write_shadow_map(&self, i: usize, compare_z: bool, vars: &mut String) {
        let func = self.state.shadow_depth_func;
        let Some(op) = func.glsl_op() else {
            let value = if func == CompareFunc::Never { "0.0" } else { "1.0" };
            let _ = writeln!(vars, "vec4 t{i} = vec4({value});");
            return;
        };

        let _ = writeln!(vars, "pT{i}.xy *= texScale{i};");
        let _ = writeln!(vars, "vec4 t{i}_depth = textureProj(texSamp{i}, pT{i}.xyw);");
        if !compare_z {
            let _ = writeln!(vars, "vec4 t{i} = vec4(t{i}_depth.x {op} 0.0 ? 1.0 : 0.0);");
            return;
        }
        // depth.y != 0 marks a 24-bit depth format, depth.z != 0 a float one.
        let _ = write!(
            vars,
            "float t{i}_max_depth;\n\
             if (t{i}_depth.y > 0) {{\n\
             \x20 t{i}_max_depth = 0xFFFFFF;\n\
             }} else {{\n\
             \x20 t{i}_max_depth = t{i}_depth.z > 0 ? 511.9375 : 0xFFFF;\n\
             }}\n\
             t{i}_depth.x *= t{i}_max_depth;\n\
             pT{i}.z = clamp(pT{i}.z / pT{i}.w, 0, t{i}_max_depth);\n\
             vec4 t{i} = vec4(t{i}_depth.x {op} pT{i}.z ? 1.0 : 0.0);\n"
        );
    }

    /// Maps coordinates in `var` past the 4-texel border the hardware keeps around
    /// bordered textures.
    fn apply_border(&self, vars: &mut String, i: usize, var: &str, swizzle: &str) {
        let tex = &self.state.textures[i];
        if tex.border_logical_size[0].0 == 0.0 {
            return;
        }
        let [lx, ly, lz] = tex.border_logical_size.map(|v| v.0);
        let [rx, ry, rz] = tex.border_inv_real_size.map(|v| v.0);
        let _ = writeln!(vars, "vec3 t{i}LogicalSize = vec3({lx:.6}, {ly:.6}, {lz:.6});");
        let _ = writeln!(vars, "vec3 t{i}InvRealSize = vec3({rx:.6}, {ry:.6}, {rz:.6});");
        let _ = writeln!(
            vars,
            "{var}.{swizzle} = ({var}.{swizzle} * t{i}LogicalSize.{swizzle} + 4.0) * t{i}InvRealSize.{swizzle};"
        );
    }
}

fn placeholder(vars: &mut String, i: usize, mode: &str) {
    let _ = writeln!(vars, "vec4 t{i} = vec4(0.0); /* PS_TEXTUREMODES_{mode} */");
}

/// Dependent modes read earlier units, so each is only meaningful on some units.
fn mode_valid_on_unit(mode: TextureMode, unit: usize) -> bool {
    match mode {
        TextureMode::None
        | TextureMode::Project2D
        | TextureMode::Project3D
        | TextureMode::Cubemap
        | TextureMode::Passthru
        | TextureMode::ClipPlane => true,
        TextureMode::BumpEnvMap
        | TextureMode::BumpEnvMapLum
        | TextureMode::DependentAr
        | TextureMode::DependentGb => unit >= 1,
        TextureMode::Brdf | TextureMode::DotSt | TextureMode::DotZw => unit >= 2,
        TextureMode::DotProduct => unit == 1 || unit == 2,
        TextureMode::DotReflectDiffuse => unit == 2,
        TextureMode::DotReflectSpecular
        | TextureMode::DotStr3D
        | TextureMode::DotStrCube
        | TextureMode::DotReflectSpecularConst => unit == 3,
    }
}
