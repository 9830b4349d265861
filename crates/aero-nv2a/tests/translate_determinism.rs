use aero_nv2a::state::{
    FixedFunctionState, FogGen, FogMode, FogState, LightType, MicrocodeProgram, Texgen,
    VertexProgram,
};
use aero_nv2a::{translate, PolygonMode, PrimitiveMode, ShaderState};
use pretty_assertions::assert_eq;

fn sample_states() -> Vec<ShaderState> {
    let mut states = Vec::new();

    let mut quads = ShaderState::default();
    quads.geom.primitive_mode = PrimitiveMode::Quads;
    quads.geom.polygon_front_mode = PolygonMode::Fill;
    quads.geom.polygon_back_mode = PolygonMode::Fill;
    states.push(quads);

    let mut lit = ShaderState::default();
    lit.geom.primitive_mode = PrimitiveMode::TriangleStrip;
    let mut ff = FixedFunctionState {
        lighting: true,
        normalization: true,
        ..Default::default()
    };
    ff.lights[0] = LightType::Infinite;
    ff.lights[1] = LightType::Spot;
    ff.texgen[0] = [Texgen::SphereMap, Texgen::SphereMap, Texgen::Disable, Texgen::Disable];
    ff.texture_matrix_enable[0] = true;
    lit.vsh.program = VertexProgram::FixedFunction(ff);
    lit.vsh.fog = FogState {
        enable: true,
        mode: FogMode::Exp2,
        gen: FogGen::Radial,
    };
    lit.psh.shader_stage_program = 0x01 | (0x03 << 5);
    lit.psh.final_inputs_0 = (0x08 << 24) | (0x20 << 16);
    lit.psh.final_inputs_1 = 0x20 << 8;
    states.push(lit);

    let mut microcode = ShaderState::default();
    microcode.geom.primitive_mode = PrimitiveMode::Lines;
    microcode.smooth_shading = true;
    let mut token = [0u32; 4];
    token[1] = 1 << 21;
    token[2] = 2 << 26;
    token[3] = (1 << 11) | (0xF << 12) | 1;
    microcode.vsh.program = VertexProgram::Microcode(MicrocodeProgram {
        tokens: vec![token],
        z_perspective: true,
    });
    states.push(microcode);

    states
}

#[test]
fn equal_states_give_identical_sources() {
    for state in sample_states() {
        let first = translate(&state).unwrap();
        let second = translate(&state.clone()).unwrap();
        assert_eq!(first, second);

        let decoded = ShaderState::from_bytes(&state.to_bytes()).unwrap();
        assert_eq!(decoded.content_hash(), state.content_hash());
        assert_eq!(translate(&decoded).unwrap(), first);
    }
}

#[test]
fn distinct_states_have_distinct_keys() {
    let states = sample_states();
    for (i, a) in states.iter().enumerate() {
        for b in &states[i + 1..] {
            assert_ne!(a, b);
            assert_ne!(a.content_hash(), b.content_hash());
        }
    }
}

#[test]
fn negative_zero_is_a_distinct_key() {
    let mut a = ShaderState::default();
    a.geom.primitive_mode = PrimitiveMode::Points;
    let mut b = a.clone();
    a.vsh.point.size = 0.0.into();
    b.vsh.point.size = (-0.0).into();
    assert_ne!(a, b);
    assert_ne!(a.to_bytes(), b.to_bytes());
}

#[test]
fn only_synthesized_primitives_get_a_geometry_stage() {
    let states = sample_states();
    assert!(translate(&states[0]).unwrap().geometry.is_some());
    assert!(translate(&states[1]).unwrap().geometry.is_none());
    assert!(translate(&states[2]).unwrap().geometry.is_none());
}
