use aero_nv2a::state::{FixedFunctionState, LightType, MicrocodeProgram, Texgen, VertexProgram};
use aero_nv2a::vertex::Shading;
use aero_nv2a::{geom, psh, translate, vertex, PolygonMode, PrimitiveMode, PshState, ShaderState};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// `MOV R0, v0` repeated, ending in `MOV oPos, R0`.
fn microcode(len: usize) -> MicrocodeProgram {
    let mut tokens = Vec::with_capacity(len);
    for i in 0..len {
        let mut token = [0u32; 4];
        let last = i + 1 == len;
        // MOV with an identity swizzle on A.
        token[1] = (1 << 21) | 0x1B;
        token[2] = if last { 1 << 26 } else { 2 << 26 };
        token[3] = if last {
            (1 << 11) | (0xF << 12) | 1
        } else {
            0xF << 24
        };
        tokens.push(token);
    }
    MicrocodeProgram {
        tokens,
        z_perspective: false,
    }
}

fn lit_state() -> ShaderState {
    let mut ff = FixedFunctionState {
        lighting: true,
        normalization: true,
        ..Default::default()
    };
    ff.lights = [LightType::Infinite; 8];
    ff.lights[7] = LightType::Spot;
    ff.texgen = [[Texgen::EyeLinear; 4]; 4];
    ff.texture_matrix_enable = [true; 4];

    let mut state = ShaderState::default();
    state.geom.primitive_mode = PrimitiveMode::Quads;
    state.geom.polygon_front_mode = PolygonMode::Fill;
    state.geom.polygon_back_mode = PolygonMode::Fill;
    state.vsh.program = VertexProgram::FixedFunction(ff);
    state
}

/// Eight general stages multiplying textures into r0, plus a final combiner.
fn combiner_state() -> PshState {
    let mut psh = PshState {
        combiner_control: 8 | (0x11 << 8),
        shader_stage_program: 0x01 | (0x01 << 5) | (0x03 << 10) | (0x02 << 15),
        final_inputs_0: (0x0C << 24) | (0x20 << 16) | (0x04 << 8),
        final_inputs_1: 0x1C << 8,
        ..Default::default()
    };
    for stage in 0..8 {
        let tex = 0x08 + (stage as u32 % 4);
        psh.rgb_inputs[stage] = (tex << 24) | (0x0C << 16) | (0x01 << 8) | 0x04;
        psh.rgb_outputs[stage] = (0x0C << 8) | (0x08 << 12);
        psh.alpha_inputs[stage] = ((tex | 0x10) << 24) | (0x30 << 16);
        psh.alpha_outputs[stage] = 0x0C << 4;
    }
    psh
}

fn bench_translation(c: &mut Criterion) {
    let mut group = c.benchmark_group("nv2a_shader_translation");

    for len in [8usize, 136] {
        let mut state = ShaderState::default();
        state.vsh.program = VertexProgram::Microcode(microcode(len));
        group.bench_with_input(BenchmarkId::new("vertex_microcode", len), &state, |b, s| {
            b.iter(|| vertex::generate(black_box(&s.vsh), s.shading(), false).unwrap());
        });
    }

    let lit = lit_state();
    group.bench_function("vertex_fixed_function", |b| {
        b.iter(|| vertex::generate(black_box(&lit.vsh), lit.shading(), true).unwrap());
    });
    group.bench_function("geometry_quads", |b| {
        b.iter(|| geom::generate(black_box(&lit.geom), lit.shading()).unwrap());
    });

    let combiners = combiner_state();
    group.bench_function("pixel_combiners", |b| {
        b.iter(|| psh::translate(black_box(&combiners), Shading::Flat));
    });

    let mut full = lit.clone();
    full.psh = combiners;
    group.bench_function("program", |b| {
        b.iter(|| translate(black_box(&full)).unwrap());
    });
    group.bench_function("content_hash", |b| {
        b.iter(|| black_box(&full).content_hash());
    });

    group.finish();
}

criterion_group!(benches, bench_translation);
criterion_main!(benches);
