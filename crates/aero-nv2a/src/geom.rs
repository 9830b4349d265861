//! Geometry stage synthesis for primitives the host cannot rasterize directly.
//!
//! Quads arrive as `lines_adjacency` (four vertices per primitive) and are re-emitted as
//! triangle strips or line loops; wireframe triangles are re-emitted as line strips. The
//! stage also forwards the flat-shading provoking vertex, which differs from the host's.

use std::fmt::Write;

use thiserror::Error;

use crate::state::topology::primitive_assembly;
use crate::state::{GeomState, PolygonMode, PrimitiveAssembly, PrimitiveMode};
use crate::vertex::{vertex_data, Shading};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GeomError {
    #[error("two-sided polygon modes are not supported (front {front}, back {back})")]
    PolygonModeMismatch {
        front: PolygonMode,
        back: PolygonMode,
    },
    #[error("no primitive assembly for primitive mode {0}")]
    InvalidPrimitive(PrimitiveMode),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeometryStage {
    /// `None` when the host draws the primitive natively.
    pub source: Option<String>,
    pub assembly: PrimitiveAssembly,
}

struct Layout {
    input: &'static str,
    output: &'static str,
    max_vertices: u32,
    body: &'static str,
}

const LINE_TRIANGLES: &str = "  emit_vertex(0, 0);
  emit_vertex(1, 0);
  emit_vertex(2, 0);
  emit_vertex(0, 0);
  EndPrimitive();
";

// Odd triangles of a strip share their first edge with the previous one.
const LINE_TRIANGLE_STRIP: &str = "  if ((gl_PrimitiveIDIn & 1) == 0) {
    if (gl_PrimitiveIDIn == 0) {
      emit_vertex(0, 0);
    }
    emit_vertex(1, 0);
    emit_vertex(2, 0);
    emit_vertex(0, 0);
  } else {
    emit_vertex(2, 0);
    emit_vertex(1, 0);
    emit_vertex(0, 0);
  }
  EndPrimitive();
";

const LINE_TRIANGLE_FAN: &str = "  if (gl_PrimitiveIDIn == 0) {
    emit_vertex(0, 0);
  }
  emit_vertex(1, 0);
  emit_vertex(2, 0);
  emit_vertex(0, 0);
  EndPrimitive();
";

const LINE_QUADS: &str = "  emit_vertex(0, 3);
  emit_vertex(1, 3);
  emit_vertex(2, 3);
  emit_vertex(3, 3);
  emit_vertex(0, 3);
  EndPrimitive();
";

const FILL_QUADS: &str = "  emit_vertex(3, 3);
  emit_vertex(0, 3);
  emit_vertex(2, 3);
  emit_vertex(1, 3);
  EndPrimitive();
";

// A quad strip assembled as line_strip_adjacency yields one primitive per vertex pair;
// only every other one is a whole quad.
const LINE_QUAD_STRIP: &str = "  if ((gl_PrimitiveIDIn & 1) != 0) { return; }
  if (gl_PrimitiveIDIn == 0) {
    emit_vertex(0, 3);
  }
  emit_vertex(1, 3);
  emit_vertex(3, 3);
  emit_vertex(2, 3);
  emit_vertex(0, 3);
  EndPrimitive();
";

const FILL_QUAD_STRIP: &str = "  if ((gl_PrimitiveIDIn & 1) != 0) { return; }
  emit_vertex(0, 3);
  emit_vertex(1, 3);
  emit_vertex(2, 3);
  emit_vertex(3, 3);
  EndPrimitive();
";

const FLAT_POLYGON: &str = "  emit_vertex(0, 2);
  emit_vertex(1, 2);
  emit_vertex(2, 2);
  EndPrimitive();
";

fn layout(primitive_mode: PrimitiveMode, mode: PolygonMode, smooth: bool) -> Option<Layout> {
    use PolygonMode::{Fill, Line};
    use PrimitiveMode::*;

    let triangles_as_lines = |body| Layout {
        input: "triangles",
        output: "line_strip",
        max_vertices: 4,
        body,
    };
    Some(match (primitive_mode, mode) {
        (_, PolygonMode::Point) => return None,
        (Triangles, Line) => triangles_as_lines(LINE_TRIANGLES),
        (TriangleStrip, Line) => triangles_as_lines(LINE_TRIANGLE_STRIP),
        (TriangleFan, Line) => triangles_as_lines(LINE_TRIANGLE_FAN),
        (Quads, Line) => Layout {
            input: "lines_adjacency",
            output: "line_strip",
            max_vertices: 5,
            body: LINE_QUADS,
        },
        (Quads, Fill) => Layout {
            input: "lines_adjacency",
            output: "triangle_strip",
            max_vertices: 4,
            body: FILL_QUADS,
        },
        (QuadStrip, Line) => Layout {
            input: "lines_adjacency",
            output: "line_strip",
            max_vertices: 5,
            body: LINE_QUAD_STRIP,
        },
        (QuadStrip, Fill) => Layout {
            input: "lines_adjacency",
            output: "triangle_strip",
            max_vertices: 4,
            body: FILL_QUAD_STRIP,
        },
        // Flat polygons take their colors from the third vertex of each triangle.
        (Polygon, Fill) if !smooth => Layout {
            input: "triangles",
            output: "triangle_strip",
            max_vertices: 3,
            body: FLAT_POLYGON,
        },
        _ => return None,
    })
}

pub fn generate(state: &GeomState, shading: Shading) -> Result<GeometryStage, GeomError> {
    if state.polygon_front_mode != state.polygon_back_mode {
        return Err(GeomError::PolygonModeMismatch {
            front: state.polygon_front_mode,
            back: state.polygon_back_mode,
        });
    }
    let mode = state.polygon_front_mode;
    let assembly = primitive_assembly(state.primitive_mode, mode)
        .ok_or(GeomError::InvalidPrimitive(state.primitive_mode))?;

    let source = layout(state.primitive_mode, mode, shading == Shading::Smooth)
        .map(|layout| emit(&layout, shading));
    Ok(GeometryStage { source, assembly })
}

fn emit(layout: &Layout, shading: Shading) -> String {
    let mut s = String::from("#version 400\n\n");
    let _ = writeln!(s, "layout({}) in;", layout.input);
    let _ = writeln!(
        s,
        "layout({}, max_vertices = {}) out;\n",
        layout.output, layout.max_vertices
    );
    s.push_str(&vertex_data(shading, "in", "v_", "[]"));
    s.push('\n');
    s.push_str(&vertex_data(shading, "out", "", ""));
    s.push('\n');

    // Smooth shading never needs the provoking vertex.
    let provoking = match shading {
        Shading::Smooth => "index",
        Shading::Flat => "provoking_index",
    };
    let second = match shading {
        Shading::Smooth => "_unused",
        Shading::Flat => "provoking_index",
    };
    let _ = writeln!(s, "void emit_vertex(int index, int {second}) {{");
    s.push_str(
        "  gl_Position = gl_in[index].gl_Position;\n\
         \x20 gl_PointSize = gl_in[index].gl_PointSize;\n\
         \x20 gl_ClipDistance[0] = gl_in[index].gl_ClipDistance[0];\n\
         \x20 gl_ClipDistance[1] = gl_in[index].gl_ClipDistance[1];\n\
         \x20 vtx_inv_w = v_vtx_inv_w[index];\n",
    );
    let _ = writeln!(s, "  vtx_inv_w_flat = v_vtx_inv_w[{provoking}];");
    for color in ["D0", "D1", "B0", "B1"] {
        let _ = writeln!(s, "  vtx{color} = v_vtx{color}[{provoking}];");
    }
    s.push_str("  vtxFog = v_vtxFog[index];\n");
    for i in 0..4 {
        let _ = writeln!(s, "  vtxT{i} = v_vtxT{i}[index];");
    }
    s.push_str("  EmitVertex();\n}\n\nvoid main() {\n");
    s.push_str(layout.body);
    s.push_str("}\n");
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(primitive_mode: PrimitiveMode, mode: PolygonMode) -> GeomState {
        GeomState {
            primitive_mode,
            polygon_front_mode: mode,
            polygon_back_mode: mode,
        }
    }

    #[test]
    fn native_topologies_need_no_stage() {
        for (primitive, mode) in [
            (PrimitiveMode::Points, PolygonMode::Fill),
            (PrimitiveMode::LineStrip, PolygonMode::Line),
            (PrimitiveMode::Triangles, PolygonMode::Fill),
            (PrimitiveMode::Quads, PolygonMode::Point),
            (PrimitiveMode::Polygon, PolygonMode::Line),
        ] {
            let stage = generate(&state(primitive, mode), Shading::Flat).unwrap();
            assert_eq!(stage.source, None, "{primitive} {mode}");
        }
    }

    #[test]
    fn wireframe_triangles() {
        let stage = generate(&state(PrimitiveMode::Triangles, PolygonMode::Line), Shading::Smooth).unwrap();
        let glsl = stage.source.unwrap();
        assert_eq!(stage.assembly, PrimitiveAssembly::Triangles);
        assert!(glsl.starts_with("#version 400\n\n"), "{glsl}");
        assert!(glsl.contains("layout(line_strip, max_vertices = 4) out;"), "{glsl}");
        assert!(glsl.contains("void emit_vertex(int index, int _unused) {"), "{glsl}");
        assert!(glsl.contains("  vtxD0 = v_vtxD0[index];"), "{glsl}");
        assert!(glsl.contains("noperspective in vec4 v_vtxD1[];"), "{glsl}");
    }

    #[test]
    fn flat_polygon_reorders_provoking_vertex() {
        let stage = generate(&state(PrimitiveMode::Polygon, PolygonMode::Fill), Shading::Flat).unwrap();
        assert_eq!(stage.assembly, PrimitiveAssembly::TriangleFan);
        let glsl = stage.source.unwrap();
        assert!(glsl.contains("  vtxB1 = v_vtxB1[provoking_index];"), "{glsl}");
        assert!(glsl.contains("  emit_vertex(0, 2);"), "{glsl}");

        let smooth = generate(&state(PrimitiveMode::Polygon, PolygonMode::Fill), Shading::Smooth).unwrap();
        assert_eq!(smooth.source, None);
    }

    #[test]
    fn quad_strip_skips_odd_primitives() {
        let stage = generate(&state(PrimitiveMode::QuadStrip, PolygonMode::Fill), Shading::Smooth).unwrap();
        assert_eq!(stage.assembly, PrimitiveAssembly::LineStripAdjacency);
        let glsl = stage.source.unwrap();
        assert!(glsl.contains("if ((gl_PrimitiveIDIn & 1) != 0) { return; }"), "{glsl}");
    }

    #[test]
    fn mismatched_polygon_modes_are_rejected() {
        let mut s = state(PrimitiveMode::Triangles, PolygonMode::Fill);
        s.polygon_back_mode = PolygonMode::Line;
        assert_eq!(
            generate(&s, Shading::Smooth).unwrap_err(),
            GeomError::PolygonModeMismatch {
                front: PolygonMode::Fill,
                back: PolygonMode::Line
            }
        );
    }

    #[test]
    fn end_is_rejected() {
        let s = state(PrimitiveMode::Invalid, PolygonMode::Fill);
        assert_eq!(
            generate(&s, Shading::Smooth).unwrap_err(),
            GeomError::InvalidPrimitive(PrimitiveMode::Invalid)
        );
    }
}
