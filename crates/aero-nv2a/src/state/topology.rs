use std::fmt;

/// Primitive type as latched by `SET_BEGIN_END`.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PrimitiveMode {
    /// `END`; no draw is in progress.
    #[default]
    Invalid = 0,
    Points = 1,
    Lines = 2,
    LineLoop = 3,
    LineStrip = 4,
    Triangles = 5,
    TriangleStrip = 6,
    TriangleFan = 7,
    Quads = 8,
    QuadStrip = 9,
    Polygon = 10,
}

impl PrimitiveMode {
    pub fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Invalid,
            1 => Self::Points,
            2 => Self::Lines,
            3 => Self::LineLoop,
            4 => Self::LineStrip,
            5 => Self::Triangles,
            6 => Self::TriangleStrip,
            7 => Self::TriangleFan,
            8 => Self::Quads,
            9 => Self::QuadStrip,
            10 => Self::Polygon,
            _ => return None,
        })
    }

    pub fn raw(self) -> u8 {
        self as u8
    }

    /// Whether the primitive produces filled faces that a polygon mode applies to.
    pub fn has_faces(self) -> bool {
        matches!(
            self,
            Self::Triangles
                | Self::TriangleStrip
                | Self::TriangleFan
                | Self::Quads
                | Self::QuadStrip
                | Self::Polygon
        )
    }
}

impl fmt::Display for PrimitiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrimitiveMode::Invalid => "invalid",
            PrimitiveMode::Points => "points",
            PrimitiveMode::Lines => "lines",
            PrimitiveMode::LineLoop => "line_loop",
            PrimitiveMode::LineStrip => "line_strip",
            PrimitiveMode::Triangles => "triangles",
            PrimitiveMode::TriangleStrip => "triangle_strip",
            PrimitiveMode::TriangleFan => "triangle_fan",
            PrimitiveMode::Quads => "quads",
            PrimitiveMode::QuadStrip => "quad_strip",
            PrimitiveMode::Polygon => "polygon",
        };
        f.write_str(s)
    }
}

/// Rasterization mode for front- or back-facing polygons.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    #[default]
    Fill = 0,
    Point = 1,
    Line = 2,
}

impl PolygonMode {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Fill),
            1 => Some(Self::Point),
            2 => Some(Self::Line),
            _ => None,
        }
    }

    pub fn raw(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for PolygonMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PolygonMode::Fill => "fill",
            PolygonMode::Point => "point",
            PolygonMode::Line => "line",
        })
    }
}

/// Primitive the host draw call must be issued with.
///
/// When a geometry shader is synthesized this is the shader's input primitive, which is
/// why adjacency variants appear here: they carry four vertices per quad.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveAssembly {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
    LinesAdjacency,
    LineStripAdjacency,
}

impl fmt::Display for PrimitiveAssembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrimitiveAssembly::Points => "points",
            PrimitiveAssembly::Lines => "lines",
            PrimitiveAssembly::LineLoop => "line_loop",
            PrimitiveAssembly::LineStrip => "line_strip",
            PrimitiveAssembly::Triangles => "triangles",
            PrimitiveAssembly::TriangleStrip => "triangle_strip",
            PrimitiveAssembly::TriangleFan => "triangle_fan",
            PrimitiveAssembly::LinesAdjacency => "lines_adjacency",
            PrimitiveAssembly::LineStripAdjacency => "line_strip_adjacency",
        };
        f.write_str(s)
    }
}

/// Host primitive for a draw in `primitive_mode`, given the (already validated) polygon mode.
///
/// Returns `None` for [`PrimitiveMode::Invalid`].
pub fn primitive_assembly(
    primitive_mode: PrimitiveMode,
    polygon_mode: PolygonMode,
) -> Option<PrimitiveAssembly> {
    if polygon_mode == PolygonMode::Point && primitive_mode != PrimitiveMode::Invalid {
        return Some(PrimitiveAssembly::Points);
    }
    Some(match primitive_mode {
        PrimitiveMode::Invalid => return None,
        PrimitiveMode::Points => PrimitiveAssembly::Points,
        PrimitiveMode::Lines => PrimitiveAssembly::Lines,
        PrimitiveMode::LineLoop => PrimitiveAssembly::LineLoop,
        PrimitiveMode::LineStrip => PrimitiveAssembly::LineStrip,
        PrimitiveMode::Triangles => PrimitiveAssembly::Triangles,
        PrimitiveMode::TriangleStrip => PrimitiveAssembly::TriangleStrip,
        PrimitiveMode::TriangleFan => PrimitiveAssembly::TriangleFan,
        PrimitiveMode::Quads => PrimitiveAssembly::LinesAdjacency,
        PrimitiveMode::QuadStrip => PrimitiveAssembly::LineStripAdjacency,
        PrimitiveMode::Polygon => match polygon_mode {
            PolygonMode::Line => PrimitiveAssembly::LineLoop,
            _ => PrimitiveAssembly::TriangleFan,
        },
    })
}
