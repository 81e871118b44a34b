pub(crate) const FETCH_RADIUS_M: f64 = 5000.0;
pub(crate) const SIMPLIFY_TOLERANCE_DEG: f64 = 0.000001;

pub(crate) const METERS_PER_DEGREE: f64 = 111_320.0;

pub(crate) const CANVAS_SIZE: u32 = 720;
pub(crate) const ROAD_STROKE_WIDTH: f32 = 1.0;
pub(crate) const FEATURE_OPACITY: f32 = 0.8;
pub(crate) const POINT_RADIUS: f32 = 1.5;

pub(crate) const ROAD_COLOR: &str = "#000000";
pub(crate) const WATER_COLOR: &str = "#0000ff";

pub(crate) const VIEWPORT_ZOOM: f64 = 1.3;

pub(crate) const LABEL_MIN_LENGTH: usize = 5;
pub(crate) const LABEL_MAX_LENGTH: usize = 35;
pub(crate) const LABEL_MIN_FONT_SIZE: f64 = 24.0;
pub(crate) const LABEL_MAX_FONT_SIZE: f64 = 64.0;
pub(crate) const LABEL_STROKE_WIDTH: f64 = 3.0;
pub(crate) const LABEL_FILL: &str = "#000000";
pub(crate) const LABEL_STROKE: &str = "#ffffff";
pub(crate) const LABEL_FONT_FAMILY: &str = "sans-serif";

pub(crate) const WORKER_POOL_SIZE: usize = 4;

#[cfg(feature = "raster")]
pub(crate) const RASTER_SIZE: u32 = 1080;
#[cfg(feature = "raster")]
pub(crate) const RASTER_CROP_ZOOM: f32 = 1.3;

pub(crate) const OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
pub(crate) const OVERPASS_TIMEOUT_SECS: u64 = 180;

pub(crate) const CLEANUP_PROGRAM: &str = "svgo";

pub(crate) const VIDEO_ENCODER: &str = "ffmpeg";
pub(crate) const VIDEO_FRAME_RATE: u32 = 30;

pub(crate) const PARTIAL_SUFFIX: &str = "partial";

// Raw colors emitted by the compositor, keyed by layer name.
pub(crate) const DEFAULT_LAYER_COLORS: [(&str, &str); 15] = [
    ("water", WATER_COLOR),
    ("wood", "#006400"),
    ("grassland", "#90ee90"),
    ("tree", "#008000"),
    ("beach", "#f4a460"),
    ("park", "#008000"),
    ("garden", "#32cd32"),
    ("pitch", "#90ee90"),
    ("sports_centre", "#006400"),
    ("forest", "#006400"),
    ("meadow", "#90ee90"),
    ("recreation_ground", "#9acd32"),
    ("residential", "#d3d3d3"),
    ("commercial", "#808080"),
    ("building", "#a9a9a9"),
];

// Raw color -> refined color, applied to the serialized document.
pub(crate) const DEFAULT_PALETTE: [(&str, &str); 11] = [
    (WATER_COLOR, "#a5bfdd"),
    ("#006400", "#6b8f5e"),
    ("#90ee90", "#c8dfb0"),
    ("#008000", "#8fb47a"),
    ("#f4a460", "#eedcb3"),
    ("#32cd32", "#a8d08d"),
    ("#9acd32", "#bcd38e"),
    ("#d3d3d3", "#ecebe6"),
    ("#808080", "#d9d4cc"),
    ("#a9a9a9", "#c9c2b8"),
    (ROAD_COLOR, "#2b2b2b"),
];
