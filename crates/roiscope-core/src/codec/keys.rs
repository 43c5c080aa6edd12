//! Wire field names of the ROI JSON schema.

/// Namespace prefix of every `@type` URI.
pub const SCHEMA_NS: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06#";

// Common keys
pub const KEY_TYPE: &str = "@type";
pub const KEY_ID: &str = "@id";
pub const KEY_OLD_ID: &str = "oldId";
pub const KEY_MARKED_FOR_DELETION: &str = "markedForDeletion";
pub const KEY_SHAPES: &str = "shapes";

// Dimension keys
pub const KEY_THE_Z: &str = "TheZ";
pub const KEY_THE_T: &str = "TheT";
pub const KEY_THE_C: &str = "TheC";

// Style keys
pub const KEY_FILL_COLOR: &str = "FillColor";
pub const KEY_STROKE_COLOR: &str = "StrokeColor";
pub const KEY_STROKE_WIDTH: &str = "StrokeWidth";
pub const KEY_VALUE: &str = "Value";
pub const KEY_UNIT: &str = "Unit";
pub const KEY_TEXT: &str = "Text";
pub const KEY_FONT_FAMILY: &str = "FontFamily";
pub const KEY_FONT_STYLE: &str = "FontStyle";
pub const KEY_FONT_SIZE: &str = "FontSize";

/// `@type` of length records (stroke width, font size).
pub const TYPE_LENGTH: &str = "TBD#LengthI";

// Point / Rectangle / Ellipse / Label / Mask keys
pub const KEY_X: &str = "X";
pub const KEY_Y: &str = "Y";
pub const KEY_WIDTH: &str = "Width";
pub const KEY_HEIGHT: &str = "Height";
pub const KEY_RADIUS_X: &str = "RadiusX";
pub const KEY_RADIUS_Y: &str = "RadiusY";
pub const KEY_BYTES: &str = "Bytes";

// Line keys
pub const KEY_X1: &str = "X1";
pub const KEY_Y1: &str = "Y1";
pub const KEY_X2: &str = "X2";
pub const KEY_Y2: &str = "Y2";
pub const KEY_MARKER_START: &str = "MarkerStart";
pub const KEY_MARKER_END: &str = "MarkerEnd";
pub const MARKER_ARROW: &str = "Arrow";

// Polyline / Polygon keys
pub const KEY_POINTS: &str = "Points";

pub const KEY_TRANSFORM: &str = "Transform";
