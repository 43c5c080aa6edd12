//! Conversion between shape records and the server's ROI JSON schema.
//!
//! Every wire shape carries an `@type` URI whose trailing segment names the
//! shape kind. Y coordinates are negated on the way out and again on the way
//! in, since the wire format grows downward.

pub mod color;
pub mod keys;

use crate::geometry::{
    ArrowMarkers, DEFAULT_ELLIPSE_STEP, Ellipse, Geometry, GeometryTrait, Label, Line, Mask,
    PointShape, Polygon, Polyline, Rectangle, ShapeKind,
};
use crate::regions::{Dimensions, ShapeId, ShapeRecord, ShapeState};
use crate::style::{Font, ShapeStyle, StrokeWidth};
use crate::transform;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use color::{decode_color, encode_color};
use keys::*;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Average glyph width relative to the font size, used to size label boxes.
const GLYPH_WIDTH_RATIO: f64 = 0.6;

/// One ROI as returned by the fetch endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoiJson {
    #[serde(rename = "@id")]
    pub id: i64,
    #[serde(default)]
    pub shapes: Vec<Value>,
}

/// Shapes of one ROI in a save request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoiPayload {
    pub shapes: Vec<Value>,
}

/// Body of the save endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub image_id: i64,
    pub rois: BTreeMap<String, RoiPayload>,
}

/// Response of the save endpoint: old composite id to new composite id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveResponse {
    pub ids: BTreeMap<String, String>,
}

/// Serialized dirty shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum WireObject {
    /// Shapes grouped by ROI id, ready for a save request.
    Grouped(BTreeMap<String, RoiPayload>),
    /// A flat shape list (clipboard, export).
    Flat(Vec<Value>),
}

impl WireObject {
    /// Number of shapes held.
    pub fn shape_count(&self) -> usize {
        match self {
            WireObject::Grouped(rois) => rois.values().map(|r| r.shapes.len()).sum(),
            WireObject::Flat(shapes) => shapes.len(),
        }
    }
}

// Helper functions to extract values from a wire object
fn get_f64(map: &Map<String, Value>, key: &str) -> Option<f64> {
    map.get(key)?.as_f64()
}

fn get_i64(map: &Map<String, Value>, key: &str) -> Option<i64> {
    let value = map.get(key)?;
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

fn get_str<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)?.as_str()
}

/// Negate a Y coordinate without producing `-0`.
fn flip_y(y: f64) -> f64 {
    0.0 - y
}

fn type_uri(kind: ShapeKind) -> String {
    format!("{SCHEMA_NS}{}", kind.wire_name())
}

/// Trailing segment of an `@type` URI.
fn type_segment(type_uri: &str) -> &str {
    type_uri.rsplit('#').next().unwrap_or(type_uri)
}

fn points_to_wire(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", p.x, flip_y(p.y)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn points_from_wire(points: &str) -> Option<Vec<Point>> {
    points
        .split_whitespace()
        .map(|pair| {
            let (x, y) = pair.split_once(',')?;
            let x: f64 = x.trim().parse().ok()?;
            let y: f64 = y.trim().parse().ok()?;
            Some(Point::new(x, flip_y(y)))
        })
        .collect()
}

fn length_to_wire(value: f64, unit: &str) -> Value {
    let mut map = Map::new();
    map.insert(KEY_TYPE.to_string(), Value::from(TYPE_LENGTH));
    map.insert(KEY_VALUE.to_string(), Value::from(value));
    map.insert(KEY_UNIT.to_string(), Value::from(unit));
    Value::Object(map)
}

/// Read a length record, or a bare number in pixels.
fn length_from_wire(value: &Value) -> Option<(f64, String)> {
    if let Some(v) = value.as_f64() {
        return Some((v, "PIXEL".to_string()));
    }
    let map = value.as_object()?;
    let v = get_f64(map, KEY_VALUE)?;
    let unit = get_str(map, KEY_UNIT).unwrap_or("PIXEL").to_string();
    Some((v, unit))
}

fn insert_markers(map: &mut Map<String, Value>, arrows: &ArrowMarkers) {
    if arrows.start {
        map.insert(KEY_MARKER_START.to_string(), Value::from(MARKER_ARROW));
    }
    if arrows.end {
        map.insert(KEY_MARKER_END.to_string(), Value::from(MARKER_ARROW));
    }
}

fn markers_from_wire(map: &Map<String, Value>) -> ArrowMarkers {
    let is_arrow =
        |key: &str| get_str(map, key).is_some_and(|m| m.eq_ignore_ascii_case(MARKER_ARROW));
    ArrowMarkers {
        start: is_arrow(KEY_MARKER_START),
        end: is_arrow(KEY_MARKER_END),
    }
}

/// Size of the box a label's text occupies.
pub fn label_extent(text: Option<&str>, font_size: f64) -> (f64, f64) {
    let chars = text.map_or(0, |t| t.chars().count()).max(1) as f64;
    (chars * font_size * GLYPH_WIDTH_RATIO, font_size)
}

/// Encode a geometry, and optionally its persisted id, into a wire shape.
///
/// Unsaved ids are not written; the server assigns them.
pub fn encode_geometry(geometry: &Geometry, shape_id: Option<&ShapeId>) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(KEY_TYPE.to_string(), Value::from(type_uri(geometry.kind())));
    if let Some(id) = shape_id.filter(|id| !id.is_unsaved()) {
        map.insert(KEY_ID.to_string(), Value::from(id.shape_id));
    }

    match geometry {
        Geometry::Point(point) => {
            let p = point.position();
            map.insert(KEY_X.to_string(), Value::from(p.x));
            map.insert(KEY_Y.to_string(), Value::from(flip_y(p.y)));
        }
        Geometry::Line(line) => {
            let (start, end) = (line.start(), line.end());
            map.insert(KEY_X1.to_string(), Value::from(start.x));
            map.insert(KEY_Y1.to_string(), Value::from(flip_y(start.y)));
            map.insert(KEY_X2.to_string(), Value::from(end.x));
            map.insert(KEY_Y2.to_string(), Value::from(flip_y(end.y)));
            insert_markers(&mut map, &line.arrows);
        }
        Geometry::Polyline(polyline) => {
            map.insert(KEY_POINTS.to_string(), Value::from(points_to_wire(polyline.coordinates())));
            insert_markers(&mut map, &polyline.arrows);
        }
        Geometry::Polygon(polygon) => {
            map.insert(KEY_POINTS.to_string(), Value::from(points_to_wire(polygon.coordinates())));
        }
        Geometry::Rectangle(rect) => {
            let corner = rect.upper_left_corner();
            map.insert(KEY_X.to_string(), Value::from(corner.x));
            map.insert(KEY_Y.to_string(), Value::from(flip_y(corner.y)));
            map.insert(KEY_WIDTH.to_string(), Value::from(rect.width()));
            map.insert(KEY_HEIGHT.to_string(), Value::from(rect.height()));
        }
        Geometry::Ellipse(ellipse) => {
            let center = ellipse.center();
            let (rx, ry) = ellipse.radius();
            map.insert(KEY_X.to_string(), Value::from(center.x));
            map.insert(KEY_Y.to_string(), Value::from(flip_y(center.y)));
            map.insert(KEY_RADIUS_X.to_string(), Value::from(rx));
            map.insert(KEY_RADIUS_Y.to_string(), Value::from(ry));
        }
        Geometry::Label(label) => {
            // Width and height are derived from the text; only the anchor travels.
            let anchor = label.upper_left_corner();
            map.insert(KEY_X.to_string(), Value::from(anchor.x));
            map.insert(KEY_Y.to_string(), Value::from(flip_y(anchor.y)));
        }
        Geometry::Mask(mask) => {
            let corner = mask.upper_left_corner();
            map.insert(KEY_X.to_string(), Value::from(corner.x));
            map.insert(KEY_Y.to_string(), Value::from(flip_y(corner.y)));
            map.insert(KEY_WIDTH.to_string(), Value::from(mask.width()));
            map.insert(KEY_HEIGHT.to_string(), Value::from(mask.height()));
            if let Some(bytes) = &mask.bytes {
                map.insert(KEY_BYTES.to_string(), Value::from(BASE64.encode(bytes)));
            }
        }
    }

    if let Some(matrix) = geometry.transform() {
        map.insert(KEY_TRANSFORM.to_string(), transform::affine_to_wire(matrix));
    }
    map
}

/// Fold style properties into a wire shape.
pub fn encode_style(style: &ShapeStyle, kind: ShapeKind, map: &mut Map<String, Value>) {
    if let Some(color) = &style.stroke_color {
        map.insert(KEY_STROKE_COLOR.to_string(), Value::from(encode_color(color)));
    }
    if let Some(width) = &style.stroke_width {
        map.insert(KEY_STROKE_WIDTH.to_string(), length_to_wire(width.value, &width.unit));
    }
    if let Some(color) = &style.fill_color {
        map.insert(KEY_FILL_COLOR.to_string(), Value::from(encode_color(color)));
    }
    if let Some(text) = &style.text {
        map.insert(KEY_TEXT.to_string(), Value::from(text.as_str()));
    }
    if kind == ShapeKind::Label {
        let font = style.font.clone().unwrap_or_default();
        map.insert(KEY_FONT_FAMILY.to_string(), Value::from(font.family));
        map.insert(KEY_FONT_STYLE.to_string(), Value::from(font.style));
        map.insert(KEY_FONT_SIZE.to_string(), length_to_wire(font.size, &font.unit));
    }
}

/// Encode a full shape record for a save request.
///
/// The record's composite id travels under `oldId` for reconciliation.
pub fn encode_shape(record: &ShapeRecord) -> Value {
    let mut map = encode_geometry(&record.geometry, Some(&record.id));
    encode_style(&record.style, record.kind(), &mut map);
    let Dimensions { the_z, the_t, the_c } = record.dims;
    for (key, value) in [(KEY_THE_Z, the_z), (KEY_THE_T, the_t), (KEY_THE_C, the_c)] {
        if value >= 0 {
            map.insert(key.to_string(), Value::from(value));
        }
    }
    map.insert(KEY_OLD_ID.to_string(), Value::from(record.id.to_string()));
    if record.is_removed() {
        map.insert(KEY_MARKED_FOR_DELETION.to_string(), Value::Bool(true));
    }
    Value::Object(map)
}

fn decode_geometry(kind: ShapeKind, map: &Map<String, Value>, ellipse_step: f64) -> Option<Geometry> {
    let matrix = map.get(KEY_TRANSFORM).and_then(transform::to_matrix);
    let geometry = match kind {
        ShapeKind::Point => Geometry::Point(PointShape::with_transform(
            Point::new(get_f64(map, KEY_X)?, flip_y(get_f64(map, KEY_Y)?)),
            matrix,
        )),
        ShapeKind::Line => {
            let start = Point::new(get_f64(map, KEY_X1)?, flip_y(get_f64(map, KEY_Y1)?));
            let end = Point::new(get_f64(map, KEY_X2)?, flip_y(get_f64(map, KEY_Y2)?));
            let mut line = Line::with_transform(start, end, matrix);
            line.arrows = markers_from_wire(map);
            Geometry::Line(line)
        }
        ShapeKind::Polyline => {
            let points = points_from_wire(get_str(map, KEY_POINTS)?)?;
            let mut polyline = Polyline::with_transform(points, matrix);
            polyline.arrows = markers_from_wire(map);
            Geometry::Polyline(polyline)
        }
        ShapeKind::Polygon => Geometry::Polygon(Polygon::with_transform(
            points_from_wire(get_str(map, KEY_POINTS)?)?,
            matrix,
        )),
        ShapeKind::Rectangle => Geometry::Rectangle(Rectangle::with_transform(
            get_f64(map, KEY_X)?,
            flip_y(get_f64(map, KEY_Y)?),
            get_f64(map, KEY_WIDTH)?,
            get_f64(map, KEY_HEIGHT)?,
            matrix,
        )),
        ShapeKind::Ellipse => Geometry::Ellipse(Ellipse::with_step(
            Point::new(get_f64(map, KEY_X)?, flip_y(get_f64(map, KEY_Y)?)),
            get_f64(map, KEY_RADIUS_X)?,
            get_f64(map, KEY_RADIUS_Y)?,
            matrix,
            ellipse_step,
        )),
        ShapeKind::Label => {
            let font_size = map
                .get(KEY_FONT_SIZE)
                .and_then(length_from_wire)
                .map_or(Font::default().size, |(size, _)| size);
            let (width, height) = label_extent(get_str(map, KEY_TEXT), font_size);
            Geometry::Label(Label::with_transform(
                Point::new(get_f64(map, KEY_X)?, flip_y(get_f64(map, KEY_Y)?)),
                width,
                height,
                matrix,
            ))
        }
        ShapeKind::Mask => {
            let mut mask = Mask::with_transform(
                get_f64(map, KEY_X)?,
                flip_y(get_f64(map, KEY_Y)?),
                get_f64(map, KEY_WIDTH)?,
                get_f64(map, KEY_HEIGHT)?,
                matrix,
            );
            mask.bytes = get_str(map, KEY_BYTES).and_then(|b| BASE64.decode(b).ok());
            Geometry::Mask(mask)
        }
    };
    Some(geometry)
}

fn decode_style(kind: ShapeKind, map: &Map<String, Value>) -> ShapeStyle {
    let font = (kind == ShapeKind::Label).then(|| {
        let defaults = Font::default();
        let (size, unit) = map
            .get(KEY_FONT_SIZE)
            .and_then(length_from_wire)
            .unwrap_or((defaults.size, defaults.unit));
        Font {
            family: get_str(map, KEY_FONT_FAMILY).map_or(defaults.family, str::to_string),
            style: get_str(map, KEY_FONT_STYLE).map_or(defaults.style, str::to_string),
            size,
            unit,
        }
    });
    ShapeStyle {
        fill_color: get_i64(map, KEY_FILL_COLOR).map(decode_color),
        stroke_color: get_i64(map, KEY_STROKE_COLOR).map(decode_color),
        stroke_width: map
            .get(KEY_STROKE_WIDTH)
            .and_then(length_from_wire)
            .map(|(value, unit)| StrokeWidth { value, unit }),
        text: get_str(map, KEY_TEXT).map(str::to_string),
        font,
    }
}

/// Decode one wire shape belonging to ROI `roi_id`.
///
/// Unknown types and missing geometry fields yield `None`.
pub fn decode_shape(roi_id: i64, wire: &Value) -> Option<ShapeRecord> {
    decode_shape_with_step(roi_id, wire, DEFAULT_ELLIPSE_STEP)
}

/// Like [`decode_shape`], tracing ellipses with a custom angular step.
pub fn decode_shape_with_step(roi_id: i64, wire: &Value, ellipse_step: f64) -> Option<ShapeRecord> {
    let Some(map) = wire.as_object() else {
        log::warn!("Skipping wire shape that is not an object");
        return None;
    };
    let type_name = get_str(map, KEY_TYPE).map(type_segment).unwrap_or_default();
    let Some(kind) = ShapeKind::from_wire_name(type_name) else {
        log::warn!("Skipping wire shape with unknown type {type_name:?}");
        return None;
    };
    let Some(shape_id) = get_i64(map, KEY_ID) else {
        log::warn!("Skipping {type_name} without an id in ROI {roi_id}");
        return None;
    };
    let Some(geometry) = decode_geometry(kind, map, ellipse_step) else {
        log::warn!("Skipping {type_name} {roi_id}:{shape_id} with missing geometry fields");
        return None;
    };

    let dim = |key: &str| get_i64(map, key).and_then(|v| i32::try_from(v).ok()).unwrap_or(-1);
    Some(ShapeRecord::new(
        ShapeId::new(roi_id, shape_id),
        geometry,
        decode_style(kind, map),
        Dimensions::new(dim(KEY_THE_Z), dim(KEY_THE_T), dim(KEY_THE_C)),
    ))
}

/// Decode the shapes of every fetched ROI, skipping malformed ones.
pub fn decode_rois(rois: &[RoiJson], ellipse_step: f64) -> Vec<ShapeRecord> {
    rois.iter()
        .flat_map(|roi| {
            roi.shapes
                .iter()
                .filter_map(move |shape| decode_shape_with_step(roi.id, shape, ellipse_step))
        })
        .collect()
}

/// Serialize every dirty shape.
///
/// Shapes created and deleted without ever being saved are skipped. With
/// `group_separately`, each unsaved shape gets its own negative ROI id.
/// Returns `None` when nothing needs saving.
pub fn to_wire_object<'a>(
    records: impl IntoIterator<Item = &'a ShapeRecord>,
    group_separately: bool,
    flatten: bool,
) -> Option<WireObject> {
    let mut dirty: Vec<&ShapeRecord> = records
        .into_iter()
        .filter(|r| r.state != ShapeState::Default && !r.is_discarded())
        .collect();
    if dirty.is_empty() {
        return None;
    }
    dirty.sort_by_key(|r| r.id);

    if flatten {
        return Some(WireObject::Flat(dirty.into_iter().map(encode_shape).collect()));
    }

    let mut next_roi_id = dirty.iter().map(|r| r.id.roi_id).min().unwrap_or(0).min(0) - 1;
    let mut rois: BTreeMap<String, RoiPayload> = BTreeMap::new();
    let mut claimed_unsaved = std::collections::HashSet::new();
    for record in dirty {
        let mut roi_id = record.id.roi_id;
        if record.id.is_unsaved() && group_separately && !claimed_unsaved.insert(roi_id) {
            roi_id = next_roi_id;
            next_roi_id -= 1;
        }
        rois.entry(roi_id.to_string())
            .or_default()
            .shapes
            .push(encode_shape(record));
    }
    Some(WireObject::Grouped(rois))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::RgbaColor;
    use kurbo::Affine;
    use serde_json::json;

    fn record(id: ShapeId, geometry: Geometry) -> ShapeRecord {
        ShapeRecord::new(id, geometry, ShapeStyle::default(), Dimensions::UNATTACHED)
    }

    #[test]
    fn test_rectangle_wire_fields() {
        let rect = Geometry::Rectangle(Rectangle::new(33.0, -77.0, 20.0, 40.0));
        let map = encode_geometry(&rect, None);
        assert_eq!(map[KEY_X].as_f64(), Some(33.0));
        assert_eq!(map[KEY_Y].as_f64(), Some(77.0));
        assert_eq!(map[KEY_WIDTH].as_f64(), Some(20.0));
        assert_eq!(map[KEY_HEIGHT].as_f64(), Some(40.0));
        assert!(map[KEY_TYPE].as_str().unwrap().ends_with("#Rectangle"));
        assert!(!map.contains_key(KEY_ID));
    }

    #[test]
    fn test_rectangle_roundtrip_keeps_dims() {
        let mut original = record(
            ShapeId::new(4, 12),
            Geometry::Rectangle(Rectangle::new(33.0, -77.0, 20.0, 40.0)),
        );
        original.dims = Dimensions::new(2, 0, -1);
        let wire = encode_shape(&original);
        assert_eq!(wire[KEY_THE_Z], json!(2));
        assert!(wire.get(KEY_THE_C).is_none());

        let decoded = decode_shape(4, &wire).unwrap();
        assert_eq!(decoded.id, original.id);
        assert_eq!(decoded.geometry, original.geometry);
        assert_eq!(decoded.dims, original.dims);
    }

    #[test]
    fn test_polygon_points_string() {
        let polygon = Geometry::Polygon(Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, -5.0),
            Point::new(2.5, -8.0),
        ]));
        let map = encode_geometry(&polygon, Some(&ShapeId::new(1, 3)));
        assert_eq!(map[KEY_POINTS], json!("0,0 10,5 2.5,8"));
        assert_eq!(map[KEY_ID], json!(3));

        let decoded = decode_shape(1, &Value::Object(map)).unwrap();
        assert_eq!(decoded.geometry, polygon);
    }

    #[test]
    fn test_ellipse_with_transform_roundtrip() {
        let m = Affine::new([1.0, 0.0, 0.0, 1.0, 10.0, 20.0]);
        let ellipse = Geometry::Ellipse(Ellipse::with_transform(Point::new(5.0, -6.0), 3.0, 2.0, Some(m)));
        let map = encode_geometry(&ellipse, Some(&ShapeId::new(1, 1)));
        assert!(map.contains_key(KEY_TRANSFORM));
        let decoded = decode_shape(1, &Value::Object(map)).unwrap();
        assert_eq!(decoded.geometry, ellipse);
    }

    #[test]
    fn test_label_writes_anchor_only() {
        let label = Geometry::Label(Label::new(Point::new(3.0, -4.0), 50.0, 12.0));
        let map = encode_geometry(&label, None);
        assert_eq!(map[KEY_X].as_f64(), Some(3.0));
        assert_eq!(map[KEY_Y].as_f64(), Some(4.0));
        assert!(!map.contains_key(KEY_WIDTH));
        assert!(!map.contains_key(KEY_HEIGHT));
    }

    #[test]
    fn test_decode_label_style() {
        let wire = json!({
            "@type": "http://www.openmicroscopy.org/Schemas/OME/2016-06#Label",
            "@id": 8,
            "X": 1.0, "Y": 2.0,
            "Text": "nucleus",
            "FontFamily": "serif",
            "FontStyle": "Italic",
            "FontSize": { "@type": "TBD#LengthI", "Value": 20.0, "Unit": "PIXEL" },
            "StrokeColor": 16711807
        });
        let decoded = decode_shape(3, &wire).unwrap();
        let font = decoded.style.font.unwrap();
        assert_eq!(font.family, "serif");
        assert_eq!(font.style, "Italic");
        assert_eq!(font.size, 20.0);
        assert_eq!(decoded.style.text.as_deref(), Some("nucleus"));
        assert_eq!(decoded.style.stroke_color.unwrap().green, 255);
        let label = decoded.geometry.as_label().unwrap();
        assert_eq!(label.upper_left_corner(), Point::new(1.0, -2.0));
        assert_eq!(label.height(), 20.0);
    }

    #[test]
    fn test_decode_is_case_insensitive_and_defaults_dims() {
        let wire = json!({ "@type": "#point", "@id": 1, "X": 1.0, "Y": 1.0 });
        let decoded = decode_shape(2, &wire).unwrap();
        assert_eq!(decoded.kind(), ShapeKind::Point);
        assert_eq!(decoded.dims, Dimensions::UNATTACHED);
    }

    #[test]
    fn test_decode_malformed_returns_none() {
        assert!(decode_shape(1, &json!({ "@type": "#Circle", "@id": 1 })).is_none());
        assert!(decode_shape(1, &json!({ "@type": "#Rectangle", "@id": 1, "X": 1.0 })).is_none());
        assert!(decode_shape(1, &json!({ "@type": "#Polygon", "@id": 1, "Points": "1,2 x" })).is_none());
        assert!(decode_shape(1, &json!([1, 2])).is_none());
    }

    #[test]
    fn test_decode_rois_skips_bad_shapes() {
        let rois: Vec<RoiJson> = serde_json::from_value(json!([
            { "@id": 1, "shapes": [
                { "@type": "#Point", "@id": 10, "X": 0.0, "Y": 0.0 },
                { "@type": "#Nope", "@id": 11 }
            ]},
            { "@id": 2, "shapes": [
                { "@type": "#Line", "@id": 20, "X1": 0.0, "Y1": 0.0, "X2": 1.0, "Y2": 1.0,
                  "MarkerEnd": "Arrow" }
            ]}
        ]))
        .unwrap();
        let records = decode_rois(&rois, DEFAULT_ELLIPSE_STEP);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, ShapeId::new(2, 20));
        match &records[1].geometry {
            Geometry::Line(line) => assert!(line.arrows.end && !line.arrows.start),
            other => panic!("expected line, got {other:?}"),
        }
    }

    #[test]
    fn test_mask_bytes_roundtrip() {
        let mut mask = Mask::new(0.0, 0.0, 4.0, 2.0);
        mask.bytes = Some(vec![0b1010_0101, 0xff]);
        let geometry = Geometry::Mask(mask);
        let map = encode_geometry(&geometry, Some(&ShapeId::new(1, 2)));
        let decoded = decode_shape(1, &Value::Object(map)).unwrap();
        assert_eq!(decoded.geometry, geometry);
    }

    #[test]
    fn test_style_encoding() {
        let style = ShapeStyle {
            fill_color: Some(RgbaColor::new(0, 255, 0, 0.5)),
            stroke_width: Some(StrokeWidth::pixels(2.0)),
            ..Default::default()
        };
        let mut map = Map::new();
        encode_style(&style, ShapeKind::Rectangle, &mut map);
        assert_eq!(map[KEY_FILL_COLOR], json!(16711807));
        assert_eq!(map[KEY_STROKE_WIDTH][KEY_VALUE].as_f64(), Some(2.0));
        assert!(!map.contains_key(KEY_FONT_FAMILY));
    }

    #[test]
    fn test_to_wire_object_groups_dirty_shapes() {
        let point = || Geometry::Point(PointShape::new(Point::ZERO));
        let mut added = record(ShapeId::new(-1, 1), point());
        added.state = ShapeState::Added;
        let mut added_too = record(ShapeId::new(-1, 2), point());
        added_too.state = ShapeState::Added;
        let mut removed = record(ShapeId::new(7, 3), point());
        removed.state = ShapeState::Removed;
        removed.old_state = Some(ShapeState::Default);
        let mut discarded = record(ShapeId::new(-2, 4), point());
        discarded.state = ShapeState::Removed;
        discarded.old_state = Some(ShapeState::Added);
        let clean = record(ShapeId::new(7, 5), point());

        let all = [added, added_too, removed, discarded, clean];
        let Some(WireObject::Grouped(rois)) = to_wire_object(&all, false, false) else {
            panic!("expected grouped payload");
        };
        assert_eq!(rois.len(), 2);
        assert_eq!(rois["-1"].shapes.len(), 2);
        assert_eq!(rois["7"].shapes[0][KEY_MARKED_FOR_DELETION], json!(true));
        assert_eq!(rois["7"].shapes[0][KEY_OLD_ID], json!("7:3"));

        let Some(WireObject::Grouped(separate)) = to_wire_object(&all, true, false) else {
            panic!("expected grouped payload");
        };
        assert_eq!(separate.len(), 3);
        assert_eq!(separate["-1"].shapes.len(), 1);
        assert_eq!(separate["-2"].shapes.len(), 1);

        let flat = to_wire_object(&all, false, true).unwrap();
        assert_eq!(flat.shape_count(), 3);
    }

    #[test]
    fn test_to_wire_object_none_when_clean() {
        let clean = record(ShapeId::new(1, 1), Geometry::Point(PointShape::new(Point::ZERO)));
        assert!(to_wire_object([&clean], false, false).is_none());
    }
}
