//! Affine transform codec.
//!
//! Shapes may carry a 6-parameter affine transform `(a00, a10, a01, a11, a02, a12)`
//! mapping their local coordinates into image space. On the wire it travels as
//! an `AffineTransform` record with fields `A00`..`A12`; in memory it is a
//! [`kurbo::Affine`], whose coefficient order is the same.
//!
//! The functions in this module work on flat `[x0, y0, x1, y1, ...]` arrays in
//! wire space (Y grows downward). The Y-sign flip between wire space and the
//! internal display space lives in [`crate::geometry`].

use crate::codec::keys::{KEY_TYPE, SCHEMA_NS};
use kurbo::Affine;
use serde_json::{Map, Value};

/// Type name of the wire transform record.
pub const TYPE_AFFINE_TRANSFORM: &str = "AffineTransform";

const KEY_A00: &str = "A00";
const KEY_A10: &str = "A10";
const KEY_A01: &str = "A01";
const KEY_A11: &str = "A11";
const KEY_A02: &str = "A02";
const KEY_A12: &str = "A12";

/// Wire field names in coefficient order.
const COEFFICIENT_KEYS: [&str; 6] = [KEY_A00, KEY_A10, KEY_A01, KEY_A11, KEY_A02, KEY_A12];

/// Determinants smaller than this are treated as zero.
const SINGULAR_EPSILON: f64 = 1e-12;

/// Convert a wire transform record into a matrix.
///
/// Returns `None` unless `@type` names an affine transform and all six
/// coefficients are present and numeric.
pub fn to_matrix(wire: &Value) -> Option<Affine> {
    let map = wire.as_object()?;
    let type_name = map.get(KEY_TYPE)?.as_str()?;
    let is_affine = type_name
        .rsplit('#')
        .next()
        .is_some_and(|t| t.eq_ignore_ascii_case(TYPE_AFFINE_TRANSFORM));
    if !is_affine {
        return None;
    }

    let mut coeffs = [0.0; 6];
    for (slot, key) in coeffs.iter_mut().zip(COEFFICIENT_KEYS) {
        *slot = map.get(key)?.as_f64()?;
    }
    Some(Affine::new(coeffs))
}

/// Convert a flat coefficient list into a wire transform record.
///
/// Returns `None` if the list does not hold exactly six values.
pub fn to_wire_format(matrix: &[f64]) -> Option<Value> {
    if matrix.len() != 6 {
        return None;
    }
    let mut map = Map::new();
    map.insert(
        KEY_TYPE.to_string(),
        Value::from(format!("{SCHEMA_NS}{TYPE_AFFINE_TRANSFORM}")),
    );
    for (key, value) in COEFFICIENT_KEYS.iter().zip(matrix) {
        map.insert((*key).to_string(), Value::from(*value));
    }
    Some(Value::Object(map))
}

/// Encode a matrix as a wire transform record.
pub fn affine_to_wire(matrix: &Affine) -> Value {
    let mut map = Map::new();
    map.insert(
        KEY_TYPE.to_string(),
        Value::from(format!("{SCHEMA_NS}{TYPE_AFFINE_TRANSFORM}")),
    );
    for (key, value) in COEFFICIENT_KEYS.iter().zip(matrix.as_coeffs()) {
        map.insert((*key).to_string(), Value::from(value));
    }
    Value::Object(map)
}

/// Determinant of the linear part, `a00 * a11 - a10 * a01`.
pub fn determinant(matrix: &Affine) -> f64 {
    let [a00, a10, a01, a11, _, _] = matrix.as_coeffs();
    a00 * a11 - a10 * a01
}

/// Invert a matrix. `None` means the matrix is not invertible.
pub fn invert(matrix: &Affine) -> Option<Affine> {
    let det = determinant(matrix);
    if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
        return None;
    }
    let [a00, a10, a01, a11, a02, a12] = matrix.as_coeffs();
    let inv_det = 1.0 / det;
    let b00 = a11 * inv_det;
    let b10 = -a10 * inv_det;
    let b01 = -a01 * inv_det;
    let b11 = a00 * inv_det;
    let b02 = -(b00 * a02 + b01 * a12);
    let b12 = -(b10 * a02 + b11 * a12);
    Some(Affine::new([b00, b10, b01, b11, b02, b12]))
}

/// Apply a matrix to a flat coordinate array.
///
/// The input is returned unchanged if there is no matrix, the array is empty
/// or its length is odd.
pub fn apply(matrix: Option<&Affine>, coords: &[f64]) -> Vec<f64> {
    match matrix {
        Some(m) if is_pair_list(coords) => map_pairs(m, coords),
        _ => coords.to_vec(),
    }
}

/// Apply the inverse of a matrix to a flat coordinate array.
///
/// Same no-op rules as [`apply`]; a non-invertible matrix also leaves the
/// coordinates unchanged.
pub fn apply_inverse(matrix: Option<&Affine>, coords: &[f64]) -> Vec<f64> {
    match matrix.and_then(invert) {
        Some(inverse) if is_pair_list(coords) => map_pairs(&inverse, coords),
        _ => coords.to_vec(),
    }
}

fn is_pair_list(coords: &[f64]) -> bool {
    !coords.is_empty() && coords.len() % 2 == 0
}

fn map_pairs(matrix: &Affine, coords: &[f64]) -> Vec<f64> {
    let [a00, a10, a01, a11, a02, a12] = matrix.as_coeffs();
    coords
        .chunks_exact(2)
        .flat_map(|pair| {
            let (x, y) = (pair[0], pair[1]);
            [a00 * x + a01 * y + a02, a10 * x + a11 * y + a12]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn approx_eq(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn test_to_matrix_requires_affine_type() {
        let wire = json!({
            "@type": "http://www.openmicroscopy.org/Schemas/OME/2016-06#AffineTransform",
            "A00": 1.0, "A10": 0.0, "A01": 0.0, "A11": 1.0, "A02": 5.0, "A12": 7.0
        });
        let m = to_matrix(&wire).unwrap();
        assert_eq!(m.as_coeffs(), [1.0, 0.0, 0.0, 1.0, 5.0, 7.0]);

        let wrong_type = json!({
            "@type": "http://www.openmicroscopy.org/Schemas/OME/2016-06#Rectangle",
            "A00": 1.0, "A10": 0.0, "A01": 0.0, "A11": 1.0, "A02": 5.0, "A12": 7.0
        });
        assert!(to_matrix(&wrong_type).is_none());
    }

    #[test]
    fn test_to_matrix_missing_field() {
        let wire = json!({
            "@type": "AffineTransform",
            "A00": 1.0, "A10": 0.0, "A01": 0.0, "A11": 1.0, "A02": 5.0
        });
        assert!(to_matrix(&wire).is_none());
    }

    #[test]
    fn test_wire_format_roundtrip() {
        let wire = to_wire_format(&[2.0, 0.5, -0.5, 2.0, 10.0, -3.0]).unwrap();
        let m = to_matrix(&wire).unwrap();
        assert_eq!(m.as_coeffs(), [2.0, 0.5, -0.5, 2.0, 10.0, -3.0]);
        assert!(to_wire_format(&[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_apply_then_inverse_is_identity() {
        let m = Affine::new([1.5, 0.3, -0.7, 0.9, 12.0, -4.0]);
        let coords = [0.0, 0.0, 10.5, -3.25, -100.0, 42.0];
        let forward = apply(Some(&m), &coords);
        let back = apply_inverse(Some(&m), &forward);
        assert!(approx_eq(&back, &coords));
    }

    #[test]
    fn test_apply_noop_cases() {
        let m = Affine::new([2.0, 0.0, 0.0, 2.0, 1.0, 1.0]);
        assert_eq!(apply(None, &[1.0, 2.0]), vec![1.0, 2.0]);
        assert!(apply(Some(&m), &[]).is_empty());
        assert_eq!(apply(Some(&m), &[1.0, 2.0, 3.0]), vec![1.0, 2.0, 3.0]);
        assert_eq!(apply_inverse(Some(&m), &[1.0]), vec![1.0]);
    }

    #[test]
    fn test_singular_matrix_has_no_inverse() {
        let singular = Affine::new([1.0, 2.0, 2.0, 4.0, 0.0, 0.0]);
        assert!(invert(&singular).is_none());
        // Falls back to the untransformed coordinates.
        assert_eq!(apply_inverse(Some(&singular), &[3.0, 4.0]), vec![3.0, 4.0]);
    }
}
