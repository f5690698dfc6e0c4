//! Lenient extraction of typed tunables from a `serde_json::Value` object.
//!
//! Used by [`SimulationConfig::from_json`](crate::config::SimulationConfig::from_json).
//! A missing key or a value of the wrong JSON type yields the default, so a
//! partial override object is always accepted. Range checks happen later in
//! `SimulationConfig::validate`.

use serde_json::Value;

/// Reads `params[name]` as `f32`, or `default` if missing or not a number.
///
/// JSON integers are accepted and widened.
pub fn param_f32(params: &Value, name: &str, default: f32) -> f32 {
    params
        .get(name)
        .and_then(Value::as_f64)
        .map(|v| v as f32)
        .unwrap_or(default)
}

/// Reads `params[name]` as `u32`, or `default` if missing, negative,
/// fractional or larger than `u32::MAX`.
pub fn param_u32(params: &Value, name: &str, default: u32) -> u32 {
    params
        .get(name)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(default)
}

/// Reads `params[name]` as a string slice, or `default` if missing or not a string.
pub fn param_str<'a>(params: &'a Value, name: &str, default: &'a str) -> &'a str {
    params.get(name).and_then(Value::as_str).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn param_f32_reads_float() {
        let params = json!({"dt": 0.02});
        assert!((param_f32(&params, "dt", 0.016) - 0.02).abs() < f32::EPSILON);
    }

    #[test]
    fn param_f32_widens_integer() {
        let params = json!({"curl_strength": 30});
        assert!((param_f32(&params, "curl_strength", 20.0) - 30.0).abs() < f32::EPSILON);
    }

    #[test]
    fn param_f32_falls_back_on_missing_key_and_wrong_type() {
        let params = json!({"dt": "fast"});
        assert!((param_f32(&params, "dt", 0.016) - 0.016).abs() < f32::EPSILON);
        assert!((param_f32(&params, "other", 1.5) - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn param_f32_falls_back_for_non_object() {
        let params = json!([1, 2, 3]);
        assert!((param_f32(&params, "dt", 0.5) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn param_u32_reads_integer() {
        let params = json!({"jacobi_iterations": 20});
        assert_eq!(param_u32(&params, "jacobi_iterations", 3), 20);
    }

    #[test]
    fn param_u32_rejects_negative_fractional_and_oversized() {
        let params = json!({"a": -1, "b": 2.5, "c": 5_000_000_000_u64});
        assert_eq!(param_u32(&params, "a", 7), 7);
        assert_eq!(param_u32(&params, "b", 7), 7);
        assert_eq!(param_u32(&params, "c", 7), 7);
    }

    #[test]
    fn param_str_reads_string_or_default() {
        let params = json!({"precision": "full", "n": 3});
        assert_eq!(param_str(&params, "precision", "half"), "full");
        assert_eq!(param_str(&params, "n", "half"), "half");
        assert_eq!(param_str(&params, "missing", "half"), "half");
    }
}
