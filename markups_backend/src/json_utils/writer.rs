use crate::json_utils::{JsonFieldError, JsonMap, JsonValue};
use crate::markup::CoordinateSystem;
use serde_json::Number;

/// Builder for a single JSON object
///
/// Floats are rounded to `precision` significant digits. Nested objects are
/// built with a child writer and only attached when the builder closure
/// succeeds, so a failed nested write leaves no trace in the parent.
#[derive(Debug, Clone)]
pub struct JsonWriter {
    fields: JsonMap<String, JsonValue>,
    precision: usize,
    coordinate_system: CoordinateSystem,
}

impl JsonWriter {
    pub fn new(precision: usize, coordinate_system: CoordinateSystem) -> Self {
        Self {
            fields: JsonMap::new(),
            precision: precision.max(1),
            coordinate_system,
        }
    }

    /// Creates an empty writer with the same formatting options
    pub fn child(&self) -> Self {
        Self::new(self.precision, self.coordinate_system)
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    /// Coordinate system positions and directions are written in
    pub fn coordinate_system(&self) -> CoordinateSystem {
        self.coordinate_system
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: JsonValue) {
        self.fields.insert(key.into(), value);
    }

    pub fn write_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.insert(key, JsonValue::String(value.into()));
    }

    pub fn write_bool(&mut self, key: impl Into<String>, value: bool) {
        self.insert(key, JsonValue::Bool(value));
    }

    pub fn write_u64(&mut self, key: impl Into<String>, value: u64) {
        self.insert(key, JsonValue::Number(value.into()));
    }

    pub fn write_number(&mut self, key: impl Into<String>, value: f64) -> miette::Result<()> {
        let key = key.into();
        let value = self.number(&key, value)?;
        self.insert(key, value);
        Ok(())
    }

    pub fn write_vector(&mut self, key: impl Into<String>, values: &[f64]) -> miette::Result<()> {
        let key = key.into();
        let value = self.vector(&key, values)?;
        self.insert(key, value);
        Ok(())
    }

    pub fn write_object(
        &mut self,
        key: impl Into<String>,
        build: impl FnOnce(&mut JsonWriter) -> miette::Result<()>,
    ) -> miette::Result<()> {
        let mut child = self.child();
        build(&mut child)?;
        self.insert(key, child.finish());
        Ok(())
    }

    pub fn write_object_array<T>(
        &mut self,
        key: impl Into<String>,
        items: impl IntoIterator<Item = T>,
        mut build: impl FnMut(&mut JsonWriter, T) -> miette::Result<()>,
    ) -> miette::Result<()> {
        let mut array = vec![];
        for item in items {
            let mut child = self.child();
            build(&mut child, item)?;
            array.push(child.finish());
        }
        self.insert(key, JsonValue::Array(array));
        Ok(())
    }

    /// Formats a single float with this writer's precision
    pub fn number(&self, key: &str, value: f64) -> miette::Result<JsonValue> {
        if !value.is_finite() {
            return Err(JsonFieldError::NonFinite {
                key: key.to_string(),
                value,
            }
            .into());
        }
        let rounded = round_significant(value, self.precision);
        Number::from_f64(rounded)
            .map(JsonValue::Number)
            .ok_or_else(|| {
                JsonFieldError::NonFinite {
                    key: key.to_string(),
                    value,
                }
                .into()
            })
    }

    pub fn vector(&self, key: &str, values: &[f64]) -> miette::Result<JsonValue> {
        values
            .iter()
            .map(|v| self.number(key, *v))
            .collect::<miette::Result<Vec<_>>>()
            .map(JsonValue::Array)
    }

    pub fn finish(self) -> JsonValue {
        JsonValue::Object(self.fields)
    }
}

fn round_significant(value: f64, precision: usize) -> f64 {
    if value == 0.0 {
        return 0.0;
    }
    let formatted = format!("{:.*e}", precision - 1, value);
    // adding zero folds negative zero produced by coordinate flips
    formatted.parse::<f64>().unwrap_or(value) + 0.0
}

#[cfg(test)]
mod tests {
    use super::{round_significant, JsonWriter};
    use crate::json_utils::JsonFieldError;
    use crate::markup::CoordinateSystem;
    use rstest::rstest;
    use serde_json::json;

    fn writer(precision: usize) -> JsonWriter {
        JsonWriter::new(precision, CoordinateSystem::Ras)
    }

    #[rstest]
    #[case(1.23456789, 3, 1.23)]
    #[case(-0.000123456, 2, -0.00012)]
    #[case(98765.4321, 4, 98770.0)]
    #[case(-0.0, 6, 0.0)]
    #[case(0.1 + 0.2, 12, 0.3)]
    fn should_round_to_significant_digits(
        #[case] value: f64,
        #[case] precision: usize,
        #[case] expected: f64,
    ) {
        assert_eq!(round_significant(value, precision), expected);
    }

    #[test]
    fn should_write_scalars_and_vectors() {
        let mut w = writer(6);
        w.write_string("name", "P");
        w.write_bool("locked", true);
        w.write_u64("count", 3);
        w.write_vector("origin", &[1.0, 2.0, 3.0000001]).unwrap();
        assert_eq!(
            w.finish(),
            json!({"name": "P", "locked": true, "count": 3, "origin": [1.0, 2.0, 3.0]})
        );
    }

    #[test]
    fn should_reject_non_finite_numbers() {
        let mut w = writer(6);
        let err = w.write_vector("normal", &[0.0, f64::NAN, 1.0]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JsonFieldError>(),
            Some(JsonFieldError::NonFinite { .. })
        ));
        assert!(w.is_empty());
    }

    #[test]
    fn should_not_attach_failed_nested_object() {
        let mut w = writer(6);
        let result = w.write_object("display", |d| {
            d.write_bool("visibility", true);
            d.write_number("opacity", f64::INFINITY)
        });
        assert!(result.is_err());
        assert!(w.is_empty());
    }

    #[test]
    fn should_write_object_arrays() {
        let mut w = writer(6);
        w.write_object_array("controlPoints", ["a", "b"], |p, label| {
            p.write_string("label", label);
            Ok(())
        })
        .unwrap();
        assert_eq!(
            w.finish(),
            json!({"controlPoints": [{"label": "a"}, {"label": "b"}]})
        );
    }
}
