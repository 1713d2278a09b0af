use crate::json_utils::{json_expected, json_kind, JsonFieldError, JsonMap, JsonValue};
use itertools::Itertools;
use std::str::FromStr;
use strum::VariantNames;

/// Read-only view over a parsed JSON object
///
/// All getters return `Ok(None)` for absent keys and an error when the key is
/// present but holds a value of the wrong shape.
#[derive(Debug, Clone, Copy)]
pub struct JsonElement<'a> {
    object: &'a JsonMap<String, JsonValue>,
}

impl<'a> JsonElement<'a> {
    pub fn new(value: &'a JsonValue) -> miette::Result<Self> {
        let object = json_expected(value.as_object(), value, "object")?;
        Ok(Self { object })
    }

    pub fn from_map(object: &'a JsonMap<String, JsonValue>) -> Self {
        Self { object }
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a str> {
        self.object.keys().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&'a JsonValue> {
        self.object.get(key)
    }

    fn typed<T>(
        &self,
        key: &str,
        expected: &'static str,
        cast: impl FnOnce(&'a JsonValue) -> Option<T>,
    ) -> miette::Result<Option<T>> {
        let Some(value) = self.object.get(key) else {
            return Ok(None);
        };
        match cast(value) {
            Some(v) => Ok(Some(v)),
            None => Err(wrong_type(key, expected, value).into()),
        }
    }

    pub fn get_string(&self, key: &str) -> miette::Result<Option<&'a str>> {
        self.typed(key, "string", JsonValue::as_str)
    }

    pub fn get_bool(&self, key: &str) -> miette::Result<Option<bool>> {
        self.typed(key, "boolean", JsonValue::as_bool)
    }

    pub fn get_f64(&self, key: &str) -> miette::Result<Option<f64>> {
        self.typed(key, "number", JsonValue::as_f64)
    }

    pub fn get_u64(&self, key: &str) -> miette::Result<Option<u64>> {
        self.typed(key, "non-negative integer", JsonValue::as_u64)
    }

    pub fn get_array(&self, key: &str) -> miette::Result<Option<&'a [JsonValue]>> {
        self.typed(key, "array", |v| v.as_array().map(Vec::as_slice))
    }

    pub fn get_object(&self, key: &str) -> miette::Result<Option<JsonElement<'a>>> {
        self.typed(key, "object", |v| v.as_object().map(JsonElement::from_map))
    }

    /// Reads an array of numbers that must have exactly `N` elements
    pub fn get_vector<const N: usize>(&self, key: &str) -> miette::Result<Option<[f64; N]>> {
        let Some(items) = self.get_array(key)? else {
            return Ok(None);
        };
        if items.len() != N {
            return Err(JsonFieldError::WrongLength {
                key: key.to_string(),
                expected: N,
                actual: items.len(),
            }
            .into());
        }
        let mut out = [0.0; N];
        for (slot, item) in out.iter_mut().zip(items) {
            *slot = item
                .as_f64()
                .ok_or_else(|| wrong_type(key, "array of numbers", item))?;
        }
        Ok(Some(out))
    }

    /// Reads an array whose items are all objects
    pub fn get_object_array(&self, key: &str) -> miette::Result<Option<Vec<JsonElement<'a>>>> {
        let Some(items) = self.get_array(key)? else {
            return Ok(None);
        };
        items
            .iter()
            .map(|item| {
                item.as_object()
                    .map(JsonElement::from_map)
                    .ok_or_else(|| wrong_type(key, "array of objects", item).into())
            })
            .collect::<miette::Result<Vec<_>>>()
            .map(Some)
    }

    /// Reads a string and parses it into one of the variants of `T`
    pub fn get_enum<T: FromStr + VariantNames>(&self, key: &str) -> miette::Result<Option<T>> {
        let Some(raw) = self.get_string(key)? else {
            return Ok(None);
        };
        T::from_str(raw).map(Some).map_err(|_| {
            JsonFieldError::UnknownVariant {
                key: key.to_string(),
                value: raw.to_string(),
                expected: T::VARIANTS.iter().map(|v| format!("`{v}`")).join(", "),
            }
            .into()
        })
    }
}

fn wrong_type(key: &str, expected: &'static str, value: &JsonValue) -> JsonFieldError {
    JsonFieldError::WrongType {
        key: Some(key.to_string()),
        expected,
        actual: json_kind(value),
    }
}
