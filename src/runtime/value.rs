//! Conversion between JSON values and interpreter values

use rquickjs::{Ctx, Type, Value};
use serde_json::{Map, Number, Value as Json};

use super::error::ConversionError;

/// Deepest nesting converted before giving up (cyclic structures hit this)
pub const MAX_DEPTH: usize = 64;

/// Build an interpreter value from JSON.
///
/// Goes through the engine's JSON parser so every key, `__proto__`
/// included, becomes an own data property.
pub fn json_to_js<'js>(ctx: &Ctx<'js>, value: &Json) -> rquickjs::Result<Value<'js>> {
    ctx.json_parse(value.to_string())
}

/// Read an interpreter value as JSON. `undefined` becomes null.
pub fn js_to_json(value: &Value<'_>) -> Result<Json, ConversionError> {
    convert(value, 0)
}

fn convert(value: &Value<'_>, depth: usize) -> Result<Json, ConversionError> {
    if depth > MAX_DEPTH {
        return Err(ConversionError::TooDeep(MAX_DEPTH));
    }

    match value.type_of() {
        Type::Uninitialized | Type::Undefined | Type::Null => Ok(Json::Null),
        Type::Bool => Ok(Json::Bool(value.as_bool().unwrap_or_default())),
        Type::Int => Ok(Json::from(value.as_int().unwrap_or_default())),
        Type::Float => {
            let f = value.as_float().unwrap_or_default();
            if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
                Ok(Json::from(f as i64))
            } else {
                Ok(Number::from_f64(f).map(Json::Number).unwrap_or(Json::Null))
            }
        }
        Type::String => {
            let text = value
                .as_string()
                .ok_or_else(|| ConversionError::Unsupported("string".into()))?
                .to_string()?;
            Ok(Json::String(text))
        }
        Type::Array => {
            let array = value
                .as_array()
                .ok_or_else(|| ConversionError::Unsupported("array".into()))?;
            let mut items = Vec::with_capacity(array.len());
            for item in array.iter::<Value<'_>>() {
                items.push(convert(&item?, depth + 1)?);
            }
            Ok(Json::Array(items))
        }
        Type::Object | Type::Exception => {
            let object = value
                .as_object()
                .ok_or_else(|| ConversionError::Unsupported("object".into()))?;
            let mut map = Map::new();
            for prop in object.props::<String, Value<'_>>() {
                let (key, item) = prop?;
                if item.is_function() || item.is_undefined() {
                    continue;
                }
                map.insert(key, convert(&item, depth + 1)?);
            }
            Ok(Json::Object(map))
        }
        other => Err(ConversionError::Unsupported(format!("{other:?}").to_lowercase())),
    }
}

/// Printable form used by `log`: strings verbatim, everything else as JSON.
pub fn printable(value: &Value<'_>) -> String {
    if let Some(text) = value.as_string() {
        return text.to_string().unwrap_or_default();
    }
    if value.is_undefined() {
        return "undefined".to_string();
    }
    match js_to_json(value) {
        Ok(json) => json.to_string(),
        Err(_) => format!("[{}]", format!("{:?}", value.type_of()).to_lowercase()),
    }
}

/// Join printable forms, separating adjacent operands with a space when
/// neither is a string.
pub fn concat_printable(values: &[Value<'_>]) -> String {
    let mut line = String::new();
    let mut prev_is_string = true;
    for (i, value) in values.iter().enumerate() {
        let is_string = value.is_string();
        if i > 0 && !is_string && !prev_is_string {
            line.push(' ');
        }
        line.push_str(&printable(value));
        prev_is_string = is_string;
    }
    line
}
