//! Serde helpers for activity configuration.

/// Accepts a list or map either as a JSON structure or as a string holding
/// (possibly escaped) JSON, which is what variable interpolation produces.
///
/// ```ignore
/// #[serde(deserialize_with = "flowcore::serde_ext::escaped_json::deserialize")]
/// variables: HashMap<String, Value>,
/// ```
pub mod escaped_json {
    use serde::de::{DeserializeOwned, Error};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(text) => parse(&text).map_err(D::Error::custom),
            other => serde_json::from_value(other).map_err(D::Error::custom),
        }
    }

    fn parse<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
        serde_json::from_str(text).or_else(|first| {
            let unescaped = text.replace("\\\"", "\"");
            if unescaped == text {
                Err(first)
            } else {
                serde_json::from_str(&unescaped)
            }
        })
    }
}
