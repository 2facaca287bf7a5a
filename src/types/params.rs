use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{Level, event};

use handle_errors::Error;

/// What to do with keys that `permit` drops.
#[derive(clap::ArgEnum, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnpermittedAction {
    #[default]
    Log,
    Raise,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Scalar(String),
    Nested(Params),
}

/// Request parameters, nested the way bracketed form keys describe them:
/// `question[title]=x` is stored as `{question: {title: x}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: BTreeMap<String, ParamValue>,
    permitted: bool,
}

impl Params {
    /// Builds parameters from decoded `application/x-www-form-urlencoded` pairs.
    /// A repeated key keeps the last value.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, Error> {
        let mut params = Params::default();
        for (key, value) in pairs {
            let path = parse_key(&key)?;
            params.insert(&key, &path, value)?;
        }
        Ok(params)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, Error> {
        match value {
            serde_json::Value::Object(map) => Self::from_json_object(map),
            _ => Err(Error::MalformedParameters(
                "expected a JSON object".to_string(),
            )),
        }
    }

    fn from_json_object(map: serde_json::Map<String, serde_json::Value>) -> Result<Self, Error> {
        let mut params = Params::default();
        for (key, value) in map {
            let value = match value {
                serde_json::Value::Null => ParamValue::Scalar(String::new()),
                serde_json::Value::Bool(b) => ParamValue::Scalar(b.to_string()),
                serde_json::Value::Number(n) => ParamValue::Scalar(n.to_string()),
                serde_json::Value::String(s) => ParamValue::Scalar(s),
                serde_json::Value::Object(inner) => {
                    ParamValue::Nested(Self::from_json_object(inner)?)
                }
                serde_json::Value::Array(_) => {
                    return Err(Error::MalformedParameters(format!(
                        "array values are not supported ({})",
                        key
                    )));
                }
            };
            params.entries.insert(key, value);
        }
        Ok(params)
    }

    fn insert(&mut self, raw_key: &str, path: &[&str], value: String) -> Result<(), Error> {
        match path {
            [] => Ok(()),
            [last] => {
                if let Some(ParamValue::Nested(_)) = self.entries.get(*last) {
                    return Err(conflict(raw_key));
                }
                self.entries
                    .insert(last.to_string(), ParamValue::Scalar(value));
                Ok(())
            }
            [head, rest @ ..] => {
                let entry = self
                    .entries
                    .entry(head.to_string())
                    .or_insert_with(|| ParamValue::Nested(Params::default()));
                match entry {
                    ParamValue::Nested(inner) => inner.insert(raw_key, rest, value),
                    ParamValue::Scalar(_) => Err(conflict(raw_key)),
                }
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    pub fn scalar(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(ParamValue::Scalar(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_permitted(&self) -> bool {
        self.permitted
    }

    /// Returns the nested parameters under `key`, failing with
    /// [`Error::ParameterMissing`] when the key is absent, empty, or a
    /// plain value instead of a group.
    pub fn require(&self, key: &str) -> Result<&Params, Error> {
        match self.entries.get(key) {
            Some(ParamValue::Nested(inner)) if !inner.is_empty() => Ok(inner),
            _ => Err(Error::ParameterMissing(key.to_string())),
        }
    }

    /// Copies the scalar values whose keys are in `allowed` into a new,
    /// permitted set. Everything else is dropped, and either logged or
    /// reported as [`Error::UnpermittedParameters`].
    pub fn permit(&self, allowed: &[&str], action: UnpermittedAction) -> Result<Params, Error> {
        let mut permitted = Params {
            entries: BTreeMap::new(),
            permitted: true,
        };
        let mut unpermitted = Vec::new();

        for (key, value) in &self.entries {
            match value {
                ParamValue::Scalar(_) if allowed.contains(&key.as_str()) => {
                    permitted.entries.insert(key.clone(), value.clone());
                }
                _ => unpermitted.push(key.clone()),
            }
        }

        if !unpermitted.is_empty() {
            match action {
                UnpermittedAction::Log => {
                    event!(Level::INFO, unpermitted = ?unpermitted, "Unpermitted parameters");
                }
                UnpermittedAction::Raise => return Err(Error::UnpermittedParameters(unpermitted)),
            }
        }

        Ok(permitted)
    }
}

fn conflict(key: &str) -> Error {
    Error::MalformedParameters(format!("conflicting value for key {}", key))
}

/// Splits `question[title]` into `["question", "title"]`.
fn parse_key(key: &str) -> Result<Vec<&str>, Error> {
    let malformed = || Error::MalformedParameters(format!("invalid key {}", key));

    let (head, mut rest) = match key.find('[') {
        Some(index) => (&key[..index], &key[index..]),
        None => (key, ""),
    };
    if head.is_empty() || head.contains(']') {
        return Err(malformed());
    }

    let mut path = vec![head];
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[').ok_or_else(malformed)?;
        let close = inner.find(']').ok_or_else(malformed)?;
        let segment = &inner[..close];
        // `a[]` would be an array, which the resource never takes.
        if segment.is_empty() || segment.contains('[') {
            return Err(malformed());
        }
        path.push(segment);
        rest = &inner[close + 1..];
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn bracketed_keys_nest() {
        let params = Params::from_pairs(pairs(&[
            ("authenticity_token", "abc"),
            ("question[title]", "Hi"),
            ("question[body]", "There"),
        ]))
        .unwrap();

        assert_eq!(params.scalar("authenticity_token"), Some("abc"));
        let question = params.require("question").unwrap();
        assert_eq!(question.scalar("title"), Some("Hi"));
        assert_eq!(question.scalar("body"), Some("There"));
    }

    #[test]
    fn last_repeated_key_wins() {
        let params = Params::from_pairs(pairs(&[("q[title]", "one"), ("q[title]", "two")])).unwrap();
        assert_eq!(params.require("q").unwrap().scalar("title"), Some("two"));
    }

    #[test]
    fn rejects_malformed_keys() {
        for key in ["question[title", "question[]", "[title]", "question]x", "a[b]c"] {
            let result = Params::from_pairs(pairs(&[(key, "x")]));
            assert!(
                matches!(result, Err(Error::MalformedParameters(_))),
                "{} should be rejected",
                key
            );
        }
    }

    #[test]
    fn rejects_scalar_and_group_under_one_key() {
        let result = Params::from_pairs(pairs(&[("question", "x"), ("question[title]", "y")]));
        assert!(matches!(result, Err(Error::MalformedParameters(_))));

        let result = Params::from_pairs(pairs(&[("question[title]", "y"), ("question", "x")]));
        assert!(matches!(result, Err(Error::MalformedParameters(_))));
    }

    #[test]
    fn require_fails_for_absent_empty_or_scalar() {
        let params = Params::from_pairs(pairs(&[("question", "x")])).unwrap();
        assert!(matches!(
            params.require("question"),
            Err(Error::ParameterMissing(key)) if key == "question"
        ));
        assert!(matches!(
            Params::default().require("question"),
            Err(Error::ParameterMissing(_))
        ));
        let empty = Params::from_json(serde_json::json!({ "question": {} })).unwrap();
        assert!(matches!(empty.require("question"), Err(Error::ParameterMissing(_))));
    }

    #[test]
    fn permit_drops_unlisted_keys_when_logging() {
        let params = Params::from_pairs(pairs(&[
            ("question[title]", "Hi"),
            ("question[id]", "99"),
            ("question[meta][x]", "1"),
        ]))
        .unwrap();
        let permitted = params
            .require("question")
            .unwrap()
            .permit(&["title", "body"], UnpermittedAction::Log)
            .unwrap();

        assert!(permitted.is_permitted());
        assert_eq!(permitted.scalar("title"), Some("Hi"));
        assert!(permitted.get("id").is_none());
        assert!(permitted.get("meta").is_none());
    }

    #[test]
    fn permit_raises_when_configured() {
        let params = Params::from_pairs(pairs(&[("question[title]", "Hi"), ("question[id]", "99")])).unwrap();
        let result = params
            .require("question")
            .unwrap()
            .permit(&["title", "body"], UnpermittedAction::Raise);
        assert!(matches!(
            result,
            Err(Error::UnpermittedParameters(keys)) if keys == vec!["id".to_string()]
        ));
    }

    #[test]
    fn json_bodies_nest_and_stringify() {
        let params = Params::from_json(serde_json::json!({
            "question": { "title": "Hi", "body": 42, "draft": null }
        }))
        .unwrap();
        let question = params.require("question").unwrap();
        assert_eq!(question.scalar("body"), Some("42"));
        assert_eq!(question.scalar("draft"), Some(""));
    }

    #[test]
    fn json_arrays_and_non_objects_are_rejected() {
        assert!(matches!(
            Params::from_json(serde_json::json!({ "question": { "tags": ["a"] } })),
            Err(Error::MalformedParameters(_))
        ));
        assert!(matches!(
            Params::from_json(serde_json::json!(["a"])),
            Err(Error::MalformedParameters(_))
        ));
    }
}
