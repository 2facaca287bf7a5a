use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use handle_errors::Error;

use crate::types::params::{ParamValue, Params};

#[derive(Serialize, Debug, Deserialize, Clone, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, Copy, Eq, Hash, Deserialize, PartialEq, PartialOrd, Ord)]
pub struct QuestionId(pub i32);

impl std::fmt::Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A question that passed validation and has not been stored yet.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct NewQuestion {
    pub title: String,
    pub body: String,
}

/// The fields a client may set through mass assignment.
///
/// `None` means the key was absent from the request, so an update leaves
/// the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionAttributes {
    pub title: Option<String>,
    pub body: Option<String>,
}

pub const PERMITTED_ATTRIBUTES: &[&str] = &["title", "body"];

impl QuestionAttributes {
    /// Mass-assigns from request parameters.
    ///
    /// Only parameters that went through [`Params::permit`] are accepted;
    /// anything else is [`Error::ForbiddenAttributes`].
    pub fn from_params(params: &Params) -> Result<Self, Error> {
        if !params.is_permitted() {
            return Err(Error::ForbiddenAttributes);
        }

        let mut attributes = QuestionAttributes::default();
        for (key, value) in params.iter() {
            let value = match value {
                ParamValue::Scalar(value) => value.clone(),
                ParamValue::Nested(_) => return Err(Error::UnknownAttribute(key.to_string())),
            };
            match key {
                "title" => attributes.title = Some(value),
                "body" => attributes.body = Some(value),
                other => return Err(Error::UnknownAttribute(other.to_string())),
            }
        }
        Ok(attributes)
    }

    /// Turns the attributes into a storable question, or the list of
    /// presence errors that prevented it.
    pub fn into_new_question(self) -> Result<NewQuestion, Vec<String>> {
        let title = self.title.unwrap_or_default();
        let body = self.body.unwrap_or_default();
        let errors = presence_errors(&title, &body);
        if errors.is_empty() {
            Ok(NewQuestion { title, body })
        } else {
            Err(errors)
        }
    }
}

impl Question {
    /// Overwrites the fields present in `attributes` and reports whether the
    /// result is still valid. The caller persists it only on `Ok`.
    pub fn assign(&mut self, attributes: QuestionAttributes) -> Result<(), Vec<String>> {
        if let Some(title) = attributes.title {
            self.title = title;
        }
        if let Some(body) = attributes.body {
            self.body = body;
        }
        let errors = presence_errors(&self.title, &self.body);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

fn presence_errors(title: &str, body: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if title.trim().is_empty() {
        errors.push("Title can't be blank".to_string());
    }
    if body.trim().is_empty() {
        errors.push("Body can't be blank".to_string());
    }
    errors
}
