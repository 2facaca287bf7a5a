use warp::Filter;

use crate::types::params::Params;

pub mod forgery;
pub mod question;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// How a response is rendered, picked from the `Accept` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Html,
    Json,
}

impl Format {
    pub fn from_accept(accept: Option<&str>) -> Self {
        match accept {
            Some(accept) if accept.contains("application/json") => Format::Json,
            _ => Format::Html,
        }
    }
}

pub fn format() -> impl Filter<Extract = (Format,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("accept")
        .map(|accept: Option<String>| Format::from_accept(accept.as_deref()))
}

/// Request parameters from a form body, a JSON body, or no body at all.
pub fn params(limit: u64) -> impl Filter<Extract = (Params,), Error = warp::Rejection> + Clone {
    let form = content_type(FORM_CONTENT_TYPE)
        .and(warp::body::content_length_limit(limit))
        .and(warp::body::form())
        .and_then(|pairs: Vec<(String, String)>| async move {
            Params::from_pairs(pairs).map_err(warp::reject::custom)
        });

    let json = warp::body::content_length_limit(limit)
        .and(warp::body::json())
        .and_then(|value: serde_json::Value| async move {
            Params::from_json(value).map_err(warp::reject::custom)
        });

    let empty = warp::header::optional::<String>("content-type").and_then(
        |content_type: Option<String>| async move {
            match content_type {
                None => Ok(Params::default()),
                Some(_) => Err(warp::reject::not_found()),
            }
        },
    );

    form.or(json).unify().or(empty).unify()
}

fn content_type(expected: &'static str) -> impl Filter<Extract = (), Error = warp::Rejection> + Clone {
    warp::header::<String>("content-type")
        .and_then(move |value: String| async move {
            let essence = value.split(';').next().unwrap_or_default().trim();
            if essence.eq_ignore_ascii_case(expected) {
                Ok(())
            } else {
                Err(warp::reject::not_found())
            }
        })
        .untuple_one()
}
