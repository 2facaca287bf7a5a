use std::collections::HashMap;
use tracing::{Level, event, info, instrument};
use warp::Reply;
use warp::http::StatusCode;
use warp::reply::Response;

use handle_errors::Error;

use crate::routes::Format;
use crate::routes::forgery::{ForgeryProtection, TOKEN_FIELD};
use crate::store::Store;
use crate::types::pagination::{Pagination, extract_pagination};
use crate::types::params::{Params, UnpermittedAction};
use crate::types::question::{PERMITTED_ATTRIBUTES, QuestionAttributes, QuestionId};
use crate::views::{self, QuestionForm};

#[instrument(skip(store))]
pub async fn get_questions(
    params: HashMap<String, String>,
    format: Format,
    store: Store,
) -> Result<impl warp::Reply, warp::Rejection> {
    event!(target: "questions", Level::INFO, "querying questions");
    let mut pagination = Pagination::default();

    // No query string means the whole table.
    if !params.is_empty() {
        event!(Level::INFO, pagination = true);
        pagination = extract_pagination(params).map_err(warp::reject::custom)?;
    }

    match store
        .get_questions(pagination.limit, pagination.offset)
        .await
    {
        Ok(questions) => Ok(match format {
            Format::Json => warp::reply::json(&questions).into_response(),
            Format::Html => html(views::index(&questions), StatusCode::OK),
        }),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

#[instrument(skip(forgery))]
pub async fn new_question(forgery: ForgeryProtection) -> Result<impl warp::Reply, warp::Rejection> {
    let token = forgery.issue_token().map_err(warp::reject::custom)?;
    Ok(html(
        views::new_question(QuestionForm::default(), &[], token.as_deref()),
        StatusCode::OK,
    ))
}

#[instrument(skip(store, forgery))]
pub async fn get_question(
    id: i32,
    format: Format,
    store: Store,
    forgery: ForgeryProtection,
) -> Result<impl warp::Reply, warp::Rejection> {
    let question = store
        .get_question(QuestionId(id))
        .await
        .map_err(warp::reject::custom)?;

    match format {
        Format::Json => Ok(warp::reply::json(&question).into_response()),
        Format::Html => {
            let token = forgery.issue_token().map_err(warp::reject::custom)?;
            Ok(html(
                views::show(&question, token.as_deref()),
                StatusCode::OK,
            ))
        }
    }
}

#[instrument(skip(store, forgery))]
pub async fn edit_question(
    id: i32,
    store: Store,
    forgery: ForgeryProtection,
) -> Result<impl warp::Reply, warp::Rejection> {
    let question = store
        .get_question(QuestionId(id))
        .await
        .map_err(warp::reject::custom)?;
    let token = forgery.issue_token().map_err(warp::reject::custom)?;

    Ok(html(
        views::edit_question(
            question.id,
            QuestionForm::from(&question),
            &[],
            token.as_deref(),
        ),
        StatusCode::OK,
    ))
}

#[instrument(skip(store))]
pub async fn add_question(
    format: Format,
    store: Store,
    unpermitted: UnpermittedAction,
    params: Params,
) -> Result<impl warp::Reply, warp::Rejection> {
    let attributes = permitted_attributes(&params, unpermitted).map_err(warp::reject::custom)?;

    let new_question = match attributes.clone().into_new_question() {
        Ok(new_question) => new_question,
        Err(errors) => {
            return unprocessable(format, errors, |errors| {
                views::new_question(
                    QuestionForm::from(&attributes),
                    errors,
                    params.scalar(TOKEN_FIELD),
                )
            });
        }
    };

    match store.add_question(new_question).await {
        Ok(question) => {
            info!(id = %question.id, "question created");
            Ok(match format {
                Format::Json => {
                    warp::reply::with_status(warp::reply::json(&question), StatusCode::CREATED)
                        .into_response()
                }
                // 303 so the browser follows up with a GET.
                Format::Html => redirect(format!("/questions/{}", question.id)),
            })
        }
        Err(e) => Err(warp::reject::custom(e)),
    }
}

#[instrument(skip(store))]
pub async fn update_question(
    id: i32,
    format: Format,
    store: Store,
    unpermitted: UnpermittedAction,
    params: Params,
) -> Result<Response, warp::Rejection> {
    // A missing record is a 404 whatever the body carries.
    let mut question = store
        .get_question(QuestionId(id))
        .await
        .map_err(warp::reject::custom)?;
    let attributes = permitted_attributes(&params, unpermitted).map_err(warp::reject::custom)?;

    if let Err(errors) = question.assign(attributes) {
        return unprocessable(format, errors, |errors| {
            views::edit_question(
                question.id,
                QuestionForm::from(&question),
                errors,
                params.scalar(TOKEN_FIELD),
            )
        });
    }

    match store.update_question(question).await {
        Ok(question) => {
            info!(id = %question.id, "question updated");
            Ok(match format {
                Format::Json => warp::reply::json(&question).into_response(),
                Format::Html => redirect(format!("/questions/{}", question.id)),
            })
        }
        Err(e) => Err(warp::reject::custom(e)),
    }
}

#[instrument(skip(store, _params))]
pub async fn delete_question(
    id: i32,
    format: Format,
    store: Store,
    _params: Params,
) -> Result<Response, warp::Rejection> {
    match store.delete_question(QuestionId(id)).await {
        Ok(()) => {
            info!(id, "question deleted");
            Ok(match format {
                Format::Json => {
                    warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT).into_response()
                }
                Format::Html => redirect("/questions".to_string()),
            })
        }
        Err(e) => Err(warp::reject::custom(e)),
    }
}

/// HTML forms can only POST, so edit and delete forms name the real verb
/// in a `_method` field.
#[instrument(skip(store, params))]
pub async fn override_method(
    id: i32,
    format: Format,
    store: Store,
    unpermitted: UnpermittedAction,
    params: Params,
) -> Result<Response, warp::Rejection> {
    let method = params.scalar("_method").map(str::to_ascii_lowercase);
    match method.as_deref() {
        Some("patch") | Some("put") => {
            update_question(id, format, store, unpermitted, params).await
        }
        Some("delete") => delete_question(id, format, store, params).await,
        _ => {
            event!(Level::WARN, ?method, "POST to a question without a usable _method");
            Err(warp::reject::not_found())
        }
    }
}

/// Requires the `question` group, keeps its allow-listed keys, then mass-assigns them.
fn permitted_attributes(
    params: &Params,
    unpermitted: UnpermittedAction,
) -> Result<QuestionAttributes, Error> {
    let permitted = params
        .require("question")?
        .permit(PERMITTED_ATTRIBUTES, unpermitted)?;
    QuestionAttributes::from_params(&permitted)
}

/// Failed validation: HTML clients get the form back with the messages,
/// JSON clients get the messages.
fn unprocessable(
    format: Format,
    errors: Vec<String>,
    render_form: impl FnOnce(&[String]) -> String,
) -> Result<Response, warp::Rejection> {
    match format {
        Format::Html => Ok(html(render_form(&errors), StatusCode::UNPROCESSABLE_ENTITY)),
        Format::Json => Err(warp::reject::custom(Error::Validation(errors))),
    }
}

fn html(body: String, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::html(body), status).into_response()
}

fn redirect(location: String) -> Response {
    warp::reply::with_header(
        warp::reply::with_status(warp::reply(), StatusCode::SEE_OTHER),
        "location",
        location,
    )
    .into_response()
}
