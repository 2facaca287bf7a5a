#![warn(clippy::all)]

use handle_errors::return_error;
use warp::{Filter, http::Method};

pub mod config;
pub mod routes;
pub mod store;
pub mod types;
pub mod views;

use crate::config::Config;
use crate::routes::forgery::{self, ForgeryProtection};
use crate::store::Store;

/// Every route of the service, with CORS, request tracing and error
/// recovery applied.
///
/// Each route matches its path before its method, so an unknown path is a
/// 404 and a known path with the wrong verb is a 405.
pub fn build_routes(
    store: Store,
    forgery: ForgeryProtection,
    config: Config,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    // Every route gets its own handle on the store, the forgery keys and the param policy.
    let store_filter = warp::any().map(move || store.clone());
    let protected = forgery::protect(forgery.clone(), config.body_limit);
    let forgery_filter = warp::any().map(move || forgery.clone());
    let unpermitted = config.unpermitted_parameters;
    let unpermitted_filter = warp::any().map(move || unpermitted);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["Content-Type", "X-CSRF-Token"])
        .allow_methods(&[
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::POST,
            Method::GET,
        ]);

    let get_questions = warp::path("questions")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query())
        .and(routes::format())
        .and(store_filter.clone())
        .and_then(routes::question::get_questions)
        .with(warp::trace(|info| {
            tracing::info_span!(
                "get_questions request",
                method = %info.method(),
                path = %info.path(),
                id = %uuid::Uuid::new_v4(),
            )
        }));

    // Registered ahead of get_question so /questions/new is never read as an id.
    let new_question = warp::path("questions")
        .and(warp::path("new"))
        .and(warp::path::end())
        .and(warp::get())
        .and(forgery_filter.clone())
        .and_then(routes::question::new_question);

    // `:id` only matches an i32, so `/questions/abc` falls through to 404.
    let get_question = warp::path("questions")
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(warp::get())
        .and(routes::format())
        .and(store_filter.clone())
        .and(forgery_filter.clone())
        .and_then(routes::question::get_question);

    let edit_question = warp::path("questions")
        .and(warp::path::param::<i32>())
        .and(warp::path("edit"))
        .and(warp::path::end())
        .and(warp::get())
        .and(store_filter.clone())
        .and(forgery_filter)
        .and_then(routes::question::edit_question);

    let add_question = warp::path("questions")
        .and(warp::path::end())
        .and(warp::post())
        .and(routes::format())
        .and(store_filter.clone())
        .and(unpermitted_filter.clone())
        .and(protected.clone())
        .and_then(routes::question::add_question);

    let update_question = warp::path("questions")
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(warp::patch().or(warp::put()).unify()) // both verbs update
        .and(routes::format())
        .and(store_filter.clone())
        .and(unpermitted_filter.clone())
        .and(protected.clone())
        .and_then(routes::question::update_question);

    let delete_question = warp::path("questions")
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(warp::delete())
        .and(routes::format())
        .and(store_filter.clone())
        .and(protected.clone())
        .and_then(routes::question::delete_question);

    // Forms can only POST; `_method` picks update or destroy.
    let override_method = warp::path("questions")
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(warp::post())
        .and(routes::format())
        .and(store_filter)
        .and(unpermitted_filter)
        .and(protected)
        .and_then(routes::question::override_method);

    get_questions
        .or(new_question)
        .or(get_question)
        .or(edit_question)
        .or(add_question)
        .or(update_question)
        .or(delete_question)
        .or(override_method)
        .with(cors)
        .with(warp::trace::request()) // one span per request
        .recover(return_error)
}
