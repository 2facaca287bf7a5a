use warp::{
    Rejection, Reply,
    filters::{body::BodyDeserializeError, cors::CorsForbidden},
    http::StatusCode,
    reject::{LengthRequired, MethodNotAllowed, PayloadTooLarge, Reject, UnsupportedMediaType},
};

use tracing::{Level, event, instrument};

#[derive(Debug)]
pub enum Error {
    ParseError(std::num::ParseIntError),
    ParameterMissing(String),
    UnpermittedParameters(Vec<String>),
    ForbiddenAttributes,
    UnknownAttribute(String),
    MalformedParameters(String),
    RecordNotFound(i32),
    Validation(Vec<String>),
    InvalidAuthenticityToken,
    CannotIssueToken,
    DatabaseQueryError(sqlx::Error),
    MigrationError(sqlx::migrate::MigrateError),
    ConfigurationError(config::ConfigError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::ParseError(err) => {
                write!(f, "Cannot parse parameter: {}", err)
            }
            Error::ParameterMissing(key) => {
                write!(f, "param is missing or the value is empty: {}", key)
            }
            Error::UnpermittedParameters(keys) => {
                write!(f, "found unpermitted parameters: {}", keys.join(", "))
            }
            Error::ForbiddenAttributes => {
                write!(f, "Cannot mass-assign attributes that were not permitted")
            }
            Error::UnknownAttribute(name) => {
                write!(f, "unknown attribute '{}' for Question", name)
            }
            Error::MalformedParameters(reason) => {
                write!(f, "Malformed parameters: {}", reason)
            }
            Error::RecordNotFound(id) => {
                write!(f, "Couldn't find Question with 'id'={}", id)
            }
            Error::Validation(messages) => {
                write!(f, "{}", messages.join(", "))
            }
            Error::InvalidAuthenticityToken => {
                write!(f, "Can't verify the authenticity token")
            }
            Error::CannotIssueToken => {
                write!(f, "Cannot issue authenticity token")
            }
            Error::DatabaseQueryError(_) => {
                write!(f, "Cannot update, invalid data.")
            }
            Error::MigrationError(err) => {
                write!(f, "Cannot run migration: {}", err)
            }
            Error::ConfigurationError(err) => {
                write!(f, "Invalid configuration: {}", err)
            }
        }
    }
}

impl Reject for Error {}

#[instrument]
pub async fn return_error(r: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(crate::Error::DatabaseQueryError(e)) = r.find() {
        event!(Level::ERROR, "Database query error");
        match e {
            sqlx::Error::Database(err) => {
                event!(Level::ERROR, db_message = err.message());
                Ok(warp::reply::with_status(
                    "Cannot update data".to_string(),
                    StatusCode::UNPROCESSABLE_ENTITY,
                ))
            }
            _ => Ok(warp::reply::with_status(
                "Internal Server Error".to_string(),
                StatusCode::INTERNAL_SERVER_ERROR,
            )),
        }
    } else if let Some(error @ crate::Error::RecordNotFound(_)) = r.find() {
        event!(Level::WARN, "{}", error);
        Ok(warp::reply::with_status(
            error.to_string(),
            StatusCode::NOT_FOUND,
        ))
    } else if let Some(error @ crate::Error::Validation(_)) = r.find() {
        event!(Level::INFO, "Validation failed: {}", error);
        Ok(warp::reply::with_status(
            error.to_string(),
            StatusCode::UNPROCESSABLE_ENTITY,
        ))
    } else if let Some(crate::Error::InvalidAuthenticityToken) = r.find() {
        event!(Level::WARN, "Request carried no valid authenticity token");
        Ok(warp::reply::with_status(
            crate::Error::InvalidAuthenticityToken.to_string(),
            StatusCode::UNPROCESSABLE_ENTITY,
        ))
    } else if let Some(
        error @ (crate::Error::CannotIssueToken
        | crate::Error::MigrationError(_)
        | crate::Error::ConfigurationError(_)),
    ) = r.find()
    {
        event!(Level::ERROR, "{}", error);
        Ok(warp::reply::with_status(
            "Internal Server Error".to_string(),
            StatusCode::INTERNAL_SERVER_ERROR,
        ))
    } else if let Some(error) = r.find::<CorsForbidden>() {
        event!(Level::ERROR, "CORS forbidden error: {}", error);
        Ok(warp::reply::with_status(
            error.to_string(),
            StatusCode::FORBIDDEN,
        ))
    } else if let Some(error) = r.find::<BodyDeserializeError>() {
        event!(Level::ERROR, "Cannot deserialize request body: {}", error);
        Ok(warp::reply::with_status(
            error.to_string(),
            StatusCode::UNPROCESSABLE_ENTITY,
        ))
    } else if let Some(error) = r.find::<PayloadTooLarge>() {
        event!(Level::WARN, "{}", error);
        Ok(warp::reply::with_status(
            error.to_string(),
            StatusCode::PAYLOAD_TOO_LARGE,
        ))
    } else if let Some(error) = r.find::<LengthRequired>() {
        event!(Level::WARN, "{}", error);
        Ok(warp::reply::with_status(
            error.to_string(),
            StatusCode::LENGTH_REQUIRED,
        ))
    } else if let Some(error) = r.find::<UnsupportedMediaType>() {
        event!(Level::WARN, "{}", error);
        Ok(warp::reply::with_status(
            error.to_string(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ))
    } else if let Some(error) = r.find::<Error>() {
        // Everything left is a problem with what the client sent.
        event!(Level::ERROR, "{}", error);
        Ok(warp::reply::with_status(
            error.to_string(),
            StatusCode::BAD_REQUEST,
        ))
    } else if let Some(error) = r.find::<MethodNotAllowed>() {
        event!(Level::WARN, "{}", error);
        Ok(warp::reply::with_status(
            error.to_string(),
            StatusCode::METHOD_NOT_ALLOWED,
        ))
    } else {
        event!(Level::WARN, "Requested route was not found");
        Ok(warp::reply::with_status(
            "Route not found".to_string(),
            StatusCode::NOT_FOUND,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn status_of(error: Error) -> StatusCode {
        return_error(warp::reject::custom(error))
            .await
            .unwrap()
            .into_response()
            .status()
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        assert_eq!(status_of(Error::RecordNotFound(7)).await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn parameter_errors_are_bad_requests() {
        assert_eq!(
            status_of(Error::ParameterMissing("question".to_string())).await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(Error::ForbiddenAttributes).await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(Error::UnpermittedParameters(vec!["admin".to_string()])).await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn forgery_and_validation_are_unprocessable() {
        assert_eq!(
            status_of(Error::InvalidAuthenticityToken).await,
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(Error::Validation(vec!["Title can't be blank".to_string()])).await,
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn non_database_sqlx_errors_are_internal() {
        assert_eq!(
            status_of(Error::DatabaseQueryError(sqlx::Error::RowNotFound)).await,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn unmatched_rejection_is_route_not_found() {
        let reply = return_error(warp::reject::not_found()).await.unwrap();
        assert_eq!(reply.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn messages_name_the_offending_keys() {
        assert_eq!(
            Error::ParameterMissing("question".to_string()).to_string(),
            "param is missing or the value is empty: question"
        );
        assert_eq!(
            Error::RecordNotFound(3).to_string(),
            "Couldn't find Question with 'id'=3"
        );
        assert_eq!(
            Error::UnpermittedParameters(vec!["a".to_string(), "b".to_string()]).to_string(),
            "found unpermitted parameters: a, b"
        );
    }
}
