use chrono::prelude::*;
use rand::Rng;
use warp::Filter;

use handle_errors::Error;

use crate::config::Config;
use crate::routes::params;
use crate::types::params::Params;

pub const TOKEN_FIELD: &str = "authenticity_token";
pub const TOKEN_HEADER: &str = "x-csrf-token";

const TOKEN_PURPOSE: &str = "authenticity";

/// Issues and checks the authenticity tokens that forms carry back on
/// POST, PATCH, PUT and DELETE. When disabled, forms carry no token and
/// every request passes.
#[derive(Clone)]
pub struct ForgeryProtection {
    enabled: bool,
    key: Vec<u8>,
    ttl: chrono::Duration,
}

impl std::fmt::Debug for ForgeryProtection {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ForgeryProtection")
            .field("enabled", &self.enabled)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl ForgeryProtection {
    /// `key` must be 32 bytes for PASETO v2 local tokens.
    pub fn new(enabled: bool, key: Vec<u8>, ttl_hours: i64) -> Self {
        ForgeryProtection {
            enabled,
            key,
            ttl: chrono::Duration::hours(ttl_hours),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let key = match &config.forgery_key {
            Some(key) => key.as_bytes().to_vec(),
            None => {
                if config.forgery_protection {
                    tracing::warn!(
                        "no forgery_key configured, tokens will not survive a restart"
                    );
                }
                random_key()
            }
        };
        ForgeryProtection::new(config.forgery_protection, key, config.token_ttl_hours)
    }

    pub fn disabled() -> Self {
        ForgeryProtection::new(false, random_key(), 24)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// A fresh token to embed in a form, or `None` when protection is off.
    pub fn issue_token(&self) -> Result<Option<String>, Error> {
        if !self.enabled {
            return Ok(None);
        }

        let current_date_time = Utc::now();
        let dt = current_date_time + self.ttl;

        paseto::tokens::PasetoBuilder::new()
            .set_encryption_key(&self.key)
            .set_expiration(&dt)
            .set_not_before(&current_date_time)
            .set_claim("purpose", serde_json::json!(TOKEN_PURPOSE))
            .build()
            .map(Some)
            .map_err(|e| {
                tracing::event!(tracing::Level::ERROR, "{:?}", e);
                Error::CannotIssueToken
            })
    }

    pub fn verify(&self, token: Option<&str>) -> Result<(), Error> {
        if !self.enabled {
            return Ok(());
        }

        let token = token.ok_or(Error::InvalidAuthenticityToken)?;
        let claims = paseto::tokens::validate_local_token(
            token,
            None,
            &self.key,
            &paseto::tokens::TimeBackend::Chrono,
        )
        .map_err(|_| Error::InvalidAuthenticityToken)?;

        match claims.get("purpose").and_then(|purpose| purpose.as_str()) {
            Some(TOKEN_PURPOSE) => Ok(()),
            _ => Err(Error::InvalidAuthenticityToken),
        }
    }
}

fn random_key() -> Vec<u8> {
    rand::thread_rng().r#gen::<[u8; 32]>().to_vec()
}

/// The token a script sends in the `X-CSRF-Token` header instead of the form field.
pub fn token_header() -> impl Filter<Extract = (Option<String>,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(TOKEN_HEADER)
}

/// Request parameters that only come through once the request proved it
/// was sent from one of our forms (or protection is off).
pub fn protect(
    protection: ForgeryProtection,
    body_limit: u64,
) -> impl Filter<Extract = (Params,), Error = warp::Rejection> + Clone {
    token_header()
        .and(params(body_limit))
        .and_then(move |header: Option<String>, params: Params| {
            let protection = protection.clone();
            async move {
                let token = header.as_deref().or(params.scalar(TOKEN_FIELD));
                protection.verify(token).map_err(warp::reject::custom)?;
                Ok::<_, warp::Rejection>(params)
            }
        })
}
