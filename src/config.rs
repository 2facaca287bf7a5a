use std::env;
use std::net::{IpAddr, Ipv4Addr};

use clap::Parser;
use serde::Deserialize;

use handle_errors::Error;

use crate::types::params::UnpermittedAction;

/// Q&A web service
#[derive(Parser, Debug, Default, PartialEq)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Which errors we want to log (info, warn or error)
    #[clap(short, long)]
    pub log_level: Option<String>,
    /// Address the web server binds to
    #[clap(long)]
    pub host: Option<IpAddr>,
    /// Port the web server listens on
    #[clap(short, long)]
    pub port: Option<u16>,
    /// PostgreSQL connection string; questions stay in memory without one
    #[clap(long)]
    pub database_url: Option<String>,
    /// Accept state-changing requests without an authenticity token
    #[clap(long)]
    pub disable_forgery_protection: bool,
    /// Log or reject parameters that are not on the allow-list
    #[clap(long, arg_enum)]
    pub unpermitted_parameters: Option<UnpermittedAction>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub host: IpAddr,
    pub port: u16,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub forgery_protection: bool,
    pub forgery_key: Option<String>,
    pub token_ttl_hours: i64,
    pub unpermitted_parameters: UnpermittedAction,
    pub body_limit: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "info".to_string(),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3030,
            database_url: None,
            max_connections: 5,
            forgery_protection: true,
            forgery_key: None,
            token_ttl_hours: 24,
            unpermitted_parameters: UnpermittedAction::Log,
            body_limit: 1024 * 16,
        }
    }
}

impl Config {
    /// Defaults, then `setup.toml`, then `.env` and `QUESTIONS_*` variables,
    /// then command line flags.
    pub fn new() -> Result<Config, Error> {
        dotenv::dotenv().ok();

        let mut config = Config::from_sources("setup")?;
        config.apply_args(Args::parse());
        config.validate()?;

        Ok(config)
    }

    pub fn from_sources(file_name: &str) -> Result<Config, Error> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(file_name).required(false))
            .add_source(config::Environment::with_prefix("QUESTIONS"))
            .build()
            .map_err(Error::ConfigurationError)?;

        let mut config = settings
            .try_deserialize::<Config>()
            .map_err(Error::ConfigurationError)?;

        if config.database_url.is_none() {
            config.database_url = env::var("DATABASE_URL").ok();
        }

        Ok(config)
    }

    pub fn apply_args(&mut self, args: Args) {
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(host) = args.host {
            self.host = host;
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(database_url) = args.database_url {
            self.database_url = Some(database_url);
        }
        if args.disable_forgery_protection {
            self.forgery_protection = false;
        }
        if let Some(action) = args.unpermitted_parameters {
            self.unpermitted_parameters = action;
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if let Some(key) = &self.forgery_key {
            if key.len() != 32 {
                return Err(invalid(format!(
                    "forgery_key must be exactly 32 bytes, got {}",
                    key.len()
                )));
            }
        }
        if self.token_ttl_hours <= 0 {
            return Err(invalid("token_ttl_hours must be positive".to_string()));
        }
        Ok(())
    }

    /// Used when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> String {
        format!(
            "questions={level},handle_errors={level},warp=error",
            level = self.log_level
        )
    }
}

fn invalid(message: String) -> Error {
    Error::ConfigurationError(config::ConfigError::Message(message))
}
