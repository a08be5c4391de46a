//! Development / production switch.
//!
//! The environment is read from `LIVERY_ENV`. Unset, empty or
//! `development` means templates are recompiled from disk for every
//! request; anything recognised as production or test renders from the
//! snapshot compiled at startup.

use std::fmt;
use std::str::FromStr;

/// Environment variable selecting the [`Env`].
pub const ENV_VAR: &str = "LIVERY_ENV";

/// Runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Env {
    /// Recompile templates on every request.
    #[default]
    Development,
    /// Render from templates compiled once at startup.
    Production,
    /// Like production; for test suites.
    Test,
}

impl Env {
    /// Reads [`ENV_VAR`]. Unknown values fall back to development.
    pub fn from_env() -> Self {
        match std::env::var(ENV_VAR) {
            Ok(value) => value.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %value, "unknown {}, using development", ENV_VAR);
                Env::Development
            }),
            Err(_) => Env::Development,
        }
    }

    /// Whether templates are recompiled per request.
    pub fn recompiles(self) -> bool {
        self == Env::Development
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Env::Development => "development",
            Env::Production => "production",
            Env::Test => "test",
        }
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised environment name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown environment: {0:?}")]
pub struct ParseEnvError(pub String);

impl FromStr for Env {
    type Err = ParseEnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "development" | "dev" => Ok(Env::Development),
            "production" | "prod" => Ok(Env::Production),
            "test" => Ok(Env::Test),
            _ => Err(ParseEnvError(s.to_string())),
        }
    }
}
