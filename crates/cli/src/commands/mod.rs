//! CLI subcommands.

pub mod migrate;
pub mod seed;
pub mod sign;

use secrecy::SecretString;
use thiserror::Error;

use chatshop_orders::config::ConfigError;
use chatshop_orders::services::ProposalError;
use chatshop_orders::store::StoreError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A store write failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Demo data failed validation.
    #[error("Invalid seed data: {0}")]
    InvalidSeed(String),

    /// The proposal could not be parsed or signed.
    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),
}

impl From<ProposalError> for CommandError {
    fn from(err: ProposalError) -> Self {
        Self::InvalidProposal(err.to_string())
    }
}

/// Orders database URL with fallback to generic `DATABASE_URL`.
fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();

    std::env::var("ORDERS_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("ORDERS_DATABASE_URL"))
}
