use crate::config::LoadType;
use crate::driver::DbError;
use thiserror::Error;

/// A [`TaskSpec`](crate::TaskSpec) invariant does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("agent count must be >= 1")]
    NoAgents,

    #[error("cannot set both rate and delay")]
    RateAndDelay,

    #[error("database name must not be empty")]
    EmptyDatabase,

    #[error("either auto-generated SQL or explicit queries are required")]
    NoWorkload,

    #[error("cannot set both auto-generated SQL and explicit queries")]
    ConflictingWorkload,

    #[error("explicit queries are required for custom create statements")]
    CreatesWithoutQueries,

    #[error("invalid load type: {0}")]
    InvalidLoadType(String),

    #[error("invalid mixed 'SELECT:INSERT' ratio: {0}")]
    InvalidRatio(String),

    #[error("mixed SELECT ratio must be >= 1")]
    ZeroSelectRatio,

    #[error("mixed INSERT ratio must be >= 1")]
    ZeroInsertRatio,

    #[error("number of INT columns must be >= 1")]
    NoIntCols,

    #[error("number of VARCHAR columns must be >= 1")]
    NoCharCols,

    #[error("pre-populated data is required for the '{0}' load type")]
    MissingPrepopulatedRows(LoadType),
}

/// Reasons a run aborts before producing statistics.
///
/// Statement and commit failures never surface here; they are counted per agent.
#[derive(Debug, Error)]
pub enum RsslapError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("cannot build schema: {0}")]
    SchemaBuild(String),

    #[error("cannot connect: {0}")]
    Connection(DbError),

    #[error("database setup failed: {0}")]
    Setup(DbError),

    #[error("agent {0} task failed: {1}")]
    AgentTask(usize, String),
}
