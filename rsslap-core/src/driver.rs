//! Boundary between the engine and a concrete database client.
use async_trait::async_trait;
use thiserror::Error;

/// One result row; every value in its textual form, `None` for NULL.
pub type Row = Vec<Option<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbError {
    /// The connection could not be opened or is gone.
    #[error("connection error: {0}")]
    Connection(String),

    /// The server rejected a single statement.
    #[error("statement error: {0}")]
    Statement(String),
}

impl DbError {
    pub fn is_connection(&self) -> bool {
        matches!(self, DbError::Connection(_))
    }
}

/// A single exclusively-owned database session.
#[async_trait]
pub trait Connection: Send {
    /// Run a statement and return the number of rows it affected.
    async fn execute(&mut self, statement: &str) -> Result<u64, DbError>;

    /// Run a statement and return the rows it produced.
    async fn query(&mut self, statement: &str) -> Result<Vec<Row>, DbError>;

    async fn begin(&mut self) -> Result<(), DbError>;

    async fn commit(&mut self) -> Result<(), DbError>;

    async fn rollback(&mut self) -> Result<(), DbError>;

    /// Release the session. Further calls are invalid.
    async fn close(&mut self) -> Result<(), DbError>;
}

/// Opens sessions against a database server.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    type Conn: Connection + 'static;

    /// Connect to `database`, or to the server's maintenance database when `None`.
    async fn connect(&self, database: Option<&str>) -> Result<Self::Conn, DbError>;

    /// Query answering whether `database` exists; any returned row means it does.
    fn database_exists_query(&self, database: &str) -> String {
        format!(
            "SELECT 1 FROM pg_database WHERE datname = '{}'",
            database.replace('\'', "''")
        )
    }
}
