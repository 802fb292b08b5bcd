use async_trait::async_trait;
use rsslap_core::{Connection, DbError, Driver, Row};
use tokio::task::JoinHandle;
use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Database used for administrative statements (`CREATE`/`DROP DATABASE`).
pub const MAINTENANCE_DATABASE: &str = "postgres";

/// Speaks the PostgreSQL wire protocol through `tokio-postgres`.
///
/// Statements go through the simple query protocol so that any SQL text the
/// server accepts can be replayed verbatim.
#[derive(Debug, Clone)]
pub struct PostgresDriver {
    config: Config,
}

impl PostgresDriver {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Parse a `postgres://` URL or a key/value connection string.
    pub fn from_url(url: &str) -> Result<Self, DbError> {
        url.parse::<Config>()
            .map(Self::new)
            .map_err(|e| DbError::Connection(e.to_string()))
    }

    /// Database named by the connection string, if any.
    pub fn database(&self) -> Option<&str> {
        self.config.get_dbname()
    }
}

fn db_error(err: tokio_postgres::Error) -> DbError {
    if err.is_closed() {
        DbError::Connection(err.to_string())
    } else {
        DbError::Statement(err.to_string())
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    type Conn = PostgresConnection;

    async fn connect(&self, database: Option<&str>) -> Result<PostgresConnection, DbError> {
        let mut config = self.config.clone();
        config.dbname(database.unwrap_or(MAINTENANCE_DATABASE));

        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let task = tokio::spawn(async move {
            if let Err(err) = connection.await {
                warn!("Connection error: {err}");
            }
        });

        Ok(PostgresConnection {
            client: Some(client),
            task: Some(task),
        })
    }
}

#[derive(Debug)]
pub struct PostgresConnection {
    client: Option<Client>,
    task: Option<JoinHandle<()>>,
}

impl PostgresConnection {
    async fn simple_query(&mut self, statement: &str) -> Result<Vec<SimpleQueryMessage>, DbError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| DbError::Connection("connection closed".to_string()))?;
        client.simple_query(statement).await.map_err(db_error)
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    async fn execute(&mut self, statement: &str) -> Result<u64, DbError> {
        let messages = self.simple_query(statement).await?;
        let affected = messages
            .iter()
            .filter_map(|m| match m {
                SimpleQueryMessage::CommandComplete(n) => Some(*n),
                _ => None,
            })
            .last()
            .unwrap_or(0);
        Ok(affected)
    }

    async fn query(&mut self, statement: &str) -> Result<Vec<Row>, DbError> {
        let messages = self.simple_query(statement).await?;
        let rows = messages
            .iter()
            .filter_map(|m| match m {
                SimpleQueryMessage::Row(row) => {
                    Some((0..row.len()).map(|i| row.get(i).map(str::to_string)).collect())
                }
                _ => None,
            })
            .collect();
        Ok(rows)
    }

    async fn begin(&mut self) -> Result<(), DbError> {
        self.simple_query("BEGIN").await.map(drop)
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.simple_query("COMMIT").await.map(drop)
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.simple_query("ROLLBACK").await.map(drop)
    }

    async fn close(&mut self) -> Result<(), DbError> {
        drop(self.client.take());
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| DbError::Connection(e.to_string()))?;
        }
        Ok(())
    }
}
