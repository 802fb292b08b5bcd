use async_trait::async_trait;
use rsslap_core::{Connection, DbError, Driver, Row};
use std::io::Write;

/// Writes every statement to standard output instead of executing it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintDriver;

impl PrintDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for PrintDriver {
    type Conn = PrintConnection;

    async fn connect(&self, _database: Option<&str>) -> Result<PrintConnection, DbError> {
        Ok(PrintConnection)
    }
}

#[derive(Debug)]
pub struct PrintConnection;

impl PrintConnection {
    fn print(&self, statement: &str) -> Result<(), DbError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{statement};").map_err(|e| DbError::Connection(e.to_string()))
    }
}

#[async_trait]
impl Connection for PrintConnection {
    async fn execute(&mut self, statement: &str) -> Result<u64, DbError> {
        self.print(statement)?;
        Ok(0)
    }

    async fn query(&mut self, statement: &str) -> Result<Vec<Row>, DbError> {
        self.print(statement)?;
        Ok(vec![])
    }

    async fn begin(&mut self) -> Result<(), DbError> {
        self.print("BEGIN")
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.print("COMMIT")
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.print("ROLLBACK")
    }

    async fn close(&mut self) -> Result<(), DbError> {
        Ok(())
    }
}
