//! Run lifecycle: database setup, agent supervision and teardown.
use crate::agent::Agent;
use crate::recorder::Recorder;
use crate::schema::SchemaGenerator;
use rsslap_core::{AgentStats, Connection, DbError, Driver, RsslapError, RunStatistics, TaskSpec};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
#[allow(unused_imports)]
use tracing::{debug, error, info, info_span, instrument, trace, warn, Instrument};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Owns everything belonging to a single run.
///
/// # Example
/// ```no_run
/// use rsslap::prelude::*;
/// use rsslap::driver::PrintDriver;
///
/// # async fn run() -> Result<(), RsslapError> {
/// let spec = TaskSpec::builder()
///     .agents(4)
///     .statements_per_agent(100)
///     .auto_generate(AutoGenerate::default())
///     .build()?;
///
/// let stats = Orchestrator::new(spec, PrintDriver::new()).run().await?;
/// println!("{stats}");
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator<D: Driver> {
    spec: Arc<TaskSpec>,
    driver: Arc<D>,
    recorder: Arc<Recorder>,
    cancel: CancellationToken,
}

impl<D: Driver> Orchestrator<D> {
    pub fn new(spec: TaskSpec, driver: D) -> Self {
        let recorder = Arc::new(Recorder::new(spec.histogram_interval()));
        Self {
            spec: Arc::new(spec),
            driver: Arc::new(driver),
            recorder,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling this token asks every agent to stop after its current
    /// statement. Cancelling before `run` still performs setup and teardown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[instrument(name = "orchestrator", skip_all, fields(database = self.spec.database(), agents = self.spec.agents()))]
    pub async fn run(self) -> Result<RunStatistics, RsslapError> {
        info!("Running with {:?}", self.spec);

        let schema = SchemaGenerator::new(&self.spec)?;

        self.create_database().await?;
        if let Err(err) = self.prepare(&schema).await {
            self.teardown().await;
            return Err(err);
        }

        let (agents, elapsed, failure) = self.run_agents().await;

        self.teardown().await;

        if let Some(err) = failure {
            return Err(err);
        }

        let stats = RunStatistics {
            agents,
            histogram: self.recorder.snapshot(),
            elapsed,
            latency_p50: self.recorder.latency(0.5),
            latency_p90: self.recorder.latency(0.9),
            latency_p99: self.recorder.latency(0.99),
        };
        info!(
            "Run complete: {} statements, {} errors in {:?}",
            stats.total_executed(),
            stats.total_errors(),
            stats.elapsed
        );

        Ok(stats)
    }

    async fn admin(&self) -> Result<D::Conn, RsslapError> {
        self.driver
            .connect(None)
            .await
            .map_err(RsslapError::Connection)
    }

    async fn create_database(&self) -> Result<(), RsslapError> {
        let database = self.spec.database();
        let mut admin = self.admin().await?;

        let exists = admin
            .query(&self.driver.database_exists_query(database))
            .await
            .map(|rows| !rows.is_empty())
            .map_err(RsslapError::Setup)?;

        if exists {
            if !self.spec.drop_existing() {
                let _ = admin.close().await;
                return Err(RsslapError::Setup(DbError::Statement(format!(
                    "database \"{database}\" already exists"
                ))));
            }
            info!("Dropping existing database {database}");
            admin
                .execute(&format!("DROP DATABASE {}", quote_ident(database)))
                .await
                .map_err(RsslapError::Setup)?;
        }

        debug!("Creating database {database}");
        admin
            .execute(&format!("CREATE DATABASE {}", quote_ident(database)))
            .await
            .map_err(RsslapError::Setup)?;

        let _ = admin.close().await;
        Ok(())
    }

    async fn prepare(&self, schema: &SchemaGenerator) -> Result<(), RsslapError> {
        let mut conn = self
            .driver
            .connect(Some(self.spec.database()))
            .await
            .map_err(RsslapError::Connection)?;

        for statement in schema.create_statements() {
            debug!("Creating: {statement}");
            conn.execute(statement).await.map_err(RsslapError::Setup)?;
        }

        if schema.prepopulated_rows() > 0 {
            info!("Pre-populating {} rows", schema.prepopulated_rows());
            for statement in schema.populate_statements() {
                conn.execute(&statement).await.map_err(RsslapError::Setup)?;
            }
        }

        let _ = conn.close().await;
        Ok(())
    }

    async fn run_agents(&self) -> (Vec<AgentStats>, Duration, Option<RsslapError>) {
        let run = self.cancel.child_token();
        let start = Instant::now();

        let handles: Vec<JoinHandle<AgentStats>> = (0..self.spec.agents())
            .map(|id| {
                let agent = Agent::new(
                    id,
                    self.spec.clone(),
                    self.driver.clone(),
                    self.recorder.clone(),
                    run.clone(),
                );
                tokio::spawn(agent.run().instrument(info_span!("agent", id)))
            })
            .collect();
        info!("Started {} agents", handles.len());

        if let Some(duration) = self.spec.duration() {
            tokio::spawn(deadline(run.clone(), duration));
        }

        if self.spec.progress() {
            tokio::spawn(progress(self.recorder.clone(), run.clone(), start).in_current_span());
        }

        let mut agents = Vec::with_capacity(handles.len());
        let mut failure = None;
        for (id, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(stats) => agents.push(stats),
                Err(err) => {
                    error!("Agent {id} task failed: {err}");
                    agents.push(AgentStats::new(id));
                    failure.get_or_insert(RsslapError::AgentTask(id, err.to_string()));
                }
            }
        }
        let elapsed = start.elapsed();

        // Stops the deadline and progress tasks.
        run.cancel();

        (agents, elapsed, failure)
    }

    async fn teardown(&self) {
        let database = self.spec.database();
        if self.spec.keep_database() {
            info!("Keeping database {database}");
            return;
        }

        let dropped = async {
            let mut admin = self.driver.connect(None).await?;
            let res = admin
                .execute(&format!("DROP DATABASE {}", quote_ident(database)))
                .await;
            let _ = admin.close().await;
            res
        };

        match dropped.await {
            Ok(_) => debug!("Dropped database {database}"),
            Err(err) => warn!("Failed to drop database {database}: {err}"),
        }
    }
}

async fn deadline(run: CancellationToken, duration: Duration) {
    tokio::select! {
        _ = run.cancelled() => {}
        _ = tokio::time::sleep(duration) => {
            debug!("Deadline of {duration:?} reached");
            run.cancel();
        }
    }
}

async fn progress(recorder: Arc<Recorder>, run: CancellationToken, start: Instant) {
    let mut interval = tokio::time::interval(PROGRESS_INTERVAL);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = run.cancelled() => return,
            _ = interval.tick() => {
                let executed = recorder.count();
                let secs = start.elapsed().as_secs_f64();
                info!(
                    "progress: {executed} statements, {} errors, {:.1} qps",
                    recorder.errors(),
                    executed as f64 / secs
                );
            }
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
