mod pacer;

use crate::recorder::Recorder;
use crate::workload::{agent_seed, WorkloadGenerator};
use pacer::Pacer;
use rsslap_core::{AgentStats, Connection, DbError, Driver, TaskSpec};
use std::fmt;
use std::sync::Arc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Seed stream of the pacing jitter; the workload uses stream 0.
const JITTER_STREAM: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    Running,
    Draining,
    Stopped,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Transaction state of the current commit batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Batch {
    /// No statement of the batch has run yet.
    Empty,
    Open,
    /// BEGIN failed; the batch runs outside a transaction until it ends.
    BeginFailed,
}

/// One client executing its own statement stream over its own connection.
///
/// Stop conditions (duration, statement budget, cancellation) are checked
/// between statements only; a statement in flight always completes.
pub struct Agent<D: Driver> {
    id: usize,
    spec: Arc<TaskSpec>,
    driver: Arc<D>,
    recorder: Arc<Recorder>,
    cancel: CancellationToken,
    workload: WorkloadGenerator,
    pacer: Pacer,
    state: AgentState,
    stats: AgentStats,
    pending: u64,
    batch: Batch,
}

impl<D: Driver> Agent<D> {
    pub fn new(
        id: usize,
        spec: Arc<TaskSpec>,
        driver: Arc<D>,
        recorder: Arc<Recorder>,
        cancel: CancellationToken,
    ) -> Self {
        let workload = WorkloadGenerator::new(&spec, id);
        let pacer = Pacer::new(&spec, agent_seed(spec.seed(), id, JITTER_STREAM));

        Self {
            id,
            spec,
            driver,
            recorder,
            cancel,
            workload,
            pacer,
            state: AgentState::Idle,
            stats: AgentStats::new(id),
            pending: 0,
            batch: Batch::Empty,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    fn set_state(&mut self, state: AgentState) {
        debug!("Agent {}: {} -> {}", self.id, self.state, state);
        self.state = state;
    }

    /// Drive the agent from `Idle` to `Stopped` and return its final counters.
    pub async fn run(mut self) -> AgentStats {
        let connected = self.driver.connect(Some(self.spec.database())).await;
        let mut conn = match connected {
            Ok(conn) => conn,
            Err(err) => {
                warn!("Agent {} could not connect: {err}", self.id);
                self.stats.connection_error = Some(err);
                self.set_state(AgentState::Stopped);
                return self.stats;
            }
        };

        self.set_state(AgentState::Running);
        let start = Instant::now();

        let mut outcome = self.pre_queries(&mut conn).await;
        if outcome.is_ok() {
            outcome = self.run_loop(&mut conn, start).await;
        }
        self.stats.elapsed = start.elapsed();

        match outcome {
            Ok(()) => {
                self.set_state(AgentState::Draining);
                if let Err(err) = self.drain(&mut conn).await {
                    self.stats.connection_error = Some(err);
                }
            }
            Err(err) => {
                warn!("Agent {} lost its connection: {err}", self.id);
                self.stats.connection_error = Some(err);
            }
        }

        if let Err(err) = conn.close().await {
            debug!("Agent {} failed to close its connection: {err}", self.id);
        }

        self.set_state(AgentState::Stopped);
        self.stats
    }

    async fn pre_queries(&mut self, conn: &mut D::Conn) -> Result<(), DbError> {
        let spec = self.spec.clone();
        for statement in spec.pre_queries() {
            trace!("Agent {} pre-query: {statement}", self.id);
            match conn.execute(statement).await {
                Ok(_) => {}
                Err(err) if err.is_connection() => return Err(err),
                Err(err) => {
                    warn!("Agent {} pre-query failed: {err}", self.id);
                    self.stats.errors += 1;
                }
            }
        }
        Ok(())
    }

    // NOTE: The only awaits in this loop are the pacing wait and the database calls.
    async fn run_loop(&mut self, conn: &mut D::Conn, start: Instant) -> Result<(), DbError> {
        let deadline = self.spec.duration().map(|d| start + d);

        loop {
            if let Some(reason) = self.stop_reason(deadline) {
                debug!("Agent {} stopping: {reason}", self.id);
                return Ok(());
            }

            if !self.pace(deadline).await {
                continue;
            }

            let Some(statement) = self.workload.next() else {
                return Ok(());
            };

            self.execute(conn, &statement).await?;
            self.count_for_commit(conn).await?;
        }
    }

    fn stop_reason(&self, deadline: Option<Instant>) -> Option<&'static str> {
        if self.cancel.is_cancelled() {
            Some("cancelled")
        } else if deadline.is_some_and(|d| Instant::now() >= d) {
            Some("duration elapsed")
        } else if self
            .spec
            .statements_per_agent()
            .is_some_and(|budget| self.stats.executed >= budget)
        {
            Some("statement budget reached")
        } else {
            None
        }
    }

    /// Returns `false` when woken by cancellation or the deadline instead.
    async fn pace(&mut self, deadline: Option<Instant>) -> bool {
        let expired = async {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = expired => false,
            _ = self.pacer.wait() => true,
        }
    }

    async fn execute(&mut self, conn: &mut D::Conn, statement: &str) -> Result<(), DbError> {
        if self.spec.commit_rate().is_some() && self.batch == Batch::Empty {
            match conn.begin().await {
                Ok(()) => self.batch = Batch::Open,
                Err(err) if err.is_connection() => return Err(err),
                Err(err) => {
                    warn!("Agent {} failed to begin a transaction: {err}", self.id);
                    self.stats.commit_errors += 1;
                    self.batch = Batch::BeginFailed;
                }
            }
        }

        trace!("Agent {} executing: {statement}", self.id);
        let start = Instant::now();
        let res = conn.execute(statement).await;
        let elapsed = start.elapsed();

        match res {
            Ok(_) => {
                #[cfg(feature = "metrics")]
                metrics::counter!("rsslap_statement_success").increment(1);
            }
            Err(err) if err.is_connection() => return Err(err),
            Err(err) => {
                debug!("Agent {} statement failed: {err}", self.id);
                self.stats.errors += 1;
                self.recorder.record_error();
                #[cfg(feature = "metrics")]
                metrics::counter!("rsslap_statement_error").increment(1);
            }
        }

        self.stats.executed += 1;
        self.recorder.record(elapsed);
        #[cfg(feature = "metrics")]
        metrics::histogram!("rsslap_statement_latency").record(elapsed.as_nanos() as f64);

        Ok(())
    }

    async fn count_for_commit(&mut self, conn: &mut D::Conn) -> Result<(), DbError> {
        let Some(commit_rate) = self.spec.commit_rate() else {
            return Ok(());
        };

        self.pending += 1;
        if self.pending >= commit_rate {
            self.commit(conn).await?;
        }
        Ok(())
    }

    async fn commit(&mut self, conn: &mut D::Conn) -> Result<(), DbError> {
        self.pending = 0;
        let batch = std::mem::replace(&mut self.batch, Batch::Empty);
        if batch != Batch::Open {
            return Ok(());
        }

        match conn.commit().await {
            Ok(()) => {
                self.stats.commits += 1;
                #[cfg(feature = "metrics")]
                metrics::counter!("rsslap_commit").increment(1);
            }
            Err(err) if err.is_connection() => return Err(err),
            Err(err) => {
                warn!("Agent {} commit failed: {err}", self.id);
                self.stats.commit_errors += 1;
            }
        }
        Ok(())
    }

    /// Commit the trailing partial batch. Not retried on failure.
    async fn drain(&mut self, conn: &mut D::Conn) -> Result<(), DbError> {
        if self.pending > 0 {
            debug!(
                "Agent {} committing {} pending statements",
                self.id, self.pending
            );
            self.commit(conn).await?;
        }
        Ok(())
    }
}
