use crate::driver::DbError;
use crate::histogram::Histogram;
use std::fmt;
use std::time::Duration;

/// Final counters of a single agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentStats {
    pub agent: usize,
    /// Statements attempted, failed ones included.
    pub executed: u64,
    /// Statements that failed.
    pub errors: u64,
    pub commits: u64,
    pub commit_errors: u64,
    /// Time spent running statements, measured from the agent's own start.
    pub elapsed: Duration,
    /// Set when the agent lost (or never got) its connection.
    pub connection_error: Option<DbError>,
}

impl AgentStats {
    pub fn new(agent: usize) -> Self {
        Self {
            agent,
            ..Default::default()
        }
    }

    pub fn total_errors(&self) -> u64 {
        self.errors + self.commit_errors + u64::from(self.connection_error.is_some())
    }
}

/// Outcome of a completed run.
///
/// A run that aborted before any agent started yields an error instead, so the
/// presence of this value means the run completed, possibly with errors.
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub agents: Vec<AgentStats>,
    /// Frozen latency histogram of every executed statement.
    pub histogram: Histogram,
    /// Wall time from spawning the first agent until the last one stopped.
    pub elapsed: Duration,
    pub latency_p50: Duration,
    pub latency_p90: Duration,
    pub latency_p99: Duration,
}

impl RunStatistics {
    pub fn total_executed(&self) -> u64 {
        self.agents.iter().map(|a| a.executed).sum()
    }

    pub fn total_errors(&self) -> u64 {
        self.agents.iter().map(AgentStats::total_errors).sum()
    }

    pub fn total_commits(&self) -> u64 {
        self.agents.iter().map(|a| a.commits).sum()
    }

    pub fn qps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0. {
            self.total_executed() as f64 / secs
        } else {
            0.
        }
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_opt = |d: Option<Duration>| {
            d.map(|d| format!("{d:?}"))
                .unwrap_or_else(|| "-".to_string())
        };

        writeln!(
            f,
            "elapsed={}, agents={}, queries={}, errors={}, commits={}, qps={:.2}",
            humantime::format_duration(Duration::from_millis(self.elapsed.as_millis() as u64)),
            self.agents.len(),
            self.total_executed(),
            self.total_errors(),
            self.total_commits(),
            self.qps(),
        )?;
        writeln!(
            f,
            "min={}, max={}, mean={}, p50={:?}, p90={:?}, p99={:?}",
            fmt_opt(self.histogram.min()),
            fmt_opt(self.histogram.max()),
            fmt_opt(self.histogram.mean()),
            self.latency_p50,
            self.latency_p90,
            self.latency_p99,
        )?;
        write!(f, "{}", self.histogram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_sum_agents() {
        let agents = vec![
            AgentStats {
                agent: 0,
                executed: 10,
                errors: 2,
                commits: 4,
                commit_errors: 1,
                ..Default::default()
            },
            AgentStats {
                agent: 1,
                connection_error: Some(DbError::Connection("refused".to_string())),
                ..Default::default()
            },
        ];

        let stats = RunStatistics {
            agents,
            histogram: Histogram::new(Duration::ZERO),
            elapsed: Duration::from_secs(2),
            latency_p50: Duration::ZERO,
            latency_p90: Duration::ZERO,
            latency_p99: Duration::ZERO,
        };

        assert_eq!(stats.total_executed(), 10);
        assert_eq!(stats.total_errors(), 4);
        assert_eq!(stats.total_commits(), 4);
        assert!((stats.qps() - 5.).abs() < f64::EPSILON);
    }
}
