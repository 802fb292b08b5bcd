use crate::constants::*;
use crate::error::ConfigError;
use std::fmt;
use std::num::{NonZeroU32, NonZeroU64};
use std::str::FromStr;
use std::time::Duration;

/// Shape of an auto-generated workload.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadType {
    /// SELECTs and INSERTs interleaved by [`MixedRatio`].
    #[default]
    Mixed,
    /// UPDATEs of existing rows.
    Update,
    /// INSERTs of new rows.
    Write,
    /// Primary key lookups.
    Key,
    /// Full-row reads of existing rows.
    Read,
}

impl LoadType {
    pub const ALL: [LoadType; 5] = [
        LoadType::Mixed,
        LoadType::Update,
        LoadType::Write,
        LoadType::Key,
        LoadType::Read,
    ];

    /// Whether statements of this shape address rows inserted before the run.
    pub fn requires_existing_rows(&self) -> bool {
        !matches!(self, LoadType::Write)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadType::Mixed => "mixed",
            LoadType::Update => "update",
            LoadType::Write => "write",
            LoadType::Key => "key",
            LoadType::Read => "read",
        }
    }
}

impl FromStr for LoadType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LoadType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ConfigError::InvalidLoadType(s.to_string()))
    }
}

impl fmt::Display for LoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `SELECT:INSERT` weights of the mixed load type. Both sides are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixedRatio {
    select: NonZeroU32,
    insert: NonZeroU32,
}

impl MixedRatio {
    pub fn new(select: u32, insert: u32) -> Result<Self, ConfigError> {
        let select = NonZeroU32::new(select).ok_or(ConfigError::ZeroSelectRatio)?;
        let insert = NonZeroU32::new(insert).ok_or(ConfigError::ZeroInsertRatio)?;
        Ok(Self { select, insert })
    }

    pub fn select(&self) -> u32 {
        self.select.get()
    }

    pub fn insert(&self) -> u32 {
        self.insert.get()
    }

    /// Number of statements after which the interleaving repeats.
    pub fn period(&self) -> u64 {
        u64::from(self.select.get()) + u64::from(self.insert.get())
    }
}

impl Default for MixedRatio {
    fn default() -> Self {
        Self {
            select: NonZeroU32::MIN,
            insert: NonZeroU32::MIN,
        }
    }
}

impl FromStr for MixedRatio {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (select, insert) = s
            .split_once(':')
            .ok_or_else(|| ConfigError::InvalidRatio(format!("':' is not included in '{s}'")))?;

        let select = select
            .trim()
            .parse::<u32>()
            .map_err(|e| ConfigError::InvalidRatio(format!("SELECT ratio: {e}")))?;
        let insert = insert
            .trim()
            .parse::<u32>()
            .map_err(|e| ConfigError::InvalidRatio(format!("INSERT ratio: {e}")))?;

        MixedRatio::new(select, insert)
    }
}

impl fmt::Display for MixedRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.select, self.insert)
    }
}

/// Parameters of an auto-generated table and workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoGenerate {
    pub load_type: LoadType,
    pub mixed_ratio: MixedRatio,
    pub int_cols: u32,
    pub char_cols: u32,
    pub int_cols_index: bool,
    pub char_cols_index: bool,
    pub secondary_indexes: u32,
    pub guid_primary: bool,
    pub prepopulated_rows: u64,
}

impl Default for AutoGenerate {
    fn default() -> Self {
        Self {
            load_type: LoadType::default(),
            mixed_ratio: MixedRatio::default(),
            int_cols: DEFAULT_INT_COLS,
            char_cols: DEFAULT_CHAR_COLS,
            int_cols_index: false,
            char_cols_index: false,
            secondary_indexes: 0,
            guid_primary: false,
            prepopulated_rows: DEFAULT_PREPOPULATED_ROWS,
        }
    }
}

/// Where the statements an agent executes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Workload {
    Auto(AutoGenerate),
    /// Fixed statement lists replayed as given. `creates` replace the
    /// auto-generated DDL and may be empty.
    Explicit {
        queries: Vec<String>,
        creates: Vec<String>,
    },
}

/// Validated, immutable description of one load test run.
///
/// Built once through [`TaskSpec::builder`] and shared read-only by every agent.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    agents: usize,
    duration: Option<Duration>,
    statements_per_agent: Option<NonZeroU64>,
    rate: Option<NonZeroU32>,
    delay: Duration,
    spread: Duration,
    commit_rate: Option<NonZeroU64>,
    workload: Workload,
    pre_queries: Vec<String>,
    database: String,
    drop_existing: bool,
    keep_database: bool,
    histogram_interval: Duration,
    progress: bool,
    seed: u64,
}

impl TaskSpec {
    pub fn builder() -> TaskSpecBuilder {
        TaskSpecBuilder::default()
    }

    pub fn agents(&self) -> usize {
        self.agents
    }

    /// Run time bound, `None` when unbounded.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Statement budget of each agent, `None` when unbounded.
    pub fn statements_per_agent(&self) -> Option<u64> {
        self.statements_per_agent.map(NonZeroU64::get)
    }

    /// Statements per second of each agent, `None` when unlimited.
    pub fn rate(&self) -> Option<NonZeroU32> {
        self.rate
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn spread(&self) -> Duration {
        self.spread
    }

    /// Statements per transaction, `None` to run in autocommit mode.
    pub fn commit_rate(&self) -> Option<u64> {
        self.commit_rate.map(NonZeroU64::get)
    }

    pub fn workload(&self) -> &Workload {
        &self.workload
    }

    /// The auto-generation parameters, if the workload is generated.
    pub fn auto_generate(&self) -> Option<&AutoGenerate> {
        match &self.workload {
            Workload::Auto(auto) => Some(auto),
            Workload::Explicit { .. } => None,
        }
    }

    pub fn pre_queries(&self) -> &[String] {
        &self.pre_queries
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn drop_existing(&self) -> bool {
        self.drop_existing
    }

    pub fn keep_database(&self) -> bool {
        self.keep_database
    }

    pub fn histogram_interval(&self) -> Duration {
        self.histogram_interval
    }

    pub fn progress(&self) -> bool {
        self.progress
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// Accumulates run options; nothing is checked until [`TaskSpecBuilder::build`].
#[derive(Debug, Clone)]
pub struct TaskSpecBuilder {
    agents: usize,
    duration: Duration,
    statements_per_agent: u64,
    rate: u32,
    delay: Duration,
    spread: Duration,
    commit_rate: u64,
    auto_generate: Option<AutoGenerate>,
    queries: Vec<String>,
    creates: Vec<String>,
    pre_queries: Vec<String>,
    database: String,
    drop_existing: bool,
    keep_database: bool,
    histogram_interval: Duration,
    progress: bool,
    seed: u64,
}

impl Default for TaskSpecBuilder {
    fn default() -> Self {
        Self {
            agents: 1,
            duration: DEFAULT_DURATION,
            statements_per_agent: 0,
            rate: 0,
            delay: Duration::ZERO,
            spread: Duration::ZERO,
            commit_rate: 0,
            auto_generate: None,
            queries: vec![],
            creates: vec![],
            pre_queries: vec![],
            database: DEFAULT_DATABASE.to_string(),
            drop_existing: false,
            keep_database: false,
            histogram_interval: Duration::ZERO,
            progress: false,
            seed: 0,
        }
    }
}

impl TaskSpecBuilder {
    pub fn agents(mut self, agents: usize) -> Self {
        self.agents = agents;
        self
    }

    /// Zero means no time bound.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Zero means no statement bound.
    pub fn statements_per_agent(mut self, statements: u64) -> Self {
        self.statements_per_agent = statements;
        self
    }

    /// Zero means unlimited.
    pub fn rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn spread(mut self, spread: Duration) -> Self {
        self.spread = spread;
        self
    }

    /// Zero means autocommit.
    pub fn commit_rate(mut self, commit_rate: u64) -> Self {
        self.commit_rate = commit_rate;
        self
    }

    pub fn auto_generate(mut self, auto: AutoGenerate) -> Self {
        self.auto_generate = Some(auto);
        self
    }

    pub fn queries(mut self, queries: Vec<String>) -> Self {
        self.queries = queries;
        self
    }

    pub fn creates(mut self, creates: Vec<String>) -> Self {
        self.creates = creates;
        self
    }

    pub fn pre_queries(mut self, pre_queries: Vec<String>) -> Self {
        self.pre_queries = pre_queries;
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn drop_existing(mut self, drop_existing: bool) -> Self {
        self.drop_existing = drop_existing;
        self
    }

    pub fn keep_database(mut self, keep_database: bool) -> Self {
        self.keep_database = keep_database;
        self
    }

    pub fn histogram_interval(mut self, interval: Duration) -> Self {
        self.histogram_interval = interval;
        self
    }

    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> Result<TaskSpec, ConfigError> {
        if self.agents < 1 {
            return Err(ConfigError::NoAgents);
        }

        if self.rate > 0 && !self.delay.is_zero() {
            return Err(ConfigError::RateAndDelay);
        }

        if self.database.trim().is_empty() {
            return Err(ConfigError::EmptyDatabase);
        }

        let workload = match (self.auto_generate, self.queries.is_empty()) {
            (Some(_), false) => return Err(ConfigError::ConflictingWorkload),
            (None, true) if !self.creates.is_empty() => {
                return Err(ConfigError::CreatesWithoutQueries)
            }
            (None, true) => return Err(ConfigError::NoWorkload),
            (Some(auto), true) => {
                if !self.creates.is_empty() {
                    return Err(ConfigError::CreatesWithoutQueries);
                }
                validate_auto_generate(&auto)?;
                Workload::Auto(auto)
            }
            (None, false) => Workload::Explicit {
                queries: self.queries,
                creates: self.creates,
            },
        };

        Ok(TaskSpec {
            agents: self.agents,
            duration: Some(self.duration).filter(|d| !d.is_zero()),
            statements_per_agent: NonZeroU64::new(self.statements_per_agent),
            rate: NonZeroU32::new(self.rate),
            delay: self.delay,
            spread: self.spread,
            commit_rate: NonZeroU64::new(self.commit_rate),
            workload,
            pre_queries: self.pre_queries,
            database: self.database,
            drop_existing: self.drop_existing,
            keep_database: self.keep_database,
            histogram_interval: self.histogram_interval,
            progress: self.progress,
            seed: self.seed,
        })
    }
}

fn validate_auto_generate(auto: &AutoGenerate) -> Result<(), ConfigError> {
    if auto.int_cols < 1 {
        return Err(ConfigError::NoIntCols);
    }

    if auto.char_cols < 1 {
        return Err(ConfigError::NoCharCols);
    }

    if auto.prepopulated_rows == 0 && auto.load_type.requires_existing_rows() {
        return Err(ConfigError::MissingPrepopulatedRows(auto.load_type));
    }

    Ok(())
}
