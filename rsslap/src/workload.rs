//! Per-agent statement streams.
use crate::schema::Table;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rsslap_core::{LoadType, MixedRatio, TaskSpec, Workload};
use std::sync::Arc;

const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Independent seed for one random stream of one agent.
pub(crate) fn agent_seed(seed: u64, agent: usize, stream: u64) -> u64 {
    seed.wrapping_add((agent as u64 + 1).wrapping_mul(SEED_MIX))
        .rotate_left(17)
        ^ stream.wrapping_mul(SEED_MIX)
}

#[derive(Debug, Clone)]
enum Source {
    Auto {
        table: Table,
        load_type: LoadType,
        ratio: MixedRatio,
        existing_rows: u64,
    },
    Explicit(Arc<[String]>),
}

/// Endless, deterministic statement sequence of one agent.
///
/// Two generators built from the same `TaskSpec` and agent id yield identical
/// sequences. [`WorkloadGenerator::restart`] rewinds to the first statement.
#[derive(Debug, Clone)]
pub struct WorkloadGenerator {
    source: Source,
    agent: usize,
    agents: u64,
    seed: u64,
    rng: SmallRng,
    emitted: u64,
    inserted: u64,
}

impl WorkloadGenerator {
    pub fn new(spec: &TaskSpec, agent: usize) -> Self {
        let source = match spec.workload() {
            Workload::Auto(auto) => Source::Auto {
                table: Table::new(auto),
                load_type: auto.load_type,
                ratio: auto.mixed_ratio,
                existing_rows: auto.prepopulated_rows,
            },
            Workload::Explicit { queries, .. } => Source::Explicit(queries.clone().into()),
        };
        let seed = agent_seed(spec.seed(), agent, 0);

        Self {
            source,
            agent,
            agents: spec.agents() as u64,
            seed,
            rng: SmallRng::seed_from_u64(seed),
            emitted: 0,
            inserted: 0,
        }
    }

    pub fn restart(&mut self) {
        self.rng = SmallRng::seed_from_u64(self.seed);
        self.emitted = 0;
        self.inserted = 0;
    }

    /// Statements produced since creation or the last restart.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    fn next_auto(&mut self) -> Option<String> {
        let Source::Auto {
            table,
            load_type,
            ratio,
            existing_rows,
        } = &self.source
        else {
            return None;
        };

        let statement = match load_type {
            LoadType::Write => {
                // Interleave ordinals across agents so keys never collide.
                let ordinal = existing_rows + self.inserted * self.agents + self.agent as u64;
                self.inserted += 1;
                table.insert(&table.fresh_key(ordinal, &mut self.rng), &mut self.rng)
            }
            LoadType::Read => {
                let key = table.existing_key(self.rng.gen_range(0..*existing_rows));
                table.select_row(&key)
            }
            LoadType::Key => {
                let key = table.existing_key(self.rng.gen_range(0..*existing_rows));
                table.select_key(&key)
            }
            LoadType::Update => {
                let key = table.existing_key(self.rng.gen_range(0..*existing_rows));
                table.update_row(&key, &mut self.rng)
            }
            LoadType::Mixed => {
                if self.emitted % ratio.period() < u64::from(ratio.select()) {
                    let key = table.existing_key(self.rng.gen_range(0..*existing_rows));
                    table.select_row(&key)
                } else {
                    let ordinal = existing_rows + self.inserted * self.agents + self.agent as u64;
                    self.inserted += 1;
                    table.insert(&table.fresh_key(ordinal, &mut self.rng), &mut self.rng)
                }
            }
        };

        Some(statement)
    }
}

impl Iterator for WorkloadGenerator {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let statement = match &self.source {
            Source::Explicit(queries) if queries.is_empty() => return None,
            Source::Explicit(queries) => {
                queries[(self.emitted % queries.len() as u64) as usize].clone()
            }
            Source::Auto { .. } => self.next_auto()?,
        };

        self.emitted += 1;
        Some(statement)
    }
}
