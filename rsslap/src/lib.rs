#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod agent;
pub mod driver;
pub mod orchestrator;
pub mod recorder;
pub mod schema;
pub mod workload;

pub use orchestrator::Orchestrator;
pub use rsslap_core::*;

pub mod prelude {
    pub use crate::orchestrator::Orchestrator;
    pub use rsslap_core::{
        AutoGenerate, Connection, ConfigError, DbError, Driver, LoadType, MixedRatio,
        RsslapError, RunStatistics, TaskSpec, Workload,
    };
}
