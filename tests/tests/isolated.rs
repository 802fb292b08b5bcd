mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use mock_database::MockDriver;
    use rsslap::prelude::*;
    use std::collections::HashSet;
    use std::time::Duration;

    #[tokio::test]
    async fn write_budget_across_agents() {
        init();

        let spec = auto_spec(LoadType::Write, 0)
            .agents(2)
            .statements_per_agent(10)
            .build()
            .unwrap();

        let stats = Orchestrator::new(spec, MockDriver::new()).run().await.unwrap();

        assert_eq!(stats.total_executed(), 20);
        assert_eq!(stats.total_errors(), 0);
        assert_eq!(stats.histogram.count(), 20);
        for agent in &stats.agents {
            assert_eq!(agent.executed, 10);
        }
    }

    #[test]
    fn read_without_rows_is_rejected() {
        let err = auto_spec(LoadType::Read, 0).build().unwrap_err();
        assert_eq!(err, ConfigError::MissingPrepopulatedRows(LoadType::Read));

        let err: RsslapError = err.into();
        assert!(matches!(err, RsslapError::Configuration(_)));
    }

    #[tokio::test]
    async fn commits_are_batched_per_agent() {
        init();

        let driver = MockDriver::new();
        let spec = auto_spec(LoadType::Write, 0)
            .agents(2)
            .statements_per_agent(7)
            .commit_rate(3)
            .build()
            .unwrap();

        let stats = Orchestrator::new(spec, driver.clone()).run().await.unwrap();

        assert_eq!(stats.total_executed(), 14);
        assert_eq!(stats.total_commits(), 6);
        for agent in &stats.agents {
            assert_eq!(agent.commits, 3);
        }
        assert_eq!(driver.commit_count(), 6);
        assert_eq!(driver.rollback_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn refused_agent_does_not_stop_siblings() {
        init();

        let driver = MockDriver::new()
            .latency(Duration::from_millis(1))
            .max_connections(1);
        let spec = auto_spec(LoadType::Write, 0)
            .agents(3)
            .statements_per_agent(10)
            .build()
            .unwrap();

        let stats = Orchestrator::new(spec, driver.clone()).run().await.unwrap();

        let connected: Vec<_> = stats
            .agents
            .iter()
            .filter(|a| a.connection_error.is_none())
            .collect();
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].executed, 10);
        assert_eq!(stats.total_executed(), 10);
        assert_eq!(stats.total_errors(), 2);
        assert!(driver.databases().is_empty());
    }

    #[tokio::test]
    async fn lost_connections_end_agents_not_the_run() {
        init();

        let driver = MockDriver::new().disconnect_after(4);
        let spec = auto_spec(LoadType::Write, 0)
            .agents(3)
            .statements_per_agent(10)
            .build()
            .unwrap();

        let stats = Orchestrator::new(spec, driver).run().await.unwrap();

        for agent in &stats.agents {
            assert_eq!(agent.executed, 4);
            assert!(agent.connection_error.as_ref().is_some_and(DbError::is_connection));
        }
        assert_eq!(stats.total_errors(), 3);
    }

    #[tokio::test]
    async fn statement_errors_are_counted() {
        init();

        let driver = MockDriver::new().fail_matching("broken");
        let spec = TaskSpec::builder()
            .duration(Duration::ZERO)
            .agents(2)
            .statements_per_agent(10)
            .queries(vec!["SELECT 1".to_string(), "SELECT broken".to_string()])
            .build()
            .unwrap();

        let stats = Orchestrator::new(spec, driver).run().await.unwrap();

        assert_eq!(stats.total_executed(), 20);
        assert_eq!(stats.total_errors(), 10);
        assert_eq!(stats.histogram.count(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn duration_bounds_every_agent() {
        init();

        let driver = MockDriver::new().latency(Duration::from_millis(5));
        let spec = auto_spec(LoadType::Write, 0)
            .agents(4)
            .duration(Duration::from_secs(1))
            .build()
            .unwrap();

        let stats = Orchestrator::new(spec, driver).run().await.unwrap();

        let epsilon = Duration::from_millis(5);
        assert!(stats.elapsed >= Duration::from_secs(1));
        assert!(stats.elapsed <= Duration::from_secs(1) + epsilon);
        for agent in &stats.agents {
            assert!(agent.elapsed >= Duration::from_secs(1) - epsilon);
            assert!(agent.elapsed <= Duration::from_secs(1) + epsilon);
        }
    }

    #[tokio::test]
    async fn pre_queries_run_once_per_agent() {
        init();

        let driver = MockDriver::new();
        let spec = auto_spec(LoadType::Write, 0)
            .agents(3)
            .statements_per_agent(2)
            .pre_queries(vec!["SET application_name = 'rsslap'".to_string()])
            .build()
            .unwrap();

        Orchestrator::new(spec, driver.clone()).run().await.unwrap();

        let pre_queries = driver
            .log()
            .iter()
            .filter(|s| s.starts_with("SET application_name"))
            .count();
        assert_eq!(pre_queries, 3);
    }

    #[tokio::test]
    async fn guid_reads_address_prepopulated_rows() {
        init();

        let driver = MockDriver::new();
        let spec = TaskSpec::builder()
            .duration(Duration::ZERO)
            .statements_per_agent(50)
            .auto_generate(AutoGenerate {
                load_type: LoadType::Key,
                guid_primary: true,
                prepopulated_rows: 20,
                ..Default::default()
            })
            .build()
            .unwrap();

        Orchestrator::new(spec, driver.clone()).run().await.unwrap();

        let log = driver.log();
        let key_of = |s: &str, from: &str| s.split(from).nth(1).map(|k| k[..38].to_string());
        let inserted: HashSet<_> = log
            .iter()
            .filter_map(|s| key_of(s, "VALUES ("))
            .collect();
        let selected: Vec<_> = log
            .iter()
            .filter_map(|s| key_of(s, "WHERE id = "))
            .collect();

        assert_eq!(inserted.len(), 20);
        assert_eq!(selected.len(), 50);
        assert!(selected.iter().all(|k| inserted.contains(k)));
    }

    #[tokio::test]
    async fn runs_are_reproducible() {
        init();

        async fn statements(seed: u64) -> Vec<String> {
            let driver = MockDriver::new();
            let spec = auto_spec(LoadType::Mixed, 10)
                .statements_per_agent(30)
                .seed(seed)
                .build()
                .unwrap();
            Orchestrator::new(spec, driver.clone()).run().await.unwrap();
            driver.log()
        }

        assert_eq!(statements(7).await, statements(7).await);
        assert_ne!(statements(7).await, statements(8).await);
    }
}
