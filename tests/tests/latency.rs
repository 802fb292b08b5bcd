mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use mock_database::MockDriver;
    use rsslap::prelude::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn histogram_buckets_server_latency() {
        init();

        let driver = MockDriver::new().latency(Duration::from_millis(10));
        let spec = auto_spec(LoadType::Write, 0)
            .agents(3)
            .statements_per_agent(40)
            .histogram_interval(Duration::from_millis(5))
            .build()
            .unwrap();

        let stats = Orchestrator::new(spec, driver).run().await.unwrap();

        let buckets: Vec<_> = stats.histogram.buckets().collect();
        assert_eq!(buckets, vec![(Duration::from_millis(10), 120)]);
        assert_eq!(stats.histogram.min(), Some(Duration::from_millis(10)));
        assert_eq!(stats.histogram.max(), Some(Duration::from_millis(10)));

        let near = |d: Duration| d >= Duration::from_millis(9) && d <= Duration::from_millis(11);
        assert!(near(stats.latency_p50), "{:?}", stats.latency_p50);
        assert!(near(stats.latency_p99), "{:?}", stats.latency_p99);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn rate_limit_spaces_statements() {
        init();

        let spec = auto_spec(LoadType::Write, 0)
            .agents(2)
            .statements_per_agent(20)
            .rate(100)
            .build()
            .unwrap();

        let stats = Orchestrator::new(spec, MockDriver::new()).run().await.unwrap();

        // 20 statement starts at 100/s span at least 19 intervals of 10ms.
        let epsilon = Duration::from_millis(10);
        for agent in &stats.agents {
            assert_eq!(agent.executed, 20);
            assert!(agent.elapsed >= Duration::from_millis(190) - epsilon, "{:?}", agent.elapsed);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn delay_paces_statements() {
        init();

        let spec = auto_spec(LoadType::Write, 0)
            .duration(Duration::from_secs(10))
            .delay(Duration::from_secs(1))
            .build()
            .unwrap();

        let stats = Orchestrator::new(spec, MockDriver::new()).run().await.unwrap();

        let executed = stats.total_executed();
        assert!((9..=10).contains(&executed), "{executed}");
        assert!(stats.qps() <= 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn spread_stays_within_bounds() {
        init();

        let spec = auto_spec(LoadType::Write, 0)
            .agents(4)
            .statements_per_agent(10)
            .delay(Duration::from_millis(100))
            .spread(Duration::from_millis(100))
            .build()
            .unwrap();

        let stats = Orchestrator::new(spec, MockDriver::new()).run().await.unwrap();

        for agent in &stats.agents {
            assert!(agent.elapsed >= Duration::from_secs(1));
            assert!(agent.elapsed <= Duration::from_secs(2));
        }
    }
}
