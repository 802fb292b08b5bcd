mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;

    use rsslap::driver::PostgresDriver;
    use rsslap::prelude::*;
    use std::time::Duration;

    const DEFAULT_URL: &str = "postgres://postgres@localhost:5432/rsslap_it";

    fn driver() -> PostgresDriver {
        let url = std::env::var("RSSLAP_TEST_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        PostgresDriver::from_url(&url).unwrap()
    }

    fn spec(load_type: LoadType, database: &str) -> TaskSpec {
        auto_spec(load_type, 50)
            .agents(4)
            .statements_per_agent(100)
            .commit_rate(10)
            .database(database)
            .drop_existing(true)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn every_load_type_runs_clean() {
        init();

        for load_type in LoadType::ALL {
            let database = format!("rsslap_it_{load_type}");
            let stats = Orchestrator::new(spec(load_type, &database), driver())
                .run()
                .await
                .unwrap();

            assert_eq!(stats.total_executed(), 400, "{load_type}");
            assert_eq!(stats.total_errors(), 0, "{load_type}");
            assert_eq!(stats.total_commits(), 40, "{load_type}");
        }
    }

    #[tokio::test]
    async fn duplicate_keys_are_statement_errors() {
        init();

        let spec = TaskSpec::builder()
            .duration(Duration::from_secs(2))
            .statements_per_agent(10)
            .creates(vec!["CREATE TABLE dup (id INT PRIMARY KEY)".to_string()])
            .queries(vec!["INSERT INTO dup VALUES (1)".to_string()])
            .database("rsslap_it_dup")
            .drop_existing(true)
            .build()
            .unwrap();

        let stats = Orchestrator::new(spec, driver()).run().await.unwrap();
        assert_eq!(stats.total_executed(), 10);
        assert_eq!(stats.total_errors(), 9);
    }
}
