use rsslap::{AutoGenerate, LoadType, TaskSpecBuilder, TaskSpec};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter("rsslap=debug,mock_database=debug")
            .with_test_writer()
            .try_init();
    });
}

/// Unbounded-duration spec for the auto-generated table.
#[allow(unused)]
pub fn auto_spec(load_type: LoadType, prepopulated_rows: u64) -> TaskSpecBuilder {
    TaskSpec::builder()
        .duration(Duration::ZERO)
        .auto_generate(AutoGenerate {
            load_type,
            prepopulated_rows,
            ..Default::default()
        })
}
