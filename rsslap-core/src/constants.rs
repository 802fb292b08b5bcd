use std::time::Duration;

/// Default run time when none is given.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(60);

/// Database created (and dropped) for a run when the URL names none.
pub const DEFAULT_DATABASE: &str = "rsslap";

/// Rows inserted before measurement starts for auto-generated workloads.
pub const DEFAULT_PREPOPULATED_ROWS: u64 = 100;

pub const DEFAULT_INT_COLS: u32 = 1;
pub const DEFAULT_CHAR_COLS: u32 = 1;

pub const DEFAULT_DELIMITER: &str = ";";

/// Name of the auto-generated table.
pub const TABLE_NAME: &str = "t1";

/// Width of auto-generated VARCHAR columns.
pub const CHAR_COL_WIDTH: usize = 128;

/// Length of the random strings stored in VARCHAR columns.
pub const CHAR_VALUE_LEN: usize = 32;

/// Width of a textual GUID.
pub const GUID_WIDTH: usize = 36;
