// reference branch
pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_BRANCH: &str = "main";

// outputs
pub const REPORT_FILE: &str = "SYNC_REPORT.md";
pub const EXPORT_DIR: &str = "sync-export";
pub const INSTRUCTIONS_FILE: &str = "SYNC_INSTRUCTIONS.md";
pub const CONFIG_FILE: &str = ".sync-report.json";

// git
pub const FETCH_TIMEOUT_SECS: u64 = 60;

// report
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// exit codes
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CHANGES_FOUND: i32 = 2;
