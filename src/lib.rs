pub mod bench;
pub mod cdp;
pub mod config;
pub mod driver;
pub mod flow;
pub mod harness;
pub mod metrics;
pub mod prompt;
pub mod report;
pub mod tokens;

// Re-export common items
pub use config::{Environment, RunSettings, SiteVersion, Timeouts};
pub use flow::FlowOutcome;
pub use metrics::PageMetrics;
