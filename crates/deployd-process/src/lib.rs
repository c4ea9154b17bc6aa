//! # deployd-process
//!
//! Spawns external commands, captures their stdout/stderr as raw bytes,
//! enforces per-process timeouts and kills the whole process tree when a
//! command overruns.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use deployd_process::{ProcessConfig, ProcessManager};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ProcessManager::new();
//!
//! let config = ProcessConfig::new("./scripts/deploy.sh")
//!     .args(["--env", "prod"])
//!     .env("DEPLOYD_ENVIRONMENT", "prod")
//!     .timeout(Duration::from_secs(600));
//!
//! let output = manager.run(config).await?;
//! println!("exit code: {:?}", output.code());
//! # Ok(())
//! # }
//! ```

pub mod child;
pub mod config;
pub mod error;
pub mod manager;

pub use child::{ManagedChild, ProcessOutput, TERM_GRACE};
pub use config::ProcessConfig;
pub use error::{ProcessError, Result};
pub use manager::ProcessManager;
