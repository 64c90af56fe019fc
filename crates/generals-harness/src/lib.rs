//! Harness around the OM(m) core
//!
//! Everything `generals-om` deliberately leaves to its caller:
//!
//! - **Lifecycle**: one tokio task per general, aborted on a failed run
//! - **Evaluation**: majority decision over the reporter's collected output
//! - **Scenarios**: loyalty, reporter, commander and order for one run
//!
//! # Example
//!
//! ```no_run
//! use generals_harness::{parse_loyalty, Scenario};
//! use generals_om::{GeneralId, Order};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let loyalty = parse_loyalty("LLLT")?;
//!     let outcome = Scenario::new(loyalty, GeneralId(1), GeneralId(0), Order::Attack)
//!         .run()
//!         .await?;
//!     println!("{outcome}");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod scenario;
pub mod verdict;

pub use error::{Error, Result};
pub use scenario::{parse_loyalty, spawn_generals, Outcome, Scenario};
pub use verdict::{decide, tally, Tally};
