pub mod backup;
pub mod config;
pub mod error;
pub mod io;
pub mod normalize;
pub mod oracle;
pub mod orchestrator;
pub mod paths;
pub mod process;
pub mod record;
pub mod repair;
pub mod runner;
pub mod store;
pub mod sweep;

pub use error::{AutofixError, Result};
