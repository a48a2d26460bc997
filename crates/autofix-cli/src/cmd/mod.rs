pub mod config;
pub mod exec;
pub mod fix;
pub mod run;
