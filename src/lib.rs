//! Macro USD Bot
//!
//! Scores US macroeconomic releases against consensus into a USD bias
//! reading, broadcasts it on Telegram and tracks its hit rate against DXY.

pub mod bot;
pub mod config;
pub mod error;
pub mod ingester;
pub mod notify;
pub mod scheduler;
pub mod scoring;
pub mod storage;
pub mod tracker;
