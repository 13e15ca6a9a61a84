pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod formatter;
pub mod history;
pub mod logging;
pub mod models;
pub mod notifier;
pub mod process;
pub mod scheduler;
