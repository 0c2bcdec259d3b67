pub mod config;
pub mod list;
pub mod show;
pub mod stats;

pub use config::ConfigCommand;
pub use list::ListCommand;
pub use show::ShowCommand;
pub use stats::StatsCommand;
