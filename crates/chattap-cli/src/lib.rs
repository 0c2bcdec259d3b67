pub mod commands;
pub mod document;
pub mod error;
pub mod output;

pub use commands::{ConfigCommand, ListCommand, ShowCommand, StatsCommand};
pub use document::load_document;
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, format_timestamp, parse_timestamp, truncate_string};
