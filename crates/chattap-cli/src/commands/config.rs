use clap::Parser;
use chattap::config::Config;

use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct ConfigCommand {}

impl ConfigCommand {
    /// Print the effective configuration, environment overrides applied
    pub fn execute(&self, config: &Config, format: OutputFormat) -> CliResult<()> {
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
            OutputFormat::Table => {
                println!("# Log file: {}", config.storage.prompts_path().display());
                print!("{}", toml::to_string_pretty(config)?);
            }
        }
        Ok(())
    }
}
