use chattap::config::Config;
use chattap::store::{StoreDocument, read_document};

use crate::error::{CliError, CliResult};

/// Load the recorded log for the read-only commands.
///
/// Never creates the data directory: pointing the CLI at a wrong path is an
/// error rather than a silently empty listing.
pub fn load_document(config: &Config) -> CliResult<StoreDocument> {
    let data_dir = &config.storage.data_dir;
    if !data_dir.is_dir() {
        return Err(CliError(format!(
            "Data directory {} does not exist",
            data_dir.display()
        )));
    }

    Ok(read_document(&config.storage.prompts_path()))
}
