//! Board file discovery
//!
//! Without an explicit `--board`, the board file is looked up as
//! [BOARD_FILE] in the current directory, then in its parent, and finally in
//! the user's configuration directory.

use std::{
    env::current_dir,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::debug;

use crate::{board::BoardConfig, Error};

/// Name of the board file searched for
pub const BOARD_FILE: &str = "avrfuse.toml";

/// Load the board file at `path`, or the one found by [find_config_path]
pub fn load_board(path: Option<&Path>) -> Result<BoardConfig, Error> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => find_config_path(BOARD_FILE)?,
    };
    debug!("Loading board file {}", path.display());

    BoardConfig::load(path)
}

/// Find `filename` in the current directory, its parent or the global
/// configuration directory
///
/// The global location is returned even if it doesn't exist, so a missing
/// file is reported with the last place searched.
pub fn find_config_path(filename: &str) -> Result<PathBuf, Error> {
    let cwd = current_dir()?;

    let local_config = cwd.join(filename);
    if local_config.exists() {
        return Ok(local_config);
    }
    if let Some(parent_folder) = cwd.parent() {
        let workspace_config = parent_folder.join(filename);
        if workspace_config.exists() {
            return Ok(workspace_config);
        }
    }

    match ProjectDirs::from("rs", "avr", "avrfuse") {
        Some(project_dirs) => Ok(project_dirs.config_dir().join(filename)),
        None => Ok(local_config),
    }
}
