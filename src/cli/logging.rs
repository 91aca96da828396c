use std::io::Write;

use env_logger::{Builder, Env};
use log::LevelFilter;

/// Initialize the logger with the given [LevelFilter]
///
/// `RUST_LOG` still takes precedence, so individual modules can be filtered.
pub fn initialize_logger(filter: LevelFilter) {
    Builder::new()
        .filter_level(filter)
        .parse_env(Env::new().filter("RUST_LOG"))
        .format(|buf, record| {
            let style = buf.default_level_style(record.level());

            writeln!(
                buf,
                "[{style}{}{style:#}] {}",
                record.level(),
                record.args()
            )
        })
        .init();
}
