pub mod config;
pub mod contexts;
pub mod run;
pub mod sources;

pub use config::run as config;
pub use contexts::run as contexts;
pub use run::run;
pub use sources::run as sources;

use taskrun_core::Config;

/// Load the config from the default path, or an empty one if it is missing.
pub fn load_config() -> anyhow::Result<Config> {
    Config::load_default()
}
