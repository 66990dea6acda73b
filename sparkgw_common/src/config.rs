//! Configuration shared by the gateway and the manager.

use ::std::{fs::File, io::BufReader, path::Path};

use ::anyhow::anyhow;
use ::clap::Parser;
use ::serde::{de::DeserializeOwned, Deserialize};
use ::serde_json::from_reader;

use crate::error::{GatewayError, Result};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
/// Command line arguments for the gateway and the manager.
pub struct Args {
    /// path to the config file
    #[arg(long)]
    pub config_path: String,
}

impl Args {
    /// helper function for exporting the `clap::Parser::parse` function
    pub fn parse_args() -> Self {
        Args::parse()
    }
}

/// User name and password, of the database root user or of the gateway towards a manager.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Where the submission ledger lives.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub credentials: Option<Credentials>,
    /// `mem://` for an embedded in-memory database, `ws://host:port` for a SurrealDB server.
    pub uri: String,
}

/// Load a JSON configuration file.
pub fn load_config<C: DeserializeOwned>(path: impl AsRef<Path>) -> Result<C> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        GatewayError::internal(anyhow!("Failed to open config {}: {}", path.display(), e))
    })?;
    let reader = BufReader::new(file);
    from_reader(reader).map_err(|e| {
        GatewayError::internal(anyhow!("Failed to load config {}: {}", path.display(), e))
    })
}
