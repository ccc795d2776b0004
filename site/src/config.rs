use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use debinfo::config::Config;
use debinfo::error::ConfigError;
use debinfo::logging::LoggingArgs;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Path to the configuration file.
    #[arg(long, env = "DEBINFO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long)]
    pub listen_address: Option<IpAddr>,

    /// Port to listen on.
    #[arg(long)]
    pub port: Option<u16>,

    #[clap(flatten)]
    pub logging: LoggingArgs,
}

impl Args {
    /// Settings from the configuration file, the environment and then the
    /// command line, in increasing order of precedence.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        config.apply_env()?;
        if let Some(address) = self.listen_address {
            config.listen_address.set_ip(address);
        }
        if let Some(port) = self.port {
            config.listen_address.set_port(port);
        }
        config.validate()?;
        Ok(config)
    }
}
