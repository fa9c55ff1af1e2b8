// CLI module for cachegate
// Author: kelexine (https://github.com/kelexine)

use clap::Parser;

/// cachegate - caching and cost-accounting proxy for the OpenAI API
#[derive(Parser, Debug)]
#[command(name = "cachegate", version, about, long_about = None)]
pub struct Args {
    /// Configuration file (default: ~/.cachegate/config.toml)
    #[arg(long, short = 'c')]
    pub config: Option<String>,

    /// Cache database path, overrides `store.path`
    #[arg(long, env = "CACHEGATE_DB")]
    pub db: Option<String>,

    /// Port to listen on, overrides `server.port`
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Print the usage ledger summary and exit
    #[arg(long)]
    pub report: bool,
}
