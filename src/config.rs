use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "vgsales-report")]
#[command(about = "Reporting API over the video game sales database")]
pub struct Args {
    /// Address to listen on; a bare `:port` binds every interface.
    #[arg(long, default_value = ":7070")]
    pub listen: String,
    #[arg(long, default_value = "vgsales.duckdb")]
    pub db_path: String,
    /// Directory of `<table>.csv` files loaded into empty tables at startup.
    #[arg(long)]
    pub seed_dir: Option<PathBuf>,
    /// Directory that receives a CSV snapshot of every table at startup.
    #[arg(long)]
    pub export_dir: Option<PathBuf>,
    /// Rows returned by table reports when `limit` is absent.
    #[arg(long, default_value_t = 10)]
    pub default_limit: u32,
    /// Largest `limit` a request may ask for.
    #[arg(long, default_value_t = 1000)]
    pub max_limit: u32,
}

/// Settings the request handlers read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 1000,
        }
    }
}

impl From<&Args> for ReportConfig {
    fn from(args: &Args) -> Self {
        let max_limit = args.max_limit.max(1);
        Self {
            default_limit: args.default_limit.clamp(1, max_limit),
            max_limit,
        }
    }
}

pub fn normalize_listen_addr(listen: &str) -> Result<SocketAddr, anyhow::Error> {
    if listen.starts_with(':') {
        let normalized = format!("0.0.0.0{}", listen);
        return normalized
            .parse()
            .with_context(|| format!("invalid listen address {}", listen));
    }
    listen
        .parse()
        .with_context(|| format!("invalid listen address {}", listen))
}
