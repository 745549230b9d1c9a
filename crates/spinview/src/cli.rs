use clap::{Parser, ValueEnum};
use spinview_core::{FixtureSet, ServerConfig};
use std::path::PathBuf;

/// Which dataset variant to serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Variant {
    /// All series, session records and the /rtt_data script
    Full,
    /// RTT and L-RTT only; no /demo or /rtt_data
    Minimal,
}

#[derive(Debug, Parser)]
#[command(
    name = "spinview",
    version,
    about = "Serve RTT measurement fixtures and the latency visualizer page"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "SPINVIEW_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "SPINVIEW_HOSTNAME", default_value = "0.0.0.0")]
    pub hostname: String,

    /// Directory holding index.html, rtt_data.js and css/
    #[arg(short, long, env = "SPINVIEW_ROOT", default_value = "visualizer")]
    pub root: PathBuf,

    /// Fixture dataset to serve
    #[arg(long, env = "SPINVIEW_VARIANT", value_enum, default_value_t = Variant::Full)]
    pub variant: Variant,

    /// Runtime worker threads (defaults to the number of CPUs)
    #[arg(long, env = "SPINVIEW_WORKERS")]
    pub workers: Option<usize>,

    /// Log filter, e.g. "info" or "spinview_core=debug"
    #[arg(long, env = "SPINVIEW_LOG", default_value = "info")]
    pub log: String,
}

impl Args {
    pub fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new()
            .hostname(self.hostname.clone())
            .port(self.port)
            .root(self.root.clone());

        if let Some(workers) = self.workers {
            config = config.workers(workers);
        }
        if self.variant == Variant::Minimal {
            config = config.rtt_script(None);
        }
        config
    }

    pub fn fixtures(&self) -> FixtureSet {
        match self.variant {
            Variant::Full => FixtureSet::full(),
            Variant::Minimal => FixtureSet::minimal(),
        }
    }
}
