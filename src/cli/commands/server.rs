use clap::Args;

#[derive(Args, Debug, Clone, Default)]
pub struct ServeCommand {
    /// Bind address (overrides server.host)
    #[arg(long, env = "LEHRBOT_HOST")]
    pub host: Option<String>,

    /// Bind port (overrides server.port)
    #[arg(short, long, env = "LEHRBOT_PORT")]
    pub port: Option<u16>,

    /// Tokio worker threads (overrides server.workers)
    #[arg(short, long)]
    pub workers: Option<usize>,
}
