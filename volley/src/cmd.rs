use core::num::NonZero;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

/// HTTP(S) load generator.
///
/// Dispatches concurrent clients that repeatedly issue requests against the
/// given targets, then prints a summary of throughput and failures.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Cmd {
    /// Target URL.
    ///
    /// May contain one template span, for example "{S10,1-100}" for a
    /// sequence or "{R10,1-100}" for random values.
    #[clap(short, long)]
    pub url: Option<String>,
    /// Path to the file with newline-separated target URLs.
    #[clap(short = 'f', long, value_name = "PATH")]
    pub urls_file: Option<PathBuf>,
    /// Number of concurrent clients.
    #[clap(short, long, default_value_t = NonZero::new(100).unwrap_or(NonZero::<usize>::MIN))]
    pub clients: NonZero<usize>,
    /// Number of requests issued by each client.
    #[clap(short, long, conflicts_with = "duration")]
    pub requests: Option<NonZero<u64>>,
    /// Test duration in seconds.
    #[clap(short = 't', long, value_name = "SECS")]
    pub duration: Option<NonZero<u64>>,
    /// Reuse connections between requests.
    #[clap(short, long)]
    pub keep_alive: bool,
    /// Path to the POST body file.
    #[clap(short, long, value_name = "PATH", conflicts_with = "body")]
    pub data: Option<PathBuf>,
    /// POST body.
    #[clap(short, long)]
    pub body: Option<String>,
    /// Content type of the POST body.
    #[clap(long)]
    pub content_type: Option<String>,
    /// Authorization header value.
    #[clap(long)]
    pub auth: Option<String>,
    /// Extra request headers, in "key=value" form, comma-separated.
    #[clap(long, value_delimiter = ',')]
    pub headers: Vec<String>,
    /// Connect timeout in milliseconds.
    #[clap(long, value_name = "MS", default_value_t = 5000)]
    pub tc: u64,
    /// Read timeout in milliseconds.
    #[clap(long, value_name = "MS", default_value_t = 5000)]
    pub tr: u64,
    /// Write timeout in milliseconds.
    #[clap(long, value_name = "MS", default_value_t = 5000)]
    pub tw: u64,
    /// Number of threads.
    ///
    /// Clients are distributed evenly among threads. Never exceeds the number
    /// of clients.
    #[clap(long, default_value_t = std::thread::available_parallelism().unwrap_or(NonZero::<usize>::MIN))]
    pub threads: NonZero<usize>,
    /// Enable TCP_NODELAY socket option.
    #[clap(long)]
    pub tcp_no_delay: bool,
    /// Seed for random URL templates.
    ///
    /// Makes the generated target set reproducible.
    #[clap(long)]
    pub seed: Option<u64>,
    /// Report format.
    #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
    /// Be verbose in terms of logging.
    #[clap(short, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table.
    Text,
    /// Pretty-printed JSON object.
    Json,
}
