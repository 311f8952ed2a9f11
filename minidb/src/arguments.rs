use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub(crate) struct Args {
    /// Configuration JSON file naming the portal endpoint, the profiles
    /// query and the subsampling strategy
    pub conf_file: PathBuf,

    /// Access key ID on the portal
    #[arg(short, long)]
    pub key: Option<String>,

    /// Secret access key on the portal
    #[arg(short, long)]
    pub secret: Option<String>,

    /// Response cache database location
    #[arg(long, default_value = "~/.cache/minidb/responses.db")]
    pub cache_db: String,

    /// Maximum link expansion depth
    #[arg(long, default_value_t = minidb_core::crawl::DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,

    /// Save the report to a file instead of printing it
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format: text or json
    #[arg(short, long, default_value = "text")]
    pub format: String,

    /// Omit profiles with no retained objects from the report
    #[arg(long)]
    pub hide_empty: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}
