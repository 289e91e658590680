use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render the static site from the content tree.
    Build(BuildArgs),
    /// Push changed content files to the search engine.
    Index(IndexArgs),
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Root of the YAML/Markdown content tree.
    #[arg(long)]
    pub info: PathBuf,

    /// Root of the media tree holding `.thumbs.yml` sidecars.
    #[arg(long)]
    pub media: PathBuf,

    /// Output directory for the generated site.
    #[arg(long)]
    pub out: PathBuf,

    /// Directory copied verbatim into the output after rendering.
    #[arg(long = "static")]
    pub static_dir: Option<PathBuf>,

    /// Site config (YAML). Defaults apply when omitted or missing.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Name of the gitignore-style file read at the content root.
    #[arg(long, default_value = ".ignore")]
    pub ignore_file: String,

    /// Maximum number of files parsed concurrently.
    #[arg(long, default_value_t = 8)]
    pub workers: usize,
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Root of the YAML content tree.
    #[arg(long)]
    pub info: PathBuf,

    /// Root of the media tree holding `.thumbs.yml` sidecars.
    #[arg(long)]
    pub media: PathBuf,

    /// State file of `path<TAB>sha256` lines from the previous run.
    #[arg(long)]
    pub state: PathBuf,

    /// Search engine base URL.
    #[arg(long, env = "SEARCH_HOST")]
    pub search_host: String,

    /// Search index name.
    #[arg(long, env = "SEARCH_INDEX")]
    pub search_index: String,

    /// Search engine API key (sent as a bearer token).
    #[arg(long, env = "SEARCH_API_KEY", hide_env_values = true)]
    pub search_api_key: Option<String>,

    /// Push files regardless of hashes: `all`, a JSON array, or a comma list.
    #[arg(long, default_value = "")]
    pub force: String,

    /// Name of the gitignore-style file read at the content root.
    #[arg(long, default_value = ".ignore")]
    pub ignore_file: String,
}
