use clap::{Args, Parser, Subcommand, ValueEnum};
use linkshelf_core::{SortBy, SortOrder};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DATA_DIR_ENV: &str = "LINKSHELF_DATA_DIR";
pub const USER_ENV: &str = "LINKSHELF_USER";
pub const LOG_FORMAT_ENV: &str = "LINKSHELF_LOG_FORMAT";
pub const METADATA_ENDPOINT_ENV: &str = "LINKSHELF_METADATA_ENDPOINT";
pub const REMOTE_STORE_ENV: &str = "LINKSHELF_REMOTE_STORE";
pub const REDIS_URL_ENV: &str = "LINKSHELF_REDIS_URL";
pub const SLOW_AFTER_MS_ENV: &str = "LINKSHELF_SLOW_AFTER_MS";
pub const HARD_TIMEOUT_MS_ENV: &str = "LINKSHELF_HARD_TIMEOUT_MS";

pub const DEFAULT_DATA_DIR: &str = ".linkshelf";
pub const DEFAULT_USER: &str = "local";
pub const DEFAULT_METADATA_ENDPOINT: &str = "http://127.0.0.1:8787/metadata";
pub const DEFAULT_SLOW_AFTER_MS: u64 = 3_000;
pub const DEFAULT_HARD_TIMEOUT_MS: u64 = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RemoteStoreArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "redis")]
    Redis,
}

impl Display for RemoteStoreArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteStoreArg::InMemory => write!(f, "in-memory"),
            RemoteStoreArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "linkshelf", version, about = "Browse a saved-link collection")]
pub struct CLI {
    /// Directory holding the device-local caches.
    #[arg(long, global = true, env = DATA_DIR_ENV, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// User whose sort cache and preferences are used.
    #[arg(long, global = true, env = USER_ENV, default_value = DEFAULT_USER)]
    pub user: String,

    #[arg(
        long,
        global = true,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormatArg::Text
    )]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print a collection in display order, optionally filtered.
    View(ViewArgs),
    /// Resolve link previews through the local cache, the remote store and
    /// the metadata service.
    Preview(PreviewArgs),
}

#[derive(Debug, Args)]
pub struct ViewArgs {
    /// JSON file containing an array of link records.
    #[arg(long)]
    pub collection: PathBuf,

    /// Defaults to the stored preference.
    #[arg(long)]
    pub sort_by: Option<SortBy>,

    /// Defaults to the stored preference.
    #[arg(long)]
    pub order: Option<SortOrder>,

    #[arg(long, default_value = "")]
    pub query: String,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[arg(required = true)]
    pub urls: Vec<String>,

    #[arg(long, env = METADATA_ENDPOINT_ENV, default_value = DEFAULT_METADATA_ENDPOINT)]
    pub metadata_endpoint: String,

    #[arg(
        long,
        env = REMOTE_STORE_ENV,
        value_enum,
        default_value_t = RemoteStoreArg::InMemory
    )]
    pub remote: RemoteStoreArg,

    #[arg(long, env = REDIS_URL_ENV, required_if_eq("remote", "redis"))]
    pub redis_url: Option<String>,

    #[arg(long, env = SLOW_AFTER_MS_ENV, default_value_t = DEFAULT_SLOW_AFTER_MS)]
    pub slow_after_ms: u64,

    #[arg(long, env = HARD_TIMEOUT_MS_ENV, default_value_t = DEFAULT_HARD_TIMEOUT_MS)]
    pub hard_timeout_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_view_command() {
        let cli = CLI::try_parse_from([
            "linkshelf",
            "view",
            "--collection",
            "links.json",
            "--sort-by",
            "alphabetical",
            "--order",
            "asc",
            "--query",
            "rust book",
        ])
        .unwrap();

        let Command::View(args) = cli.command else {
            panic!("expected view command");
        };
        assert_eq!(args.sort_by, Some(SortBy::Alphabetical));
        assert_eq!(args.order, Some(SortOrder::Asc));
        assert_eq!(args.query, "rust book");
    }

    #[test]
    fn view_sort_flags_are_optional() {
        let cli = CLI::try_parse_from(["linkshelf", "view", "--collection", "links.json"]).unwrap();
        let Command::View(args) = cli.command else {
            panic!("expected view command");
        };
        assert_eq!(args.sort_by, None);
        assert_eq!(args.order, None);
        assert_eq!(args.query, "");
    }

    #[test]
    fn rejects_unknown_sort_key() {
        assert!(CLI::try_parse_from([
            "linkshelf",
            "view",
            "--collection",
            "links.json",
            "--sort-by",
            "random",
        ])
        .is_err());
    }

    #[test]
    fn redis_remote_requires_url() {
        assert!(CLI::try_parse_from([
            "linkshelf",
            "preview",
            "--remote",
            "redis",
            "https://a.com",
        ])
        .is_err());

        let cli = CLI::try_parse_from([
            "linkshelf",
            "preview",
            "--remote",
            "redis",
            "--redis-url",
            "redis://127.0.0.1:6379",
            "https://a.com",
        ])
        .unwrap();
        let Command::Preview(args) = cli.command else {
            panic!("expected preview command");
        };
        assert_eq!(args.remote, RemoteStoreArg::Redis);
        assert_eq!(args.urls, ["https://a.com"]);
        assert_eq!(args.hard_timeout_ms, DEFAULT_HARD_TIMEOUT_MS);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = CLI::try_parse_from([
            "linkshelf",
            "preview",
            "https://a.com",
            "--user",
            "alice",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.user, "alice");
        assert_eq!(cli.log_format, LogFormatArg::Json);
    }
}
