use crate::config::DashboardConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "cms-dashboard")]
#[command(about = "Content dashboard: API proxy and admin screens for blog, newsletter and page sections")]
pub struct CliConfig {
    #[arg(long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Upstream API origin, overrides [upstream] origin")]
    pub upstream: Option<String>,

    #[arg(long, global = true, help = "Send requests through a running dashboard's /api/proxy")]
    pub proxy: Option<String>,

    #[arg(long, global = true, help = "Bearer token forwarded to the upstream API")]
    pub token: Option<String>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit JSON log lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the proxy route
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Blog posts
    #[command(subcommand)]
    Posts(PostCommand),
    /// Newsletter subscriptions
    #[command(subcommand)]
    Subscribers(SubscriberCommand),
    /// Website page sections
    #[command(subcommand)]
    Section(SectionCommand),
}

#[derive(Debug, Clone, Subcommand)]
pub enum PostCommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u64,
        #[arg(long)]
        limit: Option<u64>,
        #[arg(long)]
        search: Option<String>,
    },
    Show {
        id: String,
    },
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        excerpt: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long)]
        cover_image: Option<String>,
        #[arg(long)]
        published: bool,
    },
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        excerpt: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
        #[arg(long)]
        cover_image: Option<String>,
        #[arg(long)]
        published: Option<bool>,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum SubscriberCommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u64,
        #[arg(long)]
        limit: Option<u64>,
    },
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },
    Remove {
        id: String,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum SectionCommand {
    Show {
        key: String,
    },
    /// Edit fields in place, e.g. `title="Welcome"` or `buttons.0.label=Shop`
    Set {
        key: String,
        #[arg(required = true)]
        assignments: Vec<String>,
    },
}

impl CliConfig {
    /// 命令列參數覆寫設定檔
    pub fn apply_cli_overrides(&self, config: &mut DashboardConfig) {
        if let Some(upstream) = &self.upstream {
            config.upstream.origin = upstream.clone();
        }
        if let Some(proxy) = &self.proxy {
            config.client.proxy_endpoint = Some(proxy.clone());
        }
        if let Some(token) = &self.token {
            config.client.auth_token = Some(token.clone());
        }
        if self.json_logs {
            config.logging.json = true;
        }
        if let Command::Serve { bind: Some(bind) } = &self.command {
            config.server.bind = bind.clone();
        }
    }
}
