use anyhow::Context;
use clap::Parser;
use cms_dashboard::config::{Command, PostCommand, SectionCommand, SubscriberCommand};
use cms_dashboard::core::{render, sections, server};
use cms_dashboard::domain::model::{
    BlogPost, BlogPostPatch, ListQuery, NewBlogPost, NewSubscriber, Subscriber, SubscriberPatch,
};
use cms_dashboard::domain::ports::{ConfigProvider, Transport};
use cms_dashboard::utils::error::ErrorSeverity;
use cms_dashboard::utils::{logger, validation, validation::Validate};
use cms_dashboard::{
    ApiClient, CliConfig, DashboardConfig, DashboardError, HttpTransport, RequestForwarder,
    ResourceStore, Result, SectionStore,
};
use std::sync::Arc;

type SharedTransport = Arc<dyn Transport>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 載入設定檔，再以命令列參數覆寫
    let mut config = match &cli.config {
        Some(path) => match DashboardConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load {}: {}", path.display(), e);
                eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
                std::process::exit(1);
            }
        },
        None => DashboardConfig::default(),
    };
    cli.apply_cli_overrides(&mut config);

    if config.logging.json {
        logger::init_json_logger(&config.logging.level, cli.verbose);
    } else {
        logger::init_cli_logger(&config.logging.level, cli.verbose);
    }

    tracing::info!("Starting cms-dashboard");
    if cli.verbose {
        tracing::debug!("Resolved config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Command::Serve { .. } = cli.command {
        return serve(&config).await;
    }

    if let Err(e) = run_command(&cli.command, &config).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 1,      // 後端拒絕請求
            ErrorSeverity::Medium => 2,   // 網路問題，可重試
            ErrorSeverity::High => 1,     // 輸入錯誤
            ErrorSeverity::Critical => 3, // 設定或系統錯誤
        };
        std::process::exit(exit_code);
    }

    Ok(())
}

async fn serve(config: &DashboardConfig) -> anyhow::Result<()> {
    let forwarder = Arc::new(RequestForwarder::new(config)?);
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!(
        "🚀 Proxy listening on http://{} -> {}",
        listener.local_addr()?,
        forwarder.upstream()
    );
    println!("🚀 Proxy listening on http://{}", listener.local_addr()?);

    server::run(listener, forwarder).await?;
    Ok(())
}

fn build_api(config: &DashboardConfig) -> Result<ApiClient<SharedTransport>> {
    let transport: SharedTransport = match config.proxy_endpoint() {
        Some(endpoint) => {
            tracing::debug!("Routing requests through {}", endpoint);
            Arc::new(HttpTransport::new(endpoint, config.request_timeout())?)
        }
        None => Arc::new(RequestForwarder::new(config)?),
    };
    Ok(ApiClient::new(transport).with_auth_token(config.auth_token().map(str::to_string)))
}

async fn run_command(command: &Command, config: &DashboardConfig) -> Result<()> {
    match command {
        Command::Serve { .. } => Ok(()),
        Command::Posts(cmd) => run_posts(cmd, config).await,
        Command::Subscribers(cmd) => run_subscribers(cmd, config).await,
        Command::Section(cmd) => run_section(cmd, config).await,
    }
}

async fn run_posts(command: &PostCommand, config: &DashboardConfig) -> Result<()> {
    let store: ResourceStore<BlogPost, SharedTransport> = ResourceStore::new(build_api(config)?);

    match command {
        PostCommand::List {
            page,
            limit,
            search,
        } => {
            let mut query = ListQuery::new(*page, limit.unwrap_or(config.page_size()));
            if let Some(search) = search {
                query = query.with_search(search.clone());
            }
            store.fetch_all(&query).await?;
            print!("{}", render::render_post_table(&store.snapshot()));
        }
        PostCommand::Show { id } => {
            let post = store.fetch_one(id).await?;
            print!("{}", render::render_post_detail(&post));
        }
        PostCommand::Create {
            title,
            content,
            slug,
            excerpt,
            author,
            tags,
            cover_image,
            published,
        } => {
            validation::validate_non_empty_string("title", title)?;
            let draft = NewBlogPost {
                title: title.clone(),
                slug: slug.clone(),
                excerpt: excerpt.clone(),
                content: content.clone(),
                author: author.clone(),
                tags: tags.clone(),
                cover_image: cover_image.clone(),
                published: *published,
            };
            let post = store.create(&draft).await?;
            println!("✅ Created post {}", post.id);
            print!("{}", render::render_post_detail(&post));
        }
        PostCommand::Edit {
            id,
            title,
            content,
            slug,
            excerpt,
            author,
            tags,
            cover_image,
            published,
        } => {
            let patch = BlogPostPatch {
                title: title.clone(),
                slug: slug.clone(),
                excerpt: excerpt.clone(),
                content: content.clone(),
                author: author.clone(),
                tags: tags.clone(),
                cover_image: cover_image.clone(),
                published: *published,
            };
            if patch.is_empty() {
                return Err(DashboardError::ValidationError {
                    message: "nothing to update, pass at least one field".to_string(),
                });
            }
            let post = store.update(id, &patch).await?;
            println!("✅ Updated post {}", post.id);
            print!("{}", render::render_post_detail(&post));
        }
        PostCommand::Delete { id } => {
            store.delete(id).await?;
            println!("🗑️  Deleted post {}", id);
        }
    }

    Ok(())
}

async fn run_subscribers(command: &SubscriberCommand, config: &DashboardConfig) -> Result<()> {
    let store: ResourceStore<Subscriber, SharedTransport> = ResourceStore::new(build_api(config)?);

    match command {
        SubscriberCommand::List { page, limit } => {
            let query = ListQuery::new(*page, limit.unwrap_or(config.page_size()));
            store.fetch_all(&query).await?;
            print!("{}", render::render_subscriber_table(&store.snapshot()));
        }
        SubscriberCommand::Add { email, name } => {
            validation::validate_email(email)?;
            let subscriber = store
                .create(&NewSubscriber {
                    email: email.trim().to_string(),
                    name: name.clone(),
                })
                .await?;
            println!("✅ Subscribed {} ({})", subscriber.email, subscriber.id);
        }
        SubscriberCommand::Edit { id, name, active } => {
            let patch = SubscriberPatch {
                name: name.clone(),
                active: *active,
            };
            if patch.name.is_none() && patch.active.is_none() {
                return Err(DashboardError::ValidationError {
                    message: "nothing to update, pass --name or --active".to_string(),
                });
            }
            let subscriber = store.update(id, &patch).await?;
            println!("✅ Updated subscriber {}", subscriber.email);
        }
        SubscriberCommand::Remove { id } => {
            store.delete(id).await?;
            println!("🗑️  Removed subscriber {}", id);
        }
    }

    Ok(())
}

async fn run_section(command: &SectionCommand, config: &DashboardConfig) -> Result<()> {
    let store = SectionStore::new(build_api(config)?);

    match command {
        SectionCommand::Show { key } => {
            store.fetch(key).await?;
        }
        SectionCommand::Set { key, assignments } => {
            let mut content = store.fetch(key).await?.content;
            for assignment in assignments {
                let (path, value) = sections::parse_assignment(assignment)?;
                sections::set_field(&mut content, &path, value)?;
            }
            store.save(key, content).await?;
            println!("✅ Saved section {}", key);
        }
    }

    print!("{}", render::render_section(&store.snapshot()));
    Ok(())
}
