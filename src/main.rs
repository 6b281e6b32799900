use anyhow::{Context, Result};
use cvault::{
    api,
    auth::password::PasswordService,
    cli::{Cli, Commands},
    utils::toml_config::{AppConfig, LogFormat, PasswordConfig},
    AppState,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; real deployments set the environment directly
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();

    match cli.command() {
        Commands::Serve => serve(&cli).await,
        Commands::Config { full, validate } => show_config(&cli, *full, *validate),
        Commands::HashPassword { password } => hash_password(&cli, password),
    }
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "cvault={level},cvault_server={level},tower_http={level}"
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(cli: &Cli) -> Result<()> {
    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.server.log_level.as_str()
    };
    init_tracing(level, config.server.log_format);

    info!("Starting cvault-server v{}", env!("CARGO_PKG_VERSION"));

    let addr = config.server.bind_addr();
    let sweep_every = config.auth.sweep_interval();

    let state = AppState::from_config(config).context("building application state")?;
    if state.bootstrap_admin().await? {
        info!("Initial SYSADMIN account is ready");
    }

    let sweeper = state.codes.spawn_sweeper(sweep_every);
    info!(
        "Access table: {} rules, default {}",
        state.policy.rules().len(),
        state.policy.default_requirement()
    );

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}

fn show_config(cli: &Cli, full: bool, validate: bool) -> Result<()> {
    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if validate {
        println!("Configuration OK: {}", cli.config.display());
    }

    if full {
        // Only env var names are stored, never the secrets themselves
        println!("{}", toml::to_string_pretty(&config)?);
    } else if !validate {
        println!("Config file:  {}", cli.config.display());
        println!("Listen:       {}", config.server.bind_addr());
        println!("Token TTL:    {}s", config.auth.token_ttl_secs);
        println!("Code TTL:     {}s", config.auth.code_ttl_secs);
        println!("Access rules: {}", config.access.rules.len());
    }

    Ok(())
}

fn hash_password(cli: &Cli, password: &str) -> Result<()> {
    // Use the server's cost parameters when a valid config is at hand
    let params = AppConfig::load(&cli.config)
        .map(|c| c.auth.password)
        .unwrap_or_else(|_| PasswordConfig::default());

    let service = PasswordService::new(&params)?;
    println!("{}", service.hash(password)?);
    Ok(())
}
