use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;

use campus_hub::app::{build_router, RouterOptions};
use campus_hub::auth::session::derive_key;
use campus_hub::cache::ContentCache;
use campus_hub::config::AppConfig;
use campus_hub::db::ad_repository::MongoAdRepository;
use campus_hub::db::memory::{InMemoryAdRepository, InMemoryListingRepository, InMemoryUserRepository};
use campus_hub::db::repository::MongoListingRepository;
use campus_hub::db::user_repository::MongoUserRepository;
use campus_hub::demo_seeder::seed_demo_data;
use campus_hub::state::{AdminCredentials, AppState};
use campus_hub::storage::client::{CloudinaryImageHost, DisabledImageHost, ImageHost};

#[derive(Debug, Parser)]
#[command(name = "campus-hub", about = "Community listings server", version)]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(long, env = "CONFIG_FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_hub=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    config.validate().map_err(anyhow::Error::msg)?;

    tracing::info!("Starting campus-hub server...");
    if config.uses_default_secret() {
        tracing::warn!("secret_key is the built-in default; set SECRET_KEY before deploying");
    }

    let state = build_state(&config).await?;
    let app = build_router(state, &RouterOptions::from(&config));

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let cache = ContentCache::default();
    let admin = AdminCredentials {
        username: config.admin_username.clone(),
        password: config.admin_password.clone(),
    };
    let cookie_key = derive_key(&config.secret_key);

    let images: Arc<dyn ImageHost> = match config.cloudinary() {
        Some(cloudinary) => {
            tracing::info!(cloud = %cloudinary.cloud_name, "image uploads go to Cloudinary");
            Arc::new(CloudinaryImageHost::new(cloudinary))
        }
        None => {
            tracing::warn!("Cloudinary credentials missing, image uploads are disabled");
            Arc::new(DisabledImageHost)
        }
    };

    if config.demo_mode {
        tracing::info!("demo mode: using in-memory storage");
        let listings = Arc::new(InMemoryListingRepository::new());
        let ads = Arc::new(InMemoryAdRepository::new());
        seed_demo_data(listings.as_ref(), ads.as_ref()).await;

        return Ok(AppState {
            listings,
            users: Arc::new(InMemoryUserRepository::new()),
            ads,
            images,
            cache,
            admin,
            cookie_key,
        });
    }

    let client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .context("failed to create MongoDB client")?;
    let db = client.database(&config.mongo_database);
    tracing::info!(database = %config.mongo_database, "connected to MongoDB");

    let listings = MongoListingRepository::new(&db);
    let users = MongoUserRepository::new(&db);
    let ads = MongoAdRepository::new(&db);

    if let Err(e) = listings.ensure_indexes().await {
        tracing::warn!(error = %e, "failed to create listing indexes");
    }
    if let Err(e) = users.ensure_indexes().await {
        tracing::warn!(error = %e, "failed to create user indexes");
    }
    if let Err(e) = ads.ensure_indexes().await {
        tracing::warn!(error = %e, "failed to create ad indexes");
    }

    Ok(AppState {
        listings: Arc::new(listings),
        users: Arc::new(users),
        ads: Arc::new(ads),
        images,
        cache,
        admin,
        cookie_key,
    })
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping server");
}
