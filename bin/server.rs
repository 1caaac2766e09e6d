// People Import - Web Server
// Upload form, browse page and JSON API with Axum

use anyhow::{Context, Result};
use clap::Parser;
use people_import::config::{GeoSource, ServerConfig};
use people_import::web::{build_router, AppState};
use people_import::{count_people, open_connection, GeoService, IbgeClient, RegionSource, StaticRegions};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("people_import=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::parse();

    println!("🚀 People Import - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = open_connection(&config.db_path)?;
    if count_people(&conn).is_err() {
        eprintln!("❌ No people table in {}", config.db_path.display());
        eprintln!("   Run: people-import --db {} init-db", config.db_path.display());
        std::process::exit(1);
    }
    drop(conn);
    println!("✓ Database opened: {}", config.db_path.display());

    std::fs::create_dir_all(&config.upload_dir)
        .with_context(|| format!("Failed to create upload dir {}", config.upload_dir.display()))?;

    let source: Box<dyn RegionSource> = match config.geo_source {
        GeoSource::Ibge => Box::new(IbgeClient::new()?),
        GeoSource::Static => Box::new(StaticRegions),
    };
    info!(geo_source = ?config.geo_source, "Geographic source selected");

    let state = AppState {
        db_path: Arc::new(config.db_path.clone()),
        upload_dir: Arc::new(config.upload_dir.clone()),
        geo: Arc::new(GeoService::with_default_ttl(source)),
    };
    let app = build_router(state, config.max_upload_bytes);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    println!("\n🚀 Server running on http://localhost:{}", config.port);
    println!("   API:    http://localhost:{}/api/people", config.port);
    println!("   Upload: http://localhost:{}", config.port);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;
    Ok(())
}
