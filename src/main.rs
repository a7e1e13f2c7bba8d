use anyhow::Result;
use casecall::{create_router, AppState, Config, Secrets};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("🎙️  casecall v0.1.0 - Interview Orchestrator");

    // Load configuration and secrets; a missing API key is fatal here
    let config = Config::load("config")?;
    let secrets = Secrets::from_env()?;

    // Create application state
    let app_state = AppState::new(config.clone(), secrets)?;

    // Create HTTP router
    let app = create_router(app_state);

    // Start HTTP server
    let addr = format!(
        "{}:{}",
        config.service.http.bind, config.service.http.port
    );
    info!("🌐 Starting HTTP server on http://{}", addr);
    info!("📋 API endpoints:");
    info!("   POST   /session/init");
    info!("   POST   /session/init-with-lesson");
    info!("   GET    /session/status?session_id=...");
    info!("   DELETE /session/close?session_id=...");
    info!("   WS     /ws/interview/{{session_id}}");
    info!("   GET    /health");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
