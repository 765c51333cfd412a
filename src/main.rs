use csv_import_mcp::{server::http_router, AppConfig, AppState, Backends, CsvImporterServer};
use rmcp::{transport::stdio, ServiceExt};
use std::env;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load_or_default(Some("config.toml"));

    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive(format!("csv_import_mcp={}", config.logging.level).parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = env::args().collect();

    tracing::info!("Loaded configuration: {:?}", config.server.name);

    let backends = Backends::from_config(&config)?;

    if args.len() > 1 && args[1] == "--http" {
        let port = args
            .get(2)
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(9528);

        let bind_addr = args.get(3).map(|s| s.as_str()).unwrap_or("0.0.0.0");

        run_http_server(backends, bind_addr, port).await?;
    } else {
        tracing::info!("Starting MCP Server on stdio");
        let server = CsvImporterServer::new(AppState::new(config), backends);
        let service = server.serve(stdio()).await?;
        service.waiting().await?;
    }

    tracing::info!("MCP Server shutting down");
    Ok(())
}

async fn run_http_server(backends: Backends, bind_addr: &str, port: u16) -> anyhow::Result<()> {
    let app = http_router(backends);

    let addr = format!("{}:{}", bind_addr, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("HTTP Server listening on http://{}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health    - Health check");
    tracing::info!("  GET  /info      - Server info");
    tracing::info!("  POST /validate  - Validate CSV headers");
    tracing::info!("Example:");
    tracing::info!("  curl -X POST http://{}/validate -H 'Content-Type: application/json' -d '{{\"object_api_name\": \"Contact\", \"file_name\": \"c.csv\", \"content\": \"Name,Email\"}}'", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
