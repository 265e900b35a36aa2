use score_relay::api::router::create_router;
use score_relay::api::state::AppState;
use score_relay::config::AppConfig;

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env();

    // Handle --health-check flag for Docker HEALTHCHECK (works in scratch image).
    if std::env::args().any(|a| a == "--health-check") {
        match health_check(&config).await {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                eprintln!("Health check failed: {e}");
                std::process::exit(1);
            }
        }
    }

    // Initialize tracing (structured logging).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "score_relay=info,tower_http=info".into()),
        )
        .init();

    let bind_addr = config.bind_addr();
    tracing::info!(
        allowed_origin = %config.allowed_origin,
        honor_leave = config.honor_leave,
        heartbeat_interval = ?config.heartbeat_interval,
        client_timeout = ?config.client_timeout,
        "relay configured"
    );

    let app = create_router(AppState::new(config));
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");
    tracing::info!(
        "score-relay v{} listening on {bind_addr}",
        env!("CARGO_PKG_VERSION")
    );

    axum::serve(listener, app).await.expect("Server error");
}

/// Query the running relay's `/health` endpoint over plain HTTP/1.1 and
/// require a 200 within the client timeout.
async fn health_check(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let addr = config.health_check_addr();
    let exchange = async {
        let mut stream = tokio::net::TcpStream::connect(&addr).await?;
        let request = format!("GET /health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await?;
        let mut status_line = Vec::with_capacity(64);
        let mut buf = [0u8; 256];
        while !status_line.contains(&b'\n') {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            status_line.extend_from_slice(&buf[..n]);
        }
        Ok::<_, std::io::Error>(status_line)
    };

    let response = tokio::time::timeout(config.client_timeout, exchange).await??;
    let status = String::from_utf8_lossy(&response);
    let status = status.lines().next().unwrap_or("");
    match status.split_whitespace().nth(1) {
        Some("200") => Ok(()),
        _ => Err(format!("{addr} answered: {status}").into()),
    }
}
