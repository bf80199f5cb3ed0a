use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use reelcache_server::{ServerConfig, ServerState, server};
use std::io;
use std::sync::Arc;
use tower::Service;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reelcache_server=debug,hyper=info".into()),
        )
        .init();

    // REELCACHE_PUBLIC_DIR, REELCACHE_BIND_ADDR, REELCACHE_ROUTE_PREFIX
    let config = ServerConfig::from_env();
    let state = Arc::new(ServerState::from_config(&config)?);

    // Create and run the server
    let app = server::create_app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(
        "Reelcache server listening on http://{}{} (HTTP/1.1 + HTTP/2)",
        config.bind_addr, config.route_prefix
    );
    info!("Public directory: {}", config.public_dir.display());

    // Use hyper's auto-negotiating server to support both HTTP/1.1 and HTTP/2
    let conn_builder = ConnBuilder::new(hyper_util::rt::TokioExecutor::new());

    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                error!("Failed to accept connection: {}", err);
                continue;
            }
        };
        debug!("New connection from: {}", addr);
        let io = TokioIo::new(stream);
        let app_clone = app.clone();
        let conn_builder = conn_builder.clone();

        tokio::spawn(async move {
            if let Err(err) = conn_builder
                .serve_connection(
                    io,
                    hyper::service::service_fn(move |req| app_clone.clone().call(req)),
                )
                .await
            {
                // Clients routinely abort video downloads after seeking
                let is_normal_close = err
                    .source()
                    .and_then(|e| e.downcast_ref::<io::Error>())
                    .map(|io_err| {
                        matches!(
                            io_err.kind(),
                            io::ErrorKind::ConnectionReset
                                | io::ErrorKind::BrokenPipe
                                | io::ErrorKind::UnexpectedEof
                        )
                    })
                    .unwrap_or(false);

                if is_normal_close {
                    debug!("Connection from {} closed normally", addr);
                } else {
                    error!("Error serving connection from {}: {}", addr, err);
                }
            } else {
                debug!("Connection from {} completed successfully", addr);
            }
        });
    }
}
