use std::io::ErrorKind;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::net::TcpListener;

use docpipe::config::{self, Config};
use docpipe::ingest::IngestService;
use docpipe::{api, logging};

/// Ports tried in order when `SERVER_PORT` is not set.
const FALLBACK_PORTS: std::ops::RangeInclusive<u16> = 4700..=4799;

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();
    let config = config::get_config();

    let service =
        IngestService::from_config(config).expect("Failed to build ingestion pipeline");
    // Provision eagerly so the first request does not pay for it; per-request
    // ensures still converge when the store comes up later.
    if let Err(error) = service.ensure_collection(None).await {
        tracing::warn!(error = %error, "Startup collection provisioning failed; will retry per request");
    }
    let app = api::create_router(Arc::new(service));

    let (listener, port) = bind_listener(config).await.expect("Failed to bind listener");
    tracing::info!(port, "docpipe HTTP server listening");
    axum::serve(listener, app).await.unwrap();
}

/// Bind the configured port, or walk the fallback range until a port is free.
async fn bind_listener(config: &Config) -> std::io::Result<(TcpListener, u16)> {
    if let Some(port) = config.server_port {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
        return Ok((listener, port));
    }

    for port in FALLBACK_PORTS {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => return Ok((listener, port)),
            Err(err) if err.kind() == ErrorKind::AddrInUse => continue,
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        ErrorKind::AddrNotAvailable,
        "every fallback port between 4700 and 4799 is taken",
    ))
}
