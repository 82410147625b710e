use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use coolapk1s::config::Config;
use coolapk1s::server::{serve_or_500, App};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();

    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(err) => {
            warn!("metrics recorder not installed: {}", err);
            None
        }
    };

    let listener = TcpListener::bind(config.addr).await?;
    info!("Listening on {}", config.addr);

    let app = App::new(&config, metrics);

    loop {
        let (stream, _) = listener.accept().await?;

        // Use an adapter to access something implementing `tokio::io` traits as if they implement
        // `hyper::rt` IO traits.
        let io = TokioIo::new(stream);

        let app_copy = app.clone();

        tokio::task::spawn(async move {
            if let Err(err) = http1::Builder::new()
                .serve_connection(io, service_fn(|req| serve_or_500(&app_copy, req)))
                .await
            {
                error!("Error serving connection: {:?}", err);
            }
        });
    }
}
