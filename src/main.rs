use clap::Parser;
use quillpost::cli::{Args, build_config, init_logging, load_signing_secrets, open_database};
use quillpost::run_server;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    if args.dev {
        warn!("Running in development mode");
    }

    let Some(secrets) = load_signing_secrets(&args) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap_or_else(|e| {
        error!(error = %e, "Failed to get local address");
        std::process::exit(1);
    });

    let config = build_config(db, secrets, &args);

    info!(
        address = %local_addr,
        access_ttl = config.lifetimes.access_secs,
        refresh_ttl = config.lifetimes.refresh_secs,
        "Listening"
    );

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
