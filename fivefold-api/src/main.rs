use std::error::Error;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fivefold_api::{router, AppStateInner, Args};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let state = AppStateInner::new(args.event_buffer);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    tracing::info!(address = %listener.local_addr()?, "Fivefold API listening");
    axum::serve(listener, app).await?;

    Ok(())
}
