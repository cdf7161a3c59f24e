use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::error::{GovexError, Result};
use crate::execution::ExecutionEngine;

/// Serve the invocation API until `shutdown` resolves.
pub async fn start_api_server<F>(
    engine: Arc<ExecutionEngine>,
    host: &str,
    port: u16,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(AppState::new(engine));

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| GovexError::Validation(format!("invalid listen address {host}:{port}: {e}")))?;
    info!("API server listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("API server stopped");
    Ok(())
}
