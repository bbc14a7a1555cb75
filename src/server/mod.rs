//! Job status service: the HTTP facade decoupling requesting clients from
//! the upstream API's shape and credentials.

mod error;
mod routes;
mod state;

use std::net::SocketAddr;

pub use error::{ApiError, ErrorBody};
pub use routes::{router, JobStatusResponse};
pub use state::AppState;

/// Bind and serve the job status API until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), std::io::Error> {
    let app = router().with_state(state);

    log::info!("job status service listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
