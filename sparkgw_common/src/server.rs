//! Serving helpers shared by the gateway and the manager: the common layer stack and
//! graceful shutdown.

use ::core::{any::Any, future::IntoFuture, time::Duration};

use ::anyhow::anyhow;
use ::axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use ::tokio::{net::TcpListener, signal, sync::watch, time::timeout};
use ::tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use ::tracing::{error, info, warn};

use crate::error::{GatewayError, Result};

/// Wrap the routes with the layers every server carries, from inner to outer:
/// a per-request deadline, panic recovery and request tracing.
pub fn with_common_layers(router: Router, request_timeout: Duration) -> Router {
    router
        .layer(middleware::from_fn_with_state(request_timeout, deadline))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

/// Abandon the handler once the deadline is exceeded, dropping its in-flight work.
async fn deadline(State(limit): State<Duration>, request: Request, next: Next) -> Response {
    let uri = request.uri().clone();
    match timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!("Request {} exceeded its deadline of {:?}", uri, limit);
            GatewayError::internal(anyhow!("Request timed out after {:?}", limit)).into_response()
        }
    }
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {}", message);
    GatewayError::internal(anyhow!("Internal server error")).into_response()
}

/// Owner side of the process-wide shutdown flag.
#[derive(Debug)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener(self.sender.subscribe())
    }

    /// Ask every listener to stop. Idempotent.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }
}

/// Cloneable handle that background tasks and servers wait on.
#[derive(Debug, Clone)]
pub struct ShutdownListener(watch::Receiver<bool>);

impl ShutdownListener {
    /// Complete once shutdown is triggered, or when the [Shutdown] is dropped.
    pub async fn wait(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }
}

/// Complete on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            ::std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                ::std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = ::std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Serve `router` until shutdown is triggered, then stop accepting connections and give
/// in-flight requests `grace` to finish before returning.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    grace: Duration,
    mut shutdown: ShutdownListener,
) -> Result<()> {
    let mut stop_accepting = shutdown.clone();
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move { stop_accepting.wait().await })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result.map_err(GatewayError::internal),
        _ = shutdown.wait() => {
            info!("Shutting down, waiting up to {:?} for in-flight requests", grace);
        }
    }
    match timeout(grace, server).await {
        Ok(result) => result.map_err(GatewayError::internal),
        Err(_) => {
            warn!("Grace period of {:?} elapsed, dropping remaining connections", grace);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use ::axum::routing::get;
    use ::axum_test::TestServer;
    use ::http::StatusCode;
    use ::serde_json::json;

    use super::*;

    async fn explode() -> &'static str {
        panic!("boom")
    }

    fn test_server() -> TestServer {
        let router = Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .route("/panic", get(explode));
        TestServer::new(with_common_layers(router, Duration::from_millis(50))).unwrap()
    }

    #[tokio::test]
    async fn pass_through() {
        let response = test_server().get("/ok").await;
        response.assert_status_ok();
        response.assert_text("ok");
    }

    #[tokio::test]
    async fn deadline_exceeded_is_internal() {
        let response = test_server().get("/slow").await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        response.assert_json(&json!({"error": "Request timed out after 50ms"}));
    }

    #[tokio::test]
    async fn panic_is_internal() {
        let response = test_server().get("/panic").await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        response.assert_json(&json!({"error": "Internal server error"}));
    }

    #[tokio::test]
    async fn listeners_observe_trigger() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();
        assert!(!listener.is_triggered());
        shutdown.trigger();
        shutdown.trigger();
        listener.wait().await;
        assert!(listener.is_triggered());
        // late subscribers see the flag as well
        shutdown.listener().wait().await;
    }

    #[tokio::test]
    async fn serve_returns_after_shutdown() -> Result<()> {
        let shutdown = Shutdown::new();
        let tcp = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(GatewayError::internal)?;
        let router = Router::new().route("/ok", get(|| async { "ok" }));
        let handle = tokio::spawn(serve(
            tcp,
            router,
            Duration::from_millis(100),
            shutdown.listener(),
        ));
        shutdown.trigger();
        let result = timeout(Duration::from_secs(5), handle)
            .await
            .map_err(GatewayError::internal)?
            .map_err(GatewayError::internal)?;
        assert!(result.is_ok());
        Ok(())
    }
}
