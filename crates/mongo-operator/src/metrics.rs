//! Prometheus metrics and the `/metrics`, `/healthz`, `/readyz` endpoint.

use std::sync::LazyLock;

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, TextEncoder};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

static RECONCILIATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "mongo_operator_reconciliations_total",
            "Reconciliations by lifecycle phase and result",
        ),
        &["phase", "result"],
    )
    .expect("metric can be created");
    prometheus::register(Box::new(counter.clone())).expect("metric can be registered");
    counter
});

static RECONCILE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    let hist = Histogram::with_opts(HistogramOpts::new(
        "mongo_operator_reconciliation_duration_seconds",
        "Duration of one reconciliation pass in seconds",
    ))
    .expect("metric can be created");
    prometheus::register(Box::new(hist.clone())).expect("metric can be registered");
    hist
});

static RESOURCE_OPERATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "mongo_operator_resource_operations_total",
            "Child resource mutations by kind and operation",
        ),
        &["kind", "operation"],
    )
    .expect("metric can be created");
    prometheus::register(Box::new(counter.clone())).expect("metric can be registered");
    counter
});

pub fn record_reconciliation(phase: &str, result: &str) {
    RECONCILIATIONS.with_label_values(&[phase, result]).inc();
}

pub fn observe_reconcile_duration(duration_secs: f64) {
    RECONCILE_DURATION.observe(duration_secs);
}

/// Count a create/update/delete issued against a child resource.
pub fn record_resource_operation(kind: &str, operation: &str) {
    RESOURCE_OPERATIONS
        .with_label_values(&[kind, operation])
        .inc();
}

fn encode_metrics() -> Result<Vec<u8>, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    Ok(buffer)
}

/// Status line, content type and body for a request path.
fn route(path: &str) -> (&'static str, &'static str, Vec<u8>) {
    match path {
        "/metrics" => match encode_metrics() {
            Ok(data) => ("200 OK", "text/plain; version=0.0.4; charset=utf-8", data),
            Err(e) => (
                "500 Internal Server Error",
                "text/plain",
                e.to_string().into_bytes(),
            ),
        },
        "/healthz" | "/readyz" => ("200 OK", "text/plain", b"ok".to_vec()),
        _ => ("404 Not Found", "text/plain", b"not found".to_vec()),
    }
}

async fn handle(mut stream: TcpStream) -> std::io::Result<()> {
    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..n]);
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");

    let (status, content_type, body) = route(path);
    let header = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(&body).await
}

/// Serve metrics and health checks on `addr` until the task is dropped. Fails only
/// if the address cannot be bound.
pub async fn serve(addr: String) -> std::io::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "Metrics server listening");

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tokio::spawn(async move {
                    if let Err(e) = handle(stream).await {
                        debug!(%peer, error = %e, "Metrics request failed");
                    }
                });
            }
            Err(e) => error!(error = %e, "Failed to accept metrics connection"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_reconciliation() {
        record_reconciliation("apply", "success");
        record_reconciliation("apply", "error");

        let val = RECONCILIATIONS
            .with_label_values(&["apply", "success"])
            .get();
        assert!(val >= 1);
    }

    #[test]
    fn test_record_resource_operation() {
        record_resource_operation("Service", "create");
        let val = RESOURCE_OPERATIONS
            .with_label_values(&["Service", "create"])
            .get();
        assert!(val >= 1);
    }

    #[test]
    fn test_routes() {
        observe_reconcile_duration(0.25);
        let (status, _, body) = route("/metrics");
        assert_eq!(status, "200 OK");
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("mongo_operator_reconciliation_duration_seconds"));

        assert_eq!(route("/healthz").0, "200 OK");
        assert_eq!(route("/readyz").2, b"ok");
        assert_eq!(route("/nope").0, "404 Not Found");
    }
}
