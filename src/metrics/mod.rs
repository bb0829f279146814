/// Prometheus metrics for the complaint intelligence service.
///
/// Covers HTTP traffic, inference operations, the embedding cache and artifact loading.
///
/// # Example
/// ```no_run
/// use complaint_intel::metrics::INFERENCE_REQUESTS_TOTAL;
///
/// INFERENCE_REQUESTS_TOTAL
///     .with_label_values(&["classify", "ok"])
///     .inc();
/// ```

mod middleware;

pub use middleware::{MetricsLayer, MetricsService};

use lazy_static::lazy_static;
use prometheus::{
    core::Collector, CounterVec, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
};

const NAMESPACE: &str = "complaint_intel";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // HTTP Metrics
    // ============================================================================

    /// Total number of HTTP requests received
    ///
    /// Labels: method, path, status_code
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace(NAMESPACE),
        &["method", "path", "status_code"]
    ).expect("Failed to create HTTP_REQUESTS_TOTAL metric");

    /// HTTP request duration in seconds
    ///
    /// Labels: method, path
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric");

    // ============================================================================
    // Inference Metrics
    // ============================================================================

    /// Total number of inference operations
    ///
    /// Labels: operation, outcome (ok, degraded, error)
    pub static ref INFERENCE_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("inference_requests_total", "Total number of inference operations")
            .namespace(NAMESPACE),
        &["operation", "outcome"]
    ).expect("Failed to create INFERENCE_REQUESTS_TOTAL metric");

    /// Inference operation duration in seconds
    ///
    /// Labels: operation
    pub static ref INFERENCE_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "inference_duration_seconds",
            "Inference operation duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0, 30.0]),
        &["operation"]
    ).expect("Failed to create INFERENCE_DURATION_SECONDS metric");

    // ============================================================================
    // Artifact & Cache Metrics
    // ============================================================================

    /// Embedding cache events
    ///
    /// Labels: event (hit, miss, rebuild, persist_error, content_drift)
    pub static ref EMBEDDING_CACHE_EVENTS: CounterVec = CounterVec::new(
        Opts::new("embedding_cache_events_total", "Embedding cache events")
            .namespace(NAMESPACE),
        &["event"]
    ).expect("Failed to create EMBEDDING_CACHE_EVENTS metric");

    /// Number of artifacts loaded by the last load attempt
    pub static ref ARTIFACTS_LOADED: Gauge = Gauge::with_opts(
        Opts::new("artifacts_loaded", "Number of model artifacts currently loaded")
            .namespace(NAMESPACE)
    ).expect("Failed to create ARTIFACTS_LOADED metric");

    // ============================================================================
    // System Metrics
    // ============================================================================

    /// Application build info
    ///
    /// Labels: version
    pub static ref BUILD_INFO: GaugeVec = GaugeVec::new(
        Opts::new("build_info", "Application build information")
            .namespace(NAMESPACE),
        &["version"]
    ).expect("Failed to create BUILD_INFO metric");
}

fn register<C>(collector: C) -> Result<(), prometheus::Error>
where
    C: Collector + 'static,
{
    match PROMETHEUS_REGISTRY.register(Box::new(collector)) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Register every metric with the global registry.
///
/// Safe to call more than once; already registered metrics are skipped.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    register(HTTP_REQUESTS_TOTAL.clone())?;
    register(HTTP_REQUEST_DURATION_SECONDS.clone())?;

    register(INFERENCE_REQUESTS_TOTAL.clone())?;
    register(INFERENCE_DURATION_SECONDS.clone())?;

    register(EMBEDDING_CACHE_EVENTS.clone())?;
    register(ARTIFACTS_LOADED.clone())?;

    register(BUILD_INFO.clone())?;
    BUILD_INFO
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1.0);

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Generate Prometheus text format metrics
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
