use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::sync::Arc;

/// Process-wide counters and histograms exported via OpenTelemetry's
/// Prometheus bridge. Binding an HTTP `/metrics` endpoint to the returned
/// `Registry` is left to the admin/HTTP collaborator layer — this module
/// only produces the registry, it does not serve it.
#[derive(Clone)]
pub struct Metrics {
    pub connections_total: Counter<u64>,
    pub connections_active: UpDownCounter<i64>,
    pub connections_rejected_total: Counter<u64>,

    pub bytes_relayed_total: Counter<u64>,
    pub relay_duration_seconds: Histogram<f64>,

    pub exit_selections_total: Counter<u64>,
    pub dial_failures_total: Counter<u64>,
    pub dial_duration_seconds: Histogram<f64>,

    pub health_checks_total: Counter<u64>,
    pub health_check_failures_total: Counter<u64>,
    pub exit_marked_unhealthy_total: Counter<u64>,
    pub exit_marked_healthy_total: Counter<u64>,

    pub handshake_failures_total: Counter<u64>,
    pub rules_matched_total: Counter<u64>,
    pub errors_total: Counter<u64>,
}

impl Metrics {
    fn new(meter: Meter) -> Self {
        Self {
            connections_total: meter
                .u64_counter("exitgate_connections_total")
                .with_description("Total number of accepted client connections")
                .build(),
            connections_active: meter
                .i64_up_down_counter("exitgate_connections_active")
                .with_description("Number of connections currently being relayed")
                .build(),
            connections_rejected_total: meter
                .u64_counter("exitgate_connections_rejected_total")
                .with_description("Connections rejected by admission control")
                .build(),

            bytes_relayed_total: meter
                .u64_counter("exitgate_bytes_relayed_total")
                .with_description("Total bytes relayed in both directions")
                .build(),
            relay_duration_seconds: meter
                .f64_histogram("exitgate_relay_duration_seconds")
                .with_description("Wall-clock duration of a completed relay")
                .build(),

            exit_selections_total: meter
                .u64_counter("exitgate_exit_selections_total")
                .with_description("Total number of exit address selections")
                .build(),
            dial_failures_total: meter
                .u64_counter("exitgate_dial_failures_total")
                .with_description("Total number of failed outbound dials")
                .build(),
            dial_duration_seconds: meter
                .f64_histogram("exitgate_dial_duration_seconds")
                .with_description("Outbound dial latency in seconds")
                .build(),

            health_checks_total: meter
                .u64_counter("exitgate_health_checks_total")
                .with_description("Total number of health probe rounds executed")
                .build(),
            health_check_failures_total: meter
                .u64_counter("exitgate_health_check_failures_total")
                .with_description("Total number of failed health probes")
                .build(),
            exit_marked_unhealthy_total: meter
                .u64_counter("exitgate_exit_marked_unhealthy_total")
                .with_description("Total number of healthy-to-unhealthy transitions")
                .build(),
            exit_marked_healthy_total: meter
                .u64_counter("exitgate_exit_marked_healthy_total")
                .with_description("Total number of unhealthy-to-healthy transitions")
                .build(),

            handshake_failures_total: meter
                .u64_counter("exitgate_handshake_failures_total")
                .with_description("Total number of tunnel handshake failures")
                .build(),
            rules_matched_total: meter
                .u64_counter("exitgate_rules_matched_total")
                .with_description("Total number of connections matched by a routing rule")
                .build(),
            errors_total: meter
                .u64_counter("exitgate_errors_total")
                .with_description("Total number of unexpected errors")
                .build(),
        }
    }
}

pub fn init_metrics() -> Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>>
{
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("exitgate");
    let metrics = Arc::new(Metrics::new(meter));

    Ok((metrics, registry))
}
