use std::sync::Arc;

use arc_swap::ArcSwap;
use complyze_certs::CertificateManager;
use complyze_control::ControlPlaneClient;
use complyze_core::{RuntimeConfig, Settings};
use complyze_mitm::PinningStore;
use complyze_telemetry::{MetricsExporter, ResourceMonitor, TelemetrySink};
use tokio_rustls::TlsConnector;

/// Everything a single accepted connection needs, shared across the whole
/// listener. Cheap to clone: it is a bundle of `Arc`s.
#[derive(Clone)]
pub struct ProxyState {
    pub config: Arc<RuntimeConfig>,
    pub settings: Arc<ArcSwap<Settings>>,
    pub cert_manager: Arc<CertificateManager>,
    pub pinning: Arc<PinningStore>,
    pub telemetry: Arc<TelemetrySink>,
    pub monitor: Arc<ResourceMonitor>,
    pub metrics: MetricsExporter,
    pub control: Arc<ControlPlaneClient>,
    pub upstream_tls: TlsConnector,
}
