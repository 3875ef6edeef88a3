use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use clap::Parser;
use complyze_certs::{CertificateAuthority, CertificateManager};
use complyze_control::{run_heartbeat, run_settings_poller, ControlPlaneClient};
use complyze_core::{ConfigOverrides, Settings};
use complyze_mitm::PinningStore;
use complyze_proxy::{run_connect_listener, ProxyState};
use complyze_telemetry::{
    self as telemetry, LogFormat, ResourceMonitor, TelemetryRecord, TelemetrySink, TracingConfig,
};
use tokio::signal;
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug, Clone)]
#[command(name = "complyze-proxy", about = "Complyze AI interception proxy")]
struct ProxyCli {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long = "control-plane-api")]
    control_plane_api: Option<String>,
    #[arg(long = "workspace-id")]
    workspace_id: Option<String>,
    #[arg(long = "certs-dir")]
    certs_dir: Option<PathBuf>,
    #[arg(long = "telemetry-dir")]
    telemetry_dir: Option<PathBuf>,
    #[arg(long = "fail-open")]
    fail_open: Option<bool>,
    #[arg(long = "log-format")]
    log_format: Option<String>,
    #[arg(long = "otlp-endpoint")]
    otlp_endpoint: Option<String>,
}

impl ProxyCli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            listen_port: self.port,
            control_plane_api: self.control_plane_api.clone(),
            workspace_id: self.workspace_id.clone(),
            certs_dir: self.certs_dir.clone(),
            telemetry_dir: self.telemetry_dir.clone(),
            fail_open: self.fail_open,
            trace_mode: None,
            config_file: self.config.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ProxyCli::parse();
    let config = complyze_core::load_runtime_config(cli.overrides())
        .context("failed to load runtime configuration")?;

    let log_format = match cli.log_format.as_deref() {
        Some(fmt) => fmt.parse()?,
        None => LogFormat::Pretty,
    };
    let tracing_config = TracingConfig {
        service_name: "complyze-proxy".into(),
        log_format,
        log_level: "info".into(),
        otlp_endpoint: cli.otlp_endpoint.clone(),
        resource_attributes: vec![("component".into(), "proxy".into())],
    };
    let (_tracing_guard, metrics) = telemetry::init(&tracing_config, None)?;

    let ca = CertificateAuthority::load_or_generate(&config.certs_dir)
        .context("failed to load or generate the interception CA")?;
    let cert_manager = Arc::new(CertificateManager::new(ca));

    let telemetry_sink = Arc::new(
        TelemetrySink::new(&config.telemetry_dir).context("failed to open telemetry sink")?,
    );
    telemetry_sink
        .record(&TelemetryRecord::ProxyStart {
            timestamp: chrono::Utc::now(),
            os: std::env::consts::OS.to_string(),
            hostname: hostname(),
            proxy_port: config.listen_port,
            monitor_mode: config.monitor_mode_hint.is_some(),
            fail_open: config.fail_open,
        })
        .ok();

    let bootstrap_settings = Settings::bootstrap(config.enforcement_mode_hint);
    let settings = Arc::new(ArcSwap::from_pointee(bootstrap_settings));

    let control = Arc::new(ControlPlaneClient::new(
        config.control_plane_api.clone(),
        config.workspace_id.clone(),
    ));

    let monitor = Arc::new(ResourceMonitor::with_memory_threshold(config.max_memory_mb as f64));

    let state = ProxyState {
        config: Arc::new(config.clone()),
        settings: settings.clone(),
        cert_manager,
        pinning: Arc::new(PinningStore::new()),
        telemetry: telemetry_sink.clone(),
        monitor: monitor.clone(),
        metrics: metrics.clone(),
        control: control.clone(),
        upstream_tls: complyze_forward::upstream_tls_connector(),
    };

    tokio::spawn(run_settings_poller(control.clone(), settings.clone()));
    tokio::spawn(run_heartbeat(
        control.clone(),
        device_id(),
        hostname(),
        config.workspace_id.clone(),
    ));
    tokio::spawn(monitor.run(telemetry_sink));

    info!(
        port = config.listen_port,
        "starting listener (CONNECT tunneling plus the local PAC/metrics/health surface)"
    );
    tokio::select! {
        result = run_connect_listener(state) => {
            result.context("CONNECT listener exited")?;
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn device_id() -> String {
    Uuid::new_v4().to_string()
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
