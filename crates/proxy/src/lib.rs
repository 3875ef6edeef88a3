//! CONNECT router, transparent tunnel, and the local PAC/metrics/health
//! surface for the Complyze AI interception proxy. `listener::run` accepts
//! every loopback connection on the one configured port and dispatches on
//! the first line: `CONNECT` goes through the tunnel/MITM path, any other
//! HTTP verb is served straight from `pac::render_pac_script` /
//! `pac::render_metrics`. The binary (`main.rs`) just starts this listener
//! alongside the shared crates (`complyze-certs`, `complyze-mitm`,
//! `complyze-forward`, `complyze-classify`, `complyze-policy`,
//! `complyze-control`, `complyze-telemetry`) that do the actual TLS,
//! parsing, and scoring work.

mod connect;
mod destination_tier;
mod intercept;
mod listener;
mod pac;
mod state;
mod tunnel;

pub use connect::{decide_route, parse_connect_line, ConnectTarget, RouteDecision, RouteInputs};
pub use listener::run as run_connect_listener;
pub use state::ProxyState;
