//
// Copyright 2026 The Portal Project Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! WebSocket listener binary: accepts browser connections, bridges each to
//! a `portal_session::Session` via the `SessionManager`, the way the
//! teacher's `echo_server` example wires a handler onto `TelnetServer`.

use futures_util::{SinkExt, StreamExt};
use portal_session::{Accepted, ProxyConfig, SessionManager};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = config_from_env();

    let tls_acceptor = match build_tls_acceptor(&config) {
        Ok(acceptor) => acceptor,
        Err(err) => {
            tracing::error!(error = %err, "TLS configuration error");
            std::process::exit(1);
        }
    };

    let listener = match TcpListener::bind(&config.listen_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, addr = %config.listen_addr, "failed to bind listener");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %config.listen_addr, tls = tls_acceptor.is_some(), "portal-gateway listening");

    let manager = SessionManager::new(config);

    let accept_manager = manager.clone();
    let accept_loop = tokio::spawn(async move {
        loop {
            let (socket, peer_addr) = match listener.accept().await {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::error!(error = %err, "accept failed");
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    continue;
                }
            };
            let manager = accept_manager.clone();
            let tls_acceptor = tls_acceptor.clone();
            tokio::spawn(async move {
                if let Err(err) = handle_connection(socket, peer_addr, manager, tls_acceptor).await {
                    tracing::warn!(remote = %peer_addr, error = %err, "connection handling failed");
                }
            });
        }
    });

    let core_dump_requested = wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received");
    accept_loop.abort();

    let code = manager.shutdown(core_dump_requested);
    std::process::exit(code);
}

/// Wait for a shutdown signal. On Unix, `SIGQUIT` is treated as the
/// core-dump-requested path (exit 3); `SIGINT`/`SIGTERM` are normal (exit
/// 0). Non-Unix targets only observe Ctrl+C and always take the normal path.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> bool {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigquit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => false,
        _ = sigterm.recv() => false,
        _ = sigquit.recv() => true,
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> bool {
    let _ = tokio::signal::ctrl_c().await;
    false
}

async fn handle_connection(
    socket: TcpStream,
    peer_addr: SocketAddr,
    manager: Arc<SessionManager>,
    tls_acceptor: Option<tokio_rustls::TlsAcceptor>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = match tls_acceptor {
        Some(acceptor) => {
            let tls_stream = acceptor.accept(socket).await?;
            tokio_tungstenite::accept_async(tls_stream).await?
        }
        None => tokio_tungstenite::accept_async(socket).await?,
    };

    let Some(Accepted { id, inbound_tx, mut outbound_rx }) = manager.accept(peer_addr.to_string()) else {
        tracing::info!(remote = %peer_addr, "manager is shutting down, refusing connection");
        return Ok(());
    };
    tracing::info!(remote = %peer_addr, session = %id, "session accepted");

    let (mut ws_sink, mut ws_source) = ws_stream.split();

    let outbound = async move {
        while let Some(frame) = outbound_rx.recv().await {
            if ws_sink.send(Message::from(frame)).await.is_err() {
                break;
            }
        }
        let _ = ws_sink.close().await;
    };

    let inbound = async move {
        while let Some(message) = ws_source.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    if inbound_tx.send(text.to_string()).is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(_) => break,
            }
        }
    };

    tokio::join!(outbound, inbound);
    tracing::info!(remote = %peer_addr, session = %id, "session connection closed");
    Ok(())
}

fn build_tls_acceptor(
    config: &ProxyConfig,
) -> Result<Option<tokio_rustls::TlsAcceptor>, Box<dyn std::error::Error + Send + Sync>> {
    let (cert_path, key_path) = match (&config.cert_path, &config.key_path) {
        (Some(cert), Some(key)) => (cert, key),
        (None, None) => return Ok(None),
        _ => return Err("both cert_path and key_path must be set for TLS".into()),
    };

    rustls::crypto::ring::default_provider().install_default().ok();

    let cert_file = std::fs::File::open(cert_path)
        .map_err(|err| format!("failed to open certificate {}: {err}", cert_path.display()))?;
    let certs = rustls_pemfile::certs(&mut std::io::BufReader::new(cert_file)).collect::<Result<Vec<_>, _>>()?;

    let key_file = std::fs::File::open(key_path)
        .map_err(|err| format!("failed to open private key {}: {err}", key_path.display()))?;
    let key = rustls_pemfile::private_key(&mut std::io::BufReader::new(key_file))?
        .ok_or("no private key found in key file")?;

    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    Ok(Some(tokio_rustls::TlsAcceptor::from(Arc::new(server_config))))
}

/// Build a `ProxyConfig` from `PORTAL_*` environment variables, falling
/// back to `ProxyConfig::default()` for anything unset.
fn config_from_env() -> ProxyConfig {
    let mut config = ProxyConfig::new();

    if let Ok(addr) = std::env::var("PORTAL_LISTEN_ADDR") {
        config = config.with_listen_addr(addr);
    }

    let default_host = std::env::var("PORTAL_DEFAULT_HOST").unwrap_or(config.default_host.clone());
    let default_port = std::env::var("PORTAL_DEFAULT_PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(config.default_port);
    config = config.with_default_target(default_host, default_port);

    if let Ok(flag) = std::env::var("PORTAL_ONLY_DEFAULT_HOST") {
        config = config.with_only_default_host(is_env_truthy(&flag));
    }

    if let Ok(list) = std::env::var("PORTAL_TTYPE_QUEUE") {
        config = config.with_ttype_queue(split_csv(&list));
    }

    if let Ok(list) = std::env::var("PORTAL_GMCP_PORTAL_EXTRA") {
        config = config.with_gmcp_portal_extra(split_csv(&list));
    }

    if let Ok(list) = std::env::var("PORTAL_MSDP_STATIC") {
        let pairs = split_csv(&list)
            .into_iter()
            .filter_map(|entry| entry.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
            .collect();
        config = config.with_msdp_static(pairs);
    }

    if let Ok(id) = std::env::var("PORTAL_CLIENT_ID") {
        config = config.with_client_identity(id, config.client_version.clone());
    }

    if let Ok(flag) = std::env::var("PORTAL_COMPRESS") {
        config = config.with_global_compress(is_env_truthy(&flag));
    }

    if let Ok(flag) = std::env::var("PORTAL_DEBUG") {
        config = config.with_debug(is_env_truthy(&flag));
    }

    if let Ok(path) = std::env::var("PORTAL_CHAT_LOG_PATH") {
        config = config.with_chat_log_path(PathBuf::from(path));
    }

    let cert = std::env::var("PORTAL_CERT_PATH").ok();
    let key = std::env::var("PORTAL_KEY_PATH").ok();
    if let (Some(cert), Some(key)) = (cert, key) {
        config = config.with_tls(PathBuf::from(cert), PathBuf::from(key));
    }

    config
}

fn is_env_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn split_csv(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}
