mod auth;
mod codec;
mod config;
mod dispatch;
mod error;
mod migration;
mod rate_limit;
mod relay;
mod ring;
mod security;
mod session;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use acip_protocol::types::ErrorCode;
use acip_protocol::{AcipError, PacketType, ValidationError};
use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::dispatch::{ConnectionContext, Engine, HandlerTable};
use crate::error::Disposition;
use crate::rate_limit::AuthFailureLimiter;
use crate::relay::Relay;
use crate::ring::RingConsensus;
use crate::session::SessionStore;

fn parse_args() -> (PathBuf, Option<u16>) {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = PathBuf::from("./config/acip.toml");
    let mut port_override = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    port_override = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    (config_path, port_override)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (config_path, port_override) = parse_args();

    let mut config = config::load_config(&config_path)?;
    if let Some(p) = port_override {
        config.server.port = p;
    }

    if let Err(issues) = config.validate() {
        let has_errors = issues.iter().any(|i| i.starts_with("ERROR:"));
        for issue in &issues {
            if issue.starts_with("ERROR:") {
                tracing::error!("{}", issue);
            } else {
                tracing::warn!("{}", issue);
            }
        }
        if has_errors {
            tracing::error!(
                "Configuration has {} issue(s). Fix the ERROR(s) above and restart.",
                issues.len()
            );
            std::process::exit(1);
        }
    }

    let bind_addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("Invalid bind address")?;

    let engine = Arc::new(Engine {
        sessions: Arc::new(SessionStore::new()),
        relay: Arc::new(Relay::new()),
        ring: Arc::new(RingConsensus::new(
            config.ring.tick_secs,
            config.ring.round_deadline_secs,
        )),
        auth_limiter: Arc::new(AuthFailureLimiter::new(10, 60)),
        replay_window_secs: config.auth.replay_window_secs,
        password_verify_timeout: Duration::from_secs(config.auth.password_verify_timeout_secs),
    });
    let handlers = Arc::new(HandlerTable::build());
    let max_payload = config.server.max_payload_bytes;
    let idle_timeout = Duration::from_secs(config.server.idle_timeout_secs);
    let queue_depth = config.server.outbound_queue_depth;
    let next_client_id = Arc::new(AtomicU64::new(1));

    tracing::info!("===========================================");
    tracing::info!("  ACIP discovery/session server");
    tracing::info!("  Listening on tcp://{bind_addr}");
    tracing::info!("===========================================");

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {bind_addr}"))?;

    tracing::info!("Server ready, accepting connections");

    // Ring-election / expiry scheduler, driven independently of any connection.
    {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                let expired = engine.sessions.sweep_expired().await;
                for session_id in expired {
                    tracing::debug!(session_id = ?session_id, "swept expired session");
                }
                for session_id in engine.sessions.sessions_for_ring_tick().await {
                    let elected = engine
                        .sessions
                        .with_session(session_id, |s| engine.ring.drive(s))
                        .await
                        .flatten();
                    if let Some(result) = elected {
                        let event = acip_protocol::FutureHostElected {
                            session_id,
                            future_host_id: result.future_host_id,
                            address: result.address,
                            port: result.port,
                            connection_type: result.connection_type,
                            round_number: result.round_number,
                        };
                        engine.relay.broadcast(session_id, &event.encode()).await;
                    }
                }
            }
        });
    }

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!("Failed to accept TCP connection: {e}");
                        continue;
                    }
                };

                let engine = Arc::clone(&engine);
                let handlers = Arc::clone(&handlers);
                let client_id = next_client_id.fetch_add(1, Ordering::Relaxed);

                tokio::spawn(async move {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(%peer_addr, "failed to set TCP_NODELAY: {e}");
                    }
                    let (read_half, write_half) = stream.into_split();
                    run_connection(
                        read_half,
                        write_half,
                        peer_addr,
                        client_id,
                        engine,
                        handlers,
                        max_payload,
                        idle_timeout,
                        queue_depth,
                    )
                    .await;
                });
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT, initiating graceful shutdown");
                break;
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown");
                break;
            }
        }
    }

    tracing::info!("ACIP server shut down cleanly");
    Ok(())
}

/// Applies spec §7's propagation policy for one `AppError`: sends
/// `ACIP_ERROR`/records an auth failure as the `Disposition` dictates.
/// Returns whether the connection should close.
async fn apply_disposition(
    app_err: &crate::error::AppError,
    ctx: &ConnectionContext,
    engine: &Engine,
    peer_ip: &str,
) -> bool {
    match app_err.disposition() {
        Disposition::CloseSilently => true,
        Disposition::Continue { error_to_send, count_as_auth_failure } => {
            if count_as_auth_failure {
                engine.auth_limiter.record_failure(peer_ip);
            }
            if let Some(code) = error_to_send {
                ctx.send(
                    PacketType::AcipError,
                    &AcipError::new(code, &app_err.to_string()).encode(),
                )
                .await;
            }
            false
        }
    }
}

/// One accepted connection: a read loop that decodes frames and dispatches
/// them against the handler table, and a write loop draining the
/// connection's outbound queue. Both end when either side closes.
#[allow(clippy::too_many_arguments)]
async fn run_connection<R, W>(
    mut read_half: R,
    mut write_half: W,
    peer_addr: SocketAddr,
    client_id: u64,
    engine: Arc<Engine>,
    handlers: Arc<HandlerTable>,
    max_payload: u32,
    idle_timeout: Duration,
    queue_depth: usize,
) where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbox_tx, mut outbox_rx) = mpsc::channel::<Vec<u8>>(queue_depth);
    let write_task = tokio::spawn(async move {
        while let Some(encoded) = outbox_rx.recv().await {
            if codec::write_frame(&mut write_half, &encoded).await.is_err() {
                break;
            }
        }
    });

    let peer_ip = peer_addr.ip().to_string();
    let mut ctx = ConnectionContext {
        client_id,
        peer_ip: peer_ip.clone(),
        identity_pubkey: None,
        session_id: None,
        participant_id: None,
        secure: None,
        outbox: outbox_tx,
    };

    loop {
        let frame = tokio::time::timeout(idle_timeout, codec::read_frame(&mut read_half, max_payload)).await;
        let (packet_type, payload) = match frame {
            Ok(Ok(frame)) => frame,
            Ok(Err(e)) => {
                tracing::debug!(%peer_addr, client_id, "connection closed: {e}");
                break;
            }
            Err(_) => {
                tracing::debug!(%peer_addr, client_id, "idle timeout");
                break;
            }
        };

        if !engine.auth_limiter.is_allowed(&peer_ip) {
            ctx.send(
                PacketType::AcipError,
                &AcipError::new(ErrorCode::RateLimited, "too many auth failures").encode(),
            )
            .await;
            continue;
        }

        let raw_packet_type = packet_type;
        let Some(packet_type) = PacketType::from_u16(raw_packet_type) else {
            let app_err = crate::error::AppError::Validation(ValidationError::Unhandled(raw_packet_type));
            if apply_disposition(&app_err, &ctx, &engine, &peer_ip).await {
                tracing::debug!(%peer_addr, client_id, "closing connection: {app_err}");
                break;
            }
            continue;
        };

        if let Err(e) = crate::security::check_cleartext_allowed(ctx.secure.is_some(), packet_type) {
            tracing::warn!(%peer_addr, client_id, "{e}");
            break;
        }

        let Some(handler) = handlers.lookup(packet_type.as_u16()) else {
            let app_err = crate::error::AppError::Validation(ValidationError::Unhandled(packet_type.as_u16()));
            if apply_disposition(&app_err, &ctx, &engine, &peer_ip).await {
                tracing::debug!(%peer_addr, client_id, "closing connection: {app_err}");
                break;
            }
            continue;
        };

        if let Err(app_err) = handler(&payload, &mut ctx, &engine).await {
            if apply_disposition(&app_err, &ctx, &engine, &peer_ip).await {
                tracing::debug!(%peer_addr, client_id, "closing connection: {app_err}");
                break;
            }
        }
    }

    if let (Some(session_id), Some(participant_id)) = (ctx.session_id, ctx.participant_id) {
        engine.relay.unregister(session_id, participant_id).await;
    }
    drop(ctx);
    write_task.abort();
}
