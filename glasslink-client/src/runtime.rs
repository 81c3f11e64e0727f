use anyhow::{Context, Result};
use glasslink_core::control::{GlassesConfig, LensSide};
use glasslink_core::session::{DualLensSession, SendStatus};
use glasslink_core::transport::Transport;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

pub type LogFn = Box<dyn Fn(String) + Send + Sync + 'static>;

/// What to do once both lenses are connected
#[derive(Debug, Clone)]
pub enum Job {
    /// Keep the lenses alive until stopped
    KeepAlive,
    /// Show text, then finish
    Text(String),
    /// Show a BMP file, then finish
    Image(Vec<u8>),
}

enum Event {
    Tick,
    Inbound(Option<(LensSide, Vec<u8>)>),
    Stop(&'static str),
}

/// Resolves once a stop is requested on the watch channel.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow() {
            return;
        }
        if stop.changed().await.is_err() {
            // sender gone: nobody can ask us to stop any more
            std::future::pending::<()>().await;
        }
    }
}

async fn shutdown(stop: &mut watch::Receiver<bool>) -> &'static str {
    tokio::select! {
        _ = stop_requested(stop) => "Stop requested",
        _ = async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        } => "Ctrl+C received",
    }
}

/// Scan and connect, retrying up to `scan_attempts` times.
///
/// Returns `false` if a stop was requested first.
async fn connect_with_retries<T: Transport>(
    session: &mut DualLensSession<T>,
    cfg: &GlassesConfig,
    stop: &mut watch::Receiver<bool>,
    log: &LogFn,
) -> Result<bool> {
    for attempt in 1..=cfg.scan_attempts {
        log(format!(
            "Connecting to lenses (attempt {attempt}/{})",
            cfg.scan_attempts
        ));
        tokio::select! {
            res = session.connect(true) => match res {
                Ok(()) => {
                    log("Both lenses connected".to_string());
                    return Ok(true);
                }
                Err(e) => log(format!("Attempt {attempt} failed: {e}")),
            },
            reason = shutdown(stop) => {
                log(reason.to_string());
                return Ok(false);
            }
        }
    }
    anyhow::bail!(
        "could not connect to both lenses after {} attempts",
        cfg.scan_attempts
    )
}

pub async fn run_client<T: Transport>(
    transport: Arc<T>,
    cfg: GlassesConfig,
    job: Job,
    mut stop: watch::Receiver<bool>,
    log: LogFn,
) -> Result<()> {
    log(format!(
        "Client config: scan_timeout={:?} attempts={} heartbeat={:?} ack_timeout={:?}",
        cfg.scan_timeout, cfg.scan_attempts, cfg.heartbeat_interval, cfg.ack_timeout
    ));

    let mut session = DualLensSession::new(transport, cfg.clone());
    let result = drive(&mut session, &cfg, job, &mut stop, &log).await;

    session.disconnect().await;
    log("Disconnected".to_string());
    result
}

async fn drive<T: Transport>(
    session: &mut DualLensSession<T>,
    cfg: &GlassesConfig,
    job: Job,
    stop: &mut watch::Receiver<bool>,
    log: &LogFn,
) -> Result<()> {
    if !connect_with_retries(session, cfg, stop, log).await? {
        return Ok(());
    }

    match job {
        Job::KeepAlive => keep_alive(session, cfg, stop, log).await,
        Job::Text(text) => {
            let status = tokio::select! {
                res = session.send_text(&text) => res.context("failed to send text")?,
                reason = shutdown(stop) => {
                    log(reason.to_string());
                    return Ok(());
                }
            };
            log(format!("Text {}", describe(status)));
            Ok(())
        }
        Job::Image(bitmap) => {
            let status = tokio::select! {
                res = session.send_bmp(&bitmap) => res.context("failed to send image")?,
                reason = shutdown(stop) => {
                    log(reason.to_string());
                    return Ok(());
                }
            };
            log(format!("Image {}", describe(status)));
            Ok(())
        }
    }
}

fn describe(status: SendStatus) -> &'static str {
    match status {
        SendStatus::Delivered => "delivered",
        SendStatus::Deferred => "deferred: session was reconnected",
    }
}

/// Heartbeat both lenses and dispatch notifications until stopped.
async fn keep_alive<T: Transport>(
    session: &mut DualLensSession<T>,
    cfg: &GlassesConfig,
    stop: &mut watch::Receiver<bool>,
    log: &LogFn,
) -> Result<()> {
    let mut tick = tokio::time::interval(cfg.heartbeat_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let event = tokio::select! {
            _ = tick.tick() => Event::Tick,
            inbound = session.recv_notification() => Event::Inbound(inbound),
            reason = shutdown(stop) => Event::Stop(reason),
        };

        match event {
            Event::Tick => {
                let seq = session.heartbeat_sequence();
                match session.send_heartbeat().await {
                    Ok(SendStatus::Delivered) => log(format!("Heartbeat seq={seq}")),
                    Ok(SendStatus::Deferred) => log("Reconnected before heartbeat".to_string()),
                    Err(e) => {
                        log(format!("Heartbeat failed: {e}"));
                        session.disconnect().await;
                        if !connect_with_retries(session, cfg, stop, log).await? {
                            return Ok(());
                        }
                    }
                }
            }
            Event::Inbound(Some((side, buf))) => {
                if let Some(notification) = session.handle_notification(side, &buf).await {
                    log(format!("Recv from {side} lens: {notification:?}"));
                }
            }
            Event::Inbound(None) => {}
            Event::Stop(reason) => {
                log(reason.to_string());
                return Ok(());
            }
        }
    }
}

/// Scan once and report which lenses were found.
pub async fn run_scan<T: Transport>(
    transport: Arc<T>,
    cfg: GlassesConfig,
    log: LogFn,
) -> Result<()> {
    let timeout = cfg.scan_timeout;
    let mut session = DualLensSession::new(transport, cfg);
    let result = session.scan_for_lenses(timeout).await;

    for side in LensSide::ALL {
        match session.lens(side) {
            Some(lens) => log(format!("{side}: {}", lens.name)),
            None => log(format!("{side}: not found")),
        }
    }
    result.context("scan did not find both lenses")
}
