//! # Fingerprint Client
//!
//! Drives the reader service: connection with bounded retries and an
//! optional simulated fallback, device discovery, and the capture
//! exchange with a deadline.

use tokio::time::{timeout, timeout_at, Instant};

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::link::{Link, Socket};
use crate::protocol::{CaptureResult, CaptureStatus, Command, DeviceInfo, Event};
use crate::simulator::Simulator;

/// Client for the local fingerprint reader service.
pub struct FingerprintClient {
    config: BridgeConfig,
    link: Option<Link>,
}

impl std::fmt::Debug for FingerprintClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintClient")
            .field("url", &self.config.url)
            .field("connected", &self.link.is_some())
            .field("simulated", &self.is_simulated())
            .finish()
    }
}

impl FingerprintClient {
    /// Create a client. No connection is made until first use.
    pub fn new(config: BridgeConfig) -> Self {
        Self { config, link: None }
    }

    /// Create a client that uses the simulated reader without trying the network.
    pub fn simulated(config: BridgeConfig) -> Self {
        let link = Link::Simulated(Simulator::new(config.simulation_step_delay));
        Self {
            config,
            link: Some(link),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Whether captures are served by the simulator.
    pub fn is_simulated(&self) -> bool {
        self.link.as_ref().is_some_and(Link::is_simulated)
    }

    /// Whether a link (real or simulated) is established.
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Connect to the reader service.
    ///
    /// Makes one attempt plus up to `max_reconnect_attempts` retries. When all
    /// fail, falls back to the simulator if configured, otherwise returns
    /// [`BridgeError::Unavailable`].
    pub async fn connect(&mut self) -> Result<(), BridgeError> {
        if self.link.is_some() {
            return Ok(());
        }
        match self.open_with_retries(self.config.max_reconnect_attempts).await {
            Ok(socket) => {
                tracing::info!(url = %self.config.url, "connected to fingerprint service");
                self.link = Some(Link::Socket(Box::new(socket)));
                Ok(())
            }
            Err(err) if self.config.simulate_on_unavailable => {
                tracing::warn!(
                    error = %err,
                    "fingerprint service unavailable, using simulated reader"
                );
                self.link = Some(Link::Simulated(Simulator::new(
                    self.config.simulation_step_delay,
                )));
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// List attached readers.
    ///
    /// Collects `deviceConnected` events until the service has been quiet
    /// for `device_quiet_period`.
    pub async fn devices(&mut self) -> Result<Vec<DeviceInfo>, BridgeError> {
        self.connect().await?;
        self.send(&Command::GetDevices).await?;

        let quiet = self.config.device_quiet_period;
        let mut devices = Vec::new();
        loop {
            let next = timeout(quiet, self.link_mut()?.recv()).await;
            match next {
                Err(_) => break,
                Ok(Ok(Some(Event::DeviceConnected { device }))) => {
                    if !devices.contains(&device) {
                        devices.push(device);
                    }
                }
                Ok(Ok(Some(Event::Error { message, code }))) => {
                    if devices.is_empty() {
                        return Err(BridgeError::Device { message, code });
                    }
                    break;
                }
                Ok(Ok(Some(other))) => {
                    tracing::debug!(event = ?other, "ignoring event during device discovery");
                }
                Ok(Ok(None)) => {
                    self.link = None;
                    if devices.is_empty() {
                        return Err(BridgeError::Closed);
                    }
                    break;
                }
                Ok(Err(err)) => {
                    self.link = None;
                    return Err(err);
                }
            }
        }
        Ok(devices)
    }

    /// Capture one fingerprint.
    ///
    /// `observer` receives each progress status. On timeout a
    /// `cancelCapture` is sent before returning [`BridgeError::Timeout`].
    /// If the connection drops mid-capture, the client reconnects (bounded by
    /// `max_reconnect_attempts` over the whole capture) and reissues the command.
    pub async fn capture<F>(&mut self, mut observer: F) -> Result<CaptureResult, BridgeError>
    where
        F: FnMut(CaptureStatus),
    {
        self.connect().await?;

        let limit = self.config.capture_timeout;
        let deadline = Instant::now() + limit;
        let command = Command::CaptureFingerprint {
            timeout: Some(u64::try_from(limit.as_millis()).unwrap_or(u64::MAX)),
        };
        let mut reconnects = 0u32;
        self.send(&command).await?;

        loop {
            let next = timeout_at(deadline, self.link_mut()?.recv()).await;
            let event = match next {
                Err(_) => {
                    if let Err(e) = self.send(&Command::CancelCapture).await {
                        tracing::debug!(error = %e, "failed to send cancelCapture after timeout");
                    }
                    return Err(BridgeError::Timeout(limit));
                }
                Ok(Ok(Some(event))) => event,
                Ok(Ok(None)) | Ok(Err(_)) => {
                    self.link = None;
                    let socket = self.reopen_during_capture(&mut reconnects, deadline).await?;
                    self.link = Some(Link::Socket(Box::new(socket)));
                    self.send(&command).await?;
                    continue;
                }
            };

            match event {
                Event::DeviceConnected { device } => observer(CaptureStatus::DeviceConnected(device)),
                Event::FingerDetected => observer(CaptureStatus::FingerDetected),
                Event::Processing => observer(CaptureStatus::Processing),
                Event::CaptureComplete(result) => {
                    if !result.verify() {
                        return Err(BridgeError::Protocol(
                            "capture hash does not match template".to_string(),
                        ));
                    }
                    return Ok(result);
                }
                Event::Error { message, code } => {
                    return Err(BridgeError::Device { message, code });
                }
                Event::Unknown => {
                    tracing::debug!("ignoring unknown event from fingerprint service");
                }
            }
        }
    }

    /// Ask the reader to abort the current capture.
    pub async fn cancel(&mut self) -> Result<(), BridgeError> {
        if self.link.is_none() {
            return Ok(());
        }
        self.send(&Command::CancelCapture).await
    }

    /// Close the connection, if any.
    pub async fn close(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close().await;
        }
    }

    fn link_mut(&mut self) -> Result<&mut Link, BridgeError> {
        self.link.as_mut().ok_or(BridgeError::Closed)
    }

    async fn send(&mut self, command: &Command) -> Result<(), BridgeError> {
        self.link_mut()?.send(command).await
    }

    /// Reopen the socket after a drop mid-capture.
    ///
    /// `used` counts reconnect attempts across the whole capture and is never
    /// allowed past `max_reconnect_attempts`. Every attempt waits
    /// `reconnect_delay` first, and none outlives `deadline`.
    async fn reopen_during_capture(
        &self,
        used: &mut u32,
        deadline: Instant,
    ) -> Result<Socket, BridgeError> {
        let max = self.config.max_reconnect_attempts;
        let mut last_error = BridgeError::Closed;
        while *used < max {
            *used += 1;
            tracing::warn!(
                attempt = *used,
                max_attempts = max,
                "fingerprint service connection lost during capture, reconnecting"
            );
            let attempt = async {
                tokio::time::sleep(self.config.reconnect_delay).await;
                self.open_socket().await
            };
            match timeout_at(deadline, attempt).await {
                Err(_) => return Err(BridgeError::Timeout(self.config.capture_timeout)),
                Ok(Ok(socket)) => return Ok(socket),
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, attempt = *used, "reconnect attempt failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    async fn open_with_retries(&self, retries: u32) -> Result<Socket, BridgeError> {
        let mut last_error = String::new();
        for attempt in 0..=retries {
            if attempt > 0 {
                tracing::warn!(
                    attempt,
                    max_attempts = retries,
                    "retrying fingerprint service connection in {:?}",
                    self.config.reconnect_delay
                );
                tokio::time::sleep(self.config.reconnect_delay).await;
            }
            match self.open_socket().await {
                Ok(socket) => return Ok(socket),
                Err(e) => last_error = e.to_string(),
            }
        }
        Err(BridgeError::Unavailable {
            url: self.config.url.clone(),
            attempts: retries + 1,
            reason: last_error,
        })
    }

    async fn open_socket(&self) -> Result<Socket, BridgeError> {
        let attempt = tokio_tungstenite::connect_async(self.config.url.as_str());
        match timeout(self.config.connect_timeout, attempt).await {
            Ok(Ok((socket, _response))) => Ok(socket),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(BridgeError::Timeout(self.config.connect_timeout)),
        }
    }
}
