//! # Fingerprint Subcommand
//!
//! Talks to the workstation's reader service through `inventa-biometric`.
//! `devices` lists attached readers. `capture` takes one fingerprint and,
//! with `--enroll <staff-id>`, registers it for that staff member through
//! the API.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use inventa_biometric::{BridgeConfig, CaptureResult, CaptureStatus, FingerprintClient};
use serde_json::Value;
use uuid::Uuid;

use crate::api::ApiClient;

/// Arguments for `inventa fingerprint`.
#[derive(Args, Debug)]
pub struct FingerprintArgs {
    #[command(subcommand)]
    pub command: FingerprintCommand,
}

#[derive(Subcommand, Debug)]
pub enum FingerprintCommand {
    /// List readers reported by the service.
    Devices(ReaderArgs),
    /// Capture one fingerprint.
    Capture(CaptureArgs),
}

/// Reader service selection.
#[derive(Args, Debug, Clone)]
pub struct ReaderArgs {
    /// Reader service URL. Defaults to `INVENTA_BIOMETRIC_URL` or `ws://localhost:8090`.
    #[arg(long)]
    pub url: Option<String>,

    /// Use the simulated reader without contacting the service.
    #[arg(long)]
    pub simulate: bool,
}

/// Arguments for `inventa fingerprint capture`.
#[derive(Args, Debug)]
pub struct CaptureArgs {
    #[command(flatten)]
    pub reader: ReaderArgs,

    /// Enroll the capture for this staff member.
    #[arg(long, value_name = "STAFF_ID")]
    pub enroll: Option<Uuid>,

    /// Base URL of the API, used with `--enroll`.
    #[arg(long, default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Bearer token, used with `--enroll`.
    #[arg(long)]
    pub token: Option<String>,
}

fn client(reader: &ReaderArgs) -> Result<FingerprintClient> {
    let mut config = BridgeConfig::from_env()?;
    if let Some(url) = &reader.url {
        config = config.with_url(url)?;
    }
    Ok(if reader.simulate {
        FingerprintClient::simulated(config)
    } else {
        FingerprintClient::new(config)
    })
}

fn describe(status: &CaptureStatus) -> String {
    match status {
        CaptureStatus::DeviceConnected(device) => format!("reader connected: {}", device.name),
        CaptureStatus::FingerDetected => "finger detected".to_string(),
        CaptureStatus::Processing => "processing".to_string(),
    }
}

/// Register `capture` for `staff_id` and return the stored enrollment.
pub async fn enroll(api: &ApiClient, staff_id: Uuid, capture: &CaptureResult) -> Result<Value> {
    let body = serde_json::to_value(capture).context("failed to encode capture")?;
    api.post(&format!("personnel/{staff_id}/fingerprint"), &body).await
}

/// Entry point for `inventa fingerprint`.
pub async fn run_fingerprint(args: &FingerprintArgs) -> Result<u8> {
    match &args.command {
        FingerprintCommand::Devices(reader) => {
            let mut client = client(reader)?;
            let devices = client.devices().await?;
            if client.is_simulated() {
                eprintln!("(simulated reader)");
            }
            if devices.is_empty() {
                println!("no readers found");
            }
            for device in &devices {
                match &device.model {
                    Some(model) => println!("{}  {} ({model})", device.id, device.name),
                    None => println!("{}  {}", device.id, device.name),
                }
            }
            client.close().await;
            Ok(0)
        }
        FingerprintCommand::Capture(capture_args) => {
            let mut client = client(&capture_args.reader)?;
            eprintln!("place a finger on the reader");
            let capture = client
                .capture(|status| eprintln!("  {}", describe(&status)))
                .await?;
            client.close().await;

            if !capture.verify() {
                anyhow::bail!("capture hash does not match its template");
            }
            println!("hash:    {}", capture.hash);
            if let Some(quality) = capture.quality {
                println!("quality: {quality}");
            }
            if let Some(device) = &capture.device_id {
                println!("reader:  {device}");
            }

            if let Some(staff_id) = capture_args.enroll {
                let api = ApiClient::new(&capture_args.api_url, capture_args.token.as_deref())?;
                let enrollment = enroll(&api, staff_id, &capture).await?;
                let at = enrollment["enrolled_at"].as_str().unwrap_or("now");
                println!("enrolled for staff member {staff_id} at {at}");
            }
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventa_biometric::DeviceInfo;

    #[test]
    fn statuses_read_naturally() {
        let device = DeviceInfo {
            id: "R1".into(),
            name: "Lector USB".into(),
            model: None,
        };
        assert_eq!(describe(&CaptureStatus::DeviceConnected(device)), "reader connected: Lector USB");
        assert_eq!(describe(&CaptureStatus::FingerDetected), "finger detected");
    }

    #[test]
    fn simulate_flag_selects_simulator() {
        let reader = ReaderArgs {
            url: None,
            simulate: true,
        };
        assert!(client(&reader).unwrap().is_simulated());
    }

    #[test]
    fn non_websocket_url_is_rejected() {
        let reader = ReaderArgs {
            url: Some("http://localhost:8090".into()),
            simulate: false,
        };
        assert!(client(&reader).is_err());
    }
}
