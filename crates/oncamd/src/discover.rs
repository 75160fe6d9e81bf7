//! One-shot network survey used by the `oncam-discover` tool.

use std::io::{self, Write};

use futures::future::join_all;
use thiserror::Error;

use crate::device_service::{DeviceDescriptor, DeviceService, ServiceError, UNKNOWN_HARDWARE_ADDRESS};

/// Errors raised while surveying the network.
#[derive(Debug, Error)]
pub enum DiscoverError {
    /// The probe itself failed.
    #[error("discovery probe failed: {0}")]
    Probe(#[from] ServiceError),
    /// Writing the report failed.
    #[error("failed to write report: {0}")]
    Output(#[from] io::Error),
}

/// Probes once and writes every responding camera to `out`.
///
/// Returns the number of cameras reported.
pub async fn write_discovery_report<W: Write>(
    service: &dyn DeviceService,
    out: &mut W,
) -> Result<usize, DiscoverError> {
    let descriptors = service.probe().await?;
    let macs = join_all(descriptors.iter().map(|descriptor| async {
        service
            .resolve_hardware_address(&descriptor.address)
            .await
            .unwrap_or_else(|_| UNKNOWN_HARDWARE_ADDRESS.to_owned())
    }))
    .await;

    if descriptors.is_empty() {
        writeln!(out, "no cameras found")?;
    }
    for (descriptor, mac) in descriptors.iter().zip(macs) {
        write_camera(out, descriptor, &mac)?;
    }
    out.flush()?;
    Ok(descriptors.len())
}

fn write_camera<W: Write>(out: &mut W, camera: &DeviceDescriptor, mac: &str) -> io::Result<()> {
    writeln!(out, "{} ({})", camera.address, camera.name)?;
    writeln!(out, "  mac:       {mac}")?;
    writeln!(out, "  urn:       {}", camera.urn)?;
    writeln!(out, "  hardware:  {}", camera.hardware)?;
    writeln!(out, "  location:  {}", camera.location)?;
    writeln!(out, "  types:     {}", camera.types.join(" "))?;
    for address in &camera.service_addresses {
        writeln!(out, "  xaddr:     {address}")?;
    }
    for scope in &camera.scopes {
        writeln!(out, "  scope:     {scope}")?;
    }
    Ok(())
}
