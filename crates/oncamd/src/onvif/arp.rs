//! Link-layer address lookup through the kernel neighbour table.

use std::path::Path;

use crate::device_service::ServiceError;

/// Linux ARP table.
pub const ARP_TABLE: &str = "/proc/net/arp";

/// `ATF_COM`: the entry is complete.
const COMPLETE_FLAG: u32 = 0x2;

/// Reads `table` and returns the hardware address recorded for `address`.
pub(super) async fn resolve(table: &Path, address: &str) -> Result<String, ServiceError> {
    let contents = tokio::fs::read_to_string(table).await?;
    lookup(&contents, address).ok_or_else(|| ServiceError::HardwareAddressUnknown {
        address: address.to_owned(),
    })
}

/// Parses `/proc/net/arp` content.
///
/// Columns: IP address, HW type, Flags, HW address, Mask, Device.
pub(super) fn lookup(contents: &str, address: &str) -> Option<String> {
    contents.lines().skip(1).find_map(|line| {
        let mut columns = line.split_whitespace();
        let ip = columns.next()?;
        let _hw_type = columns.next()?;
        let flags = columns.next()?;
        let mac = columns.next()?;
        let complete = u32::from_str_radix(flags.trim_start_matches("0x"), 16)
            .is_ok_and(|bits| bits & COMPLETE_FLAG != 0);
        (ip == address && complete && mac != "00:00:00:00:00:00").then(|| mac.to_ascii_lowercase())
    })
}
