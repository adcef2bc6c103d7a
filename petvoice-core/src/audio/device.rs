//! Audio output device enumeration.

use serde::{Deserialize, Serialize};

/// Metadata about an audio output device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Human-readable device name reported by the OS.
    pub name: String,
    /// Whether this is the system default output device.
    pub is_default: bool,
}

/// Pick the device a playback should open.
///
/// An exact name match wins, then a case-insensitive match, then the system
/// default. `None` means "let the host choose".
pub fn resolve_output_device(devices: &[DeviceInfo], preferred: Option<&str>) -> Option<String> {
    let preferred = preferred.map(str::trim).filter(|p| !p.is_empty());

    if let Some(wanted) = preferred {
        if let Some(d) = devices.iter().find(|d| d.name == wanted) {
            return Some(d.name.clone());
        }
        if let Some(d) = devices.iter().find(|d| d.name.eq_ignore_ascii_case(wanted)) {
            return Some(d.name.clone());
        }
        tracing::warn!("preferred output device '{wanted}' not found, falling back");
    }

    devices.iter().find(|d| d.is_default).map(|d| d.name.clone())
}

/// List all available audio output devices, default first.
///
/// Returns an empty `Vec` if cpal is not available or no devices exist.
#[cfg(feature = "audio-cpal")]
pub fn list_output_devices() -> Vec<DeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    match host.output_devices() {
        Ok(devices) => {
            let mut list = devices
                .enumerate()
                .map(|(idx, device)| {
                    let name = device
                        .name()
                        .unwrap_or_else(|_| format!("Output Device {}", idx + 1));
                    let is_default = default_name.as_deref() == Some(name.as_str());
                    DeviceInfo { name, is_default }
                })
                .collect::<Vec<_>>();
            list.sort_by_key(|d| (!d.is_default, d.name.to_ascii_lowercase()));
            list
        }
        Err(e) => {
            tracing::warn!("failed to enumerate output devices: {e}");
            default_name
                .map(|name| vec![DeviceInfo { name, is_default: true }])
                .unwrap_or_default()
        }
    }
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_output_devices() -> Vec<DeviceInfo> {
    vec![]
}
