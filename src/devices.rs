use std::collections::HashSet;
use std::str::FromStr as _;

use mac_address::MacAddress;

use crate::config::DeviceConfig;

/// Lower-cases an identifier, canonicalising it first when it parses as a
/// hardware address (so `AA-BB-..` and `aa:bb:..` end up equal).
pub fn normalize_identifier(identifier: &str) -> String {
    let trimmed = identifier.trim();
    match MacAddress::from_str(trimmed) {
        Ok(mac) => mac.to_string().to_lowercase(),
        Err(_) => trimmed.to_lowercase(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnownDevice {
    identifier: String,
    label: String,
}

impl KnownDevice {
    pub fn new(identifier: &str, label: &str) -> Self {
        KnownDevice {
            identifier: normalize_identifier(identifier),
            label: label.to_string(),
        }
    }

    /// Label for messages, falling back to the identifier when unnamed.
    pub fn display_name(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.identifier
        } else {
            &self.label
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("device {0} is listed more than once")]
pub struct DuplicateDevice(pub String);

/// The set of known devices, in configuration order. Read-only once built.
#[derive(Clone, Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<KnownDevice>,
}

impl DeviceRegistry {
    pub fn new(devices: Vec<KnownDevice>) -> Result<Self, DuplicateDevice> {
        let mut seen = HashSet::new();
        for device in &devices {
            if !seen.insert(device.identifier.clone()) {
                return Err(DuplicateDevice(device.identifier.clone()));
            }
        }
        Ok(DeviceRegistry { devices })
    }

    pub fn from_config(devices: &[DeviceConfig]) -> Result<Self, DuplicateDevice> {
        Self::new(
            devices
                .iter()
                .map(|d| KnownDevice::new(&d.address, &d.name))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Known devices whose identifier shows up anywhere in the scan output,
    /// compared case-insensitively.
    pub fn match_output(&self, raw_output: &str) -> PresentDeviceSet {
        let output = raw_output.to_lowercase();
        PresentDeviceSet {
            devices: self
                .devices
                .iter()
                .filter(|device| output.contains(device.identifier.as_str()))
                .cloned()
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PresentDeviceSet {
    devices: Vec<KnownDevice>,
}

impl PresentDeviceSet {
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.devices.iter().map(KnownDevice::display_name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARP_SCAN_OUTPUT: &str = "Interface: enp0s31f6, type: EN10MB\n\
        192.168.1.10\tC0:EE:FB:FB:CB:B4\tOnePlus Tech (Shenzhen) Ltd\n\
        192.168.1.20\t00:11:22:33:44:55\tSomething Else\n\
        \n2 packets received by filter, 0 packets dropped by kernel\n";

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new(vec![
            KnownDevice::new("c0:ee:fb:fb:cb:b4", "DJ's Phone"),
            KnownDevice::new("04:f7:e4:84:91:f2", "PD's Phone"),
        ])
        .unwrap()
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let upper = DeviceRegistry::new(vec![KnownDevice::new("aa:bb", "x")]).unwrap();
        let lower = DeviceRegistry::new(vec![KnownDevice::new("AA:BB", "x")]).unwrap();

        assert_eq!(upper.match_output("AA:BB").len(), 1);
        assert_eq!(lower.match_output("aa:bb").len(), 1);
    }

    #[test]
    fn test_match_arp_scan_output() {
        let present = registry().match_output(ARP_SCAN_OUTPUT);
        assert_eq!(present.labels(), vec!["DJ's Phone"]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(registry().match_output("").is_empty());
        assert!(registry().match_output("garbage \u{0} output").is_empty());
        assert!(DeviceRegistry::default().match_output(ARP_SCAN_OUTPUT).is_empty());
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier(" AA-BB-CC-DD-EE-FF "), "aa:bb:cc:dd:ee:ff");
        assert_eq!(normalize_identifier("Not-A-Mac"), "not-a-mac");
    }

    #[test]
    fn test_duplicate_devices_rejected() {
        let result = DeviceRegistry::new(vec![
            KnownDevice::new("aa:aa:aa:aa:aa:aa", "Phone"),
            KnownDevice::new("AA:AA:AA:AA:AA:AA", "Tablet"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unlabelled_device_uses_identifier() {
        let registry = DeviceRegistry::new(vec![KnownDevice::new("aa:aa:aa:aa:aa:aa", "")]).unwrap();
        let present = registry.match_output("aa:aa:aa:aa:aa:aa");
        assert_eq!(present.labels(), vec!["aa:aa:aa:aa:aa:aa"]);
    }
}
