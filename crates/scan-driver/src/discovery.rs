//! Serial port discovery
//!
//! Lists the ports a scanner might be attached to. USB ports carry their
//! vendor and product details, and ports from well-known scanner vendors are
//! flagged so a host can suggest them first.

use serialport::{available_ports, SerialPortType};
use tracing::{debug, info};

use crate::error::{DriverError, Result};

/// USB vendor IDs of common barcode scanner manufacturers
const SCANNER_VENDORS: &[(u16, &str)] = &[
    (0x05E0, "Zebra (Symbol)"),
    (0x05F9, "Datalogic"),
    (0x0C2E, "Honeywell (Metrologic)"),
    (0x1EAB, "Newland"),
];

/// Look up a scanner manufacturer by USB vendor ID
pub fn scanner_vendor(vid: u16) -> Option<&'static str> {
    SCANNER_VENDORS
        .iter()
        .find(|(id, _)| *id == vid)
        .map(|(_, name)| *name)
}

/// A serial port found on this machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPort {
    /// Port name, usable as a `port_id`
    pub port: String,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl DiscoveredPort {
    fn new(port: String, port_type: &SerialPortType) -> Self {
        let mut found = Self {
            port,
            vid: None,
            pid: None,
            serial_number: None,
            manufacturer: None,
            product: None,
        };
        if let SerialPortType::UsbPort(usb) = port_type {
            found.vid = Some(usb.vid);
            found.pid = Some(usb.pid);
            found.serial_number = usb.serial_number.clone();
            found.manufacturer = usb.manufacturer.clone();
            found.product = usb.product.clone();
        }
        found
    }

    /// Known scanner manufacturer, if the USB vendor ID matches one
    pub fn scanner_vendor(&self) -> Option<&'static str> {
        self.vid.and_then(scanner_vendor)
    }

    /// Short description for listings
    pub fn description(&self) -> String {
        match (&self.product, self.scanner_vendor()) {
            (Some(product), _) => product.clone(),
            (None, Some(vendor)) => format!("{} scanner", vendor),
            (None, None) => "Unknown".to_string(),
        }
    }
}

/// Port discovery settings
#[derive(Debug, Clone, Default)]
pub struct DiscoveryConfig {
    /// Skip ports whose name contains any of these
    pub skip_patterns: Vec<String>,
}

/// Enumerates serial ports
#[derive(Debug, Clone)]
pub struct PortScanner {
    config: DiscoveryConfig,
}

impl PortScanner {
    /// Skips Bluetooth and debug ports
    pub fn new() -> Self {
        Self::with_config(DiscoveryConfig {
            skip_patterns: vec!["Bluetooth".to_string(), "debug".to_string()],
        })
    }

    pub fn with_config(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    /// List available ports, known scanner vendors first
    pub fn enumerate_ports(&self) -> Result<Vec<DiscoveredPort>> {
        debug!("Enumerating serial ports");
        let ports =
            available_ports().map_err(|e| DriverError::EnumerationFailed(e.to_string()))?;

        let found = self.filter(
            ports
                .into_iter()
                .map(|p| DiscoveredPort::new(p.port_name, &p.port_type)),
        );

        info!("Found {} serial port(s)", found.len());
        for port in &found {
            info!("  {} - {}", port.port, port.description());
        }
        Ok(found)
    }

    fn filter(&self, ports: impl Iterator<Item = DiscoveredPort>) -> Vec<DiscoveredPort> {
        let mut found: Vec<_> = ports
            .filter(|p| {
                !self
                    .config
                    .skip_patterns
                    .iter()
                    .any(|pattern| p.port.contains(pattern.as_str()))
            })
            .collect();
        // Stable: keeps the OS order within each group
        found.sort_by_key(|p| p.scanner_vendor().is_none());
        found
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    fn usb(vid: u16, product: Option<&str>) -> SerialPortType {
        SerialPortType::UsbPort(UsbPortInfo {
            vid,
            pid: 0x0001,
            serial_number: None,
            manufacturer: None,
            product: product.map(str::to_string),
        })
    }

    #[test]
    fn test_usb_details_copied() {
        let port_type = usb(0x0C2E, Some("Voyager 1250g"));
        let port = DiscoveredPort::new("/dev/ttyACM0".to_string(), &port_type);
        assert_eq!(port.vid, Some(0x0C2E));
        assert_eq!(port.pid, Some(0x0001));
        assert_eq!(port.scanner_vendor(), Some("Honeywell (Metrologic)"));
        assert_eq!(port.description(), "Voyager 1250g");
    }

    #[test]
    fn test_non_usb_port() {
        let port = DiscoveredPort::new("COM1".to_string(), &SerialPortType::Unknown);
        assert_eq!(port.vid, None);
        assert_eq!(port.scanner_vendor(), None);
        assert_eq!(port.description(), "Unknown");
    }

    #[test]
    fn test_filter_skips_and_orders() {
        let scanner = PortScanner::new();
        let ports = vec![
            DiscoveredPort::new("/dev/ttyS0".to_string(), &SerialPortType::Unknown),
            DiscoveredPort::new(
                "/dev/cu.Bluetooth-Incoming-Port".to_string(),
                &SerialPortType::BluetoothPort,
            ),
            DiscoveredPort::new("/dev/ttyACM0".to_string(), &usb(0x05E0, None)),
        ];

        let found = scanner.filter(ports.into_iter());
        let names: Vec<_> = found.iter().map(|p| p.port.as_str()).collect();
        assert_eq!(names, vec!["/dev/ttyACM0", "/dev/ttyS0"]);
        assert_eq!(found[0].description(), "Zebra (Symbol) scanner");
    }
}
