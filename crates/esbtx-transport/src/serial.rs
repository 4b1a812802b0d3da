use std::io::{Read, Write};
use std::time::Duration;

use serialport::{SerialPort, SerialPortType};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Default line rate for CDC-ACM test targets.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Default read/write timeout on an open port.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// A serial port carrying framed test traffic to one device.
pub struct SerialLink {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    /// Open the named port.
    ///
    /// Failure here means the port is unavailable (unplugged, busy, or
    /// mis-named); the caller is expected to skip this port and continue.
    pub fn open(name: &str, baud: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(name, baud)
            .timeout(timeout)
            .open()
            .map_err(|source| TransportError::Open {
                port: name.to_string(),
                source,
            })?;

        debug!(port = name, baud, "opened serial port");

        Ok(Self {
            name: name.to_string(),
            port,
        })
    }
}

impl Transport for SerialLink {
    fn port_name(&self) -> &str {
        &self.name
    }

    fn try_clone(&self) -> Result<Box<dyn Transport>> {
        let port = self.port.try_clone()?;
        Ok(Box::new(SerialLink {
            name: self.name.clone(),
            port,
        }))
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.port.write_all(buf)?;
        self.port.flush()?;
        Ok(())
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let available = self.port.bytes_to_read()? as usize;
        if available == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; available];
        let read = self.port.read(&mut buf)?;
        buf.truncate(read);
        Ok(buf)
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("port", &self.name)
            .finish()
    }
}

/// A serial port visible to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Platform port name (`/dev/ttyACM0`, `COM10`, ...).
    pub name: String,
    /// Human-readable description of the port's bus type.
    pub kind: String,
}

/// Enumerate the serial ports visible to the host.
pub fn available_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| PortInfo {
            name: p.port_name,
            kind: describe_port_type(&p.port_type),
        })
        .collect())
}

fn describe_port_type(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let mut desc = format!("usb {:04x}:{:04x}", usb.vid, usb.pid);
            if let Some(product) = &usb.product {
                desc.push(' ');
                desc.push_str(product);
            }
            desc
        }
        SerialPortType::PciPort => "pci".to_string(),
        SerialPortType::BluetoothPort => "bluetooth".to_string(),
        SerialPortType::Unknown => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    #[test]
    fn open_nonexistent_port_reports_port_name() {
        let err = SerialLink::open("/dev/esbtx-no-such-port", DEFAULT_BAUD, DEFAULT_TIMEOUT)
            .expect_err("open of a missing port should fail");
        match err {
            TransportError::Open { port, .. } => assert_eq!(port, "/dev/esbtx-no-such-port"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn usb_port_description_includes_ids() {
        let desc = describe_port_type(&SerialPortType::UsbPort(UsbPortInfo {
            vid: 0x1915,
            pid: 0x520F,
            serial_number: None,
            manufacturer: None,
            product: Some("nRF52 USB CDC".to_string()),
        }));
        assert_eq!(desc, "usb 1915:520f nRF52 USB CDC");
    }

    #[test]
    fn non_usb_port_descriptions() {
        assert_eq!(describe_port_type(&SerialPortType::PciPort), "pci");
        assert_eq!(describe_port_type(&SerialPortType::Unknown), "unknown");
    }
}
