use crate::domain::error::{ComTermError, ComTermResult};
use serde::Serialize;
use serialport::SerialPortType;

/// An enumerated serial port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortSummary {
    pub name: String,
    pub kind: String,
    pub description: String,
}

impl PortSummary {
    fn from_info(info: serialport::SerialPortInfo) -> Self {
        let (kind, description) = match info.port_type {
            SerialPortType::UsbPort(usb) => {
                let mut description = format!("{:04x}:{:04x}", usb.vid, usb.pid);
                if let Some(product) = usb.product {
                    description.push(' ');
                    description.push_str(&product);
                }
                ("usb".to_string(), description)
            }
            SerialPortType::PciPort => ("pci".to_string(), String::new()),
            SerialPortType::BluetoothPort => ("bluetooth".to_string(), String::new()),
            SerialPortType::Unknown => ("unknown".to_string(), String::new()),
        };

        Self {
            name: info.port_name,
            kind,
            description,
        }
    }
}

/// List the serial ports present on this machine, sorted by name
pub fn list_ports() -> ComTermResult<Vec<PortSummary>> {
    let mut ports: Vec<PortSummary> = serialport::available_ports()
        .map_err(enumeration_error)?
        .into_iter()
        .map(PortSummary::from_info)
        .collect();

    ports.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(ports)
}

fn enumeration_error(e: serialport::Error) -> ComTermError {
    ComTermError::PortEnumeration(e.to_string())
}
