//! 串口自动发现
//!
//! 枚举系统串口，挑选第一个看起来像电机控制器的设备：
//! 描述中包含 "Arduino"，或设备路径包含 `ttyUSB` / `ttyACM`。

use crate::SerialError;
use serialport::SerialPortType;
use tracing::debug;

/// 串口设备信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// 设备路径（如 `/dev/ttyACM0`）
    pub name: String,
    /// 设备描述（USB 厂商 + 产品名，可能为空）
    pub description: String,
}

impl PortInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    /// 是否像是电机控制器
    pub fn looks_like_controller(&self) -> bool {
        self.description.contains("Arduino")
            || self.name.contains("ttyUSB")
            || self.name.contains("ttyACM")
    }
}

/// 列出系统上的所有串口
pub fn list_ports() -> Result<Vec<PortInfo>, SerialError> {
    let ports = serialport::available_ports().map_err(|e| SerialError::Connection {
        port: "<enumerate>".to_string(),
        message: e.to_string(),
    })?;

    Ok(ports
        .into_iter()
        .map(|p| {
            let description = match p.port_type {
                SerialPortType::UsbPort(usb) => [usb.manufacturer, usb.product]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" "),
                SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                SerialPortType::PciPort => "PCI".to_string(),
                SerialPortType::Unknown => String::new(),
            };
            PortInfo::new(p.port_name, description)
        })
        .collect())
}

/// 在给定列表中挑选控制器端口
pub fn pick_controller_port(ports: &[PortInfo]) -> Option<&PortInfo> {
    ports.iter().find(|p| p.looks_like_controller())
}

/// 自动发现控制器端口
///
/// 没有找到时返回 `Ok(None)`。
pub fn discover_port() -> Result<Option<String>, SerialError> {
    let ports = list_ports()?;
    debug!("Found {} serial ports", ports.len());
    Ok(pick_controller_port(&ports).map(|p| p.name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_controller() {
        assert!(PortInfo::new("/dev/ttyACM0", "").looks_like_controller());
        assert!(PortInfo::new("/dev/ttyUSB1", "").looks_like_controller());
        assert!(PortInfo::new("COM3", "Arduino LLC Arduino Uno").looks_like_controller());
        assert!(!PortInfo::new("/dev/ttyS0", "").looks_like_controller());
        assert!(!PortInfo::new("COM1", "PCI").looks_like_controller());
    }

    #[test]
    fn test_pick_first_controller() {
        let ports = vec![
            PortInfo::new("/dev/ttyS0", ""),
            PortInfo::new("/dev/ttyACM0", "Arduino Mega"),
            PortInfo::new("/dev/ttyUSB0", "FTDI"),
        ];
        assert_eq!(pick_controller_port(&ports).unwrap().name, "/dev/ttyACM0");

        let ports = vec![PortInfo::new("/dev/ttyS0", "")];
        assert!(pick_controller_port(&ports).is_none());
    }
}
