//! 串口列表命令

use anyhow::{Context, Result};
use rover_serial::list_ports;

pub fn execute() -> Result<()> {
    let ports = list_ports().context("枚举串口失败")?;

    if ports.is_empty() {
        println!("⚠️  未发现串口设备");
        return Ok(());
    }

    println!("发现 {} 个串口:", ports.len());
    for port in &ports {
        let marker = if port.looks_like_controller() { "🚗" } else { "  " };
        if port.description.is_empty() {
            println!("  {} {}", marker, port.name);
        } else {
            println!("  {} {}  ({})", marker, port.name, port.description);
        }
    }
    Ok(())
}
