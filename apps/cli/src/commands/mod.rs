//! 命令定义和实现

pub mod config;
pub mod drive;
pub mod ports;
pub mod run;
pub mod send;

pub use config::ConfigCommand;
pub use drive::DriveCommand;
pub use run::RunCommand;
pub use send::SendCommand;
