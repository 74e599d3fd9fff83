//! I/O helpers: filesystem, subprocesses and OS side effects.

pub mod config;
pub mod effects;
pub mod extension;
pub mod history;
pub mod paths;
pub mod process;
pub mod registry;
