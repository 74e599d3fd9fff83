//! Pure protocol logic: no filesystem, process or terminal access.

pub mod action;
pub mod error;
pub mod manifest;
pub mod page;
pub mod resolver;
