pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod render;

pub use hwt_core as core;
pub use hwt_core::capture;
pub use hwt_core::model;
pub use hwt_core::services;

pub use hwt_core::AppConfig;
