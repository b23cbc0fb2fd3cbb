pub use hwt_cli::cli;
pub use hwt_cli::commands;
pub use hwt_cli::config;
pub use hwt_cli::logging;
pub use hwt_cli::render;
pub use hwt_cli::AppConfig;

pub use hwt_core as core;
pub use hwt_core::capture;
pub use hwt_core::database as db;
pub use hwt_core::model;
pub use hwt_core::parser;
