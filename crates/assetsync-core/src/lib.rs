pub mod config;
pub mod logging;

pub mod cache;
pub mod checksum;
pub mod client;
pub mod error;
pub mod model;
pub mod retry;
pub mod scheduler;
pub mod storage;
pub mod transfer;
pub mod transport;

pub use client::{AssetClient, ClientOptions, MasterUpload, RenditionData};
pub use error::{AssetError, Result};
