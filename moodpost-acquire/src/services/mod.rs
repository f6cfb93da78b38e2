//! Acquisition services
//!
//! - `lifecycle`: per-acquisition temp directories
//! - `downloader`: bounded streaming downloads into a scope
//! - `quote`: quote text composition
//! - `assembler`: the top-level acquisition state machine

pub mod assembler;
pub mod downloader;
pub mod lifecycle;
pub mod quote;

pub use assembler::ContentBundleAssembler;
pub use downloader::{AssetDownloader, DownloadLimits};
pub use lifecycle::{ResourceLifecycleManager, ResourceScope};
pub use quote::QuoteComposer;
