#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::missing_crate_level_docs)]
#![doc = include_str!("../README.md")]

pub mod apply;
pub mod discovery;
pub mod error;
pub mod image;
pub mod options;
pub mod patcher;
pub mod search;
pub mod signature;
pub mod staging;
pub mod write;

pub use apply::{ensure_patched, PatchResult, PatchStatus};
pub use discovery::{
    DiscoveryError, ExecutableDiscovery, Installation, PlatformConfig, SearchPathDiscovery,
};
pub use error::PatchError;
pub use image::ExecutableImage;
pub use options::PatchOptions;
pub use signature::{Signature, SignatureError};
pub use staging::{StageError, StagedInstall};
