//! Model bundles: storage, download, device selection and weights

pub mod bundle;
mod device;
mod download;
mod marian;

pub use bundle::BundleManifest;
pub use device::ComputeStrategy;
pub use download::{BundleSource, DownloadEvent, HubSource, ModelDownloader};
pub use marian::MarianModel;
