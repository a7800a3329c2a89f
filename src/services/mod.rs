pub mod app_runtime_service;
pub mod archive_installer;
pub mod catalog_service;
pub mod download_pipeline;
pub mod icon_cache;
pub mod install_manager;
pub mod install_state;
pub mod platform;
pub mod update_checker;

pub use app_runtime_service::{AppRuntimeService, RunningApp};
pub use archive_installer::ArchiveInstaller;
pub use catalog_service::{Catalog, CatalogService};
pub use download_pipeline::{DownloadControl, DownloadPipeline};
pub use icon_cache::IconCache;
pub use install_manager::InstallManager;
pub use install_state::InstallStateTracker;
pub use platform::PlatformAdapter;
pub use update_checker::{UpdateChecker, UpdaterConfig};
