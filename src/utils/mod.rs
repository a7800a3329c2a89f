pub mod crypto;
pub mod file;
pub mod format;
pub mod paths;
