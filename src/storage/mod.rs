pub mod files;
pub mod paths;

pub use files::DataStore;
pub use paths::{contains, validate_root, DataRootError};
