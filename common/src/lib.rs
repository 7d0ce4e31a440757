pub mod buffer3;
pub mod file_format;
pub mod log_setup;
pub mod serde;
pub mod test_utils;

pub use buffer3::Buffer3;
pub use file_format::{FileExtensionError, FileFormat};
pub use crate::serde::{deserialize, serialize, SerdeError};

pub fn is_debug() -> bool {
    cfg!(debug_assertions)
}
