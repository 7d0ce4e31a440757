use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::file_format::FileFormat;

#[derive(Debug, thiserror::Error)]
pub enum SerdeError {
    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yml::Error),
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("binary encoding failed: {0}")]
    BinEncode(#[from] bincode::error::EncodeError),
    #[error("binary decoding failed: {0}")]
    BinDecode(#[from] bincode::error::DecodeError),
    #[error("lz4 decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),
    #[error("text payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("binary payload has {0} trailing bytes")]
    TrailingBytes(usize),
}

pub type Result<T> = std::result::Result<T, SerdeError>;

pub fn serialize<T: Serialize>(value: &T, format: FileFormat) -> Result<Vec<u8>> {
    match format {
        FileFormat::Yaml => Ok(serde_yml::to_string(value)?.into_bytes()),
        FileFormat::Json => Ok(serde_json::to_string_pretty(value)?.into_bytes()),
        FileFormat::Bin => {
            let encoded = bincode::serde::encode_to_vec(value, bincode::config::standard())?;
            // Uncompressed size is prepended as 4 little-endian bytes.
            Ok(lz4_flex::compress_prepend_size(&encoded))
        }
    }
}

pub fn deserialize<T: DeserializeOwned>(serialized: &[u8], format: FileFormat) -> Result<T> {
    match format {
        FileFormat::Yaml => {
            let text = std::str::from_utf8(serialized)?;
            Ok(serde_yml::from_str(text)?)
        }
        FileFormat::Json => {
            let text = std::str::from_utf8(serialized)?;
            Ok(serde_json::from_str(text)?)
        }
        FileFormat::Bin => {
            let decompressed = lz4_flex::decompress_size_prepended(serialized)?;
            let (decoded, read) =
                bincode::serde::decode_from_slice(&decompressed, bincode::config::standard())?;
            if read != decompressed.len() {
                return Err(SerdeError::TrailingBytes(decompressed.len() - read));
            }
            Ok(decoded)
        }
    }
}
