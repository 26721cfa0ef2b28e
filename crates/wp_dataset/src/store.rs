//! On-disk caches for split archives and transformed tensors.
//!
//! Layout under the dataset folder:
//! - `<split>/<split>.msgpack.lz4`: the split's validated rounds
//! - `<split>/<transform key>.msgpack.lz4`: features + labels per transform
//!
//! Format: MessagePack (named fields) → LZ4 (size prepended) → SHA256 of the
//! compressed payload appended as a 32 byte trailer. Files are written to a
//! temp path and renamed into place, with a `.meta.json` sidecar.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use ndarray::{Array1, Array4};
use rmp_serde::{from_slice, to_vec_named};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use wp_core::{RoundFrames, TransformKind};

use crate::error::{DatasetError, Result};
use crate::split::Split;

/// Bumped whenever the archived structs change shape.
pub const CACHE_VERSION: u32 = 1;

pub const CACHE_EXTENSION: &str = "msgpack.lz4";

const CHECKSUM_LEN: usize = 32;

pub fn split_dir(folder: &Path, split: Split) -> PathBuf {
    folder.join(split.as_str())
}

pub fn split_archive_path(folder: &Path, split: Split) -> PathBuf {
    split_dir(folder, split).join(format!("{}.{}", split.as_str(), CACHE_EXTENSION))
}

pub fn tensor_cache_path(folder: &Path, split: Split, transform: TransformKind) -> PathBuf {
    split_dir(folder, split).join(format!("{}.{}", transform.cache_key(), CACHE_EXTENSION))
}

fn temp_path(cache_file: &Path) -> PathBuf {
    let mut name = cache_file.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    cache_file.with_file_name(name)
}

pub fn metadata_path(cache_file: &Path) -> PathBuf {
    let mut name = cache_file.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".meta.json");
    cache_file.with_file_name(name)
}

/// Validated rounds of one split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitArchive {
    pub version: u32,
    pub split: Split,
    pub rounds: Vec<RoundFrames>,
}

impl SplitArchive {
    pub fn new(split: Split, rounds: Vec<RoundFrames>) -> Self {
        Self { version: CACHE_VERSION, split, rounds }
    }
}

/// Transformed samples of one split, labels parallel to the first axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorCache {
    pub version: u32,
    pub split: Split,
    pub transform: TransformKind,
    pub features: Array4<f32>,
    pub labels: Array1<f32>,
}

impl TensorCache {
    pub fn new(
        split: Split,
        transform: TransformKind,
        features: Array4<f32>,
        labels: Array1<f32>,
    ) -> Result<Self> {
        if features.shape()[0] != labels.len() {
            return Err(DatasetError::Corrupted);
        }
        Ok(Self { version: CACHE_VERSION, split, transform, features, labels })
    }
}

/// Cache metadata sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub version: u32,
    /// SHA256 of the compressed payload (hex)
    pub checksum: String,
    /// RFC3339
    pub created_at: String,
    /// MessagePack size (bytes)
    pub original_size: u64,
    /// LZ4 size (bytes)
    pub compressed_size: u64,
    /// compressed / original
    pub compression_ratio: f64,
}

/// Serialize, compress and append the checksum trailer.
pub fn serialize_and_compress<T: Serialize>(value: &T) -> Result<(Vec<u8>, CacheMetadata)> {
    // 1. MessagePack with field names
    let msgpack = to_vec_named(value)?;
    let original_size = msgpack.len() as u64;

    // 2. LZ4 (size prepended)
    let compressed = compress_prepend_size(&msgpack);
    let compressed_size = compressed.len() as u64;

    // 3. SHA256 trailer
    let mut hasher = Sha256::new();
    hasher.update(&compressed);
    let digest = hasher.finalize();
    let checksum = format!("{:x}", digest);

    let mut bytes = compressed;
    bytes.extend_from_slice(&digest);

    let metadata = CacheMetadata {
        version: CACHE_VERSION,
        checksum,
        created_at: chrono::Utc::now().to_rfc3339(),
        original_size,
        compressed_size,
        compression_ratio: if original_size == 0 {
            1.0
        } else {
            compressed_size as f64 / original_size as f64
        },
    };

    Ok((bytes, metadata))
}

/// Verify the trailer, decompress and deserialize.
pub fn decompress_and_deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    // size header + checksum
    if bytes.len() < 4 + CHECKSUM_LEN {
        return Err(DatasetError::Corrupted);
    }

    let (payload, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);

    let mut hasher = Sha256::new();
    hasher.update(payload);
    if hasher.finalize().as_slice() != checksum {
        return Err(DatasetError::ChecksumMismatch);
    }

    let msgpack = decompress_size_prepended(payload).map_err(|_| DatasetError::Decompression)?;
    Ok(from_slice(&msgpack)?)
}

/// Write `value` atomically to `path` plus its metadata sidecar.
pub fn write_cache<T: Serialize>(path: &Path, value: &T) -> Result<CacheMetadata> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let (data, metadata) = serialize_and_compress(value)?;

    // Atomic save: write to temp file, then rename
    let temp_path = temp_path(path);
    {
        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.flush()?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, path)?;

    let sidecar = serde_json::to_string_pretty(&metadata)
        .map_err(|e| DatasetError::Config(format!("metadata encoding failed: {e}")))?;
    fs::write(metadata_path(path), sidecar)?;

    log::debug!("Saved {} bytes to {:?}", data.len(), path);
    Ok(metadata)
}

pub fn read_cache<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(DatasetError::FileNotFound { path: path.display().to_string() });
    }
    let data = fs::read(path)?;
    let value = decompress_and_deserialize(&data)?;
    log::debug!("Loaded {} bytes from {:?}", data.len(), path);
    Ok(value)
}

pub fn read_metadata(path: &Path) -> Result<Option<CacheMetadata>> {
    let sidecar = metadata_path(path);
    if !sidecar.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(sidecar)?;
    serde_json::from_str(&json)
        .map(Some)
        .map_err(|e| DatasetError::Config(format!("bad metadata sidecar: {e}")))
}

/// Checks the embedded trailer and, when present, the sidecar checksum.
pub fn verify_cache(path: &Path) -> Result<bool> {
    let bytes = fs::read(path)?;
    if bytes.len() < 4 + CHECKSUM_LEN {
        return Ok(false);
    }
    let (payload, trailer) = bytes.split_at(bytes.len() - CHECKSUM_LEN);

    let mut hasher = Sha256::new();
    hasher.update(payload);
    let digest = hasher.finalize();
    if digest.as_slice() != trailer {
        return Ok(false);
    }

    match read_metadata(path)? {
        Some(meta) => Ok(meta.checksum == format!("{:x}", digest)),
        None => Ok(true),
    }
}

pub fn write_split_archive(folder: &Path, archive: &SplitArchive) -> Result<CacheMetadata> {
    write_cache(&split_archive_path(folder, archive.split), archive)
}

pub fn read_split_archive(folder: &Path, split: Split) -> Result<SplitArchive> {
    let archive: SplitArchive = read_cache(&split_archive_path(folder, split))?;
    if archive.version > CACHE_VERSION {
        return Err(DatasetError::VersionMismatch { found: archive.version, expected: CACHE_VERSION });
    }
    Ok(archive)
}

pub fn write_tensor_cache(folder: &Path, cache: &TensorCache) -> Result<CacheMetadata> {
    write_cache(&tensor_cache_path(folder, cache.split, cache.transform), cache)
}

pub fn read_tensor_cache(folder: &Path, split: Split, transform: TransformKind) -> Result<TensorCache> {
    let cache: TensorCache = read_cache(&tensor_cache_path(folder, split, transform))?;
    if cache.version > CACHE_VERSION {
        return Err(DatasetError::VersionMismatch { found: cache.version, expected: CACHE_VERSION });
    }
    if cache.transform != transform {
        return Err(DatasetError::TransformMismatch { found: cache.transform, expected: transform });
    }
    if cache.features.shape()[0] != cache.labels.len() {
        return Err(DatasetError::Corrupted);
    }
    Ok(cache)
}

/// Human-readable byte size formatting
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;
    use tempfile::TempDir;
    use wp_core::{synthetic, RoundKey};

    fn tensor_cache() -> TensorCache {
        let features = Array::from_shape_fn((3, 6, 5, 5), |(s, c, i, j)| {
            (s * 1000 + c * 100 + i * 10 + j) as f32 / 7.0
        });
        let labels = Array1::from(vec![1.0, 1.0, 0.0]);
        TensorCache::new(Split::Val, TransformKind::MultiChannel, features, labels).unwrap()
    }

    #[test]
    fn test_paths() {
        let folder = Path::new("/data/csgo");
        assert_eq!(
            split_archive_path(folder, Split::Train),
            PathBuf::from("/data/csgo/train/train.msgpack.lz4")
        );
        assert_eq!(
            tensor_cache_path(folder, Split::Test, TransformKind::Extended),
            PathBuf::from("/data/csgo/test/transform_nfl.msgpack.lz4")
        );
        assert_eq!(
            metadata_path(&tensor_cache_path(folder, Split::Test, TransformKind::Basic)),
            PathBuf::from("/data/csgo/test/transform_data.msgpack.lz4.meta.json")
        );
    }

    #[test]
    fn test_tensor_cache_roundtrip_is_bit_identical() {
        let dir = TempDir::new().unwrap();
        let cache = tensor_cache();

        write_tensor_cache(dir.path(), &cache).unwrap();
        let loaded = read_tensor_cache(dir.path(), Split::Val, TransformKind::MultiChannel).unwrap();

        assert_eq!(loaded.features.shape(), cache.features.shape());
        for (a, b) in loaded.features.iter().zip(cache.features.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        assert_eq!(loaded, cache);
    }

    #[test]
    fn test_wrong_transform_rejected() {
        let dir = TempDir::new().unwrap();
        let cache = tensor_cache();
        let path = tensor_cache_path(dir.path(), Split::Val, TransformKind::Basic);
        write_cache(&path, &cache).unwrap();

        let err = read_tensor_cache(dir.path(), Split::Val, TransformKind::Basic).unwrap_err();
        assert!(matches!(err, DatasetError::TransformMismatch { .. }));
    }

    #[test]
    fn test_split_archive_roundtrip() {
        let dir = TempDir::new().unwrap();
        let round = synthetic::full_round(RoundKey::new(3, "de_dust2", 1), &[1, 2], 100);
        let archive = SplitArchive::new(Split::Train, vec![round]);

        write_split_archive(dir.path(), &archive).unwrap();
        assert_eq!(read_split_archive(dir.path(), Split::Train).unwrap(), archive);
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = tensor_cache_path(dir.path(), Split::Val, TransformKind::MultiChannel);
        write_cache(&path, &tensor_cache()).unwrap();

        assert!(path.exists());
        assert!(metadata_path(&path).exists());
        assert!(!temp_path(&path).exists());
        assert!(verify_cache(&path).unwrap());
    }

    #[test]
    fn test_checksum_validation() {
        let (mut bytes, _) = serialize_and_compress(&tensor_cache()).unwrap();
        if let Some(last) = bytes.last_mut() {
            *last = last.wrapping_add(1);
        }
        let result = decompress_and_deserialize::<TensorCache>(&bytes);
        assert!(matches!(result, Err(DatasetError::ChecksumMismatch)));

        assert!(matches!(
            decompress_and_deserialize::<TensorCache>(&[0u8; 8]),
            Err(DatasetError::Corrupted)
        ));
    }

    #[test]
    fn test_verify_detects_tampering() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.msgpack.lz4");
        write_cache(&path, &tensor_cache()).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes[5] ^= 0xff;
        fs::write(&path, bytes).unwrap();
        assert!(!verify_cache(&path).unwrap());
    }

    #[test]
    fn test_missing_cache_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = read_split_archive(dir.path(), Split::Test).unwrap_err();
        assert!(matches!(err, DatasetError::FileNotFound { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(0), "0.00 B");
        assert_eq!(human_bytes(1536), "1.50 KB");
        assert_eq!(human_bytes(1024 * 1024), "1.00 MB");
    }
}
