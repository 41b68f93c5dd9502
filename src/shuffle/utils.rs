use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub fn canonicalize_existing(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        anyhow::bail!("{} does not exist", path.display());
    }
    path.canonicalize()
        .with_context(|| format!("Failed to canonicalize path {}", path.display()))
}

const SAMPLE_SIZE: usize = 64 * 1024;
const SAMPLE_COUNT: u64 = 64;

/// Identify a (possibly huge) video by its size plus evenly spaced samples.
/// Small files are hashed in full.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open {} for hashing", path.display()))?;
    let file_size = file
        .metadata()
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?
        .len();

    let mut hasher = Sha256::new();
    hasher.update(file_size.to_le_bytes());
    let mut buffer = vec![0u8; SAMPLE_SIZE];

    if file_size <= SAMPLE_SIZE as u64 * SAMPLE_COUNT {
        loop {
            let read = file
                .read(&mut buffer)
                .with_context(|| format!("Failed to read {} for hashing", path.display()))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
    } else {
        let step = (file_size - SAMPLE_SIZE as u64) / (SAMPLE_COUNT - 1);
        for i in 0..SAMPLE_COUNT {
            file.seek(SeekFrom::Start(step * i))
                .with_context(|| format!("Failed to seek {} for hashing", path.display()))?;
            file.read_exact(&mut buffer)
                .with_context(|| format!("Failed to read {} for hashing", path.display()))?;
            hasher.update(&buffer);
        }
    }

    Ok(format!("{:x}", hasher.finalize()))
}
