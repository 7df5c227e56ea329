use crate::config::Config;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use time::format_description::well_known::Rfc3339;

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).with_context(|| format!("create_dir_all {}", p.display()))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    format!("{:x}", h.finalize())
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Longest prefix of `s` with at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Final path component as a string, falling back to the full display form.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

pub fn looks_like_url(s: &str) -> bool {
    let s = s.to_ascii_lowercase();
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://")
}

/// Content hash used for job ids. `fast_2x16mb` hashes the head and tail
/// windows plus the length; `full_sha256` hashes everything.
pub fn hash_file(cfg: &Config, path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let size = f.metadata().with_context(|| format!("stat {}", path.display()))?.len();
    let mut h = Sha256::new();

    match cfg.hashing.mode.as_str() {
        "full_sha256" => {
            std::io::copy(&mut f, &mut h).with_context(|| format!("read {}", path.display()))?;
        }
        "fast_2x16mb" => {
            let window = cfg.hashing.fast_window_bytes.min(size);
            let mut offsets = vec![0];
            if size > window {
                offsets.push(size - window);
            }
            if window > 0 {
                let mut buf = vec![0u8; window as usize];
                for offset in offsets {
                    f.seek(SeekFrom::Start(offset))?;
                    f.read_exact(&mut buf)?;
                    h.update(&buf);
                }
            }
            h.update(size.to_le_bytes());
        }
        other => anyhow::bail!("unknown hashing.mode: {other}"),
    }
    Ok(format!("{:x}", h.finalize()))
}
