//! Binary values stored as file references.
//!
//! On read the field names a file whose content is returned base64 encoded;
//! on write the (base64 or raw) content is stored in a file named from a
//! template and the field receives the file name.

use std::path::{Path, PathBuf};

use base64::Engine as _;

use super::RowContext;

/// Characters not allowed in file names on common platforms.
const INVALID_FILE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryFormatter {
    pub read_folder: PathBuf,
    pub write_folder: PathBuf,
    pub file_output_placeholder: String,
    pub overwrite: bool,
    pub size_limit: u64,
}

impl BinaryFormatter {
    fn resolve(folder: &Path, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() || folder.as_os_str().is_empty() {
            path.to_path_buf()
        } else {
            folder.join(path)
        }
    }

    pub async fn read(&self, raw: &str, warn: &mut (dyn FnMut(String) + Send)) -> String {
        let name = raw.trim();
        if name.is_empty() {
            return String::new();
        }
        let path = Self::resolve(&self.read_folder, name);
        let size = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                warn(format!("File '{}' not found", path.display()));
                return String::new();
            }
        };
        if size > self.size_limit {
            warn(format!(
                "File '{}' has {} bytes, more than the limit of {}",
                path.display(),
                size,
                self.size_limit
            ));
            return String::new();
        }
        match tokio::fs::read(&path).await {
            Ok(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
            Err(e) => {
                warn(format!("File '{}' could not be read: {}", path.display(), e));
                String::new()
            }
        }
    }

    /// File name for the current row, placeholders substituted.
    pub fn file_name(&self, row: &RowContext<'_>) -> String {
        let mut name = String::new();
        let mut rest = self.file_output_placeholder.as_str();
        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|c| open + c) else {
                break;
            };
            name.push_str(&rest[..open]);
            let key = &rest[open + 1..close];
            match row.lookup(key) {
                Some(value) => name.push_str(&value),
                None => name.push_str(&rest[open..=close]),
            }
            rest = &rest[close + 1..];
        }
        name.push_str(rest);

        name.chars()
            .map(|c| {
                if INVALID_FILE_CHARS.contains(&c) || c.is_control() {
                    '_'
                } else {
                    c
                }
            })
            .collect()
    }

    pub async fn write(
        &self,
        text: &str,
        row: &RowContext<'_>,
        warn: &mut (dyn FnMut(String) + Send),
    ) -> String {
        if text.is_empty() {
            return String::new();
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(text.trim())
            .unwrap_or_else(|_| text.as_bytes().to_vec());

        let name = self.file_name(row);
        let path = Self::resolve(&self.write_folder, &name);
        let exists = tokio::fs::try_exists(&path).await.unwrap_or(false);
        if exists && !self.overwrite {
            warn(format!("File '{}' exists and is not overwritten", path.display()));
            return name;
        }
        if let Err(e) = tokio::fs::write(&path, bytes).await {
            warn(format!("File '{}' could not be written: {}", path.display(), e));
        }
        name
    }
}
