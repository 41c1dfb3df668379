//! Disk-introspection helpers used by `ensure_image`: parsing a pre-built
//! domain XML's backing disk, and qemu-img's JSON backing-chain field.
//!
//! Grounded on `limiquantix-hypervisor::storage::local::LocalBackend`'s
//! `create_qcow2_with_backing`/`get_disk_info`.

use std::path::PathBuf;

use crate::error::{CyrisError, Result};

/// Parses the `<disk>` element's `<source file='...'/>` out of a domain
/// XML, to find the backing image that a pre-built guest's disk clones.
pub fn extract_backing_disk(basevm_config_file: &std::path::Path) -> Result<PathBuf> {
    let text = std::fs::read_to_string(basevm_config_file)
        .map_err(|e| CyrisError::ImageBuild(format!("cannot read {}: {e}", basevm_config_file.display())))?;
    let marker = "source file='";
    let start = text
        .find(marker)
        .ok_or_else(|| CyrisError::ImageBuild(format!("{} has no disk source", basevm_config_file.display())))?
        + marker.len();
    let end = text[start..]
        .find('\'')
        .ok_or_else(|| CyrisError::ImageBuild("malformed disk source attribute".to_string()))?;
    Ok(PathBuf::from(&text[start..start + end]))
}

/// Extracts `backing-filename` from `qemu-img info --output=json`.
pub fn parse_backing_file(json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    value.get("backing-filename").and_then(|v| v.as_str()).map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backing_filename_from_qemu_img_json() {
        let json = r#"{"virtual-size": 21474836480, "backing-filename": "/var/lib/cyris/images/base.qcow2"}"#;
        assert_eq!(parse_backing_file(json).as_deref(), Some("/var/lib/cyris/images/base.qcow2"));
    }
}
