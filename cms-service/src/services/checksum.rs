use service_core::cms::AccountAccess;
use sha2::{Digest, Sha256};

/// SHA-256 (hex) over the JSON form of a consent's access definition.
pub fn access_checksum(access: &AccountAccess) -> anyhow::Result<String> {
    let canonical = serde_json::to_vec(access)?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

/// `true` when no checksum was taken yet or it still matches `access`.
pub fn verify_access(access: &AccountAccess, checksum: Option<&str>) -> anyhow::Result<bool> {
    match checksum {
        None => Ok(true),
        Some(expected) => Ok(access_checksum(access)? == expected),
    }
}
