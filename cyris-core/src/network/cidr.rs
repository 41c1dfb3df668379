//! Persistent CIDR allocator backing the network topology manager.
//!
//! No direct teacher counterpart; the bookkeeping shape (load-or-default,
//! serialize on every mutation) follows
//! `limiquantix-hypervisor::storage::mod::StorageManager`'s pool registry.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CyrisError, Result};

/// One allocated `/24` subnet, keyed by `(range_id, network_name)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub range_id: String,
    pub network_name: String,
    pub cidr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct AllocationFile {
    pool_cidr: String,
    allocations: Vec<Allocation>,
}

/// Allocates non-overlapping `/24`s out of a configured pool (default
/// `10.64.0.0/10`), persisting the bitmap to `network-alloc.json` so
/// restarts don't reissue a CIDR already in use by an active range.
pub struct CidrAllocator {
    path: PathBuf,
    pool_base: u32,
    pool_prefix_len: u8,
}

const SUBNET_PREFIX: u8 = 24;

impl CidrAllocator {
    pub fn new(state_path: impl Into<PathBuf>, pool_cidr: &str) -> Result<Self> {
        let (base, prefix) = parse_cidr(pool_cidr)?;
        Ok(Self { path: state_path.into(), pool_base: base, pool_prefix_len: prefix })
    }

    fn load(&self) -> Result<AllocationFile> {
        if !self.path.exists() {
            return Ok(AllocationFile { pool_cidr: String::new(), allocations: Vec::new() });
        }
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| CyrisError::Network(format!("cannot read {}: {e}", self.path.display())))?;
        serde_json::from_str(&text).map_err(|e| CyrisError::Network(format!("corrupt network-alloc.json: {e}")))
    }

    fn save(&self, file: &AllocationFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CyrisError::Network(format!("cannot create state dir: {e}")))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let text = serde_json::to_string_pretty(file)
            .map_err(|e| CyrisError::Internal(format!("cannot serialize allocations: {e}")))?;
        std::fs::write(&tmp, text).map_err(|e| CyrisError::Network(format!("cannot write tmp alloc file: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| CyrisError::Network(format!("cannot rename tmp alloc file: {e}")))?;
        Ok(())
    }

    /// Allocates a fresh `/24` for `(range_id, network_name)`, or returns
    /// the existing allocation if one was already made (idempotent resume).
    pub fn allocate(&self, range_id: &str, network_name: &str) -> Result<String> {
        let mut file = self.load()?;
        if let Some(existing) = file
            .allocations
            .iter()
            .find(|a| a.range_id == range_id && a.network_name == network_name)
        {
            return Ok(existing.cidr.clone());
        }

        let used: std::collections::HashSet<u32> =
            file.allocations.iter().filter_map(|a| parse_cidr(&a.cidr).ok().map(|(base, _)| base)).collect();

        let subnet_count = 1u32 << (SUBNET_PREFIX - self.pool_prefix_len);
        for i in 0..subnet_count {
            let candidate_base = self.pool_base + (i << (32 - SUBNET_PREFIX));
            if !used.contains(&candidate_base) {
                let cidr = format!("{}/{}", Ipv4Addr::from(candidate_base), SUBNET_PREFIX);
                file.allocations.push(Allocation {
                    range_id: range_id.to_string(),
                    network_name: network_name.to_string(),
                    cidr: cidr.clone(),
                });
                self.save(&file)?;
                return Ok(cidr);
            }
        }
        Err(CyrisError::Network(format!(
            "CIDR pool exhausted allocating network '{network_name}' for range '{range_id}'"
        )))
    }

    /// Releases the `/24` allocated to `(range_id, network_name)` only —
    /// a range's other networks are untouched, so tearing down one bridge
    /// in a multi-network range can't free a subnet a sibling network is
    /// still using.
    pub fn release(&self, range_id: &str, network_name: &str) -> Result<()> {
        let mut file = self.load()?;
        file.allocations.retain(|a| !(a.range_id == range_id && a.network_name == network_name));
        self.save(&file)
    }

    pub fn list_for_range(&self, range_id: &str) -> Result<HashMap<String, String>> {
        let file = self.load()?;
        Ok(file
            .allocations
            .into_iter()
            .filter(|a| a.range_id == range_id)
            .map(|a| (a.network_name, a.cidr))
            .collect())
    }
}

fn parse_cidr(cidr: &str) -> Result<(u32, u8)> {
    let (addr, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| CyrisError::Network(format!("invalid CIDR '{cidr}'")))?;
    let addr: Ipv4Addr = addr
        .parse()
        .map_err(|e| CyrisError::Network(format!("invalid CIDR address '{addr}': {e}")))?;
    let prefix: u8 = prefix
        .parse()
        .map_err(|e| CyrisError::Network(format!("invalid CIDR prefix '{prefix}': {e}")))?;
    Ok((u32::from(addr), prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_distinct_subnets_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let alloc = CidrAllocator::new(dir.path().join("network-alloc.json"), "10.64.0.0/22").unwrap();
        let a = alloc.allocate("r1", "n1").unwrap();
        let b = alloc.allocate("r1", "n2").unwrap();
        assert_ne!(a, b);
        let a_again = alloc.allocate("r1", "n1").unwrap();
        assert_eq!(a, a_again);
    }

    #[test]
    fn refuses_when_pool_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let alloc = CidrAllocator::new(dir.path().join("network-alloc.json"), "10.64.0.0/23").unwrap();
        alloc.allocate("r1", "n1").unwrap();
        alloc.allocate("r1", "n2").unwrap();
        assert!(alloc.allocate("r1", "n3").is_err());
    }

    #[test]
    fn release_frees_subnets_for_reuse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network-alloc.json");
        let alloc = CidrAllocator::new(&path, "10.64.0.0/23").unwrap();
        let a = alloc.allocate("r1", "n1").unwrap();
        alloc.release("r1", "n1").unwrap();
        let alloc2 = CidrAllocator::new(&path, "10.64.0.0/23").unwrap();
        let b = alloc2.allocate("r2", "n1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn release_of_one_network_does_not_free_a_sibling_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network-alloc.json");
        let alloc = CidrAllocator::new(&path, "10.64.0.0/22").unwrap();
        let a = alloc.allocate("r1", "n1").unwrap();
        let b = alloc.allocate("r1", "n2").unwrap();

        alloc.release("r1", "n1").unwrap();

        let remaining = alloc.list_for_range("r1").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining.get("n2"), Some(&b));
        assert_ne!(remaining.get("n2"), Some(&a));
    }
}
