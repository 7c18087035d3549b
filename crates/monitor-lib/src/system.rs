//! Host facts for the counts feed
//!
//! Loads, memory and free space on the three filesystems the service cares
//! about. Values use the units the feed stores: loads scaled by 100,
//! memory in bytes, disk space as free percent and free MiB.

use crate::models::{DiskFacts, MemoryFacts, SystemFacts};
use std::path::{Path, PathBuf};
use sysinfo::{Disks, MemoryRefreshKind, RefreshKind, System};
use tracing::warn;

const SYSTEM_ROOT: &str = "/";
const MIB: u64 = 1024 * 1024;

pub trait SystemProbe: Send + Sync {
    /// Snapshot host facts; `container_root` is the runtime's storage
    /// directory and `data_root` holds courses, students and telemetry
    fn facts(&self, container_root: &Path, data_root: &Path) -> SystemFacts;
}

/// [`SystemProbe`] backed by the live host
pub struct SysinfoProbe;

impl SystemProbe for SysinfoProbe {
    fn facts(&self, container_root: &Path, data_root: &Path) -> SystemFacts {
        let mut system = System::new_with_specifics(
            RefreshKind::new().with_memory(MemoryRefreshKind::everything()),
        );
        system.refresh_memory();

        let load = System::load_average();
        let disks = Disks::new_with_refreshed_list();
        let mounts: Vec<(PathBuf, u64, u64)> = disks
            .iter()
            .map(|disk| {
                (
                    disk.mount_point().to_path_buf(),
                    disk.total_space(),
                    disk.available_space(),
                )
            })
            .collect();

        SystemFacts {
            load1: scale_load(load.one),
            load5: scale_load(load.five),
            load15: scale_load(load.fifteen),
            container_ds: disk_facts(&mounts, container_root),
            data_ds: disk_facts(&mounts, data_root),
            system_ds: disk_facts(&mounts, Path::new(SYSTEM_ROOT)),
            memory: MemoryFacts {
                total: system.total_memory(),
                free: system.free_memory(),
                available: system.available_memory(),
            },
        }
    }
}

fn scale_load(load: f64) -> u64 {
    (load * 100.0).round() as u64
}

fn percent_free(total: u64, available: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    (100.0 * available as f64 / total as f64).round() as u64
}

/// Facts for the mount holding `path`, picked as the deepest mount point
/// that is a prefix of it
fn disk_facts(mounts: &[(PathBuf, u64, u64)], path: &Path) -> DiskFacts {
    let holding = mounts
        .iter()
        .filter(|(mount, _, _)| path.starts_with(mount))
        .max_by_key(|(mount, _, _)| mount.as_os_str().len());
    match holding {
        Some(&(_, total, available)) => DiskFacts {
            percent: percent_free(total, available),
            free_mib: (available as f64 / MIB as f64).round() as u64,
        },
        None => {
            warn!(path = %path.display(), "No mount found for path, reporting zeros");
            DiskFacts {
                percent: 0,
                free_mib: 0,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_load_rounds() {
        assert_eq!(scale_load(0.0), 0);
        assert_eq!(scale_load(1.57), 157);
        assert_eq!(scale_load(0.239), 24);
    }

    #[test]
    fn test_percent_free_rounds() {
        assert_eq!(percent_free(3000, 1000), 33);
        assert_eq!(percent_free(3000, 2000), 67);
        assert_eq!(percent_free(0, 0), 0);
    }

    #[test]
    fn test_disk_facts_picks_deepest_mount() {
        let mounts = vec![
            (PathBuf::from("/"), 1000 * MIB, 100 * MIB),
            (PathBuf::from("/var/lib"), 4000 * MIB, 1000 * MIB),
        ];
        let facts = disk_facts(&mounts, Path::new("/var/lib/nbfleet/raw"));
        assert_eq!(facts.percent, 25);
        assert_eq!(facts.free_mib, 1000);

        let root = disk_facts(&mounts, Path::new("/etc"));
        assert_eq!(root.percent, 10);
        assert_eq!(root.free_mib, 100);
    }

    #[test]
    fn test_disk_facts_unknown_mount_reports_zeros() {
        let facts = disk_facts(&[], Path::new("/anywhere"));
        assert_eq!(facts.percent, 0);
        assert_eq!(facts.free_mib, 0);
    }

    #[test]
    fn test_disk_facts_empty_disk_avoids_division() {
        let mounts = vec![(PathBuf::from("/"), 0, 0)];
        let facts = disk_facts(&mounts, Path::new("/var"));
        assert_eq!(facts.percent, 0);
    }

    #[test]
    fn test_live_probe_reports_memory() {
        let facts = SysinfoProbe.facts(Path::new("/"), Path::new("/"));
        assert!(facts.memory.total > 0);
        assert!(facts.system_ds.percent <= 100);
    }
}
