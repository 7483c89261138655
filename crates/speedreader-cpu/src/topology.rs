//! L2-cache-aware CPU selection.
//!
//! One primary hyperthread per L2 cache, ordered by max frequency descending
//! (performance cores before efficiency cores). The result is probed once
//! and cached for the process lifetime.

use crate::error::CpuError;
use once_cell::sync::OnceCell;

static OPTIMAL: OnceCell<Vec<usize>> = OnceCell::new();

/// OS CPU ids to pin inference workers to, best cores first.
///
/// Idempotent: the sysfs probe runs once; later calls return the cached list.
pub fn optimal_cpus() -> Result<&'static [usize], CpuError> {
    OPTIMAL.get_or_try_init(probe).map(Vec::as_slice)
}

#[cfg(target_os = "linux")]
fn probe() -> Result<Vec<usize>, CpuError> {
    use std::collections::HashSet;

    let cpus = sysfs::enumerate_cpus()?;
    let mut l2_seen: HashSet<String> = HashSet::new();
    let mut found_l2 = false;
    // (cpu id, max frequency) picks, one per L2, in cpu-id discovery order.
    let mut picks: Vec<(usize, u64)> = Vec::new();

    for cpu in cpus {
        let Some(l2) = sysfs::l2_cache_key(cpu) else {
            continue;
        };
        found_l2 = true;
        if !sysfs::is_primary_smt(cpu) {
            continue;
        }
        if l2_seen.insert(l2) {
            picks.push((cpu, sysfs::max_frequency_khz(cpu)));
        }
    }

    if !found_l2 {
        return Err(CpuError::NoL2Caches);
    }
    if picks.is_empty() {
        return Err(CpuError::NoEligibleCpus);
    }

    // Stable sort: frequency ties preserve discovery order.
    picks.sort_by(|a, b| b.1.cmp(&a.1));
    let ids: Vec<usize> = picks.into_iter().map(|(id, _)| id).collect();
    tracing::info!(cpus = ?ids, "selected inference cpus");
    Ok(ids)
}

#[cfg(not(target_os = "linux"))]
fn probe() -> Result<Vec<usize>, CpuError> {
    Err(CpuError::PlatformUnsupported)
}

#[cfg(target_os = "linux")]
mod sysfs {
    use crate::error::CpuError;
    use std::fs;
    use std::path::{Path, PathBuf};

    fn cpu_dir(id: usize) -> PathBuf {
        PathBuf::from(format!("/sys/devices/system/cpu/cpu{id}"))
    }

    fn read_trimmed(path: &Path) -> Option<String> {
        fs::read_to_string(path)
            .ok()
            .map(|s| s.trim().to_string())
    }

    /// All present CPU ids, ascending.
    pub fn enumerate_cpus() -> Result<Vec<usize>, CpuError> {
        let entries = fs::read_dir("/sys/devices/system/cpu")
            .map_err(|e| CpuError::Probe(e.to_string()))?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CpuError::Probe(e.to_string()))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(rest) = name.strip_prefix("cpu") {
                if let Ok(id) = rest.parse::<usize>() {
                    ids.push(id);
                }
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Identity of the L2 cache this CPU belongs to, if one is reported.
    /// The `shared_cpu_list` string is a stable key: identical for every
    /// sibling of the cache.
    pub fn l2_cache_key(cpu: usize) -> Option<String> {
        let cache_dir = cpu_dir(cpu).join("cache");
        let entries = fs::read_dir(&cache_dir).ok()?;
        for entry in entries.flatten() {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with("index") {
                continue;
            }
            let index_dir = entry.path();
            if read_trimmed(&index_dir.join("level")).as_deref() == Some("2") {
                return read_trimmed(&index_dir.join("shared_cpu_list"));
            }
        }
        None
    }

    /// Whether this CPU is the first thread of its SMT sibling group.
    pub fn is_primary_smt(cpu: usize) -> bool {
        let path = cpu_dir(cpu).join("topology/thread_siblings_list");
        match read_trimmed(&path) {
            Some(list) => super::parse_cpu_list(&list).first() == Some(&cpu),
            // No SMT topology exposed: treat the thread as primary.
            None => true,
        }
    }

    /// Maximum frequency in kHz; 0 when cpufreq is not exposed.
    pub fn max_frequency_khz(cpu: usize) -> u64 {
        let path = cpu_dir(cpu).join("cpufreq/cpuinfo_max_freq");
        read_trimmed(&path)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }
}

/// Parse a sysfs cpulist string such as `0-3,8,10-11`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_cpu_list(list: &str) -> Vec<usize> {
    let mut out = Vec::new();
    for part in list.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((lo, hi)) = part.split_once('-') {
            if let (Ok(lo), Ok(hi)) = (lo.parse::<usize>(), hi.parse::<usize>()) {
                out.extend(lo..=hi);
            }
        } else if let Ok(id) = part.parse::<usize>() {
            out.push(id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_list_parsing() {
        assert_eq!(parse_cpu_list("0-3,8"), vec![0, 1, 2, 3, 8]);
        assert_eq!(parse_cpu_list("5"), vec![5]);
        assert_eq!(parse_cpu_list("0,2,4-5"), vec![0, 2, 4, 5]);
        assert_eq!(parse_cpu_list(""), Vec::<usize>::new());
        assert_eq!(parse_cpu_list(" 1 , 3 "), vec![1, 3]);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn optimal_cpus_is_idempotent() {
        // The probe may fail in constrained environments (no sysfs); the
        // contract under test is that two calls agree.
        let first = optimal_cpus().map(<[usize]>::to_vec);
        let second = optimal_cpus().map(<[usize]>::to_vec);
        match (first, second) {
            (Ok(a), Ok(b)) => {
                assert_eq!(a, b);
                assert!(!a.is_empty());
            }
            (Err(_), Err(_)) => {}
            other => panic!("probe changed its mind between calls: {other:?}"),
        }
    }
}
