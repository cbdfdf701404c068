//! Virtual-memory sampling for the orchestrator's budget monitor.

use std::io;

/// Current virtual-memory usage of this process, in bytes.
///
/// On Linux this is field 23 of `/proc/self/stat` scaled by the page
/// size. Other platforms report the query as failed; the monitor treats
/// repeated failures as fatal.
#[cfg(target_os = "linux")]
pub fn virtual_memory_usage() -> io::Result<u64> {
    let stat = std::fs::read_to_string("/proc/self/stat")?;
    let pages = stat_vsize(&stat)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed /proc/self/stat"))?;
    Ok(pages.saturating_mul(page_size()))
}

#[cfg(not(target_os = "linux"))]
pub fn virtual_memory_usage() -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "no virtual-memory query on this platform",
    ))
}

/// Extracts the vsize field from a `/proc/<pid>/stat` line. The second
/// field (the command name) may itself contain spaces, so fields are
/// counted from the closing parenthesis.
#[cfg(any(target_os = "linux", test))]
fn stat_vsize(stat: &str) -> Option<u64> {
    let after_comm = &stat[stat.rfind(')')? + 1..];
    // vsize is field 23 of the full line; 20 fields follow the comm field
    // before it.
    after_comm.split_whitespace().nth(20)?.parse().ok()
}

#[cfg(all(unix, target_os = "linux"))]
fn page_size() -> u64 {
    // sysconf cannot fail for _SC_PAGESIZE on any supported system
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as u64
    } else {
        4096
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_vsize_from_a_stat_line() {
        // abbreviated but field-accurate shape of a real stat line
        let stat = "12345 (sat solve) S 1 12345 12345 0 -1 4194304 191 0 0 0 \
                    2 1 0 0 20 0 2 0 75678901 223461376 599 18446744073709551615 \
                    1 1 0 0 0 0 0 0 0 0 0 0 17 3 0 0 0 0 0";
        assert_eq!(stat_vsize(stat), Some(223_461_376));
    }

    #[test]
    fn rejects_truncated_stat_lines() {
        assert_eq!(stat_vsize("1 (x) S 1 2 3"), None);
        assert_eq!(stat_vsize("no parenthesis here"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn reads_own_usage() {
        let usage = virtual_memory_usage().unwrap();
        assert!(usage > 0);
    }
}
