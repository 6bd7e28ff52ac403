//! Performance measurement utilities for the experiment binaries.
//!
//! The memory experiments need the peak resident set size of an isolated
//! worker process. On Linux this is read from /proc/self/status; other
//! platforms report zero and the experiment binaries log a warning.

/// Reads the peak resident set size (VmPeak) from /proc/self/status.
///
/// # Returns
/// The peak memory usage in kilobytes, or 0 when the value cannot be read.
#[cfg(target_os = "linux")]
pub fn get_peak_rss_kb() -> u64 {
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return 0;
    };

    status
        .lines()
        .find_map(|line| {
            let rest = line.strip_prefix("VmPeak:")?;
            rest.split_whitespace().next()?.parse::<u64>().ok()
        })
        .unwrap_or(0)
}

/// Non-Linux fallback: reports zero and warns once.
#[cfg(not(target_os = "linux"))]
pub fn get_peak_rss_kb() -> u64 {
    use std::sync::Once;
    static WARN_ONCE: Once = Once::new();
    WARN_ONCE.call_once(|| {
        log::warn!("Peak RSS measurement is only supported on Linux; returning 0.");
    });
    0
}
