//! Resident memory sampling.
//!
//! The monitor only depends on the [`MemoryProbe`] trait. [`ProcessMemoryProbe`]
//! picks the implementation for the build target:
//!
//! - **Linux**: `VmRSS` from `/proc/self/status`
//! - **Windows**: `WorkingSetSize` from `GetProcessMemoryInfo`
//! - **Other targets**: unavailable, the probe reports `None`

/// Capability to read the current process's resident set size.
#[cfg_attr(test, mockall::automock)]
pub trait MemoryProbe: Send + Sync {
    /// Current resident memory in bytes, or `None` if it cannot be read.
    fn current_resident_memory(&self) -> Option<u64>;
}

/// Memory probe for the current process on the build target.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemoryProbe;

impl ProcessMemoryProbe {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "linux")]
impl MemoryProbe for ProcessMemoryProbe {
    fn current_resident_memory(&self) -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_vm_rss(&status)
    }
}

#[cfg(windows)]
impl MemoryProbe for ProcessMemoryProbe {
    fn current_resident_memory(&self) -> Option<u64> {
        use windows::Win32::System::ProcessStatus::{
            GetProcessMemoryInfo, PROCESS_MEMORY_COUNTERS,
        };
        use windows::Win32::System::Threading::GetCurrentProcess;

        let cb = std::mem::size_of::<PROCESS_MEMORY_COUNTERS>() as u32;
        let mut counters = PROCESS_MEMORY_COUNTERS {
            cb,
            ..Default::default()
        };
        // SAFETY: `counters` is a properly sized, writable struct and the
        // pseudo-handle from GetCurrentProcess needs no cleanup.
        let result = unsafe { GetProcessMemoryInfo(GetCurrentProcess(), &mut counters, cb) };
        result.ok().map(|()| counters.WorkingSetSize as u64)
    }
}

#[cfg(not(any(target_os = "linux", windows)))]
impl MemoryProbe for ProcessMemoryProbe {
    fn current_resident_memory(&self) -> Option<u64> {
        None
    }
}

/// Extract `VmRSS` (reported in kB) from a `/proc/<pid>/status` body.
pub fn parse_vm_rss(status: &str) -> Option<u64> {
    status.lines().find_map(|line| {
        let value = line.strip_prefix("VmRSS:")?;
        let mut parts = value.split_whitespace();
        let amount: u64 = parts.next()?.parse().ok()?;
        match parts.next() {
            Some("kB") | None => Some(amount * 1024),
            Some(_) => None,
        }
    })
}

/// Human-readable byte count (binary units).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "Name:\tyuv-pipeline\nVmPeak:\t  20480 kB\nVmRSS:\t   4096 kB\nThreads:\t5\n";

    #[test]
    fn test_parse_vm_rss() {
        assert_eq!(parse_vm_rss(STATUS), Some(4096 * 1024));
    }

    #[test]
    fn test_parse_vm_rss_missing() {
        assert_eq!(parse_vm_rss("Name:\tkthreadd\nThreads:\t1\n"), None);
        assert_eq!(parse_vm_rss("VmRSS:\tgarbage kB\n"), None);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(45 * 1024 * 1024 + 512 * 1024), "45.5 MiB");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_process_probe_reads_current_process() {
        let rss = ProcessMemoryProbe::new().current_resident_memory();
        assert!(rss.is_some_and(|bytes| bytes > 0));
    }

    #[test]
    fn test_probe_is_object_safe() {
        let mut mock = MockMemoryProbe::new();
        mock.expect_current_resident_memory().return_const(Some(1024u64));
        let probe: Box<dyn MemoryProbe> = Box::new(mock);
        assert_eq!(probe.current_resident_memory(), Some(1024));
    }
}
