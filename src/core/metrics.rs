//! Host metrics for the `monitor` command.
//!
//! Every probe is best-effort: a source that cannot be read contributes no
//! form fields instead of failing the submission.

use chrono::Local;
use nix::sys::statvfs::statvfs;
use nix::sys::utsname::uname;
use std::fs;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStats {
    pub total: u64,
    pub free: u64,
    pub used: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadStats {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
    pub procs_total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcStats {
    pub running: u64,
    pub blocked: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformInfo {
    pub name: String,
    pub family: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiskStats {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub used_percent: f64,
    pub inodes_total: u64,
    pub inodes_used: u64,
    pub inodes_free: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeInfo {
    pub zone: String,
    pub offset_seconds: i32,
    pub unix: i64,
}

#[derive(Debug, Clone, Default)]
pub struct HostMetrics {
    pub memory: Option<MemoryStats>,
    pub load: Option<LoadStats>,
    pub procs: Option<ProcStats>,
    pub cpu_model: Option<String>,
    pub uptime_seconds: Option<u64>,
    pub platform: Option<PlatformInfo>,
    pub disk: Option<DiskStats>,
    pub time: TimeInfo,
}

impl HostMetrics {
    pub fn collect() -> Self {
        let metrics = Self {
            memory: read_proc("/proc/meminfo").and_then(|s| parse_meminfo(&s)),
            load: read_proc("/proc/loadavg").and_then(|s| parse_loadavg(&s)),
            procs: read_proc("/proc/stat").and_then(|s| parse_proc_stat(&s)),
            cpu_model: read_proc("/proc/cpuinfo").and_then(|s| parse_cpu_model(&s)),
            uptime_seconds: read_proc("/proc/uptime").and_then(|s| parse_uptime(&s)),
            platform: platform_info(),
            disk: disk_usage("/"),
            time: current_time(),
        };
        debug!(?metrics, "collected host metrics");
        metrics
    }

    /// Flatten into the form fields the monitoring endpoint expects.
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = Vec::new();
        let mut add = |key: &str, value: String| form.push((key.to_string(), value));

        if let Some(mem) = &self.memory {
            add("mem[total]", mem.total.to_string());
            add("mem[free]", mem.free.to_string());
            add("mem[used]", mem.used.to_string());
            add("mem[used_percent]", mem.used_percent.to_string());
        }
        if let Some(load) = &self.load {
            add("load[1]", load.load1.to_string());
            add("load[5]", load.load5.to_string());
            add("load[15]", load.load15.to_string());
            add("procs[total]", load.procs_total.to_string());
        }
        if let Some(procs) = &self.procs {
            add("procs[running]", procs.running.to_string());
            add("procs[blocked]", procs.blocked.to_string());
        }
        if let Some(cpu) = &self.cpu_model {
            add("cpu", cpu.clone());
        }
        if let Some(uptime) = self.uptime_seconds {
            add("uptime_seconds", uptime.to_string());
        }
        if let Some(platform) = &self.platform {
            add("platform[name]", platform.name.clone());
            add("platform[family]", platform.family.clone());
            add("platform[version]", platform.version.clone());
        }
        if let Some(disk) = &self.disk {
            add("disk[total]", disk.total.to_string());
            add("disk[used]", disk.used.to_string());
            add("disk[free]", disk.free.to_string());
            // the endpoint has always received used% under this key
            add("disk[percent_free]", format!("{:.2}", disk.used_percent));
            add("disk[inodes_total]", disk.inodes_total.to_string());
            add("disk[inodes_used]", disk.inodes_used.to_string());
            add("disk[inodes_free]", disk.inodes_free.to_string());
        }
        add("time[zone]", self.time.zone.clone());
        add("time[offset]", self.time.offset_seconds.to_string());
        add("time[now]", self.time.unix.to_string());
        form
    }
}

fn read_proc(path: &str) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(s) => Some(s),
        Err(e) => {
            debug!(path, error = %e, "metric source unavailable");
            None
        }
    }
}

/// Values in /proc/meminfo are kB; the result is bytes.
pub fn parse_meminfo(content: &str) -> Option<MemoryStats> {
    let field = |name: &str| -> Option<u64> {
        content.lines().find_map(|line| {
            let rest = line.strip_prefix(name)?.strip_prefix(':')?;
            let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
            Some(kb * 1024)
        })
    };
    let total = field("MemTotal")?;
    let free = field("MemFree")?;
    let available = field("MemAvailable").unwrap_or(free);
    let used = total.saturating_sub(available);
    let used_percent = if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    };
    Some(MemoryStats {
        total,
        free,
        used,
        used_percent,
    })
}

/// `0.20 0.18 0.12 1/80 11206`
pub fn parse_loadavg(content: &str) -> Option<LoadStats> {
    let mut parts = content.split_whitespace();
    let load1 = parts.next()?.parse().ok()?;
    let load5 = parts.next()?.parse().ok()?;
    let load15 = parts.next()?.parse().ok()?;
    let procs_total = parts
        .next()
        .and_then(|p| p.split_once('/'))
        .and_then(|(_, total)| total.parse().ok())
        .unwrap_or(0);
    Some(LoadStats {
        load1,
        load5,
        load15,
        procs_total,
    })
}

pub fn parse_proc_stat(content: &str) -> Option<ProcStats> {
    let field = |name: &str| -> Option<u64> {
        content.lines().find_map(|line| {
            let mut parts = line.split_whitespace();
            if parts.next()? != name {
                return None;
            }
            parts.next()?.parse().ok()
        })
    };
    Some(ProcStats {
        running: field("procs_running")?,
        blocked: field("procs_blocked")?,
    })
}

pub fn parse_cpu_model(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == "model name").then(|| value.trim().to_string())
    })
}

pub fn parse_uptime(content: &str) -> Option<u64> {
    let secs: f64 = content.split_whitespace().next()?.parse().ok()?;
    Some(secs as u64)
}

/// Extract ID, first ID_LIKE entry, and VERSION_ID from os-release.
pub fn parse_os_release(content: &str) -> Option<PlatformInfo> {
    let field = |name: &str| -> Option<String> {
        content.lines().find_map(|line| {
            let value = line.strip_prefix(name)?.strip_prefix('=')?;
            Some(value.trim().trim_matches('"').to_string())
        })
    };
    let name = field("ID")?;
    let family = field("ID_LIKE")
        .and_then(|like| like.split_whitespace().next().map(str::to_string))
        .unwrap_or_else(|| name.clone());
    let version = field("VERSION_ID").unwrap_or_default();
    Some(PlatformInfo {
        name,
        family,
        version,
    })
}

fn platform_info() -> Option<PlatformInfo> {
    if let Some(info) = read_proc("/etc/os-release").and_then(|s| parse_os_release(&s)) {
        return Some(info);
    }
    let uts = uname().ok()?;
    let name = uts.sysname().to_string_lossy().to_lowercase();
    Some(PlatformInfo {
        family: name.clone(),
        name,
        version: uts.release().to_string_lossy().into_owned(),
    })
}

fn disk_usage(mount: &str) -> Option<DiskStats> {
    let st = match statvfs(mount) {
        Ok(st) => st,
        Err(e) => {
            debug!(mount, error = %e, "statvfs failed");
            return None;
        }
    };
    let frsize = st.fragment_size() as u64;
    let total = st.blocks() as u64 * frsize;
    let free = st.blocks_available() as u64 * frsize;
    let used = (st.blocks() as u64).saturating_sub(st.blocks_free() as u64) * frsize;
    let used_percent = if used + free == 0 {
        0.0
    } else {
        used as f64 / (used + free) as f64 * 100.0
    };
    let inodes_total = st.files() as u64;
    let inodes_free = st.files_free() as u64;
    Some(DiskStats {
        total,
        used,
        free,
        used_percent,
        inodes_total,
        inodes_used: inodes_total.saturating_sub(inodes_free),
        inodes_free,
    })
}

fn current_time() -> TimeInfo {
    let now = Local::now();
    TimeInfo {
        zone: now.format("%Z").to_string(),
        offset_seconds: now.offset().local_minus_utc(),
        unix: now.timestamp(),
    }
}
