// System-metric probes
//
// `SysinfoProbe` reads the host. `StaticProbe` and `ScriptedProbe` are fakes
// for tests and for hosts where metrics are not wanted.

use std::collections::VecDeque;
use std::sync::Arc;

use contextlog_error::{ProbeError, ProbeResult};
use contextlog_types::SystemSample;
use parking_lot::Mutex;
use sysinfo::{Disks, System};

/// Source of CPU, memory and disk percentages.
///
/// `error_rate` in the returned sample is optional input; the sampler takes the
/// larger of it and the rate it measures from logged errors.
pub trait SystemProbe: Send {
    fn sample(&mut self) -> ProbeResult<SystemSample>;

    fn name(&self) -> &str {
        "probe"
    }
}

/// Host metrics through `sysinfo`.
pub struct SysinfoProbe {
    system: System,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        system.refresh_memory();
        SysinfoProbe { system }
    }

    /// Usage of the fullest mounted disk.
    fn disk_percent() -> f64 {
        let disks = Disks::new_with_refreshed_list();
        disks
            .iter()
            .filter(|d| d.total_space() > 0)
            .map(|d| {
                let used = d.total_space().saturating_sub(d.available_space());
                used as f64 / d.total_space() as f64 * 100.0
            })
            .fold(0.0, f64::max)
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProbe for SysinfoProbe {
    fn sample(&mut self) -> ProbeResult<SystemSample> {
        self.system.refresh_cpu_all();
        self.system.refresh_memory();

        let total = self.system.total_memory();
        if total == 0 {
            return Err(ProbeError::Unavailable("total memory reported as 0".to_string()));
        }
        let memory = self.system.used_memory() as f64 / total as f64 * 100.0;
        let cpu = self.system.global_cpu_usage() as f64;
        if !cpu.is_finite() {
            return Err(ProbeError::OutOfRange { name: "cpu_percent", value: cpu });
        }

        Ok(SystemSample::new(cpu, memory, Self::disk_percent(), 0.0))
    }

    fn name(&self) -> &str {
        "sysinfo"
    }
}

/// Always reports the same sample; the value can be changed through a handle.
#[derive(Clone, Default)]
pub struct StaticProbe {
    sample: Arc<Mutex<SystemSample>>,
}

impl StaticProbe {
    pub fn new(sample: SystemSample) -> Self {
        StaticProbe {
            sample: Arc::new(Mutex::new(sample)),
        }
    }

    /// Idle host.
    pub fn idle() -> Self {
        Self::new(SystemSample::default())
    }

    pub fn set(&self, sample: SystemSample) {
        *self.sample.lock() = sample;
    }

    /// Shorthand for a host whose CPU alone drives stress.
    pub fn set_cpu(&self, cpu_percent: f64) {
        self.sample.lock().cpu_percent = cpu_percent;
    }
}

impl SystemProbe for StaticProbe {
    fn sample(&mut self) -> ProbeResult<SystemSample> {
        Ok(*self.sample.lock())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Replays a fixed sequence of results, then repeats the last one.
pub struct ScriptedProbe {
    script: VecDeque<ProbeResult<SystemSample>>,
    last: ProbeResult<SystemSample>,
}

impl ScriptedProbe {
    pub fn new(script: Vec<ProbeResult<SystemSample>>) -> Self {
        ScriptedProbe {
            script: script.into(),
            last: Ok(SystemSample::default()),
        }
    }
}

impl SystemProbe for ScriptedProbe {
    fn sample(&mut self) -> ProbeResult<SystemSample> {
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        self.last.clone()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
