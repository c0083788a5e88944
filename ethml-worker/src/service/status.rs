//! Status probe
//!
//! Samples host CPU and memory load for the heartbeat.

use std::sync::{Mutex, PoisonError};

use sysinfo::System;

/// Source of host load figures, both in percent
pub trait StatusProbe: Send + Sync {
    fn sample(&self) -> (f32, f32);
}

/// Probe backed by `sysinfo`
pub struct SystemStatusProbe {
    system: Mutex<System>,
}

impl SystemStatusProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is a delta between refreshes, prime the first one
        system.refresh_cpu();
        system.refresh_memory();

        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SystemStatusProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusProbe for SystemStatusProbe {
    fn sample(&self) -> (f32, f32) {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_cpu();
        system.refresh_memory();

        let cpu_load = system.global_cpu_info().cpu_usage();
        let total = system.total_memory();
        let mem_load = if total == 0 {
            0.0
        } else {
            (system.used_memory() as f64 / total as f64 * 100.0) as f32
        };

        (cpu_load, mem_load)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_is_a_percentage() {
        let probe = SystemStatusProbe::new();
        let (cpu, mem) = probe.sample();
        assert!((0.0..=100.0).contains(&mem));
        assert!(cpu >= 0.0);
    }
}
