//! Deep-sleep adapter for the outdoor node.
//!
//! Timer wakeup only — every wake re-runs the full firmware from
//! reset, so nothing but the RTC domain (and NVS) survives this call.

use log::info;

use crate::app::ports::SleepPort;

pub struct DeepSleep {
    #[cfg(not(target_os = "espidf"))]
    sim_requested_secs: Option<u64>,
}

impl DeepSleep {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            sim_requested_secs: None,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_requested_secs(&self) -> Option<u64> {
        self.sim_requested_secs
    }
}

impl Default for DeepSleep {
    fn default() -> Self {
        Self::new()
    }
}

impl SleepPort for DeepSleep {
    #[cfg(target_os = "espidf")]
    fn deep_sleep(&mut self, secs: u64) {
        info!("Sleep: deep sleep for {secs} s");
        // SAFETY: final call of the wake cycle; does not return.
        unsafe {
            esp_idf_svc::sys::esp_deep_sleep(secs * 1_000_000);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn deep_sleep(&mut self, secs: u64) {
        info!("Sleep(sim): deep sleep for {secs} s requested");
        self.sim_requested_secs = Some(secs);
    }
}
