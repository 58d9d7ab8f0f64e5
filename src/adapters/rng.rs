//! Hardware random source.
//!
//! On target this is the ESP32 RNG register, which is truly random
//! while the RF subsystem runs — exactly the window the claim nonce is
//! drawn in. The simulation backend is a seeded xorshift: deterministic
//! enough to assert against, varied enough to not collide across runs.

use crate::app::ports::RngPort;

pub struct HwRng {
    #[cfg(not(target_os = "espidf"))]
    state: u64,
}

impl HwRng {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            state: {
                let nanos = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.subsec_nanos())
                    .unwrap_or(0);
                u64::from(nanos) | 1
            },
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn seeded(seed: u64) -> Self {
        Self { state: seed | 1 }
    }
}

impl Default for HwRng {
    fn default() -> Self {
        Self::new()
    }
}

impl RngPort for HwRng {
    #[cfg(target_os = "espidf")]
    fn next_u32(&mut self) -> u32 {
        // SAFETY: esp_random has no preconditions.
        unsafe { esp_idf_svc::sys::esp_random() }
    }

    #[cfg(not(target_os = "espidf"))]
    fn next_u32(&mut self) -> u32 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        (x.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 32) as u32
    }
}
