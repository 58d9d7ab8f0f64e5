//! ESP-NOW link adapter — outdoor transmitter and gateway receiver.
//!
//! Both ends ride on the WiFi driver without association: the outdoor
//! node sends unicast frames to the gateway's factory MAC (unicast so
//! the link layer acks and the send callback can report real delivery),
//! and the gateway registers a receive callback that runs in WiFi-task
//! context.
//!
//! Callback rules: the send callback only completes the shared
//! [`DeliverySignal`]; the receive callback only publishes into the
//! [`TelemetryMailbox`]. No allocation, no logging, no storage from
//! either.

use log::{info, warn};

use crate::app::ports::RadioPort;
use crate::config::MAX_WIFI_CHANNEL;
use crate::error::RadioError;
use crate::gateway::mailbox::TelemetryMailbox;
use crate::outdoor::delivery::DeliverySignal;
use crate::packet::TelemetryPacket;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// The gateway's station MAC, burned into the outdoor firmware at
/// provisioning time.
pub const DEFAULT_PEER_MAC: [u8; 6] = [0x24, 0x6F, 0x28, 0xAE, 0x52, 0xC0];

/// Send-callback target. Set once before the callback can fire.
static TX_SIGNAL: std::sync::OnceLock<&'static DeliverySignal> = std::sync::OnceLock::new();

/// Receive-callback target.
static RX_MAILBOX: std::sync::OnceLock<&'static TelemetryMailbox> = std::sync::OnceLock::new();

// ───────────────────────────────────────────────────────────────
// Outdoor transmitter
// ───────────────────────────────────────────────────────────────

pub struct EspNowRadio {
    peer: [u8; 6],
    #[cfg(not(target_os = "espidf"))]
    sim_sent: Vec<Vec<u8>>,
}

impl EspNowRadio {
    /// Bring the protocol up and bind the send callback to `signal`.
    /// The WiFi driver must already be started in station mode.
    pub fn new(signal: &'static DeliverySignal, peer: [u8; 6]) -> Result<Self, RadioError> {
        if TX_SIGNAL.set(signal).is_err() {
            // Re-binding after a soft restart is fine as long as the
            // signal is the same static.
            warn!("EspNow: send callback already bound");
        }

        #[cfg(target_os = "espidf")]
        {
            // SAFETY: single-threaded bring-up, WiFi driver started.
            unsafe {
                if esp_now_init() != ESP_OK {
                    return Err(RadioError::InitFailed);
                }
                if esp_now_register_send_cb(Some(on_send_done)) != ESP_OK {
                    return Err(RadioError::InitFailed);
                }
                let mut peer_info = esp_now_peer_info_t::default();
                peer_info.peer_addr = peer;
                peer_info.channel = 0; // follow the current channel
                peer_info.encrypt = false;
                if esp_now_add_peer(&peer_info) != ESP_OK {
                    return Err(RadioError::InitFailed);
                }
            }
            info!("EspNow: transmitter ready");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("EspNow(sim): transmitter ready");

        Ok(Self {
            peer,
            #[cfg(not(target_os = "espidf"))]
            sim_sent: Vec::new(),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_sent_frames(&self) -> &[Vec<u8>] {
        &self.sim_sent
    }
}

impl RadioPort for EspNowRadio {
    fn tune(&mut self, channel: u8) -> Result<(), RadioError> {
        if channel == 0 || channel > MAX_WIFI_CHANNEL {
            return Err(RadioError::InvalidChannel);
        }

        #[cfg(target_os = "espidf")]
        {
            // SAFETY: channel validated above; driver is started.
            let ret = unsafe {
                esp_wifi_set_channel(channel, wifi_second_chan_t_WIFI_SECOND_CHAN_NONE)
            };
            if ret != ESP_OK {
                return Err(RadioError::InitFailed);
            }
        }

        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn transmit(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        // SAFETY: peer registered in new(); frame outlives the call
        // (esp_now_send copies into the driver queue).
        let ret = unsafe { esp_now_send(self.peer.as_ptr(), frame.as_ptr(), frame.len()) };
        if ret == ESP_OK {
            Ok(())
        } else {
            Err(RadioError::TransmitRejected)
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn transmit(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        self.sim_sent.push(frame.to_vec());
        // Loopback: the simulated link always delivers.
        if let Some(signal) = TX_SIGNAL.get() {
            signal.complete(true);
        }
        Ok(())
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn on_send_done(_mac: *const u8, status: esp_now_send_status_t) {
    if let Some(signal) = TX_SIGNAL.get() {
        signal.complete(status == esp_now_send_status_t_ESP_NOW_SEND_SUCCESS);
    }
}

// ───────────────────────────────────────────────────────────────
// Gateway receiver
// ───────────────────────────────────────────────────────────────

/// Starts link-layer receive into `mailbox`. The WiFi driver stays up
/// across station connect/disconnect; frames simply stop arriving while
/// the radio is associated on another channel.
pub struct EspNowReceiver;

impl EspNowReceiver {
    pub fn start(mailbox: &'static TelemetryMailbox) -> Result<Self, RadioError> {
        if RX_MAILBOX.set(mailbox).is_err() {
            warn!("EspNow: receive callback already bound");
        }

        #[cfg(target_os = "espidf")]
        {
            // SAFETY: single-threaded bring-up, WiFi driver started.
            unsafe {
                if esp_now_init() != ESP_OK {
                    return Err(RadioError::InitFailed);
                }
                if esp_now_register_recv_cb(Some(on_frame_received)) != ESP_OK {
                    return Err(RadioError::InitFailed);
                }
            }
            info!("EspNow: receiver ready");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("EspNow(sim): receiver ready");

        Ok(Self)
    }

    /// Test hook: deliver a frame as if the callback fired.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_inject(frame: &[u8], now_ms: u64) {
        deliver(frame, now_ms);
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn on_frame_received(
    _info: *const esp_now_recv_info_t,
    data: *const u8,
    len: core::ffi::c_int,
) {
    if data.is_null() || len < 0 {
        return;
    }
    // SAFETY: driver guarantees `data` is valid for `len` bytes for the
    // duration of the callback.
    let frame = unsafe { core::slice::from_raw_parts(data, len as usize) };
    let now_ms = (unsafe { esp_timer_get_time() } / 1000) as u64;
    deliver(frame, now_ms);
}

fn deliver(frame: &[u8], now_ms: u64) {
    // Wrong-length frames are foreign traffic, not errors.
    if let Ok(packet) = TelemetryPacket::decode(frame)
        && let Some(mailbox) = RX_MAILBOX.get()
    {
        mailbox.publish(&packet, now_ms);
    }
}
