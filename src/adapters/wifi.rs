//! WiFi adapter — station, access point, and receive-only parking.
//!
//! Implements [`WifiPort`] over the raw ESP-IDF WiFi driver. The
//! gateway's three radio postures map onto driver state like this:
//!
//! | Posture       | Driver state                                |
//! |---------------|---------------------------------------------|
//! | Receive-only  | STA mode, not associated, pinned channel    |
//! | Station       | STA mode, associated (publish window)       |
//! | Provisioning  | AP mode, captive portal behind it           |
//!
//! Association is blocking with a caller-supplied timeout: boot uses a
//! short reachability probe, publish cycles a longer one. There is no
//! background reconnect — the connectivity manager decides when the
//! station comes up and tears it down after every use.

use log::{info, warn};

use crate::app::ports::{WifiNetwork, WifiPort};
use crate::error::CommsError;
use crate::gateway::provisioning::NetworkCredentials;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const ASSOC_POLL_MS: u32 = 100;

pub struct WifiAdapter {
    connected: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_reachable: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_parked_channel: Option<u8>,
    #[cfg(not(target_os = "espidf"))]
    sim_ap_active: bool,
}

impl WifiAdapter {
    /// Bring the driver up in station mode, not associated. The netif
    /// stack and default event loop are created here; this must run
    /// once, before the ESP-NOW adapter.
    pub fn new() -> Result<Self, CommsError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: single-threaded bring-up; each init runs once.
            unsafe {
                if esp_netif_init() != ESP_OK {
                    return Err(CommsError::WifiConnectTimeout);
                }
                if esp_event_loop_create_default() != ESP_OK {
                    return Err(CommsError::WifiConnectTimeout);
                }
                esp_netif_create_default_wifi_sta();

                let init_cfg = wifi_init_config_t::default();
                if esp_wifi_init(&init_cfg) != ESP_OK {
                    return Err(CommsError::WifiConnectTimeout);
                }
                // Credentials live in our own namespace, not the driver's.
                if esp_wifi_set_storage(wifi_storage_t_WIFI_STORAGE_RAM) != ESP_OK {
                    return Err(CommsError::WifiConnectTimeout);
                }
                if esp_wifi_set_mode(wifi_mode_t_WIFI_MODE_STA) != ESP_OK {
                    return Err(CommsError::WifiConnectTimeout);
                }
                if esp_wifi_start() != ESP_OK {
                    return Err(CommsError::WifiConnectTimeout);
                }
            }
            info!("WiFi: driver started (station, idle)");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("WiFi(sim): driver started");

        Ok(Self {
            connected: false,
            #[cfg(not(target_os = "espidf"))]
            sim_reachable: true,
            #[cfg(not(target_os = "espidf"))]
            sim_parked_channel: None,
            #[cfg(not(target_os = "espidf"))]
            sim_ap_active: false,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_reachable(&mut self, reachable: bool) {
        self.sim_reachable = reachable;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_parked_channel(&self) -> Option<u8> {
        self.sim_parked_channel
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_ap_active(&self) -> bool {
        self.sim_ap_active
    }

    #[cfg(target_os = "espidf")]
    fn platform_connect(
        &mut self,
        creds: &NetworkCredentials,
        timeout_ms: u32,
    ) -> Result<(), CommsError> {
        let mut cfg = wifi_config_t::default();
        // SAFETY: sta is the active union member in STA mode.
        unsafe {
            let sta = &mut cfg.sta;
            let ssid = creds.ssid.as_bytes();
            sta.ssid[..ssid.len()].copy_from_slice(ssid);
            let pass = creds.passphrase.as_bytes();
            sta.password[..pass.len()].copy_from_slice(pass);
            sta.threshold.authmode = if pass.is_empty() {
                wifi_auth_mode_t_WIFI_AUTH_OPEN
            } else {
                wifi_auth_mode_t_WIFI_AUTH_WPA2_PSK
            };

            if esp_wifi_set_config(wifi_interface_t_WIFI_IF_STA, &mut cfg) != ESP_OK {
                return Err(CommsError::WifiConnectTimeout);
            }
            if esp_wifi_connect() != ESP_OK {
                return Err(CommsError::WifiConnectTimeout);
            }
        }

        // Poll association instead of wiring an event handler; the
        // caller blocks on this window anyway.
        let mut waited: u32 = 0;
        loop {
            let mut ap_info = wifi_ap_record_t::default();
            // SAFETY: out-param query, valid for the call.
            if unsafe { esp_wifi_sta_get_ap_info(&mut ap_info) } == ESP_OK {
                return Ok(());
            }
            if waited >= timeout_ms {
                // SAFETY: abandoning the attempt; ignore result.
                unsafe {
                    esp_wifi_disconnect();
                }
                return Err(CommsError::WifiConnectTimeout);
            }
            esp_idf_hal::delay::FreeRtos::delay_ms(ASSOC_POLL_MS);
            waited += ASSOC_POLL_MS;
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(
        &mut self,
        creds: &NetworkCredentials,
        _timeout_ms: u32,
    ) -> Result<(), CommsError> {
        if self.sim_reachable {
            info!("WiFi(sim): associated with '{}'", creds.ssid);
            Ok(())
        } else {
            Err(CommsError::WifiConnectTimeout)
        }
    }
}

impl WifiPort for WifiAdapter {
    fn connect(&mut self, creds: &NetworkCredentials, timeout_ms: u32) -> Result<(), CommsError> {
        if self.connected {
            return Ok(());
        }
        info!("WiFi: associating with '{}' ({timeout_ms} ms budget)", creds.ssid);
        match self.platform_connect(creds, timeout_ms) {
            Ok(()) => {
                self.connected = true;
                Ok(())
            }
            Err(e) => {
                warn!("WiFi: association failed: {e}");
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        #[cfg(target_os = "espidf")]
        // SAFETY: best-effort teardown.
        unsafe {
            esp_wifi_disconnect();
        }
        self.connected = false;
        info!("WiFi: disconnected");
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn set_power_save(&mut self, enabled: bool) {
        #[cfg(target_os = "espidf")]
        {
            let mode = if enabled {
                wifi_ps_type_t_WIFI_PS_MIN_MODEM
            } else {
                wifi_ps_type_t_WIFI_PS_NONE
            };
            // SAFETY: mode is one of the defined power-save types.
            if unsafe { esp_wifi_set_ps(mode) } != ESP_OK {
                warn!("WiFi: power-save change rejected");
            }
        }
        #[cfg(not(target_os = "espidf"))]
        info!("WiFi(sim): power save {}", if enabled { "on" } else { "off" });
    }

    fn enter_receive_mode(&mut self, channel: u8) {
        self.disconnect();
        #[cfg(target_os = "espidf")]
        // SAFETY: STA mode stays active; only the pinned channel changes.
        unsafe {
            esp_wifi_set_mode(wifi_mode_t_WIFI_MODE_STA);
            esp_wifi_set_channel(channel, wifi_second_chan_t_WIFI_SECOND_CHAN_NONE);
        }
        #[cfg(not(target_os = "espidf"))]
        {
            self.sim_ap_active = false;
            self.sim_parked_channel = Some(channel);
        }
        info!("WiFi: receive-only on channel {channel}");
    }

    #[cfg(target_os = "espidf")]
    fn start_access_point(&mut self, ssid: &str, passphrase: &str) -> Result<(), CommsError> {
        // SAFETY: single-threaded mode switch; ap is the active union
        // member in AP mode.
        unsafe {
            esp_netif_create_default_wifi_ap();
            if esp_wifi_set_mode(wifi_mode_t_WIFI_MODE_AP) != ESP_OK {
                return Err(CommsError::WifiConnectTimeout);
            }
            let mut cfg = wifi_config_t::default();
            let ap = &mut cfg.ap;
            let ssid_bytes = ssid.as_bytes();
            ap.ssid[..ssid_bytes.len()].copy_from_slice(ssid_bytes);
            ap.ssid_len = ssid_bytes.len() as u8;
            let pass = passphrase.as_bytes();
            ap.password[..pass.len()].copy_from_slice(pass);
            ap.max_connection = 4;
            ap.authmode = if pass.is_empty() {
                wifi_auth_mode_t_WIFI_AUTH_OPEN
            } else {
                wifi_auth_mode_t_WIFI_AUTH_WPA2_PSK
            };
            if esp_wifi_set_config(wifi_interface_t_WIFI_IF_AP, &mut cfg) != ESP_OK {
                return Err(CommsError::WifiConnectTimeout);
            }
        }
        info!("WiFi: provisioning AP '{ssid}' up");
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn start_access_point(&mut self, ssid: &str, _passphrase: &str) -> Result<(), CommsError> {
        self.sim_ap_active = true;
        info!("WiFi(sim): provisioning AP '{ssid}' up");
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn scan(&mut self) -> heapless::Vec<WifiNetwork, 16> {
        let mut out = heapless::Vec::new();
        // SAFETY: blocking scan from the portal's request context; the
        // records array is valid for the get call.
        unsafe {
            let scan_cfg = wifi_scan_config_t::default();
            if esp_wifi_scan_start(&scan_cfg, true) != ESP_OK {
                return out;
            }
            let mut count: u16 = 16;
            let mut records: [wifi_ap_record_t; 16] = core::mem::zeroed();
            if esp_wifi_scan_get_ap_records(&mut count, records.as_mut_ptr()) != ESP_OK {
                return out;
            }
            for rec in records.iter().take(usize::from(count)) {
                let len = rec.ssid.iter().position(|&b| b == 0).unwrap_or(32);
                let Ok(ssid) = core::str::from_utf8(&rec.ssid[..len]) else {
                    continue;
                };
                let mut name: heapless::String<32> = heapless::String::new();
                if name.push_str(ssid).is_err() {
                    continue;
                }
                let _ = out.push(WifiNetwork {
                    ssid: name,
                    rssi: rec.rssi,
                    enc: rec.authmode != wifi_auth_mode_t_WIFI_AUTH_OPEN,
                });
            }
        }
        out
    }

    #[cfg(not(target_os = "espidf"))]
    fn scan(&mut self) -> heapless::Vec<WifiNetwork, 16> {
        let mut out = heapless::Vec::new();
        let mut ssid: heapless::String<32> = heapless::String::new();
        let _ = ssid.push_str("SimNet");
        let _ = out.push(WifiNetwork {
            ssid,
            rssi: -52,
            enc: true,
        });
        out
    }
}
