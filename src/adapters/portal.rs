//! Captive provisioning portal.
//!
//! A small HTTP surface behind the setup access point, with a
//! wildcard DNS responder so phones land on the page automatically.
//! The page posts credentials to `/api/save`; they land in the `net`
//! namespace and the gateway restarts to bring them into effect — the
//! portal never tries to hot-switch the radio out from under itself.
//!
//! | Route        | Method | Behaviour                                |
//! |--------------|--------|------------------------------------------|
//! | `/`          | GET    | Setup page                               |
//! | `/api/scan`  | GET    | Nearby networks as JSON                  |
//! | `/api/save`  | POST   | `{"ssid":..,"pass":..}` stored + restart |
//! | `/api/reset` | POST   | Factory reset + restart                  |

use std::sync::{Arc, Mutex};

use log::{info, warn};
use serde::Deserialize;

use crate::adapters::nvs::NvsAdapter;
use crate::adapters::wifi::WifiAdapter;
use crate::app::ports::{ProvisioningPort, WifiPort};
use crate::gateway::provisioning;

#[cfg(target_os = "espidf")]
use esp_idf_svc::http::server::{Configuration as HttpConfig, EspHttpServer};
#[cfg(target_os = "espidf")]
use esp_idf_svc::io::Write as _;

#[cfg(target_os = "espidf")]
const SETUP_PAGE: &str = include_str!("portal_setup.html");

/// The access point's own address, which every DNS answer points at.
pub const AP_ADDR: [u8; 4] = [192, 168, 4, 1];

#[derive(Deserialize)]
struct SaveRequest<'a> {
    ssid: &'a str,
    #[serde(default)]
    pass: &'a str,
}

pub struct CaptivePortal {
    storage: Arc<Mutex<NvsAdapter>>,
    wifi: Arc<Mutex<WifiAdapter>>,
    active: bool,
    #[cfg(target_os = "espidf")]
    server: Option<EspHttpServer<'static>>,
}

impl CaptivePortal {
    /// `storage` and `wifi` are shared with the rest of the gateway;
    /// handler threads take each lock only for the duration of one
    /// request.
    pub fn new(storage: Arc<Mutex<NvsAdapter>>, wifi: Arc<Mutex<WifiAdapter>>) -> Self {
        Self {
            storage,
            wifi,
            active: false,
            #[cfg(target_os = "espidf")]
            server: None,
        }
    }

    fn apply_save(storage: &Arc<Mutex<NvsAdapter>>, body: &[u8]) -> bool {
        let req: SaveRequest<'_> = match serde_json::from_slice(body) {
            Ok(r) => r,
            Err(_) => {
                warn!("Portal: malformed save request");
                return false;
            }
        };
        match storage.lock() {
            Ok(mut s) => provisioning::save(&mut *s, req.ssid, req.pass),
            Err(_) => false,
        }
    }

    fn apply_reset(storage: &Arc<Mutex<NvsAdapter>>) {
        if let Ok(mut s) = storage.lock() {
            provisioning::factory_reset(&mut *s);
        }
    }

    fn scan_json(wifi: &Arc<Mutex<WifiAdapter>>) -> String {
        match wifi.lock() {
            Ok(mut w) => provisioning::scan_response_json(&w.scan()),
            Err(_) => String::from("[]"),
        }
    }

    /// Build the answer to one captive DNS query: echo the question and
    /// resolve every A lookup to `addr`. Returns `None` for datagrams
    /// too short to carry a DNS header.
    pub fn dns_answer(query: &[u8], addr: [u8; 4]) -> Option<Vec<u8>> {
        if query.len() < 12 {
            return None;
        }
        let mut resp = Vec::with_capacity(query.len() + 16);
        resp.extend_from_slice(query);
        // Authoritative response, no error.
        resp[2] = 0x84;
        resp[3] = 0x00;
        // One answer, no authority/additional records.
        resp[6] = 0x00;
        resp[7] = 0x01;
        resp[8..12].fill(0);
        // Name pointer to the question, type A, class IN, TTL 60.
        resp.extend_from_slice(&[0xC0, 0x0C, 0, 1, 0, 1, 0, 0, 0, 60, 0, 4]);
        resp.extend_from_slice(&addr);
        Some(resp)
    }

    /// Wildcard DNS on port 53: the captive redirect that makes phones
    /// open the setup page on join.
    #[cfg(target_os = "espidf")]
    fn start_captive_dns() {
        std::thread::spawn(|| {
            let socket = match std::net::UdpSocket::bind("0.0.0.0:53") {
                Ok(s) => s,
                Err(e) => {
                    warn!("Portal: DNS bind failed: {e}");
                    return;
                }
            };
            info!("Portal: captive DNS up");
            let mut buf = [0u8; 256];
            loop {
                let Ok((n, src)) = socket.recv_from(&mut buf) else {
                    continue;
                };
                if let Some(resp) = Self::dns_answer(&buf[..n], AP_ADDR) {
                    let _ = socket.send_to(&resp, src);
                }
            }
        });
    }

    /// Restart once the in-flight HTTP response has drained.
    #[cfg(target_os = "espidf")]
    fn restart_after_response() {
        std::thread::spawn(|| {
            esp_idf_hal::delay::FreeRtos::delay_ms(500);
            // SAFETY: terminal call, does not return.
            unsafe { esp_idf_svc::sys::esp_restart() };
        });
    }

    /// Test hook: feed a save request as if it came over HTTP.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_save(&self, body: &[u8]) -> bool {
        Self::apply_save(&self.storage, body)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_reset(&self) {
        Self::apply_reset(&self.storage);
    }

    /// Test hook: the `/api/scan` response body.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_scan_json(&self) -> String {
        Self::scan_json(&self.wifi)
    }
}

impl ProvisioningPort for CaptivePortal {
    #[cfg(target_os = "espidf")]
    fn start(&mut self) {
        if self.active {
            return;
        }
        let server = match EspHttpServer::new(&HttpConfig::default()) {
            Ok(s) => s,
            Err(e) => {
                warn!("Portal: HTTP server failed to start: {e}");
                return;
            }
        };
        let mut server = server;

        let res = server.fn_handler("/", esp_idf_svc::http::Method::Get, |req| {
            req.into_ok_response()?.write_all(SETUP_PAGE.as_bytes())?;
            Ok::<(), anyhow::Error>(())
        });
        if let Err(e) = res {
            warn!("Portal: route registration failed: {e}");
        }

        let wifi = Arc::clone(&self.wifi);
        let res = server.fn_handler("/api/scan", esp_idf_svc::http::Method::Get, move |req| {
            // Scan from the AP interface; the driver time-slices.
            let json = Self::scan_json(&wifi);
            req.into_ok_response()?.write_all(json.as_bytes())?;
            Ok::<(), anyhow::Error>(())
        });
        if let Err(e) = res {
            warn!("Portal: route registration failed: {e}");
        }

        let storage = Arc::clone(&self.storage);
        let res = server.fn_handler("/api/save", esp_idf_svc::http::Method::Post, move |mut req| {
            let mut body = [0u8; 256];
            let n = req.read(&mut body)?;
            let ok = Self::apply_save(&storage, &body[..n]);
            let status = if ok { "{\"ok\":true}" } else { "{\"ok\":false}" };
            let mut resp = req.into_ok_response()?;
            resp.write_all(status.as_bytes())?;
            resp.flush()?;
            drop(resp);
            if ok {
                Self::restart_after_response();
            }
            Ok::<(), anyhow::Error>(())
        });
        if let Err(e) = res {
            warn!("Portal: route registration failed: {e}");
        }

        let storage = Arc::clone(&self.storage);
        let res = server.fn_handler("/api/reset", esp_idf_svc::http::Method::Post, move |req| {
            Self::apply_reset(&storage);
            let mut resp = req.into_ok_response()?;
            resp.write_all(b"{\"ok\":true}")?;
            resp.flush()?;
            drop(resp);
            Self::restart_after_response();
            Ok::<(), anyhow::Error>(())
        });
        if let Err(e) = res {
            warn!("Portal: route registration failed: {e}");
        }

        Self::start_captive_dns();
        self.server = Some(server);
        self.active = true;
        info!("Portal: serving setup page");
    }

    #[cfg(not(target_os = "espidf"))]
    fn start(&mut self) {
        self.active = true;
        info!("Portal(sim): active");
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
