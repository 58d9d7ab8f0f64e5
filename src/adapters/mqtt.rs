//! MQTT session adapter over mutually-authenticated TLS.
//!
//! Implements [`CloudPort`] on the ESP-IDF MQTT client. The session is
//! short-lived by design — the connectivity manager brings it up for
//! one publish (or a claim handshake) and destroys it afterwards, so
//! the adapter keeps no reconnect logic of its own.
//!
//! Inbound messages arrive on the MQTT client's own task; the event
//! handler copies them into a queue that [`poll`](CloudPort::poll)
//! drains from the main loop, mirroring how the radio callbacks latch
//! into their slots.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::CloudPort;
use crate::error::CommsError;
use crate::gateway::cloud::CertBundle;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use std::collections::VecDeque;
#[cfg(target_os = "espidf")]
use std::sync::Mutex;
#[cfg(target_os = "espidf")]
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(not(target_os = "espidf"))]
use std::collections::VecDeque;

/// Inbound copies land here from the client task. Static because the C
/// event handler has no capture environment.
#[cfg(target_os = "espidf")]
static INBOUND: Mutex<VecDeque<(String, Vec<u8>)>> = Mutex::new(VecDeque::new());

/// Broker session established (CONNACK seen).
#[cfg(target_os = "espidf")]
static CONNECTED: AtomicBool = AtomicBool::new(false);

pub struct MqttSession {
    #[cfg(target_os = "espidf")]
    handle: Option<esp_mqtt_client_handle_t>,
    /// Certificate material must outlive the C client.
    #[cfg(target_os = "espidf")]
    cert_cache: Option<CertBundle>,
    #[cfg(target_os = "espidf")]
    uri: String,

    #[cfg(not(target_os = "espidf"))]
    sim_connected: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_inbound: VecDeque<(String, Vec<u8>)>,
    #[cfg(not(target_os = "espidf"))]
    sim_published: Vec<(String, Vec<u8>)>,
    #[cfg(not(target_os = "espidf"))]
    sim_subscriptions: Vec<String>,
    #[cfg(not(target_os = "espidf"))]
    sim_fail_connect: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_fail_publish: bool,
}

impl MqttSession {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            handle: None,
            #[cfg(target_os = "espidf")]
            cert_cache: None,
            #[cfg(target_os = "espidf")]
            uri: String::new(),

            #[cfg(not(target_os = "espidf"))]
            sim_connected: false,
            #[cfg(not(target_os = "espidf"))]
            sim_inbound: VecDeque::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_published: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_subscriptions: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_fail_connect: false,
            #[cfg(not(target_os = "espidf"))]
            sim_fail_publish: false,
        }
    }

    // ── Simulation hooks ──────────────────────────────────────

    /// Queue a message as if the broker delivered it.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_inject(&mut self, topic: &str, payload: &[u8]) {
        self.sim_inbound.push_back((topic.to_string(), payload.to_vec()));
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_published(&self) -> &[(String, Vec<u8>)] {
        &self.sim_published
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_subscriptions(&self) -> &[String] {
        &self.sim_subscriptions
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_fail_connect(&mut self, fail: bool) {
        self.sim_fail_connect = fail;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_fail_publish(&mut self, fail: bool) {
        self.sim_fail_publish = fail;
    }
}

impl Default for MqttSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn on_mqtt_event(
    _handler_arg: *mut core::ffi::c_void,
    _base: esp_event_base_t,
    event_id: i32,
    event_data: *mut core::ffi::c_void,
) {
    let event = event_data as *mut esp_mqtt_event_t;
    if event.is_null() {
        return;
    }
    match event_id as esp_mqtt_event_id_t {
        esp_mqtt_event_id_t_MQTT_EVENT_CONNECTED => {
            CONNECTED.store(true, Ordering::Release);
        }
        esp_mqtt_event_id_t_MQTT_EVENT_DISCONNECTED => {
            CONNECTED.store(false, Ordering::Release);
        }
        esp_mqtt_event_id_t_MQTT_EVENT_DATA => {
            // SAFETY: topic/data pointers are valid for the handler call.
            let ev = unsafe { &*event };
            if ev.topic.is_null() || ev.data.is_null() {
                return;
            }
            let topic = unsafe {
                core::slice::from_raw_parts(ev.topic as *const u8, ev.topic_len as usize)
            };
            let data =
                unsafe { core::slice::from_raw_parts(ev.data as *const u8, ev.data_len as usize) };
            let Ok(topic) = core::str::from_utf8(topic) else {
                return;
            };
            if let Ok(mut q) = INBOUND.lock() {
                q.push_back((topic.to_string(), data.to_vec()));
            }
        }
        _ => {}
    }
}

impl CloudPort for MqttSession {
    #[cfg(target_os = "espidf")]
    fn connect(
        &mut self,
        endpoint: &str,
        port: u16,
        client_id: &str,
        certs: &CertBundle,
    ) -> Result<(), CommsError> {
        if !certs.is_complete() {
            return Err(CommsError::IncompleteCertBundle);
        }
        self.disconnect();

        // The C client keeps the cert pointers for the lifetime of the
        // session; cache our own copy next to the handle.
        let mut cache = CertBundle::empty();
        let _ = cache.ca_cert.extend_from_slice(&certs.ca_cert);
        let _ = cache.device_cert.extend_from_slice(&certs.device_cert);
        let _ = cache.device_key.extend_from_slice(&certs.device_key);
        self.cert_cache = Some(cache);
        let cache = match self.cert_cache.as_ref() {
            Some(c) => c,
            None => return Err(CommsError::CloudConnectFailed),
        };
        self.uri = format!("mqtts://{endpoint}:{port}\0");
        let mut client_id_z = String::from(client_id);
        client_id_z.push('\0');

        let mut cfg: esp_mqtt_client_config_t = unsafe { core::mem::zeroed() };
        cfg.broker.address.uri = self.uri.as_ptr() as *const _;
        cfg.broker.verification.certificate = cache.ca_cert.as_ptr() as *const _;
        cfg.credentials.client_id = client_id_z.as_ptr() as *const _;
        cfg.credentials.authentication.certificate = cache.device_cert.as_ptr() as *const _;
        cfg.credentials.authentication.key = cache.device_key.as_ptr() as *const _;

        // SAFETY: cfg and its pointees are valid; esp_mqtt_client_init
        // copies the configuration into the client.
        unsafe {
            let handle = esp_mqtt_client_init(&cfg);
            if handle.is_null() {
                return Err(CommsError::CloudConnectFailed);
            }
            if esp_mqtt_client_register_event(
                handle,
                esp_mqtt_event_id_t_MQTT_EVENT_ANY,
                Some(on_mqtt_event),
                core::ptr::null_mut(),
            ) != ESP_OK
            {
                esp_mqtt_client_destroy(handle);
                return Err(CommsError::CloudConnectFailed);
            }
            if esp_mqtt_client_start(handle) != ESP_OK {
                esp_mqtt_client_destroy(handle);
                return Err(CommsError::CloudConnectFailed);
            }
            self.handle = Some(handle);
        }

        // Block until CONNACK or give up; TLS + MQTT on this class of
        // broker completes well inside this window.
        for _ in 0..50 {
            if CONNECTED.load(Ordering::Acquire) {
                info!("Mqtt: session up to {endpoint}");
                return Ok(());
            }
            esp_idf_hal::delay::FreeRtos::delay_ms(100);
        }
        warn!("Mqtt: broker handshake timed out");
        self.disconnect();
        Err(CommsError::CloudConnectFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn connect(
        &mut self,
        endpoint: &str,
        port: u16,
        client_id: &str,
        certs: &CertBundle,
    ) -> Result<(), CommsError> {
        if !certs.is_complete() {
            return Err(CommsError::IncompleteCertBundle);
        }
        if self.sim_fail_connect {
            return Err(CommsError::CloudConnectFailed);
        }
        self.sim_connected = true;
        info!("Mqtt(sim): session up to {endpoint}:{port} as '{client_id}'");
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn is_connected(&self) -> bool {
        self.handle.is_some() && CONNECTED.load(Ordering::Acquire)
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_connected(&self) -> bool {
        self.sim_connected
    }

    #[cfg(target_os = "espidf")]
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        let Some(handle) = self.handle else {
            return Err(CommsError::PublishFailed);
        };
        let mut topic_z = String::from(topic);
        topic_z.push('\0');
        // SAFETY: handle is live; the client copies topic and payload.
        let msg_id = unsafe {
            esp_mqtt_client_publish(
                handle,
                topic_z.as_ptr() as *const _,
                payload.as_ptr() as *const _,
                payload.len() as i32,
                1, // QoS 1: at-least-once to the broker
                0, // no retain

            )
        };
        if msg_id < 0 {
            return Err(CommsError::PublishFailed);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        if !self.sim_connected || self.sim_fail_publish {
            return Err(CommsError::PublishFailed);
        }
        self.sim_published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        let Some(handle) = self.handle else {
            return Err(CommsError::SubscribeFailed);
        };
        let mut topic_z = String::from(topic);
        topic_z.push('\0');
        // SAFETY: handle is live; the client copies the filter.
        let msg_id =
            unsafe { esp_mqtt_client_subscribe_single(handle, topic_z.as_ptr() as *const _, 1) };
        if msg_id < 0 {
            return Err(CommsError::SubscribeFailed);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        if !self.sim_connected {
            return Err(CommsError::SubscribeFailed);
        }
        self.sim_subscriptions.push(topic.to_string());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn unsubscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        let Some(handle) = self.handle else {
            return Err(CommsError::SubscribeFailed);
        };
        let mut topic_z = String::from(topic);
        topic_z.push('\0');
        // SAFETY: handle is live; the client copies the filter.
        let msg_id =
            unsafe { esp_mqtt_client_unsubscribe(handle, topic_z.as_ptr() as *const _) };
        if msg_id < 0 {
            return Err(CommsError::SubscribeFailed);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn unsubscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        self.sim_subscriptions.retain(|t| t != topic);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) {
        let drained: Vec<(String, Vec<u8>)> = match INBOUND.lock() {
            Ok(mut q) => q.drain(..).collect(),
            Err(_) => return,
        };
        for (topic, payload) in drained {
            on_message(&topic, &payload);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) {
        while let Some((topic, payload)) = self.sim_inbound.pop_front() {
            on_message(&topic, &payload);
        }
    }

    fn disconnect(&mut self) {
        #[cfg(target_os = "espidf")]
        {
            if let Some(handle) = self.handle.take() {
                // SAFETY: handle came from esp_mqtt_client_init and is
                // destroyed exactly once.
                unsafe {
                    esp_mqtt_client_stop(handle);
                    esp_mqtt_client_destroy(handle);
                }
                self.cert_cache = None;
                info!("Mqtt: session closed");
            }
            CONNECTED.store(false, Ordering::Release);
        }

        #[cfg(not(target_os = "espidf"))]
        if core::mem::take(&mut self.sim_connected) {
            info!("Mqtt(sim): session closed");
        }
    }
}
