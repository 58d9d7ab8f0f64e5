//! Sensor adapters for both nodes.
//!
//! Outdoor: a BME280 combo sensor (I2C, forced mode — one conversion
//! per wake, then back to sleep current) plus an analog UV photodiode
//! on the ADC. Indoor: a 10 kOhm NTC thermistor in a voltage divider,
//! converted with the simplified Beta equation.
//!
//! Compensation math is kept in pure functions over the raw readings
//! so it runs on the host; only register and ADC access is cfg-gated.

#[cfg(target_os = "espidf")]
use log::{info, warn};

use crate::app::ports::{BarometricSample, IndoorSensorPort, WeatherSensorPort};

#[cfg(target_os = "espidf")]
use esp_idf_hal::delay::FreeRtos;
#[cfg(target_os = "espidf")]
use esp_idf_hal::i2c::I2cDriver;

// ───────────────────────────────────────────────────────────────
// BME280 register map and calibration
// ───────────────────────────────────────────────────────────────

const BME280_ADDR: u8 = 0x76;
const REG_ID: u8 = 0xD0;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_STATUS: u8 = 0xF3;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CALIB_00: u8 = 0x88;
const REG_CALIB_26: u8 = 0xE1;
const REG_DATA: u8 = 0xF7;
const CHIP_ID: u8 = 0x60;

/// Forced mode, 1x oversampling on all three channels.
const CTRL_HUM_OS1: u8 = 0x01;
const CTRL_MEAS_FORCED_OS1: u8 = 0x25;

/// Trimming parameters burned into the sensor at production.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bme280Calib {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i16,
    pub h5: i16,
    pub h6: i8,
}

impl Bme280Calib {
    /// Parse the two calibration blocks (0x88..0xA1 and 0xE1..0xE7).
    /// H4/H5 share a nibble-packed middle byte.
    pub fn parse(block1: &[u8; 26], block2: &[u8; 7]) -> Self {
        let u = |i: usize| u16::from_le_bytes([block1[i], block1[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([block1[i], block1[i + 1]]);
        Self {
            t1: u(0),
            t2: s(2),
            t3: s(4),
            p1: u(6),
            p2: s(8),
            p3: s(10),
            p4: s(12),
            p5: s(14),
            p6: s(16),
            p7: s(18),
            p8: s(20),
            p9: s(22),
            h1: block1[25],
            h2: i16::from_le_bytes([block2[0], block2[1]]),
            h3: block2[2],
            h4: (i16::from(block2[3] as i8) << 4) | i16::from(block2[4] & 0x0F),
            h5: (i16::from(block2[5] as i8) << 4) | i16::from(block2[4] >> 4),
            h6: block2[6] as i8,
        }
    }
}

/// One raw burst readout (0xF7..0xFE).
#[derive(Debug, Clone, Copy)]
pub struct Bme280Raw {
    pub adc_p: u32,
    pub adc_t: u32,
    pub adc_h: u32,
}

impl Bme280Raw {
    pub fn parse(buf: &[u8; 8]) -> Self {
        Self {
            adc_p: (u32::from(buf[0]) << 12) | (u32::from(buf[1]) << 4) | (u32::from(buf[2]) >> 4),
            adc_t: (u32::from(buf[3]) << 12) | (u32::from(buf[4]) << 4) | (u32::from(buf[5]) >> 4),
            adc_h: (u32::from(buf[6]) << 8) | u32::from(buf[7]),
        }
    }
}

/// Datasheet double-precision compensation. Returns (temp C,
/// humidity %RH clamped to 0..=100, pressure hPa).
pub fn compensate(raw: &Bme280Raw, c: &Bme280Calib) -> (f32, f32, f32) {
    let adc_t = f64::from(raw.adc_t);
    let var1 = (adc_t / 16384.0 - f64::from(c.t1) / 1024.0) * f64::from(c.t2);
    let d = adc_t / 131072.0 - f64::from(c.t1) / 8192.0;
    let var2 = d * d * f64::from(c.t3);
    let t_fine = var1 + var2;
    let temp_c = t_fine / 5120.0;

    let mut var1 = t_fine / 2.0 - 64000.0;
    let mut var2 = var1 * var1 * f64::from(c.p6) / 32768.0;
    var2 += var1 * f64::from(c.p5) * 2.0;
    var2 = var2 / 4.0 + f64::from(c.p4) * 65536.0;
    var1 = (f64::from(c.p3) * var1 * var1 / 524288.0 + f64::from(c.p2) * var1) / 524288.0;
    var1 = (1.0 + var1 / 32768.0) * f64::from(c.p1);
    let pressure_pa = if var1 == 0.0 {
        0.0
    } else {
        let mut p = 1048576.0 - f64::from(raw.adc_p);
        p = (p - var2 / 4096.0) * 6250.0 / var1;
        let var1 = f64::from(c.p9) * p * p / 2147483648.0;
        let var2 = p * f64::from(c.p8) / 32768.0;
        p + (var1 + var2 + f64::from(c.p7)) / 16.0
    };

    let mut var_h = t_fine - 76800.0;
    var_h = (f64::from(raw.adc_h) - (f64::from(c.h4) * 64.0 + f64::from(c.h5) / 16384.0 * var_h))
        * (f64::from(c.h2) / 65536.0
            * (1.0
                + f64::from(c.h6) / 67108864.0
                    * var_h
                    * (1.0 + f64::from(c.h3) / 67108864.0 * var_h)));
    var_h *= 1.0 - f64::from(c.h1) * var_h / 524288.0;
    let humidity = var_h.clamp(0.0, 100.0);

    (temp_c as f32, humidity as f32, (pressure_pa / 100.0) as f32)
}

// ───────────────────────────────────────────────────────────────
// Outdoor sensor pack
// ───────────────────────────────────────────────────────────────

pub struct WeatherSensors {
    /// `None` when the BME280 probe failed at boot.
    calib: Option<Bme280Calib>,
    #[cfg(target_os = "espidf")]
    i2c: Option<I2cDriver<'static>>,
    #[cfg(target_os = "espidf")]
    uv_adc_channel: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_sample: Option<BarometricSample>,
    #[cfg(not(target_os = "espidf"))]
    sim_uv_raw: u16,
}

#[cfg(target_os = "espidf")]
const I2C_TIMEOUT_TICKS: u32 = 100;

impl WeatherSensors {
    /// Probe the BME280 and read its calibration. A failed probe is
    /// logged and tolerated — the node still delivers UV.
    #[cfg(target_os = "espidf")]
    pub fn new(mut i2c: I2cDriver<'static>, uv_adc_channel: u32) -> Self {
        let calib = Self::probe(&mut i2c);
        if calib.is_none() {
            warn!("Sensors: BME280 not found at 0x{BME280_ADDR:02x}");
        } else {
            info!("Sensors: BME280 online");
        }
        Self {
            calib,
            i2c: Some(i2c),
            uv_adc_channel,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new_sim(sample: Option<BarometricSample>, uv_raw: u16) -> Self {
        Self {
            calib: sample.map(|_| DATASHEET_CALIB),
            sim_sample: sample,
            sim_uv_raw: uv_raw,
        }
    }

    #[cfg(target_os = "espidf")]
    fn probe(i2c: &mut I2cDriver<'static>) -> Option<Bme280Calib> {
        let mut id = [0u8; 1];
        i2c.write_read(BME280_ADDR, &[REG_ID], &mut id, I2C_TIMEOUT_TICKS)
            .ok()?;
        if id[0] != CHIP_ID {
            return None;
        }
        let mut block1 = [0u8; 26];
        i2c.write_read(BME280_ADDR, &[REG_CALIB_00], &mut block1, I2C_TIMEOUT_TICKS)
            .ok()?;
        let mut block2 = [0u8; 7];
        i2c.write_read(BME280_ADDR, &[REG_CALIB_26], &mut block2, I2C_TIMEOUT_TICKS)
            .ok()?;
        Some(Bme280Calib::parse(&block1, &block2))
    }

    #[cfg(target_os = "espidf")]
    fn forced_read(&mut self) -> Option<Bme280Raw> {
        let i2c = self.i2c.as_mut()?;
        i2c.write(BME280_ADDR, &[REG_CTRL_HUM, CTRL_HUM_OS1], I2C_TIMEOUT_TICKS)
            .ok()?;
        i2c.write(
            BME280_ADDR,
            &[REG_CTRL_MEAS, CTRL_MEAS_FORCED_OS1],
            I2C_TIMEOUT_TICKS,
        )
        .ok()?;
        // 1x oversampling converts in under 10 ms; poll the busy bit.
        for _ in 0..5 {
            FreeRtos::delay_ms(3);
            let mut status = [0u8; 1];
            i2c.write_read(BME280_ADDR, &[REG_STATUS], &mut status, I2C_TIMEOUT_TICKS)
                .ok()?;
            if status[0] & 0x08 == 0 {
                let mut buf = [0u8; 8];
                i2c.write_read(BME280_ADDR, &[REG_DATA], &mut buf, I2C_TIMEOUT_TICKS)
                    .ok()?;
                return Some(Bme280Raw::parse(&buf));
            }
        }
        None
    }
}

impl WeatherSensorPort for WeatherSensors {
    #[cfg(target_os = "espidf")]
    fn read_barometric(&mut self) -> Option<BarometricSample> {
        let calib = self.calib?;
        let raw = self.forced_read()?;
        let (temp_c, humidity_pct, pressure_hpa) = compensate(&raw, &calib);
        Some(BarometricSample {
            temp_c,
            humidity_pct,
            pressure_hpa,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_barometric(&mut self) -> Option<BarometricSample> {
        self.calib?;
        self.sim_sample
    }

    #[cfg(target_os = "espidf")]
    fn read_uv_raw(&mut self) -> u16 {
        // SAFETY: channel configured during board bring-up.
        let raw = unsafe { esp_idf_svc::sys::adc1_get_raw(self.uv_adc_channel) };
        if raw < 0 { 0 } else { raw as u16 }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_uv_raw(&mut self) -> u16 {
        self.sim_uv_raw
    }
}

// ───────────────────────────────────────────────────────────────
// Indoor NTC thermistor
// ───────────────────────────────────────────────────────────────

const R25: f32 = 10_000.0;
const BETA: f32 = 3950.0;
const T25_K: f32 = 298.15;
const R_DIVIDER: f32 = 10_000.0;
const ADC_MAX: f32 = 4095.0;
const V_REF: f32 = 3.3;

/// 10 kOhm @ 25 C NTC in a divider against a fixed 10 kOhm resistor.
pub struct IndoorNtcSensor {
    #[cfg(target_os = "espidf")]
    adc_channel: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_raw: Option<u16>,
}

impl IndoorNtcSensor {
    #[cfg(target_os = "espidf")]
    pub fn new(adc_channel: u32) -> Self {
        Self { adc_channel }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new_sim(raw: Option<u16>) -> Self {
        Self { sim_raw: raw }
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> Option<u16> {
        // SAFETY: channel configured during board bring-up.
        let raw = unsafe { esp_idf_svc::sys::adc1_get_raw(self.adc_channel) };
        if raw < 0 { None } else { Some(raw as u16) }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> Option<u16> {
        self.sim_raw
    }
}

/// Simplified Beta (Steinhart-Hart) conversion. Rail-stuck readings
/// mean a broken divider, not a temperature.
pub fn ntc_adc_to_celsius(raw: u16) -> Option<f32> {
    let voltage = (f32::from(raw) / ADC_MAX) * V_REF;
    if voltage <= 0.01 || voltage >= (V_REF - 0.01) {
        return None;
    }
    let r_ntc = R_DIVIDER * voltage / (V_REF - voltage);
    let inv_t = (1.0 / T25_K) + (1.0 / BETA) * (r_ntc / R25).ln();
    if inv_t <= 0.0 {
        return None;
    }
    Some((1.0 / inv_t) - 273.15)
}

impl IndoorSensorPort for IndoorNtcSensor {
    fn read_temp_c(&mut self) -> Option<f32> {
        ntc_adc_to_celsius(self.read_adc()?)
    }
}

/// Reference trimming set from the sensor datasheet's worked example.
#[cfg(any(test, not(target_os = "espidf")))]
const DATASHEET_CALIB: Bme280Calib = Bme280Calib {
    t1: 27504,
    t2: 26435,
    t3: -1000,
    p1: 36477,
    p2: -10685,
    p3: 3024,
    p4: 2855,
    p5: 140,
    p6: -7,
    p7: 15500,
    p8: -14600,
    p9: 6000,
    h1: 75,
    h2: 355,
    h3: 0,
    h4: 340,
    h5: 0,
    h6: 30,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datasheet_worked_example() {
        // adc_T = 519888, adc_P = 415148 => 25.08 C, 1006.5 hPa.
        let raw = Bme280Raw {
            adc_t: 519_888,
            adc_p: 415_148,
            adc_h: 32_768,
        };
        let (t, h, p) = compensate(&raw, &DATASHEET_CALIB);
        assert!((24.9..25.3).contains(&t), "temp {t}");
        assert!((995.0..1015.0).contains(&p), "pressure {p}");
        assert!((0.0..=100.0).contains(&h), "humidity {h}");
    }

    #[test]
    fn humidity_is_clamped() {
        let raw_dry = Bme280Raw {
            adc_t: 519_888,
            adc_p: 415_148,
            adc_h: 0,
        };
        let (_, h, _) = compensate(&raw_dry, &DATASHEET_CALIB);
        assert!(h >= 0.0);

        let raw_wet = Bme280Raw {
            adc_t: 519_888,
            adc_p: 415_148,
            adc_h: 0xFFFF,
        };
        let (_, h, _) = compensate(&raw_wet, &DATASHEET_CALIB);
        assert!(h <= 100.0);
    }

    #[test]
    fn warmer_adc_reads_warmer_temperature() {
        let cold = Bme280Raw {
            adc_t: 400_000,
            adc_p: 415_148,
            adc_h: 32_768,
        };
        let warm = Bme280Raw {
            adc_t: 600_000,
            adc_p: 415_148,
            adc_h: 32_768,
        };
        let (tc, _, _) = compensate(&cold, &DATASHEET_CALIB);
        let (tw, _, _) = compensate(&warm, &DATASHEET_CALIB);
        assert!(tw > tc);
    }

    #[test]
    fn calib_parse_handles_nibble_packing() {
        let mut block1 = [0u8; 26];
        block1[0] = 0x70; // t1 low
        block1[1] = 0x6B; // t1 high => 27504
        block1[25] = 75; // h1
        let block2 = [0x63, 0x01, 0x00, 0x15, 0x24, 0x03, 0x1E];
        let c = Bme280Calib::parse(&block1, &block2);
        assert_eq!(c.t1, 27504);
        assert_eq!(c.h1, 75);
        assert_eq!(c.h2, 0x0163);
        // h4 = 0x15 << 4 | (0x24 & 0x0F) = 336 + 4
        assert_eq!(c.h4, 340);
        // h5 = 0x03 << 4 | (0x24 >> 4) = 48 + 2
        assert_eq!(c.h5, 50);
        assert_eq!(c.h6, 30);
    }

    #[test]
    fn ntc_room_temperature_midscale() {
        // Equal divider legs => 1.65 V => 10 kOhm => 25 C.
        let t = ntc_adc_to_celsius(2048).unwrap();
        assert!((24.0..26.0).contains(&t), "got {t}");
    }

    #[test]
    fn ntc_rail_readings_are_faults() {
        assert!(ntc_adc_to_celsius(0).is_none());
        assert!(ntc_adc_to_celsius(4095).is_none());
    }

    #[test]
    fn ntc_is_monotonic_decreasing_in_resistance() {
        // Higher ADC voltage = higher NTC resistance = colder.
        let warm = ntc_adc_to_celsius(1200).unwrap();
        let cold = ntc_adc_to_celsius(3000).unwrap();
        assert!(warm > cold);
    }

    #[cfg(not(target_os = "espidf"))]
    #[test]
    fn sim_pack_reports_like_port() {
        let mut ok = WeatherSensors::new_sim(
            Some(BarometricSample {
                temp_c: 20.0,
                humidity_pct: 50.0,
                pressure_hpa: 1000.0,
            }),
            1234,
        );
        assert!(ok.read_barometric().is_some());
        assert_eq!(ok.read_uv_raw(), 1234);

        let mut broken = WeatherSensors::new_sim(None, 555);
        assert!(broken.read_barometric().is_none());
        assert_eq!(broken.read_uv_raw(), 555);
    }
}
