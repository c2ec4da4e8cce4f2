//! Steady-state telemetry frames exchanged every cycle.

use bytes::{Buf, BufMut};

use super::{get_bytes, get_i16s, get_u16s, Payload};
use crate::protocol::PayloadType;

/// Motors driven by the body.
pub const MOTOR_COUNT: usize = 4;
/// Backpack LEDs.
pub const LED_COUNT: usize = 4;
/// Cliff sensors, one per corner.
pub const CLIFF_COUNT: usize = 4;
/// Microphone samples per body frame.
pub const MIC_SAMPLES: usize = 320;

/// `power_flags` bit asking the body to stay in its low-power mode.
pub const POWER_FLAG_CALM: u8 = 0x01;

/// Backpack LED colors, one RGBA quad per LED.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightState {
    pub leds: [[u8; 4]; LED_COUNT],
}

impl LightState {
    /// All LEDs the same color.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            leds: [rgba; LED_COUNT],
        }
    }
}

impl Payload for LightState {
    const TYPE: PayloadType = PayloadType::LightState;
    const LEN: usize = 4 * LED_COUNT;

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        for led in &self.leds {
            buf.put_slice(led);
        }
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        let mut leds = [[0u8; 4]; LED_COUNT];
        for led in leds.iter_mut() {
            *led = get_bytes(buf);
        }
        Self { leds }
    }
}

/// Actuator commands sent head → body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadToBody {
    pub framecounter: u32,
    pub power_flags: u8,
    /// Signed duty cycle per motor.
    pub motor_power: [i16; MOTOR_COUNT],
    pub lights: LightState,
}

impl HeadToBody {
    /// Whether the calm power bit is set.
    pub fn is_calm(&self) -> bool {
        self.power_flags & POWER_FLAG_CALM != 0
    }
}

impl Payload for HeadToBody {
    const TYPE: PayloadType = PayloadType::DataFrame;
    const LEN: usize = 32;

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32_ne(self.framecounter);
        buf.put_u8(self.power_flags);
        buf.put_bytes(0, 3);
        for power in self.motor_power {
            buf.put_i16_ne(power);
        }
        self.lights.write_to(buf);
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        let framecounter = buf.get_u32_ne();
        let power_flags = buf.get_u8();
        buf.advance(3);
        let motor_power = get_i16s(buf);
        let lights = LightState::read_from(buf);
        Self {
            framecounter,
            power_flags,
            motor_power,
            lights,
        }
    }
}

/// Encoder reading for one motor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotorState {
    /// Encoder position.
    pub position: i32,
    /// Encoder ticks since the previous frame.
    pub delta: i32,
    /// Body timestamp of the last encoder edge.
    pub time: u32,
}

impl MotorState {
    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_i32_ne(self.position);
        buf.put_i32_ne(self.delta);
        buf.put_u32_ne(self.time);
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        Self {
            position: buf.get_i32_ne(),
            delta: buf.get_i32_ne(),
            time: buf.get_u32_ne(),
        }
    }
}

/// Battery and charger readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatteryState {
    pub main_voltage: i16,
    pub charger: i16,
    pub temperature: i16,
    pub flags: u16,
}

/// Time-of-flight sensor reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeData {
    pub range_mm: u16,
    pub spad_count: u16,
    pub signal_rate: u16,
    pub ambient_rate: u16,
    pub sample_count: u16,
    pub calibration_result: u8,
    pub status: u8,
}

/// Sensor telemetry sent body → head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyToHead {
    pub framecounter: u32,
    pub flags: u32,
    pub motors: [MotorState; MOTOR_COUNT],
    pub cliff_sense: [u16; CLIFF_COUNT],
    pub battery: BatteryState,
    pub range: RangeData,
    pub touch_level: [u16; 2],
    /// Per-channel microphone fault bits.
    pub mic_error: [u16; 2],
    pub mic_data: [i16; MIC_SAMPLES],
}

impl Default for BodyToHead {
    fn default() -> Self {
        Self {
            framecounter: 0,
            flags: 0,
            motors: [MotorState::default(); MOTOR_COUNT],
            cliff_sense: [0; CLIFF_COUNT],
            battery: BatteryState::default(),
            range: RangeData::default(),
            touch_level: [0; 2],
            mic_error: [0; 2],
            mic_data: [0; MIC_SAMPLES],
        }
    }
}

impl Payload for BodyToHead {
    const TYPE: PayloadType = PayloadType::DataFrame;
    const LEN: usize = 732;

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32_ne(self.framecounter);
        buf.put_u32_ne(self.flags);
        for motor in &self.motors {
            motor.write_to(buf);
        }
        for v in self.cliff_sense {
            buf.put_u16_ne(v);
        }

        buf.put_i16_ne(self.battery.main_voltage);
        buf.put_i16_ne(self.battery.charger);
        buf.put_i16_ne(self.battery.temperature);
        buf.put_u16_ne(self.battery.flags);

        buf.put_u16_ne(self.range.range_mm);
        buf.put_u16_ne(self.range.spad_count);
        buf.put_u16_ne(self.range.signal_rate);
        buf.put_u16_ne(self.range.ambient_rate);
        buf.put_u16_ne(self.range.sample_count);
        buf.put_u8(self.range.calibration_result);
        buf.put_u8(self.range.status);

        for v in self.touch_level.iter().chain(&self.mic_error) {
            buf.put_u16_ne(*v);
        }
        for sample in self.mic_data {
            buf.put_i16_ne(sample);
        }
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        let framecounter = buf.get_u32_ne();
        let flags = buf.get_u32_ne();
        let mut motors = [MotorState::default(); MOTOR_COUNT];
        for motor in motors.iter_mut() {
            *motor = MotorState::read_from(buf);
        }
        let cliff_sense = get_u16s(buf);
        let battery = BatteryState {
            main_voltage: buf.get_i16_ne(),
            charger: buf.get_i16_ne(),
            temperature: buf.get_i16_ne(),
            flags: buf.get_u16_ne(),
        };
        let range = RangeData {
            range_mm: buf.get_u16_ne(),
            spad_count: buf.get_u16_ne(),
            signal_rate: buf.get_u16_ne(),
            ambient_rate: buf.get_u16_ne(),
            sample_count: buf.get_u16_ne(),
            calibration_result: buf.get_u8(),
            status: buf.get_u8(),
        };
        let touch_level = get_u16s(buf);
        let mic_error = get_u16s(buf);
        let mic_data = get_i16s(buf);
        Self {
            framecounter,
            flags,
            motors,
            cliff_sense,
            battery,
            range,
            touch_level,
            mic_error,
            mic_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_body() -> BodyToHead {
        let mut body = BodyToHead {
            framecounter: 0xDEAD_BEEF,
            flags: 0x8000_0001,
            ..Default::default()
        };
        for (i, motor) in body.motors.iter_mut().enumerate() {
            motor.position = -(i as i32) * 1000;
            motor.delta = i as i32 - 2;
            motor.time = 40_000 + i as u32;
        }
        body.cliff_sense = [10, 20, 30, 40];
        body.battery = BatteryState {
            main_voltage: 3900,
            charger: -1,
            temperature: 250,
            flags: 0x0003,
        };
        body.range.range_mm = 412;
        body.range.status = 0xFE;
        body.touch_level = [0x1234, 0xFFFF];
        body.mic_error = [0x0F0F, 0xF0F0];
        for (i, sample) in body.mic_data.iter_mut().enumerate() {
            *sample = (i as i16 - 160) * 100;
        }
        body
    }

    #[test]
    fn test_head_to_body_layout() {
        let frame = HeadToBody {
            framecounter: 1,
            power_flags: POWER_FLAG_CALM,
            motor_power: [100, -100, 0, i16::MIN],
            lights: LightState::solid([1, 2, 3, 4]),
        };
        let bytes = frame.encode();
        assert_eq!(bytes.len(), HeadToBody::LEN);
        assert_eq!(&bytes[0..4], &1u32.to_ne_bytes());
        assert_eq!(bytes[4], POWER_FLAG_CALM);
        assert_eq!(&bytes[5..8], &[0, 0, 0]);
        assert_eq!(&bytes[8..10], &100i16.to_ne_bytes());
        assert_eq!(&bytes[16..20], &[1, 2, 3, 4]);
        assert_eq!(HeadToBody::decode(&bytes).unwrap(), frame);
        assert!(frame.is_calm());
    }

    #[test]
    fn test_reserved_bytes_ignored_on_decode() {
        let mut bytes = HeadToBody::default().encode();
        bytes[5] = 0xFF;
        assert_eq!(HeadToBody::decode(&bytes).unwrap(), HeadToBody::default());
    }

    #[test]
    fn test_body_to_head_layout() {
        let body = sample_body();
        let bytes = body.encode();
        assert_eq!(bytes.len(), BodyToHead::LEN);

        // Fixed offsets of a few fields.
        assert_eq!(&bytes[0..4], &0xDEAD_BEEFu32.to_ne_bytes());
        assert_eq!(&bytes[56..58], &10u16.to_ne_bytes());
        assert_eq!(&bytes[64..66], &3900i16.to_ne_bytes());
        assert_eq!(&bytes[72..74], &412u16.to_ne_bytes());
        assert_eq!(bytes[83], 0xFE);
        assert_eq!(&bytes[84..86], &0x1234u16.to_ne_bytes());
        assert_eq!(&bytes[92..94], &(-16000i16).to_ne_bytes());

        assert_eq!(BodyToHead::decode(&bytes).unwrap(), body);
    }

    #[test]
    fn test_light_state_is_sixteen_bytes() {
        let lights = LightState {
            leds: [[1, 0, 0, 255], [0, 1, 0, 255], [0, 0, 1, 255], [0, 0, 0, 0]],
        };
        let bytes = lights.encode();
        assert_eq!(bytes.len(), 16);
        assert_eq!(LightState::decode(&bytes).unwrap(), lights);
    }
}
