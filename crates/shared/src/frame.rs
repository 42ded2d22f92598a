//! Serial telemetry frames sent by the plant microcontroller.
//!
//! ```text
//! byte | content
//! 0    | start byte 0xAA
//! 1    | level_1 (cm)
//! 2    | level_2 (cm)
//! 3    | tds
//! 4    | flow
//! 5    | pressure
//! 6    | input flags
//! 7    | output flags
//! 8    | output flags 2
//! 9    | XOR of bytes 0..=8
//! ```
//!
//! Flag bytes are read LSB first. The host answers every accepted frame with
//! [`ACK_BYTE`] while the plant is not in override mode.

use crate::error::FrameError;

pub const START_BYTE: u8 = 0xAA;
pub const FRAME_LEN: usize = 10;
pub const ACK_BYTE: u8 = 0xFF;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputFlags {
    pub level_switch: bool,
    pub pb_start: bool,
    pub mode_standby: bool,
    pub mode_filtering: bool,
    pub mode_backwash: bool,
    pub mode_drain: bool,
    pub mode_override: bool,
    pub emergency_stop: bool,
}

impl InputFlags {
    fn from_byte(byte: u8) -> Self {
        let [level_switch, pb_start, mode_standby, mode_filtering, mode_backwash, mode_drain, mode_override, emergency_stop] =
            bits(byte);
        Self {
            level_switch,
            pb_start,
            mode_standby,
            mode_filtering,
            mode_backwash,
            mode_drain,
            mode_override,
            emergency_stop,
        }
    }

    fn to_byte(self) -> u8 {
        pack([
            self.level_switch,
            self.pb_start,
            self.mode_standby,
            self.mode_filtering,
            self.mode_backwash,
            self.mode_drain,
            self.mode_override,
            self.emergency_stop,
        ])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputFlags {
    pub solenoids: [bool; 6],
    pub pumps: [bool; 3],
    pub standby_lamp: bool,
    pub filtering_lamp: bool,
    pub backwash_lamp: bool,
    pub drain_lamp: bool,
    pub stepper_pulse: bool,
    pub stepper_enable: bool,
    pub stepper_direction: bool,
}

impl OutputFlags {
    fn from_bytes(first: u8, second: u8) -> Self {
        let [s1, s2, s3, s4, s5, s6, pump1, pump2] = bits(first);
        let [pump3, standby_lamp, filtering_lamp, backwash_lamp, drain_lamp, stepper_pulse, stepper_enable, stepper_direction] =
            bits(second);
        Self {
            solenoids: [s1, s2, s3, s4, s5, s6],
            pumps: [pump1, pump2, pump3],
            standby_lamp,
            filtering_lamp,
            backwash_lamp,
            drain_lamp,
            stepper_pulse,
            stepper_enable,
            stepper_direction,
        }
    }

    fn to_bytes(self) -> (u8, u8) {
        let [s1, s2, s3, s4, s5, s6] = self.solenoids;
        let [pump1, pump2, pump3] = self.pumps;
        (
            pack([s1, s2, s3, s4, s5, s6, pump1, pump2]),
            pack([
                pump3,
                self.standby_lamp,
                self.filtering_lamp,
                self.backwash_lamp,
                self.drain_lamp,
                self.stepper_pulse,
                self.stepper_enable,
                self.stepper_direction,
            ]),
        )
    }
}

/// One decoded microcontroller frame. Levels are raw centimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Telemetry {
    pub level_1: u8,
    pub level_2: u8,
    pub tds: u8,
    pub flow: u8,
    pub pressure: u8,
    pub inputs: InputFlags,
    pub outputs: OutputFlags,
}

fn bits(byte: u8) -> [bool; 8] {
    std::array::from_fn(|i| (byte >> i) & 1 == 1)
}

fn pack(flags: [bool; 8]) -> u8 {
    flags
        .iter()
        .enumerate()
        .fold(0, |acc, (i, on)| acc | (u8::from(*on) << i))
}

pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

pub fn decode_frame(frame: &[u8]) -> Result<Telemetry, FrameError> {
    if frame.len() != FRAME_LEN {
        return Err(FrameError::Length {
            expected: FRAME_LEN,
            actual: frame.len(),
        });
    }
    if frame[0] != START_BYTE {
        return Err(FrameError::StartByte {
            expected: START_BYTE,
            found: frame[0],
        });
    }
    let computed = checksum(&frame[..FRAME_LEN - 1]);
    let carried = frame[FRAME_LEN - 1];
    if computed != carried {
        return Err(FrameError::Checksum { carried, computed });
    }

    Ok(Telemetry {
        level_1: frame[1],
        level_2: frame[2],
        tds: frame[3],
        flow: frame[4],
        pressure: frame[5],
        inputs: InputFlags::from_byte(frame[6]),
        outputs: OutputFlags::from_bytes(frame[7], frame[8]),
    })
}

pub fn encode_frame(telemetry: &Telemetry) -> [u8; FRAME_LEN] {
    let (outputs, outputs2) = telemetry.outputs.to_bytes();
    let mut frame = [
        START_BYTE,
        telemetry.level_1,
        telemetry.level_2,
        telemetry.tds,
        telemetry.flow,
        telemetry.pressure,
        telemetry.inputs.to_byte(),
        outputs,
        outputs2,
        0,
    ];
    frame[FRAME_LEN - 1] = checksum(&frame[..FRAME_LEN - 1]);
    frame
}

/// Streaming decoder for a serial byte stream.
///
/// Bytes before a start byte are discarded. A frame with a bad checksum is
/// reported once and decoding resumes at the next start byte after it.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes held while waiting for the rest of a frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn next_frame(&mut self) -> Option<Result<Telemetry, FrameError>> {
        let start = self.buf.iter().position(|b| *b == START_BYTE);
        match start {
            Some(0) => {}
            Some(offset) => {
                self.buf.drain(..offset);
            }
            None => {
                self.buf.clear();
                return None;
            }
        }

        if self.buf.len() < FRAME_LEN {
            return None;
        }

        match decode_frame(&self.buf[..FRAME_LEN]) {
            Ok(telemetry) => {
                self.buf.drain(..FRAME_LEN);
                Some(Ok(telemetry))
            }
            Err(err) => {
                self.buf.drain(..1);
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Telemetry {
        Telemetry {
            level_1: 64,
            level_2: 40,
            tds: 120,
            flow: 12,
            pressure: 3,
            inputs: InputFlags {
                mode_filtering: true,
                emergency_stop: true,
                ..InputFlags::default()
            },
            outputs: OutputFlags {
                solenoids: [true, false, false, false, false, true],
                pumps: [false, true, true],
                drain_lamp: true,
                ..OutputFlags::default()
            },
        }
    }

    #[test]
    fn decodes_flag_bits_lsb_first() {
        let mut frame = [0xAA, 10, 20, 30, 40, 50, 0b0000_1000, 0b1000_0001, 0b0000_0001, 0];
        frame[9] = checksum(&frame[..9]);

        let telemetry = decode_frame(&frame).expect("frame");
        assert_eq!(telemetry.level_1, 10);
        assert_eq!(telemetry.pressure, 50);
        assert!(telemetry.inputs.mode_filtering);
        assert!(!telemetry.inputs.mode_standby);
        assert_eq!(telemetry.outputs.solenoids, [true, false, false, false, false, false]);
        assert_eq!(telemetry.outputs.pumps, [false, true, true]);
    }

    #[test]
    fn encoded_frame_decodes_to_same_telemetry() {
        let frame = encode_frame(&sample());
        assert_eq!(frame[0], START_BYTE);
        assert_eq!(decode_frame(&frame), Ok(sample()));
    }

    #[test]
    fn rejects_bad_length_start_and_checksum() {
        assert_eq!(
            decode_frame(&[0xAA, 1, 2]),
            Err(FrameError::Length {
                expected: FRAME_LEN,
                actual: 3
            })
        );

        let mut frame = encode_frame(&sample());
        frame[0] = 0xBB;
        assert!(matches!(
            decode_frame(&frame),
            Err(FrameError::StartByte { found: 0xBB, .. })
        ));

        let mut frame = encode_frame(&sample());
        frame[3] ^= 0x01;
        assert!(matches!(decode_frame(&frame), Err(FrameError::Checksum { .. })));
    }

    #[test]
    fn decoder_handles_split_reads_and_leading_noise() {
        let frame = encode_frame(&sample());
        let mut decoder = FrameDecoder::new();

        decoder.push(&[0x00, 0x13]);
        decoder.push(&frame[..4]);
        assert!(decoder.next_frame().is_none());
        assert_eq!(decoder.pending(), 4);

        decoder.push(&frame[4..]);
        assert_eq!(decoder.next_frame(), Some(Ok(sample())));
        assert!(decoder.next_frame().is_none());
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn decoder_resyncs_after_corrupt_frame() {
        let mut corrupt = encode_frame(&sample());
        corrupt[9] ^= 0xFF;
        let good = encode_frame(&Telemetry::default());

        let mut decoder = FrameDecoder::new();
        decoder.push(&corrupt);
        decoder.push(&good);

        assert!(matches!(decoder.next_frame(), Some(Err(FrameError::Checksum { .. }))));
        assert_eq!(decoder.next_frame(), Some(Ok(Telemetry::default())));
        assert!(decoder.next_frame().is_none());
    }
}
