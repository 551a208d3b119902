use crate::timing::Ticks;

/// Centre position of the pitch wheel.
pub const BEND_CENTER: u16 = 8192;
/// Largest 14-bit pitch wheel value.
pub const BEND_MAX: u16 = 16383;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent {
    /// Ticks since the previously emitted event.
    pub delta: Ticks,
    pub channel: u8,
    pub message: MidiMessage,
}

impl TimedEvent {
    pub fn note_off(delta: Ticks, pitch: u8, channel: u8) -> Self {
        Self {
            delta,
            channel,
            message: MidiMessage::NoteOff { pitch },
        }
    }

    pub fn pitch_wheel(delta: Ticks, channel: u8, value: u16) -> Self {
        Self {
            delta,
            channel,
            message: MidiMessage::PitchWheel {
                value: value.min(BEND_MAX),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8 },
    PitchWheel { value: u16 },
}

impl MidiMessage {
    /// Data bytes as they appear on the wire after the status byte.
    pub fn data(&self) -> [u8; 2] {
        match *self {
            MidiMessage::NoteOn { pitch, velocity } => [pitch & 0x7f, velocity & 0x7f],
            MidiMessage::NoteOff { pitch } => [pitch & 0x7f, 0],
            MidiMessage::PitchWheel { value } => {
                [(value & 0x7f) as u8, ((value >> 7) & 0x7f) as u8]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_wheel_splits_into_seven_bit_bytes() {
        let center = MidiMessage::PitchWheel { value: BEND_CENTER };
        assert_eq!(center.data(), [0x00, 0x40]);

        let top = MidiMessage::PitchWheel { value: BEND_MAX };
        assert_eq!(top.data(), [0x7f, 0x7f]);
    }

    #[test]
    fn pitch_wheel_constructor_clamps() {
        let event = TimedEvent::pitch_wheel(0, 3, u16::MAX);
        assert_eq!(event.message, MidiMessage::PitchWheel { value: BEND_MAX });
    }
}
