//! Register address map and output channel mask
//!
//! The OPLL exposes a 64-entry write-only register file. Registers
//! 0x00-0x07 program the user patch, 0x0E gates rhythm mode and the five
//! percussion keys, 0x10-0x18 / 0x20-0x28 / 0x30-0x38 are the per-channel
//! frequency, key/octave and instrument/volume registers.

use bitflags::bitflags;

/// Size of the register file (6-bit address space).
pub const REG_COUNT: usize = 0x40;

/// Rhythm mode control / percussion key register.
pub const REG_RHYTHM: u8 = 0x0e;
/// Base of the per-channel F-Number low registers.
pub const REG_FNUM_LO: u8 = 0x10;
/// Base of the per-channel key-on/block/F-Number-high registers.
pub const REG_KEY_BLOCK: u8 = 0x20;
/// Base of the per-channel instrument/volume registers.
pub const REG_INST_VOL: u8 = 0x30;

/// Slot indices of the percussion voices inside the 18-slot array.
pub const SLOT_BD1: usize = 12;
/// Second bass drum operator (carrier of channel 6).
pub const SLOT_BD2: usize = 13;
/// Hi-hat (modulator of channel 7).
pub const SLOT_HH: usize = 14;
/// Snare drum (carrier of channel 7).
pub const SLOT_SD: usize = 15;
/// Tom (modulator of channel 8).
pub const SLOT_TOM: usize = 16;
/// Cymbal (carrier of channel 8).
pub const SLOT_CYM: usize = 17;

bitflags! {
    /// Mute mask over the 14 logical output channels.
    ///
    /// Bits 0-8 are the tone channels; the percussion voices have their own
    /// bits because rhythm mode splits channels 6-8 into five drums.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ChannelMask: u32 {
        /// Tone channel 0
        const CH0 = 1 << 0;
        /// Tone channel 1
        const CH1 = 1 << 1;
        /// Tone channel 2
        const CH2 = 1 << 2;
        /// Tone channel 3
        const CH3 = 1 << 3;
        /// Tone channel 4
        const CH4 = 1 << 4;
        /// Tone channel 5
        const CH5 = 1 << 5;
        /// Tone channel 6
        const CH6 = 1 << 6;
        /// Tone channel 7
        const CH7 = 1 << 7;
        /// Tone channel 8
        const CH8 = 1 << 8;
        /// Hi-hat
        const HH = 1 << 9;
        /// Cymbal
        const CYM = 1 << 10;
        /// Tom
        const TOM = 1 << 11;
        /// Snare drum
        const SD = 1 << 12;
        /// Bass drum
        const BD = 1 << 13;
        /// All five percussion voices
        const RHYTHM = Self::HH.bits()
            | Self::CYM.bits()
            | Self::TOM.bits()
            | Self::SD.bits()
            | Self::BD.bits();
    }
}

impl ChannelMask {
    /// Mask bit for tone channel `ch` (masked to 0-8).
    pub fn channel(ch: usize) -> ChannelMask {
        ChannelMask::from_bits_truncate(1 << (ch % 9))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_mask_bits() {
        assert_eq!(ChannelMask::channel(0), ChannelMask::CH0);
        assert_eq!(ChannelMask::channel(8), ChannelMask::CH8);
        assert_eq!(ChannelMask::channel(9), ChannelMask::CH0);
    }

    #[test]
    fn test_rhythm_mask_covers_all_drums() {
        let rhythm = ChannelMask::RHYTHM;
        for drum in [
            ChannelMask::HH,
            ChannelMask::CYM,
            ChannelMask::TOM,
            ChannelMask::SD,
            ChannelMask::BD,
        ] {
            assert!(rhythm.contains(drum));
        }
        assert!(!rhythm.intersects(ChannelMask::CH0 | ChannelMask::CH8));
    }
}
