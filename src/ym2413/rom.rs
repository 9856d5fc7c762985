//! Built-in instrument ROM banks
//!
//! The OPLL family ships 15 melodic voices and 3 rhythm voices in mask ROM.
//! The dumps below are the community-standard reverse-engineered banks for
//! the three chip variants, stored in the serialized voice format described
//! in [`crate::ym2413::patch`]. Voice 0 of each bank is the user patch and
//! is all zeros until programmed through registers 0x00-0x07.

use super::patch::BANK_DUMP_SIZE;

/// Selects which chip variant's mask ROM populates the patch store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstrumentRom {
    /// Standard YM2413 (OPLL) voices
    #[default]
    Ym2413,
    /// Konami VRC7 voices (Famicom expansion audio)
    Vrc7,
    /// Yamaha YMF281B voices
    Ymf281b,
}

impl InstrumentRom {
    /// The 152-byte bank dump for this variant.
    pub fn bank(self) -> &'static [u8; BANK_DUMP_SIZE] {
        match self {
            InstrumentRom::Ym2413 => &YM2413_ROM,
            InstrumentRom::Vrc7 => &VRC7_ROM,
            InstrumentRom::Ymf281b => &YMF281B_ROM,
        }
    }
}

#[rustfmt::skip]
static YM2413_ROM: [u8; BANK_DUMP_SIZE] = [
    // 0: user
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    // 1: violin
    0x61, 0x61, 0x1e, 0x17, 0xf0, 0x78, 0x00, 0x17,
    // 2: guitar
    0x13, 0x41, 0x1e, 0x0d, 0xd7, 0xf7, 0x13, 0x13,
    // 3: piano
    0x13, 0x01, 0x99, 0x00, 0xf2, 0xc4, 0x21, 0x23,
    // 4: flute
    0x21, 0x61, 0x1b, 0x07, 0xaf, 0x64, 0x40, 0x27,
    // 5: clarinet
    0x22, 0x21, 0x1e, 0x06, 0xf0, 0x76, 0x08, 0x28,
    // 6: oboe
    0x31, 0x22, 0x16, 0x05, 0x90, 0x71, 0x00, 0x18,
    // 7: trumpet
    0x21, 0x61, 0x1d, 0x07, 0x82, 0x81, 0x10, 0x07,
    // 8: organ
    0x23, 0x21, 0x2d, 0x16, 0x90, 0x90, 0x00, 0x07,
    // 9: horn
    0x21, 0x21, 0x1b, 0x06, 0x64, 0x65, 0x10, 0x17,
    // 10: synthesizer
    0x21, 0x21, 0x0b, 0x1a, 0x85, 0xa0, 0x70, 0x07,
    // 11: harpsichord
    0x23, 0x01, 0x83, 0x10, 0xff, 0xb4, 0x10, 0xf4,
    // 12: vibraphone
    0x97, 0xc1, 0x20, 0x07, 0xff, 0xf4, 0x22, 0x22,
    // 13: synth bass
    0x61, 0x00, 0x0c, 0x05, 0xc2, 0xf6, 0x40, 0x44,
    // 14: acoustic bass
    0x01, 0x01, 0x56, 0x03, 0x94, 0xc2, 0x03, 0x12,
    // 15: electric guitar
    0x21, 0x01, 0x89, 0x03, 0xf1, 0xe4, 0xf0, 0x23,
    // 16: bass drum
    0x07, 0x21, 0x14, 0x00, 0xee, 0xf8, 0xff, 0xf8,
    // 17: hi-hat / snare drum
    0x01, 0x31, 0x00, 0x00, 0xf8, 0xf7, 0xf8, 0xf7,
    // 18: tom / cymbal
    0x25, 0x11, 0x00, 0x00, 0xf8, 0xfa, 0xf8, 0x55,
];

#[rustfmt::skip]
static VRC7_ROM: [u8; BANK_DUMP_SIZE] = [
    // 0: user
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    // 1: buzzy bell
    0x03, 0x21, 0x05, 0x06, 0xe8, 0x81, 0x42, 0x27,
    // 2: guitar
    0x13, 0x41, 0x14, 0x0d, 0xd8, 0xf6, 0x23, 0x12,
    // 3: wurly
    0x11, 0x11, 0x08, 0x08, 0xfa, 0xb2, 0x20, 0x12,
    // 4: flute
    0x31, 0x61, 0x0c, 0x07, 0xa8, 0x64, 0x61, 0x27,
    // 5: clarinet
    0x32, 0x21, 0x1e, 0x06, 0xe1, 0x76, 0x01, 0x28,
    // 6: synth
    0x02, 0x01, 0x06, 0x00, 0xa3, 0xe2, 0xf4, 0xf4,
    // 7: trumpet
    0x21, 0x61, 0x1d, 0x07, 0x82, 0x81, 0x11, 0x07,
    // 8: organ
    0x23, 0x21, 0x22, 0x17, 0xa2, 0x72, 0x01, 0x17,
    // 9: bells
    0x35, 0x11, 0x25, 0x00, 0x40, 0x73, 0x72, 0x01,
    // 10: vibes
    0xb5, 0x01, 0x0f, 0x0f, 0xa8, 0xa5, 0x51, 0x02,
    // 11: vibraphone
    0x17, 0xc1, 0x24, 0x07, 0xf8, 0xf8, 0x22, 0x12,
    // 12: tutti
    0x71, 0x23, 0x11, 0x06, 0x65, 0x74, 0x18, 0x16,
    // 13: fretless
    0x01, 0x02, 0xd3, 0x05, 0xc9, 0x95, 0x03, 0x02,
    // 14: synth bass
    0x61, 0x63, 0x0c, 0x00, 0x94, 0xc0, 0x33, 0xf6,
    // 15: sweep
    0x21, 0x72, 0x0d, 0x00, 0xc1, 0xd5, 0x56, 0x06,
    // 16: bass drum
    0x07, 0x21, 0x14, 0x00, 0xee, 0xf8, 0xff, 0xf8,
    // 17: hi-hat / snare drum
    0x01, 0x31, 0x00, 0x00, 0xf8, 0xf7, 0xf8, 0xf7,
    // 18: tom / cymbal
    0x25, 0x11, 0x00, 0x00, 0xf8, 0xfa, 0xf8, 0x55,
];

#[rustfmt::skip]
static YMF281B_ROM: [u8; BANK_DUMP_SIZE] = [
    // 0: user
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    // 1: electric strings
    0x62, 0x21, 0x1a, 0x07, 0xf0, 0x6f, 0x00, 0x16,
    // 2: bow wow
    0x00, 0x10, 0x44, 0x02, 0xf6, 0xf4, 0x54, 0x23,
    // 3: electric guitar
    0x03, 0x01, 0x97, 0x04, 0xf3, 0xf3, 0x13, 0xf3,
    // 4: organ
    0x01, 0x61, 0x0a, 0x0f, 0xfa, 0x64, 0x70, 0x17,
    // 5: clarinet
    0x22, 0x21, 0x1e, 0x06, 0xf0, 0x76, 0x00, 0x28,
    // 6: saxophone
    0x00, 0x61, 0x8a, 0x0e, 0xc4, 0xd2, 0x50, 0x17,
    // 7: trumpet
    0x21, 0x61, 0x1b, 0x07, 0x84, 0x81, 0x11, 0x07,
    // 8: street organ
    0x37, 0x32, 0xc9, 0x01, 0x66, 0x64, 0x40, 0x07,
    // 9: synth brass
    0x01, 0x21, 0x06, 0x03, 0xa5, 0x71, 0x51, 0x07,
    // 10: electric piano
    0x06, 0x11, 0x5e, 0x07, 0xf3, 0xf2, 0xf6, 0xf6,
    // 11: bass
    0x00, 0x20, 0x18, 0x06, 0xf5, 0xf3, 0x20, 0x26,
    // 12: vibraphone
    0x97, 0x41, 0x20, 0x07, 0xff, 0xf4, 0x22, 0x22,
    // 13: chime
    0x65, 0x61, 0x15, 0x00, 0xf7, 0xf3, 0x16, 0xf4,
    // 14: tom tom II
    0x01, 0x31, 0x0e, 0x07, 0xfa, 0xf3, 0xff, 0xff,
    // 15: noise
    0x48, 0x61, 0x09, 0x07, 0xf1, 0x94, 0xf0, 0xf5,
    // 16: bass drum
    0x07, 0x21, 0x14, 0x00, 0xee, 0xf8, 0xff, 0xf8,
    // 17: hi-hat / snare drum
    0x01, 0x31, 0x00, 0x00, 0xf8, 0xf7, 0xf8, 0xf7,
    // 18: tom / cymbal
    0x25, 0x11, 0x00, 0x00, 0xf8, 0xfa, 0xf8, 0x55,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_voice_is_blank_in_every_rom() {
        for rom in [InstrumentRom::Ym2413, InstrumentRom::Vrc7, InstrumentRom::Ymf281b] {
            assert_eq!(&rom.bank()[..8], &[0u8; 8], "{rom:?}");
        }
    }

    #[test]
    fn test_rhythm_voices_shared_across_variants() {
        // All three chips carry the same percussion ROM.
        let base = InstrumentRom::Ym2413.bank();
        for rom in [InstrumentRom::Vrc7, InstrumentRom::Ymf281b] {
            assert_eq!(&rom.bank()[16 * 8..], &base[16 * 8..], "{rom:?}");
        }
    }

    #[test]
    fn test_bank_sizes() {
        assert_eq!(InstrumentRom::Ym2413.bank().len(), 152);
    }
}
