//! Instrument voice parameters and the 8-byte patch dump format
//!
//! A voice is a modulator/carrier pair of operator parameter sets. The chip
//! holds 19 voices (user patch 0, 15 melodic ROM voices, 3 rhythm voices)
//! as 38 interleaved [`Patch`] records. The serialized form is the de-facto
//! standard 8-bytes-per-voice dump used by instrument ROM images and is
//! bit-compatible across emulator implementations.

/// Operator parameter set for one slot of a voice.
///
/// Field widths match the register layout: `tl` 6 bits (carrier voices use
/// the volume register instead), `fb` 3 bits (modulator only), `ml`/`ar`/
/// `dr`/`sl`/`rr` 4 bits, `kl` 2 bits, the rest single flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Patch {
    /// Total level (modulator attenuation)
    pub tl: u8,
    /// Feedback amount (modulator self-modulation)
    pub fb: u8,
    /// Envelope type: true = sustained tone, false = percussive decay
    pub eg: bool,
    /// Frequency multiplier selector
    pub ml: u8,
    /// Attack rate
    pub ar: u8,
    /// Decay rate
    pub dr: u8,
    /// Sustain level
    pub sl: u8,
    /// Release rate
    pub rr: u8,
    /// Key-rate scaling flag
    pub kr: bool,
    /// Key-level scaling depth
    pub kl: u8,
    /// Amplitude modulation (tremolo) enable
    pub am: bool,
    /// Pitch modulation (vibrato) enable
    pub pm: bool,
    /// Waveform: false = full sine, true = half sine
    pub wf: bool,
}

/// Number of voices held by the chip (user + melodic + rhythm).
pub const VOICE_COUNT: usize = 19;

/// Serialized size of one voice.
pub const VOICE_DUMP_SIZE: usize = 8;

/// Serialized size of a full 19-voice bank.
pub const BANK_DUMP_SIZE: usize = VOICE_COUNT * VOICE_DUMP_SIZE;

impl Patch {
    /// Parse one 8-byte voice dump into its modulator/carrier pair.
    ///
    /// Layout: bytes 0/1 = `{AM,PM,EG,KR,ML}` for modulator/carrier,
    /// byte 2 = `{KL,TL}` modulator, byte 3 = `{KL carrier, WF carrier,
    /// WF modulator, FB}`, bytes 4/5 = `{AR,DR}`, bytes 6/7 = `{SL,RR}`.
    pub fn pair_from_dump(dump: &[u8; VOICE_DUMP_SIZE]) -> [Patch; 2] {
        let mut pair = [Patch::default(), Patch::default()];
        for (op, patch) in pair.iter_mut().enumerate() {
            patch.am = (dump[op] >> 7) & 1 != 0;
            patch.pm = (dump[op] >> 6) & 1 != 0;
            patch.eg = (dump[op] >> 5) & 1 != 0;
            patch.kr = (dump[op] >> 4) & 1 != 0;
            patch.ml = dump[op] & 15;
            patch.ar = (dump[4 + op] >> 4) & 15;
            patch.dr = dump[4 + op] & 15;
            patch.sl = (dump[6 + op] >> 4) & 15;
            patch.rr = dump[6 + op] & 15;
        }
        pair[0].kl = (dump[2] >> 6) & 3;
        pair[1].kl = (dump[3] >> 6) & 3;
        pair[0].tl = dump[2] & 63;
        pair[0].fb = dump[3] & 7;
        pair[0].wf = (dump[3] >> 3) & 1 != 0;
        pair[1].wf = (dump[3] >> 4) & 1 != 0;
        pair
    }

    /// Serialize a modulator/carrier pair back into the 8-byte dump form.
    pub fn pair_to_dump(pair: &[Patch; 2]) -> [u8; VOICE_DUMP_SIZE] {
        let mut dump = [0u8; VOICE_DUMP_SIZE];
        for (op, patch) in pair.iter().enumerate() {
            dump[op] = ((patch.am as u8) << 7)
                | ((patch.pm as u8) << 6)
                | ((patch.eg as u8) << 5)
                | ((patch.kr as u8) << 4)
                | (patch.ml & 15);
            dump[4 + op] = ((patch.ar & 15) << 4) | (patch.dr & 15);
            dump[6 + op] = ((patch.sl & 15) << 4) | (patch.rr & 15);
        }
        dump[2] = ((pair[0].kl & 3) << 6) | (pair[0].tl & 63);
        dump[3] = ((pair[1].kl & 3) << 6)
            | ((pair[1].wf as u8) << 4)
            | ((pair[0].wf as u8) << 3)
            | (pair[0].fb & 7);
        dump
    }

    /// Parse a full 19-voice bank dump into 38 interleaved patches.
    pub fn bank_from_dump(dump: &[u8; BANK_DUMP_SIZE]) -> [Patch; VOICE_COUNT * 2] {
        let mut patches = [Patch::default(); VOICE_COUNT * 2];
        for voice in 0..VOICE_COUNT {
            let mut record = [0u8; VOICE_DUMP_SIZE];
            record.copy_from_slice(&dump[voice * VOICE_DUMP_SIZE..(voice + 1) * VOICE_DUMP_SIZE]);
            let pair = Patch::pair_from_dump(&record);
            patches[voice * 2] = pair[0];
            patches[voice * 2 + 1] = pair[1];
        }
        patches
    }

    /// Serialize 38 interleaved patches into a full bank dump.
    pub fn bank_to_dump(patches: &[Patch; VOICE_COUNT * 2]) -> [u8; BANK_DUMP_SIZE] {
        let mut dump = [0u8; BANK_DUMP_SIZE];
        for voice in 0..VOICE_COUNT {
            let pair = [patches[voice * 2], patches[voice * 2 + 1]];
            dump[voice * VOICE_DUMP_SIZE..(voice + 1) * VOICE_DUMP_SIZE]
                .copy_from_slice(&Patch::pair_to_dump(&pair));
        }
        dump
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ym2413::rom::InstrumentRom;

    #[test]
    fn test_pair_dump_field_extraction() {
        let dump = [0x61, 0x61, 0x1e, 0x17, 0xf0, 0x78, 0x00, 0x17];
        let [modulator, carrier] = Patch::pair_from_dump(&dump);

        assert!(!modulator.am && modulator.pm && modulator.eg && !modulator.kr);
        assert_eq!(modulator.ml, 1);
        assert_eq!(modulator.tl, 0x1e);
        assert_eq!(modulator.fb, 7);
        assert_eq!(modulator.ar, 15);
        assert_eq!(modulator.dr, 0);
        assert_eq!(modulator.sl, 0);
        assert_eq!(modulator.rr, 0);

        assert_eq!(carrier.ml, 1);
        assert!(carrier.wf); // byte 3 bit 4
        assert_eq!(carrier.ar, 7);
        assert_eq!(carrier.dr, 8);
        assert_eq!(carrier.sl, 1);
        assert_eq!(carrier.rr, 7);
    }

    #[test]
    fn test_pair_round_trip() {
        let dump = [0x13, 0x41, 0x1e, 0x0d, 0xd7, 0xf7, 0x13, 0x13];
        let pair = Patch::pair_from_dump(&dump);
        assert_eq!(Patch::pair_to_dump(&pair), dump);
    }

    #[test]
    fn test_bank_round_trip_all_roms() {
        // All 152 format-defined bytes of every built-in bank must survive
        // a parse/serialize cycle.
        for rom in [InstrumentRom::Ym2413, InstrumentRom::Vrc7, InstrumentRom::Ymf281b] {
            let bank = rom.bank();
            let patches = Patch::bank_from_dump(bank);
            assert_eq!(&Patch::bank_to_dump(&patches), bank, "{rom:?}");
        }
    }

    #[test]
    fn test_default_patch_is_silent_null_voice() {
        let patch = Patch::default();
        assert_eq!(patch.ar, 0);
        assert_eq!(patch.ml, 0);
        assert!(!patch.eg);
    }
}
