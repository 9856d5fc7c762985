//! YM2413 (OPLL) chip core
//!
//! Ties the register file, patch store, 18 operator slots, noise generator
//! and LFOs together into a single synchronous state machine. The chip runs
//! at its native tick rate (master clock / 72) and resamples to the host
//! rate by averaging whole ticks and linearly interpolating between the
//! previous and current averaged mixes.

use super::patch::{Patch, BANK_DUMP_SIZE, VOICE_COUNT};
use super::registers::{
    ChannelMask, REG_COUNT, REG_FNUM_LO, REG_INST_VOL, REG_KEY_BLOCK, REG_RHYTHM, SLOT_BD1,
    SLOT_BD2, SLOT_CYM, SLOT_HH, SLOT_SD, SLOT_TOM,
};
use super::rom::InstrumentRom;
use super::slot::{calc_envelope, EgState, Slot};
use super::tables::{self, eg_to_xb, Tables, PG_BITS, PG_WIDTH, PM_DPHASE, PM_DP_WIDTH};

/// NTSC master clock shared by MSX and Master System FM units.
pub const DEFAULT_CLOCK: u32 = 3_579_545;
/// Default host sample rate.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Chip variant selector.
///
/// The VRC7 ignores the rhythm/percussion register entirely; everything
/// else is register-compatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChipVariant {
    /// Standard YM2413 / YMF281B behavior
    #[default]
    Ym2413,
    /// Konami VRC7: register 0x0E is inert
    Vrc7,
}

/// Linear feedback scaled for the modulator's self-modulation input.
#[inline]
fn wave2_4pi(e: i32) -> i32 {
    (e >> 6) << 1
}

/// Linear modulator output scaled for the carrier's FM input.
#[inline]
fn wave2_8pi(e: i32) -> i32 {
    (e >> 6) << 2
}

/// YM2413 FM sound chip emulator.
///
/// All entry points are total functions: addresses and data are range-masked
/// on the way in, matching the permissive real hardware. One instance is
/// exclusively owned by its caller; independent instances share only the
/// read-only precomputed tables.
pub struct Ym2413 {
    tables: &'static Tables,

    clock: u32,
    rate: u32,
    variant: ChipVariant,

    latched_addr: u8,
    out: i16,

    // Rate conversion: two monotonic phase accumulators
    real_step: u32,
    opll_step: u32,
    opll_time: u32,

    pan: [u8; 16],

    reg: [u8; REG_COUNT],
    slot_key_status: u32,
    rhythm_mode: bool,

    // LFOs
    pm_phase: u32,
    am_phase: u32,
    lfo_am: u32,

    // Noise generator
    noise_seed: u32,
    noise: bool,
    short_noise: bool,

    patch_number: [usize; 9],
    slot: [Slot; 18],
    patches: [Patch; VOICE_COUNT * 2],

    mask: ChannelMask,

    // Output accumulators: 0-8 tone, 9 BD, 10 HH, 11 SD, 12 TOM, 13 CYM,
    // 14 reserved for DAC use
    ch_out: [i32; 15],
}

impl Ym2413 {
    /// Create a chip for the given master clock and host sample rate,
    /// loaded with the standard YM2413 instrument ROM.
    pub fn new(clock: u32, rate: u32) -> Self {
        let tables = tables::init();
        let mut chip = Ym2413 {
            tables,
            clock,
            rate,
            variant: ChipVariant::Ym2413,
            latched_addr: 0,
            out: 0,
            real_step: 0,
            opll_step: 0,
            opll_time: 0,
            pan: [2; 16],
            reg: [0; REG_COUNT],
            slot_key_status: 0,
            rhythm_mode: false,
            pm_phase: 0,
            am_phase: 0,
            lfo_am: 0,
            noise_seed: 0xffff,
            noise: false,
            short_noise: false,
            patch_number: [0; 9],
            slot: std::array::from_fn(|i| Slot::new(i as u8)),
            patches: [Patch::default(); VOICE_COUNT * 2],
            mask: ChannelMask::empty(),
            ch_out: [0; 15],
        };
        chip.reset();
        chip.reset_patch(InstrumentRom::Ym2413);
        chip
    }

    /// Reset registers, slots and conversion state. Patch data is kept;
    /// use [`Ym2413::reset_patch`] to reload a ROM bank.
    pub fn reset(&mut self) {
        self.latched_addr = 0;
        self.out = 0;

        self.pm_phase = 0;
        self.am_phase = 0;

        self.noise_seed = 0xffff;
        self.mask = ChannelMask::empty();

        self.rhythm_mode = false;
        self.slot_key_status = 0;

        self.reset_rate_conversion();

        for i in 0..18 {
            self.slot[i].reset(i as u8);
        }
        for ch in 0..9 {
            self.set_patch(ch, 0);
        }
        for reg in 0..REG_COUNT as u8 {
            self.write_reg(reg, 0);
        }

        self.pan = [2; 16];
        self.ch_out = [0; 15];
    }

    fn reset_rate_conversion(&mut self) {
        self.real_step = (1u32 << 31) / self.rate.max(1);
        self.opll_step = (1u32 << 31) / (self.clock / 72).max(1);
        self.opll_time = 0;
    }

    /// Change the host sample rate without disturbing envelope or phase
    /// state.
    pub fn set_rate(&mut self, rate: u32) {
        self.rate = rate;
        self.reset_rate_conversion();
    }

    /// Select the chip variant's register-gating behavior.
    pub fn set_chip_variant(&mut self, variant: ChipVariant) {
        self.variant = variant;
    }

    /// Replace the patch store with a built-in instrument ROM bank.
    pub fn reset_patch(&mut self, rom: InstrumentRom) {
        self.load_patch_bank(rom.bank());
    }

    /// Replace the patch store from a serialized 19-voice bank dump.
    pub fn load_patch_bank(&mut self, dump: &[u8; BANK_DUMP_SIZE]) {
        self.patches = Patch::bank_from_dump(dump);
    }

    /// Serialize the current patch store to a 19-voice bank dump.
    pub fn patch_bank_to_dump(&self) -> [u8; BANK_DUMP_SIZE] {
        Patch::bank_to_dump(&self.patches)
    }

    /// Overwrite a single operator patch (index 0-37, modulator/carrier
    /// interleaved). Call [`Ym2413::force_refresh`] afterwards.
    pub fn copy_patch(&mut self, index: usize, patch: Patch) {
        self.patches[index % (VOICE_COUNT * 2)] = patch;
    }

    /// Recompute every derived operator field. Required after mutating
    /// patch data outside the register-write path.
    pub fn force_refresh(&mut self) {
        for ch in 0..9 {
            self.set_patch(ch, self.patch_number[ch]);
        }
        for i in 0..18 {
            let patch = self.patches[self.slot[i].patch_index];
            self.slot[i].update_all(&patch, self.tables);
        }
    }

    /// Stereo pan for an output channel: bit 0 routes right, bit 1 left.
    pub fn set_pan(&mut self, ch: usize, pan: u8) {
        self.pan[ch & 15] = pan & 3;
    }

    /// Replace the mute mask, returning the previous one.
    pub fn set_mask(&mut self, mask: ChannelMask) -> ChannelMask {
        std::mem::replace(&mut self.mask, mask)
    }

    /// Toggle bits in the mute mask, returning the previous mask.
    pub fn toggle_mask(&mut self, mask: ChannelMask) -> ChannelMask {
        let old = self.mask;
        self.mask ^= mask;
        old
    }

    /// Read back the register file shadow copy.
    pub fn read_register(&self, addr: u8) -> u8 {
        self.reg[(addr & 0x3f) as usize]
    }

    /// Two-step port interface: even ports latch a register address, odd
    /// ports write data to the latched register.
    pub fn write_io(&mut self, port: u8, value: u8) {
        if port & 1 != 0 {
            self.write_reg(self.latched_addr, value);
        } else {
            self.latched_addr = value;
        }
    }

    // ---------------------------------------------------------------
    // Channel/slot parameter plumbing
    // ---------------------------------------------------------------

    #[inline]
    fn mod_idx(ch: usize) -> usize {
        ch << 1
    }

    #[inline]
    fn car_idx(ch: usize) -> usize {
        (ch << 1) | 1
    }

    fn set_patch(&mut self, ch: usize, num: usize) {
        self.patch_number[ch] = num;
        self.slot[Self::mod_idx(ch)].patch_index = num * 2;
        self.slot[Self::car_idx(ch)].patch_index = num * 2 + 1;
    }

    fn set_sustain(&mut self, ch: usize, sustain: bool) {
        self.slot[Self::car_idx(ch)].sustain = sustain;
        if self.slot[Self::mod_idx(ch)].is_carrier {
            self.slot[Self::mod_idx(ch)].sustain = sustain;
        }
    }

    fn set_volume(&mut self, ch: usize, volume: u8) {
        self.slot[Self::car_idx(ch)].volume = volume;
    }

    fn set_fnum(&mut self, ch: usize, fnum: u16) {
        self.slot[Self::mod_idx(ch)].fnum = fnum;
        self.slot[Self::car_idx(ch)].fnum = fnum;
    }

    fn set_block(&mut self, ch: usize, block: u8) {
        self.slot[Self::mod_idx(ch)].block = block;
        self.slot[Self::car_idx(ch)].block = block;
    }

    /// Run `f` against slot `i` with a copy of its bound patch.
    fn with_patch<F>(&mut self, i: usize, f: F)
    where
        F: FnOnce(&mut Slot, &Patch, &'static Tables),
    {
        let patch = self.patches[self.slot[i].patch_index];
        f(&mut self.slot[i], &patch, self.tables);
    }

    fn update_channel(&mut self, ch: usize) {
        self.with_patch(Self::mod_idx(ch), |s, p, t| s.update_all(p, t));
        self.with_patch(Self::car_idx(ch), |s, p, t| s.update_all(p, t));
    }

    /// Re-derive fields on operators currently bound to the user patch.
    fn refresh_patch0<F>(&mut self, carrier_op: bool, f: F)
    where
        F: Fn(&mut Slot, &Patch, &'static Tables) + Copy,
    {
        for ch in 0..9 {
            if self.patch_number[ch] == 0 {
                let i = if carrier_op {
                    Self::car_idx(ch)
                } else {
                    Self::mod_idx(ch)
                };
                self.with_patch(i, f);
            }
        }
    }

    // ---------------------------------------------------------------
    // Key gating and rhythm mode
    // ---------------------------------------------------------------

    fn slot_on(&mut self, i: usize) {
        self.slot[i].eg_state = EgState::Settle;
        self.with_patch(i, |s, p, _| s.update_eg(p));
    }

    fn slot_off(&mut self, i: usize) {
        if self.slot[i].is_carrier {
            self.slot[i].eg_state = EgState::Release;
            self.with_patch(i, |s, p, _| s.update_eg(p));
        }
    }

    fn update_key_status(&mut self) {
        let r14 = self.reg[REG_RHYTHM as usize];
        let rhythm_mode = r14 & 0x20 != 0;
        let mut new_status: u32 = 0;

        for ch in 0..9 {
            if self.reg[REG_KEY_BLOCK as usize + ch] & 0x10 != 0 {
                new_status |= 3 << (ch * 2);
            }
        }

        if rhythm_mode {
            if r14 & 0x10 != 0 {
                new_status |= 3 << SLOT_BD1;
            }
            if r14 & 0x01 != 0 {
                new_status |= 1 << SLOT_HH;
            }
            if r14 & 0x08 != 0 {
                new_status |= 1 << SLOT_SD;
            }
            if r14 & 0x04 != 0 {
                new_status |= 1 << SLOT_TOM;
            }
            if r14 & 0x02 != 0 {
                new_status |= 1 << SLOT_CYM;
            }
        }

        let updated = self.slot_key_status ^ new_status;
        for i in 0..18 {
            if updated >> i & 1 != 0 {
                if new_status >> i & 1 != 0 {
                    self.slot_on(i);
                } else {
                    self.slot_off(i);
                }
            }
        }

        self.slot_key_status = new_status;
    }

    /// Reassign channels 6-8 between melodic FM and the five percussion
    /// voices. Leaving rhythm mode restores each channel's instrument
    /// register selection, provided its rhythm keys are released.
    fn update_rhythm_mode(&mut self) {
        let new_rhythm_mode = self.reg[REG_RHYTHM as usize] & 0x20 != 0;
        let key = self.slot_key_status;

        if self.patch_number[6] & 0x10 != 0 {
            if !(key >> SLOT_BD2 & 1 != 0 || new_rhythm_mode) {
                self.slot[SLOT_BD1].eg_state = EgState::Finish;
                self.slot[SLOT_BD2].eg_state = EgState::Finish;
                self.set_patch(6, (self.reg[0x36] >> 4) as usize);
            }
        } else if new_rhythm_mode {
            self.patch_number[6] = 16;
            self.slot[SLOT_BD1].eg_state = EgState::Finish;
            self.slot[SLOT_BD2].eg_state = EgState::Finish;
            self.slot[SLOT_BD1].patch_index = 16 * 2;
            self.slot[SLOT_BD2].patch_index = 16 * 2 + 1;
        }

        if self.patch_number[7] & 0x10 != 0 {
            if !((key >> SLOT_HH & 1 != 0 && key >> SLOT_SD & 1 != 0) || new_rhythm_mode) {
                self.slot[SLOT_HH].is_carrier = false;
                self.slot[SLOT_HH].pg_keep = false;
                self.slot[SLOT_HH].eg_state = EgState::Finish;
                self.slot[SLOT_SD].eg_state = EgState::Finish;
                self.set_patch(7, (self.reg[0x37] >> 4) as usize);
            }
        } else if new_rhythm_mode {
            self.patch_number[7] = 17;
            self.slot[SLOT_HH].is_carrier = true;
            self.slot[SLOT_HH].pg_keep = true;
            self.slot[SLOT_HH].eg_state = EgState::Finish;
            self.slot[SLOT_SD].eg_state = EgState::Finish;
            self.slot[SLOT_HH].patch_index = 17 * 2;
            self.slot[SLOT_SD].patch_index = 17 * 2 + 1;
        }

        if self.patch_number[8] & 0x10 != 0 {
            if !((key >> SLOT_CYM & 1 != 0 && key >> SLOT_TOM & 1 != 0) || new_rhythm_mode) {
                self.slot[SLOT_TOM].is_carrier = false;
                self.slot[SLOT_CYM].pg_keep = false;
                self.slot[SLOT_TOM].eg_state = EgState::Finish;
                self.slot[SLOT_CYM].eg_state = EgState::Finish;
                self.set_patch(8, (self.reg[0x38] >> 4) as usize);
            }
        } else if new_rhythm_mode {
            self.patch_number[8] = 18;
            self.slot[SLOT_TOM].is_carrier = true;
            self.slot[SLOT_CYM].pg_keep = true;
            self.slot[SLOT_TOM].eg_state = EgState::Finish;
            self.slot[SLOT_CYM].eg_state = EgState::Finish;
            self.slot[SLOT_TOM].patch_index = 18 * 2;
            self.slot[SLOT_CYM].patch_index = 18 * 2 + 1;
        }

        self.rhythm_mode = new_rhythm_mode;
    }

    // ---------------------------------------------------------------
    // Register file
    // ---------------------------------------------------------------

    /// Write a chip register. Addresses are masked into the 6-bit space;
    /// unmapped addresses are stored but derive nothing. Takes effect on
    /// the next synthesis tick.
    pub fn write_reg(&mut self, addr: u8, data: u8) {
        let addr = addr & 0x3f;
        self.reg[addr as usize] = data;

        match addr {
            0x00 | 0x01 => {
                let op = addr as usize;
                self.patches[op].am = data >> 7 & 1 != 0;
                self.patches[op].pm = data >> 6 & 1 != 0;
                self.patches[op].eg = data >> 5 & 1 != 0;
                self.patches[op].kr = data >> 4 & 1 != 0;
                self.patches[op].ml = data & 15;
                self.refresh_patch0(op == 1, |s, p, t| {
                    s.update_rks(p, t);
                    s.update_eg(p);
                });
            }

            0x02 => {
                self.patches[0].kl = data >> 6 & 3;
                self.patches[0].tl = data & 63;
                self.refresh_patch0(false, |s, p, t| s.update_tll(p, t));
            }

            0x03 => {
                self.patches[1].kl = data >> 6 & 3;
                self.patches[1].wf = data >> 4 & 1 != 0;
                self.patches[0].wf = data >> 3 & 1 != 0;
                self.patches[0].fb = data & 7;
                self.refresh_patch0(false, |s, p, _| s.update_wf(p));
                self.refresh_patch0(true, |s, p, _| s.update_wf(p));
            }

            0x04 | 0x05 => {
                let op = (addr - 0x04) as usize;
                self.patches[op].ar = data >> 4 & 15;
                self.patches[op].dr = data & 15;
                self.refresh_patch0(op == 1, |s, p, _| s.update_eg(p));
            }

            0x06 | 0x07 => {
                let op = (addr - 0x06) as usize;
                self.patches[op].sl = data >> 4 & 15;
                self.patches[op].rr = data & 15;
                self.refresh_patch0(op == 1, |s, p, _| s.update_eg(p));
            }

            REG_RHYTHM => {
                if self.variant == ChipVariant::Vrc7 {
                    return;
                }
                self.update_rhythm_mode();
                self.update_key_status();
                for ch in 6..9 {
                    self.update_channel(ch);
                }
            }

            0x10..=0x18 => {
                let ch = (addr - REG_FNUM_LO) as usize;
                let hi = (self.reg[REG_KEY_BLOCK as usize + ch] & 1) as u16;
                self.set_fnum(ch, data as u16 + (hi << 8));
                self.update_channel(ch);
            }

            0x20..=0x28 => {
                let ch = (addr - REG_KEY_BLOCK) as usize;
                let lo = self.reg[REG_FNUM_LO as usize + ch] as u16;
                self.set_fnum(ch, (((data & 1) as u16) << 8) + lo);
                self.set_block(ch, data >> 1 & 7);
                self.set_sustain(ch, data >> 5 & 1 != 0);
                self.update_channel(ch);
                self.update_key_status();
                self.update_rhythm_mode();
            }

            0x30..=0x38 => {
                let ch = (addr - REG_INST_VOL) as usize;
                let inst = (data >> 4) as usize;
                let vol = data & 15;
                if self.reg[REG_RHYTHM as usize] & 0x20 != 0 && addr >= 0x36 {
                    // Percussion volumes live in the modulator slots of
                    // channels 7/8 while rhythm mode is active.
                    match addr {
                        0x37 => self.slot[SLOT_HH].volume = (inst << 2) as u8,
                        0x38 => self.slot[SLOT_TOM].volume = (inst << 2) as u8,
                        _ => {}
                    }
                } else {
                    self.set_patch(ch, inst);
                }
                self.set_volume(ch, vol << 2);
                self.update_channel(ch);
            }

            _ => {}
        }
    }

    // ---------------------------------------------------------------
    // Synthesis
    // ---------------------------------------------------------------

    fn update_ampm(&mut self) {
        self.pm_phase = (self.pm_phase + PM_DPHASE) & (PM_DP_WIDTH - 1);
        self.lfo_am =
            (self.tables.am[(self.am_phase >> 6) as usize % self.tables.am.len()] as u32) << 4;
        self.am_phase = self.am_phase.wrapping_add(1);
    }

    fn update_noise(&mut self) {
        if self.noise_seed & 1 != 0 {
            self.noise_seed ^= 0x8003020;
        }
        self.noise_seed >>= 1;
        self.noise = self.noise_seed & 1 != 0;
    }

    /// Derive the short-noise bit from the hi-hat and cymbal phase
    /// accumulators. Percussion noise timing is phase-locked to those two
    /// voices on real silicon.
    fn update_short_noise(&mut self) {
        let pg_hh = self.slot[SLOT_HH].pg_out;
        let pg_cym = self.slot[SLOT_CYM].pg_out;

        let h_bit2 = pg_hh >> (PG_BITS - 8) & 1;
        let h_bit7 = pg_hh >> (PG_BITS - 3) & 1;
        let h_bit3 = pg_hh >> (PG_BITS - 7) & 1;

        let c_bit3 = pg_cym >> (PG_BITS - 7) & 1;
        let c_bit5 = pg_cym >> (PG_BITS - 5) & 1;

        self.short_noise = (((h_bit2 ^ h_bit7) | h_bit3) | (c_bit3 ^ c_bit5)) != 0;
    }

    fn to_linear(&self, h: i32, eg_out: u32, tll: u32, am: u32) -> i32 {
        let value = (eg_to_xb(eg_out + tll) + am) as i32;
        if h >= 0 {
            tables::exp_linear(self.tables, h + value)
        } else {
            -tables::exp_linear(self.tables, -h + value)
        }
    }

    fn calc_slot_mod(&mut self, ch: usize) -> i32 {
        let i = Self::mod_idx(ch);
        if self.slot[i].eg_state == EgState::Finish {
            return 0;
        }
        let patch = self.patches[self.slot[i].patch_index];
        let slot = &self.slot[i];

        let fm = if patch.fb > 0 {
            wave2_4pi(slot.feedback) >> (7 - patch.fb)
        } else {
            0
        };
        let am = if patch.am { self.lfo_am } else { 0 };
        let index = ((slot.pg_out as i32 + fm) & (PG_WIDTH as i32 - 1)) as usize;
        let h = slot.wave.table(self.tables)[index] as i32;
        let out = self.to_linear(h, slot.eg_out, slot.tll, am);

        let slot = &mut self.slot[i];
        slot.output[1] = slot.output[0];
        slot.output[0] = out;
        slot.feedback = (slot.output[1] + slot.output[0]) >> 1;
        slot.feedback
    }

    fn calc_slot_car(&mut self, ch: usize, fm: i32) -> i32 {
        let slot = &self.slot[Self::car_idx(ch)];
        if slot.eg_state == EgState::Finish {
            return 0;
        }
        let patch = self.patches[slot.patch_index];
        let am = if patch.am { self.lfo_am } else { 0 };
        let index = ((slot.pg_out as i32 + wave2_8pi(fm)) & (PG_WIDTH as i32 - 1)) as usize;
        let h = slot.wave.table(self.tables)[index] as i32;
        self.to_linear(h, slot.eg_out, slot.tll, am)
    }

    fn calc_slot_tom(&mut self) -> i32 {
        let slot = &self.slot[SLOT_TOM];
        if slot.eg_state == EgState::Finish {
            return 0;
        }
        let h = slot.wave.table(self.tables)[slot.pg_out as usize] as i32;
        self.to_linear(h, slot.eg_out, slot.tll, 0)
    }

    /// Snare phase: top phase bit selects the loud half, the noise bit
    /// flips it between the positive and negative lobes.
    fn calc_slot_snare(&mut self) -> i32 {
        let slot = &self.slot[SLOT_SD];
        if slot.eg_state == EgState::Finish {
            return 0;
        }
        let phase = if slot.pg_out >> (PG_BITS - 2) & 1 != 0 {
            if self.noise {
                0x300
            } else {
                0x200
            }
        } else if self.noise {
            0x0
        } else {
            0x100
        };
        let h = slot.wave.table(self.tables)[phase] as i32;
        self.to_linear(h, slot.eg_out, slot.tll, 0)
    }

    fn calc_slot_cym(&mut self) -> i32 {
        let slot = &self.slot[SLOT_CYM];
        if slot.eg_state == EgState::Finish {
            return 0;
        }
        let phase = if self.short_noise { 0x300 } else { 0x100 };
        let h = slot.wave.table(self.tables)[phase] as i32;
        self.to_linear(h, slot.eg_out, slot.tll, 0)
    }

    fn calc_slot_hat(&mut self) -> i32 {
        let slot = &self.slot[SLOT_HH];
        if slot.eg_state == EgState::Finish {
            return 0;
        }
        let phase = if self.short_noise {
            if self.noise {
                0x2d0
            } else {
                0x234
            }
        } else if self.noise {
            0x34
        } else {
            0xd0
        };
        let h = slot.wave.table(self.tables)[phase] as i32;
        self.to_linear(h, slot.eg_out, slot.tll, 0)
    }

    /// One chip tick: advance LFOs, noise, every slot's phase and
    /// envelope, then accumulate each unmasked channel's output.
    fn update_output(&mut self) {
        self.update_ampm();
        self.update_noise();
        self.update_short_noise();

        for i in 0..18 {
            let patch = self.patches[self.slot[i].patch_index];
            let pm_phase = self.pm_phase;
            self.slot[i].calc_phase(pm_phase, &patch);

            // Percussion slots keyed by register 0x0E have no FM pair to
            // retrigger; melodic carriers pull their modulator along.
            let pair = i > 0 && (i < 14 || self.reg[REG_RHYTHM as usize] & 0x20 == 0);
            if pair {
                let slave_patch = self.patches[self.slot[i - 1].patch_index];
                let (head, tail) = self.slot.split_at_mut(i);
                calc_envelope(
                    &mut tail[0],
                    &patch,
                    Some((&mut head[i - 1], &slave_patch)),
                );
            } else {
                calc_envelope(&mut self.slot[i], &patch, None);
            }
        }

        for ch in 0..6 {
            if !self.mask.contains(ChannelMask::channel(ch)) {
                let fm = self.calc_slot_mod(ch);
                self.ch_out[ch] += self.calc_slot_car(ch, fm) >> 5;
            }
        }

        if self.patch_number[6] <= 15 {
            if !self.mask.contains(ChannelMask::CH6) {
                let fm = self.calc_slot_mod(6);
                self.ch_out[6] += self.calc_slot_car(6, fm) >> 5;
            }
        } else if !self.mask.contains(ChannelMask::BD) {
            let fm = self.calc_slot_mod(6);
            self.ch_out[9] += self.calc_slot_car(6, fm) >> 4;
        }

        if self.patch_number[7] <= 15 {
            if !self.mask.contains(ChannelMask::CH7) {
                let fm = self.calc_slot_mod(7);
                self.ch_out[7] += self.calc_slot_car(7, fm) >> 5;
            }
        } else {
            if !self.mask.contains(ChannelMask::HH) {
                let v = self.calc_slot_hat();
                self.ch_out[10] += v >> 4;
            }
            if !self.mask.contains(ChannelMask::SD) {
                let v = self.calc_slot_snare();
                self.ch_out[11] += v >> 4;
            }
        }

        if self.patch_number[8] <= 15 {
            if !self.mask.contains(ChannelMask::CH8) {
                let fm = self.calc_slot_mod(8);
                self.ch_out[8] += self.calc_slot_car(8, fm) >> 5;
            }
        } else {
            if !self.mask.contains(ChannelMask::TOM) {
                let v = self.calc_slot_tom();
                self.ch_out[12] += v >> 4;
            }
            if !self.mask.contains(ChannelMask::CYM) {
                let v = self.calc_slot_cym();
                self.ch_out[13] += v >> 4;
            }
        }
    }

    fn mix_output(&self) -> i32 {
        self.ch_out.iter().sum()
    }

    fn mix_output_stereo(&self) -> [i32; 2] {
        let mut out = [0i32; 2];
        for (ch, &sample) in self.ch_out.iter().enumerate() {
            if self.pan[ch] & 1 != 0 {
                out[1] += sample;
            }
            if self.pan[ch] & 2 != 0 {
                out[0] += sample;
            }
        }
        out
    }

    fn interpolate(&self, next: i32, prev: i32) -> i32 {
        ((next as f64 * (self.opll_step - self.opll_time) as f64
            + prev as f64 * self.opll_time as f64)
            / self.opll_step as f64) as i32
    }

    /// Run whole chip ticks to cover one host sample period, averaging the
    /// accumulators over the tick count.
    fn advance_to_next_sample(&mut self) {
        if self.real_step > self.opll_time {
            self.ch_out = [0; 15];
            let mut count = 0;
            while self.real_step > self.opll_time {
                self.opll_time += self.opll_step;
                self.update_output();
                count += 1;
            }
            for out in &mut self.ch_out {
                *out /= count;
            }
        }
        self.opll_time -= self.real_step;
    }

    /// Produce one mono sample at the host rate.
    pub fn calc(&mut self) -> i16 {
        let prev = self.mix_output() as i16;
        self.advance_to_next_sample();
        let next = self.mix_output() as i16;
        self.out = self.interpolate(next as i32, prev as i32) as i16;
        self.out
    }

    /// Produce one stereo pair at the host rate, honoring per-channel pan.
    ///
    /// Each side is truncated to 16-bit range before interpolation, exactly
    /// as the mono path is.
    pub fn calc_stereo(&mut self) -> [i32; 2] {
        let prev = self.mix_output_stereo();
        self.advance_to_next_sample();
        let next = self.mix_output_stereo();
        [
            self.interpolate(next[0] as i16 as i32, prev[0] as i16 as i32) as i16 as i32,
            self.interpolate(next[1] as i16 as i32, prev[1] as i16 as i32) as i16 as i32,
        ]
    }

    /// Master clock frequency in Hz.
    pub fn clock(&self) -> u32 {
        self.clock
    }

    /// Host sample rate in Hz.
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Whether rhythm mode is currently active.
    pub fn rhythm_mode(&self) -> bool {
        self.rhythm_mode
    }

    /// Current key/gate status, one bit per slot.
    pub fn slot_key_status(&self) -> u32 {
        self.slot_key_status
    }

    /// Patch number currently bound to a tone channel.
    pub fn patch_number(&self, ch: usize) -> usize {
        self.patch_number[ch % 9]
    }

    #[cfg(test)]
    fn slot_state(&self, i: usize) -> EgState {
        self.slot[i].eg_state
    }
}

impl Default for Ym2413 {
    /// NTSC clock at 44.1 kHz output.
    fn default() -> Self {
        Ym2413::new(DEFAULT_CLOCK, DEFAULT_SAMPLE_RATE)
    }
}

impl std::fmt::Debug for Ym2413 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ym2413")
            .field("clock", &self.clock)
            .field("rate", &self.rate)
            .field("variant", &self.variant)
            .field("rhythm_mode", &self.rhythm_mode)
            .field("slot_key_status", &self.slot_key_status)
            .field("patch_number", &self.patch_number)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chip() -> Ym2413 {
        Ym2413::new(DEFAULT_CLOCK, DEFAULT_SAMPLE_RATE)
    }

    #[test]
    fn test_initial_output_is_silent() {
        let mut chip = chip();
        for _ in 0..100 {
            assert_eq!(chip.calc(), 0);
        }
    }

    #[test]
    fn test_write_io_latches_address() {
        let mut chip = chip();
        chip.write_io(0, 0x30);
        chip.write_io(1, 0x25);
        assert_eq!(chip.read_register(0x30), 0x25);
        assert_eq!(chip.patch_number(0), 2);
    }

    #[test]
    fn test_key_on_settles_both_operators() {
        let mut chip = chip();
        chip.write_reg(0x10, 0x80);
        chip.write_reg(0x20, 0x14); // key on, block 2
        assert_eq!(chip.slot_state(0), EgState::Settle);
        assert_eq!(chip.slot_state(1), EgState::Settle);
        assert_eq!(chip.slot_key_status() & 3, 3);
    }

    #[test]
    fn test_key_off_releases_carrier_only() {
        let mut chip = chip();
        chip.write_reg(0x10, 0x80);
        chip.write_reg(0x20, 0x14);
        for _ in 0..500 {
            chip.calc();
        }
        chip.write_reg(0x20, 0x04); // key off
        assert_eq!(chip.slot_state(1), EgState::Release);
        assert_ne!(chip.slot_state(0), EgState::Release);
    }

    #[test]
    fn test_patch0_write_refreshes_only_bound_channels() {
        let mut chip = chip();
        chip.write_reg(0x30, 0x10); // channel 0 uses ROM voice 1
        chip.write_reg(0x31, 0x00); // channel 1 uses the user patch
        chip.write_reg(0x00, 0x2f); // user patch modulator: ML=15, EG set

        assert_eq!(chip.patches[0].ml, 15);
        assert_eq!(chip.patch_number(0), 1);
        assert_eq!(chip.patch_number(1), 0);
    }

    #[test]
    fn test_rhythm_mode_binds_percussion_patches() {
        let mut chip = chip();
        chip.write_reg(REG_RHYTHM, 0x20);
        assert!(chip.rhythm_mode());
        assert_eq!(chip.patch_number(6), 16);
        assert_eq!(chip.patch_number(7), 17);
        assert_eq!(chip.patch_number(8), 18);
        assert!(chip.slot[SLOT_HH].is_carrier);
        assert!(chip.slot[SLOT_HH].pg_keep);
        assert!(chip.slot[SLOT_CYM].pg_keep);
    }

    #[test]
    fn test_rhythm_off_restores_melodic_patches() {
        let mut chip = chip();
        chip.write_reg(0x36, 0x30); // channel 6: ROM voice 3
        chip.write_reg(REG_RHYTHM, 0x20);
        assert_eq!(chip.patch_number(6), 16);

        chip.write_reg(REG_RHYTHM, 0x00);
        assert!(!chip.rhythm_mode());
        assert_eq!(chip.patch_number(6), 3);
        assert!(!chip.slot[SLOT_HH].is_carrier);
        assert!(!chip.slot[SLOT_CYM].pg_keep);
    }

    #[test]
    fn test_vrc7_variant_ignores_rhythm_register() {
        let mut chip = chip();
        chip.set_chip_variant(ChipVariant::Vrc7);
        chip.write_reg(REG_RHYTHM, 0x3f);
        assert!(!chip.rhythm_mode());
        assert_eq!(chip.slot_key_status(), 0);
    }

    #[test]
    fn test_set_pan_masks_inputs() {
        let mut chip = chip();
        chip.set_pan(3, 0xff);
        assert_eq!(chip.pan[3], 3);
        chip.set_pan(19, 1); // wraps into the pan array
        assert_eq!(chip.pan[3], 1);
    }

    #[test]
    fn test_mask_replace_and_toggle() {
        let mut chip = chip();
        let old = chip.set_mask(ChannelMask::CH0 | ChannelMask::BD);
        assert_eq!(old, ChannelMask::empty());
        let old = chip.toggle_mask(ChannelMask::BD);
        assert!(old.contains(ChannelMask::BD));
        assert_eq!(chip.mask, ChannelMask::CH0);
    }

    #[test]
    fn test_set_rate_preserves_slot_state() {
        let mut chip = chip();
        chip.write_reg(0x10, 0x80);
        chip.write_reg(0x20, 0x14);
        for _ in 0..2000 {
            chip.calc();
        }
        let states: Vec<_> = (0..18).map(|i| chip.slot_state(i)).collect();
        let phase = chip.slot[1].pg_phase;
        chip.set_rate(48_000);
        assert_eq!(states, (0..18).map(|i| chip.slot_state(i)).collect::<Vec<_>>());
        assert_eq!(phase, chip.slot[1].pg_phase);
    }

    #[test]
    fn test_finish_state_slot_outputs_zero() {
        let mut chip = chip();
        // Force arbitrary phase and feedback into a finished slot.
        chip.slot[0].pg_out = 0x155;
        chip.slot[0].feedback = 12345;
        chip.slot[1].pg_out = 0x2aa;
        assert_eq!(chip.slot_state(0), EgState::Finish);
        let fm = chip.calc_slot_mod(0);
        assert_eq!(fm, 0);
        assert_eq!(chip.calc_slot_car(0, 999), 0);
    }

    #[test]
    fn test_forced_recompute_after_direct_patch_edit() {
        let mut chip = chip();
        chip.write_reg(0x30, 0x10);
        let mut patch = chip.patches[2];
        patch.tl = 63;
        chip.copy_patch(2, patch);
        chip.force_refresh();
        assert_eq!(chip.patches[chip.slot[0].patch_index].tl, 63);
    }
}
