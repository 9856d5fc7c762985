//! Operator (slot) state: phase generator and envelope generator
//!
//! Eighteen slots exist, paired modulator/carrier into nine channels. Each
//! slot advances an 18-bit phase accumulator and runs the envelope state
//! machine that drives the chip's logarithmic attenuation. Slots reference
//! their voice parameters by patch index; the patch store lives on the chip.

use super::patch::Patch;
use super::tables::{
    self, Tables, DP_BASE_BITS, DP_WIDTH, EG_AR_CURVE, EG_DP_BITS, EG_INCR_0, EG_INCR_13,
    EG_INCR_14, EG_INCR_15, EG_INCR_LOW, EG_MUTE, PM_DP_BITS, PM_PG_BITS, PM_TABLE,
};

/// Waveform selected by the patch's WF bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    /// Full sine period
    #[default]
    Full,
    /// Positive half only; negative half held at silence
    Half,
}

impl Waveform {
    /// The log-sine table for this waveform.
    #[inline]
    pub fn table(self, tables: &Tables) -> &[i16; tables::PG_WIDTH] {
        match self {
            Waveform::Full => &tables.full_sin,
            Waveform::Half => &tables.half_sin,
        }
    }
}

/// Envelope generator state.
///
/// `Settle` is the transient damp state entered on every key-on: it forces
/// the envelope to full attenuation so attack always starts from a known
/// point, matching real-chip retrigger behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EgState {
    /// Attenuation falling toward zero along the measured attack curve
    Attack,
    /// Attenuation rising toward the sustain level
    Decay,
    /// Holding at the sustain level (envelope-type voices)
    SusHold,
    /// Decaying past the sustain level at the release rate
    Sustain,
    /// Key released; decaying toward silence
    Release,
    /// Fully silent; terminal until the next key-on
    #[default]
    Finish,
    /// Damping toward full attenuation before a retriggered attack
    Settle,
}

/// One physical operator.
#[derive(Debug, Clone)]
pub struct Slot {
    /// Slot index 0-17
    pub number: u8,
    /// Carrier-type slots key-off and retrigger their pair; in rhythm mode
    /// the hi-hat and tom modulator slots temporarily become carrier-type.
    pub is_carrier: bool,
    /// Index into the chip's interleaved patch store
    pub patch_index: usize,
    /// Preserve phase across key-on (hi-hat and cymbal in rhythm mode)
    pub pg_keep: bool,

    /// Selected log-sine table
    pub wave: Waveform,
    /// 18-bit phase accumulator
    pub pg_phase: u32,
    /// Top bits of the accumulator: current sine table index
    pub pg_out: u32,
    /// 9-bit frequency number
    pub fnum: u16,
    /// 3-bit octave
    pub block: u8,

    /// Envelope state machine position
    pub eg_state: EgState,
    /// Carrier output volume (6-bit, volume register << 2)
    pub volume: u8,
    /// Sustain pedal flag from the channel's 0x20 register
    pub sustain: bool,
    /// Total level + key-scale level attenuation
    pub tll: u32,
    /// Key-scale rate offset
    pub rks: u8,
    /// Envelope primary counter
    pub eg_phase: u32,
    /// Primary counter increment for the resolved rate
    pub eg_dphase: u32,
    /// Secondary step pattern for the resolved rate
    pub eg_incr: &'static [u8; 8],
    /// Position in the secondary step pattern
    pub eg_incr_index: u8,
    /// Accumulated attack counter (indexes the attack curve)
    pub eg_ar_out: u8,
    /// Current attenuation output, 0 (loud) ..= 127 (mute)
    pub eg_out: u32,

    /// Averaged feedback value for self-modulation
    pub feedback: i32,
    /// Last two linear output samples
    pub output: [i32; 2],
}

impl Slot {
    pub(crate) fn new(number: u8) -> Self {
        Slot {
            number,
            is_carrier: number % 2 == 1,
            patch_index: 0,
            pg_keep: false,
            wave: Waveform::Full,
            pg_phase: 0,
            pg_out: 0,
            fnum: 0,
            block: 0,
            eg_state: EgState::Finish,
            volume: 0,
            sustain: false,
            tll: 0,
            rks: 0,
            eg_phase: 0,
            eg_dphase: 0,
            eg_incr: &EG_INCR_0,
            eg_incr_index: 0,
            eg_ar_out: 0,
            eg_out: EG_MUTE,
            feedback: 0,
            output: [0; 2],
        }
    }

    pub(crate) fn reset(&mut self, number: u8) {
        *self = Slot::new(number);
    }

    /// Nominal envelope rate (0-15) for the current state.
    fn eg_rate(&self, patch: &Patch) -> u8 {
        match self.eg_state {
            EgState::Attack => patch.ar,
            EgState::Decay => patch.dr,
            EgState::SusHold => 0,
            EgState::Sustain => patch.rr,
            EgState::Release => {
                if self.sustain {
                    5
                } else if patch.eg {
                    patch.rr
                } else {
                    7
                }
            }
            EgState::Settle => 14,
            EgState::Finish => 0,
        }
    }

    /// Resolve the current rate + key-scale offset into a primary counter
    /// step and a secondary increment row.
    ///
    /// Combined rates 13 and 14 use dedicated irregular rows rather than
    /// the shift formula; a resolved rate of zero freezes the envelope.
    pub(crate) fn update_eg(&mut self, patch: &Patch) {
        let rate = self.eg_rate(patch);
        if rate == 0 {
            self.eg_incr = &EG_INCR_0;
            self.eg_dphase = 0;
            return;
        }

        let rm = rate as u32 + (self.rks >> 2) as u32;
        let rl = (self.rks & 3) as usize;

        if rm < 13 {
            self.eg_incr = &EG_INCR_LOW[rl];
            self.eg_dphase = 1 << (rm + 2);
        } else if rm == 13 {
            self.eg_incr = &EG_INCR_13[rl];
            self.eg_dphase = 1 << EG_DP_BITS;
        } else if rm == 14 {
            self.eg_incr = &EG_INCR_14[rl];
            self.eg_dphase = 1 << EG_DP_BITS;
        } else {
            self.eg_incr = &EG_INCR_15;
            self.eg_dphase = 1 << EG_DP_BITS;
        }
    }

    /// Recompute total level + key-scale level attenuation. Carrier-type
    /// slots attenuate by their volume register, modulators by patch TL.
    pub(crate) fn update_tll(&mut self, patch: &Patch, tables: &Tables) {
        let level = if self.is_carrier {
            self.volume
        } else {
            patch.tl
        };
        self.tll = tables.tll[(self.fnum >> 5) as usize][self.block as usize][level as usize]
            [patch.kl as usize] as u32;
    }

    /// Recompute the key-scale rate offset from octave and top fnum bit.
    pub(crate) fn update_rks(&mut self, patch: &Patch, tables: &Tables) {
        self.rks =
            tables.rks[(self.fnum >> 8) as usize][self.block as usize][patch.kr as usize];
    }

    /// Re-select the wave table from the patch's WF bit.
    pub(crate) fn update_wf(&mut self, patch: &Patch) {
        self.wave = if patch.wf {
            Waveform::Half
        } else {
            Waveform::Full
        };
    }

    /// Recompute every derived field. EG must come last: its rate depends
    /// on the freshly derived key-scale offset.
    pub(crate) fn update_all(&mut self, patch: &Patch, tables: &Tables) {
        self.update_tll(patch, tables);
        self.update_rks(patch, tables);
        self.update_wf(patch);
        self.update_eg(patch);
    }

    /// Advance the phase accumulator by one chip tick.
    pub(crate) fn calc_phase(&mut self, pm_phase: u32, patch: &Patch) {
        let blk_fnum = ((self.block as u32) << 9) | self.fnum as u32;
        let step = if patch.pm {
            let pm = PM_TABLE[(self.fnum >> 7) as usize]
                [(pm_phase >> (PM_DP_BITS - PM_PG_BITS)) as usize];
            tables::dphase((blk_fnum as i32 + pm as i32) as u32, patch.ml)
        } else {
            tables::dphase(blk_fnum, patch.ml)
        };

        self.pg_phase = (self.pg_phase + step) & (DP_WIDTH - 1);
        self.pg_out = self.pg_phase >> DP_BASE_BITS;
    }

    /// Force the slot into attack from full attenuation, resetting phase
    /// unless the slot retains it across key-on.
    fn start_attack(&mut self, patch: &Patch) {
        self.eg_state = EgState::Attack;
        self.eg_incr_index = 0;
        self.eg_ar_out = 0;
        self.eg_out = EG_MUTE;
        if !self.pg_keep {
            self.pg_phase = 0;
        }
        self.update_eg(patch);
    }
}

/// Advance a slot's envelope primary counter by one chip tick, applying one
/// secondary step on overflow.
///
/// `slave` is the paired modulator of a carrier-type slot: when a settle
/// completes on the carrier, the pair retriggers attack in the same tick.
pub(crate) fn calc_envelope(slot: &mut Slot, patch: &Patch, slave: Option<(&mut Slot, &Patch)>) {
    slot.eg_phase += slot.eg_dphase;
    if slot.eg_phase >= (1 << EG_DP_BITS) {
        slot.eg_phase -= 1 << EG_DP_BITS;
        envelope_cycle(slot, patch, slave);
    }
}

fn envelope_cycle(slot: &mut Slot, patch: &Patch, slave: Option<(&mut Slot, &Patch)>) {
    slot.eg_incr_index = slot.eg_incr_index.wrapping_add(1);
    let incr = slot.eg_incr[(slot.eg_incr_index % 8) as usize] as u32;

    match slot.eg_state {
        EgState::Attack => {
            slot.eg_ar_out = (slot.eg_ar_out + incr as u8).min(15);
            slot.eg_out = EG_AR_CURVE[slot.eg_ar_out as usize] as u32;
            if patch.ar == 15 || slot.eg_out == 0 {
                slot.eg_state = EgState::Decay;
                slot.eg_out = 0;
                slot.update_eg(patch);
            }
        }

        EgState::Decay => {
            slot.eg_out += incr;
            let sustain_level = tables::sl_to_eg(patch.sl as u32);
            if slot.eg_out >= sustain_level {
                slot.eg_state = if patch.eg {
                    EgState::SusHold
                } else {
                    EgState::Sustain
                };
                slot.eg_out = sustain_level;
                slot.update_eg(patch);
            }
        }

        EgState::SusHold => {
            if !patch.eg {
                slot.eg_state = EgState::Sustain;
                slot.update_eg(patch);
            }
        }

        EgState::Sustain | EgState::Release => {
            slot.eg_out += incr;
            if slot.eg_out >= EG_MUTE {
                slot.eg_state = EgState::Finish;
                slot.eg_out = EG_MUTE;
                slot.update_eg(patch);
            }
        }

        EgState::Settle => {
            slot.eg_out = slot.eg_out.saturating_add(incr);
            if slot.eg_out >= EG_MUTE && slot.is_carrier {
                slot.start_attack(patch);
                if let Some((slave_slot, slave_patch)) = slave {
                    slave_slot.start_attack(slave_patch);
                }
            }
        }

        EgState::Finish => {
            slot.eg_out = EG_MUTE;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ym2413::tables;

    fn test_patch() -> Patch {
        Patch {
            ar: 10,
            dr: 8,
            sl: 4,
            rr: 8,
            eg: true,
            ml: 1,
            ..Patch::default()
        }
    }

    fn run_ticks(slot: &mut Slot, patch: &Patch, ticks: u32) {
        for _ in 0..ticks {
            calc_envelope(slot, patch, None);
        }
    }

    #[test]
    fn test_settle_reaches_mute_then_attacks_on_carrier() {
        tables::init();
        let patch = test_patch();
        let mut slot = Slot::new(1);
        slot.eg_state = EgState::Settle;
        slot.eg_out = 0;
        slot.update_eg(&patch);

        run_ticks(&mut slot, &patch, 100);
        assert_eq!(slot.eg_state, EgState::Attack);
        assert_eq!(slot.pg_phase, 0);
    }

    #[test]
    fn test_settle_on_modulator_waits_for_carrier() {
        tables::init();
        let patch = test_patch();
        let mut slot = Slot::new(0);
        slot.eg_state = EgState::Settle;
        slot.eg_out = 0;
        slot.update_eg(&patch);

        run_ticks(&mut slot, &patch, 500);
        // Modulator-type slots never self-transition out of settle.
        assert_eq!(slot.eg_state, EgState::Settle);
    }

    #[test]
    fn test_settle_retriggers_pair_in_same_cycle() {
        tables::init();
        let patch = test_patch();
        let mut carrier = Slot::new(1);
        let mut modulator = Slot::new(0);
        for slot in [&mut carrier, &mut modulator] {
            slot.eg_state = EgState::Settle;
            slot.eg_out = EG_MUTE - 1;
            slot.update_eg(&patch);
            slot.eg_phase = (1 << EG_DP_BITS) - 1;
        }

        calc_envelope(&mut carrier, &patch, Some((&mut modulator, &patch)));
        assert_eq!(carrier.eg_state, EgState::Attack);
        assert_eq!(modulator.eg_state, EgState::Attack);
    }

    #[test]
    fn test_instant_attack_rate_15() {
        tables::init();
        let patch = Patch {
            ar: 15,
            ..test_patch()
        };
        let mut slot = Slot::new(1);
        slot.eg_state = EgState::Attack;
        slot.eg_out = EG_MUTE;
        slot.update_eg(&patch);

        run_ticks(&mut slot, &patch, 2);
        assert_eq!(slot.eg_state, EgState::Decay);
        assert_eq!(slot.eg_out, 0);
    }

    #[test]
    fn test_decay_holds_at_sustain_level_for_eg_voices() {
        tables::init();
        let patch = test_patch();
        let mut slot = Slot::new(1);
        slot.eg_state = EgState::Decay;
        slot.eg_out = 0;
        slot.update_eg(&patch);

        run_ticks(&mut slot, &patch, 20_000);
        assert_eq!(slot.eg_state, EgState::SusHold);
        assert_eq!(slot.eg_out, tables::sl_to_eg(patch.sl as u32));
    }

    #[test]
    fn test_release_terminates_at_mute() {
        tables::init();
        let patch = test_patch();
        let mut slot = Slot::new(1);
        slot.eg_state = EgState::Release;
        slot.eg_out = 0;
        slot.update_eg(&patch);

        run_ticks(&mut slot, &patch, 200_000);
        assert_eq!(slot.eg_state, EgState::Finish);
        assert_eq!(slot.eg_out, EG_MUTE);
    }

    #[test]
    fn test_zero_rate_freezes_envelope() {
        tables::init();
        let patch = Patch {
            dr: 0,
            ..test_patch()
        };
        let mut slot = Slot::new(1);
        slot.eg_state = EgState::Decay;
        slot.eg_out = 17;
        slot.update_eg(&patch);

        assert_eq!(slot.eg_dphase, 0);
        run_ticks(&mut slot, &patch, 10_000);
        assert_eq!(slot.eg_out, 17);
    }

    #[test]
    fn test_phase_advance_masks_to_accumulator_width() {
        tables::init();
        let patch = Patch {
            ml: 15,
            ..test_patch()
        };
        let mut slot = Slot::new(0);
        slot.fnum = 0x1ff;
        slot.block = 7;
        for _ in 0..10_000 {
            slot.calc_phase(0, &patch);
            assert!(slot.pg_phase < DP_WIDTH);
            assert!(slot.pg_out < tables::PG_WIDTH as u32);
        }
    }

    #[test]
    fn test_pg_keep_preserves_phase_across_retrigger() {
        tables::init();
        let patch = test_patch();
        let mut slot = Slot::new(1);
        slot.pg_keep = true;
        slot.pg_phase = 0x12345;
        slot.start_attack(&patch);
        assert_eq!(slot.pg_phase, 0x12345);

        slot.pg_keep = false;
        slot.start_attack(&patch);
        assert_eq!(slot.pg_phase, 0);
    }
}
