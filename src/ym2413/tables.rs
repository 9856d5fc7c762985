//! Fixed lookup tables shared by every chip instance
//!
//! The OPLL does all of its waveform math in the logarithmic domain using
//! small ROM tables: a quarter-wave log-sine table, a log-to-linear
//! exponential table, key-scale level/rate tables and the LFO patterns.
//! The tables are built exactly once (guarded by a `OnceLock`) and shared
//! read-only across chip instances.

use std::f64::consts::PI;
use std::sync::OnceLock;

/// Phase accumulator width in bits (18-bit fixed point).
pub const DP_BITS: u32 = 18;
/// Phase accumulator modulus.
pub const DP_WIDTH: u32 = 1 << DP_BITS;
/// Sine table index width in bits (1024-entry tables).
pub const PG_BITS: u32 = 10;
/// Sine table length.
pub const PG_WIDTH: usize = 1 << PG_BITS;
/// Bits below the sine table index inside the phase accumulator.
pub const DP_BASE_BITS: u32 = DP_BITS - PG_BITS;

/// Envelope attenuation width in bits.
pub const EG_BITS: u32 = 7;
/// Maximum envelope attenuation (full silence).
pub const EG_MUTE: u32 = (1 << EG_BITS) - 1;
/// Envelope primary counter width in bits.
pub const EG_DP_BITS: u32 = 15;

/// Pitch LFO phase counter width in bits.
pub const PM_DP_BITS: u32 = 22;
/// Pitch LFO phase counter modulus.
pub const PM_DP_WIDTH: u32 = 1 << PM_DP_BITS;
/// Pitch LFO table index width in bits.
pub const PM_PG_BITS: u32 = 3;
/// Pitch LFO phase increment per chip tick.
pub const PM_DPHASE: u32 = PM_DP_WIDTH / (1024 * 8);

const TL_BITS: u32 = 6;
const SL_BITS: u32 = 4;
const XB_BITS: u32 = 11;

/// Scale a 6-bit total level into envelope attenuation units.
#[inline]
pub const fn tl_to_eg(tl: u32) -> u32 {
    tl << (EG_BITS - TL_BITS)
}

/// Scale a 4-bit sustain level into envelope attenuation units.
#[inline]
pub const fn sl_to_eg(sl: u32) -> u32 {
    sl << (EG_BITS - SL_BITS)
}

/// Scale envelope attenuation into the 11-bit exponent domain.
#[inline]
pub const fn eg_to_xb(eg: u32) -> u32 {
    eg << (XB_BITS - EG_BITS)
}

/// Frequency multiplier table (register ML field, values pre-doubled;
/// entries 11/13/15 repeat 10/12/15 as on the real chip).
pub const ML_TABLE: [u32; 16] = [
    1, 2, 4, 6, 8, 10, 12, 14, 16, 18, 20, 20, 24, 24, 30, 30,
];

/// Vibrato offset applied to the 9-bit F-Number, indexed by the top two
/// F-Number bits and the pitch LFO phase. Depth is roughly ±13.75 cents.
pub const PM_TABLE: [[i8; 8]; 4] = [
    [0, 1, 0, 0, 0, 0, 0, 0],    // F-NUM 00xxxxxxx
    [1, 1, 1, 0, -1, -1, -1, 0], // F-NUM 01xxxxxxx
    [1, 2, 1, 0, -1, -2, -1, 0], // F-NUM 10xxxxxxx
    [1, 3, 1, 0, -1, -3, -1, 0], // F-NUM 11xxxxxxx
];

/// Envelope secondary increment rows for combined rates below 13.
pub static EG_INCR_LOW: [[u8; 8]; 4] = [
    [0, 1, 0, 1, 0, 1, 0, 1], // RL 0
    [0, 1, 1, 1, 0, 1, 0, 1], // RL 1
    [0, 1, 1, 1, 0, 1, 1, 1], // RL 2
    [0, 1, 1, 1, 1, 1, 1, 1], // RL 3
];

/// Dedicated rows for the irregular combined rate 13 (one per RL).
pub static EG_INCR_13: [[u8; 8]; 4] = [
    [1, 1, 1, 1, 1, 1, 1, 1],
    [1, 1, 1, 2, 1, 1, 1, 2],
    [1, 2, 1, 2, 1, 2, 1, 2],
    [1, 2, 2, 2, 1, 2, 2, 2],
];

/// Dedicated rows for the irregular combined rate 14 (one per RL).
pub static EG_INCR_14: [[u8; 8]; 4] = [
    [2, 2, 2, 2, 2, 2, 2, 2],
    [2, 2, 2, 4, 2, 2, 2, 4],
    [2, 4, 2, 4, 2, 4, 2, 4],
    [2, 4, 4, 4, 2, 4, 4, 4],
];

/// Row for combined rates of 15 and above.
pub static EG_INCR_15: [u8; 8] = [4, 4, 4, 4, 4, 4, 4, 4];

/// Row for a resolved rate of zero (envelope frozen).
pub static EG_INCR_0: [u8; 8] = [0, 0, 0, 0, 0, 0, 0, 0];

/// Attack envelope curve observed on a real YM2413 (differs from OPL).
/// Indexed by the accumulated attack counter, yields attenuation.
pub const EG_AR_CURVE: [u8; 16] = [96, 72, 54, 40, 28, 20, 13, 9, 5, 1, 0, 0, 0, 0, 0, 0];

/// Precomputed tables built once per process.
pub struct Tables {
    /// Log-to-linear fractional exponent table: `(2^(x/256) - 1) * 1024`.
    pub exp: [i32; 256],
    /// Full-period log-sine table.
    pub full_sin: [i16; PG_WIDTH],
    /// Half-period variant: negative half clamped to positive zero.
    pub half_sin: [i16; PG_WIDTH],
    /// Key-scale level + total level attenuation: `[fnum>>5][block][tl][kl]`.
    pub tll: Box<[[[[u16; 4]; 64]; 8]; 16]>,
    /// Key-scale rate offset: `[fnum bit 8][block][kr]`.
    pub rks: [[[u8; 2]; 8]; 2],
    /// Tremolo LFO triangle, verified on real silicon; each entry is
    /// held for 64 chip ticks.
    pub am: [u8; 210],
}

impl Tables {
    fn build() -> Self {
        let full_sin = make_full_sin_table();
        Tables {
            exp: make_exp_table(),
            half_sin: make_half_sin_table(&full_sin),
            full_sin,
            tll: make_tll_table(),
            rks: make_rks_table(),
            am: make_am_table(),
        }
    }
}

static TABLES: OnceLock<Tables> = OnceLock::new();

/// Build the shared tables if they have not been built yet and return them.
///
/// Idempotent; safe to call from multiple threads. `Ym2413::new` calls this,
/// but embedders may invoke it ahead of time to keep table construction out
/// of their audio startup path.
pub fn init() -> &'static Tables {
    TABLES.get_or_init(Tables::build)
}

fn make_exp_table() -> [i32; 256] {
    let mut exp = [0i32; 256];
    for (x, entry) in exp.iter_mut().enumerate() {
        *entry = ((2f64.powf(x as f64 / 256.0) - 1.0) * 1024.0).round() as i32;
    }
    exp
}

fn make_full_sin_table() -> [i16; PG_WIDTH] {
    let mut sin = [0i16; PG_WIDTH];
    let quarter = PG_WIDTH / 4;

    // First quarter: -log2(sin) scaled by 256. The +1 keeps positive zero
    // distinct from negative zero after mirroring.
    for x in 0..quarter {
        let s = ((x as f64 + 0.5) * PI / quarter as f64 / 2.0).sin();
        sin[x] = (-s.log2() * 256.0) as i16 + 1;
    }

    // Second quarter mirrors the first, second half is the negation.
    for x in 0..quarter {
        sin[quarter + x] = sin[quarter - x - 1];
    }
    for x in 0..PG_WIDTH / 2 {
        sin[PG_WIDTH / 2 + x] = -sin[x];
    }
    sin
}

fn make_half_sin_table(full: &[i16; PG_WIDTH]) -> [i16; PG_WIDTH] {
    let mut sin = [0i16; PG_WIDTH];
    sin[..PG_WIDTH / 2].copy_from_slice(&full[..PG_WIDTH / 2]);
    for entry in sin[PG_WIDTH / 2..].iter_mut() {
        *entry = full[0];
    }
    sin
}

fn make_tll_table() -> Box<[[[[u16; 4]; 64]; 8]; 16]> {
    // Key-scale level lookup, in units of 0.5 dB.
    const KL_TABLE: [f64; 16] = [
        0.000 * 2.0,
        9.000 * 2.0,
        12.000 * 2.0,
        13.875 * 2.0,
        15.000 * 2.0,
        16.125 * 2.0,
        16.875 * 2.0,
        17.625 * 2.0,
        18.000 * 2.0,
        18.750 * 2.0,
        19.125 * 2.0,
        19.500 * 2.0,
        19.875 * 2.0,
        20.250 * 2.0,
        20.625 * 2.0,
        21.000 * 2.0,
    ];
    const EG_STEP: f64 = 0.375;

    let mut tll: Box<[[[[u16; 4]; 64]; 8]; 16]> = Box::new([[[[0; 4]; 64]; 8]; 16]);
    for fnum in 0..16 {
        for block in 0..8 {
            for tl in 0..64u32 {
                for kl in 0..4 {
                    tll[fnum][block][tl as usize][kl] = if kl == 0 {
                        tl_to_eg(tl) as u16
                    } else {
                        let tmp = (KL_TABLE[fnum] - 3.0 * 2.0 * (7 - block) as f64) as i32;
                        if tmp <= 0 {
                            tl_to_eg(tl) as u16
                        } else {
                            ((tmp >> (3 - kl)) as f64 / EG_STEP) as u16 + tl_to_eg(tl) as u16
                        }
                    };
                }
            }
        }
    }
    tll
}

fn make_rks_table() -> [[[u8; 2]; 8]; 2] {
    let mut rks = [[[0u8; 2]; 8]; 2];
    for fnum8 in 0..2 {
        for block in 0..8 {
            rks[fnum8][block][1] = ((block << 1) + fnum8) as u8;
            rks[fnum8][block][0] = (block >> 1) as u8;
        }
    }
    rks
}

fn make_am_table() -> [u8; 210] {
    // Triangle: 0..=12 held 8 entries each, a 3-entry peak at 13, back
    // down 12..=1, then 7 trailing zeros.
    let mut am = [0u8; 210];
    let mut i = 0;
    for level in 0..=12u8 {
        for _ in 0..8 {
            am[i] = level;
            i += 1;
        }
    }
    for _ in 0..3 {
        am[i] = 13;
        i += 1;
    }
    for level in (1..=12u8).rev() {
        for _ in 0..8 {
            am[i] = level;
            i += 1;
        }
    }
    debug_assert_eq!(i, 203);
    am
}

/// Phase increment for one chip tick, from the combined 12-bit
/// block/F-Number value and the 4-bit multiplier field.
///
/// The vibrato offset is applied to the combined value before decomposition,
/// so an offset near the top of an octave carries into the next block
/// exactly as it does in the chip's adder.
#[inline]
pub fn dphase(blk_fnum: u32, ml: u8) -> u32 {
    let blk_fnum = blk_fnum.min(0xfff);
    let fnum = blk_fnum & 0x1ff;
    let block = blk_fnum >> 9;
    ((fnum * ML_TABLE[(ml & 15) as usize]) << block) >> (20 - DP_BITS)
}

/// Log-to-linear conversion of an 11-bit-plus attenuation value.
///
/// Splits the exponent into fractional (table lookup) and integer (shift)
/// parts; input beyond full attenuation saturates to silence.
#[inline]
pub fn exp_linear(tables: &Tables, x: i32) -> i32 {
    const BASE: i32 = 4096;
    let x = BASE - x.min(BASE - 1);
    (((tables.exp[(x & 0xff) as usize] + 1024) << (x >> 8)) - 1024) >> 10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exp_table_endpoints() {
        let t = init();
        assert_eq!(t.exp[0], 0);
        // 2^(255/256) - 1 scaled by 1024
        assert_eq!(t.exp[255], ((2f64.powf(255.0 / 256.0) - 1.0) * 1024.0).round() as i32);
    }

    #[test]
    fn test_sin_table_quarter_mirror() {
        let t = init();
        for x in 0..PG_WIDTH / 4 {
            assert_eq!(t.full_sin[PG_WIDTH / 4 + x], t.full_sin[PG_WIDTH / 4 - x - 1]);
        }
    }

    #[test]
    fn test_sin_table_negative_half() {
        let t = init();
        for x in 0..PG_WIDTH / 2 {
            assert_eq!(t.full_sin[PG_WIDTH / 2 + x], -t.full_sin[x]);
        }
    }

    #[test]
    fn test_half_sin_clamps_negative_half() {
        let t = init();
        for x in PG_WIDTH / 2..PG_WIDTH {
            assert_eq!(t.half_sin[x], t.full_sin[0]);
        }
        assert_eq!(&t.half_sin[..PG_WIDTH / 2], &t.full_sin[..PG_WIDTH / 2]);
    }

    #[test]
    fn test_positive_zero_is_distinct() {
        let t = init();
        // Peak of the sine (lowest log attenuation) must stay above zero so
        // the sign survives the log domain.
        assert!(t.full_sin[PG_WIDTH / 4] > 0);
        assert!(t.full_sin[PG_WIDTH / 2 + PG_WIDTH / 4] < 0);
    }

    #[test]
    fn test_exp_linear_silence_saturates() {
        let t = init();
        assert_eq!(exp_linear(t, 4095), 0);
        assert_eq!(exp_linear(t, 100_000), 0);
    }

    #[test]
    fn test_exp_linear_monotonic_in_attenuation() {
        let t = init();
        let mut prev = i32::MAX;
        for attn in (0..4096).step_by(64) {
            let v = exp_linear(t, attn);
            assert!(v <= prev, "linear output must not grow with attenuation");
            prev = v;
        }
    }

    #[test]
    fn test_rks_table_values() {
        let t = init();
        assert_eq!(t.rks[1][7][1], 15); // highest note, KR on
        assert_eq!(t.rks[0][7][0], 3); // KR off uses block >> 1
        assert_eq!(t.rks[1][0][1], 1);
    }

    #[test]
    fn test_tll_kl_zero_is_pure_total_level() {
        let t = init();
        for fnum in 0..16 {
            for block in 0..8 {
                for tl in 0..64 {
                    assert_eq!(t.tll[fnum][block][tl][0] as u32, tl_to_eg(tl as u32));
                }
            }
        }
    }

    #[test]
    fn test_tll_increases_with_kl() {
        let t = init();
        // High note: attenuation must be monotone in the KL depth field.
        let row = &t.tll[15][7][0];
        assert!(row[1] <= row[2] && row[2] <= row[3]);
        assert!(row[3] > 0);
    }

    #[test]
    fn test_am_table_shape() {
        let t = init();
        assert_eq!(t.am.len(), 210);
        assert_eq!(t.am[0], 0);
        assert_eq!(*t.am.iter().max().unwrap(), 13);
        // Trailing zeros after the descent
        assert_eq!(&t.am[203..], &[0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_dphase_octave_doubling() {
        for ml in 0..16u8 {
            let low = dphase(0x100, ml);
            let high = dphase((1 << 9) | 0x100, ml);
            assert_eq!(high, low * 2, "block raises pitch by one octave");
        }
    }

    #[test]
    fn test_dphase_clamps_to_top_of_range() {
        assert_eq!(dphase(0x1000, 0), dphase(0xfff, 0));
    }
}
