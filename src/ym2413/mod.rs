//! YM2413 (OPLL) Emulation Domain
//!
//! Core Yamaha YM2413 FM sound chip emulation: 18-slot phase/envelope
//! generation, log-domain waveform synthesis, the rhythm (percussion)
//! subsystem, and rate conversion to the host sample rate.
//!
//! Implementation:
//! - `chip` - Integer-accurate, hardware-accurate core implementation
//! - `tables` - Precomputed log-sine, exponential, attenuation and LFO tables
//! - `patch` / `rom` - Voice parameters and built-in instrument banks

// Internal modules
pub mod chip;
pub mod patch;
pub mod registers;
pub mod rom;
pub mod tables;

mod slot;

// Re-export public API
pub use chip::{ChipVariant, Ym2413, DEFAULT_CLOCK, DEFAULT_SAMPLE_RATE};
pub use patch::Patch;
pub use registers::ChannelMask;
pub use rom::InstrumentRom;
