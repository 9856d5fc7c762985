//! YM2413 (OPLL) FM Sound Chip Emulator
//!
//! A cycle-accurate emulator of the Yamaha YM2413 FM synthesizer as found in
//! the MSX-MUSIC standard, the Sega Master System FM unit and (as the VRC7
//! derivative) the Famicom Lagrange Point cartridge.
//!
//! # Features
//! - Integer-accurate emulation of all 9 FM channels (18 operator slots)
//! - Full envelope generator state machine with hardware damp/retrigger
//! - Rhythm mode with the five percussion voices on channels 6-8
//! - Built-in instrument ROMs for the YM2413, VRC7 and YMF281B variants
//! - Mono and stereo output with per-channel panning and mute masks
//! - Rate conversion from the chip's native tick rate to any host rate
//!
//! # Crate feature flags
//! - `emulator` (default): Core YM2413 integer-accurate emulator
//! - `export-wav` (opt-in): WAV rendering helpers (enables optional `hound` dep)
//!
//! # Quick start
//! ```no_run
//! use ym2413::Ym2413;
//!
//! let mut chip = Ym2413::new(3_579_545, 44_100);
//! chip.write_reg(0x30, 0x30); // channel 0: ROM voice 3 (piano), full volume
//! chip.write_reg(0x10, 0xAD); // F-Number low byte
//! chip.write_reg(0x20, 0x14); // key on, octave 2
//! for _ in 0..44_100 {
//!     let _sample = chip.calc();
//! }
//! ```
//!
//! ## Port-level access
//! Drivers that replay raw register logs can use the two-port hardware
//! interface instead:
//! ```no_run
//! use ym2413::Ym2413;
//!
//! let mut chip = Ym2413::default();
//! chip.write_io(0, 0x30); // address port
//! chip.write_io(1, 0x30); // data port
//! ```

#![warn(missing_docs)]

pub mod ym2413; // YM2413 FM Emulation (core)

#[cfg(feature = "export-wav")]
pub mod export; // WAV rendering helpers

/// Error types for YM2413 emulator operations
///
/// This enum only contains errors that can occur around the core chip
/// emulation; the synthesis path itself is total and never fails.
#[derive(thiserror::Error, Debug)]
pub enum Ym2413Error {
    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Audio export error
    #[error("Audio export error: {0}")]
    ExportError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, Ym2413Error>;

// Public API exports
pub use ym2413::{
    ChannelMask, ChipVariant, InstrumentRom, Patch, Ym2413, DEFAULT_CLOCK, DEFAULT_SAMPLE_RATE,
};
