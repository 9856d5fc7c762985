//! Audio export functionality for YM2413 output
//!
//! Renders a register-programmed chip to uncompressed PCM. The caller owns
//! the register script; export just clocks the chip and captures samples.
//!
//! # Examples
//!
//! ```no_run
//! use ym2413::export::{render_to_wav, ExportConfig};
//! use ym2413::Ym2413;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut chip = Ym2413::default();
//! chip.write_reg(0x30, 0x10);
//! chip.write_reg(0x10, 0xAD);
//! chip.write_reg(0x20, 0x14);
//!
//! render_to_wav(&mut chip, "tone.wav", 44_100, ExportConfig::default())?;
//! # Ok(())
//! # }
//! ```

mod wav;
pub use wav::render_to_wav;

/// Export configuration options
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Number of audio channels (1 = mono, 2 = stereo with chip panning)
    pub channels: u16,
    /// Whether to normalize audio to prevent clipping
    pub normalize: bool,
    /// Fade out duration in seconds (0 = no fade)
    pub fade_out_duration: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            channels: 1,
            normalize: true,
            fade_out_duration: 0.0,
        }
    }
}

impl ExportConfig {
    /// Create config for stereo export
    pub fn stereo() -> Self {
        Self {
            channels: 2,
            ..Default::default()
        }
    }

    /// Enable normalization to prevent clipping
    pub fn normalize(mut self, enable: bool) -> Self {
        self.normalize = enable;
        self
    }

    /// Add fade out at the end
    pub fn fade_out(mut self, duration_seconds: f32) -> Self {
        self.fade_out_duration = duration_seconds;
        self
    }
}

/// Apply normalization to audio samples
fn normalize_samples(samples: &mut [f32]) {
    if samples.is_empty() {
        return;
    }

    let peak = samples
        .iter()
        .map(|s| s.abs())
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or(1.0);

    // Normalize if peak > 0.95 (leave some headroom)
    if peak > 0.95 {
        let scale = 0.95 / peak;
        for sample in samples.iter_mut() {
            *sample *= scale;
        }
    }
}

/// Apply fade out to the end of audio samples
fn apply_fade_out(samples: &mut [f32], fade_duration: f32, sample_rate: u32) {
    if fade_duration <= 0.0 || samples.is_empty() {
        return;
    }

    let fade_samples = (fade_duration * sample_rate as f32) as usize;
    let start_fade = samples.len().saturating_sub(fade_samples);

    for (i, sample) in samples.iter_mut().enumerate().skip(start_fade) {
        let progress = (i - start_fade) as f32 / fade_samples as f32;
        *sample *= 1.0 - progress;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_samples() {
        let mut samples = vec![0.5, 1.5, -1.2, 0.8];
        normalize_samples(&mut samples);

        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
        assert!(peak <= 0.96); // Allow small floating point error
    }

    #[test]
    fn test_fade_out() {
        let mut samples = vec![1.0; 1000];
        apply_fade_out(&mut samples, 0.1, 44100); // 100ms fade

        assert_eq!(samples[0], 1.0);
        assert!(samples[999].abs() < 0.01);
    }

    #[test]
    fn test_export_config_builder() {
        let config = ExportConfig::stereo().normalize(false).fade_out(2.0);

        assert_eq!(config.channels, 2);
        assert!(!config.normalize);
        assert_eq!(config.fade_out_duration, 2.0);
    }
}
