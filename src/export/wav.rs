//! WAV file export functionality

use super::{apply_fade_out, normalize_samples, ExportConfig};
use crate::{Result, Ym2413, Ym2413Error};
use std::path::Path;

/// Render chip output to a WAV file.
///
/// Clocks `chip` for `sample_count` host-rate samples from its current
/// state and writes 16-bit PCM. Stereo export uses the chip's per-channel
/// pan settings.
///
/// # Arguments
///
/// * `chip` - chip instance, already programmed through its registers
/// * `output_path` - Path where the WAV file will be written
/// * `sample_count` - number of host-rate frames to render
/// * `config` - Export configuration (channels, normalization, fade out)
pub fn render_to_wav<P: AsRef<Path>>(
    chip: &mut Ym2413,
    output_path: P,
    sample_count: usize,
    config: ExportConfig,
) -> Result<()> {
    let sample_rate = chip.rate();

    let mut samples = Vec::with_capacity(sample_count * config.channels as usize);
    for _ in 0..sample_count {
        if config.channels == 2 {
            let [left, right] = chip.calc_stereo();
            samples.push(left as f32 / 32768.0);
            samples.push(right as f32 / 32768.0);
        } else {
            samples.push(chip.calc() as f32 / 32768.0);
        }
    }

    if config.normalize {
        normalize_samples(&mut samples);
    }

    if config.fade_out_duration > 0.0 {
        apply_fade_out(&mut samples, config.fade_out_duration, sample_rate);
    }

    write_wav_file(output_path.as_ref(), &samples, sample_rate, config.channels)
}

/// Write samples to WAV file
fn write_wav_file(path: &Path, samples: &[f32], sample_rate: u32, channels: u16) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| Ym2413Error::ExportError(format!("Failed to create WAV file: {e}")))?;

    for &sample in samples {
        let sample_i16 = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(sample_i16)
            .map_err(|e| Ym2413Error::ExportError(format!("Failed to write sample: {e}")))?;
    }

    writer
        .finalize()
        .map_err(|e| Ym2413Error::ExportError(format!("Failed to finalize WAV file: {e}")))?;

    Ok(())
}
