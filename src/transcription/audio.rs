//! 16 kHz mono 16-bit PCM WAV files handed to recognizers.

use crate::error::{Error, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::{Path, PathBuf};

pub const SAMPLE_RATE: u32 = 16_000;

const SPEC: WavSpec = WavSpec {
    channels: 1,
    sample_rate: SAMPLE_RATE,
    bits_per_sample: 16,
    sample_format: SampleFormat::Int,
};

/// A validated recognizer input file.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInput {
    path: PathBuf,
    samples: u32,
}

impl AudioInput {
    /// Open `path` and check it is 16 kHz mono 16-bit PCM.
    pub fn open(path: &Path) -> Result<Self> {
        let reader = WavReader::open(path)
            .map_err(|e| Error::Media(format!("cannot read {}: {}", path.display(), e)))?;
        let spec = reader.spec();
        if spec.sample_rate != SAMPLE_RATE
            || spec.channels != 1
            || spec.bits_per_sample != 16
            || spec.sample_format != SampleFormat::Int
        {
            return Err(Error::Media(format!(
                "Expected 16kHz mono 16-bit, got {}Hz {}ch {}bit",
                spec.sample_rate, spec.channels, spec.bits_per_sample
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            samples: reader.duration(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Seconds of audio.
    pub fn duration(&self) -> f64 {
        f64::from(self.samples) / f64::from(SAMPLE_RATE)
    }
}

/// Write raw samples to a WAV file. 16 kHz mono 16-bit.
pub fn write_pcm_wav(path: &Path, samples: &[i16]) -> Result<()> {
    let wav_err = |e: hound::Error| Error::Media(format!("cannot write {}: {}", path.display(), e));
    let mut writer = WavWriter::create(path, SPEC).map_err(wav_err)?;
    for &s in samples {
        writer.write_sample(s).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)?;
    Ok(())
}
