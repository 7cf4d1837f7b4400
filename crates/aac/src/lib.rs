//! AAC `AudioSpecificConfig` parsing and the RTMP audio-tag-header mapping.
//!
//! ISO/IEC 14496-3:2019(E) §1.6.2 defines the `AudioSpecificConfig` (ASC)
//! bitstream embedded in an AAC elementary stream's out-of-band
//! configuration. RTMP's `AACAUDIODATA` tag only needs one derived byte (the
//! "SoundFormat | SoundRate | SoundSize | SoundType" nibble pair); the rest
//! of the ASC is carried through untouched as the payload.
#![deny(unsafe_code)]
#![deny(unreachable_pub)]

use nutype_enum::nutype_enum;

nutype_enum! {
    /// MPEG-4 Audio Object Type (ISO/IEC 14496-3:2019(E), Table 1.17).
    ///
    /// Only a handful of values are named; the rest still round-trip via the
    /// `Unknown` fallback built into [`nutype_enum`].
    pub enum AudioObjectType(u16) {
        AacMain = 1,
        AacLowComplexity = 2,
        AacScalableSampleRate = 3,
        AacLongTermPrediction = 4,
        SbrSpectralBandReplication = 5,
        AacScalable = 6,
        Hvxc = 7,
        Ssc = 8,
        ParametricStereo = 29,
    }
}

nutype_enum! {
    /// Sampling-frequency-index table (ISO/IEC 14496-3:2019(E), Table 1.22).
    pub enum SamplingFrequencyIndex(u8) {
        Freq96000 = 0x0,
        Freq88200 = 0x1,
        Freq64000 = 0x2,
        Freq48000 = 0x3,
        Freq44100 = 0x4,
        Freq32000 = 0x5,
        Freq24000 = 0x6,
        Freq22050 = 0x7,
        Freq16000 = 0x8,
        Freq12000 = 0x9,
        Freq11025 = 0xA,
        Freq8000 = 0xB,
        Freq7350 = 0xC,
        Escape = 0xF,
    }
}

impl SamplingFrequencyIndex {
    /// Returns the frequency in Hz for every index except [`Self::Escape`], which
    /// carries an explicit 24-bit frequency elsewhere in the bitstream.
    fn to_freq(self) -> Option<u32> {
        Some(match self {
            Self::Freq96000 => 96000,
            Self::Freq88200 => 88200,
            Self::Freq64000 => 64000,
            Self::Freq48000 => 48000,
            Self::Freq44100 => 44100,
            Self::Freq32000 => 32000,
            Self::Freq24000 => 24000,
            Self::Freq22050 => 22050,
            Self::Freq16000 => 16000,
            Self::Freq12000 => 12000,
            Self::Freq11025 => 11025,
            Self::Freq8000 => 8000,
            Self::Freq7350 => 7350,
            _ => return None,
        })
    }
}

/// A decoded `AudioSpecificConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpecificConfig {
    /// The audio object type (encoding profile).
    pub audio_object_type: AudioObjectType,
    /// The sampling frequency, in Hz.
    pub sampling_frequency: u32,
    /// Number of channels implied by the channel configuration (0 means
    /// "sent out of band", which this mapping rejects).
    pub channel_configuration: u8,
}

/// Errors parsing or mapping an `AudioSpecificConfig`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AacError {
    /// Fewer than the 2 bytes needed to read object type, sample rate index,
    /// and channel configuration.
    #[error("audio specific config is too short: {len} bytes")]
    TooShort {
        /// Number of bytes actually supplied.
        len: usize,
    },
    /// The sampling-frequency index was the reserved/escape value but no
    /// explicit 24-bit frequency followed (not supported; RTMP only accepts
    /// the table-driven rates below anyway).
    #[error("explicit (escaped) sampling frequency is not supported")]
    ExplicitSamplingFrequencyUnsupported,
    /// `send_audio_specific_config` was called with an ASC this mapping
    /// cannot express as a single RTMP audio-tag-header byte.
    #[error("audio specific config is not representable as an RTMP AAC audio header: {0:?}")]
    UnsupportedForRtmp(AudioSpecificConfig),
}

struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    fn read_bits(&mut self, count: usize) -> Option<u32> {
        let mut value: u32 = 0;
        for _ in 0..count {
            let byte_idx = self.bit_pos / 8;
            let bit_idx = 7 - (self.bit_pos % 8);
            let byte = *self.data.get(byte_idx)?;
            let bit = (byte >> bit_idx) & 1;
            value = (value << 1) | bit as u32;
            self.bit_pos += 1;
        }
        Some(value)
    }
}

impl AudioSpecificConfig {
    /// Parses the leading fields of an `AudioSpecificConfig`: audio object
    /// type (5 bits, or 5+6 for the extended-object-type escape), sampling
    /// frequency index (4 bits, or 4+24 for the explicit-frequency escape),
    /// and channel configuration (4 bits). Anything past those fields (SBR
    /// extension, GASpecificConfig, ...) is not needed for the RTMP mapping
    /// and is not parsed.
    pub fn parse(data: &[u8]) -> Result<Self, AacError> {
        if data.len() < 2 {
            return Err(AacError::TooShort { len: data.len() });
        }

        let mut reader = BitReader::new(data);
        let mut object_type = reader.read_bits(5).expect("checked length") as u16;
        if object_type == 31 {
            let ext = reader.read_bits(6).ok_or(AacError::TooShort { len: data.len() })?;
            object_type = 32 + ext as u16;
        }

        let freq_index_bits = reader.read_bits(4).expect("checked length") as u8;
        let freq_index = SamplingFrequencyIndex::from(freq_index_bits);
        let sampling_frequency = if freq_index == SamplingFrequencyIndex::Escape {
            let explicit = reader
                .read_bits(24)
                .ok_or(AacError::ExplicitSamplingFrequencyUnsupported)?;
            explicit
        } else {
            freq_index
                .to_freq()
                .ok_or(AacError::ExplicitSamplingFrequencyUnsupported)?
        };

        let channel_configuration = reader.read_bits(4).ok_or(AacError::TooShort { len: data.len() })? as u8;

        Ok(Self {
            audio_object_type: object_type.into(),
            sampling_frequency,
            channel_configuration,
        })
    }

    /// Maps this config to the single RTMP `AACAUDIODATA` header byte
    ///: bits 7-4 are always `0xA` (HE-AAC, the tag RTMP uses for
    /// all AAC), bits 3-2 encode the sample rate, bit 1 is the sample size
    /// (always 16-bit here), and bit 0 is the channel count.
    ///
    /// Only AAC-LC at 48000/44100/22050/11025 Hz, 16-bit, mono or stereo is
    /// accepted; anything else is rejected rather than guessed, since a wrong
    /// header byte silently desyncs the decoder on the server side.
    pub fn rtmp_audio_header(&self) -> Result<u8, AacError> {
        if self.audio_object_type != AudioObjectType::AacLowComplexity {
            return Err(AacError::UnsupportedForRtmp(*self));
        }

        let sample_rate_bits: u8 = match self.sampling_frequency {
            48000 | 44100 => 0b11,
            22050 => 0b10,
            11025 => 0b01,
            _ => return Err(AacError::UnsupportedForRtmp(*self)),
        };

        let channel_bit: u8 = match self.channel_configuration {
            2 => 1,
            1 => 0,
            _ => return Err(AacError::UnsupportedForRtmp(*self)),
        };

        const SOUND_SIZE_16BIT: u8 = 1;
        Ok((0xA << 4) | (sample_rate_bits << 2) | (SOUND_SIZE_16BIT << 1) | channel_bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aac_lc_stereo_44100() {
        // object_type=2 (AAC-LC), freq_index=4 (44100), channels=2
        // 00010 0100 0010 -> bytes 0x12 0x10
        let config = AudioSpecificConfig::parse(&[0x12, 0x10]).unwrap();
        assert_eq!(config.audio_object_type, AudioObjectType::AacLowComplexity);
        assert_eq!(config.sampling_frequency, 44100);
        assert_eq!(config.channel_configuration, 2);
    }

    #[test]
    fn maps_to_0xaf_for_44100_stereo() {
        let config = AudioSpecificConfig::parse(&[0x12, 0x10]).unwrap();
        assert_eq!(config.rtmp_audio_header().unwrap(), 0xAF);
    }

    #[test]
    fn rejects_unsupported_sample_rate() {
        // object_type=2, freq_index=0 (96000), channels=1 -> 00010 0000 0001 -> 0x10 0x01
        let config = AudioSpecificConfig::parse(&[0x10, 0x01]).unwrap();
        assert_eq!(config.sampling_frequency, 96000);
        assert!(matches!(config.rtmp_audio_header(), Err(AacError::UnsupportedForRtmp(_))));
    }

    #[test]
    fn rejects_mono_with_bad_channel_config() {
        // object_type=2, freq_index=4 (44100), channel_configuration=0 (out of band)
        let config = AudioSpecificConfig::parse(&[0x12, 0x00]).unwrap();
        assert_eq!(config.channel_configuration, 0);
        assert!(config.rtmp_audio_header().is_err());
    }

    #[test]
    fn too_short_is_rejected() {
        assert_eq!(AudioSpecificConfig::parse(&[0x12]), Err(AacError::TooShort { len: 1 }));
    }
}
