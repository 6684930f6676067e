//! Audio container detection from magic-byte signatures
//!
//! Uploaded objects arrive with extensions that are frequently wrong, so the
//! pipeline trusts the bytes over the filename. Detection only looks at the
//! container header; it does not decode audio.

/// Minimum plausible size for a real recording, in bytes
pub const MIN_AUDIO_BYTES: usize = 1024;

/// Audio container formats the pipeline recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// WAV (RIFF/WAVE)
    Wav,
    /// MP3 (ID3 tag or bare frame sync)
    Mp3,
    /// Ogg container
    Ogg,
    /// FLAC
    Flac,
    /// WebM (EBML header)
    Webm,
    /// M4A (ftyp box with M4A/isom/mp41 brand)
    M4a,
    /// MP4 (other ftyp brands)
    Mp4,
    /// Signature not recognized
    Unknown,
}

impl AudioFormat {
    /// Detect the container from the first bytes of the payload
    #[must_use]
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.len() < 4 {
            return Self::Unknown;
        }

        if bytes.starts_with(b"ID3") {
            return Self::Mp3;
        }
        // Bare MPEG frame sync: 11 set bits
        if bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0 {
            return Self::Mp3;
        }

        if bytes.starts_with(b"RIFF") && bytes.len() > 11 && &bytes[8..12] == b"WAVE" {
            return Self::Wav;
        }

        if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            return Self::Webm;
        }

        if bytes.starts_with(b"OggS") {
            return Self::Ogg;
        }

        if bytes.starts_with(b"fLaC") {
            return Self::Flac;
        }

        if bytes.len() > 12 && &bytes[4..8] == b"ftyp" {
            let brand = &bytes[8..12];
            if brand == b"M4A " || brand == b"isom" || brand == b"mp41" {
                return Self::M4a;
            }
            return Self::Mp4;
        }

        Self::Unknown
    }

    /// MIME type to declare when submitting to the transcription provider
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 | Self::Unknown => "audio/mpeg",
            Self::Ogg => "audio/ogg",
            Self::Flac => "audio/flac",
            Self::Webm => "audio/webm",
            Self::M4a => "audio/m4a",
            Self::Mp4 => "audio/mp4",
        }
    }

    /// Canonical file extension, without the dot
    #[must_use]
    pub const fn extension(&self) -> Option<&'static str> {
        match self {
            Self::Wav => Some("wav"),
            Self::Mp3 => Some("mp3"),
            Self::Ogg => Some("ogg"),
            Self::Flac => Some("flac"),
            Self::Webm => Some("webm"),
            Self::M4a => Some("m4a"),
            Self::Mp4 => Some("mp4"),
            Self::Unknown => None,
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension().unwrap_or("unknown"))
    }
}

/// Reject payloads that are text masquerading as audio
///
/// Presigned-upload mistakes routinely land an error page or an API error
/// body under an audio key. Returns a description of what the payload looks
/// like when it is clearly not audio.
#[must_use]
pub fn detect_masquerade(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"<?xml") || bytes.starts_with(b"<!DOCTYPE") || bytes.starts_with(b"<html")
    {
        return Some("HTML/XML");
    }
    if bytes.starts_with(b"{") || bytes.starts_with(b"[") {
        return Some("JSON");
    }
    None
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(b"ID3\x04\x00\x00".as_slice(), AudioFormat::Mp3)]
    #[case(&[0xFF, 0xFB, 0x90, 0x00], AudioFormat::Mp3)]
    #[case(b"RIFF\x24\x00\x00\x00WAVEfmt ".as_slice(), AudioFormat::Wav)]
    #[case(&[0x1A, 0x45, 0xDF, 0xA3, 0x00], AudioFormat::Webm)]
    #[case(b"OggS\x00\x02".as_slice(), AudioFormat::Ogg)]
    #[case(b"fLaC\x00\x00\x00\x22".as_slice(), AudioFormat::Flac)]
    #[case(b"\x00\x00\x00\x20ftypM4A \x00\x00".as_slice(), AudioFormat::M4a)]
    #[case(b"\x00\x00\x00\x20ftypisom\x00\x00".as_slice(), AudioFormat::M4a)]
    #[case(b"\x00\x00\x00\x20ftypmp42\x00\x00".as_slice(), AudioFormat::Mp4)]
    #[case(b"not audio at all".as_slice(), AudioFormat::Unknown)]
    #[case(b"ab".as_slice(), AudioFormat::Unknown)]
    fn test_detect(#[case] bytes: &[u8], #[case] expected: AudioFormat) {
        assert_eq!(AudioFormat::detect(bytes), expected);
    }

    #[test]
    fn test_riff_without_wave_is_unknown() {
        assert_eq!(
            AudioFormat::detect(b"RIFF\x24\x00\x00\x00AVI LIST"),
            AudioFormat::Unknown
        );
    }

    #[test]
    fn test_content_types() {
        assert_eq!(AudioFormat::Wav.content_type(), "audio/wav");
        assert_eq!(AudioFormat::Mp3.content_type(), "audio/mpeg");
        // Unknown falls back to audio/mpeg, which the provider accepts most often
        assert_eq!(AudioFormat::Unknown.content_type(), "audio/mpeg");
    }

    #[test]
    fn test_extension() {
        assert_eq!(AudioFormat::Flac.extension(), Some("flac"));
        assert_eq!(AudioFormat::Unknown.extension(), None);
        assert_eq!(AudioFormat::Ogg.to_string(), "ogg");
        assert_eq!(AudioFormat::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_masquerade_detection() {
        assert_eq!(detect_masquerade(b"<?xml version=\"1.0\"?>"), Some("HTML/XML"));
        assert_eq!(detect_masquerade(b"<!DOCTYPE html>"), Some("HTML/XML"));
        assert_eq!(detect_masquerade(b"<html><body>"), Some("HTML/XML"));
        assert_eq!(detect_masquerade(b"{\"error\": \"denied\"}"), Some("JSON"));
        assert_eq!(detect_masquerade(b"[1, 2, 3]"), Some("JSON"));
        assert_eq!(detect_masquerade(b"RIFF1234WAVE"), None);
    }
}
