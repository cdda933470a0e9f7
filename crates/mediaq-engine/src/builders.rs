//! Convenience builders translating high-level media requests into
//! job specs with ffmpeg-compatible command lines.
//!
//! These only build a [`JobSpec`]; submission goes through the engine.

use std::time::Duration;

use mediaq_models::{JobPriority, JobSpec};

/// External tool invoked for both transcodes and thumbnails.
pub const FFMPEG_BIN: &str = "ffmpeg";

/// Builder for a transcode job.
#[derive(Debug, Clone)]
pub struct TranscodeRequest {
    input: String,
    output: String,
    video_codec: String,
    audio_codec: String,
    crf: Option<u8>,
    preset: Option<String>,
    audio_bitrate: Option<String>,
    priority: JobPriority,
    timeout: Duration,
}

impl TranscodeRequest {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            crf: None,
            preset: None,
            audio_bitrate: None,
            priority: JobPriority::Normal,
            timeout: Duration::from_secs(3600),
        }
    }

    /// Set video codec.
    pub fn video_codec(mut self, codec: impl Into<String>) -> Self {
        self.video_codec = codec.into();
        self
    }

    /// Set audio codec.
    pub fn audio_codec(mut self, codec: impl Into<String>) -> Self {
        self.audio_codec = codec.into();
        self
    }

    /// Set CRF (quality).
    pub fn crf(mut self, crf: u8) -> Self {
        self.crf = Some(crf);
        self
    }

    /// Set encoder preset.
    pub fn preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.audio_bitrate = Some(bitrate.into());
        self
    }

    /// Set scheduling priority.
    pub fn priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set execution timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the job spec.
    pub fn into_spec(self) -> JobSpec {
        let mut args = vec![
            FFMPEG_BIN.to_string(),
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-i".to_string(),
            self.input.clone(),
            "-c:v".to_string(),
            self.video_codec,
        ];
        if let Some(crf) = self.crf {
            args.push("-crf".to_string());
            args.push(crf.to_string());
        }
        if let Some(preset) = self.preset {
            args.push("-preset".to_string());
            args.push(preset);
        }
        args.push("-c:a".to_string());
        args.push(self.audio_codec);
        if let Some(bitrate) = self.audio_bitrate {
            args.push("-b:a".to_string());
            args.push(bitrate);
        }
        args.push(self.output.clone());

        JobSpec::new("transcode", self.input, self.output, args)
            .with_priority(self.priority)
            .with_timeout(self.timeout)
    }
}

/// Builder for a single-frame thumbnail extraction job.
#[derive(Debug, Clone)]
pub struct ThumbnailRequest {
    input: String,
    output: String,
    timestamp_secs: f64,
    width: Option<u32>,
    priority: JobPriority,
    timeout: Duration,
}

impl ThumbnailRequest {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            timestamp_secs: 0.0,
            width: None,
            priority: JobPriority::Normal,
            timeout: Duration::from_secs(60),
        }
    }

    /// Seek position of the extracted frame.
    pub fn at(mut self, timestamp_secs: f64) -> Self {
        self.timestamp_secs = timestamp_secs;
        self
    }

    /// Scale the frame to this width, keeping aspect ratio.
    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    /// Set scheduling priority.
    pub fn priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set execution timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the job spec.
    pub fn into_spec(self) -> JobSpec {
        let mut args = vec![
            FFMPEG_BIN.to_string(),
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-ss".to_string(),
            format!("{:.3}", self.timestamp_secs),
            "-i".to_string(),
            self.input.clone(),
            "-vframes".to_string(),
            "1".to_string(),
        ];
        if let Some(width) = self.width {
            args.push("-vf".to_string());
            args.push(format!("scale={width}:-1"));
        }
        args.push(self.output.clone());

        JobSpec::new("thumbnail", self.input, self.output, args)
            .with_priority(self.priority)
            .with_timeout(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcode_builder() {
        let spec = TranscodeRequest::new("input.mp4", "output.mp4")
            .crf(18)
            .preset("fast")
            .priority(JobPriority::High)
            .into_spec();

        assert_eq!(spec.kind, "transcode");
        assert_eq!(spec.priority, JobPriority::High);
        assert_eq!(spec.command_args[0], FFMPEG_BIN);
        assert!(spec.command_args.contains(&"-c:v".to_string()));
        assert!(spec.command_args.contains(&"libx264".to_string()));
        assert!(spec.command_args.contains(&"-crf".to_string()));
        assert!(spec.command_args.contains(&"18".to_string()));
        assert_eq!(spec.command_args.last(), Some(&"output.mp4".to_string()));
    }

    #[test]
    fn test_thumbnail_builder() {
        let spec = ThumbnailRequest::new("input.mp4", "thumb.jpg")
            .at(12.5)
            .width(320)
            .into_spec();

        assert_eq!(spec.kind, "thumbnail");
        assert!(spec.command_args.contains(&"-ss".to_string()));
        assert!(spec.command_args.contains(&"12.500".to_string()));
        assert!(spec.command_args.contains(&"-vframes".to_string()));
        assert!(spec.command_args.contains(&"scale=320:-1".to_string()));
    }
}
