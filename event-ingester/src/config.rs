use std::str::FromStr;
use std::sync::Arc;
use std::time;

use envconfig::Envconfig;
use health::HealthHandle;

use crate::compress::{Compressor, NoOpCompressor, ZlibCompressor};
use crate::converter::MessageRowConverter;
use crate::error::ConfigError;
use crate::stage::ConversionStage;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    /// Capacity of the stage output channel, in batches.
    #[envconfig(default = "100")]
    pub buffer_size: usize,

    #[envconfig(default = "zlib")]
    pub compression: CompressionCodec,

    #[envconfig(default = "6")]
    pub compression_level: u32,

    /// 0 disables the systemic failure check.
    #[envconfig(default = "100")]
    pub max_consecutive_failures: usize,

    #[envconfig(default = "30000")]
    pub liveness_deadline: EnvMsDuration,

    #[envconfig(default = "5000")]
    pub heartbeat_interval: EnvMsDuration,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compression_level > 9 {
            return Err(ConfigError::InvalidCompressionLevel(self.compression_level));
        }
        if self.heartbeat_interval.0 >= self.liveness_deadline.0 {
            return Err(ConfigError::HeartbeatTooSlow);
        }
        self.liveness_deadline()?;
        Ok(())
    }

    pub fn compressor(&self) -> Arc<dyn Compressor> {
        match self.compression {
            CompressionCodec::None => Arc::new(NoOpCompressor),
            CompressionCodec::Zlib => Arc::new(ZlibCompressor::new(self.compression_level)),
        }
    }

    pub fn converter(&self) -> MessageRowConverter {
        MessageRowConverter::new(self.compressor())
            .with_max_consecutive_failures(self.max_consecutive_failures)
    }

    pub fn stage(&self, liveness: Option<HealthHandle>) -> ConversionStage {
        let stage = ConversionStage::new(self.converter(), self.buffer_size);
        match liveness {
            Some(handle) => stage.with_liveness(handle, self.heartbeat_interval.0),
            None => stage,
        }
    }

    /// Deadline to register the stage with, in the unit the health registry expects.
    pub fn liveness_deadline(&self) -> Result<::time::Duration, ConfigError> {
        ::time::Duration::try_from(self.liveness_deadline.0)
            .map_err(|_| ConfigError::LivenessDeadlineOutOfRange)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionCodec {
    None,
    Zlib,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseCompressionCodecError(String);

impl std::fmt::Display for ParseCompressionCodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "unknown compression codec {}, must be none or zlib", self.0)
    }
}

impl FromStr for CompressionCodec {
    type Err = ParseCompressionCodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_ref() {
            "none" => Ok(CompressionCodec::None),
            "zlib" => Ok(CompressionCodec::Zlib),
            _ => Err(ParseCompressionCodecError(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl std::fmt::Display for ParseEnvMsDurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("duration must be a whole number of milliseconds")
    }
}

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}
