use thiserror::Error;

/// Main error type for the transcoding pipelines
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// An error reported by a codec engine or resampler
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The sample rate has no entry in the framing tables
    #[error("Unsupported sample rate: {0} Hz")]
    UnsupportedSampleRate(u32),

    /// Only mono and stereo are supported
    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(u16),

    /// A sample format the pipeline cannot convert
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// The ADTS frame length field is 13 bits wide
    #[error("Frame of {0} bytes does not fit the 13-bit ADTS length field")]
    FrameTooLarge(usize),

    /// Invalid pipeline or driver configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The pipeline was finished and accepts no more input
    #[error("Pipeline is closed")]
    PipelineClosed,
}

impl TranscodeError {
    /// True when the codec engine refused a frame or packet.
    ///
    /// Rejections leave the pipeline usable; the caller decides whether to
    /// submit again.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TranscodeError::Codec(CodecError::SendFrame(_) | CodecError::SendPacket(_))
        )
    }
}

/// Codec engine and resampler errors
#[derive(Error, Debug)]
pub enum CodecError {
    /// Failure during global codec library initialization
    #[error("Codec library initialization failed: {0}")]
    InitFailed(String),

    /// The requested encoder is not available
    #[error("Failed to find encoder: {0}")]
    EncoderNotFound(String),

    /// The requested decoder is not available
    #[error("Failed to find decoder: {0}")]
    DecoderNotFound(String),

    /// Failure configuring or opening an encoder context
    #[error("Failed to open encoder: {0}")]
    EncoderOpen(String),

    /// Failure configuring or opening a decoder context
    #[error("Failed to open decoder: {0}")]
    DecoderOpen(String),

    /// Failure allocating a frame or packet buffer
    #[error("Failed to allocate buffer: {0}")]
    Alloc(String),

    /// Failure creating an audio resampler
    #[error("Failed to create resampler: {0}")]
    ResamplerCreate(String),

    /// Failure converting one buffer of samples
    #[error("Resampling error: {0}")]
    Resample(String),

    /// The encoder refused a frame
    #[error("Encoder rejected frame: {0}")]
    SendFrame(String),

    /// Failure pulling a packet out of the encoder
    #[error("Failed to receive packet: {0}")]
    ReceivePacket(String),

    /// The decoder refused a packet
    #[error("Decoder rejected packet: {0}")]
    SendPacket(String),

    /// Failure pulling a frame out of the decoder
    #[error("Failed to receive frame: {0}")]
    ReceiveFrame(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TranscodeError>;
