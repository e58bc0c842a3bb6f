pub mod capture;
pub mod file;
pub mod format;
pub mod header;
pub mod normalize;
pub mod sink;
pub mod source;

pub use capture::{run_capture_loop, CaptureConfig, CaptureHandle, CaptureReport};
pub use file::AudioFile;
pub use format::{PcmFormat, DEFAULT_SAMPLE_RATE, MAX_SAMPLE_RATE};
pub use header::{prepend_header, WavHeader, HEADER_LEN};
pub use normalize::{normalize_file, normalize_samples, NormalizeOutcome};
pub use sink::{file_sink_opener, PcmSink, SampleSink, SinkOpener};
pub use source::{
    open_source, AudioSource, MemorySource, PcmFileSource, ToneSource, WavFileSource,
};
