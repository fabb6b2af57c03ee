//! MP4 output through the system `ffmpeg` binary.

pub(crate) mod ffmpeg;
