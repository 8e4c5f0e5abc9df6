//! Speech playback
//!
//! Plays a synthesized WAV file through the default output device and blocks
//! until playback has finished, so the next recording never picks up the
//! assistant's own voice.

use crate::error::AudioError;
use rodio::{Decoder, OutputStream, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Play a WAV file to completion
pub fn play_wav(path: &Path, volume: f32) -> Result<(), AudioError> {
    let (_stream, stream_handle) = OutputStream::try_default()
        .map_err(|e| AudioError::Playback(format!("Failed to open audio output: {}", e)))?;

    let file = File::open(path)
        .map_err(|e| AudioError::Playback(format!("{}: {}", path.display(), e)))?;
    let source = Decoder::new(BufReader::new(file))
        .map_err(|e| AudioError::Playback(format!("Failed to decode audio: {}", e)))?;

    let sink = Sink::try_new(&stream_handle)
        .map_err(|e| AudioError::Playback(format!("Failed to create audio sink: {}", e)))?;

    sink.append(source.amplify(volume));
    sink.sleep_until_end();

    Ok(())
}
