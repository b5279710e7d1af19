use std::path::PathBuf;

use tower_http::services::ServeDir;

/// Static files from the audio directory (`podcast_<ts>.mp3`, transcripts).
pub fn service(audio_dir: PathBuf) -> ServeDir {
    ServeDir::new(audio_dir)
}
