//! Audio seam. Playback itself lives outside the core.

/// Ambient sound control as the scene loader needs it: stop whatever the
/// previous scene left playing, start the new scene's ambient list.
pub trait SoundPlayer: Send + Sync {
    fn play(&self, sound_id: &str);
    fn stop_all(&self);
}

/// Silent player for headless and test use.
pub struct NullSoundPlayer;

impl SoundPlayer for NullSoundPlayer {
    fn play(&self, _sound_id: &str) {}
    fn stop_all(&self) {}
}
