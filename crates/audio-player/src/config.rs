use std::time::Duration;

/// How many times the stream is played before the session finishes on its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RepeatMode {
    /// Play once; end of stream ends the session.
    #[default]
    Once,
    /// Play once plus `n` repeats.
    Times(u32),
    /// Loop until the user quits.
    Forever,
}

/// Playback tuning parameters shared by the engine, input controller and reporter.
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    /// Starting gain exponent (`0.0` is unity gain).
    pub initial_volume: f64,
    /// Base of the gain curve: gain = `volume_base ^ volume`.
    pub volume_base: f64,
    /// Gain exponent change per volume key.
    pub volume_step: f64,
    /// Arrow seeks move by `length / seek_divisor` frames.
    pub seek_divisor: usize,
    pub repeat: RepeatMode,
    /// Progress bar redraw cadence.
    pub status_interval: Duration,
    /// Target output buffer duration handed to the sink.
    pub buffer_seconds: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            initial_volume: 0.0,
            volume_base: 2.0,
            volume_step: 0.1,
            seek_divisor: 10,
            repeat: RepeatMode::Once,
            status_interval: Duration::from_secs(1),
            buffer_seconds: 0.1,
        }
    }
}
