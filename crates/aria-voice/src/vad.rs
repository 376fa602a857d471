//! **Voice Activity Detection** — one smoothed speech probability per frame.
//!
//! Two interchangeable backends behind the same interface: a pure-DSP energy
//! detector with exponential smoothing, and the WebRTC VAD model. Both are
//! fail-silent: an internal failure reports probability 0 so a broken frame
//! can never trigger a spurious turn.

use crate::error::{VoiceError, VoiceResult};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, warn};
use webrtc_vad::{SampleRate, Vad, VadMode};

/// Maps one decoded PCM frame to a speech probability in [0, 1].
///
/// Must be called in frame arrival order; the only mutable state is the
/// smoothing carried between calls. Implementations never block on IO.
pub trait VadEngine: Send {
    fn process(&mut self, frame: &[i16]) -> f32;
}

/// Which VAD backend a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadBackend {
    /// RMS energy against a threshold, exponentially smoothed.
    Energy,
    /// WebRTC VAD model; binary output mapped to {0.0, 1.0}, no smoothing.
    Model,
}

/// Configuration for VAD detection
#[derive(Debug, Clone)]
pub struct VadConfig {
    pub backend: VadBackend,
    /// RMS at which the energy detector saturates to raw probability 1.0.
    pub energy_threshold: f32,
    /// Exponential smoothing factor: `p = alpha * prev + (1 - alpha) * raw`.
    pub smoothing: f32,
    /// WebRTC VAD aggressiveness (0-3, where 3 is most aggressive).
    pub model_mode: u8,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            backend: VadBackend::Energy,
            energy_threshold: 500.0,
            smoothing: 0.7,
            model_mode: 3,
        }
    }
}

/// Build the configured backend for a session at the given wire rate.
pub fn build_vad(config: &VadConfig, sample_rate: u32) -> VoiceResult<Box<dyn VadEngine>> {
    match config.backend {
        VadBackend::Energy => Ok(Box::new(EnergyVad::new(
            config.energy_threshold,
            config.smoothing,
        ))),
        VadBackend::Model => Ok(Box::new(ModelVad::spawn(sample_rate, config.model_mode)?)),
    }
}

/// Energy detector: `raw = min(1, rms / threshold)`, then EMA smoothing.
pub struct EnergyVad {
    threshold: f32,
    alpha: f32,
    previous: f32,
}

impl EnergyVad {
    pub fn new(threshold: f32, alpha: f32) -> Self {
        Self {
            threshold: if threshold > 0.0 { threshold } else { 500.0 },
            alpha: alpha.clamp(0.0, 1.0),
            previous: 0.0,
        }
    }
}

impl VadEngine for EnergyVad {
    fn process(&mut self, frame: &[i16]) -> f32 {
        if frame.is_empty() {
            return 0.0;
        }
        let energy: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
        let rms = (energy / frame.len() as f64).sqrt() as f32;
        let raw = (rms / self.threshold).min(1.0);
        if !raw.is_finite() {
            return 0.0;
        }
        let smoothed = self.alpha * self.previous + (1.0 - self.alpha) * raw;
        self.previous = smoothed;
        smoothed
    }
}

/// WebRTC VAD on a dedicated worker thread.
///
/// The underlying `Vad` is not `Send`, so it lives on its own thread and the
/// session round-trips each frame over sync channels (the model is calibrated;
/// no smoothing is applied). The worker exits when the handle drops.
pub struct ModelVad {
    frame_tx: mpsc::Sender<Vec<i16>>,
    prob_rx: mpsc::Receiver<f32>,
}

impl ModelVad {
    pub fn spawn(sample_rate: u32, mode: u8) -> VoiceResult<Self> {
        let rate = match sample_rate {
            8000 => SampleRate::Rate8kHz,
            16000 => SampleRate::Rate16kHz,
            32000 => SampleRate::Rate32kHz,
            48000 => SampleRate::Rate48kHz,
            other => {
                return Err(VoiceError::Config(format!(
                    "WebRTC VAD supports 8000/16000/32000/48000 Hz, got {other}"
                )))
            }
        };
        let vad_mode = match mode {
            0 => VadMode::Quality,
            1 => VadMode::LowBitrate,
            2 => VadMode::Aggressive,
            _ => VadMode::VeryAggressive,
        };

        let (frame_tx, frame_rx) = mpsc::channel::<Vec<i16>>();
        let (prob_tx, prob_rx) = mpsc::channel::<f32>();

        thread::spawn(move || {
            let mut vad = Vad::new();
            vad.set_mode(vad_mode);
            vad.set_sample_rate(rate);
            debug!("model VAD worker started");
            while let Ok(frame) = frame_rx.recv() {
                let prob = match vad.is_voice_segment(&frame) {
                    Ok(true) => 1.0,
                    Ok(false) => 0.0,
                    Err(_) => 0.0,
                };
                if prob_tx.send(prob).is_err() {
                    break;
                }
            }
            debug!("model VAD worker stopped");
        });

        Ok(Self { frame_tx, prob_rx })
    }
}

impl VadEngine for ModelVad {
    fn process(&mut self, frame: &[i16]) -> f32 {
        if self.frame_tx.send(frame.to_vec()).is_err() {
            warn!("model VAD worker gone, reporting silence");
            return 0.0;
        }
        self.prob_rx.recv().unwrap_or(0.0)
    }
}
