//! **Cognition dispatcher** — STT → LLM → TTS for one utterance, streamed
//! into the outbound queue.
//!
//! Fire-and-forget: the ingest loop spawns one job per completed utterance and
//! only ever talks to it through the cancellation flag. A cancelled job drains
//! its remaining work into the void; a failed job returns the session to
//! LISTENING with nothing enqueued.

use crate::codec::{self, FrameAssembler, LinearResampler};
use crate::error::{VoiceError, VoiceResult};
use crate::llm::{ChatMessage, LlmService};
use crate::sentiment;
use crate::session::{Shared, WireProfile};
use crate::store::ConversationStore;
use crate::stt::SttService;
use crate::transport::{ServerEvent, TranscriptRole};
use crate::tts::TtsService;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The three cognition services plus the conversation store, shared by every
/// session on the server.
#[derive(Clone)]
pub struct Cognition {
    pub stt: Arc<dyn SttService>,
    pub llm: Arc<dyn LlmService>,
    pub tts: Arc<dyn TtsService>,
    pub store: Arc<dyn ConversationStore>,
}

/// Handle to an in-flight turn. At most one non-cancelled job exists per
/// session; starting another must cancel this one first.
pub struct CognitionJob {
    cancel: Arc<AtomicBool>,
    _handle: JoinHandle<()>,
}

impl CognitionJob {
    /// Cooperative cancel: flips the flag and returns immediately. The job
    /// observes it at each enqueue and after each external call.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Launch the pipeline for one utterance snapshot (PCM16LE at the wire rate).
pub(crate) fn spawn(shared: Shared, utterance: Vec<u8>) -> CognitionJob {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    let handle = tokio::spawn(async move {
        if let Err(e) = run_turn(&shared, utterance, &flag).await {
            warn!(error = %e, "turn failed");
            if !flag.load(Ordering::SeqCst) {
                settle_listening(&shared).await;
            }
        }
    });
    CognitionJob {
        cancel,
        _handle: handle,
    }
}

/// Failed or empty turn: fall back to LISTENING and tell the peer. Any frames
/// already queued for an aborted reply are discarded first.
async fn settle_listening(shared: &Shared) {
    let transition = shared.turn.lock().await.reset_to_listening();
    if let Some(t) = transition {
        if t.from == crate::turn::TurnState::Speaking {
            shared.queue.drain();
        }
        let _ = shared.send(ServerEvent::state(t.to)).await;
    }
}

async fn deadline<T>(
    limit: Duration,
    stage: &str,
    fut: impl Future<Output = VoiceResult<T>>,
) -> VoiceResult<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(VoiceError::ExternalService(format!(
            "{stage} deadline exceeded after {limit:?}"
        ))),
    }
}

async fn run_turn(shared: &Shared, utterance: Vec<u8>, cancel: &AtomicBool) -> VoiceResult<()> {
    let cfg = Arc::clone(&shared.config);
    let started = Instant::now();
    let rate = cfg.profile.sample_rate();

    // 1. STT
    let wav = codec::wav_from_pcm16(&utterance, rate);
    let text = deadline(
        cfg.stt_deadline,
        "STT",
        shared.services.stt.transcribe(wav, rate),
    )
    .await?;
    if cancel.load(Ordering::SeqCst) {
        return Ok(());
    }
    if text.trim().is_empty() {
        debug!("empty transcription, returning to listening");
        settle_listening(shared).await;
        return Ok(());
    }
    info!(user_id = shared.user_id, %text, "user turn transcribed");
    shared
        .send(ServerEvent::transcript(TranscriptRole::User, text.clone()))
        .await?;
    let polarity = sentiment::polarity(&text);

    // 2. LLM over recent history
    let mut messages = vec![ChatMessage::system(cfg.system_prompt.clone())];
    messages.extend(
        shared
            .services
            .store
            .read_history(shared.user_id, cfg.history_limit)
            .await?,
    );
    messages.push(ChatMessage::user(text.clone()));
    let reply = deadline(cfg.llm_deadline, "LLM", shared.services.llm.chat(&messages)).await?;
    if cancel.load(Ordering::SeqCst) {
        return Ok(());
    }
    info!(user_id = shared.user_id, %reply, "assistant reply");
    shared
        .send(ServerEvent::transcript(TranscriptRole::Ai, reply.clone()))
        .await?;

    let latency_ms = started.elapsed().as_millis() as u64;
    shared
        .services
        .store
        .append_turn(shared.user_id, "user", &text, Some(polarity), None)
        .await?;
    shared
        .services
        .store
        .append_turn(shared.user_id, "assistant", &reply, None, Some(latency_ms))
        .await?;

    // 3. TTS, decoded and framed for the wire
    let audio = deadline(
        cfg.tts_deadline,
        "TTS",
        shared.services.tts.synthesize(&reply, &cfg.voice),
    )
    .await?;
    if cancel.load(Ordering::SeqCst) {
        return Ok(());
    }
    let frames = outbound_frames(&audio, cfg.profile)?;
    if frames.is_empty() {
        settle_listening(shared).await;
        return Ok(());
    }

    // The SPEAKING announcement goes out strictly before the first media
    // frame can. A barge-in that already moved the session on wins the race.
    {
        let transition = shared.turn.lock().await.engage_speaking();
        match transition {
            Some(t) => shared.send(ServerEvent::state(t.to)).await?,
            None => return Ok(()),
        }
    }

    for frame in frames {
        if cancel.load(Ordering::SeqCst) {
            return Ok(());
        }
        if !shared.queue.push(frame, cancel).await {
            return Ok(());
        }
    }

    // Hold SPEAKING until the last frame has been paced out.
    shared.queue.wait_drained().await;
    tokio::time::sleep(cfg.profile.frame_duration(cfg.profile.outbound_frame_bytes())).await;
    if cancel.load(Ordering::SeqCst) {
        return Ok(());
    }
    let transition = shared.turn.lock().await.complete_speaking();
    if let Some(t) = transition {
        shared.send(ServerEvent::state(t.to)).await?;
    }
    Ok(())
}

/// Decode the TTS container, resample to the wire rate, encode per profile,
/// and cut into whole frames (residual zero-padded).
fn outbound_frames(container: &[u8], profile: WireProfile) -> VoiceResult<Vec<Vec<u8>>> {
    if container.is_empty() {
        return Ok(Vec::new());
    }
    let (pcm, source_rate) = codec::decode_container(container)?;
    let mut resampler = LinearResampler::new(source_rate, profile.sample_rate())?;
    let samples = resampler.process(&pcm);
    let bytes = profile.encode_pcm(&samples);

    let mut assembler = FrameAssembler::new(profile.outbound_frame_bytes());
    let mut frames = assembler.push(&bytes);
    if let Some(last) = assembler.flush() {
        frames.push(last);
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_frames_from_wav_are_whole() {
        // 0.5 s of silence at 16 kHz into the telephony profile: resampled to
        // 8 kHz mu-law and framed at 160 bytes.
        let pcm = vec![0u8; 16000];
        let wav = codec::wav_from_pcm16(&pcm, 16000);
        let frames = outbound_frames(&wav, WireProfile::Telephony).unwrap();
        assert!(!frames.is_empty());
        assert!(frames.iter().all(|f| f.len() == 160));
        // Mu-law silence is 0xFF.
        assert!(frames[0].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn outbound_frames_web_profile_chunks_200ms() {
        let pcm = vec![0u8; 32000]; // 1 s at 16 kHz
        let wav = codec::wav_from_pcm16(&pcm, 16000);
        let frames = outbound_frames(&wav, WireProfile::Web).unwrap();
        assert_eq!(frames.len(), 5);
        assert!(frames.iter().all(|f| f.len() == 6400));
    }

    #[test]
    fn empty_container_produces_no_frames() {
        assert!(outbound_frames(&[], WireProfile::Web).unwrap().is_empty());
    }

    #[test]
    fn garbage_container_is_a_codec_error() {
        let err = outbound_frames(&[1, 2, 3, 4], WireProfile::Web).unwrap_err();
        assert!(matches!(err, VoiceError::Codec(_)));
    }
}
