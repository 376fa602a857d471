//! **Ingest loop** — transport reader, VAD feed, turn effects.
//!
//! One message at a time: decode the media payload, run VAD, advance the turn
//! machine, then act on whatever transition fired. Malformed messages are
//! logged and skipped; a transport failure ends the session. This task is the
//! only writer of the utterance buffer and the only one that spawns or cancels
//! cognition jobs.

use crate::codec;
use crate::cognition::{self, CognitionJob};
use crate::error::VoiceResult;
use crate::session::Shared;
use crate::transport::{parse_peer_event, PeerEvent, ServerEvent, Transport};
use crate::turn::{TurnState, Transition};
use crate::vad::VadEngine;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::{debug, warn};

pub(crate) async fn run<T: Transport>(
    transport: &mut T,
    shared: Shared,
    mut vad: Box<dyn VadEngine>,
) -> VoiceResult<()> {
    let mut utterance: Vec<u8> = Vec::new();
    let mut job: Option<CognitionJob> = None;

    let result = loop {
        let text = match transport.recv_text().await {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!("peer closed the transport");
                break Ok(());
            }
            Err(e) => break Err(e),
        };

        let event = match parse_peer_event(&text) {
            Ok(ev) => ev,
            Err(e) => {
                warn!(error = %e, "skipping malformed message");
                continue;
            }
        };
        let media = match event {
            PeerEvent::Media { media } => media,
            // Session metadata and keepalives are accepted and ignored.
            PeerEvent::Other => continue,
        };
        let raw = match BASE64.decode(media.payload.as_bytes()) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "skipping frame with bad base64");
                continue;
            }
        };
        let pcm = match shared.config.profile.decode_frame(&raw) {
            Ok(pcm) => pcm,
            Err(e) => {
                warn!(error = %e, "skipping undecodable frame");
                continue;
            }
        };

        let probability = vad.process(&pcm);
        let transition = shared.turn.lock().await.process_vad_frame(probability);

        if let Some(t) = transition {
            if let Err(e) = apply_transition(&shared, t, &mut utterance, &mut job).await {
                break Err(e);
            }
        }

        // While the caller is speaking, accumulate the decoded PCM for STT.
        if shared.turn.lock().await.state() == TurnState::Receiving {
            utterance.extend_from_slice(&codec::pcm_to_le_bytes(&pcm));
        }
    };

    // Session teardown: whatever is in flight is cancelled and dropped.
    if let Some(job) = job.take() {
        job.cancel();
    }
    utterance.clear();
    result
}

async fn apply_transition(
    shared: &Shared,
    t: Transition,
    utterance: &mut Vec<u8>,
    job: &mut Option<CognitionJob>,
) -> VoiceResult<()> {
    match (t.from, t.to) {
        // Barge-in (from SPEAKING) or a restart while the pipeline was still
        // thinking: kill the job, flush both playback paths, open a new
        // utterance. `clear` must precede the state announcement so the peer
        // can attribute everything after it to the new turn.
        (TurnState::Speaking | TurnState::Thinking, TurnState::Receiving) => {
            if let Some(job) = job.take() {
                job.cancel();
            }
            shared.queue.drain();
            utterance.clear();
            shared.send(ServerEvent::Clear).await?;
            shared.send(ServerEvent::state(t.to)).await?;
            debug!("barge-in: cognition cancelled, queue drained");
        }
        (TurnState::Listening, TurnState::Receiving) => {
            utterance.clear();
            shared.send(ServerEvent::state(t.to)).await?;
        }
        // End of utterance: announce THINKING, then hand the snapshot to a
        // fresh cognition job. The announcement goes first so nothing the job
        // emits can precede it on the wire.
        (_, TurnState::Thinking) => {
            if let Some(job) = job.take() {
                job.cancel();
            }
            shared.send(ServerEvent::state(t.to)).await?;
            let snapshot = std::mem::take(utterance);
            debug!(bytes = snapshot.len(), "utterance complete, dispatching");
            *job = Some(cognition::spawn(shared.clone(), snapshot));
        }
        _ => {
            shared.send(ServerEvent::state(t.to)).await?;
        }
    }
    Ok(())
}
