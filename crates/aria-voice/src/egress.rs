//! **Egress loop** — the sole writer of outbound media, paced at frame cadence.
//!
//! Pops frames from the outbound queue and writes one per frame duration,
//! sleeping the remainder of each period after the send. A temporarily empty
//! queue parks on the queue, not the clock, so cadence resumes cleanly when
//! audio returns. On barge-in the ingest task drains the queue; any frame
//! already popped is discarded by the epoch check so nothing stale follows a
//! `clear`.

use crate::queue::OutboundQueue;
use crate::session::WireProfile;
use crate::transport::ServerEvent;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

pub(crate) async fn run(
    queue: Arc<OutboundQueue>,
    events: mpsc::Sender<ServerEvent>,
    profile: WireProfile,
) {
    while let Some((frame, epoch)) = queue.pop().await {
        let started = Instant::now();
        let pace = profile.frame_duration(frame.len());
        let payload = BASE64.encode(&frame);

        // Reserve first, then check the epoch and send without yielding in
        // between: a frame popped before a drain can never land after the
        // drain's `clear` message.
        let Ok(permit) = events.reserve().await else {
            debug!("event writer closed; egress exiting");
            break;
        };
        if queue.epoch() != epoch {
            continue;
        }
        permit.send(ServerEvent::media(payload));

        let elapsed = started.elapsed();
        if elapsed < pace {
            tokio::time::sleep(pace - elapsed).await;
        }
    }
    debug!("egress loop finished");
}
