//! Media data path
//!
//! Pulls encoded frames from the codec callout and writes them to the
//! transport while the stream is started and not offloaded. One invocation
//! issues at most one frame, so control always returns to the dispatcher
//! between attempts.
//!
//! Before writing, the transport's own queue depth is checked on every
//! invocation and the result is kept as the stream's congestion flag. When
//! it is at or above the configured threshold the frame is parked in the
//! stream's pending queue instead; the queue keeps the freshest frames and
//! drops the oldest.

use super::A2dpError;
use super::StreamHandle;
use super::actions::Context;
use super::transport::StreamTransport;
use crate::constants::MAX_MEDIA_FRAME_LEN;
use heapless::Vec;

/// One encoded media frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MediaFrame {
    /// Encoded payload (without media header)
    pub payload: Vec<u8, MAX_MEDIA_FRAME_LEN>,
    /// RTP timestamp
    pub timestamp: u32,
}

impl MediaFrame {
    /// Copy a payload into a frame
    ///
    /// # Errors
    /// Returns [`A2dpError::QueueFull`] if the payload exceeds the frame capacity
    pub fn new(payload: &[u8], timestamp: u32) -> Result<Self, A2dpError> {
        let payload = Vec::from_slice(payload).map_err(|()| A2dpError::QueueFull)?;
        Ok(Self { payload, timestamp })
    }
}

/// Write `frame` split into fragments of at most `mtu` octets.
///
/// Only the final fragment of a fragmented frame carries the marker bit; an
/// unfragmented frame carries it when `marker_bit` is set. Returns the
/// number of fragments written.
///
/// # Errors
/// Returns the first transport error; later fragments are not written
pub fn write_fragments(
    transport: &mut dyn StreamTransport,
    handle: StreamHandle,
    frame: &MediaFrame,
    mtu: u16,
    marker_bit: bool,
) -> Result<usize, A2dpError> {
    if frame.payload.is_empty() {
        return Ok(0);
    }
    let chunk_len = if mtu == 0 {
        frame.payload.len()
    } else {
        usize::from(mtu)
    };
    let count = frame.payload.len().div_ceil(chunk_len);

    for (index, fragment) in frame.payload.chunks(chunk_len).enumerate() {
        let marker = if count > 1 {
            index + 1 == count
        } else {
            marker_bit
        };
        transport.write(handle, fragment, frame.timestamp, marker)?;
    }
    Ok(count)
}

/// Run the data path once for the stream in `ctx`
pub(crate) fn forward(ctx: &mut Context<'_, '_>) {
    let handle = ctx.scb.handle;
    if !ctx.scb.started || ctx.scb.offload_active {
        trace!(
            "[DATA] stream {} idle (started={}, offload={})",
            handle,
            ctx.scb.started,
            ctx.scb.offload_active
        );
        return;
    }

    let limit = ctx.options.pending_frame_limit();
    ctx.scb.congested =
        ctx.collab.transport.queued_buffers(handle) >= ctx.options.queue_check_threshold;
    if ctx.scb.congested {
        if let Some(frame) = ctx.collab.codec.data(handle) {
            ctx.outbox.fanout = Some(frame.clone());
            if ctx.scb.enqueue_frame(frame, limit) {
                warn!("[DATA] stream {} transport full, dropped oldest frame", handle);
                ctx.collab.codec.frame_dropped(handle);
            }
        }
        return;
    }

    let frame = match ctx.scb.media_queue.pop_front() {
        Some(frame) => frame,
        None => match ctx.collab.codec.data(handle) {
            Some(frame) => {
                ctx.outbox.fanout = Some(frame.clone());
                frame
            }
            None => return,
        },
    };

    match write_fragments(
        &mut *ctx.collab.transport,
        handle,
        &frame,
        ctx.scb.stream_mtu,
        ctx.options.rtp_marker_bit,
    ) {
        Ok(fragments) => {
            trace!("[DATA] stream {} wrote {} fragment(s)", handle, fragments);
        }
        Err(_) => {
            warn!("[DATA] stream {} write failed, frame dropped", handle);
            ctx.collab.codec.frame_dropped(handle);
        }
    }
}
