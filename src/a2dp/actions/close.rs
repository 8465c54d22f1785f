//! Teardown and control block reset

use super::{Context, start};
use crate::a2dp::event::{Notification, SsmEvent};
use crate::a2dp::scb::{CollisionMask, RoleFlags, WaitMask};
use crate::a2dp::timer::TimerId;
use crate::a2dp::AvStatus;

/// `ApiClose` on a live stream: stop media, then close the stream
pub(super) fn do_close(ctx: &mut Context<'_, '_>) {
    let handle = ctx.scb.handle;
    if ctx.scb.started {
        start::stop_stream(ctx, false, false);
        ctx.scb.started = false;
    }
    ctx.scb.media_queue.clear();
    ctx.collab.transport.flush(handle);

    info!("[SSM] stream {} closing", handle);
    if ctx.collab.transport.close(handle).is_err() {
        disconnect_req(ctx);
        return;
    }
    ctx.start_timer(TimerId::CloseGuard, ctx.options.close_guard_ms);
}

/// Drop the signalling channel
pub(super) fn disconnect_req(ctx: &mut Context<'_, '_>) {
    ctx.cancel_timer(TimerId::CloseGuard);
    debug!("[SSM] stream {} disconnecting", ctx.scb.handle);
    if ctx.collab.transport.disconnect(ctx.scb.peer).is_err() {
        ctx.raise(SsmEvent::AvdtDisconnect);
    }
}

/// The stream is gone: report the outcome and reset
pub(super) fn stream_closed(ctx: &mut Context<'_, '_>) {
    let handle = ctx.scb.handle;
    if ctx.scb.open_status.is_success() {
        if ctx.scb.codec_started {
            start::stop_stream(ctx, false, false);
        }
        ctx.collab.codec.close(handle);
        info!("[SSM] stream {} closed", handle);
        ctx.notify(Notification::Closed { handle });
    } else {
        let (peer, status) = (ctx.scb.peer, ctx.scb.open_status);
        ctx.scb.open_status = AvStatus::Success;
        ctx.notify(Notification::Opened {
            handle,
            peer,
            status,
            starting: false,
        });
    }
    cleanup(ctx);
}

/// Reset the control block to its idle shape
pub(super) fn cleanup(ctx: &mut Context<'_, '_>) {
    start::stop_media(ctx);
    let scb = &mut *ctx.scb;
    scb.open_status = AvStatus::Success;
    scb.started = false;
    scb.congested = false;
    scb.role = RoleFlags::NONE;
    scb.wait = WaitMask::NONE;
    scb.coll = CollisionMask::NONE;
    scb.queued = None;
    scb.open_api = None;
    scb.num_disc_sinks = 0;
    scb.num_recfg = 0;
    scb.rcfg_restart = false;
    scb.media_queue.clear();
    trace!("[SSM] stream {} cleaned up", scb.handle);

    for id in TimerId::ALL {
        ctx.cancel_timer(id);
    }
    ctx.release_discovery();

    if let Some(request) = ctx.scb.queued_open.take() {
        debug!("[SSM] stream {} replaying queued open", ctx.scb.handle);
        ctx.raise(SsmEvent::ApiOpen {
            peer: request.peer,
            use_rc: request.use_rc,
        });
    }
}
