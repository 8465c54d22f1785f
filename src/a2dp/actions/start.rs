//! Open stream: start, stop, suspend, remote control, delay reports and
//! hardware offload.

use super::Context;
use crate::a2dp::event::{Notification, SsmEvent};
use crate::a2dp::offload::OffloadParams;
use crate::a2dp::scb::{QueueTag, RoleFlags, WaitMask};
use crate::a2dp::ssm::StreamState;
use crate::a2dp::timer::TimerId;
use crate::a2dp::{AvStatus, AvdtpErrorCode};
use crate::constants::AVDT_MEDIA_HDR_SIZE;

/// `StrOpenOk`: the stream is established
pub(super) fn stream_opened(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let SsmEvent::StrOpenOk { peer_mtu } = event else {
        return;
    };
    let handle = ctx.scb.handle;
    // congested until the first start clears it
    ctx.scb.congested = true;
    ctx.scb.offload_pending = false;
    ctx.scb.coll = crate::a2dp::CollisionMask::NONE;
    ctx.scb.num_recfg = 0;
    ctx.scb.queued_open = None;
    if let Some(mtu) = peer_mtu {
        ctx.scb.stream_mtu = mtu.saturating_sub(AVDT_MEDIA_HDR_SIZE);
    }
    ctx.collab.codec.open(handle, ctx.scb.stream_mtu);

    let acceptor = ctx.scb.role.contains(RoleFlags::ACCEPTOR);
    let starting = ctx.peers.others_streaming && (!acceptor || ctx.options.acceptor_start);
    info!(
        "[START] stream {} open, mtu {}, starting {}",
        handle, ctx.scb.stream_mtu, starting
    );
    let peer = ctx.scb.peer;
    ctx.notify(Notification::Opened {
        handle,
        peer,
        status: AvStatus::Success,
        starting,
    });
    if starting {
        ctx.raise(SsmEvent::ApiStart);
    }
}

/// Arm the remote control timer, or defer it behind a role switch
pub(super) fn rc_timer(ctx: &mut Context<'_, '_>) {
    if !ctx.scb.use_rc && !ctx.scb.role.contains(RoleFlags::ACCEPTOR) {
        return;
    }
    if ctx.scb.wait.intersects(WaitMask::ROLE_SW_BITS) {
        ctx.scb.wait.insert(WaitMask::CHECK_RC);
    } else {
        ctx.start_timer(TimerId::RcDiscovery, ctx.options.rc_discovery_delay_ms);
    }
}

/// `AvrcTimer` while open
pub(super) fn open_rc(ctx: &mut Context<'_, '_>) {
    if ctx.scb.queued == Some(QueueTag::Start) && ctx.scb.wait.intersects(WaitMask::ROLE_SW_BITS) {
        ctx.scb.wait.remove(WaitMask::ROLE_SW_BITS);
        ctx.scb.queued = None;
        let peer = ctx.scb.peer;
        if ctx.collab.link.role_ok(peer, ctx.options.prefer_master) {
            start_ok(ctx);
        } else {
            fail_role_start(ctx);
        }
        return;
    }

    if ctx.scb.use_rc || ctx.scb.role.contains(RoleFlags::ACCEPTOR) {
        let (handle, peer) = (ctx.scb.handle, ctx.scb.peer);
        ctx.notify(Notification::RemoteControlRequested { handle, peer });
    }
}

pub(super) fn delay_report(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    if let SsmEvent::DelayReport { delay } = event {
        ctx.collab.codec.delay(ctx.scb.handle, *delay);
    }
}

/// True when the link role is acceptable; otherwise a switch may be started
fn check_role(ctx: &mut Context<'_, '_>) -> bool {
    let peer = ctx.scb.peer;
    if ctx.collab.link.role_ok(peer, ctx.options.prefer_master) {
        return true;
    }
    if ctx.collab.link.switch_if_needed(peer) {
        ctx.scb.wait.insert(WaitMask::ROLE_SW_RES_START);
    }
    false
}

/// `ApiStart`
pub(super) fn do_start(ctx: &mut Context<'_, '_>) {
    let handle = ctx.scb.handle;
    if ctx.collab.link.sco_busy() {
        warn!("[START] stream {} start refused, voice call active", handle);
        ctx.notify(Notification::Started {
            handle,
            status: AvStatus::FailResources,
            initiator: true,
            suspending: false,
        });
        return;
    }

    if ctx.scb.started {
        ctx.scb.role.insert(RoleFlags::START_INT);
        if !ctx.scb.wait.is_empty() {
            warn!("[START] stream {} already starting", handle);
            ctx.notify_start_failed(AvStatus::FailResources);
        } else if ctx.scb.role.contains(RoleFlags::SUSPEND) {
            ctx.notify_start_failed(AvStatus::Fail);
        } else {
            start_ok(ctx);
        }
        return;
    }

    if ctx.scb.role.contains(RoleFlags::START_INT) {
        debug!("[START] stream {} start already in flight", handle);
        return;
    }

    ctx.scb.role.insert(RoleFlags::START_INT);
    if !check_role(ctx) {
        ctx.scb.queued = Some(QueueTag::Start);
    }
    if ctx.collab.transport.start(&[handle]).is_err() {
        ctx.raise(SsmEvent::StrStartFail {
            error: AvdtpErrorCode::BAD_STATE,
        });
    }
}

/// The stream is started at the transport level
pub(super) fn start_ok(ctx: &mut Context<'_, '_>) {
    let handle = ctx.scb.handle;
    ctx.scb.started = true;
    let initiator = ctx.scb.role.contains(RoleFlags::START_INT);

    if ctx.scb.wait.contains(WaitMask::ROLE_SW_FAILED) {
        ctx.scb.wait.remove(WaitMask::ROLE_SW_BITS);
        ctx.scb.queued = None;
        fail_role_start(ctx);
        return;
    }

    if check_role(ctx) {
        ctx.scb.wait.remove(WaitMask::ROLE_SW_BITS);
    } else {
        ctx.scb.queued = Some(QueueTag::Start);
    }

    let role_switch_pending = WaitMask::ROLE_SW_RES_OPEN.union(WaitMask::ROLE_SW_RES_START);
    if ctx.scb.wait.intersects(role_switch_pending) {
        debug!("[START] stream {} started, waiting for role switch", handle);
        ctx.scb.wait.insert(WaitMask::ROLE_SW_STARTED);
        ctx.scb.queued = Some(QueueTag::Start);
        ctx.start_timer(TimerId::RcDiscovery, ctx.options.rc_discovery_delay_ms);
        return;
    }
    if ctx.scb.wait.contains(WaitMask::ACP_CAPS_ON) {
        debug!(
            "[START] stream {} started, waiting for peer capabilities",
            handle
        );
        ctx.scb.wait.insert(WaitMask::ACP_CAPS_STARTED);
        return;
    }

    ctx.scb.congested = false;
    ctx.scb.queued = None;
    let suspending = !initiator
        && ctx.scb.role.contains(RoleFlags::ACCEPTOR)
        && ctx.scb.role.contains(RoleFlags::SUSPEND_OPT);
    ctx.scb.role.remove(
        RoleFlags::START_INT
            .union(RoleFlags::ACCEPTOR)
            .union(RoleFlags::SUSPEND_OPT),
    );

    if !ctx.scb.codec_started {
        ctx.collab.codec.start(handle, &ctx.scb.config);
        ctx.scb.codec_started = true;
    }
    info!(
        "[START] stream {} started (initiator {}, suspending {})",
        handle, initiator, suspending
    );
    ctx.notify(Notification::Started {
        handle,
        status: AvStatus::Success,
        initiator,
        suspending,
    });

    if suspending {
        ctx.scb.role.insert(RoleFlags::SUSPEND);
        ctx.scb.congested = true;
        ctx.raise(SsmEvent::ApiStop {
            suspend: true,
            flush: false,
        });
    }
}

/// Report a start that failed on the link role
pub(super) fn fail_role_start(ctx: &mut Context<'_, '_>) {
    let handle = ctx.scb.handle;
    let initiator = ctx.scb.role.contains(RoleFlags::START_INT);
    ctx.scb.role.remove(RoleFlags::START_INT);
    error!("[START] stream {} start failed on role switch", handle);
    ctx.notify(Notification::Started {
        handle,
        status: AvStatus::FailRole,
        initiator,
        suspending: false,
    });
}

/// `StrStartFail`
pub(super) fn start_failed(ctx: &mut Context<'_, '_>) {
    if !ctx.scb.started && !ctx.scb.codec_started {
        warn!("[START] stream {} start failed", ctx.scb.handle);
        ctx.scb.queued = None;
        ctx.notify_start_failed(AvStatus::Fail);
    }
}

/// `ApiStop`
pub(super) fn stream_stopped(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let (suspend, flush) = match event {
        SsmEvent::ApiStop { suspend, flush } => (*suspend, *flush),
        _ => (false, false),
    };
    stop_stream(ctx, suspend, flush);
}

/// Stop offload and the codec
pub(super) fn stop_media(ctx: &mut Context<'_, '_>) {
    if ctx.scb.offload_active || ctx.scb.offload_pending {
        debug!("[OFFLOAD] stream {} stopping offload", ctx.scb.handle);
        ctx.collab.offload.stop();
        ctx.scb.offload_active = false;
        ctx.scb.offload_pending = false;
    }
    if ctx.scb.codec_started {
        ctx.collab.codec.stop(ctx.scb.handle);
        ctx.scb.codec_started = false;
    }
}

/// Stop the data path and either suspend the stream or report a local stop.
///
/// Inside a reconfiguration nothing is reported.
pub(super) fn stop_stream(ctx: &mut Context<'_, '_>, suspend: bool, flush: bool) {
    let handle = ctx.scb.handle;
    stop_media(ctx);
    ctx.scb.media_queue.clear();
    if flush {
        ctx.collab.transport.flush(handle);
    }

    let reconfiguring = ctx.scb.state == StreamState::Reconfiguring;
    if suspend {
        if ctx.scb.started && ctx.scb.suspend_supported {
            debug!("[START] stream {} suspending", handle);
            if ctx.collab.transport.suspend(&[handle]).is_err() {
                ctx.raise(SsmEvent::StrSuspendCfm {
                    error: AvdtpErrorCode::TIMEOUT,
                    initiator: true,
                });
            }
            return;
        }
        if !reconfiguring {
            ctx.notify(Notification::Suspended {
                handle,
                status: AvStatus::Success,
                initiator: true,
            });
        }
    } else if !reconfiguring {
        ctx.notify(Notification::Stopped {
            handle,
            status: AvStatus::Success,
        });
    }
}

/// `StrSuspendCfm` while open
pub(super) fn suspend_cfm(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let SsmEvent::StrSuspendCfm { error, initiator } = event else {
        return;
    };
    let handle = ctx.scb.handle;
    if !ctx.scb.started {
        debug!("[START] stream {} suspend collision, ignored", handle);
        return;
    }

    let mut status = AvStatus::Success;
    if !error.is_success() && *error != AvdtpErrorCode::BAD_STATE {
        if *error != AvdtpErrorCode::TIMEOUT {
            warn!("[START] stream {} peer rejects suspend", handle);
            ctx.scb.suspend_supported = false;
        }
        status = AvStatus::Fail;
        ctx.raise(SsmEvent::ApiClose);
    } else {
        ctx.scb.started = false;
    }

    if ctx.scb.role.contains(RoleFlags::SUSPEND) {
        ctx.scb.role.remove(RoleFlags::SUSPEND);
        ctx.scb.congested = false;
    }
    stop_media(ctx);
    ctx.notify(Notification::Suspended {
        handle,
        status,
        initiator: *initiator,
    });
}

/// `StrWriteCfm`
pub(super) fn clear_congestion(ctx: &mut Context<'_, '_>) {
    if ctx.scb.codec_started {
        ctx.scb.congested = false;
    }
}

/// `ApiOffloadStart`
pub(super) fn offload_req(ctx: &mut Context<'_, '_>) {
    let handle = ctx.scb.handle;
    if !ctx.scb.started {
        warn!("[OFFLOAD] stream {} not started", handle);
        report_offload(ctx, AvStatus::FailStream);
        return;
    }
    if ctx.peers.open_audio > 1 {
        warn!("[OFFLOAD] stream {} refused, several audio streams open", handle);
        report_offload(ctx, AvStatus::FailResources);
        return;
    }
    if ctx.scb.offload_active {
        report_offload(ctx, AvStatus::Success);
        return;
    }
    if ctx.scb.offload_pending {
        debug!("[OFFLOAD] stream {} start already pending", handle);
        return;
    }

    let Some(codec) = ctx.scb.config.codec.as_ref() else {
        report_offload(ctx, AvStatus::FailStream);
        return;
    };
    let Some(format) = ctx.collab.codec.audio_format(codec) else {
        report_offload(ctx, AvStatus::FailStream);
        return;
    };
    let peer = ctx.scb.peer;
    let acl_handle = ctx.collab.transport.acl_handle(peer);
    let remote_cid = ctx.collab.transport.remote_cid(handle);
    let scms_t = ctx.collab.codec.cp_is_active(peer);

    let params = match OffloadParams::from_config(
        &ctx.scb.config,
        &format,
        acl_handle,
        remote_cid,
        ctx.scb.stream_mtu,
        scms_t,
    ) {
        Ok(params) => params,
        Err(_) => {
            warn!("[OFFLOAD] stream {} codec cannot be offloaded", handle);
            report_offload(ctx, AvStatus::Fail);
            return;
        }
    };

    debug!(
        "[OFFLOAD] stream {} start {:?} mtu {}",
        handle, params.codec, params.mtu
    );
    if ctx.collab.offload.start(&params).is_ok() {
        ctx.scb.offload_pending = true;
    } else {
        report_offload(ctx, AvStatus::Fail);
    }
}

/// `OffloadStartRsp`
pub(super) fn offload_rsp(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let SsmEvent::OffloadStartRsp { status } = event else {
        return;
    };
    let was_pending = ctx.scb.offload_pending;
    ctx.scb.offload_pending = false;

    let mut status = *status;
    if status.is_success() {
        if ctx.scb.started && was_pending {
            ctx.scb.offload_active = true;
        } else {
            warn!("[OFFLOAD] stream {} stale offload start", ctx.scb.handle);
            ctx.collab.offload.stop();
            status = AvStatus::FailStream;
        }
    }
    report_offload(ctx, status);
}

fn report_offload(ctx: &mut Context<'_, '_>, status: AvStatus) {
    let handle = ctx.scb.handle;
    ctx.notify(Notification::OffloadStarted { handle, status });
}
