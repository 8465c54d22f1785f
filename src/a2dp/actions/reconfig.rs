//! Reconfiguration: suspend and reconfigure in place when the peer allows
//! it, otherwise close and reopen the stream with the new configuration.

use super::{Context, close, discovery, start};
use crate::a2dp::event::{Notification, SsmEvent};
use crate::a2dp::scb::RoleFlags;
use crate::a2dp::timer::TimerId;
use crate::a2dp::{AvStatus, AvdtpErrorCode};

/// `ApiReconfig`: pick the fast or the slow path
pub(super) fn reconfig(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let SsmEvent::ApiReconfig {
        config,
        sep_index,
        suspend,
    } = event
    else {
        return;
    };
    let handle = ctx.scb.handle;
    ctx.cancel_timer(TimerId::RcDiscovery);

    let psc_mask = ctx.scb.config.psc_mask;
    ctx.scb.config = config.clone();
    ctx.scb.config.psc_mask = psc_mask;

    let index = usize::from(*sep_index);
    let same_endpoint = index == ctx.scb.seps.cursor();
    ctx.scb.rcfg_index = index;

    let fast = same_endpoint
        && *suspend
        && ctx.scb.reconfig_supported
        && ctx.scb.suspend_supported;
    let path = if fast { "suspend" } else { "close" };
    info!(
        "[RCFG] stream {} reconfigure on endpoint {} ({} path)",
        handle, index, path
    );

    if fast {
        if ctx.scb.started {
            ctx.scb.rcfg_restart = true;
            start::stop_stream(ctx, true, false);
        } else {
            issue_reconfigure(ctx);
        }
        return;
    }

    if ctx.scb.started {
        ctx.scb.rcfg_restart = true;
        start::stop_stream(ctx, false, false);
        ctx.scb.started = false;
    } else {
        start::stop_stream(ctx, false, false);
    }
    close_for_reconfig(ctx);
}

fn issue_reconfigure(ctx: &mut Context<'_, '_>) {
    let handle = ctx.scb.handle;
    if ctx
        .collab
        .transport
        .reconfigure(handle, &ctx.scb.config)
        .is_err()
    {
        warn!("[RCFG] stream {} reconfigure refused, closing", handle);
        close_for_reconfig(ctx);
    }
}

fn close_for_reconfig(ctx: &mut Context<'_, '_>) {
    let handle = ctx.scb.handle;
    ctx.collab.transport.flush(handle);
    if ctx.collab.transport.close(handle).is_err() {
        ctx.raise(SsmEvent::AvdtDisconnect);
    }
}

/// `StrSuspendCfm` inside a reconfiguration
pub(super) fn suspend_continue(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let error = event.error_code();
    let handle = ctx.scb.handle;
    ctx.scb.started = false;
    ctx.scb.congested = false;

    if error == AvdtpErrorCode::CONNECT {
        error!("[RCFG] stream {} lost the signalling channel", handle);
        ctx.notify(Notification::Reconfigured {
            handle,
            status: AvStatus::Fail,
        });
        ctx.raise(SsmEvent::StrDiscFail {
            error: AvdtpErrorCode::CONNECT,
        });
    } else if !error.is_success() {
        if error != AvdtpErrorCode::TIMEOUT {
            ctx.scb.suspend_supported = false;
        }
        close_for_reconfig(ctx);
    } else {
        issue_reconfigure(ctx);
    }
}

/// `StrReconfigCfm`
pub(super) fn reconfig_cfm(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let SsmEvent::StrReconfigCfm { error, codec } = event else {
        return;
    };
    if !error.is_success() {
        warn!(
            "[RCFG] stream {} peer rejects reconfigure ({})",
            ctx.scb.handle, error.0
        );
        if *error != AvdtpErrorCode::TIMEOUT {
            ctx.scb.reconfig_supported = false;
        }
        close_for_reconfig(ctx);
        return;
    }
    if let Some(codec) = codec {
        ctx.scb.config.codec = Some(codec.clone());
    }
    ctx.raise(SsmEvent::StrOpenOk { peer_mtu: None });
}

/// `StrOpenOk` inside a reconfiguration: back to `Open`
pub(super) fn stream_ok(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let handle = ctx.scb.handle;
    if let SsmEvent::StrOpenOk {
        peer_mtu: Some(mtu),
    } = event
    {
        ctx.scb.stream_mtu = mtu.saturating_sub(crate::constants::AVDT_MEDIA_HDR_SIZE);
        ctx.collab.codec.update_mtu(handle, ctx.scb.stream_mtu);
    }
    start::rc_timer(ctx);
    ctx.scb.role.remove(
        RoleFlags::ACCEPTOR
            .union(RoleFlags::SUSPEND_OPT)
            .union(RoleFlags::START_INT),
    );
    ctx.scb.num_recfg = 0;
    info!("[RCFG] stream {} reconfigured", handle);
    ctx.notify(Notification::Reconfigured {
        handle,
        status: AvStatus::Success,
    });
    if ctx.scb.rcfg_restart {
        ctx.scb.rcfg_restart = false;
        ctx.raise(SsmEvent::ApiStart);
    }
}

fn exhausted(ctx: &Context<'_, '_>) -> bool {
    ctx.scb.num_recfg > ctx.options.reconfig_retry_limit
}

/// `StrOpenFail` inside a reconfiguration: retry over a fresh link or give up
pub(super) fn failed(ctx: &mut Context<'_, '_>) {
    let handle = ctx.scb.handle;
    if exhausted(ctx) {
        error!(
            "[RCFG] stream {} giving up after {} attempts",
            handle, ctx.scb.num_recfg
        );
        ctx.collab.codec.close(handle);
        ctx.notify(Notification::Reconfigured {
            handle,
            status: AvStatus::FailStream,
        });
        ctx.raise(SsmEvent::ApiClose);
        return;
    }
    ctx.scb.num_recfg = ctx.scb.num_recfg.saturating_add(1);
    close::disconnect_req(ctx);
}

/// `StrClose` inside a reconfiguration: reconnect
pub(super) fn connect(ctx: &mut Context<'_, '_>) {
    ctx.scb.congested = false;
    ctx.scb.num_recfg = ctx.scb.num_recfg.saturating_add(1);
    if exhausted(ctx) {
        failed(ctx);
        return;
    }
    debug!(
        "[RCFG] stream {} reconnect, attempt {}",
        ctx.scb.handle, ctx.scb.num_recfg
    );
    if ctx.collab.transport.connect(ctx.scb.peer).is_err() {
        ctx.raise(SsmEvent::AvdtDisconnect);
    }
}

/// `AvdtDisconnect` inside a reconfiguration
pub(super) fn disconnected(ctx: &mut Context<'_, '_>) {
    let handle = ctx.scb.handle;
    ctx.scb.num_recfg = ctx.scb.num_recfg.saturating_add(1);
    if exhausted(ctx) {
        error!("[RCFG] stream {} link lost, giving up", handle);
        ctx.notify(Notification::Reconfigured {
            handle,
            status: AvStatus::FailStream,
        });
        ctx.raise(SsmEvent::StrDiscFail {
            error: AvdtpErrorCode::CONNECT,
        });
        return;
    }
    if ctx.collab.transport.connect(ctx.scb.peer).is_err() {
        ctx.raise(SsmEvent::AvdtDisconnect);
    }
}

/// `AvdtConnect` inside a reconfiguration: reopen on the chosen endpoint
pub(super) fn open(ctx: &mut Context<'_, '_>) {
    if ctx.scb.num_disc_sinks == 0 {
        // the endpoints were never discovered on this link
        if ctx.collab.transport.discover(ctx.scb.peer).is_err() {
            ctx.raise(SsmEvent::StrDiscFail {
                error: AvdtpErrorCode::BAD_STATE,
            });
        }
        return;
    }

    ctx.scb.seps.set_cursor(ctx.scb.rcfg_index);
    match ctx.scb.seps.current().copied() {
        Some(sep) => discovery::open_stream(ctx, sep.seid),
        None => {
            warn!(
                "[RCFG] stream {} endpoint {} unknown",
                ctx.scb.handle, ctx.scb.rcfg_index
            );
            ctx.raise(SsmEvent::StrOpenFail {
                error: AvdtpErrorCode::BAD_STATE,
            });
        }
    }
}
