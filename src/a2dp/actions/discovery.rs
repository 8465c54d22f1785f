//! Initiator path: role check, service discovery, endpoint discovery,
//! capability negotiation and open.

use super::{Context, close, start};
use crate::a2dp::arbiter::Acquire;
use crate::a2dp::event::{EventKind, Notification, SsmEvent};
use crate::a2dp::scb::{OpenRequest, QueueTag, RoleFlags, WaitMask};
use crate::a2dp::ssm::StreamState;
use crate::a2dp::timer::TimerId;
use crate::a2dp::{AvStatus, AvdtpErrorCode, StreamEndpointId};

/// `ApiOpen` in `Init`: park on a role switch or start service discovery
pub(super) fn do_discovery(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let SsmEvent::ApiOpen { peer, use_rc } = event else {
        return;
    };
    let (peer, use_rc) = (*peer, *use_rc);
    ctx.scb.save_peer(peer);
    ctx.scb.use_rc = use_rc;
    ctx.scb.open_api = Some(OpenRequest { peer, use_rc });

    let require_master = ctx.options.prefer_master;
    if ctx.collab.link.switch_if_needed(peer) || !ctx.collab.link.role_ok(peer, require_master) {
        info!(
            "[DISC] stream {} open parked until role switch resolves",
            ctx.scb.handle
        );
        ctx.scb.wait.insert(WaitMask::ROLE_SW_RES_OPEN);
        ctx.scb.queued = Some(QueueTag::Open);
        ctx.start_timer(TimerId::RcDiscovery, ctx.options.rc_discovery_delay_ms);
        return;
    }

    begin_discovery(ctx);
}

/// Claim the discovery slot and look up the service record
fn begin_discovery(ctx: &mut Context<'_, '_>) {
    ctx.scb.wait.remove(WaitMask::ROLE_SW_BITS);
    ctx.scb.queued = None;
    if ctx.scb.wait.contains(WaitMask::CHECK_RC) {
        ctx.scb.wait.remove(WaitMask::CHECK_RC);
        ctx.start_timer(TimerId::RcDiscovery, ctx.options.rc_discovery_delay_ms);
    }

    match ctx.arbiter.acquire(ctx.scb.handle) {
        Ok(Acquire::Granted) => find_service(ctx),
        Ok(Acquire::Queued) => {
            debug!(
                "[DISC] stream {} waits for the discovery slot",
                ctx.scb.handle
            );
        }
        Err(_) => {
            warn!(
                "[DISC] stream {} discovery queue full, skipping SDP",
                ctx.scb.handle
            );
            ctx.raise(SsmEvent::SdpDiscFail);
        }
    }
}

fn find_service(ctx: &mut Context<'_, '_>) {
    debug!("[DISC] stream {} SDP lookup", ctx.scb.handle);
    if ctx.collab.transport.find_service(ctx.scb.peer).is_err() {
        ctx.raise(SsmEvent::SdpDiscFail);
    }
}

/// `ApiOpen` while already opening: replay it once this attempt is over
pub(super) fn queue_open(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    if let SsmEvent::ApiOpen { peer, use_rc } = event {
        debug!("[DISC] stream {} open queued", ctx.scb.handle);
        ctx.scb.queued_open = Some(OpenRequest {
            peer: *peer,
            use_rc: *use_rc,
        });
    }
}

/// `DiscoveryGranted`: the slot was handed over
pub(super) fn resume_discovery(ctx: &mut Context<'_, '_>) {
    if ctx.arbiter.owner() == Some(ctx.scb.handle) {
        find_service(ctx);
    } else {
        trace!("[DISC] stream {} stale discovery grant", ctx.scb.handle);
    }
}

/// SDP finished either way: connect signalling
pub(super) fn connect_req(ctx: &mut Context<'_, '_>) {
    ctx.release_discovery();
    if ctx.collab.transport.connect(ctx.scb.peer).is_err() {
        ctx.raise(SsmEvent::AvdtDisconnect);
    }
}

/// Signalling up: discover remote endpoints
pub(super) fn discover_req(ctx: &mut Context<'_, '_>) {
    if ctx.collab.transport.discover(ctx.scb.peer).is_err() {
        ctx.raise(SsmEvent::StrDiscFail {
            error: AvdtpErrorCode::BAD_STATE,
        });
    }
}

/// `StrDiscOk`: remember the endpoints and probe the first candidate
pub(super) fn disc_results(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let SsmEvent::StrDiscOk { seps } = event else {
        return;
    };
    ctx.scb.seps.replace(seps);
    if ctx.scb.seps.is_empty() {
        error!("[DISC] stream {} peer has no endpoints", ctx.scb.handle);
        ctx.raise(SsmEvent::StrDiscFail {
            error: AvdtpErrorCode::NSC,
        });
        return;
    }

    let sinks = ctx
        .scb
        .seps
        .count_candidates(ctx.scb.media_type, ctx.scb.local_role.peer());
    ctx.scb.num_disc_sinks = sinks;
    debug!(
        "[DISC] stream {} {} endpoint(s), {} candidate(s)",
        ctx.scb.handle,
        seps.len(),
        sinks
    );
    ctx.collab
        .codec
        .disc_res(ctx.scb.handle, seps.len(), sinks, ctx.scb.peer);
    next_getcap(ctx);
}

/// Request capabilities of the next candidate, failing when none is left
fn next_getcap(ctx: &mut Context<'_, '_>) {
    let tsep = ctx.scb.local_role.peer();
    match ctx.scb.seps.seek_candidate(ctx.scb.media_type, tsep) {
        Some(sep) => {
            trace!("[DISC] stream {} get capabilities of seid {}", ctx.scb.handle, sep.seid);
            if ctx
                .collab
                .transport
                .get_capabilities(ctx.scb.peer, sep.seid)
                .is_err()
            {
                ctx.raise(SsmEvent::StrGetcapFail {
                    error: AvdtpErrorCode::BAD_STATE,
                });
            }
        }
        None => {
            error!("[DISC] stream {} no matching endpoint", ctx.scb.handle);
            ctx.raise(SsmEvent::StrGetcapFail {
                error: AvdtpErrorCode::NSC,
            });
        }
    }
}

/// `StrGetcapOk`: open on a codec match, otherwise try the next candidate
pub(super) fn getcap_results(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let SsmEvent::StrGetcapOk { caps } = event else {
        return;
    };
    let Some(sep) = ctx.scb.seps.current().copied() else {
        ctx.raise(SsmEvent::StrGetcapFail {
            error: AvdtpErrorCode::BAD_STATE,
        });
        return;
    };
    ctx.scb.peer_caps = caps.clone();

    if caps.media_type() == Some(ctx.scb.media_type) {
        match ctx.collab.codec.getcfg(ctx.scb.handle, caps, sep.seid) {
            Ok(mut config) => {
                config.psc_mask = ctx.options.local_psc().intersection(caps.psc_mask);
                ctx.scb.config = config;
                ctx.scb.rcfg_index = ctx.scb.seps.cursor();
                debug!(
                    "[DISC] stream {} codec matched on seid {}",
                    ctx.scb.handle, sep.seid
                );
                open_stream(ctx, sep.seid);
                return;
            }
            Err(error) => {
                debug!(
                    "[DISC] stream {} codec rejected seid {} ({})",
                    ctx.scb.handle, sep.seid, error.0
                );
            }
        }
    }

    ctx.scb.seps.advance();
    next_getcap(ctx);
}

/// Issue the open primitive with the negotiated configuration
pub(super) fn open_stream(ctx: &mut Context<'_, '_>, seid: StreamEndpointId) {
    if ctx
        .collab
        .transport
        .open(ctx.scb.handle, ctx.scb.peer, seid, &ctx.scb.config)
        .is_err()
    {
        ctx.raise(SsmEvent::StrOpenFail {
            error: AvdtpErrorCode::BAD_STATE,
        });
    }
}

/// Negotiation or open failed: tear the link down and report on close
pub(super) fn open_failed(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let status = match event.kind() {
        EventKind::StrDiscFail | EventKind::StrGetcapFail => AvStatus::FailGetCap,
        _ => AvStatus::FailStream,
    };
    error!(
        "[DISC] stream {} open failed: {:?} (error {})",
        ctx.scb.handle,
        status,
        event.error_code().0
    );
    ctx.scb.open_status = status;
    ctx.collab.codec.close(ctx.scb.handle);

    if ctx.peers.peer_open_elsewhere {
        // the link carries another stream, keep it up
        let (handle, peer) = (ctx.scb.handle, ctx.scb.peer);
        ctx.scb.open_status = AvStatus::Success;
        ctx.notify(Notification::Opened {
            handle,
            peer,
            status,
            starting: false,
        });
        ctx.scb.state = StreamState::Init;
        close::cleanup(ctx);
    } else {
        close::disconnect_req(ctx);
    }
}

/// Signalling dropped while opening
pub(super) fn conn_failed(ctx: &mut Context<'_, '_>) {
    ctx.scb.open_status = AvStatus::FailStream;
    close::stream_closed(ctx);
}

/// SDP answered after the open was abandoned
pub(super) fn sdp_failed(ctx: &mut Context<'_, '_>) {
    ctx.scb.open_status = AvStatus::FailSdp;
    close::stream_closed(ctx);
}

/// Role timer expired while an open is parked: retry once, then give up
pub(super) fn switch_role(ctx: &mut Context<'_, '_>) {
    if ctx.scb.queued != Some(QueueTag::Open) {
        trace!("[DISC] stream {} role timer with nothing parked", ctx.scb.handle);
        return;
    }
    let retrying = ctx.scb.wait.contains(WaitMask::ROLE_SW_RETRY);
    ctx.scb
        .wait
        .remove(WaitMask::ROLE_SW_RES_OPEN.union(WaitMask::ROLE_SW_RES_START));

    let peer = ctx.scb.peer;
    let require_master = ctx.options.prefer_master;
    if !ctx.collab.link.switch_if_needed(peer) && ctx.collab.link.role_ok(peer, require_master) {
        begin_discovery(ctx);
    } else if retrying {
        fail_parked_open(ctx);
    } else {
        debug!("[DISC] stream {} retrying role switch", ctx.scb.handle);
        ctx.scb
            .wait
            .insert(WaitMask::ROLE_SW_RETRY.union(WaitMask::ROLE_SW_RES_OPEN));
        ctx.start_timer(TimerId::RcDiscovery, ctx.options.rc_discovery_delay_ms);
    }
}

/// `RoleChange`: resume or fail whatever was parked on the switch
pub(super) fn role_result(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let SsmEvent::RoleChange { hci_status } = event else {
        return;
    };
    let switched = *hci_status == 0;
    debug!(
        "[DISC] stream {} role change status {}",
        ctx.scb.handle, hci_status
    );

    match ctx.scb.queued {
        Some(QueueTag::Start) if ctx.scb.wait.contains(WaitMask::ROLE_SW_STARTED) => {
            ctx.scb.wait.remove(WaitMask::ROLE_SW_BITS);
            ctx.scb.queued = None;
            ctx.cancel_timer(TimerId::RcDiscovery);
            if switched {
                start::start_ok(ctx);
            } else {
                start::fail_role_start(ctx);
            }
        }
        Some(QueueTag::Start) if ctx.scb.wait.contains(WaitMask::ROLE_SW_RES_START) => {
            ctx.scb.wait.remove(WaitMask::ROLE_SW_RES_START);
            if !switched {
                ctx.scb.wait.insert(WaitMask::ROLE_SW_FAILED);
            }
        }
        Some(QueueTag::Open) if ctx.scb.wait.contains(WaitMask::ROLE_SW_RES_OPEN) => {
            ctx.cancel_timer(TimerId::RcDiscovery);
            ctx.scb.role.remove(RoleFlags::START_INT);
            if switched {
                begin_discovery(ctx);
            } else {
                fail_parked_open(ctx);
            }
        }
        _ => trace!("[DISC] stream {} role change not awaited", ctx.scb.handle),
    }
}

fn fail_parked_open(ctx: &mut Context<'_, '_>) {
    error!("[DISC] stream {} role switch failed, open aborted", ctx.scb.handle);
    ctx.scb.wait.remove(WaitMask::ROLE_SW_BITS);
    ctx.scb.queued = None;
    let (handle, peer) = (ctx.scb.handle, ctx.scb.peer);
    ctx.notify(Notification::Opened {
        handle,
        peer,
        status: AvStatus::FailRole,
        starting: false,
    });
    ctx.scb.state = StreamState::Init;
    close::cleanup(ctx);
}
