//! Acceptor path: incoming connection guard, peer configuration and the
//! capability round-trip that follows it.

use super::{Context, start};
use crate::a2dp::avdtp::{PscMask, SepInfo};
use crate::a2dp::codec::CodecType;
use crate::a2dp::event::{Notification, SsmEvent};
use crate::a2dp::scb::{CollisionMask, OpenRequest, RoleFlags, WaitMask};
use crate::a2dp::ssm::StreamState;
use crate::a2dp::timer::TimerId;
use crate::a2dp::{AvdtpErrorCode, Role};

/// `AcpConnect`: the peer connected signalling; give it time to configure us
pub(super) fn accept_connection(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let SsmEvent::AcpConnect { peer } = event else {
        return;
    };
    ctx.scb.save_peer(*peer);
    ctx.scb.coll.insert(CollisionMask::INC_TIMER);
    ctx.start_timer(TimerId::AcceptSignalling, ctx.options.accept_signalling_ms);
}

/// `ApiOpen` while incoming: defer behind the guard or restart from `Init`
pub(super) fn open_at_incoming(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let SsmEvent::ApiOpen { peer, use_rc } = event else {
        return;
    };
    let request = OpenRequest {
        peer: *peer,
        use_rc: *use_rc,
    };
    ctx.scb.open_api = Some(request);

    if ctx.scb.coll.contains(CollisionMask::INC_TIMER) {
        debug!(
            "[SSM] stream {} open deferred behind incoming guard",
            ctx.scb.handle
        );
        ctx.scb.coll.insert(CollisionMask::API_CALLED);
        return;
    }

    ctx.scb.coll = CollisionMask::NONE;
    ctx.scb.state = StreamState::Init;
    ctx.raise(SsmEvent::ApiOpen {
        peer: request.peer,
        use_rc: request.use_rc,
    });
}

/// Accept guard expired without peer configuration
pub(super) fn collision_timeout(ctx: &mut Context<'_, '_>) {
    let coll = ctx.scb.coll;
    ctx.scb.coll = CollisionMask::NONE;
    if !coll.contains(CollisionMask::API_CALLED) {
        trace!("[SSM] stream {} stays incoming", ctx.scb.handle);
        return;
    }
    if let Some(request) = ctx.scb.open_api {
        info!("[SSM] stream {} replaying deferred open", ctx.scb.handle);
        ctx.scb.state = StreamState::Init;
        ctx.raise(SsmEvent::ApiOpen {
            peer: request.peer,
            use_rc: request.use_rc,
        });
    }
}

/// `StrConfigInd`: validate the proposal and hand it to the codec
pub(super) fn config_ind(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let SsmEvent::StrConfigInd { peer, seid, config } = event else {
        return;
    };
    ctx.scb.save_peer(*peer);
    ctx.scb.coll = CollisionMask::NONE;
    ctx.cancel_timer(TimerId::AcceptSignalling);
    ctx.release_discovery();
    ctx.scb.config = config.clone();

    let local = ctx.options.local_psc();
    let psc_ok =
        config.psc_mask == local || config.psc_mask == local.without(PscMask::DELAY_RPT);
    if config.codec.is_none() || !psc_ok {
        warn!(
            "[SSM] stream {} rejecting configuration (psc {:x})",
            ctx.scb.handle, config.psc_mask.0
        );
        ctx.raise(SsmEvent::SetConfigFail {
            error: AvdtpErrorCode::UNSUP_CFG,
        });
        return;
    }

    let media_type = config.media_type().unwrap_or(ctx.scb.media_type);
    ctx.scb
        .seps
        .replace(&[SepInfo::new(*seid, media_type, ctx.scb.local_role.peer())]);
    ctx.scb.role.insert(RoleFlags::ACCEPTOR);
    ctx.collab
        .codec
        .setcfg(ctx.scb.handle, &ctx.scb.config, *seid);
}

/// `SetConfigOk`: accept, then learn the remaining peer capabilities
pub(super) fn setconfig_rsp(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let SsmEvent::SetConfigOk {
        extra_seids,
        reconfig_needed,
    } = event
    else {
        return;
    };
    let handle = ctx.scb.handle;
    ctx.collab
        .transport
        .config_response(handle, AvdtpErrorCode::SUCCESS);
    ctx.scb.wait = WaitMask::ACP_CAPS_ON;
    if *reconfig_needed {
        ctx.scb.role.insert(RoleFlags::SUSPEND_OPT);
    }

    // a sink never probes the source's endpoints
    if ctx.scb.local_role == Role::Sink {
        finish_caps(ctx);
        return;
    }

    let is_sbc = ctx
        .scb
        .config
        .codec
        .as_ref()
        .is_some_and(|codec| codec.codec_type == CodecType::Sbc);
    if is_sbc || !extra_seids.is_empty() {
        let media_type = ctx.scb.media_type;
        let tsep = ctx.scb.local_role.peer();
        for seid in extra_seids {
            if ctx
                .scb
                .seps
                .push(SepInfo::new(*seid, media_type, tsep))
                .is_err()
            {
                warn!("[SSM] stream {} endpoint list full", handle);
                break;
            }
        }
        let count = ctx.scb.seps.len();
        ctx.scb.num_disc_sinks = ctx.scb.seps.count_candidates(media_type, tsep);
        ctx.collab
            .codec
            .disc_res(handle, count, ctx.scb.num_disc_sinks, ctx.scb.peer);
        ctx.scb.seps.set_cursor(0);
        next_caps(ctx);
    } else if ctx.collab.transport.discover(ctx.scb.peer).is_err() {
        finish_caps(ctx);
    }
}

/// Reject a configuration proposal
pub(super) fn setconfig_rej(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let mut error = event.error_code();
    if error.is_success() {
        error = AvdtpErrorCode::UNSUP_CFG;
    }
    let peer = match event {
        SsmEvent::StrConfigInd { peer, .. } => *peer,
        _ => ctx.scb.peer,
    };
    let handle = ctx.scb.handle;
    warn!(
        "[SSM] stream {} configuration rejected ({})",
        handle, error.0
    );
    ctx.collab.transport.config_response(handle, error);
    ctx.notify(Notification::Rejected { handle, peer });
}

/// `StrDiscOk` as acceptor: probe the discovered candidates
pub(super) fn disc_results(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let SsmEvent::StrDiscOk { seps } = event else {
        return;
    };
    ctx.scb.seps.replace(seps);
    let sinks = ctx
        .scb
        .seps
        .count_candidates(ctx.scb.media_type, ctx.scb.local_role.peer());
    ctx.scb.num_disc_sinks = sinks;
    ctx.collab
        .codec
        .disc_res(ctx.scb.handle, seps.len(), sinks, ctx.scb.peer);
    next_caps(ctx);
}

/// `StrGetcapOk` during the acceptor round-trip
pub(super) fn save_caps(ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    let SsmEvent::StrGetcapOk { caps } = event else {
        return;
    };
    if !ctx.scb.wait.contains(WaitMask::ACP_CAPS_ON) {
        trace!("[SSM] stream {} unexpected capabilities", ctx.scb.handle);
        return;
    }
    if let Some(sep) = ctx.scb.seps.current().copied() {
        ctx.scb.peer_caps = caps.clone();
        // the codec only learns the peer capabilities here
        if let Err(error) = ctx.collab.codec.getcfg(ctx.scb.handle, caps, sep.seid) {
            trace!(
                "[SSM] stream {} seid {} unusable ({})",
                ctx.scb.handle, sep.seid, error.0
            );
        }
    }
    ctx.scb.seps.advance();
    next_caps(ctx);
}

fn next_caps(ctx: &mut Context<'_, '_>) {
    let tsep = ctx.scb.local_role.peer();
    let Some(sep) = ctx.scb.seps.seek_candidate(ctx.scb.media_type, tsep) else {
        finish_caps(ctx);
        return;
    };
    if ctx
        .collab
        .transport
        .get_capabilities(ctx.scb.peer, sep.seid)
        .is_err()
    {
        finish_caps(ctx);
    }
}

/// Close the capability round-trip and run a start that waited for it
fn finish_caps(ctx: &mut Context<'_, '_>) {
    let old = ctx.scb.wait;
    ctx.scb
        .wait
        .remove(WaitMask::ACP_CAPS_ON.union(WaitMask::ACP_CAPS_STARTED));
    debug!("[SSM] stream {} acceptor capabilities done", ctx.scb.handle);
    if old.contains(WaitMask::ACP_CAPS_STARTED) {
        start::start_ok(ctx);
    }
}
