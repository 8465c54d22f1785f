//! Action routines
//!
//! One function per [`Action`]. A routine borrows the control block of the
//! stream being processed for the duration of one event and talks to the
//! outside world only through [`Context`]. Follow-up events a routine wants
//! processed (a synchronous primitive failure, a replayed open, a restart
//! after reconfiguration) are raised into the context and run after the
//! current transition completes.

mod acceptor;
mod close;
mod discovery;
mod reconfig;
mod security;
mod start;

use super::arbiter::DiscoveryArbiter;
use super::data_path::{self, MediaFrame};
use super::event::{Notification, SsmEvent};
use super::manager::Collaborators;
use super::scb::StreamControlBlock;
use super::ssm::Action;
use super::timer::TimerId;
use super::{AvStatus, StreamHandle};
use crate::SessionOptions;
use crate::constants::MAX_RAISED_EVENTS;
use heapless::Deque;

/// What the processed stream knows about the other registered streams
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PeerView {
    /// Another stream is started
    pub others_streaming: bool,
    /// Number of open audio streams, this one included
    pub open_audio: usize,
    /// Another stream is open towards the same peer
    pub peer_open_elsewhere: bool,
}

/// Side effects collected while processing one event
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    /// Events raised for the same stream
    pub raised: Deque<SsmEvent, MAX_RAISED_EVENTS>,
    /// Frame to duplicate onto the other started streams
    pub fanout: Option<MediaFrame>,
    /// Stream the discovery slot was handed to
    pub granted: Option<StreamHandle>,
}

/// Everything an action routine may touch
pub(crate) struct Context<'a, 'c> {
    pub scb: &'a mut StreamControlBlock,
    pub collab: &'a mut Collaborators<'c>,
    pub options: &'a SessionOptions,
    pub arbiter: &'a mut DiscoveryArbiter,
    pub peers: PeerView,
    pub outbox: &'a mut Outbox,
}

impl Context<'_, '_> {
    /// Queue a follow-up event for this stream
    pub fn raise(&mut self, event: SsmEvent) {
        let kind = event.kind();
        if self.outbox.raised.push_back(event).is_err() {
            error!(
                "[SSM] stream {} raised event queue full, dropping {:?}",
                self.scb.handle, kind
            );
        }
    }

    pub fn notify(&mut self, notification: Notification) {
        self.collab.notifier.notify(notification);
    }

    pub fn start_timer(&mut self, id: TimerId, timeout_ms: u32) {
        self.collab.timers.start(self.scb.handle, id, timeout_ms);
    }

    pub fn cancel_timer(&mut self, id: TimerId) {
        self.collab.timers.cancel(self.scb.handle, id);
    }

    /// Give up the discovery slot, remembering who it was handed to
    pub fn release_discovery(&mut self) {
        if let Some(next) = self.arbiter.release(self.scb.handle) {
            self.outbox.granted = Some(next);
        }
    }

    /// Report a failed start requested by this side
    pub fn notify_start_failed(&mut self, status: AvStatus) {
        self.scb.role.remove(super::RoleFlags::START_INT);
        let handle = self.scb.handle;
        self.notify(Notification::Started {
            handle,
            status,
            initiator: true,
            suspending: false,
        });
    }
}

/// Run one action routine
pub(crate) fn run(action: Action, ctx: &mut Context<'_, '_>, event: &SsmEvent) {
    trace!("[SSM] stream {} action {:?}", ctx.scb.handle, action);
    match action {
        Action::DoDiscovery => discovery::do_discovery(ctx, event),
        Action::QueueOpen => discovery::queue_open(ctx, event),
        Action::ResumeDiscovery => discovery::resume_discovery(ctx),
        Action::FreeSdp => ctx.release_discovery(),
        Action::ConnectReq => discovery::connect_req(ctx),
        Action::DiscoverReq => discovery::discover_req(ctx),
        Action::DiscResults => discovery::disc_results(ctx, event),
        Action::GetcapResults => discovery::getcap_results(ctx, event),
        Action::OpenFailed => discovery::open_failed(ctx, event),
        Action::ConnFailed => discovery::conn_failed(ctx),
        Action::SdpFailed => discovery::sdp_failed(ctx),
        Action::SwitchRole => discovery::switch_role(ctx),
        Action::RoleResult => discovery::role_result(ctx, event),
        Action::AcceptConnection => acceptor::accept_connection(ctx, event),
        Action::OpenAtIncoming => acceptor::open_at_incoming(ctx, event),
        Action::CollisionTimeout => acceptor::collision_timeout(ctx),
        Action::ConfigInd => acceptor::config_ind(ctx, event),
        Action::SetConfigRsp => acceptor::setconfig_rsp(ctx, event),
        Action::SetConfigRej => acceptor::setconfig_rej(ctx, event),
        Action::DiscResultsAsAcceptor => acceptor::disc_results(ctx, event),
        Action::SaveCaps => acceptor::save_caps(ctx, event),
        Action::SecurityReq => security::request(ctx, event),
        Action::SecurityRsp => security::response(ctx, event),
        Action::SecurityInd => security::indication(ctx, event),
        Action::SecurityCfm => security::confirm(ctx, event),
        Action::SecurityRej => security::reject(ctx),
        Action::StreamOpened => start::stream_opened(ctx, event),
        Action::RcTimer => start::rc_timer(ctx),
        Action::OpenRc => start::open_rc(ctx),
        Action::SetUseRc => ctx.scb.use_rc = true,
        Action::DelayReport => start::delay_report(ctx, event),
        Action::DoStart => start::do_start(ctx),
        Action::StartOk => start::start_ok(ctx),
        Action::StartFailed => start::start_failed(ctx),
        Action::StreamStopped => start::stream_stopped(ctx, event),
        Action::SuspendCfm => start::suspend_cfm(ctx, event),
        Action::DataPath => data_path::forward(ctx),
        Action::ClearCongestion => start::clear_congestion(ctx),
        Action::OffloadReq => start::offload_req(ctx),
        Action::OffloadRsp => start::offload_rsp(ctx, event),
        Action::Reconfig => reconfig::reconfig(ctx, event),
        Action::SuspendContinue => reconfig::suspend_continue(ctx, event),
        Action::ReconfigCfm => reconfig::reconfig_cfm(ctx, event),
        Action::ReconfigStreamOk => reconfig::stream_ok(ctx, event),
        Action::ReconfigFailed => reconfig::failed(ctx),
        Action::ReconfigConnect => reconfig::connect(ctx),
        Action::ReconfigOpen => reconfig::open(ctx),
        Action::ReconfigDisconnected => reconfig::disconnected(ctx),
        Action::DoClose => close::do_close(ctx),
        Action::DisconnectReq => close::disconnect_req(ctx),
        Action::CodecClose => ctx.collab.codec.close(ctx.scb.handle),
        Action::StreamClosed => close::stream_closed(ctx),
        Action::Cleanup => close::cleanup(ctx),
    }
}
