//! Stream Manager - owns every stream control block and routes events
//!
//! The manager is the single writer of all session state. One call to
//! [`StreamManager::handle_event`] runs one event to completion for one
//! stream:
//!
//! 1. The state table is consulted for `(state, event)`
//! 2. The next state is entered and the listed action routines run
//! 3. Events raised by the routines are processed in FIFO order
//! 4. A frame pulled from the codec is duplicated onto the other started streams
//! 5. A discovery slot handed over during the run is delivered to its new owner
//!
//! Events for unknown handles are dropped. Events a state does not expect
//! are ignored, which makes late confirmations after a close harmless.

use super::actions::{self, Context, Outbox, PeerView};
use super::arbiter::DiscoveryArbiter;
use super::avdtp::MediaType;
use super::callout::CodecCallout;
use super::event::{Notification, Notifier, SsmEvent};
use super::link::LinkRoleCoordinator;
use super::offload::OffloadController;
use super::scb::StreamControlBlock;
use super::ssm::{Dispatch, StreamState, dispatch};
use super::timer::{TimerId, TimerService};
use super::transport::StreamTransport;
use super::{A2dpError, Role, StreamHandle};
use crate::SessionOptions;
use crate::constants::{MAX_EVENT_CHAIN, MAX_STREAMS};
use heapless::FnvIndexMap;

/// The outside world as seen by the state machine
pub struct Collaborators<'a> {
    /// AVDTP signalling and media channel
    pub transport: &'a mut dyn StreamTransport,
    /// Local codec
    pub codec: &'a mut dyn CodecCallout,
    /// Link policy
    pub link: &'a mut dyn LinkRoleCoordinator,
    /// Per-stream timers
    pub timers: &'a mut dyn TimerService,
    /// Hardware codec
    pub offload: &'a mut dyn OffloadController,
    /// Upper layer
    pub notifier: &'a mut dyn Notifier,
}

/// Registry of stream control blocks
#[derive(Debug)]
pub struct StreamManager {
    options: SessionOptions,
    streams: FnvIndexMap<StreamHandle, StreamControlBlock, MAX_STREAMS>,
    next_handle: StreamHandle,
    arbiter: DiscoveryArbiter,
}

impl StreamManager {
    /// Create an empty manager
    #[must_use]
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            streams: FnvIndexMap::new(),
            next_handle: 1,
            arbiter: DiscoveryArbiter::new(),
        }
    }

    /// Session options
    #[must_use]
    pub const fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Register a local stream endpoint
    ///
    /// # Errors
    /// Returns error if every control block is in use
    pub fn register(&mut self, role: Role, media_type: MediaType) -> Result<StreamHandle, A2dpError> {
        if self.streams.len() >= MAX_STREAMS {
            warn!("[MANAGER] no free stream control block");
            return Err(A2dpError::TooManyStreams);
        }
        let mut handle = self.next_handle;
        while handle == 0 || self.streams.contains_key(&handle) {
            handle = handle.wrapping_add(1);
        }
        self.next_handle = handle.wrapping_add(1);

        self.streams
            .insert(handle, StreamControlBlock::new(handle, role, media_type))
            .map_err(|_| A2dpError::TooManyStreams)?;
        info!("[MANAGER] registered stream {} ({:?})", handle, role);
        Ok(handle)
    }

    /// Deregister a stream; an active stream is closed first and freed once idle
    ///
    /// # Errors
    /// Returns error if the handle is unknown
    pub fn deregister(
        &mut self,
        collab: &mut Collaborators<'_>,
        handle: StreamHandle,
    ) -> Result<(), A2dpError> {
        let scb = self
            .streams
            .get_mut(&handle)
            .ok_or(A2dpError::InvalidHandle)?;
        if scb.state == StreamState::Init {
            self.free(collab, handle);
            return Ok(());
        }
        debug!("[MANAGER] stream {} closing before deregistration", handle);
        scb.deregistering = true;
        self.handle_event(collab, handle, SsmEvent::ApiClose);
        Ok(())
    }

    fn free(&mut self, collab: &mut Collaborators<'_>, handle: StreamHandle) {
        for id in TimerId::ALL {
            collab.timers.cancel(handle, id);
        }
        self.streams.remove(&handle);
        let granted = self.arbiter.release(handle);
        info!("[MANAGER] stream {} deregistered", handle);
        collab.notifier.notify(Notification::Deregistered { handle });
        if let Some(next) = granted {
            self.handle_event(collab, next, SsmEvent::DiscoveryGranted);
        }
    }

    /// Run one event to completion
    pub fn handle_event(
        &mut self,
        collab: &mut Collaborators<'_>,
        handle: StreamHandle,
        event: SsmEvent,
    ) {
        if !self.streams.contains_key(&handle) {
            warn!(
                "[MANAGER] dropping {:?} for unknown stream {}",
                event.kind(),
                handle
            );
            return;
        }

        let mut outbox = Outbox::default();
        self.step(collab, handle, &event, &mut outbox);
        let mut chained = 0;
        while let Some(next) = outbox.raised.pop_front() {
            chained += 1;
            if chained > MAX_EVENT_CHAIN {
                error!("[MANAGER] stream {} event chain too long", handle);
                outbox.raised.clear();
                break;
            }
            self.step(collab, handle, &next, &mut outbox);
        }

        if let Some(frame) = outbox.fanout.take() {
            let limit = self.options.pending_frame_limit();
            for (other, scb) in &mut self.streams {
                if *other == handle || !scb.started || scb.offload_active {
                    continue;
                }
                if scb.enqueue_frame(frame.clone(), limit) {
                    warn!("[DATA] stream {} duplicate dropped oldest frame", other);
                    collab.codec.frame_dropped(*other);
                }
            }
        }

        if let Some(next) = outbox.granted.take() {
            debug!("[MANAGER] discovery slot handed to stream {}", next);
            self.handle_event(collab, next, SsmEvent::DiscoveryGranted);
        }

        let idle_deregistering = self
            .streams
            .get(&handle)
            .is_some_and(|scb| scb.deregistering && scb.state == StreamState::Init);
        if idle_deregistering {
            self.free(collab, handle);
        }
    }

    fn step(
        &mut self,
        collab: &mut Collaborators<'_>,
        handle: StreamHandle,
        event: &SsmEvent,
        outbox: &mut Outbox,
    ) {
        let peers = self.peer_view(handle);
        let Some(scb) = self.streams.get_mut(&handle) else {
            return;
        };
        let state = scb.state;
        let kind = event.kind();

        let transition = match dispatch(state, kind) {
            Dispatch::Ignored => {
                trace!("[SSM] stream {} ignores {:?} in {:?}", handle, kind, state);
                return;
            }
            Dispatch::Handle(transition) => transition,
        };
        debug!("[SSM] stream {} {:?} in {:?}", handle, kind, state);
        if let Some(next) = transition.next {
            scb.state = next;
        }

        let mut ctx = Context {
            scb,
            collab,
            options: &self.options,
            arbiter: &mut self.arbiter,
            peers,
            outbox,
        };
        for action in transition.actions {
            actions::run(*action, &mut ctx, event);
        }

        if !ctx.scb.started && ctx.scb.offload_active {
            warn!("[OFFLOAD] stream {} stopped with offload active", handle);
            ctx.scb.offload_active = false;
            ctx.collab.offload.stop();
        }
        if ctx.scb.state != state {
            info!(
                "[SSM] stream {} {:?} -> {:?}",
                handle, state, ctx.scb.state
            );
        }
    }

    fn peer_view(&self, handle: StreamHandle) -> PeerView {
        let mut view = PeerView::default();
        let Some(this) = self.streams.get(&handle) else {
            return view;
        };
        for (other, scb) in &self.streams {
            if scb.is_open_audio() {
                view.open_audio += 1;
            }
            if *other == handle {
                continue;
            }
            if scb.started {
                view.others_streaming = true;
            }
            let open = matches!(scb.state, StreamState::Open | StreamState::Reconfiguring);
            if open && scb.peer == this.peer {
                view.peer_open_elsewhere = true;
            }
        }
        view
    }

    /// Deliver a service discovery result to the stream owning the discovery slot
    pub fn handle_service_discovery(&mut self, collab: &mut Collaborators<'_>, found: bool) {
        let Some(owner) = self.arbiter.owner() else {
            warn!("[MANAGER] service discovery result without owner");
            return;
        };
        let event = if found {
            SsmEvent::SdpDiscOk
        } else {
            SsmEvent::SdpDiscFail
        };
        self.handle_event(collab, owner, event);
    }

    /// Deliver a timer expiry
    pub fn handle_timer(&mut self, collab: &mut Collaborators<'_>, handle: StreamHandle, id: TimerId) {
        trace!("[MANAGER] stream {} timer {:?} expired", handle, id);
        self.handle_event(collab, handle, id.expiry_event());
    }

    /// Session state of a stream
    #[must_use]
    pub fn state(&self, handle: StreamHandle) -> Option<StreamState> {
        self.streams.get(&handle).map(StreamControlBlock::state)
    }

    /// Control block of a stream
    #[must_use]
    pub fn stream(&self, handle: StreamHandle) -> Option<&StreamControlBlock> {
        self.streams.get(&handle)
    }

    /// Every registered control block
    pub fn streams(&self) -> impl Iterator<Item = &StreamControlBlock> {
        self.streams.values()
    }

    /// Discovery slot arbiter
    #[must_use]
    pub const fn arbiter(&self) -> &DiscoveryArbiter {
        &self.arbiter
    }
}
