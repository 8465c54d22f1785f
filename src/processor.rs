//! Processor - drives the stream session state machine from its channels
//!
//! Application requests ([`ApiRequest`]) and collaborator input
//! ([`Envelope`]) arrive over the [`SessionChannels`]; the processor locks the
//! shared [`StreamManager`] for each message and runs it to completion,
//! including every event the action routines raise on the way.
//!
//! # Usage
//!
//! ```rust,ignore
//! use bondybird_a2dp::{SessionChannels, SessionOptions, processor};
//! use bondybird_a2dp::a2dp::StreamManager;
//!
//! // collab: Collaborators wired to the platform's AVDTP, codec, link,
//! // timers and offload implementations, notifier = CHANNELS.notifier()
//! processor::run(&MANAGER, &CHANNELS, &mut collab).await;
//! ```
//!
//! # Architecture
//!
//! * **Event path**: transport, service discovery and timer input, handled first
//! * **Request path**: application requests
//! * **Notifications**: pushed into the notification channel without blocking

use crate::a2dp::event::{Notification, Notifier};
use crate::a2dp::manager::{Collaborators, StreamManager};
use crate::constants::MAX_QUEUED_EVENTS;
use crate::{ApiRequest, Envelope, SessionChannels};
use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Sender;
use embassy_sync::mutex::Mutex;

/// [`Notifier`] that feeds the session's notification channel
///
/// Notifications that do not fit are dropped with a warning; the state
/// machine never waits for the application.
pub struct ChannelNotifier<'a, M: RawMutex> {
    sender: Sender<'a, M, Notification, MAX_QUEUED_EVENTS>,
}

impl<'a, M: RawMutex> ChannelNotifier<'a, M> {
    pub(crate) const fn new(sender: Sender<'a, M, Notification, MAX_QUEUED_EVENTS>) -> Self {
        Self { sender }
    }
}

impl<M: RawMutex> Notifier for ChannelNotifier<'_, M> {
    fn notify(&mut self, notification: Notification) {
        if self.sender.try_send(notification).is_err() {
            warn!("[PROCESSOR] notification channel full, dropping notification");
        }
    }
}

fn process_request(
    manager: &mut StreamManager,
    collab: &mut Collaborators<'_>,
    request: ApiRequest,
) {
    let handle = request.handle();
    debug!("[PROCESSOR] request for stream {}", handle);
    match request.into_event() {
        Some(event) => manager.handle_event(collab, handle, event),
        None => {
            if let Err(e) = manager.deregister(collab, handle) {
                warn!("[PROCESSOR] deregister of stream {} failed: {:?}", handle, e);
            }
        }
    }
}

fn process_envelope(
    manager: &mut StreamManager,
    collab: &mut Collaborators<'_>,
    envelope: Envelope,
) {
    match envelope {
        Envelope::Event { handle, event } => {
            trace!("[PROCESSOR] event {:?} for stream {}", event.kind(), handle);
            manager.handle_event(collab, handle, event);
        }
        Envelope::Timer { handle, id } => manager.handle_timer(collab, handle, id),
        Envelope::ServiceDiscovery { found } => {
            trace!("[PROCESSOR] service discovery result, found: {}", found);
            manager.handle_service_discovery(collab, found);
        }
    }
}

/// Run the session processor
///
/// Waits on both input channels and hands each message to the manager.
/// Collaborator events take precedence over requests when both are ready.
pub async fn run<M: RawMutex>(
    manager: &Mutex<M, StreamManager>,
    channels: &SessionChannels<M>,
    collab: &mut Collaborators<'_>,
) -> ! {
    info!("[PROCESSOR] session processor started");
    loop {
        match select(channels.events.receive(), channels.requests.receive()).await {
            Either::First(envelope) => {
                let mut manager = manager.lock().await;
                process_envelope(&mut manager, collab, envelope);
            }
            Either::Second(request) => {
                let mut manager = manager.lock().await;
                process_request(&mut manager, collab, request);
            }
        }
    }
}

/// Process everything already queued without waiting for more
///
/// Returns the number of messages handled. Meant for cooperative schedulers
/// that poll the session from their own loop.
pub async fn drain<M: RawMutex>(
    manager: &Mutex<M, StreamManager>,
    channels: &SessionChannels<M>,
    collab: &mut Collaborators<'_>,
) -> usize {
    let mut manager = manager.lock().await;
    let mut processed = 0;
    loop {
        if let Ok(envelope) = channels.events.try_receive() {
            process_envelope(&mut manager, collab, envelope);
        } else if let Ok(request) = channels.requests.try_receive() {
            process_request(&mut manager, collab, request);
        } else {
            break;
        }
        processed += 1;
    }
    if processed > 0 {
        debug!("[PROCESSOR] drained {} messages", processed);
    }
    processed
}
