//! `BondyBird` A2DP API Functions
//!
//! Public entry points for the application and for the collaborator glue
//! code. Requests are queued on the [`SessionChannels`] and handled by the
//! processor; their outcome comes back later as a [`Notification`].
//! Registration and state queries lock the shared [`StreamManager`]
//! directly.
//!
//! # Usage
//!
//! ```rust,ignore
//! use bondybird_a2dp::api;
//! use bondybird_a2dp::a2dp::{Role, MediaType};
//!
//! let handle = api::register(&MANAGER, Role::Source, MediaType::Audio).await?;
//! api::open(&CHANNELS, handle, peer, true).await;
//! loop {
//!     match api::next_notification(&CHANNELS).await {
//!         Notification::Opened { status, .. } if status.is_success() => {
//!             api::start(&CHANNELS, handle).await;
//!         }
//!         _ => {}
//!     }
//! }
//! ```

use crate::a2dp::avdtp::{MediaType, StreamConfig};
use crate::a2dp::event::{Notification, ProtectData, SsmEvent};
use crate::a2dp::manager::StreamManager;
use crate::a2dp::ssm::StreamState;
use crate::a2dp::timer::TimerId;
use crate::a2dp::{A2dpError, AvStatus, AvdtpErrorCode, Role, StreamHandle};
use crate::{ApiRequest, BluetoothAddress, Envelope, SessionChannels};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;

/// Register a local stream endpoint and get its handle.
///
/// # Errors
///
/// Returns [`A2dpError::TooManyStreams`] when every control block is in use.
pub async fn register<M: RawMutex>(
    manager: &Mutex<M, StreamManager>,
    role: Role,
    media_type: MediaType,
) -> Result<StreamHandle, A2dpError> {
    manager.lock().await.register(role, media_type)
}

/// Current session state of a stream.
///
/// # Errors
///
/// Returns [`A2dpError::InvalidHandle`] for an unknown stream.
pub async fn stream_state<M: RawMutex>(
    manager: &Mutex<M, StreamManager>,
    handle: StreamHandle,
) -> Result<StreamState, A2dpError> {
    manager
        .lock()
        .await
        .state(handle)
        .ok_or(A2dpError::InvalidHandle)
}

/// Release a stream; an active stream is closed first.
pub async fn deregister<M: RawMutex>(channels: &SessionChannels<M>, handle: StreamHandle) {
    channels.requests.send(ApiRequest::Deregister { handle }).await;
}

/// Open a stream towards `peer`.
pub async fn open<M: RawMutex>(
    channels: &SessionChannels<M>,
    handle: StreamHandle,
    peer: BluetoothAddress,
    use_rc: bool,
) {
    channels
        .requests
        .send(ApiRequest::Open {
            handle,
            peer,
            use_rc,
        })
        .await;
}

/// Close a stream.
pub async fn close<M: RawMutex>(channels: &SessionChannels<M>, handle: StreamHandle) {
    channels.requests.send(ApiRequest::Close { handle }).await;
}

/// Start streaming.
pub async fn start<M: RawMutex>(channels: &SessionChannels<M>, handle: StreamHandle) {
    channels.requests.send(ApiRequest::Start { handle }).await;
}

/// Stop streaming locally, keeping the stream started on the peer.
pub async fn stop<M: RawMutex>(channels: &SessionChannels<M>, handle: StreamHandle, flush: bool) {
    channels
        .requests
        .send(ApiRequest::Stop {
            handle,
            suspend: false,
            flush,
        })
        .await;
}

/// Suspend the stream on the peer.
pub async fn suspend<M: RawMutex>(channels: &SessionChannels<M>, handle: StreamHandle) {
    channels
        .requests
        .send(ApiRequest::Stop {
            handle,
            suspend: true,
            flush: false,
        })
        .await;
}

/// Reconfigure a stream, on the remote endpoint at `sep_index`.
///
/// With `suspend` set and the peer supporting it, the stream is suspended
/// and reconfigured in place; otherwise it is closed and reopened.
pub async fn reconfigure<M: RawMutex>(
    channels: &SessionChannels<M>,
    handle: StreamHandle,
    config: StreamConfig,
    sep_index: u8,
    suspend: bool,
) {
    channels
        .requests
        .send(ApiRequest::Reconfigure {
            handle,
            config,
            sep_index,
            suspend,
        })
        .await;
}

/// Send a content protection request to the peer.
///
/// # Errors
///
/// Returns [`A2dpError::QueueFull`] if `data` exceeds the protection payload capacity.
pub async fn protect_request<M: RawMutex>(
    channels: &SessionChannels<M>,
    handle: StreamHandle,
    data: &[u8],
) -> Result<(), A2dpError> {
    let data = ProtectData::from_slice(data).map_err(|()| A2dpError::QueueFull)?;
    channels
        .requests
        .send(ApiRequest::ProtectRequest { handle, data })
        .await;
    Ok(())
}

/// Answer a content protection request from the peer.
///
/// # Errors
///
/// Returns [`A2dpError::QueueFull`] if `data` exceeds the protection payload capacity.
pub async fn protect_response<M: RawMutex>(
    channels: &SessionChannels<M>,
    handle: StreamHandle,
    error: AvdtpErrorCode,
    data: &[u8],
) -> Result<(), A2dpError> {
    let data = ProtectData::from_slice(data).map_err(|()| A2dpError::QueueFull)?;
    channels
        .requests
        .send(ApiRequest::ProtectResponse {
            handle,
            error,
            data,
        })
        .await;
    Ok(())
}

/// Ask for remote control on an open stream.
pub async fn open_remote_control<M: RawMutex>(
    channels: &SessionChannels<M>,
    handle: StreamHandle,
) {
    channels
        .requests
        .send(ApiRequest::RemoteControlOpen { handle })
        .await;
}

/// Hand a started stream's data path to the hardware codec.
pub async fn start_offload<M: RawMutex>(channels: &SessionChannels<M>, handle: StreamHandle) {
    channels
        .requests
        .send(ApiRequest::OffloadStart { handle })
        .await;
}

/// Tell the stream the encoder has media ready.
pub async fn data_ready<M: RawMutex>(channels: &SessionChannels<M>, handle: StreamHandle) {
    channels.requests.send(ApiRequest::DataReady { handle }).await;
}

/// Post a transport, codec or link event for a stream.
pub async fn post_event<M: RawMutex>(
    channels: &SessionChannels<M>,
    handle: StreamHandle,
    event: SsmEvent,
) {
    channels.events.send(Envelope::Event { handle, event }).await;
}

/// Post an event from a context that cannot wait, such as a controller callback.
///
/// # Errors
///
/// Returns [`A2dpError::QueueFull`] when the event channel is full.
pub fn try_post_event<M: RawMutex>(
    channels: &SessionChannels<M>,
    handle: StreamHandle,
    event: SsmEvent,
) -> Result<(), A2dpError> {
    channels
        .events
        .try_send(Envelope::Event { handle, event })
        .map_err(|_| A2dpError::QueueFull)
}

/// Report the hardware codec's answer to an offload start.
pub async fn offload_response<M: RawMutex>(
    channels: &SessionChannels<M>,
    handle: StreamHandle,
    status: AvStatus,
) {
    post_event(channels, handle, SsmEvent::OffloadStartRsp { status }).await;
}

/// Report an expired stream timer.
pub async fn timer_expired<M: RawMutex>(
    channels: &SessionChannels<M>,
    handle: StreamHandle,
    id: TimerId,
) {
    channels.events.send(Envelope::Timer { handle, id }).await;
}

/// Report the result of the shared service discovery.
pub async fn service_discovery_complete<M: RawMutex>(channels: &SessionChannels<M>, found: bool) {
    channels
        .events
        .send(Envelope::ServiceDiscovery { found })
        .await;
}

/// Wait for the next notification.
pub async fn next_notification<M: RawMutex>(channels: &SessionChannels<M>) -> Notification {
    channels.notifications.receive().await
}

/// Take a notification if one is queued.
pub fn try_notification<M: RawMutex>(channels: &SessionChannels<M>) -> Option<Notification> {
    channels.notifications.try_receive().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionOptions;
    use crate::constants::{MAX_PROTECT_LEN, MAX_QUEUED_EVENTS, MAX_STREAMS};
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[test]
    fn test_register_until_full() {
        let manager = Mutex::<NoopRawMutex, _>::new(StreamManager::new(SessionOptions::default()));
        for _ in 0..MAX_STREAMS {
            assert!(block_on(register(&manager, Role::Source, MediaType::Audio)).is_ok());
        }
        assert_eq!(
            block_on(register(&manager, Role::Source, MediaType::Audio)),
            Err(A2dpError::TooManyStreams)
        );
    }

    #[test]
    fn test_stream_state_of_new_stream() {
        let manager = Mutex::<NoopRawMutex, _>::new(StreamManager::new(SessionOptions::default()));
        let handle = block_on(register(&manager, Role::Sink, MediaType::Audio)).unwrap();
        assert_eq!(block_on(stream_state(&manager, handle)), Ok(StreamState::Init));
        assert_eq!(
            block_on(stream_state(&manager, handle.wrapping_add(1))),
            Err(A2dpError::InvalidHandle)
        );
    }

    #[test]
    fn test_requests_are_queued_in_order() {
        let channels: SessionChannels<NoopRawMutex> = SessionChannels::new();
        block_on(start(&channels, 1));
        block_on(suspend(&channels, 1));
        assert_eq!(
            channels.requests.try_receive(),
            Ok(ApiRequest::Start { handle: 1 })
        );
        assert_eq!(
            channels.requests.try_receive(),
            Ok(ApiRequest::Stop {
                handle: 1,
                suspend: true,
                flush: false
            })
        );
        assert!(channels.requests.try_receive().is_err());
    }

    #[test]
    fn test_protect_payload_is_bounded() {
        let channels: SessionChannels<NoopRawMutex> = SessionChannels::new();
        let long = [0u8; MAX_PROTECT_LEN + 1];
        assert_eq!(
            block_on(protect_request(&channels, 1, &long)),
            Err(A2dpError::QueueFull)
        );
        assert!(block_on(protect_request(&channels, 1, &[1, 2])).is_ok());
        assert!(matches!(
            channels.requests.try_receive(),
            Ok(ApiRequest::ProtectRequest { handle: 1, .. })
        ));
    }

    #[test]
    fn test_try_post_event_reports_full_channel() {
        let channels: SessionChannels<NoopRawMutex> = SessionChannels::new();
        for _ in 0..MAX_QUEUED_EVENTS {
            assert!(try_post_event(&channels, 1, SsmEvent::StrWriteCfm).is_ok());
        }
        assert_eq!(
            try_post_event(&channels, 1, SsmEvent::StrWriteCfm),
            Err(A2dpError::QueueFull)
        );
    }
}
