//! Recording collaborators for unit tests

use super::avdtp::StreamConfig;
use super::callout::{AudioFormat, CodecCallout};
use super::codec::{CodecInfo, SbcCapabilities};
use super::data_path::MediaFrame;
use super::event::{Notification, Notifier};
use super::link::LinkRoleCoordinator;
use super::manager::Collaborators;
use super::offload::{OffloadController, OffloadParams};
use super::timer::{TimerId, TimerService};
use super::transport::StreamTransport;
use super::{A2dpError, AvdtpErrorCode, StreamEndpointId, StreamHandle};
use crate::BluetoothAddress;
use bt_hci::param::ConnHandle;
use heapless::{Deque, Vec};

pub(crate) const PEER: BluetoothAddress = BluetoothAddress::new([0x00, 0x1B, 0xDC, 0x07, 0x32, 0xF1]);

/// SBC configuration offered by the test peer
pub(crate) fn sbc_config() -> StreamConfig {
    StreamConfig::with_codec(CodecInfo::sbc(&SbcCapabilities::high_quality()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransportCall {
    Connect,
    Disconnect,
    FindService,
    Discover,
    GetCapabilities(StreamEndpointId),
    Open(StreamHandle, StreamEndpointId),
    ConfigResponse(StreamHandle, AvdtpErrorCode),
    Start(StreamHandle),
    Suspend(StreamHandle),
    Close(StreamHandle),
    Reconfigure(StreamHandle),
    SecurityRequest(StreamHandle),
    SecurityResponse(StreamHandle, AvdtpErrorCode),
    Flush(StreamHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WriteRecord {
    pub handle: StreamHandle,
    pub len: usize,
    pub timestamp: u32,
    pub marker: bool,
}

#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    pub calls: Vec<TransportCall, 128>,
    pub writes: Vec<WriteRecord, 32>,
    pub fail_connect: bool,
    pub fail_disconnect: bool,
    pub fail_open: bool,
    pub fail_start: bool,
    pub fail_close: bool,
    pub queued: usize,
}

impl MockTransport {
    fn record(&mut self, call: TransportCall, fail: bool) -> Result<(), A2dpError> {
        self.calls.push(call).ok();
        if fail {
            Err(A2dpError::Transport)
        } else {
            Ok(())
        }
    }

    pub fn has(&self, call: TransportCall) -> bool {
        self.calls.contains(&call)
    }

    pub fn count(&self, call: TransportCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }

    pub fn position(&self, call: TransportCall) -> Option<usize> {
        self.calls.iter().position(|c| *c == call)
    }
}

impl StreamTransport for MockTransport {
    fn connect(&mut self, _peer: BluetoothAddress) -> Result<(), A2dpError> {
        let fail = self.fail_connect;
        self.record(TransportCall::Connect, fail)
    }

    fn disconnect(&mut self, _peer: BluetoothAddress) -> Result<(), A2dpError> {
        let fail = self.fail_disconnect;
        self.record(TransportCall::Disconnect, fail)
    }

    fn find_service(&mut self, _peer: BluetoothAddress) -> Result<(), A2dpError> {
        self.record(TransportCall::FindService, false)
    }

    fn discover(&mut self, _peer: BluetoothAddress) -> Result<(), A2dpError> {
        self.record(TransportCall::Discover, false)
    }

    fn get_capabilities(
        &mut self,
        _peer: BluetoothAddress,
        seid: StreamEndpointId,
    ) -> Result<(), A2dpError> {
        self.record(TransportCall::GetCapabilities(seid), false)
    }

    fn open(
        &mut self,
        handle: StreamHandle,
        _peer: BluetoothAddress,
        seid: StreamEndpointId,
        _config: &StreamConfig,
    ) -> Result<(), A2dpError> {
        let fail = self.fail_open;
        self.record(TransportCall::Open(handle, seid), fail)
    }

    fn config_response(&mut self, handle: StreamHandle, error: AvdtpErrorCode) {
        self.record(TransportCall::ConfigResponse(handle, error), false)
            .ok();
    }

    fn start(&mut self, handles: &[StreamHandle]) -> Result<(), A2dpError> {
        let fail = self.fail_start;
        for handle in handles {
            self.record(TransportCall::Start(*handle), fail)?;
        }
        Ok(())
    }

    fn suspend(&mut self, handles: &[StreamHandle]) -> Result<(), A2dpError> {
        for handle in handles {
            self.record(TransportCall::Suspend(*handle), false)?;
        }
        Ok(())
    }

    fn close(&mut self, handle: StreamHandle) -> Result<(), A2dpError> {
        let fail = self.fail_close;
        self.record(TransportCall::Close(handle), fail)
    }

    fn reconfigure(
        &mut self,
        handle: StreamHandle,
        _config: &StreamConfig,
    ) -> Result<(), A2dpError> {
        self.record(TransportCall::Reconfigure(handle), false)
    }

    fn security_request(&mut self, handle: StreamHandle, _data: &[u8]) {
        self.record(TransportCall::SecurityRequest(handle), false)
            .ok();
    }

    fn security_response(&mut self, handle: StreamHandle, error: AvdtpErrorCode, _data: &[u8]) {
        self.record(TransportCall::SecurityResponse(handle, error), false)
            .ok();
    }

    fn write(
        &mut self,
        handle: StreamHandle,
        fragment: &[u8],
        timestamp: u32,
        marker: bool,
    ) -> Result<(), A2dpError> {
        self.writes
            .push(WriteRecord {
                handle,
                len: fragment.len(),
                timestamp,
                marker,
            })
            .map_err(|_| A2dpError::QueueFull)
    }

    fn queued_buffers(&mut self, _handle: StreamHandle) -> usize {
        self.queued
    }

    fn flush(&mut self, handle: StreamHandle) {
        self.record(TransportCall::Flush(handle), false).ok();
    }

    fn remote_cid(&mut self, _handle: StreamHandle) -> u16 {
        0x0041
    }

    fn acl_handle(&mut self, _peer: BluetoothAddress) -> ConnHandle {
        ConnHandle::new(0x0001)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CodecCall {
    DiscRes { num_seps: usize, num_sinks: usize },
    Getcfg(StreamEndpointId),
    Setcfg(StreamEndpointId),
    Open(u16),
    Close,
    Start,
    Stop,
    Delay(u16),
    UpdateMtu(u16),
}

#[derive(Debug)]
pub(crate) struct MockCodec {
    pub calls: Vec<CodecCall, 64>,
    pub frames: Deque<MediaFrame, 8>,
    pub accept_caps: bool,
    pub dropped: usize,
    pub format: Option<AudioFormat>,
    pub cp_active: bool,
}

impl Default for MockCodec {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            frames: Deque::new(),
            accept_caps: true,
            dropped: 0,
            format: Some(AudioFormat {
                sample_rate: 44_100,
                bits_per_sample: 16,
                channel_count: 2,
                bitrate: 328_000,
            }),
            cp_active: false,
        }
    }
}

impl MockCodec {
    pub fn has(&self, call: CodecCall) -> bool {
        self.calls.contains(&call)
    }
}

impl CodecCallout for MockCodec {
    fn disc_res(
        &mut self,
        _handle: StreamHandle,
        num_seps: usize,
        num_sinks: usize,
        _peer: BluetoothAddress,
    ) {
        self.calls
            .push(CodecCall::DiscRes {
                num_seps,
                num_sinks,
            })
            .ok();
    }

    fn getcfg(
        &mut self,
        _handle: StreamHandle,
        peer_caps: &StreamConfig,
        seid: StreamEndpointId,
    ) -> Result<StreamConfig, AvdtpErrorCode> {
        self.calls.push(CodecCall::Getcfg(seid)).ok();
        match (&peer_caps.codec, self.accept_caps) {
            (Some(codec), true) => Ok(StreamConfig::with_codec(codec.clone())),
            _ => Err(AvdtpErrorCode::UNSUP_CFG),
        }
    }

    fn setcfg(&mut self, _handle: StreamHandle, _config: &StreamConfig, seid: StreamEndpointId) {
        self.calls.push(CodecCall::Setcfg(seid)).ok();
    }

    fn open(&mut self, _handle: StreamHandle, mtu: u16) {
        self.calls.push(CodecCall::Open(mtu)).ok();
    }

    fn close(&mut self, _handle: StreamHandle) {
        self.calls.push(CodecCall::Close).ok();
    }

    fn start(&mut self, _handle: StreamHandle, _config: &StreamConfig) {
        self.calls.push(CodecCall::Start).ok();
    }

    fn stop(&mut self, _handle: StreamHandle) {
        self.calls.push(CodecCall::Stop).ok();
    }

    fn data(&mut self, _handle: StreamHandle) -> Option<MediaFrame> {
        self.frames.pop_front()
    }

    fn frame_dropped(&mut self, _handle: StreamHandle) {
        self.dropped += 1;
    }

    fn delay(&mut self, _handle: StreamHandle, delay: u16) {
        self.calls.push(CodecCall::Delay(delay)).ok();
    }

    fn update_mtu(&mut self, _handle: StreamHandle, mtu: u16) {
        self.calls.push(CodecCall::UpdateMtu(mtu)).ok();
    }

    fn cp_is_active(&mut self, _peer: BluetoothAddress) -> bool {
        self.cp_active
    }

    fn audio_format(&mut self, _codec: &CodecInfo) -> Option<AudioFormat> {
        self.format
    }
}

#[derive(Debug)]
pub(crate) struct MockLink {
    pub switch_needed: bool,
    pub role_ok: bool,
    pub sco_busy: bool,
}

impl Default for MockLink {
    fn default() -> Self {
        Self {
            switch_needed: false,
            role_ok: true,
            sco_busy: false,
        }
    }
}

impl LinkRoleCoordinator for MockLink {
    fn switch_if_needed(&mut self, _peer: BluetoothAddress) -> bool {
        self.switch_needed
    }

    fn role_ok(&mut self, _peer: BluetoothAddress, _require_master: bool) -> bool {
        self.role_ok && !self.switch_needed
    }

    fn sco_busy(&mut self) -> bool {
        self.sco_busy
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockTimers {
    pub active: Vec<(StreamHandle, TimerId), 16>,
}

impl MockTimers {
    pub fn is_running(&self, handle: StreamHandle, id: TimerId) -> bool {
        self.active.contains(&(handle, id))
    }
}

impl TimerService for MockTimers {
    fn start(&mut self, handle: StreamHandle, id: TimerId, _timeout_ms: u32) {
        self.cancel(handle, id);
        self.active.push((handle, id)).ok();
    }

    fn cancel(&mut self, handle: StreamHandle, id: TimerId) {
        self.active.retain(|entry| *entry != (handle, id));
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockOffload {
    pub starts: usize,
    pub stops: usize,
    pub fail: bool,
    pub last: Option<OffloadParams>,
}

impl OffloadController for MockOffload {
    fn start(&mut self, params: &OffloadParams) -> Result<(), A2dpError> {
        if self.fail {
            return Err(A2dpError::Transport);
        }
        self.starts += 1;
        self.last = Some(*params);
        Ok(())
    }

    fn stop(&mut self) {
        self.stops += 1;
    }
}

#[derive(Debug, Default)]
pub(crate) struct Collector {
    pub events: Vec<Notification, 64>,
}

impl Notifier for Collector {
    fn notify(&mut self, notification: Notification) {
        self.events.push(notification).ok();
    }
}

/// Every mock collaborator in one place
#[derive(Debug, Default)]
pub(crate) struct Harness {
    pub transport: MockTransport,
    pub codec: MockCodec,
    pub link: MockLink,
    pub timers: MockTimers,
    pub offload: MockOffload,
    pub notes: Collector,
}

impl Harness {
    pub fn collab(&mut self) -> Collaborators<'_> {
        Collaborators {
            transport: &mut self.transport,
            codec: &mut self.codec,
            link: &mut self.link,
            timers: &mut self.timers,
            offload: &mut self.offload,
            notifier: &mut self.notes,
        }
    }
}
