//! Stream session state table
//!
//! The session of one stream endpoint is a coarse [`StreamState`] plus the
//! gates kept in its control block. Every `(state, event)` pair maps to
//! exactly one [`Dispatch`]: either `Ignored`, or a [`Transition`] listing
//! the action routines to run and the state to enter.
//!
//! The state is entered before the actions run, so a routine observes the
//! post-transition state (a stop issued while entering `Reconfiguring`
//! knows it is part of a reconfiguration). Routines that pick the next state
//! dynamically (collision replay, open failure towards an already-open
//! peer) set it themselves.
//!
//! ## Gates consulted by actions
//!
//! | Gate | Consulted by |
//! |------|--------------|
//! | `RoleFlags::ACCEPTOR` | `RcTimer`, `StartOk`, `OpenRc`, `StreamOpened` |
//! | `RoleFlags::START_INT` | `DoStart`, `StartOk`, `StartFailed` |
//! | `RoleFlags::SUSPEND`/`SUSPEND_OPT` | `DoStart`, `StartOk`, `SuspendCfm` |
//! | `WaitMask::ROLE_SW_*` | `DoDiscovery`, `SwitchRole`, `RoleResult`, `StartOk`, `OpenRc`, `RcTimer` |
//! | `WaitMask::ACP_CAPS_*` | `SetConfigRsp`, `SaveCaps`, `StartOk` |
//! | `CollisionMask` | `AcceptConnection`, `OpenAtIncoming`, `CollisionTimeout`, `ConfigInd` |

use super::event::EventKind;

/// Coarse phase of a stream session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamState {
    /// Idle, no stream
    Init,
    /// Peer initiated, awaiting the local decision
    Incoming,
    /// Discovery, capability or open primitives outstanding
    Opening,
    /// Stream established
    Open,
    /// Configuration change in flight
    Reconfiguring,
    /// Teardown in flight
    Closing,
}

impl StreamState {
    /// Every state
    pub const ALL: [Self; 6] = [
        Self::Init,
        Self::Incoming,
        Self::Opening,
        Self::Open,
        Self::Reconfiguring,
        Self::Closing,
    ];
}

/// Named action routine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum Action {
    // discovery and negotiation
    DoDiscovery,
    QueueOpen,
    ResumeDiscovery,
    FreeSdp,
    ConnectReq,
    DiscoverReq,
    DiscResults,
    GetcapResults,
    OpenFailed,
    ConnFailed,
    SdpFailed,
    SwitchRole,
    RoleResult,
    // acceptor
    AcceptConnection,
    OpenAtIncoming,
    CollisionTimeout,
    ConfigInd,
    SetConfigRsp,
    SetConfigRej,
    DiscResultsAsAcceptor,
    SaveCaps,
    // security
    SecurityReq,
    SecurityRsp,
    SecurityInd,
    SecurityCfm,
    SecurityRej,
    // open stream
    StreamOpened,
    RcTimer,
    OpenRc,
    SetUseRc,
    DelayReport,
    DoStart,
    StartOk,
    StartFailed,
    StreamStopped,
    SuspendCfm,
    DataPath,
    ClearCongestion,
    OffloadReq,
    OffloadRsp,
    // reconfiguration
    Reconfig,
    SuspendContinue,
    ReconfigCfm,
    ReconfigStreamOk,
    ReconfigFailed,
    ReconfigConnect,
    ReconfigOpen,
    ReconfigDisconnected,
    // teardown
    DoClose,
    DisconnectReq,
    CodecClose,
    StreamClosed,
    Cleanup,
}

/// Table entry for a handled `(state, event)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Routines to run, in order
    pub actions: &'static [Action],
    /// State entered before the routines run (`None` keeps the state)
    pub next: Option<StreamState>,
}

/// Result of a table lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The event has no effect in this state
    Ignored,
    /// Run the transition
    Handle(Transition),
}

const fn stay(actions: &'static [Action]) -> Dispatch {
    Dispatch::Handle(Transition {
        actions,
        next: None,
    })
}

const fn go(actions: &'static [Action], next: StreamState) -> Dispatch {
    Dispatch::Handle(Transition {
        actions,
        next: Some(next),
    })
}

/// Look up the transition for `event` in `state`
#[must_use]
#[allow(clippy::too_many_lines)]
pub const fn dispatch(state: StreamState, event: EventKind) -> Dispatch {
    use Action as A;
    use EventKind as E;
    use StreamState as S;

    match state {
        S::Init => match event {
            E::ApiOpen => go(&[A::DoDiscovery], S::Opening),
            E::ApiClose => stay(&[A::Cleanup]),
            E::StrConfigInd => go(&[A::ConfigInd], S::Incoming),
            E::StrSecurityInd => stay(&[A::SecurityInd]),
            E::DelayReport => stay(&[A::DelayReport]),
            E::AcpConnect => go(&[A::AcceptConnection], S::Incoming),
            _ => Dispatch::Ignored,
        },
        S::Incoming => match event {
            E::ApiOpen => stay(&[A::OpenAtIncoming]),
            E::ApiClose => go(&[A::CodecClose, A::DisconnectReq], S::Closing),
            E::ApiProtectRsp => stay(&[A::SecurityRsp]),
            E::SetConfigOk => stay(&[A::SetConfigRsp, A::RcTimer]),
            E::SetConfigFail => go(&[A::SetConfigRej, A::Cleanup], S::Init),
            E::SdpDiscOk | E::SdpDiscFail => stay(&[A::FreeSdp]),
            E::StrDiscOk => stay(&[A::DiscResultsAsAcceptor]),
            E::StrGetcapOk => stay(&[A::SaveCaps]),
            E::StrOpenOk => go(&[A::StreamOpened], S::Open),
            E::StrClose => go(&[A::CodecClose, A::Cleanup], S::Init),
            E::StrConfigInd => stay(&[A::ConfigInd]),
            E::StrSecurityInd => stay(&[A::SecurityInd]),
            E::StrSecurityCfm => stay(&[A::SecurityCfm]),
            E::AvdtDisconnect => go(&[A::CodecClose, A::DisconnectReq], S::Closing),
            E::DelayReport => stay(&[A::DelayReport]),
            E::CollisionTimeout => stay(&[A::CollisionTimeout]),
            _ => Dispatch::Ignored,
        },
        S::Opening => match event {
            E::ApiOpen => stay(&[A::QueueOpen]),
            E::ApiClose => go(&[A::DoClose], S::Closing),
            E::ApiProtectReq => stay(&[A::SecurityReq]),
            E::ApiProtectRsp => stay(&[A::SecurityRsp]),
            E::SdpDiscOk | E::SdpDiscFail => stay(&[A::ConnectReq]),
            E::DiscoveryGranted => stay(&[A::ResumeDiscovery]),
            E::StrDiscOk => stay(&[A::DiscResults]),
            E::StrDiscFail => go(&[A::OpenFailed], S::Closing),
            E::StrGetcapOk => stay(&[A::GetcapResults]),
            E::StrGetcapFail => go(&[A::OpenFailed], S::Closing),
            E::StrOpenOk => go(&[A::RcTimer, A::StreamOpened], S::Open),
            E::StrOpenFail => go(&[A::OpenFailed], S::Closing),
            E::StrConfigInd => go(&[A::ConfigInd], S::Incoming),
            E::StrSecurityInd => stay(&[A::SecurityInd]),
            E::StrSecurityCfm => stay(&[A::SecurityCfm]),
            E::AvrcTimer => stay(&[A::SwitchRole]),
            E::AvdtConnect => stay(&[A::DiscoverReq]),
            E::AvdtDisconnect => go(&[A::ConnFailed], S::Init),
            E::RoleChange => stay(&[A::RoleResult]),
            E::DelayReport => stay(&[A::DelayReport]),
            _ => Dispatch::Ignored,
        },
        S::Open => match event {
            E::ApiClose => go(&[A::DoClose], S::Closing),
            E::ApiStart => stay(&[A::DoStart]),
            E::ApiStop => stay(&[A::StreamStopped]),
            E::ApiReconfig => go(&[A::Reconfig], S::Reconfiguring),
            E::ApiProtectReq => stay(&[A::SecurityReq]),
            E::ApiProtectRsp => stay(&[A::SecurityRsp]),
            E::ApiRcOpen => stay(&[A::SetUseRc]),
            E::SrcDataReady => stay(&[A::DataPath]),
            E::ApiOffloadStart => stay(&[A::OffloadReq]),
            E::OffloadStartRsp => stay(&[A::OffloadRsp]),
            E::SdpDiscOk | E::SdpDiscFail => stay(&[A::FreeSdp]),
            E::StrGetcapOk => stay(&[A::SaveCaps]),
            E::StrStartOk => stay(&[A::StartOk]),
            E::StrStartFail => stay(&[A::StartFailed]),
            E::StrClose => go(&[A::StreamClosed], S::Init),
            E::StrConfigInd => stay(&[A::SetConfigRej]),
            E::StrSecurityInd => stay(&[A::SecurityInd]),
            E::StrSecurityCfm => stay(&[A::SecurityCfm]),
            E::StrWriteCfm => stay(&[A::ClearCongestion, A::DataPath]),
            E::StrSuspendCfm => stay(&[A::SuspendCfm]),
            E::AvrcTimer => stay(&[A::OpenRc]),
            E::AvdtDisconnect => go(&[A::StreamClosed], S::Init),
            E::RoleChange => stay(&[A::RoleResult]),
            E::DelayReport => stay(&[A::DelayReport]),
            _ => Dispatch::Ignored,
        },
        S::Reconfiguring => match event {
            E::ApiClose => go(&[A::DisconnectReq], S::Closing),
            E::ApiReconfig => stay(&[A::Reconfig]),
            E::OffloadStartRsp => stay(&[A::OffloadRsp]),
            E::SdpDiscOk | E::SdpDiscFail => stay(&[A::FreeSdp]),
            E::StrDiscOk => stay(&[A::DiscResults]),
            E::StrDiscFail => go(&[A::StreamClosed], S::Init),
            E::StrGetcapOk => stay(&[A::GetcapResults]),
            E::StrGetcapFail => go(&[A::StreamClosed], S::Init),
            E::StrOpenOk => go(&[A::ReconfigStreamOk], S::Open),
            E::StrOpenFail => stay(&[A::ReconfigFailed]),
            E::StrClose => stay(&[A::ReconfigConnect]),
            E::StrConfigInd => stay(&[A::SetConfigRej]),
            E::StrSuspendCfm => stay(&[A::SuspendContinue]),
            E::StrReconfigCfm => stay(&[A::ReconfigCfm]),
            E::AvdtConnect => stay(&[A::ReconfigOpen]),
            E::AvdtDisconnect => stay(&[A::ReconfigDisconnected]),
            E::DelayReport => stay(&[A::DelayReport]),
            _ => Dispatch::Ignored,
        },
        S::Closing => match event {
            E::ApiClose => stay(&[A::DisconnectReq]),
            E::OffloadStartRsp => stay(&[A::OffloadRsp]),
            E::SdpDiscOk | E::SdpDiscFail => go(&[A::SdpFailed], S::Init),
            E::StrOpenOk => stay(&[A::DoClose]),
            E::StrOpenFail => stay(&[A::DisconnectReq]),
            E::StrClose => stay(&[A::DisconnectReq]),
            E::StrConfigInd => stay(&[A::SetConfigRej]),
            E::StrSecurityInd => stay(&[A::SecurityRej]),
            E::AvdtDisconnect => go(&[A::StreamClosed], S::Init),
            _ => Dispatch::Ignored,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(state: StreamState, event: EventKind) -> Transition {
        match dispatch(state, event) {
            Dispatch::Handle(transition) => transition,
            Dispatch::Ignored => panic!("{:?} ignored in {:?}", event, state),
        }
    }

    #[test]
    fn test_table_is_total_and_well_formed() {
        let mut handled = 0;
        for state in StreamState::ALL {
            for event in EventKind::ALL {
                match dispatch(state, event) {
                    Dispatch::Ignored => {}
                    Dispatch::Handle(transition) => {
                        assert!(!transition.actions.is_empty());
                        handled += 1;
                    }
                }
            }
        }
        assert!(handled > 90);
    }

    #[test]
    fn test_open_path() {
        let t = transition(StreamState::Init, EventKind::ApiOpen);
        assert_eq!(t.next, Some(StreamState::Opening));
        let t = transition(StreamState::Opening, EventKind::StrOpenOk);
        assert_eq!(t.actions, &[Action::RcTimer, Action::StreamOpened]);
        assert_eq!(t.next, Some(StreamState::Open));
    }

    #[test]
    fn test_late_events_after_teardown_are_ignored() {
        assert_eq!(
            dispatch(StreamState::Init, EventKind::StrGetcapOk),
            Dispatch::Ignored
        );
        assert_eq!(
            dispatch(StreamState::Init, EventKind::StrStartOk),
            Dispatch::Ignored
        );
        assert_eq!(
            dispatch(StreamState::Init, EventKind::ApiStop),
            Dispatch::Ignored
        );
        assert_eq!(
            dispatch(StreamState::Closing, EventKind::StrGetcapOk),
            Dispatch::Ignored
        );
    }

    #[test]
    fn test_delay_report_forwarded_outside_closing() {
        for state in StreamState::ALL {
            let handled = matches!(
                dispatch(state, EventKind::DelayReport),
                Dispatch::Handle(_)
            );
            assert_eq!(handled, state != StreamState::Closing);
        }
    }

    #[test]
    fn test_reconfiguration_converges_on_open() {
        let t = transition(StreamState::Open, EventKind::ApiReconfig);
        assert_eq!(t.next, Some(StreamState::Reconfiguring));
        let t = transition(StreamState::Reconfiguring, EventKind::StrOpenOk);
        assert_eq!(t.next, Some(StreamState::Open));
        let t = transition(StreamState::Reconfiguring, EventKind::ApiClose);
        assert_eq!(t.next, Some(StreamState::Closing));
    }

    #[test]
    fn test_closing_rejects_security() {
        let t = transition(StreamState::Closing, EventKind::StrSecurityInd);
        assert_eq!(t.actions, &[Action::SecurityRej]);
    }
}
