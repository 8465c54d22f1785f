//! Link role coordinator interface

use crate::BluetoothAddress;

/// Link-layer policy queried before opening or starting a stream
pub trait LinkRoleCoordinator {
    /// Start a role switch towards `peer` if policy asks for one.
    ///
    /// Returns true when a switch was started; its outcome arrives as
    /// [`SsmEvent::RoleChange`](super::SsmEvent::RoleChange).
    fn switch_if_needed(&mut self, peer: BluetoothAddress) -> bool;

    /// True when the current link role towards `peer` is acceptable
    fn role_ok(&mut self, peer: BluetoothAddress, require_master: bool) -> bool;

    /// True while a voice call holds the radio
    fn sco_busy(&mut self) -> bool;
}
