use crate::a2dp::A2dpError;
use crate::constants::BD_ADDR_LENGTH;

/// A Bluetooth Device Address (`BD_ADDR`) identifying the remote end of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BluetoothAddress(pub [u8; BD_ADDR_LENGTH]);

impl BluetoothAddress {
    /// The all-zero address, used while a control block has no peer
    pub const EMPTY: Self = Self([0; BD_ADDR_LENGTH]);

    /// Create a new Bluetooth address from bytes
    #[must_use]
    pub const fn new(addr: [u8; BD_ADDR_LENGTH]) -> Self {
        Self(addr)
    }

    /// Get the raw address bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; BD_ADDR_LENGTH] {
        &self.0
    }

    /// True for the all-zero address
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Format the address as a colon-separated hex string
    #[must_use]
    pub fn format_hex(&self) -> heapless::String<17> {
        const HEX: &[u8; 16] = b"0123456789ABCDEF";
        let mut result = heapless::String::new();
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                result.push(':').ok();
            }
            result.push(HEX[(byte >> 4) as usize] as char).ok();
            result.push(HEX[(byte & 0x0F) as usize] as char).ok();
        }
        result
    }
}

impl From<[u8; BD_ADDR_LENGTH]> for BluetoothAddress {
    fn from(addr: [u8; BD_ADDR_LENGTH]) -> Self {
        Self(addr)
    }
}

impl From<BluetoothAddress> for bt_hci::param::BdAddr {
    fn from(addr: BluetoothAddress) -> Self {
        bt_hci::param::BdAddr::new(addr.0)
    }
}

impl From<bt_hci::param::BdAddr> for BluetoothAddress {
    fn from(bd_addr: bt_hci::param::BdAddr) -> Self {
        let mut addr = [0u8; BD_ADDR_LENGTH];
        addr.copy_from_slice(bd_addr.raw());
        Self(addr)
    }
}

impl TryFrom<&[u8]> for BluetoothAddress {
    type Error = A2dpError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let addr: [u8; BD_ADDR_LENGTH] = bytes
            .try_into()
            .map_err(|_| A2dpError::InvalidEndpoint)?;
        Ok(Self(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bluetooth_address_format_hex() {
        let addr = BluetoothAddress::new([0x0A, 0xB1, 0x2C, 0xD3, 0x4E, 0xF5]);
        assert_eq!(addr.format_hex().as_str(), "0A:B1:2C:D3:4E:F5");
        assert_eq!(BluetoothAddress::EMPTY.format_hex().as_str(), "00:00:00:00:00:00");
    }

    #[test]
    fn test_bluetooth_address_empty() {
        assert!(BluetoothAddress::EMPTY.is_empty());
        assert!(BluetoothAddress::default().is_empty());
        assert!(!BluetoothAddress::new([0, 0, 0, 0, 0, 1]).is_empty());
    }

    #[test]
    fn test_bluetooth_address_bd_addr_round_trip() {
        let bytes = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC];
        let addr = BluetoothAddress::from(bytes);
        let bd_addr: bt_hci::param::BdAddr = addr.into();
        assert_eq!(bd_addr.raw(), &bytes);
        assert_eq!(BluetoothAddress::from(bd_addr), addr);
    }

    #[test]
    fn test_bluetooth_address_try_from_slice() {
        let ok = BluetoothAddress::try_from(&[1u8, 2, 3, 4, 5, 6][..]).unwrap();
        assert_eq!(ok.as_bytes(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(
            BluetoothAddress::try_from(&[1u8, 2, 3][..]),
            Err(A2dpError::InvalidEndpoint)
        );
    }
}
