use crate::net::errors::ParseError;
use std::fmt;

/// A 48-bit Ethernet (hardware) address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EthernetAddress(pub [u8; 6]);

/// Destination of every broadcast frame.
pub const ETHERNET_BROADCAST: EthernetAddress = EthernetAddress([0xff; 6]);

impl fmt::Display for EthernetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Ethernet frame header: two addresses and the payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dst: EthernetAddress,
    pub src: EthernetAddress,
    pub ethertype: u16,
}

impl EthernetHeader {
    pub const LENGTH: usize = 14;
    pub const TYPE_IPV4: u16 = 0x0800;
    pub const TYPE_ARP: u16 = 0x0806;

    /// Convert an `EthernetHeader` into a byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LENGTH];
        buf[0..6].copy_from_slice(&self.dst.0);
        buf[6..12].copy_from_slice(&self.src.0);
        buf[12..14].copy_from_slice(&self.ethertype.to_be_bytes());
        buf
    }

    /// Convert a byte slice into an `EthernetHeader`.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < Self::LENGTH {
            return Err(ParseError::Truncated {
                need: Self::LENGTH,
                have: data.len(),
            });
        }

        let mut dst = [0u8; 6];
        let mut src = [0u8; 6];
        dst.copy_from_slice(&data[0..6]);
        src.copy_from_slice(&data[6..12]);
        let ethertype = u16::from_be_bytes([data[12], data[13]]);

        Ok(Self {
            dst: EthernetAddress(dst),
            src: EthernetAddress(src),
            ethertype,
        })
    }
}

/// A complete frame: header plus payload.
#[derive(Debug, Clone)]
pub struct EthernetFrame {
    pub header: EthernetHeader,
    pub payload: Vec<u8>,
}

impl EthernetFrame {
    /// Convert an `EthernetFrame` into a byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = self.header.to_bytes();
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Convert a byte slice into an `EthernetFrame`.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        let header = EthernetHeader::from_bytes(data)?;
        Ok(Self {
            header,
            payload: data[EthernetHeader::LENGTH..].to_vec(),
        })
    }
}

// -- Unit tests --
