use crate::net::errors::ParseError;
use crate::net::ip_flags::IpFlags;
use std::net::Ipv4Addr;

/// An IPv4 header. Options are not supported: headers are always 20 bytes,
/// on parse and on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version: u8, // Always 4
    pub ihl: u8,     // Header length in 32-bit words; always 5 without options
    pub tos: u8,
    pub total_len: u16,
    pub id: u16,
    pub flags: IpFlags,   // 3 bits, part of u16
    pub frag_offset: u16, // 13 bits, part of u16
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
}

impl Default for Ipv4Header {
    fn default() -> Self {
        Ipv4Header {
            version: 4,
            ihl: 5,
            tos: 0,
            total_len: Self::LENGTH as u16,
            id: 0,
            flags: IpFlags::empty(),
            frag_offset: 0,
            ttl: 64,
            protocol: Self::PROTOCOL_TCP,
            checksum: 0,
            src_ip: Ipv4Addr::UNSPECIFIED,
            dst_ip: Ipv4Addr::UNSPECIFIED,
        }
    }
}

impl Ipv4Header {
    pub const LENGTH: usize = 20;
    pub const PROTOCOL_TCP: u8 = 6;

    /// Convert an `Ipv4Header` into a byte array of size 20, with a freshly
    /// computed checksum.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LENGTH];

        buf[0] = (self.version << 4) | self.ihl;
        buf[1] = self.tos;
        buf[2..4].copy_from_slice(&self.total_len.to_be_bytes());
        buf[4..6].copy_from_slice(&self.id.to_be_bytes());
        let flags = self.flags.pack(self.frag_offset);
        buf[6..8].copy_from_slice(&flags.to_be_bytes());
        buf[8] = self.ttl;
        buf[9] = self.protocol;
        // leave 10..12 as zeros for checksum
        buf[12..16].copy_from_slice(&self.src_ip.octets());
        buf[16..20].copy_from_slice(&self.dst_ip.octets());
        let checksum = Self::checksum(&buf);
        buf[10..12].copy_from_slice(&checksum.to_be_bytes());

        buf
    }

    /// Convert a byte slice into an `Ipv4Header`, verifying the checksum.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < Self::LENGTH {
            return Err(ParseError::Truncated {
                need: Self::LENGTH,
                have: data.len(),
            });
        }

        let version = data[0] >> 4;
        if version != 4 {
            return Err(ParseError::Unsupported {
                field: "version",
                value: version as u32,
            });
        }
        let ihl = data[0] & 0x0f;
        if ihl != 5 {
            return Err(ParseError::Unsupported {
                field: "header length",
                value: ihl as u32,
            });
        }
        if Self::checksum(&data[..Self::LENGTH]) != 0 {
            return Err(ParseError::BadChecksum);
        }

        let tos = data[1];
        let total_len = u16::from_be_bytes([data[2], data[3]]);
        let id = u16::from_be_bytes([data[4], data[5]]);
        let combo_flags = u16::from_be_bytes([data[6], data[7]]);
        let (flags, frag_offset) = IpFlags::unpack(combo_flags);
        let ttl = data[8];
        let protocol = data[9];
        let checksum = u16::from_be_bytes([data[10], data[11]]);
        let src_ip = Ipv4Addr::new(data[12], data[13], data[14], data[15]);
        let dst_ip = Ipv4Addr::new(data[16], data[17], data[18], data[19]);

        Ok(Self {
            version,
            ihl,
            tos,
            total_len,
            id,
            flags,
            frag_offset,
            ttl,
            protocol,
            checksum,
            src_ip,
            dst_ip,
        })
    }

    /// Recompute and store the header checksum, e.g. after a TTL change.
    pub fn compute_checksum(&mut self) {
        let bytes = self.to_bytes(); // embeds a fresh checksum
        self.checksum = u16::from_be_bytes([bytes[10], bytes[11]]);
    }

    /// The RFC 1071 ones-complement checksum of a serialized header. A
    /// header whose stored checksum is intact folds to zero.
    pub fn checksum(data: &[u8]) -> u16 {
        // Running total of the header's big-endian 16-bit words
        let mut sum: u32 = data
            .chunks(2)
            .map(|word| u16::from_be_bytes([word[0], word[1]]) as u32)
            .sum();

        // End-around carry: wrap the overflow back into the low 16 bits
        while sum > 0xffff {
            sum = (sum >> 16) + (sum & 0xffff);
        }

        !(sum as u16)
    }
}

/// A complete IPv4 datagram: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Datagram {
    pub header: Ipv4Header,
    pub payload: Vec<u8>,
}

impl Ipv4Datagram {
    /// Build a datagram, fixing up the header's length and checksum to match
    /// the payload.
    pub fn new(mut header: Ipv4Header, payload: Vec<u8>) -> Self {
        header.total_len = (Ipv4Header::LENGTH + payload.len()) as u16;
        header.compute_checksum();
        Ipv4Datagram { header, payload }
    }

    /// Convert an `Ipv4Datagram` into a byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = self.header.to_bytes();
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Convert a byte slice into an `Ipv4Datagram`. The payload is bounded
    /// by the header's total length; trailing padding is dropped.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        let header = Ipv4Header::from_bytes(data)?;

        let total_len = header.total_len as usize;
        if total_len < Ipv4Header::LENGTH || total_len > data.len() {
            return Err(ParseError::Truncated {
                need: total_len,
                have: data.len(),
            });
        }

        Ok(Self {
            payload: data[Ipv4Header::LENGTH..total_len].to_vec(),
            header,
        })
    }
}

// -- Unit tests --
