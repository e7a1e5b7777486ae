pub mod arp;
pub mod errors;
pub mod ethernet;
pub mod ip_flags;
pub mod ip_header;

// -- Re-export structs for more concise usage

pub use arp::ArpMessage;
pub use errors::ParseError;
pub use ethernet::{EthernetAddress, EthernetFrame, EthernetHeader, ETHERNET_BROADCAST};
pub use ip_flags::IpFlags;
pub use ip_header::{Ipv4Datagram, Ipv4Header};
