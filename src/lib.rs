//! A user-space network stack core.
//!
//! The `tcp` module turns an unreliable, out-of-order segment channel into a
//! reliable byte stream: a bounded [`tcp::ByteStream`], an out-of-order
//! [`tcp::Reassembler`], wrapping sequence arithmetic in [`tcp::Wrap32`],
//! and the [`tcp::TcpSender`] / [`tcp::TcpReceiver`] state machines.
//!
//! The `net` module holds the wire formats (Ethernet, ARP, IPv4), and the
//! `iface` module the addressing machinery: a [`iface::NetworkInterface`]
//! doing ARP resolution and an [`iface::Router`] doing longest-prefix-match
//! forwarding between interfaces.
//!
//! Everything is single-threaded and cooperative; time only advances through
//! explicit `tick` calls, so whole-network runs are deterministic.

pub mod iface;
pub mod net;
pub mod tcp;
