use crate::iface::interface::NetworkInterface;
use log::{debug, trace};
use std::collections::HashMap;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy)]
struct RouteEntry {
    next_hop: Option<Ipv4Addr>, // absent for directly attached networks
    interface_index: usize,
}

/// An IP router: a set of interfaces plus a longest-prefix-match forwarding
/// table. Call `route` after feeding frames to the interfaces to move
/// datagrams between them.
pub struct Router {
    interfaces: Vec<NetworkInterface>,
    // One map per prefix length, keyed by the prefix's significant bits;
    // lookups walk from the longest length down.
    routes: [HashMap<u32, RouteEntry>; 32],
}

impl Router {
    pub fn new() -> Self {
        Router {
            interfaces: Vec::new(),
            routes: std::array::from_fn(|_| HashMap::new()),
        }
    }

    /// Attach an interface and return its index.
    pub fn add_interface(&mut self, interface: NetworkInterface) -> usize {
        self.interfaces.push(interface);
        self.interfaces.len() - 1
    }

    /// The interface at `index`, for feeding frames in and draining output.
    pub fn interface(&mut self, index: usize) -> &mut NetworkInterface {
        &mut self.interfaces[index]
    }

    /// Add a route: destinations whose top `prefix_len` bits (`0..32`) match
    /// `prefix` leave through `interface_index`, toward `next_hop` when the
    /// network is not directly attached.
    pub fn add_route(
        &mut self,
        prefix: Ipv4Addr,
        prefix_len: u8,
        next_hop: Option<Ipv4Addr>,
        interface_index: usize,
    ) {
        match next_hop {
            Some(hop) => debug!("route {prefix}/{prefix_len} via {hop} on interface {interface_index}"),
            None => debug!("route {prefix}/{prefix_len} directly attached on interface {interface_index}"),
        }

        self.routes[prefix_len as usize].insert(
            mask_prefix(u32::from(prefix), prefix_len),
            RouteEntry {
                next_hop,
                interface_index,
            },
        );
    }

    /// Drain every interface's receive queue and forward each datagram out
    /// the interface its longest-prefix match names. Datagrams with an
    /// exhausted TTL or no matching route are dropped.
    pub fn route(&mut self) {
        for i in 0..self.interfaces.len() {
            while let Some(mut dgram) = self.interfaces[i].pop_received() {
                if dgram.header.ttl <= 1 {
                    trace!("dropping datagram for {}: ttl expired", dgram.header.dst_ip);
                    continue;
                }
                dgram.header.ttl -= 1;
                dgram.header.compute_checksum();

                let Some(entry) = self.longest_prefix_match(dgram.header.dst_ip) else {
                    trace!("dropping datagram for {}: no route", dgram.header.dst_ip);
                    continue;
                };

                // A directly attached network delivers to the destination itself
                let target = entry.next_hop.unwrap_or(dgram.header.dst_ip);
                self.interfaces[entry.interface_index].send_datagram(dgram, target);
            }
        }
    }

    fn longest_prefix_match(&self, dst_ip: Ipv4Addr) -> Option<RouteEntry> {
        let dst = u32::from(dst_ip);
        for len in (0..32u8).rev() {
            if let Some(entry) = self.routes[len as usize].get(&mask_prefix(dst, len)) {
                return Some(*entry);
            }
        }
        None
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// The `len` significant bits of `addr`, right-aligned. A zero-length prefix
/// has no significant bits and masks to zero.
fn mask_prefix(addr: u32, len: u8) -> u32 {
    if len == 0 {
        0
    } else {
        addr >> (32 - len)
    }
}

// -- Unit tests --
