use crate::net::arp::ArpMessage;
use crate::net::ethernet::{EthernetAddress, EthernetFrame, EthernetHeader, ETHERNET_BROADCAST};
use crate::net::ip_header::Ipv4Datagram;
use log::{debug, trace};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::rc::Rc;

/// Where an interface hands off frames bound for the wire.
pub trait OutputPort {
    fn transmit(&mut self, frame: EthernetFrame);
}

/// How long a learned IP-to-Ethernet mapping stays usable.
const ARP_ENTRY_TTL_MS: u64 = 30_000;
/// How long to wait for a reply before giving up on an ARP request.
const ARP_REQUEST_PERIOD_MS: u64 = 5_000;

#[derive(Debug)]
struct ArpEntry {
    ethernet_address: EthernetAddress,
    age_ms: u64,
}

/// A network interface: encapsulates outbound IPv4 datagrams into Ethernet
/// frames, resolving next-hop addresses over ARP, and hands inbound
/// datagrams up to whoever drains its receive queue.
pub struct NetworkInterface {
    name: String,
    port: Rc<RefCell<dyn OutputPort>>,
    ethernet_address: EthernetAddress,
    ip_address: Ipv4Addr,

    arp_cache: HashMap<Ipv4Addr, ArpEntry>,
    pending_datagrams: HashMap<Ipv4Addr, Vec<Ipv4Datagram>>,
    pending_request_timers: HashMap<Ipv4Addr, u64>,
    datagrams_received: VecDeque<Ipv4Datagram>,
}

impl NetworkInterface {
    pub fn new(
        name: &str,
        port: Rc<RefCell<dyn OutputPort>>,
        ethernet_address: EthernetAddress,
        ip_address: Ipv4Addr,
    ) -> Self {
        debug!("interface {name} has Ethernet address {ethernet_address} and IP address {ip_address}");
        NetworkInterface {
            name: name.to_owned(),
            port,
            ethernet_address,
            ip_address,
            arp_cache: HashMap::new(),
            pending_datagrams: HashMap::new(),
            pending_request_timers: HashMap::new(),
            datagrams_received: VecDeque::new(),
        }
    }

    /// Send `dgram` toward `next_hop`, which is the address of either the
    /// final destination or the next router along the path. Datagrams for a
    /// next hop with no known Ethernet address are queued behind an ARP
    /// request.
    pub fn send_datagram(&mut self, dgram: Ipv4Datagram, next_hop: Ipv4Addr) {
        if let Some(entry) = self.arp_cache.get(&next_hop) {
            let dst = entry.ethernet_address;
            self.transmit_ipv4(dst, &dgram);
            return;
        }

        self.pending_datagrams.entry(next_hop).or_default().push(dgram);

        // At most one request in flight per unresolved address
        if self.pending_request_timers.contains_key(&next_hop) {
            return;
        }
        self.pending_request_timers.insert(next_hop, 0);

        trace!("{}: arp who-has {next_hop} tell {}", self.name, self.ip_address);
        let request = ArpMessage {
            opcode: ArpMessage::OPCODE_REQUEST,
            sender_ethernet_address: self.ethernet_address,
            sender_ip_address: self.ip_address,
            target_ethernet_address: EthernetAddress::default(), // unknown
            target_ip_address: next_hop,
        };
        self.transmit_arp(ETHERNET_BROADCAST, &request);
    }

    /// Accept a frame off the wire. IPv4 payloads land on the receive queue;
    /// ARP payloads update the cache, answer requests for our address, and
    /// release any datagrams waiting on the sender's address.
    pub fn recv_frame(&mut self, frame: EthernetFrame) {
        if frame.header.dst != self.ethernet_address && frame.header.dst != ETHERNET_BROADCAST {
            return;
        }

        match frame.header.ethertype {
            EthernetHeader::TYPE_IPV4 => {
                if let Ok(dgram) = Ipv4Datagram::from_bytes(&frame.payload) {
                    self.datagrams_received.push_back(dgram);
                }
            }
            EthernetHeader::TYPE_ARP => {
                let Ok(msg) = ArpMessage::from_bytes(&frame.payload) else {
                    return;
                };

                // Learn the sender's mapping whatever the message was
                self.arp_cache.insert(
                    msg.sender_ip_address,
                    ArpEntry {
                        ethernet_address: msg.sender_ethernet_address,
                        age_ms: 0,
                    },
                );

                if msg.opcode == ArpMessage::OPCODE_REQUEST
                    && msg.target_ip_address == self.ip_address
                {
                    trace!("{}: arp reply to {}", self.name, msg.sender_ip_address);
                    let reply = ArpMessage {
                        opcode: ArpMessage::OPCODE_REPLY,
                        sender_ethernet_address: self.ethernet_address,
                        sender_ip_address: self.ip_address,
                        target_ethernet_address: msg.sender_ethernet_address,
                        target_ip_address: msg.sender_ip_address,
                    };
                    self.transmit_arp(msg.sender_ethernet_address, &reply);
                }

                // Release anything that was waiting on this resolution
                if let Some(queued) = self.pending_datagrams.remove(&msg.sender_ip_address) {
                    for dgram in queued {
                        self.transmit_ipv4(msg.sender_ethernet_address, &dgram);
                    }
                    self.pending_request_timers.remove(&msg.sender_ip_address);
                }
            }
            _ => {}
        }
    }

    /// Account for `ms_since_last_tick` milliseconds of elapsed time. Stale
    /// cache entries expire, and ARP requests that have gone unanswered for
    /// the full request period are abandoned along with their queued
    /// datagrams; the next send will start a fresh resolution.
    pub fn tick(&mut self, ms_since_last_tick: u64) {
        self.arp_cache.retain(|_, entry| {
            entry.age_ms += ms_since_last_tick;
            entry.age_ms < ARP_ENTRY_TTL_MS
        });

        let mut expired = Vec::new();
        for (&ip, age_ms) in self.pending_request_timers.iter_mut() {
            *age_ms += ms_since_last_tick;
            if *age_ms >= ARP_REQUEST_PERIOD_MS {
                expired.push(ip);
            }
        }
        for ip in expired {
            debug!("{}: arp request for {ip} went unanswered, dropping queued datagrams", self.name);
            self.pending_request_timers.remove(&ip);
            self.pending_datagrams.remove(&ip);
        }
    }

    /// Take the next datagram off the receive queue, in arrival order
    pub fn pop_received(&mut self) -> Option<Ipv4Datagram> {
        self.datagrams_received.pop_front()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ethernet_address(&self) -> EthernetAddress {
        self.ethernet_address
    }

    pub fn ip_address(&self) -> Ipv4Addr {
        self.ip_address
    }

    fn transmit_ipv4(&self, dst: EthernetAddress, dgram: &Ipv4Datagram) {
        self.transmit(EthernetFrame {
            header: EthernetHeader {
                dst,
                src: self.ethernet_address,
                ethertype: EthernetHeader::TYPE_IPV4,
            },
            payload: dgram.to_bytes(),
        });
    }

    fn transmit_arp(&self, dst: EthernetAddress, msg: &ArpMessage) {
        self.transmit(EthernetFrame {
            header: EthernetHeader {
                dst,
                src: self.ethernet_address,
                ethertype: EthernetHeader::TYPE_ARP,
            },
            payload: msg.to_bytes(),
        });
    }

    fn transmit(&self, frame: EthernetFrame) {
        self.port.borrow_mut().transmit(frame);
    }
}

// -- Unit tests --
