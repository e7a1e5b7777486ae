use crate::tcp::byte_stream::ByteStream;
use crate::tcp::messages::{TcpReceiverMessage, TcpSenderMessage};
use crate::tcp::wrap32::Wrap32;
use std::collections::VecDeque;

/// Largest payload carried by a single segment.
pub const MAX_PAYLOAD_SIZE: usize = 1452;

/// The sending half of a TCP endpoint.
///
/// Reads from an outbound `ByteStream` and produces segments within the
/// receiver's advertised window, keeping every unacknowledged segment queued
/// for retransmission under an exponentially backed-off timer.
#[derive(Debug)]
pub struct TcpSender {
    input: ByteStream, // the outbound stream segments are read from
    isn: Wrap32,

    next_seqno: u64, // absolute; SYN occupies 0
    ackno: u64,      // highest cumulative ack received
    window_size: u16,
    bytes_in_flight: u64,
    syn_sent: bool,
    fin_sent: bool,

    initial_rto_ms: u64,
    current_rto_ms: u64,
    timer_running: bool,
    timer_elapsed_ms: u64,
    consecutive_retransmissions: u64,

    outstanding: VecDeque<TcpSenderMessage>, // sent but unacknowledged, in send order
}

impl TcpSender {
    /// New `TcpSender` reading from an outbound stream of the given capacity
    pub fn new(isn: Wrap32, capacity: usize, initial_rto_ms: u64) -> Self {
        TcpSender {
            input: ByteStream::new(capacity),
            isn,
            next_seqno: 0,
            ackno: 0,
            window_size: 1, // assume one sequence number of room until the peer says otherwise
            bytes_in_flight: 0,
            syn_sent: false,
            fin_sent: false,
            initial_rto_ms,
            current_rto_ms: initial_rto_ms,
            timer_running: false,
            timer_elapsed_ms: 0,
            consecutive_retransmissions: 0,
            outstanding: VecDeque::new(),
        }
    }

    /// Fill the receiver's window with as many segments as the outbound
    /// stream can supply, transmitting each one.
    pub fn push(&mut self, mut transmit: impl FnMut(&TcpSenderMessage)) {
        // A zero window is probed with a single sequence number so the
        // peer's next ack can reopen it.
        let effective_window = u64::from(self.window_size).max(1);

        while self.bytes_in_flight < effective_window && !self.fin_sent {
            let mut msg = TcpSenderMessage {
                seqno: Wrap32::wrap(self.next_seqno, self.isn),
                ..Default::default()
            };

            if !self.syn_sent {
                msg.syn = true;
                self.syn_sent = true;
            }

            let remaining =
                (effective_window - self.bytes_in_flight) as usize - usize::from(msg.syn);
            let take = remaining
                .min(MAX_PAYLOAD_SIZE)
                .min(self.input.bytes_buffered());
            msg.payload = self.read_payload(take);

            // The FIN rides along only if the window still has room for it
            if self.input.is_finished() && remaining - msg.payload.len() >= 1 {
                msg.fin = true;
                self.fin_sent = true;
            }

            let seq_len = msg.sequence_length() as u64;
            if seq_len == 0 {
                break; // nothing to send
            }

            self.next_seqno += seq_len;
            self.bytes_in_flight += seq_len;
            if !self.timer_running {
                self.timer_running = true;
                self.timer_elapsed_ms = 0;
            }

            transmit(&msg);
            self.outstanding.push_back(msg);
        }
    }

    /// An empty segment carrying the current sequence number, for ack-only
    /// traffic. Not queued for retransmission.
    pub fn make_empty_message(&self) -> TcpSenderMessage {
        TcpSenderMessage {
            seqno: Wrap32::wrap(self.next_seqno, self.isn),
            ..Default::default()
        }
    }

    /// Process an ack / window / reset report from the peer's receiver
    pub fn receive(&mut self, msg: &TcpReceiverMessage) {
        if msg.rst {
            self.input.set_error();
            return;
        }

        self.window_size = msg.window_size;

        let Some(ackno) = msg.ackno else {
            return;
        };
        let ack_abs = ackno.unwrap(self.isn, self.next_seqno);
        if ack_abs > self.next_seqno {
            return; // acknowledges sequence numbers that were never sent
        }
        if ack_abs > self.ackno {
            self.ackno = ack_abs;
        }

        // Pop segments the ack fully covers
        let mut popped = false;
        while let Some(front) = self.outstanding.front() {
            let seg_start = front.seqno.unwrap(self.isn, self.next_seqno);
            if seg_start + front.sequence_length() as u64 > ack_abs {
                break;
            }
            self.bytes_in_flight -= front.sequence_length() as u64;
            self.outstanding.pop_front();
            popped = true;
        }

        if popped {
            self.current_rto_ms = self.initial_rto_ms;
            self.consecutive_retransmissions = 0;
            self.timer_elapsed_ms = 0;
            self.timer_running = !self.outstanding.is_empty();
        }
    }

    /// Account for `ms_since_last_tick` milliseconds of elapsed time,
    /// retransmitting the oldest outstanding segment on timer expiry.
    pub fn tick(&mut self, ms_since_last_tick: u64, mut transmit: impl FnMut(&TcpSenderMessage)) {
        self.timer_elapsed_ms += ms_since_last_tick;

        if self.timer_running
            && self.timer_elapsed_ms >= self.current_rto_ms
            && !self.outstanding.is_empty()
        {
            if let Some(front) = self.outstanding.front() {
                transmit(front);
            }

            // Backoff only counts against a peer that claims to have room;
            // zero-window probes keep the base timeout.
            if self.window_size > 0 {
                self.consecutive_retransmissions += 1;
                self.current_rto_ms *= 2;
            }
            self.timer_elapsed_ms = 0;
        }
    }

    /// How many sequence numbers are outstanding
    pub fn sequence_numbers_in_flight(&self) -> u64 {
        self.bytes_in_flight
    }

    /// How many consecutive retransmissions have happened
    pub fn consecutive_retransmissions(&self) -> u64 {
        self.consecutive_retransmissions
    }

    /// The outbound stream, for the application to write into
    pub fn writer(&mut self) -> &mut ByteStream {
        &mut self.input
    }

    /// The outbound stream, read-only
    pub fn input(&self) -> &ByteStream {
        &self.input
    }

    /// Pull up to `take` buffered bytes out of the outbound stream
    fn read_payload(&mut self, take: usize) -> Vec<u8> {
        let mut payload = Vec::with_capacity(take);
        while payload.len() < take {
            let chunk = self.input.peek();
            if chunk.is_empty() {
                break;
            }
            let n = chunk.len().min(take - payload.len());
            payload.extend_from_slice(&chunk[..n]);
            self.input.pop(n);
        }
        payload
    }
}

// -- Unit tests --
