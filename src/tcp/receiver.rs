use crate::tcp::byte_stream::ByteStream;
use crate::tcp::messages::{TcpReceiverMessage, TcpSenderMessage};
use crate::tcp::reassembler::Reassembler;
use crate::tcp::wrap32::Wrap32;

/// The receiving half of a TCP endpoint.
///
/// Turns inbound segments into reassembler inserts and reports the
/// cumulative ack, the advertised window, and the reset flag back to the
/// peer's sender.
#[derive(Debug)]
pub struct TcpReceiver {
    reassembler: Reassembler,
    isn: Option<Wrap32>, // set by the first SYN
}

impl TcpReceiver {
    /// New `TcpReceiver` whose inbound stream holds up to `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        TcpReceiver {
            reassembler: Reassembler::new(ByteStream::new(capacity)),
            isn: None,
        }
    }

    /// Process one segment from the peer's sender
    pub fn receive(&mut self, msg: &TcpSenderMessage) {
        if msg.rst {
            self.reassembler.output_mut().set_error();
            return;
        }

        if msg.syn && self.isn.is_none() {
            self.isn = Some(msg.seqno);
        }
        let Some(isn) = self.isn else {
            return; // nothing to anchor sequence numbers to yet
        };

        let checkpoint = self.reassembler.output().bytes_pushed();
        let abs_seqno = msg.seqno.unwrap(isn, checkpoint);

        // A non-SYN segment claiming the SYN's sequence number carries no
        // usable stream data.
        if !msg.syn && abs_seqno == 0 {
            return;
        }

        // Payload indices start at ISN + 1; the SYN itself occupies slot zero
        let stream_index = if msg.syn { 0 } else { abs_seqno - 1 };
        self.reassembler.insert(stream_index, &msg.payload, msg.fin);
    }

    /// The ack, window, and reset report for the peer's sender
    pub fn send(&self) -> TcpReceiverMessage {
        let out = self.reassembler.output();

        let ackno = self.isn.map(|isn| {
            // SYN plus every assembled byte, plus the FIN once the stream closed
            let abs_ackno = 1 + out.bytes_pushed() + u64::from(out.is_closed());
            Wrap32::wrap(abs_ackno, isn)
        });

        TcpReceiverMessage {
            ackno,
            window_size: out.available_capacity().min(65535) as u16,
            rst: out.has_error(),
        }
    }

    /// The reassembler feeding the inbound stream
    pub fn reassembler(&self) -> &Reassembler {
        &self.reassembler
    }

    /// The assembled inbound stream, for popping
    pub fn reader(&mut self) -> &mut ByteStream {
        self.reassembler.output_mut()
    }
}

// -- Unit tests --
