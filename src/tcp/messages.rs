use crate::tcp::wrap32::Wrap32;

/// What the sender tells the receiver: where the segment sits in sequence
/// space, its flags, and its payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TcpSenderMessage {
    pub seqno: Wrap32,
    pub syn: bool,
    pub payload: Vec<u8>,
    pub fin: bool,
    pub rst: bool,
}

impl TcpSenderMessage {
    /// How many sequence numbers this segment occupies. SYN and FIN each
    /// count for one, in addition to the payload bytes.
    pub fn sequence_length(&self) -> usize {
        usize::from(self.syn) + self.payload.len() + usize::from(self.fin)
    }
}

/// What the receiver tells the sender: the cumulative ack (absent before the
/// handshake), the advertised window, and the reset flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpReceiverMessage {
    pub ackno: Option<Wrap32>,
    pub window_size: u16,
    pub rst: bool,
}

// -- Unit tests --
