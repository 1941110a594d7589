use super::{ProbeError, HEADER_SIZE, IP_HEADER_SIZE, PAYLOAD_FILL};

#[repr(u8)]
#[derive(int_enum::IntEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum IcmpType {
    EchoReply = 0,
    DestinationUnreachable = 3,
    SourceQuench = 4,
    Redirect = 5,
    EchoRequest = 8,
    TimeExceeded = 11,
    ParameterProblem = 12,
}

/// RFC 1071 one's-complement sum over `bytes`.
///
/// Words are read in host byte order and the result is meant to be stored
/// back in host byte order, which makes the sum independent of endianness.
/// Any checksum field inside `bytes` must be zero when building a packet;
/// over a packet with a valid checksum the result is zero.
pub fn checksum(bytes: &[u8]) -> u16 {
    let mut words = bytes.chunks_exact(2);
    let mut sum: u32 = 0;
    for word in &mut words {
        sum += u16::from_ne_bytes([word[0], word[1]]) as u32;
    }
    if let [last] = words.remainder() {
        sum += u16::from_ne_bytes([*last, 0]) as u32;
    }
    sum = (sum & 0xFFFF) + (sum >> 16);
    sum = (sum & 0xFFFF) + (sum >> 16);
    !(sum as u16)
}

/// Write an echo request with the given sequence and identifier into
/// `packet`, filling everything past the header with the payload pattern.
pub fn build_echo_request(packet: &mut [u8], sequence: u16, identifier: u16) {
    packet[0] = IcmpType::EchoRequest.into();
    packet[1] = 0; // code
    // the previous sequence's checksum must not leak into this sum
    packet[2] = 0;
    packet[3] = 0;
    packet[4..6].copy_from_slice(&identifier.to_be_bytes());
    packet[6..8].copy_from_slice(&sequence.to_be_bytes());
    packet[HEADER_SIZE..].fill(PAYLOAD_FILL);

    let sum = checksum(packet);
    packet[2..4].copy_from_slice(&sum.to_ne_bytes());
}

/// The ICMP message carried by a received IPv4 datagram.
#[derive(Debug, Clone, Copy)]
pub struct IcmpView<'a> {
    /// TTL of the enclosing IPv4 header.
    pub ttl: u8,
    /// The ICMP header and whatever follows it.
    pub icmp: &'a [u8],
}

impl IcmpView<'_> {
    pub fn icmp_type(&self) -> u8 {
        self.icmp[0]
    }

    pub fn code(&self) -> u8 {
        self.icmp[1]
    }

    pub fn identifier(&self) -> u16 {
        u16::from_be_bytes([self.icmp[4], self.icmp[5]])
    }

    pub fn sequence(&self) -> u16 {
        u16::from_be_bytes([self.icmp[6], self.icmp[7]])
    }

    /// The eight header bytes.
    pub fn header(&self) -> &[u8] {
        &self.icmp[..HEADER_SIZE]
    }
}

/// Locate the ICMP header inside a raw IPv4 datagram.
///
/// The IPv4 header length is the low nibble of the first byte, counted in
/// 32-bit words.
pub fn extract_icmp_view(datagram: &[u8]) -> Result<IcmpView<'_>, ProbeError> {
    let Some(first) = datagram.first() else {
        return Err(ProbeError::MalformedDatagram {
            length: 0,
            required: IP_HEADER_SIZE + HEADER_SIZE,
        });
    };
    let ihl = (first & 0x0F) as usize;
    let ip_header_length = ihl * 4;
    let required = ip_header_length.max(IP_HEADER_SIZE) + HEADER_SIZE;
    // fewer than 5 words cannot hold the fixed header, TTL included
    if ihl < 5 || datagram.len() < required {
        return Err(ProbeError::MalformedDatagram {
            length: datagram.len(),
            required,
        });
    }
    Ok(IcmpView {
        ttl: datagram[8],
        icmp: &datagram[ip_header_length..],
    })
}
