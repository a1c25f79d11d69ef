//! Server List Ping wire format.
//!
//! Varint framing plus builders for the two request packets of the status
//! handshake. Encoding and decoding work on plain byte slices so they can
//! be tested without a socket; [`read_varint_from`] is the streaming twin
//! used when draining a response off a `TcpStream`.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Protocol version sent in the handshake. Any post-Netty version is
/// accepted for a status query; 47 (1.8) is understood by every server
/// and proxy still in service.
pub const PROTOCOL_VERSION: i32 = 47;

/// Packet id shared by the handshake, the status request, and the reply.
pub const PACKET_STATUS: u8 = 0x00;

/// Next-state value selecting the status flow in the handshake.
pub const NEXT_STATE_STATUS: i32 = 1;

/// A protocol varint never spans more than this many bytes.
pub const MAX_VARINT_BYTES: usize = 5;

/// The status request frame: length 1, packet id 0x00.
pub const STATUS_REQUEST: [u8; 2] = [0x01, PACKET_STATUS];

/// Errors from decoding the binary framing.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("varint unterminated after {MAX_VARINT_BYTES} bytes")]
    VarintTooLong,

    #[error("frame truncated")]
    Truncated,

    #[error("declared length {len} exceeds cap {cap}")]
    LengthOverflow { len: i32, cap: usize },

    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Append `value` to `buf` as a protocol varint (7 data bits per byte,
/// high bit marks continuation, least-significant group first).
pub fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut raw = value as u32;
    loop {
        let byte = (raw & 0x7f) as u8;
        raw >>= 7;
        if raw == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}

/// Decode a varint from the front of `buf`.
///
/// Returns the value and the number of bytes consumed.
pub fn read_varint(buf: &[u8]) -> Result<(i32, usize), WireError> {
    let mut value: u32 = 0;
    for (i, &byte) in buf.iter().enumerate() {
        if i == MAX_VARINT_BYTES {
            return Err(WireError::VarintTooLong);
        }
        value |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value as i32, i + 1));
        }
    }
    if buf.len() >= MAX_VARINT_BYTES {
        Err(WireError::VarintTooLong)
    } else {
        Err(WireError::Truncated)
    }
}

/// Read one varint off an async stream, one byte at a time.
pub async fn read_varint_from<R>(reader: &mut R) -> Result<i32, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut value: u32 = 0;
    for i in 0..MAX_VARINT_BYTES {
        let byte = reader.read_u8().await?;
        value |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(WireError::VarintTooLong)
}

/// Append a varint-length-prefixed UTF-8 string.
pub fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_varint(buf, s.len() as i32);
    buf.extend_from_slice(s.as_bytes());
}

/// Decode a length-prefixed string from the front of `buf`, rejecting
/// declared lengths above `cap`.
///
/// Returns the string and the number of bytes consumed.
pub fn read_string(buf: &[u8], cap: usize) -> Result<(String, usize), WireError> {
    let (len, header) = read_varint(buf)?;
    if len < 0 || len as usize > cap {
        return Err(WireError::LengthOverflow { len, cap });
    }
    let len = len as usize;
    let rest = &buf[header..];
    if rest.len() < len {
        return Err(WireError::Truncated);
    }
    let s = std::str::from_utf8(&rest[..len]).map_err(|_| WireError::InvalidUtf8)?;
    Ok((s.to_string(), header + len))
}

/// Build the handshake packet for a status query against `host:port`.
///
/// The host field carries whatever name the client dialed; virtual-host
/// aware proxies route on it, everyone else ignores it.
pub fn handshake(host: &str, port: u16) -> Vec<u8> {
    let mut payload = Vec::with_capacity(host.len() + 8);
    payload.push(PACKET_STATUS);
    write_varint(&mut payload, PROTOCOL_VERSION);
    write_string(&mut payload, host);
    payload.extend_from_slice(&port.to_be_bytes());
    write_varint(&mut payload, NEXT_STATE_STATUS);

    let mut packet = Vec::with_capacity(payload.len() + 2);
    write_varint(&mut packet, payload.len() as i32);
    packet.extend_from_slice(&payload);
    packet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_known_encodings() {
        let cases: &[(i32, &[u8])] = &[
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7f]),
            (128, &[0x80, 0x01]),
            (255, &[0xff, 0x01]),
            (300, &[0xac, 0x02]),
            (25565, &[0xdd, 0xc7, 0x01]),
            (2097151, &[0xff, 0xff, 0x7f]),
            (i32::MAX, &[0xff, 0xff, 0xff, 0xff, 0x07]),
            (-1, &[0xff, 0xff, 0xff, 0xff, 0x0f]),
        ];

        for (value, encoded) in cases {
            let mut buf = Vec::new();
            write_varint(&mut buf, *value);
            assert_eq!(&buf, encoded, "encoding of {value}");

            let (decoded, used) = read_varint(encoded).unwrap();
            assert_eq!(decoded, *value, "decoding of {value}");
            assert_eq!(used, encoded.len());
        }
    }

    #[test]
    fn varint_roundtrip_spans_range() {
        for value in [0, 1, 63, 64, 8191, 8192, 1 << 20, 1 << 27, i32::MAX, i32::MIN] {
            let mut buf = Vec::new();
            write_varint(&mut buf, value);
            assert!(buf.len() <= MAX_VARINT_BYTES);
            let (decoded, used) = read_varint(&buf).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(used, buf.len());
        }
    }

    #[test]
    fn varint_ignores_trailing_bytes() {
        let (value, used) = read_varint(&[0xac, 0x02, 0xde, 0xad]).unwrap();
        assert_eq!(value, 300);
        assert_eq!(used, 2);
    }

    #[test]
    fn varint_rejects_unterminated() {
        let err = read_varint(&[0x80, 0x80, 0x80, 0x80, 0x80]).unwrap_err();
        assert!(matches!(err, WireError::VarintTooLong));

        let err = read_varint(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]).unwrap_err();
        assert!(matches!(err, WireError::VarintTooLong));
    }

    #[test]
    fn varint_truncated_buffer() {
        let err = read_varint(&[0x80, 0x80]).unwrap_err();
        assert!(matches!(err, WireError::Truncated));

        let err = read_varint(&[]).unwrap_err();
        assert!(matches!(err, WireError::Truncated));
    }

    #[tokio::test]
    async fn varint_async_matches_slice_decoder() {
        for bytes in [&[0x00][..], &[0xac, 0x02][..], &[0xff, 0xff, 0xff, 0xff, 0x07][..]] {
            let (expected, _) = read_varint(bytes).unwrap();
            let mut reader = bytes;
            let decoded = read_varint_from(&mut reader).await.unwrap();
            assert_eq!(decoded, expected);
        }
    }

    #[tokio::test]
    async fn varint_async_rejects_unterminated() {
        let mut reader: &[u8] = &[0x80, 0x80, 0x80, 0x80, 0x80, 0x80];
        let err = read_varint_from(&mut reader).await.unwrap_err();
        assert!(matches!(err, WireError::VarintTooLong));
    }

    #[test]
    fn string_roundtrip() {
        let mut buf = Vec::new();
        write_string(&mut buf, "mc.example.net");
        let (s, used) = read_string(&buf, 255).unwrap();
        assert_eq!(s, "mc.example.net");
        assert_eq!(used, buf.len());
    }

    #[test]
    fn string_length_counts_bytes_not_chars() {
        let mut buf = Vec::new();
        write_string(&mut buf, "héllo");
        // 'é' is two bytes in UTF-8.
        assert_eq!(buf[0], 6);
        let (s, _) = read_string(&buf, 255).unwrap();
        assert_eq!(s, "héllo");
    }

    #[test]
    fn string_rejects_oversized_length() {
        let mut buf = Vec::new();
        write_string(&mut buf, "0123456789");
        let err = read_string(&buf, 4).unwrap_err();
        assert!(matches!(err, WireError::LengthOverflow { len: 10, cap: 4 }));
    }

    #[test]
    fn string_rejects_invalid_utf8() {
        let buf = [0x02, 0xff, 0xfe];
        let err = read_string(&buf, 255).unwrap_err();
        assert!(matches!(err, WireError::InvalidUtf8));
    }

    #[test]
    fn string_truncated_body() {
        let buf = [0x05, b'a', b'b'];
        let err = read_string(&buf, 255).unwrap_err();
        assert!(matches!(err, WireError::Truncated));
    }

    #[test]
    fn handshake_golden_bytes() {
        // host "a", port 25565: id, version 47, len-prefixed host,
        // big-endian port, next state 1, all behind a length prefix.
        let packet = handshake("a", 25565);
        assert_eq!(packet, [0x07, 0x00, 0x2f, 0x01, 0x61, 0x63, 0xdd, 0x01]);
    }

    #[test]
    fn handshake_fields_decode() {
        let packet = handshake("mc.example.net", 25565);

        let (frame_len, header) = read_varint(&packet).unwrap();
        let payload = &packet[header..];
        assert_eq!(frame_len as usize, payload.len());

        assert_eq!(payload[0], PACKET_STATUS);
        let (version, used) = read_varint(&payload[1..]).unwrap();
        assert_eq!(version, PROTOCOL_VERSION);

        let (host, host_used) = read_string(&payload[1 + used..], 255).unwrap();
        assert_eq!(host, "mc.example.net");

        let port_at = 1 + used + host_used;
        let port = u16::from_be_bytes([payload[port_at], payload[port_at + 1]]);
        assert_eq!(port, 25565);

        let (next_state, _) = read_varint(&payload[port_at + 2..]).unwrap();
        assert_eq!(next_state, NEXT_STATE_STATUS);
    }

    #[test]
    fn status_request_frame() {
        assert_eq!(STATUS_REQUEST, [0x01, 0x00]);
    }
}
