use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

use tidedb_common::{MAX_FRAME_SIZE, ProtocolError};

/// Um frame RESP2.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
}

impl Frame {
    /// Decodifica um frame completo a partir do cursor. `Err(Incomplete)`
    /// sinaliza que o buffer ainda não contém o frame inteiro; a posição
    /// do cursor só é significativa após `Ok`.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Frame, ProtocolError> {
        match read_u8(src)? {
            b'+' => Ok(Frame::Simple(read_line_utf8(src)?)),
            b'-' => Ok(Frame::Error(read_line_utf8(src)?)),
            b':' => {
                let line = read_line(src)?;
                Ok(Frame::Integer(parse_decimal(line)?))
            }
            b'$' => {
                let len = parse_decimal(read_line(src)?)?;
                if len == -1 {
                    return Ok(Frame::Null);
                }
                if len < 0 {
                    return Err(ProtocolError::InvalidBulkLength(len));
                }
                let len = len as usize;
                if len > MAX_FRAME_SIZE {
                    return Err(ProtocolError::FrameTooLarge(len));
                }
                if src.remaining() < len + 2 {
                    return Err(ProtocolError::Incomplete);
                }
                let start = src.position() as usize;
                let data = Bytes::copy_from_slice(&src.get_ref()[start..start + len]);
                src.advance(len + 2); // dados + \r\n
                Ok(Frame::Bulk(data))
            }
            b'*' => {
                let count = parse_decimal(read_line(src)?)?;
                if count == -1 {
                    return Ok(Frame::Null);
                }
                if count < 0 {
                    return Err(ProtocolError::InvalidBulkLength(count));
                }
                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    items.push(Frame::parse(src)?);
                }
                Ok(Frame::Array(items))
            }
            prefix => Err(ProtocolError::InvalidPrefix(prefix)),
        }
    }

    /// Codifica o frame em RESP2 no buffer de saída.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => {
                dst.put_u8(b'+');
                dst.put(s.as_bytes());
                dst.put(&b"\r\n"[..]);
            }
            Frame::Error(s) => {
                dst.put_u8(b'-');
                dst.put(s.as_bytes());
                dst.put(&b"\r\n"[..]);
            }
            Frame::Integer(n) => {
                dst.put_u8(b':');
                dst.put(n.to_string().as_bytes());
                dst.put(&b"\r\n"[..]);
            }
            Frame::Bulk(data) => {
                dst.put_u8(b'$');
                dst.put(data.len().to_string().as_bytes());
                dst.put(&b"\r\n"[..]);
                dst.put(data.as_ref());
                dst.put(&b"\r\n"[..]);
            }
            Frame::Null => {
                dst.put(&b"$-1\r\n"[..]);
            }
            Frame::Array(items) => {
                dst.put_u8(b'*');
                dst.put(items.len().to_string().as_bytes());
                dst.put(&b"\r\n"[..]);
                for item in items {
                    item.encode(dst);
                }
            }
        }
    }

    /// Helper: Frame::Bulk a partir de &str.
    pub fn bulk(s: &str) -> Frame {
        Frame::Bulk(Bytes::copy_from_slice(s.as_bytes()))
    }

    /// Helper: Array de Bulk strings a partir de &[&str].
    pub fn array_from_strs(strs: &[&str]) -> Frame {
        Frame::Array(strs.iter().map(|s| Frame::bulk(s)).collect())
    }
}

fn read_u8(src: &mut Cursor<&[u8]>) -> Result<u8, ProtocolError> {
    if !src.has_remaining() {
        return Err(ProtocolError::Incomplete);
    }
    Ok(src.get_u8())
}

/// Lê até o próximo CRLF, sem incluí-lo.
fn read_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], ProtocolError> {
    let start = src.position() as usize;
    let buf = *src.get_ref();

    for i in start..buf.len().saturating_sub(1) {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            src.set_position((i + 2) as u64);
            return Ok(&buf[start..i]);
        }
    }

    Err(ProtocolError::Incomplete)
}

fn read_line_utf8(src: &mut Cursor<&[u8]>) -> Result<String, ProtocolError> {
    let line = read_line(src)?;
    String::from_utf8(line.to_vec()).map_err(|e| ProtocolError::InvalidEncoding(e.to_string()))
}

fn parse_decimal(line: &[u8]) -> Result<i64, ProtocolError> {
    let s =
        std::str::from_utf8(line).map_err(|e| ProtocolError::InvalidInteger(e.to_string()))?;
    s.parse::<i64>()
        .map_err(|e| ProtocolError::InvalidInteger(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(frame: &Frame) {
        let mut buf = BytesMut::new();
        frame.encode(&mut buf);
        let bytes = buf.freeze();
        let mut cursor = Cursor::new(bytes.as_ref());
        let parsed = Frame::parse(&mut cursor).unwrap();
        assert_eq!(&parsed, frame);
        assert_eq!(cursor.position() as usize, bytes.len());
    }

    #[test]
    fn roundtrip_simple_string() {
        roundtrip(&Frame::Simple("OK".into()));
    }

    #[test]
    fn roundtrip_error() {
        roundtrip(&Frame::Error("key not found".into()));
    }

    #[test]
    fn roundtrip_integer() {
        roundtrip(&Frame::Integer(42));
        roundtrip(&Frame::Integer(-1));
        roundtrip(&Frame::Integer(0));
    }

    #[test]
    fn roundtrip_bulk() {
        roundtrip(&Frame::Bulk(Bytes::from("hello world")));
        roundtrip(&Frame::Bulk(Bytes::new()));
    }

    #[test]
    fn roundtrip_bulk_with_crlf() {
        roundtrip(&Frame::Bulk(Bytes::from("str1\n\rstr2")));
        roundtrip(&Frame::Bulk(Bytes::from("a\r\nb")));
    }

    #[test]
    fn roundtrip_null() {
        roundtrip(&Frame::Null);
    }

    #[test]
    fn roundtrip_array() {
        roundtrip(&Frame::Array(vec![
            Frame::Simple("OK".into()),
            Frame::Integer(7),
            Frame::Bulk(Bytes::from("data")),
            Frame::Null,
        ]));
    }

    #[test]
    fn roundtrip_nested_array() {
        roundtrip(&Frame::Array(vec![
            Frame::Array(vec![Frame::Integer(1), Frame::Integer(2)]),
            Frame::Bulk(Bytes::from("x")),
        ]));
    }

    #[test]
    fn incomplete_line() {
        let data = b"+OK\r";
        let mut cursor = Cursor::new(&data[..]);
        assert!(matches!(
            Frame::parse(&mut cursor),
            Err(ProtocolError::Incomplete)
        ));
    }

    #[test]
    fn incomplete_bulk_payload() {
        let data = b"$5\r\nhel";
        let mut cursor = Cursor::new(&data[..]);
        assert!(matches!(
            Frame::parse(&mut cursor),
            Err(ProtocolError::Incomplete)
        ));
    }

    #[test]
    fn incomplete_array_tail() {
        let data = b"*2\r\n$3\r\nGET\r\n$2\r\nk";
        let mut cursor = Cursor::new(&data[..]);
        assert!(matches!(
            Frame::parse(&mut cursor),
            Err(ProtocolError::Incomplete)
        ));
    }

    #[test]
    fn invalid_prefix() {
        let data = b"?oops\r\n";
        let mut cursor = Cursor::new(&data[..]);
        assert!(matches!(
            Frame::parse(&mut cursor),
            Err(ProtocolError::InvalidPrefix(b'?'))
        ));
    }

    #[test]
    fn negative_bulk_length_rejected() {
        let data = b"$-7\r\n";
        let mut cursor = Cursor::new(&data[..]);
        assert!(matches!(
            Frame::parse(&mut cursor),
            Err(ProtocolError::InvalidBulkLength(-7))
        ));
    }

    #[test]
    fn parse_consumes_exactly_one_frame() {
        let data = b"+OK\r\n:1\r\n";
        let mut cursor = Cursor::new(&data[..]);
        let frame = Frame::parse(&mut cursor).unwrap();
        assert_eq!(frame, Frame::Simple("OK".into()));
        assert_eq!(cursor.position(), 5);
    }
}
