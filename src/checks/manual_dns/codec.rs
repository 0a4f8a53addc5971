// src/checks/manual_dns/codec.rs
//! Minimal DNS message encoding for a single-question query, and response
//! code extraction from the reply header.
//!
//! Header layout (12 bytes):
//!
//! ```text
//! AA AA - id
//! 01 00 - QR | Opcode | AA | RD, then RA | Z | response code
//! 00 01 - question count
//! 00 00 - answer count
//! 00 00 - authority count
//! 00 00 - additional count
//! ```
//!
//! A question for `example.com`, type A, class IN:
//!
//! ```text
//! 07 65 78 61 6D 70 6C 65 - 'example'
//! 03 63 6F 6D             - 'com'
//! 00                      - end of name
//! 00 01                   - type
//! 00 01                   - class
//! ```

/// Transaction id used by the manual probe.
pub const MANUAL_QUERY_ID: u16 = 0xAAAA;
pub const TYPE_A: u16 = 0x0001;
pub const CLASS_IN: u16 = 0x0001;

pub const HEADER_LEN: usize = 12;
pub const MAX_LABEL_LEN: usize = 63;
/// Largest message a plain DNS-over-UDP exchange carries.
pub const MAX_UDP_MESSAGE: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DnsError {
    #[error("format error")]
    FormatError,

    #[error("server failure")]
    ServerFailure,

    #[error("non-existent domain")]
    NonExistentDomain,

    #[error("server not authoritative for zone")]
    NotAuthoritative,

    #[error("name not in zone")]
    NotInZone,

    #[error("unmapped response code for '{0}'")]
    Unmapped(u8),

    #[error("truncated response of {0} bytes")]
    Truncated(usize),

    #[error("label {0:?} is longer than 63 bytes")]
    LabelTooLong(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    pub domain: String,
    pub qtype: u16,
    pub qclass: u16,
}

impl DnsQuestion {
    pub fn a_record(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            qtype: TYPE_A,
            qclass: CLASS_IN,
        }
    }

    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), DnsError> {
        for label in self.domain.split('.').filter(|l| !l.is_empty()) {
            if label.len() > MAX_LABEL_LEN {
                return Err(DnsError::LabelTooLong(label.to_string()));
            }
            buf.push(label.len() as u8);
            buf.extend_from_slice(label.as_bytes());
        }
        buf.push(0);
        buf.extend_from_slice(&self.qtype.to_be_bytes());
        buf.extend_from_slice(&self.qclass.to_be_bytes());
        Ok(())
    }
}

/// A request message. Answer, authority and additional sections are always
/// empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsQuery {
    pub id: u16,
    pub qr: bool,
    /// 4-bit opcode; 0 is a standard query.
    pub opcode: u8,
    pub aa: bool,
    pub rd: bool,
    pub ra: bool,
    /// 3-bit reserved field.
    pub z: u8,
    pub questions: Vec<DnsQuestion>,
}

impl DnsQuery {
    /// Recursive A/IN query for `domain` with the manual probe's id.
    pub fn manual(domain: impl Into<String>) -> Self {
        Self {
            id: MANUAL_QUERY_ID,
            rd: true,
            questions: vec![DnsQuestion::a_record(domain)],
            ..Default::default()
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, DnsError> {
        let mut buf = Vec::with_capacity(HEADER_LEN + 32);

        let flags_hi = (self.qr as u8) << 7
            | (self.opcode & 0x0F) << 3
            | (self.aa as u8) << 1
            | self.rd as u8;
        let flags_lo = (self.ra as u8) << 7 | (self.z & 0x07) << 4;

        buf.extend_from_slice(&self.id.to_be_bytes());
        buf.push(flags_hi);
        buf.push(flags_lo);
        buf.extend_from_slice(&(self.questions.len() as u16).to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());

        for question in &self.questions {
            question.encode_into(&mut buf)?;
        }
        Ok(buf)
    }
}

/// Low nibble of the fourth header byte.
pub fn response_code(response: &[u8]) -> Result<u8, DnsError> {
    if response.len() < HEADER_LEN {
        return Err(DnsError::Truncated(response.len()));
    }
    Ok(response[3] & 0x0F)
}

/// Map a response code to success or a named failure.
pub fn classify(code: u8) -> Result<(), DnsError> {
    match code {
        0 => Ok(()),
        1 => Err(DnsError::FormatError),
        2 => Err(DnsError::ServerFailure),
        3 => Err(DnsError::NonExistentDomain),
        9 => Err(DnsError::NotAuthoritative),
        10 => Err(DnsError::NotInZone),
        other => Err(DnsError::Unmapped(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_example_com() {
        let encoded = DnsQuery::manual("example.com").encode().unwrap();

        let mut expected = vec![
            0xAA, 0xAA, // id
            0x01, 0x00, // RD set
            0x00, 0x01, // one question
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        expected.push(7);
        expected.extend_from_slice(b"example");
        expected.push(3);
        expected.extend_from_slice(b"com");
        expected.extend_from_slice(&[0x00, 0x00, 0x01, 0x00, 0x01]);

        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_header_flag_bits() {
        let query = DnsQuery {
            id: 0x1234,
            qr: true,
            opcode: 2,
            aa: true,
            rd: true,
            ra: true,
            z: 1,
            questions: vec![],
        };
        let encoded = query.encode().unwrap();
        assert_eq!(encoded.len(), HEADER_LEN);
        assert_eq!(&encoded[..2], &[0x12, 0x34]);
        assert_eq!(encoded[2], 0b1001_0011);
        assert_eq!(encoded[3], 0b1001_0000);
        assert_eq!(&encoded[4..6], &[0, 0]);
    }

    #[test]
    fn test_trailing_dot_is_ignored() {
        assert_eq!(
            DnsQuery::manual("example.com.").encode().unwrap(),
            DnsQuery::manual("example.com").encode().unwrap()
        );
    }

    #[test]
    fn test_long_label_rejected() {
        let domain = format!("{}.com", "a".repeat(64));
        assert!(matches!(
            DnsQuery::manual(domain).encode(),
            Err(DnsError::LabelTooLong(_))
        ));
    }

    #[test]
    fn test_response_code_nxdomain() {
        let mut response = DnsQuery::manual("missing.test").encode().unwrap();
        response[2] |= 0x80;
        response[3] = 0x80 | 0x03;

        let code = response_code(&response).unwrap();
        assert_eq!(code, 3);
        assert_eq!(classify(code), Err(DnsError::NonExistentDomain));
        assert_eq!(
            classify(code).unwrap_err().to_string(),
            "non-existent domain"
        );
    }

    #[test]
    fn test_classify_taxonomy() {
        assert_eq!(classify(0), Ok(()));
        assert_eq!(classify(1), Err(DnsError::FormatError));
        assert_eq!(classify(2), Err(DnsError::ServerFailure));
        assert_eq!(classify(9), Err(DnsError::NotAuthoritative));
        assert_eq!(classify(10), Err(DnsError::NotInZone));
        assert_eq!(classify(5), Err(DnsError::Unmapped(5)));
    }

    #[test]
    fn test_short_response() {
        assert_eq!(response_code(&[0xAA, 0xAA, 0x81]), Err(DnsError::Truncated(3)));
    }
}
