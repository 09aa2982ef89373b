//! 3GPP TS 23.040 SMS-DELIVER decoding.
//!
//! Only what the inbound handler needs: originating address and the user
//! data text. The service-centre timestamp and protocol identifier are read
//! past but not interpreted.

use crate::{domain::SmsMessage, errors::Error, gsm7, Result};

pub const FORMAT_3GPP: &str = "3gpp";
pub const FORMAT_3GPP2: &str = "3gpp2";

const SCTS_LEN: usize = 7;
const TON_INTERNATIONAL: u8 = 0b001;
const TON_ALPHANUMERIC: u8 = 0b101;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Alphabet {
    Gsm7,
    EightBit,
    Ucs2,
}

/// Decode one PDU as delivered with an SMS broadcast.
///
/// `format` of `None` means 3GPP. 3GPP2 (CDMA) PDUs are not supported.
pub fn decode_pdu(pdu: &[u8], format: Option<&str>) -> Result<SmsMessage> {
    match format.unwrap_or(FORMAT_3GPP) {
        FORMAT_3GPP => {}
        other => return Err(Error::Pdu(format!("unsupported pdu format: {other}"))),
    }

    let mut r = Reader::new(pdu);

    let smsc_len = r.u8()? as usize;
    r.take(smsc_len)?;

    let first = r.u8()?;
    if first & 0x03 != 0 {
        return Err(Error::Pdu(format!(
            "not an SMS-DELIVER (first octet {first:#04x})"
        )));
    }
    let has_udh = first & 0x40 != 0;

    let addr_digits = r.u8()? as usize;
    let toa = r.u8()?;
    let addr = r.take(addr_digits.div_ceil(2))?;
    let sender = decode_address(addr_digits, toa, addr)?;

    let _pid = r.u8()?;
    let dcs = r.u8()?;
    r.take(SCTS_LEN)?;
    let udl = r.u8()? as usize;
    let body = decode_user_data(alphabet_for(dcs)?, has_udh, udl, r.rest())?;

    Ok(SmsMessage { sender, body })
}

/// Parse a hex-encoded PDU (whitespace ignored).
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let digits: Vec<u8> = s.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(Error::Pdu("hex pdu has an odd number of digits".to_string()));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let hi = hex_val(pair[0])?;
            let lo = hex_val(pair[1])?;
            Ok((hi << 4) | lo)
        })
        .collect()
}

fn hex_val(b: u8) -> Result<u8> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(Error::Pdu(format!("invalid hex digit {:?}", b as char))),
    }
}

fn alphabet_for(dcs: u8) -> Result<Alphabet> {
    match dcs >> 4 {
        // General data coding, with or without automatic deletion.
        0x0..=0x7 => {
            if dcs & 0x20 != 0 {
                return Err(Error::Pdu("compressed user data is not supported".to_string()));
            }
            Ok(match (dcs >> 2) & 0x03 {
                0b01 => Alphabet::EightBit,
                0b10 => Alphabet::Ucs2,
                _ => Alphabet::Gsm7,
            })
        }
        // Message waiting indication groups.
        0xC | 0xD => Ok(Alphabet::Gsm7),
        0xE => Ok(Alphabet::Ucs2),
        // Data coding / message class.
        0xF => Ok(if dcs & 0x04 != 0 {
            Alphabet::EightBit
        } else {
            Alphabet::Gsm7
        }),
        _ => Ok(Alphabet::Gsm7),
    }
}

fn decode_address(digits: usize, toa: u8, bytes: &[u8]) -> Result<String> {
    let ton = (toa >> 4) & 0x07;
    if ton == TON_ALPHANUMERIC {
        let septets = digits * 4 / 7;
        let unpacked = gsm7::unpack_septets(bytes, septets, 0)
            .ok_or_else(|| Error::Pdu("alphanumeric address truncated".to_string()))?;
        return Ok(gsm7::decode_septets(&unpacked));
    }

    let mut out = String::with_capacity(digits + 1);
    if ton == TON_INTERNATIONAL {
        out.push('+');
    }
    let nibbles = bytes.iter().flat_map(|&b| [b & 0x0F, b >> 4]);
    for n in nibbles.take(digits) {
        let c = match n {
            0..=9 => (b'0' + n) as char,
            0xA => '*',
            0xB => '#',
            0xC => 'a',
            0xD => 'b',
            0xE => 'c',
            _ => break,
        };
        out.push(c);
    }
    Ok(out)
}

fn decode_user_data(alphabet: Alphabet, has_udh: bool, udl: usize, ud: &[u8]) -> Result<String> {
    let header_octets = if has_udh {
        let udhl = *ud
            .first()
            .ok_or_else(|| Error::Pdu("user data header missing".to_string()))?;
        udhl as usize + 1
    } else {
        0
    };

    match alphabet {
        Alphabet::Gsm7 => {
            // The header is padded with fill bits up to a septet boundary.
            let header_septets = (header_octets * 8).div_ceil(7);
            let text_septets = udl.checked_sub(header_septets).ok_or_else(|| {
                Error::Pdu("user data length shorter than its header".to_string())
            })?;
            let septets = gsm7::unpack_septets(ud, text_septets, header_septets * 7)
                .ok_or_else(|| Error::Pdu("user data truncated".to_string()))?;
            Ok(gsm7::decode_septets(&septets))
        }
        Alphabet::EightBit | Alphabet::Ucs2 => {
            if udl > ud.len() || header_octets > udl {
                return Err(Error::Pdu("user data truncated".to_string()));
            }
            let payload = &ud[header_octets..udl];
            Ok(if alphabet == Alphabet::Ucs2 {
                let units: Vec<u16> = payload
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            } else {
                payload.iter().map(|&b| b as char).collect()
            })
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| Error::Pdu(format!("pdu truncated at offset {}", self.pos)))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdu(hex: &str) -> Vec<u8> {
        decode_hex(hex).unwrap()
    }

    #[test]
    fn decodes_gsm7_deliver_with_smsc() {
        let raw = pdu("07 917283010010F5 04 0B C8 7238880900F1 00 00 99309251619580 0A E8329BFD4697D9EC37");
        let msg = decode_pdu(&raw, Some(FORMAT_3GPP)).unwrap();
        assert_eq!(msg.sender, "27838890001");
        assert_eq!(msg.body, "hellohello");
    }

    #[test]
    fn decodes_ucs2_with_international_sender() {
        let raw = pdu("00 04 0C 91 198921436587 00 08 52106121430000 04 0928093E");
        let msg = decode_pdu(&raw, None).unwrap();
        assert_eq!(msg.sender, "+919812345678");
        assert_eq!(msg.body, "ना");
    }

    #[test]
    fn decodes_alphanumeric_sender() {
        let raw = pdu("00 04 04 D0 4121 00 00 52106121430000 05 E8329BFD06");
        let msg = decode_pdu(&raw, None).unwrap();
        assert_eq!(msg.sender, "AB");
        assert_eq!(msg.body, "hello");
    }

    #[test]
    fn skips_concatenation_header_and_fill_bits() {
        // UDHI set; header 05 00 03 2A 02 01 then "hi" after one fill bit.
        let raw = pdu("00 44 04 D0 4121 00 00 52106121430000 09 0500032A0201 D069");
        let msg = decode_pdu(&raw, None).unwrap();
        assert_eq!(msg.body, "hi");
    }

    #[test]
    fn decodes_eight_bit_as_latin1() {
        let raw = pdu("00 04 04 D0 4121 00 04 52106121430000 02 414A");
        let msg = decode_pdu(&raw, None).unwrap();
        assert_eq!(msg.body, "AJ");
    }

    #[test]
    fn rejects_truncated_and_foreign_pdus() {
        let raw = pdu("07 917283010010F5 04 0B C8 72");
        assert!(matches!(decode_pdu(&raw, None), Err(Error::Pdu(_))));

        let submit = pdu("00 01 00 0B 91 9198214365F7 00 00");
        assert!(matches!(decode_pdu(&submit, None), Err(Error::Pdu(_))));

        assert!(matches!(
            decode_pdu(&[0x00], Some(FORMAT_3GPP2)),
            Err(Error::Pdu(_))
        ));
    }

    #[test]
    fn hex_parsing_rejects_garbage() {
        assert_eq!(decode_hex("0a FF").unwrap(), vec![0x0A, 0xFF]);
        assert!(decode_hex("abc").is_err());
        assert!(decode_hex("zz").is_err());
    }
}
