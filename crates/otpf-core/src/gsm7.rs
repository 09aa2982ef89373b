//! GSM 03.38 default alphabet and its extension table.

/// Escape septet introducing the extension table.
pub const ESCAPE: u8 = 0x1B;

#[rustfmt::skip]
const BASIC: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å',
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1B}', 'Æ', 'æ', 'ß', 'É',
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/',
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?',
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O',
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§',
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à',
];

const EXTENSION: [(u8, char); 10] = [
    (0x0A, '\u{0C}'),
    (0x14, '^'),
    (0x28, '{'),
    (0x29, '}'),
    (0x2F, '\\'),
    (0x3C, '['),
    (0x3D, '~'),
    (0x3E, ']'),
    (0x40, '|'),
    (0x65, '€'),
];

/// Character for a septet of the default alphabet.
pub fn basic_char(septet: u8) -> char {
    BASIC[(septet & 0x7F) as usize]
}

/// Character for a septet following [`ESCAPE`].
///
/// Unassigned extension codes fall back to the default alphabet.
pub fn extension_char(septet: u8) -> char {
    EXTENSION
        .iter()
        .find(|(code, _)| *code == septet)
        .map(|(_, c)| *c)
        .unwrap_or_else(|| basic_char(septet))
}

/// Septets needed to encode `c`, or `None` when it is outside the alphabet.
pub fn septet_cost(c: char) -> Option<usize> {
    if c != '\u{1B}' && BASIC.contains(&c) {
        return Some(1);
    }
    if EXTENSION.iter().any(|(_, e)| *e == c) {
        return Some(2);
    }
    None
}

/// Decode unpacked septets into text, resolving escape sequences.
pub fn decode_septets(septets: &[u8]) -> String {
    let mut out = String::with_capacity(septets.len());
    let mut iter = septets.iter().copied();
    while let Some(s) = iter.next() {
        if s == ESCAPE {
            match iter.next() {
                Some(next) => out.push(extension_char(next)),
                None => out.push(' '),
            }
        } else {
            out.push(basic_char(s));
        }
    }
    out
}

/// Unpack `count` septets from a packed bit stream starting at `bit_offset`.
pub fn unpack_septets(data: &[u8], count: usize, bit_offset: usize) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let bit = bit_offset + i * 7;
        let idx = bit / 8;
        let shift = bit % 8;
        let lo = u16::from(*data.get(idx)?);
        let hi = if shift > 1 {
            u16::from(*data.get(idx + 1)?)
        } else {
            0
        };
        out.push((((hi << 8) | lo) >> shift) as u8 & 0x7F);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn costs_follow_alphabet_tables() {
        assert_eq!(septet_cost('a'), Some(1));
        assert_eq!(septet_cost('@'), Some(1));
        assert_eq!(septet_cost('€'), Some(2));
        assert_eq!(septet_cost('['), Some(2));
        assert_eq!(septet_cost('\u{1B}'), None);
        assert_eq!(septet_cost('न'), None);
        assert_eq!(septet_cost('😀'), None);
    }

    #[test]
    fn unpacks_hello() {
        // "hello" packed: E8 32 9B FD 06
        let septets = unpack_septets(&[0xE8, 0x32, 0x9B, 0xFD, 0x06], 5, 0).unwrap();
        assert_eq!(decode_septets(&septets), "hello");
    }

    #[test]
    fn unpack_reports_short_input() {
        assert!(unpack_septets(&[0xE8], 3, 0).is_none());
    }

    #[test]
    fn escape_sequences_use_extension_table() {
        assert_eq!(decode_septets(&[0x1B, 0x65, 0x31]), "€1");
        assert_eq!(decode_septets(&[0x41, 0x1B]), "A ");
    }
}
