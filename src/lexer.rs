// lexer.rs - Token input and number parsing
//
// Parsing never gets more complicated than this in a Forth: skip
// whitespace, take one bounded token, and try the dictionary before the
// number parser. Characters come from whichever source SOURCE_ID selects.

use crate::vm::{
    Cell, Forth, SignedCell, Source, CELL_BYTES, FILE_IN, MAX_WORD_LENGTH, SIDX, SLEN, SOURCE_ID,
    STRING_IN, STRING_OFFSET,
};

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c')
}

impl Forth {
    /// One character from the current input source, or `None` on
    /// exhaustion. String input advances the `SIDX` register.
    pub(crate) fn get_char(&mut self) -> Option<u8> {
        match self.m[SOURCE_ID] {
            FILE_IN => match &mut self.input {
                Source::File { handle, unread } => {
                    if let Some(b) = unread.take() {
                        return Some(b);
                    }
                    let mut b = [0u8; 1];
                    match handle.read(&mut b) {
                        Ok(1) => Some(b[0]),
                        _ => None,
                    }
                }
                Source::Str(_) => None,
            },
            STRING_IN => {
                let idx = self.m[SIDX];
                if idx >= self.m[SLEN] {
                    return None;
                }
                self.m[SIDX] = idx + 1;
                match &self.input {
                    Source::Str(s) => s.get(idx as usize).copied(),
                    Source::File { .. } => None,
                }
            }
            _ => None,
        }
    }

    /// One whitespace delimited token of at most `MAX_WORD_LENGTH - 1`
    /// bytes, or `None` on end of input. The token is also deposited, NUL
    /// terminated, into the image's word buffer.
    pub(crate) fn get_word(&mut self) -> Option<String> {
        let token = match self.m[SOURCE_ID] {
            FILE_IN => self.get_word_file(),
            STRING_IN => self.get_word_string(),
            _ => None,
        }?;
        // The buffer region is inside any image of legal size, so these
        // writes cannot fail.
        let off = STRING_OFFSET * CELL_BYTES;
        self.write_bytes(off, &token).ok()?;
        self.byte_store(off + token.len(), 0, line!()).ok()?;
        Some(String::from_utf8_lossy(&token).into_owned())
    }

    fn get_word_file(&mut self) -> Option<Vec<u8>> {
        let mut c = self.get_char()?;
        while is_space(c) {
            c = self.get_char()?;
        }
        let mut token = vec![c];
        while token.len() < MAX_WORD_LENGTH - 1 {
            match self.get_char() {
                Some(c) if is_space(c) => {
                    // Leave the delimiter in the stream for `key`.
                    if let Source::File { unread, .. } = &mut self.input {
                        *unread = Some(c);
                    }
                    break;
                }
                Some(c) => token.push(c),
                None => break,
            }
        }
        Some(token)
    }

    fn get_word_string(&mut self) -> Option<Vec<u8>> {
        let bytes = match &self.input {
            Source::Str(s) => s.as_slice(),
            Source::File { .. } => return None,
        };
        let len = (self.m[SLEN] as usize).min(bytes.len());
        let mut i = self.m[SIDX] as usize;
        while i < len && is_space(bytes[i]) {
            i += 1;
        }
        if i >= len || bytes[i] == 0 {
            return None;
        }
        let word_start = i;
        while i < len && bytes[i] != 0 && !is_space(bytes[i]) && i - word_start < MAX_WORD_LENGTH - 1
        {
            i += 1;
        }
        let token = bytes[word_start..i].to_vec();
        self.m[SIDX] = i as Cell;
        Some(token)
    }
}

/// Convert a token to a cell in the given base, 2..=36, with 0 selecting
/// the base from the token's prefix (`0x` hexadecimal, leading `0` octal,
/// decimal otherwise). An optional sign is accepted. Conversion goes
/// through the signed cell type, so unsigned literals above the signed
/// maximum fail to parse; on 16-bit cells that makes `0xFFFF` a word, not
/// a number.
pub fn numberify(base: Cell, s: &str) -> Option<Cell> {
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => match s.strip_prefix('+') {
            Some(rest) => ("", rest),
            None => ("", s),
        },
    };
    fn strip_hex(d: &str) -> Option<&str> {
        d.strip_prefix("0x").or_else(|| d.strip_prefix("0X"))
    }
    let (radix, digits) = if base == 0 {
        if let Some(hex) = strip_hex(digits) {
            (16, hex)
        } else if digits.len() > 1 && digits.starts_with('0') {
            (8, &digits[1..])
        } else {
            (10, digits)
        }
    } else if base == 16 {
        (16, strip_hex(digits).unwrap_or(digits))
    } else if (2..=36).contains(&base) {
        (base as u32, digits)
    } else {
        return None;
    };
    if digits.is_empty() {
        return None;
    }
    let signed = format!("{}{}", sign, digits);
    SignedCell::from_str_radix(&signed, radix)
        .ok()
        .map(|v| v as Cell)
}
