use ingot::lexer::numberify;
use ingot::vm::{Cell, Forth, SignedCell, MINIMUM_CORE_SIZE};

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

#[derive(Clone, Default)]
struct Sink(Rc<RefCell<Vec<u8>>>);

impl Sink {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn new_forth() -> (Forth, Sink) {
    let sink = Sink::default();
    let forth = Forth::init(MINIMUM_CORE_SIZE, io::empty(), sink.clone()).unwrap();
    (forth, sink)
}

fn format_radix(value: Cell, base: Cell) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut v = value;
    let mut out = Vec::new();
    while v != 0 {
        out.push(DIGITS[(v % base) as usize]);
        v /= base;
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_decimal() {
    assert_eq!(numberify(10, "0"), Some(0));
    assert_eq!(numberify(10, "42"), Some(42));
    assert_eq!(numberify(10, "+42"), Some(42));
    assert_eq!(numberify(10, "-1"), Some(Cell::MAX));
}

#[test]
fn test_prefix_base() {
    // Base zero takes the radix from the token itself.
    assert_eq!(numberify(0, "10"), Some(10));
    assert_eq!(numberify(0, "0x10"), Some(16));
    assert_eq!(numberify(0, "0X10"), Some(16));
    assert_eq!(numberify(0, "010"), Some(8));
    assert_eq!(numberify(0, "0"), Some(0));
    assert_eq!(numberify(0, "-0x10"), Some(16u64.wrapping_neg() as Cell));
}

#[test]
fn test_explicit_bases() {
    assert_eq!(numberify(2, "1011"), Some(11));
    assert_eq!(numberify(8, "17"), Some(15));
    assert_eq!(numberify(16, "ff"), Some(255));
    assert_eq!(numberify(16, "FF"), Some(255));
    assert_eq!(numberify(16, "0xff"), Some(255));
    assert_eq!(numberify(36, "zz"), Some(35 * 36 + 35));
}

#[test]
fn test_rejects_non_numbers() {
    assert_eq!(numberify(10, ""), None);
    assert_eq!(numberify(10, "-"), None);
    assert_eq!(numberify(10, "12x"), None);
    assert_eq!(numberify(10, "x12"), None);
    assert_eq!(numberify(8, "99"), None);
    assert_eq!(numberify(2, "102"), None);
    assert_eq!(numberify(0, "0x"), None);
    assert_eq!(numberify(1, "1"), None);
    assert_eq!(numberify(37, "1"), None);
}

#[test]
fn test_signed_conversion_limit() {
    // Conversion goes through the signed cell type, so unsigned values
    // above the signed maximum are not numbers.
    assert_eq!(numberify(10, &SignedCell::MAX.to_string()), Some(SignedCell::MAX as Cell));
    assert_eq!(numberify(10, &Cell::MAX.to_string()), None);
    assert_eq!(
        numberify(10, &SignedCell::MIN.to_string()),
        Some(SignedCell::MIN as Cell)
    );
}

#[test]
fn test_round_trip_all_bases() {
    let samples: &[Cell] = &[0, 1, 2, 7, 100, 255, 4096, SignedCell::MAX as Cell];
    for base in [2, 3, 8, 10, 16, 27, 36] {
        for &v in samples {
            let text = format_radix(v, base);
            assert_eq!(numberify(base, &text), Some(v), "base {} value {}", base, v);
        }
    }
}

#[test]
fn test_tokens_split_on_any_whitespace() {
    let (mut forth, out) = new_forth();
    forth.eval("\t 2\n\r  3 \x0c+ . ").unwrap();
    assert!(out.text().contains('5'));
}

#[test]
fn test_long_names_are_truncated() {
    // Tokens are bounded at 31 bytes; the rest of the input becomes the
    // next token.
    let (mut forth, _out) = new_forth();
    let long = "abcdefghijklmnopqrstuvwxyzabcdefghijk";
    forth.eval(&format!(": {} 9 ; ", long)).unwrap();
    assert_ne!(forth.find(&long[..31]), 0);
    assert_eq!(forth.find(long), 0);
}

#[test]
fn test_number_parsing_follows_base_register() {
    let (mut forth, out) = new_forth();
    forth.eval("16 base ! ff . ").unwrap();
    // ff parses as 255 and prints back in hexadecimal.
    assert!(out.text().contains("ff"));
}
