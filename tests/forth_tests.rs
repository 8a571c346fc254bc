// End-to-end exercises of the embedding API: the host-facing stack, error
// latching, constants and block storage.

use ingot::vm::{Cell, Forth, ForthError, MINIMUM_CORE_SIZE};

use std::cell::RefCell;
use std::fs;
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

#[test]
fn test_host_push_and_pop() {
    let (mut forth, _out) = new_forth();
    assert_eq!(forth.stack_position(), 0);
    forth.push(7);
    forth.push(35);
    assert_eq!(forth.stack_position(), 2);
    assert_eq!(forth.pop(), 35);
    assert_eq!(forth.pop(), 7);
    assert_eq!(forth.stack_position(), 0);
}

#[test]
fn test_host_values_reach_forth_code() {
    let (mut forth, out) = new_forth();
    forth.push(6);
    forth.push(7);
    forth.eval("* . ").unwrap();
    assert!(out.text().contains("42"));
}

#[test]
fn test_forth_values_reach_the_host() {
    let (mut forth, _out) = new_forth();
    forth.eval("2 3 + ").unwrap();
    assert_eq!(forth.pop(), 5);
}

#[test]
fn test_define_constant() {
    let (mut forth, out) = new_forth();
    forth.define_constant("answer", 42).unwrap();
    forth.eval("answer . ").unwrap();
    assert!(out.text().contains("42"));
}

#[test]
fn test_define_constant_rejects_long_names() {
    let (mut forth, _out) = new_forth();
    let name = "x".repeat(64);
    assert_eq!(
        forth.define_constant(&name, 1),
        Err(ForthError::NameTooLong)
    );
}

#[test]
fn test_fatal_error_is_sticky() {
    let (mut forth, _out) = new_forth();
    forth.eval(": bad 999999999 @ ; ").unwrap();
    assert!(!forth.invalid());
    assert!(forth.eval("bad").is_err());
    assert!(forth.invalid());
    // Every later run fails without executing anything.
    assert!(forth.eval(" 1 1 + . ").is_err());
    assert!(forth.run().is_err());
}

#[test]
fn test_state_survives_across_evals() {
    let (mut forth, out) = new_forth();
    forth.eval(": inc 1 + ; ").unwrap();
    forth.eval("10 inc ").unwrap();
    forth.eval("inc . ").unwrap();
    assert!(out.text().contains("12"));
}

#[test]
fn test_block_save_and_load() {
    let (mut forth, out) = new_forth();
    // 0x1234 -> 1234.blk in the working directory.
    forth.eval("512 4660 bsave . ").unwrap();
    let written = fs::read("1234.blk").unwrap();
    assert_eq!(written.len(), 1024);
    forth.eval("512 4660 bload . ").unwrap();
    let text = out.text();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("0"));
    assert_eq!(lines.next(), Some("0"));
    fs::remove_file("1234.blk").unwrap();
}

#[test]
fn test_block_load_missing_file_fails() {
    let (mut forth, out) = new_forth();
    forth.eval("512 65244 bload . ").unwrap();
    // Minus one, printed as an unsigned cell.
    assert!(out.text().contains(&Cell::MAX.to_string()));
    assert!(!forth.invalid());
}

#[test]
fn test_block_refuses_out_of_range_offset() {
    let (mut forth, out) = new_forth();
    // Offset beyond the byte length of memory fails before any file I/O.
    forth.eval("999999 48879 bsave . ").unwrap();
    assert!(out.text().contains(&Cell::MAX.to_string()));
    assert!(fs::metadata("beef.blk").is_err());
}

#[test]
fn test_find_word_from_forth() {
    let (mut forth, out) = new_forth();
    // find reads the next token and pushes its dictionary address.
    forth.eval("find dup . find nosuchword . ").unwrap();
    let text = out.text();
    let mut lines = text.lines();
    assert_ne!(lines.next(), Some("0"));
    assert_eq!(lines.next(), Some("0"));
}

#[test]
fn test_print_word() {
    use ingot::vm::{CELL_BYTES, STRING_OFFSET};
    let (mut forth, out) = new_forth();
    // The word buffer holds the most recent token, which by the time
    // `print` executes is "print" itself.
    let buffer = STRING_OFFSET * CELL_BYTES;
    forth.eval(&format!("{} print ", buffer)).unwrap();
    assert_eq!(out.text(), "print");
}

#[test]
fn test_many_handles_are_independent() {
    let (mut a, out_a) = new_forth();
    let (mut b, out_b) = new_forth();
    a.eval(": greet 65 emit ; ").unwrap();
    assert!(b.find("greet") == 0);
    a.eval("greet ").unwrap();
    b.eval("66 emit ").unwrap();
    assert_eq!(out_a.text(), "A");
    assert_eq!(out_b.text(), "B");
}
