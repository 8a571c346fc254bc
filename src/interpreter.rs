// interpreter.rs - The threaded-code dispatch loop
//
// The interpreter keeps its hot registers in locals: `i_reg` walks the
// instruction stream, `pc` points into the word being executed, `f` is the
// top of the data stack and `sp` the rest of it. The outer loop fetches the
// next word pointer from the stream; the dispatch executes that word's code
// cell. READ re-enters the dispatch directly when it resolves a token to a
// word, which is how interpretation, immediate execution and reference
// compilation all share one mechanism.

use crate::lexer::numberify;
use crate::opcode::{Opcode, INSTRUCTION_MASK};
use crate::vm::{
    ck, Cell, Forth, ForthError, BASE, CELL_BYTES, DIC, DICTIONARY_START, INSTRUCTION, INVALID,
    RSTK, STACK_SIZE, STATE, TOP,
};

/// Push onto the data stack region; overflow is a fatal bounds failure.
macro_rules! spush {
    ($o:expr, $sp:ident, $v:expr) => {{
        let v = $v;
        $sp += 1;
        if $sp >= $o.core_size as usize {
            $o.check_bounds($sp as Cell, line!())?;
        }
        $o.m[$sp] = v;
    }};
}

/// Pop from the data stack region; running off the bottom of memory is
/// fatal. Like the rest of the hot path this does not police the stack
/// boundary itself, only the memory boundary.
macro_rules! spop {
    ($o:expr, $sp:ident) => {{
        if $sp == 0 {
            eprintln!("( fatal 'stack-underflow {} )", $sp);
            return Err(ForthError::StackUnderflow);
        }
        let v = $o.m[$sp];
        $sp -= 1;
        v
    }};
}

impl Forth {
    /// Run the interpreter until its input is exhausted. A recoverable
    /// fault (unknown word, division by zero, block I/O failure) reports a
    /// diagnostic and keeps going; a fatal one (bounds failure, illegal
    /// opcode) unwinds here, marks the image invalid, and every later call
    /// fails immediately.
    pub fn run(&mut self) -> Result<(), ForthError> {
        if self.m[INVALID] != 0 {
            self.m[INVALID] = 1;
            return Err(ForthError::Invalidated);
        }
        match self.exec() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.m[INVALID] = 1;
                Err(e)
            }
        }
    }

    fn exec(&mut self) -> Result<(), ForthError> {
        let mut sp = self.sp;
        let mut i_reg = self.m[INSTRUCTION];
        let mut f = self.m[TOP];

        'outer: loop {
            let mut pc = self.m[ck!(self, i_reg)];
            i_reg = i_reg.wrapping_add(1);
            if pc == 0 {
                break 'outer;
            }
            'inner: loop {
                let op = self.m[ck!(self, pc)] & INSTRUCTION_MASK;
                pc = pc.wrapping_add(1);
                match Opcode::from_cell(op) {
                    Some(Opcode::Push) | Some(Opcode::Quote) => {
                        spush!(self, sp, f);
                        f = self.m[ck!(self, i_reg)];
                        i_reg = i_reg.wrapping_add(1);
                    }
                    Some(Opcode::Compile) => {
                        let d = ck!(self, self.m[DIC]);
                        self.m[d] = pc;
                        self.m[DIC] = self.m[DIC].wrapping_add(1);
                    }
                    Some(Opcode::Run) => {
                        let r = self.m[RSTK].wrapping_add(1);
                        let ri = ck!(self, r);
                        self.m[RSTK] = r;
                        self.m[ri] = i_reg;
                        i_reg = pc;
                    }
                    Some(Opcode::Define) => {
                        self.m[STATE] = 1;
                        let name = match self.get_word() {
                            Some(w) => w,
                            None => break 'outer,
                        };
                        self.compile(Opcode::Compile, &name)?;
                        let d = ck!(self, self.m[DIC]);
                        self.m[d] = Opcode::Run as Cell;
                        self.m[DIC] = self.m[DIC].wrapping_add(1);
                    }
                    Some(Opcode::Immediate) => {
                        // Back up over the code field DEFINE just wrote,
                        // turn the misc opcode into RUN, and let the body
                        // start where the RUN cell was.
                        self.m[DIC] = self.m[DIC].wrapping_sub(2);
                        let d = ck!(self, self.m[DIC]);
                        self.m[d] &= !INSTRUCTION_MASK;
                        self.m[d] |= Opcode::Run as Cell;
                        self.m[DIC] = self.m[DIC].wrapping_add(1);
                    }
                    Some(Opcode::Read) => {
                        let word = match self.get_word() {
                            Some(w) => w,
                            None => break 'outer,
                        };
                        let w = self.find(&word);
                        if w > 1 {
                            pc = w;
                            if self.m[STATE] == 0
                                && self.m[ck!(self, pc)] & INSTRUCTION_MASK
                                    == Opcode::Compile as Cell
                            {
                                // Interpreting a compiling word: step past
                                // the COMPILE cell and execute its code.
                                pc = pc.wrapping_add(1);
                            }
                            continue 'inner;
                        }
                        match numberify(self.m[BASE], &word) {
                            Some(n) if self.m[STATE] != 0 => {
                                // Compile a literal: a reference to the
                                // PUSH cell at m[2], then the value.
                                let d = ck!(self, self.m[DIC]);
                                self.m[d] = 2;
                                self.m[DIC] = self.m[DIC].wrapping_add(1);
                                let d = ck!(self, self.m[DIC]);
                                self.m[d] = n;
                                self.m[DIC] = self.m[DIC].wrapping_add(1);
                            }
                            Some(n) => {
                                spush!(self, sp, f);
                                f = n;
                            }
                            None => eprintln!("( error \"{} is not a word\" )", word),
                        }
                    }
                    Some(Opcode::Load) => f = self.m[ck!(self, f)],
                    Some(Opcode::Store) => {
                        let a = ck!(self, f);
                        self.m[a] = spop!(self, sp);
                        f = spop!(self, sp);
                    }
                    Some(Opcode::Sub) => f = spop!(self, sp).wrapping_sub(f),
                    Some(Opcode::Add) => f = spop!(self, sp).wrapping_add(f),
                    Some(Opcode::And) => f = spop!(self, sp) & f,
                    Some(Opcode::Or) => f = spop!(self, sp) | f,
                    Some(Opcode::Xor) => f = spop!(self, sp) ^ f,
                    Some(Opcode::Inv) => f = !f,
                    Some(Opcode::Shl) => f = spop!(self, sp).wrapping_shl(f as u32),
                    Some(Opcode::Shr) => f = spop!(self, sp).wrapping_shr(f as u32),
                    Some(Opcode::Mul) => f = spop!(self, sp).wrapping_mul(f),
                    Some(Opcode::Div) => {
                        if f == 0 {
                            eprintln!("( error \"x/0\" )");
                        } else {
                            f = spop!(self, sp) / f;
                        }
                    }
                    Some(Opcode::Less) => f = if spop!(self, sp) < f { Cell::MAX } else { 0 },
                    Some(Opcode::More) => f = if spop!(self, sp) > f { Cell::MAX } else { 0 },
                    Some(Opcode::Equal) => f = if spop!(self, sp) == f { Cell::MAX } else { 0 },
                    Some(Opcode::Exit) => {
                        let r = ck!(self, self.m[RSTK]);
                        i_reg = self.m[r];
                        self.m[RSTK] = self.m[RSTK].wrapping_sub(1);
                    }
                    Some(Opcode::Emit) => {
                        let _ = self.output.write_all(&[f as u8]);
                        f = spop!(self, sp);
                    }
                    Some(Opcode::Key) => {
                        spush!(self, sp, f);
                        f = match self.get_char() {
                            Some(b) => b as Cell,
                            None => Cell::MAX,
                        };
                    }
                    Some(Opcode::FromR) => {
                        spush!(self, sp, f);
                        let r = ck!(self, self.m[RSTK]);
                        f = self.m[r];
                        self.m[RSTK] = self.m[RSTK].wrapping_sub(1);
                    }
                    Some(Opcode::ToR) => {
                        let r = self.m[RSTK].wrapping_add(1);
                        let ri = ck!(self, r);
                        self.m[RSTK] = r;
                        self.m[ri] = f;
                        f = spop!(self, sp);
                    }
                    Some(Opcode::Branch) => {
                        i_reg = i_reg.wrapping_add(self.m[ck!(self, i_reg)]);
                    }
                    Some(Opcode::QBranch) => {
                        let step = if f == 0 { self.m[ck!(self, i_reg)] } else { 1 };
                        i_reg = i_reg.wrapping_add(step);
                        f = spop!(self, sp);
                    }
                    Some(Opcode::PNum) => {
                        self.print_cell(f);
                        f = spop!(self, sp);
                    }
                    Some(Opcode::Comma) => {
                        let d = ck!(self, self.m[DIC]);
                        self.m[d] = f;
                        self.m[DIC] = self.m[DIC].wrapping_add(1);
                        f = spop!(self, sp);
                    }
                    Some(Opcode::Swap) => {
                        let w = f;
                        f = self.m[sp];
                        self.m[sp] = w;
                    }
                    Some(Opcode::Dup) => spush!(self, sp, f),
                    Some(Opcode::Drop) => f = spop!(self, sp),
                    Some(Opcode::Over) => {
                        let w = self.m[sp];
                        spush!(self, sp, f);
                        f = w;
                    }
                    Some(Opcode::Tail) => {
                        self.m[RSTK] = self.m[RSTK].wrapping_sub(1);
                    }
                    Some(Opcode::BSave) => {
                        let off = spop!(self, sp);
                        f = self.blockio(off, f, true);
                    }
                    Some(Opcode::BLoad) => {
                        let off = spop!(self, sp);
                        f = self.blockio(off, f, false);
                    }
                    Some(Opcode::Find) => {
                        spush!(self, sp, f);
                        let word = match self.get_word() {
                            Some(w) => w,
                            None => break 'outer,
                        };
                        f = self.find(&word);
                        if f < DICTIONARY_START as Cell {
                            f = 0;
                        }
                    }
                    Some(Opcode::Print) => {
                        let s = self.cstring_at(f as usize);
                        let _ = self.output.write_all(&s);
                        f = spop!(self, sp);
                    }
                    Some(Opcode::Depth) => {
                        let depth = (sp as Cell).wrapping_sub(self.core_size - 2 * self.m[STACK_SIZE]);
                        spush!(self, sp, f);
                        f = depth;
                    }
                    Some(Opcode::Clock) => {
                        spush!(self, sp, f);
                        f = self.start.elapsed().as_millis() as Cell;
                    }
                    None => {
                        eprintln!("( fatal 'illegal-op {} )", op);
                        return Err(ForthError::IllegalOpcode);
                    }
                }
                break 'inner;
            }
        }

        // Save the interpreter registers so host push/pop and the next run
        // see a consistent stack. Fatal unwinds skip this on purpose.
        self.sp = sp;
        self.m[TOP] = f;
        Ok(())
    }

    /// Print a cell as a number in the base held by the BASE register.
    /// Base 16 uses the fixed-width `0x` form; base 0 reads as decimal.
    fn print_cell(&mut self, f: Cell) {
        let base = self.m[BASE];
        let text = match base {
            16 => format!("0x{:0width$x}", f, width = CELL_BYTES * 2),
            0 | 10 => f.to_string(),
            2..=36 => radix_string(f, base),
            _ => f.to_string(),
        };
        let _ = self.output.write_all(text.as_bytes());
    }
}

fn radix_string(mut v: Cell, base: Cell) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if v == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while v != 0 {
        out.push(DIGITS[(v % base) as usize]);
        v /= base;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
