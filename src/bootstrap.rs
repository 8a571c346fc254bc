// bootstrap.rs - Image construction
//
// Almost nothing is hardwired: the VM gets a three-cell driver word that
// calls READ forever, a handful of primitive headers, and from there the
// rest of the language is defined in Forth by the embedded boot program.

use std::io::{Read, Write};

use crate::opcode::{Opcode, NAMED};
use crate::vm::{
    Cell, Forth, ForthError, CELL_BYTES, DIC, DICTIONARY_START, INSTRUCTION, MINIMUM_CORE_SIZE,
    PWD, STACK_SIZE,
};

/// Boot-time constants naming every register. The first two get the short
/// names Forth code actually uses (`h` is the dictionary pointer, `r` the
/// return stack pointer); the rest are tick-prefixed because they are
/// plumbing. `state` itself is taken by the word defined during the minimal
/// bootstrap, hence `` `state ``.
const REGISTER_NAMES: &[&str] = &[
    "h",
    "r",
    "`state",
    "base",
    "pwd",
    "`source-id",
    "`sin",
    "`sidx",
    "`slen",
    "`start-address",
    "`fin",
    "`fout",
    "`stdin",
    "`stdout",
    "`stderr",
    "`argc",
    "`argv",
    "`debug",
    "`invalid",
    "`top",
    "`instruction",
    "`stack-size",
    "`start-time",
];

/// The minimum needed for a sane environment: a word that pushes the
/// address of the STATE register, and `;` itself, which compiles an `exit`
/// and leaves compile mode.
const MINIMAL_BOOT: &str = ": state 8 exit : ; immediate ' exit , 0 state ! ;";

/// The embedded boot program. Control flow, comments and the usual stack
/// shuffles are not primitives; they are defined here in terms of the
/// instruction words. The text is data and the interpreter is built around
/// its exact evaluation, so edit with care.
const BOOT_PROGRAM: &str = r#"
: here h @ ;
: [ immediate 0 state ! ;
: ] 1 state ! ;
: >mark here 0 , ;
: :noname immediate -1 , here 2 , ] ;
: if immediate ' ?branch , >mark ;
: else immediate ' branch , >mark swap dup here swap - swap ! ;
: then immediate dup here swap - swap ! ;
: 2dup over over ;
: begin immediate here ;
: until immediate ' ?branch , here - , ;
: '\n' 10 ;
: ')' 41 ;
: cr '\n' emit ;
: ( immediate begin key ')' = until ; ( We can now use comments! )
: rot >r swap r> swap ;
: -rot rot rot ;
: tuck swap over ;
: nip swap drop ;
: :: [ find : , ] ;
: allot here + h ! ;
"#;

/// Higher-level words layered on top of the boot program.
const PRELUDE: &str = r#"
: . pnum cr ;
: bl 32 ;
: space bl emit ;
: 2drop drop drop ;
: 1+ 1 + ;
: 1- 1 - ;
"#;

impl Forth {
    /// Create a fresh image of `size` cells reading from `input` and
    /// writing to `output`: zero memory, set the transient registers,
    /// install the driver word and the primitives, then evaluate the boot
    /// program.
    pub fn init(
        size: usize,
        input: impl Read + 'static,
        output: impl Write + 'static,
    ) -> Result<Forth, ForthError> {
        if size < MINIMUM_CORE_SIZE {
            return Err(ForthError::CoreTooSmall);
        }
        let mut o = Forth::blank(size);
        o.make_default();
        o.output = Box::new(output);

        // The cell compiled literals point at. PUSH is opcode zero, so
        // zeroed memory already has this value; keep it spelled out.
        o.m[2] = Opcode::Push as Cell;

        // The driver: a TAIL instruction word, a word holding READ then
        // RUN, and a three-cell instruction stream that reads one token,
        // drops its return frame, and calls itself again.
        o.m[PWD] = 0;
        let tail = DICTIONARY_START as Cell;
        o.m[DIC] = tail;
        o.m[DICTIONARY_START] = Opcode::Tail as Cell;
        o.m[DIC] += 1;
        let read = o.m[DIC];
        o.m[read as usize] = Opcode::Read as Cell;
        o.m[DIC] += 1;
        let run = o.m[DIC] as usize;
        o.m[run] = Opcode::Run as Cell;
        o.m[DIC] += 1;
        o.m[INSTRUCTION] = o.m[DIC];
        for cell in [read, tail, o.m[INSTRUCTION] - 1] {
            let d = o.m[DIC] as usize;
            o.m[d] = cell;
            o.m[DIC] += 1;
        }

        // `:` and `immediate` run even in compile mode; everything else
        // named here is an ordinary compiling word wrapping one
        // instruction.
        o.compile(Opcode::Define, ":")?;
        o.compile(Opcode::Immediate, "immediate")?;
        for &(name, op) in NAMED {
            o.compile(Opcode::Compile, name)?;
            let d = o.m[DIC] as usize;
            o.m[d] = op as Cell;
            o.m[DIC] += 1;
        }

        o.eval(MINIMAL_BOOT)?;
        for (i, name) in REGISTER_NAMES.iter().enumerate() {
            o.define_constant(name, (i + DIC) as Cell)?;
        }
        o.eval(BOOT_PROGRAM)?;
        o.eval(PRELUDE)?;
        o.define_constant("size", CELL_BYTES as Cell)?;
        o.define_constant("stack-start", o.core_size - 2 * o.m[STACK_SIZE])?;
        o.define_constant("max-core", o.core_size)?;

        o.set_file_input(input);
        Ok(o)
    }
}
