// opcode.rs - Virtual machine instruction set

use crate::vm::Cell;

/// Mask applied to a code cell before dispatch; the high bits of a misc
/// cell carry the hidden flag and the name length.
pub const INSTRUCTION_MASK: Cell = 0x7f;

/// One virtual machine instruction.
///
/// The discriminants are part of the image format: compiled words store raw
/// opcode values in memory, so reordering this enum would break every saved
/// core file. `Push` must stay at zero because compiled literals reference
/// the prefilled PUSH cell at `m[2]`, which zero-initialized memory already
/// contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Push the next cell of the instruction stream
    Push = 0,
    /// Append the current word pointer to the definition under construction
    Compile,
    /// Call: save the instruction pointer and enter this word's body
    Run,
    /// `:` - read a name, open a new definition, enter compile mode
    Define,
    /// Make the latest definition immediate
    Immediate,
    /// Read one token and interpret or compile it
    Read,
    /// `@` - fetch the cell TOS points at
    Load,
    /// `!` - store second-of-stack at the cell TOS points at
    Store,
    Sub,
    Add,
    And,
    Or,
    Xor,
    /// `invert` - bitwise complement of TOS
    Inv,
    /// `lshift`
    Shl,
    /// `rshift`
    Shr,
    Mul,
    Div,
    /// `u<` - unsigned compare, all ones when true
    Less,
    /// `u>` - unsigned compare, all ones when true
    More,
    /// Return from the current word
    Exit,
    /// Write the low byte of TOS to the output sink
    Emit,
    /// Read one character from the input source
    Key,
    /// `r>` - move a cell from the return stack to the data stack
    FromR,
    /// `>r` - move a cell from the data stack to the return stack
    ToR,
    /// Relative jump by the next cell of the instruction stream
    Branch,
    /// `?branch` - relative jump when the popped value is zero
    QBranch,
    /// Print TOS as a number in the current base
    PNum,
    /// `'` - push the next cell of the instruction stream (compiled literal)
    Quote,
    /// `,` - append TOS to the dictionary
    Comma,
    /// `=` - compare, all ones when true
    Equal,
    Swap,
    Dup,
    Drop,
    Over,
    /// Drop the current return frame, turning the next call into a tail call
    Tail,
    /// Save one block from memory to a block file
    BSave,
    /// Load one block from a block file into memory
    BLoad,
    /// Read a token and push its dictionary address, or zero
    Find,
    /// Print the NUL terminated string at byte offset TOS
    Print,
    /// Push the data stack depth in cells
    Depth,
    /// Push milliseconds elapsed since the image was created
    Clock,
}

impl Opcode {
    /// Decode the low seven bits of a code cell. `None` is an illegal
    /// opcode, which the interpreter treats as fatal corruption.
    pub fn from_cell(cell: Cell) -> Option<Opcode> {
        match cell & INSTRUCTION_MASK {
            0 => Some(Opcode::Push),
            1 => Some(Opcode::Compile),
            2 => Some(Opcode::Run),
            3 => Some(Opcode::Define),
            4 => Some(Opcode::Immediate),
            5 => Some(Opcode::Read),
            6 => Some(Opcode::Load),
            7 => Some(Opcode::Store),
            8 => Some(Opcode::Sub),
            9 => Some(Opcode::Add),
            10 => Some(Opcode::And),
            11 => Some(Opcode::Or),
            12 => Some(Opcode::Xor),
            13 => Some(Opcode::Inv),
            14 => Some(Opcode::Shl),
            15 => Some(Opcode::Shr),
            16 => Some(Opcode::Mul),
            17 => Some(Opcode::Div),
            18 => Some(Opcode::Less),
            19 => Some(Opcode::More),
            20 => Some(Opcode::Exit),
            21 => Some(Opcode::Emit),
            22 => Some(Opcode::Key),
            23 => Some(Opcode::FromR),
            24 => Some(Opcode::ToR),
            25 => Some(Opcode::Branch),
            26 => Some(Opcode::QBranch),
            27 => Some(Opcode::PNum),
            28 => Some(Opcode::Quote),
            29 => Some(Opcode::Comma),
            30 => Some(Opcode::Equal),
            31 => Some(Opcode::Swap),
            32 => Some(Opcode::Dup),
            33 => Some(Opcode::Drop),
            34 => Some(Opcode::Over),
            35 => Some(Opcode::Tail),
            36 => Some(Opcode::BSave),
            37 => Some(Opcode::BLoad),
            38 => Some(Opcode::Find),
            39 => Some(Opcode::Print),
            40 => Some(Opcode::Depth),
            41 => Some(Opcode::Clock),
            _ => None,
        }
    }
}

/// The instructions that get a named dictionary entry at boot, in opcode
/// order starting at `Read`. PUSH, COMPILE, RUN, DEFINE and IMMEDIATE are
/// deliberately absent: the first three are internal plumbing with no name,
/// and the last two are installed separately as immediate words `:` and
/// `immediate`.
pub const NAMED: &[(&str, Opcode)] = &[
    ("read", Opcode::Read),
    ("@", Opcode::Load),
    ("!", Opcode::Store),
    ("-", Opcode::Sub),
    ("+", Opcode::Add),
    ("and", Opcode::And),
    ("or", Opcode::Or),
    ("xor", Opcode::Xor),
    ("invert", Opcode::Inv),
    ("lshift", Opcode::Shl),
    ("rshift", Opcode::Shr),
    ("*", Opcode::Mul),
    ("/", Opcode::Div),
    ("u<", Opcode::Less),
    ("u>", Opcode::More),
    ("exit", Opcode::Exit),
    ("emit", Opcode::Emit),
    ("key", Opcode::Key),
    ("r>", Opcode::FromR),
    (">r", Opcode::ToR),
    ("branch", Opcode::Branch),
    ("?branch", Opcode::QBranch),
    ("pnum", Opcode::PNum),
    ("'", Opcode::Quote),
    (",", Opcode::Comma),
    ("=", Opcode::Equal),
    ("swap", Opcode::Swap),
    ("dup", Opcode::Dup),
    ("drop", Opcode::Drop),
    ("over", Opcode::Over),
    ("tail", Opcode::Tail),
    ("bsave", Opcode::BSave),
    ("bload", Opcode::BLoad),
    ("find", Opcode::Find),
    ("print", Opcode::Print),
    ("depth", Opcode::Depth),
    ("clock", Opcode::Clock),
];
