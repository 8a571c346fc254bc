// blocks.rs - Block file storage
//
// Traditional Forth persistence: numbered 1024-byte blocks, one file per
// block in the working directory, named by the zero-padded hex id with a
// .blk suffix. A block moves between the file and the image's byte view at
// a caller-chosen byte offset.

use std::fs::File;
use std::io::{Read, Write};

use crate::vm::{Cell, Forth, BLOCK_SIZE, CELL_BYTES};

fn block_name(id: Cell) -> String {
    format!("{:04x}.blk", id)
}

impl Forth {
    /// Transfer one block between `XXXX.blk` and memory at `offset` bytes.
    /// Returns 0 on success and all-ones (minus one) on any failure; an
    /// offset that would run past the end of memory is refused before any
    /// file is touched.
    pub(crate) fn blockio(&mut self, offset: Cell, id: Cell, write: bool) -> Cell {
        let fail = Cell::MAX;
        let bytes_len = self.core_size as usize * CELL_BYTES;
        let offset = offset as usize;
        if offset > bytes_len - BLOCK_SIZE {
            return fail;
        }
        let name = block_name(id);
        if write {
            let mut buf = vec![0u8; BLOCK_SIZE];
            for (i, b) in buf.iter_mut().enumerate() {
                *b = self.byte_fetch(offset + i);
            }
            let mut file = match File::create(&name) {
                Ok(f) => f,
                Err(_) => {
                    eprintln!("( error 'file-open \"{} : could not open file\" )", name);
                    return fail;
                }
            };
            if file.write_all(&buf).is_err() {
                return fail;
            }
        } else {
            let mut file = match File::open(&name) {
                Ok(f) => f,
                Err(_) => {
                    eprintln!("( error 'file-open \"{} : could not open file\" )", name);
                    return fail;
                }
            };
            let mut buf = vec![0u8; BLOCK_SIZE];
            if file.read_exact(&mut buf).is_err() {
                return fail;
            }
            for (i, &b) in buf.iter().enumerate() {
                if self.byte_store(offset + i, b, line!()).is_err() {
                    return fail;
                }
            }
        }
        0
    }
}
