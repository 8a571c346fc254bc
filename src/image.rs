// image.rs - Core image serialization
//
// An image on disk is the 8-byte header, the image size in cells as a
// native-endian u64, then every cell in host byte order. Nothing else is
// persisted: the input source, output sink and stack pointer are transient
// and get rebuilt by `make_default` after a load. Images are deliberately
// not portable across cell widths or endianness; the header pins both.

use std::io::{Read, Write};

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};

use crate::vm::{Cell, Forth, ForthError, CELL_BYTES, INVALID, MINIMUM_CORE_SIZE};

/// Image format version.
pub const CORE_VERSION: u8 = 0x02;

/// The expected header for this build: magic bytes around the cell size,
/// format version and an endianness flag (1 on little-endian hosts).
pub fn build_header() -> [u8; 8] {
    let endian = if cfg!(target_endian = "little") { 1 } else { 0 };
    [0xFF, b'4', b'T', b'H', CELL_BYTES as u8, CORE_VERSION, endian, 0xFF]
}

fn io_err(e: std::io::Error) -> ForthError {
    ForthError::IoError(e.to_string())
}

impl Forth {
    /// Serialize the image. An invalidated image is refused so a previously
    /// saved good core cannot be clobbered with a corrupt one.
    pub fn save_core<W: Write>(&self, out: &mut W) -> Result<(), ForthError> {
        if self.m[INVALID] != 0 {
            return Err(ForthError::Invalidated);
        }
        out.write_all(&self.header).map_err(io_err)?;
        out.write_u64::<NativeEndian>(self.core_size as u64)
            .map_err(io_err)?;
        for &cell in &self.m {
            out.write_uint::<NativeEndian>(cell as u64, CELL_BYTES)
                .map_err(io_err)?;
        }
        Ok(())
    }

    /// Raw dump of the cell array for offline inspection. Unlike
    /// `save_core` this writes no header or size, so it cannot be loaded
    /// back.
    pub fn dump_core<W: Write>(&self, out: &mut W) -> Result<(), ForthError> {
        for &cell in &self.m {
            out.write_uint::<NativeEndian>(cell as u64, CELL_BYTES)
                .map_err(io_err)?;
        }
        Ok(())
    }
}

/// Reconstitute a handle from a saved image. The header must match this
/// build byte for byte, the declared size must clear the minimum floor, and
/// the stream must contain every cell it promises. Input and output default
/// to the standard streams.
pub fn load_core<R: Read>(input: &mut R) -> Result<Forth, ForthError> {
    let expected = build_header();
    let mut actual = [0u8; 8];
    input
        .read_exact(&mut actual)
        .map_err(|_| ForthError::TruncatedImage)?;
    if actual != expected {
        return Err(ForthError::IncompatibleImage);
    }
    let core_size = input
        .read_u64::<NativeEndian>()
        .map_err(|_| ForthError::TruncatedImage)?;
    if (core_size as usize) < MINIMUM_CORE_SIZE {
        return Err(ForthError::CoreTooSmall);
    }
    let mut forth = Forth::blank(core_size as usize);
    for cell in forth.m.iter_mut() {
        *cell = input
            .read_uint::<NativeEndian>(CELL_BYTES)
            .map_err(|_| ForthError::TruncatedImage)? as Cell;
    }
    forth.header = actual;
    forth.make_default();
    forth.set_file_input(std::io::stdin());
    forth.set_file_output(std::io::stdout());
    Ok(forth)
}
