//! # Console
//!
//! 80×25 text cells at [`CONSOLE_ADDR`], two bytes each: character, then
//! attribute. The kernel writes straight to physical memory; processes see
//! the same page through their `P|W|U` mapping.

use kernel_alloc::{PhysAccessError, PhysMemory};
use kernel_info::memory::{CONSOLE_ADDR, CONSOLE_COLUMNS, CONSOLE_ROWS};
use kernel_memory_addresses::PhysicalAddress;

/// Row that fault and panic reports are written to.
pub const ERROR_ROW: usize = 24;

/// Light red on black.
pub const ERROR_ATTR: u8 = 0x0C;

const BLANK: u8 = b' ';

fn row_address(row: usize) -> PhysicalAddress {
    PhysicalAddress::new(CONSOLE_ADDR + (2 * row * CONSOLE_COLUMNS) as u64)
}

/// Replace console row `row` with `text`, cut at the row's width and padded
/// with blanks.
///
/// # Errors
/// `row` is not a console row.
pub fn write_line(
    mem: &mut PhysMemory,
    row: usize,
    attr: u8,
    text: &str,
) -> Result<(), PhysAccessError> {
    let mut cells = [0u8; 2 * CONSOLE_COLUMNS];
    let mut chars = text.bytes().chain(core::iter::repeat(BLANK));
    for cell in cells.chunks_exact_mut(2) {
        cell[0] = chars.next().unwrap_or(BLANK);
        cell[1] = attr;
    }
    if row >= CONSOLE_ROWS {
        return Err(PhysAccessError {
            start: row_address(row),
            len: cells.len(),
        });
    }
    mem.write(row_address(row), &cells)
}

/// The characters of row `row`, attributes dropped.
///
/// # Errors
/// `row` is not a console row.
pub fn read_row(mem: &PhysMemory, row: usize) -> Result<[u8; CONSOLE_COLUMNS], PhysAccessError> {
    let mut cells = [0u8; 2 * CONSOLE_COLUMNS];
    if row >= CONSOLE_ROWS {
        return Err(PhysAccessError {
            start: row_address(row),
            len: cells.len(),
        });
    }
    mem.read(row_address(row), &mut cells)?;

    let mut chars = [0u8; CONSOLE_COLUMNS];
    for (ch, cell) in chars.iter_mut().zip(cells.chunks_exact(2)) {
        *ch = cell[0];
    }
    Ok(chars)
}

/// Blank the whole console.
///
/// # Errors
/// Physical memory does not cover the console.
pub fn clear(mem: &mut PhysMemory) -> Result<(), PhysAccessError> {
    (0..CONSOLE_ROWS).try_for_each(|row| write_line(mem, row, 0x07, ""))
}
