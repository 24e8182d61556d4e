//! Console output for user programs.
//!
//! The console is a grid of 16-bit cells at [`CONSOLE_ADDR`]: the character
//! byte followed by its attribute byte. It is mapped user-writable, so
//! programs draw into it with plain stores.

use kernel_info::memory::{CONSOLE_ADDR, CONSOLE_COLUMNS};
use kernel_registers::Register::{self, Rax, Rbx, Rcx};
use machine_cpu::Assembler;

/// Light grey on black.
pub const ATTR_NORMAL: u8 = 0x07;

/// Address of the console cell at `row`, `col`.
///
/// ```rust
/// assert_eq!(stdlib::console_cell(0, 0), 0xB_8000);
/// assert_eq!(stdlib::console_cell(1, 2), 0xB_8000 + 2 * 82);
/// ```
#[must_use]
pub const fn console_cell(row: usize, col: usize) -> u64 {
    CONSOLE_ADDR + 2 * (row * CONSOLE_COLUMNS + col) as u64
}

/// Emit code that writes `text` starting at `cell`.
///
/// Clobbers `rax` and `rbx`.
pub fn print_at(asm: &mut Assembler, cell: u64, text: &[u8], attr: u8) {
    asm.movi(Rbx, cell);
    let mut disp = 0i32;
    for &ch in text {
        asm.movi(Rax, u64::from(ch))
            .stb(Rbx, disp, Rax)
            .movi(Rax, u64::from(attr))
            .stb(Rbx, disp + 1, Rax);
        disp += 2;
    }
}

/// Emit code that copies the NUL-terminated string at `src` to the console
/// starting at `cell`.
///
/// Clobbers `rax`, `rbx`, `rcx` and advances `src` to the terminator.
pub fn print_c_string(asm: &mut Assembler, cell: u64, src: Register, attr: u8) {
    debug_assert!(!matches!(src, Rax | Rbx | Rcx));
    let top = asm.new_label();
    let done = asm.new_label();
    asm.movi(Rbx, cell).movi(Rcx, u64::from(attr));
    asm.bind(top)
        .ldb(Rax, src, 0)
        .jz(Rax, done)
        .stb(Rbx, 0, Rax)
        .stb(Rbx, 1, Rcx)
        .addi(src, 1)
        .addi(Rbx, 2)
        .jmp(top);
    asm.bind(done);
}

/// Emit code that increments the byte at `addr`, wrapping.
///
/// Clobbers `rax` and `rbx`.
pub fn increment_byte(asm: &mut Assembler, addr: u64) {
    asm.movi(Rbx, addr)
        .ldb(Rax, Rbx, 0)
        .addi(Rax, 1)
        .stb(Rbx, 0, Rax);
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::VirtualAddress;
    use machine_cpu::{Instruction, decode};

    #[test]
    fn print_at_writes_character_then_attribute() {
        let mut asm = Assembler::new(VirtualAddress::new(0x10_0000));
        print_at(&mut asm, console_cell(3, 0), b"ok", 0x0C);
        let code = asm.finish().unwrap();

        // movi rbx + 2 characters * (movi, stb, movi, stb)
        assert_eq!(code.len(), 10 + 2 * (10 + 7 + 10 + 7));
        assert_eq!(
            decode(&code).unwrap(),
            Instruction::MovImm { dst: Rbx, imm: 0xB_8000 + 3 * 160 }
        );
        assert_eq!(
            decode(&code[44..]).unwrap(),
            Instruction::MovImm { dst: Rax, imm: u64::from(b'k') }
        );
        assert_eq!(
            decode(&code[71..]).unwrap(),
            Instruction::StoreByte { base: Rbx, src: Rax, disp: 3 }
        );
    }

    #[test]
    fn last_cell_is_inside_console() {
        let last = console_cell(24, 79);
        assert_eq!(last + 2, CONSOLE_ADDR + 80 * 25 * 2);
    }
}
