//! # Screen
//!
//! Text renderings of the console and of a [`MemoryView`], one character
//! per page:
//!
//! ```text
//!   PHYSICAL MEMORY
//!   0x000000 RKKKK...........................................................
//!   ...
//!   VIRTUAL ADDRESS SPACE FOR 1
//!   0x000000  ###########...
//! ```
//!
//! | Symbol | Page |
//! |--------|------|
//! | `.` | free |
//! | `R` | reserved |
//! | `K` | kernel |
//! | `C` | console |
//! | `1`..`9`, `a`..`f` | owned by that pid |
//! | `S` | shared by several processes |
//! | `#` | mapped kernel-only (virtual view) |
//! | ` ` | unmapped (virtual view) |

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;
use kernel::{MemoryView, PageOwner, console};
use kernel_alloc::{PhysAccessError, PhysMemory};
use kernel_info::memory::CONSOLE_ROWS;
use kernel_memory_addresses::PAGE_SIZE;

/// Pages per rendered line.
pub const PAGES_PER_LINE: usize = 64;

/// Character standing for a page owned by `owner`.
#[must_use]
pub fn owner_symbol(owner: PageOwner) -> char {
    match owner {
        PageOwner::Free => '.',
        PageOwner::Reserved => 'R',
        PageOwner::Kernel => 'K',
        PageOwner::Console => 'C',
        PageOwner::Shared => 'S',
        PageOwner::Process(pid) => u32::try_from(pid)
            .ok()
            .and_then(|pid| char::from_digit(pid, 36))
            .unwrap_or('?'),
    }
}

/// The console's characters, one string per row, trailing blanks removed.
/// Control and non-ASCII bytes show as blanks.
///
/// # Errors
/// Physical memory does not cover the console.
pub fn console_lines(mem: &PhysMemory) -> Result<Vec<String>, PhysAccessError> {
    (0..CONSOLE_ROWS)
        .map(|row| {
            let chars = console::read_row(mem, row)?;
            let line: String = chars
                .iter()
                .map(|&c| if c.is_ascii_graphic() { char::from(c) } else { ' ' })
                .collect();
            Ok(String::from(line.trim_end()))
        })
        .collect()
}

/// The console as text, rows separated by newlines.
///
/// # Errors
/// Physical memory does not cover the console.
pub fn render_console(mem: &PhysMemory) -> Result<String, PhysAccessError> {
    Ok(console_lines(mem)?.join("\n"))
}

/// The physical map and, if present, the virtual map of `view`.
#[must_use]
pub fn render_memory(view: &MemoryView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "PHYSICAL MEMORY (tick {})", view.ticks);
    grid(&mut out, view.physical.iter().map(|&owner| owner_symbol(owner)));

    if let Some(map) = &view.process {
        let _ = writeln!(out, "VIRTUAL ADDRESS SPACE FOR {}", map.pid);
        grid(
            &mut out,
            map.pages.iter().map(|page| match page {
                None => ' ',
                Some(m) if !m.user => '#',
                Some(m) => owner_symbol(m.owner),
            }),
        );
    }
    out
}

fn grid(out: &mut String, symbols: impl Iterator<Item = char>) {
    let symbols: Vec<char> = symbols.collect();
    for (n, line) in symbols.chunks(PAGES_PER_LINE).enumerate() {
        let addr = (n * PAGES_PER_LINE) as u64 * PAGE_SIZE;
        let _ = write!(out, "{addr:#08x} ");
        out.extend(line);
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::memshow::{Mapping, ProcessMap};
    use kernel_memory_addresses::PhysicalPage;

    #[test]
    fn pids_become_digits_then_letters() {
        assert_eq!(owner_symbol(PageOwner::Process(1)), '1');
        assert_eq!(owner_symbol(PageOwner::Process(10)), 'a');
        assert_eq!(owner_symbol(PageOwner::Process(15)), 'f');
        assert_eq!(owner_symbol(PageOwner::Process(99)), '?');
    }

    #[test]
    fn physical_map_wraps_every_64_pages() {
        let mut physical = alloc::vec![PageOwner::Free; 2 * PAGES_PER_LINE];
        physical[0] = PageOwner::Reserved;
        physical[1] = PageOwner::Kernel;
        physical[PAGES_PER_LINE] = PageOwner::Process(2);
        let view = MemoryView {
            ticks: 7,
            physical,
            process: None,
        };

        let text = render_memory(&view);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "PHYSICAL MEMORY (tick 7)");
        assert!(lines[1].starts_with("0x000000 RK..."));
        assert!(lines[2].starts_with("0x040000 2..."));
        assert_eq!(lines[2].len(), 9 + PAGES_PER_LINE);
    }

    #[test]
    fn virtual_map_marks_kernel_only_and_unmapped_pages() {
        let page = PhysicalPage::from_number(5);
        let mapping = |user| {
            Some(Mapping {
                page,
                owner: PageOwner::Process(3),
                user,
                writable: true,
            })
        };
        let view = MemoryView {
            ticks: 1,
            physical: Vec::new(),
            process: Some(ProcessMap {
                pid: 3,
                pages: alloc::vec![None, mapping(false), mapping(true)],
            }),
        };

        let text = render_memory(&view);
        assert!(text.contains("VIRTUAL ADDRESS SPACE FOR 3\n0x000000  #3\n"));
    }

    #[test]
    fn fresh_console_is_blank() {
        let mut mem = PhysMemory::new();
        console::clear(&mut mem).unwrap();
        console::write_line(&mut mem, 3, 0x07, "hello\tworld").unwrap();

        let lines = console_lines(&mem).unwrap();
        assert_eq!(lines.len(), CONSOLE_ROWS);
        assert_eq!(lines[3], "hello world");
        assert!(lines[0].is_empty());
    }
}
