//! Bytecode validation for the restricted execution mode.

/// `PUSH1`, the first opcode carrying immediate data.
const PUSH1: u8 = 0x60;
/// `PUSH32`, the last opcode carrying immediate data.
const PUSH32: u8 = 0x7f;
const JUMPDEST: u8 = 0x5b;

/// Returns `false` if the hex encoded `bytecode` holds a `JUMPDEST` opcode.
///
/// The scan walks the code one byte (two hex characters) at a time and skips the immediate
/// data of `PUSH1..=PUSH32`, so a `0x5b` byte inside pushed data is not an opcode. Characters
/// that are not hex (such as unlinked library placeholders) are stepped over.
pub fn is_safe_for_restricted_mode(bytecode: &str) -> bool {
    let code = bytecode.strip_prefix("0x").unwrap_or(bytecode).as_bytes();

    let mut i = 0;
    while i < code.len() {
        let pair = &code[i..(i + 2).min(code.len())];
        let opcode = std::str::from_utf8(pair)
            .ok()
            .and_then(|pair| u8::from_str_radix(pair, 16).ok());

        match opcode {
            Some(op) if (PUSH1..=PUSH32).contains(&op) => {
                // PUSHn is followed by n bytes of data.
                let data_len = (op - PUSH1 + 1) as usize;
                i += 2 + 2 * data_len;
            }
            Some(JUMPDEST) => return false,
            _ => i += 2,
        }
    }

    true
}
