//! Library linking for creation bytecode.
//!
//! Solidity leaves a 40 character placeholder wherever a contract calls into an external
//! library. Two placeholder flavours exist:
//! - legacy: `__` + library name (truncated to 36 chars, padded with `_`) + `__`
//! - hashed: `__$` + first 34 hex chars of `keccak256(name)` + `$__`
//!
//! Linking substitutes every occurrence of either form with the library address.

use std::collections::BTreeMap;

use alloy_core::primitives::{Address, keccak256};

/// Libraries that are linked automatically into every contract deployed after them.
pub const LINKABLE_LIBRARIES: [&str; 3] = ["SafeDecimalMath", "Math", "SystemSettingsLib"];

/// Replace the placeholders of every library in `libraries` by its address.
///
/// Keys are either bare library names or fully qualified `File.sol:Name` names. Bytecode
/// that does not reference a library is returned unchanged.
pub fn link_bytecode(bytecode: &str, libraries: &BTreeMap<String, Address>) -> String {
    let mut linked = bytecode.to_string();

    for (name, address) in libraries {
        let hex_address = hex::encode(address.as_slice());
        for placeholder in [legacy_placeholder(name), hashed_placeholder(name)] {
            if linked.contains(&placeholder) {
                tracing::trace!(library = %name, %address, "Linking library");
                linked = linked.replace(&placeholder, &hex_address);
            }
        }
    }

    linked
}

/// Collect the addresses of the well-known libraries already resolved in this run.
///
/// Each library is registered under its bare name and under `<source>.sol:<name>`.
pub fn known_library_addresses(
    source: &str,
    lookup: impl Fn(&str) -> Option<Address>,
) -> BTreeMap<String, Address> {
    let mut libraries = BTreeMap::new();

    for library in LINKABLE_LIBRARIES {
        if let Some(address) = lookup(library) {
            libraries.insert(library.to_string(), address);
            libraries.insert(format!("{source}.sol:{library}"), address);
        }
    }

    libraries
}

/// Link every well-known library resolved by `lookup` into `bytecode`.
pub fn link_known_libraries(
    bytecode: &str,
    source: &str,
    lookup: impl Fn(&str) -> Option<Address>,
) -> String {
    link_bytecode(bytecode, &known_library_addresses(source, lookup))
}

fn legacy_placeholder(name: &str) -> String {
    let truncated: String = name.chars().take(36).collect();
    format!("__{:_<36}__", truncated)
}

fn hashed_placeholder(name: &str) -> String {
    let hash = hex::encode(keccak256(name.as_bytes()));
    format!("__${}$__", &hash[..34])
}
