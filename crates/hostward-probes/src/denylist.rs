//! The signature denylist shipped with hostward.

use hostward_core::{Denylist, Result};

/// Raw embedded document.
pub const EMBEDDED_JSON: &str = include_str!("../data/signatures.json");

/// Parse and validate the embedded denylist.
pub fn embedded() -> Result<Denylist> {
    Denylist::from_json(EMBEDDED_JSON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tooling::PACKAGE_CLASS;
    use hostward_core::hash::sha256_bytes;

    #[test]
    fn embedded_list_is_valid() {
        let list = embedded().unwrap();
        assert!(!list.version().is_empty());
        assert!(list.in_category(PACKAGE_CLASS).count() > 10);
        assert_eq!(list.digest(), sha256_bytes(EMBEDDED_JSON.as_bytes()));
    }

    #[test]
    fn common_root_managers_are_listed() {
        let list = embedded().unwrap();
        for id in ["com.topjohnwu.magisk", "eu.chainfire.supersu", "frida-server"] {
            assert!(list.entries().iter().any(|e| e.identifier == id), "{id} missing");
        }
    }
}
