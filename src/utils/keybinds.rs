//! Key name to hardware scan code mapping
//!
//! The game reads raw keyboard input, so every binding is stored and injected
//! as a set-1 scan code rather than a virtual key or character.

use std::collections::HashMap;

use once_cell::sync::Lazy;

pub const SC_ESC: u16 = 0x01;
pub const SC_ENTER: u16 = 0x1C;
pub const SC_SLASH: u16 = 0x35;
pub const SC_SPACE: u16 = 0x39;
pub const SC_F10: u16 = 0x44;

/// Key names and their scan codes
static SCAN_CODES: Lazy<HashMap<&'static str, u16>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("ESC", SC_ESC);
    for (i, name) in ["1", "2", "3", "4", "5", "6", "7", "8", "9", "0", "-", "="]
        .iter()
        .enumerate()
    {
        m.insert(*name, 0x02 + i as u16);
    }
    m.insert("BACKSPACE", 0x0E);
    m.insert("TAB", 0x0F);
    for (i, name) in ["Q", "W", "E", "R", "T", "Y", "U", "I", "O", "P"].iter().enumerate() {
        m.insert(*name, 0x10 + i as u16);
    }
    m.insert("ENTER", SC_ENTER);
    m.insert("CTRL", 0x1D);
    for (i, name) in ["A", "S", "D", "F", "G", "H", "J", "K", "L"].iter().enumerate() {
        m.insert(*name, 0x1E + i as u16);
    }
    m.insert("SHIFT", 0x2A);
    for (i, name) in ["Z", "X", "C", "V", "B", "N", "M"].iter().enumerate() {
        m.insert(*name, 0x2C + i as u16);
    }
    m.insert(",", 0x33);
    m.insert(".", 0x34);
    m.insert("/", SC_SLASH);
    m.insert("ALT", 0x38);
    m.insert("SPACE", SC_SPACE);
    m.insert("CAPSLOCK", 0x3A);
    for (i, name) in ["F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10"]
        .iter()
        .enumerate()
    {
        m.insert(*name, 0x3B + i as u16);
    }
    m.insert("F11", 0x57);
    m.insert("F12", 0x58);
    m
});

/// Resolve a key name such as `"F10"`, `"space"` or `"l"` to its scan code
pub fn scan_code(name: &str) -> Option<u16> {
    let upper = name.trim().to_uppercase();
    let key = match upper.as_str() {
        "ESCAPE" => "ESC",
        "RETURN" => "ENTER",
        "CONTROL" => "CTRL",
        other => other,
    };
    SCAN_CODES.get(key).copied()
}

/// Human readable name for a scan code, or its hex value when unknown
pub fn key_name(code: u16) -> String {
    SCAN_CODES
        .iter()
        .find(|(_, c)| **c == code)
        .map(|(name, _)| name.to_string())
        .unwrap_or_else(|| format!("0x{:02X}", code))
}

/// Scan codes needed to type `text`; characters without a binding are skipped
pub fn scan_codes_for(text: &str) -> Vec<u16> {
    text.chars()
        .filter_map(|c| scan_code(&c.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_code() {
        assert_eq!(scan_code("ESC"), Some(0x01));
        assert_eq!(scan_code("escape"), Some(0x01));
        assert_eq!(scan_code("space"), Some(0x39));
        assert_eq!(scan_code("F10"), Some(0x44));
        assert_eq!(scan_code("F12"), Some(0x58));
        assert_eq!(scan_code("l"), Some(0x26));
        assert_eq!(scan_code("NOT_A_KEY"), None);
    }

    #[test]
    fn test_key_name() {
        assert_eq!(key_name(0x44), "F10");
        assert_eq!(key_name(0x1C), "ENTER");
        assert_eq!(key_name(0xEE), "0xEE");
    }

    #[test]
    fn test_scan_codes_for_logout() {
        assert_eq!(
            scan_codes_for("/logout"),
            vec![0x35, 0x26, 0x18, 0x22, 0x18, 0x16, 0x14]
        );
    }
}
