// ============================================================================
// Colour parsing and the quick palette
// ============================================================================

/// Swatches offered next to the colour input.
pub const PALETTE: [[u8; 3]; 8] = [
    [0xFF, 0x00, 0x00],
    [0x00, 0xFF, 0x00],
    [0x00, 0x00, 0xFF],
    [0xFF, 0xFF, 0x00],
    [0xFF, 0x00, 0xFF],
    [0x00, 0xFF, 0xFF],
    [0x00, 0x00, 0x00],
    [0xFF, 0xFF, 0xFF],
];

/// Parse `#RRGGBB` (case-insensitive). Anything else is rejected.
pub fn parse_hex(s: &str) -> Option<[u8; 3]> {
    let hex = s.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let val = u32::from_str_radix(hex, 16).ok()?;
    Some([(val >> 16) as u8, (val >> 8) as u8, val as u8])
}

/// Upper-case `#RRGGBB`.
pub fn format_hex(rgb: [u8; 3]) -> String {
    format!("#{:02X}{:02X}{:02X}", rgb[0], rgb[1], rgb[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing() {
        assert_eq!(parse_hex("#ff8800"), Some([255, 136, 0]));
        assert_eq!(parse_hex("#FF8800"), Some([255, 136, 0]));
        assert_eq!(parse_hex("ff8800"), None);
        assert_eq!(parse_hex("#fff"), None);
        assert_eq!(parse_hex("#gg0000"), None);
        assert_eq!(parse_hex("#+f0000"), None);
    }

    #[test]
    fn palette_formats_back() {
        assert_eq!(format_hex(PALETTE[0]), "#FF0000");
        assert_eq!(parse_hex(&format_hex(PALETTE[7])), Some(PALETTE[7]));
    }
}
