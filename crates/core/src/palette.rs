// Reference file highlight palette, assigned round-robin.

pub const REFERENCE_PALETTE: [u32; 8] = [
    0x4E79A7, // blue
    0xF28E2B, // orange
    0x59A14F, // green
    0xB07AA1, // purple
    0xEDC948, // yellow
    0x76B7B2, // teal
    0xFF9DA7, // pink
    0x9C755F, // brown
];

/// Hex color (0xRRGGBB) for a palette slot; slots wrap around.
pub fn color_for_slot(slot: usize) -> u32 {
    REFERENCE_PALETTE[slot % REFERENCE_PALETTE.len()]
}
