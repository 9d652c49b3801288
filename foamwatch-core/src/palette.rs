#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const PALETTE: [Rgb; 10] = [
    Rgb(31, 119, 180),
    Rgb(255, 127, 14),
    Rgb(44, 160, 44),
    Rgb(214, 39, 40),
    Rgb(148, 103, 189),
    Rgb(140, 86, 75),
    Rgb(227, 119, 194),
    Rgb(127, 127, 127),
    Rgb(188, 189, 34),
    Rgb(23, 190, 207),
];

/// Diagnostic series colour, outside the cyclic palette.
pub const DIAGNOSTIC_COLOR: Rgb = Rgb(20, 20, 20);

/// Colour for the `idx`-th discovered variable. Wraps around the palette.
pub fn palette_color(idx: usize) -> Rgb {
    PALETTE[idx % PALETTE.len()]
}
