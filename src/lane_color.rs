pub const DEFAULT_LANE_PALETTE: [&str; 7] = [
    "#4f9cf9", "#f97583", "#56d364", "#e3b341", "#bc8cff", "#39c5cf", "#ff9b54",
];

/// Colour for a lane. Wraps around the palette; an empty palette uses the default one.
pub fn lane_color<S: AsRef<str>>(lane: usize, palette: &[S]) -> &str {
    if palette.is_empty() {
        return DEFAULT_LANE_PALETTE[lane % DEFAULT_LANE_PALETTE.len()];
    }
    palette[lane % palette.len()].as_ref()
}

pub fn default_palette() -> Vec<String> {
    DEFAULT_LANE_PALETTE
        .iter()
        .map(|color| (*color).to_string())
        .collect()
}
