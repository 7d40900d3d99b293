pub mod plate_plots;
pub mod well_plots;

use plotters::style::RGBColor;

/// Parse `#rrggbb` (or `rrggbb`) into a plotters colour; anything else is mid grey.
pub fn hex_color(hex: &str) -> RGBColor {
    let digits = hex.trim().trim_start_matches('#');
    let channel = |i: usize| digits.get(i..i + 2).and_then(|s| u8::from_str_radix(s, 16).ok());
    match (digits.len(), channel(0), channel(2), channel(4)) {
        (6, Some(r), Some(g), Some(b)) => RGBColor(r, g, b),
        _ => RGBColor(128, 128, 128),
    }
}

/// Evenly spaced grid positions from `min` to `max` inclusive
pub fn grid_ticks(min: f64, max: f64, interval: f64) -> Vec<f64> {
    if interval <= 0.0 || max < min {
        return Vec::new();
    }
    let steps = ((max - min) / interval + 1e-9).floor() as usize;
    (0..=steps).map(|i| min + i as f64 * interval).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colours() {
        assert_eq!(hex_color("#E6B8E6"), RGBColor(0xE6, 0xB8, 0xE6));
        assert_eq!(hex_color("b0b0b0"), RGBColor(0xB0, 0xB0, 0xB0));
        assert_eq!(hex_color("#zzz"), RGBColor(128, 128, 128));
    }

    #[test]
    fn ticks_cover_axis_range() {
        assert_eq!(grid_ticks(0.0, 3000.0, 500.0).len(), 7);
        assert_eq!(grid_ticks(0.0, 5000.0, 1000.0), vec![0.0, 1000.0, 2000.0, 3000.0, 4000.0, 5000.0]);
        assert!(grid_ticks(0.0, 10.0, 0.0).is_empty());
    }
}
