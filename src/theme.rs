// Hex strings as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub window_background: &'static str,
    pub surface_background: &'static str,
    pub field_background: &'static str,
    pub foreground: &'static str,
    pub heading_background: &'static str,
}

impl Palette {
    pub const LIGHT: Palette = Palette {
        window_background: "#f0f0f0",
        surface_background: "#f0f0f0",
        field_background: "#FFFFFF",
        foreground: "#000000",
        heading_background: "#f0f0f0",
    };

    pub const DARK: Palette = Palette {
        window_background: "#333333",
        surface_background: "#333333",
        field_background: "#555555",
        foreground: "#FFFFFF",
        heading_background: "#333333",
    };

    pub fn for_mode(dark_mode: bool) -> &'static Palette {
        if dark_mode {
            &Self::DARK
        } else {
            &Self::LIGHT
        }
    }
}

pub fn rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(digits.get(range)?, 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

pub trait Themeable {
    fn apply_palette(&mut self, palette: &Palette);

    fn children_mut(&mut self) -> Vec<&mut dyn Themeable> {
        Vec::new()
    }
}

pub fn apply_theme(dark_mode: bool, elements: &mut [&mut dyn Themeable]) -> usize {
    let palette = Palette::for_mode(dark_mode);
    let mut applied = 0usize;
    for element in elements.iter_mut() {
        applied += apply_recursive(&mut **element, palette);
    }
    tracing::debug!(dark_mode, applied, "applied theme");
    applied
}

fn apply_recursive(element: &mut dyn Themeable, palette: &Palette) -> usize {
    element.apply_palette(palette);
    let mut applied = 1usize;
    for child in element.children_mut() {
        applied += apply_recursive(child, palette);
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Label {
        background: Option<&'static str>,
    }

    impl Themeable for Label {
        fn apply_palette(&mut self, palette: &Palette) {
            self.background = Some(palette.surface_background);
        }
    }

    #[derive(Default)]
    struct Frame {
        background: Option<&'static str>,
        labels: Vec<Label>,
    }

    impl Themeable for Frame {
        fn apply_palette(&mut self, palette: &Palette) {
            self.background = Some(palette.window_background);
        }

        fn children_mut(&mut self) -> Vec<&mut dyn Themeable> {
            self.labels.iter_mut().map(|label| label as &mut dyn Themeable).collect()
        }
    }

    #[test]
    fn applies_palette_to_nested_elements() {
        let mut frame = Frame {
            labels: vec![Label::default(), Label::default()],
            ..Frame::default()
        };
        let mut standalone = Label::default();

        let applied = apply_theme(true, &mut [&mut frame, &mut standalone]);
        assert_eq!(applied, 4);
        assert_eq!(frame.background, Some("#333333"));
        assert!(frame.labels.iter().all(|label| label.background == Some("#333333")));

        apply_theme(false, &mut [&mut frame]);
        assert_eq!(frame.background, Some("#f0f0f0"));
    }

    #[test]
    fn parses_hex_colours() {
        assert_eq!(rgb("#FFFFFF"), Some((255, 255, 255)));
        assert_eq!(rgb("#333333"), Some((0x33, 0x33, 0x33)));
        assert_eq!(rgb("333333"), None);
        assert_eq!(rgb("#12345"), None);
    }
}
