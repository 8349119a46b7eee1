//! Bitmap renderer for monochrome displays
//!
//! Draws the clock's visual tree onto any `embedded-graphics` target with
//! `BinaryColor` pixels, such as an e-ink panel driver, the mock display in
//! tests, or the in-memory [`MonoFrame`] used by `--bitmap` previews.
//!
//! The built-in mono fonts are ASCII only, so chip icons are drawn as small
//! circles instead of glyphs: filled for the sun, outlined for the moon.

use crate::renderer::{time_line, Node};
use embedded_graphics::{
    mono_font::{
        ascii::{FONT_10X20, FONT_6X10},
        MonoTextStyle,
    },
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Circle, PrimitiveStyle, Rectangle, RoundedRectangle},
    text::{Baseline, Text},
};

const MARGIN: i32 = 8;
const ROW_HEIGHT: i32 = 14;
const ICON_DIAMETER: u32 = 8;
const SMALL_CHAR_WIDTH: i32 = 6;

/// Draw the clock card onto `display`.
pub fn draw_eink<D>(tree: &Node, display: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let bounds = display.bounding_box();
    let large = MonoTextStyle::new(&FONT_10X20, BinaryColor::On);
    let small = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);

    // Card outline
    let card = Rectangle::new(
        bounds.top_left,
        Size::new(
            bounds.size.width.saturating_sub(1),
            bounds.size.height.saturating_sub(1),
        ),
    );
    RoundedRectangle::with_equal_corners(card, Size::new(6, 6))
        .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
        .draw(display)?;

    let mut y = bounds.top_left.y + MARGIN - 2;
    let x = bounds.top_left.x + MARGIN;

    if let Some(row) = tree.find_by_class("glass-clock-time") {
        Text::with_baseline(&time_line(row), Point::new(x, y), large, Baseline::Top)
            .draw(display)?;
        y += 24;
    }

    if let Some(date) = tree.find_by_class("glass-clock-date") {
        Text::with_baseline(&date.text, Point::new(x, y), small, Baseline::Top).draw(display)?;
        y += ROW_HEIGHT + 2;
    }

    if let Some(meta) = tree.find_by_class("glass-clock-meta") {
        for row in &meta.children {
            let mut chip_x = x;
            for chip in &row.children {
                chip_x = draw_chip(chip, Point::new(chip_x, y), small, display)?;
                chip_x += 12;
            }
            y += ROW_HEIGHT;
        }
    }

    Ok(())
}

/// Draw one chip at `origin`, returning the x coordinate just past it.
fn draw_chip<D>(
    chip: &Node,
    origin: Point,
    style: MonoTextStyle<'_, BinaryColor>,
    display: &mut D,
) -> Result<i32, D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let mut x = origin.x;

    if let Some(animation) = chip
        .find_by_class("glass-chip-icon")
        .and_then(|icon| icon.animation.as_deref())
    {
        let icon_style = if animation.starts_with("sun") {
            PrimitiveStyle::with_fill(BinaryColor::On)
        } else {
            PrimitiveStyle::with_stroke(BinaryColor::On, 1)
        };
        Circle::new(Point::new(x, origin.y + 1), ICON_DIAMETER)
            .into_styled(icon_style)
            .draw(display)?;
        x += ICON_DIAMETER as i32 + 3;
    }

    let label = chip
        .find_by_class("glass-chip-label")
        .map(|n| n.text.as_str())
        .unwrap_or_default();
    let value = chip
        .find_by_class("glass-chip-value")
        .map(|n| n.text.as_str())
        .unwrap_or_default();
    let text = format!("{label} {value}");
    Text::with_baseline(&text, Point::new(x, origin.y), style, Baseline::Top).draw(display)?;

    Ok(x + text.chars().count() as i32 * SMALL_CHAR_WIDTH)
}

/// In-memory 1-bit framebuffer.
#[derive(Debug, Clone)]
pub struct MonoFrame {
    width: u32,
    height: u32,
    pixels: Vec<bool>,
}

impl MonoFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![false; (width * height) as usize],
        }
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.pixels[(y * self.width + x) as usize]
    }

    pub fn lit_pixels(&self) -> usize {
        self.pixels.iter().filter(|&&p| p).count()
    }

    /// Terminal preview using half-block characters, two pixel rows per line.
    pub fn to_text(&self) -> Vec<String> {
        (0..self.height)
            .step_by(2)
            .map(|y| {
                (0..self.width)
                    .map(|x| match (self.get(x, y), self.get(x, y + 1)) {
                        (true, true) => '█',
                        (true, false) => '▀',
                        (false, true) => '▄',
                        (false, false) => ' ',
                    })
                    .collect()
            })
            .collect()
    }
}

impl OriginDimensions for MonoFrame {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for MonoFrame {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x < self.width && y < self.height {
                self.pixels[(y * self.width + x) as usize] = color.is_on();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::TimeParts;
    use crate::renderer::{ClockView, MoonRow, Renderer, StaticIcons, SunRow};
    use embedded_graphics::mock_display::MockDisplay;

    fn sample_tree() -> Node {
        let mut renderer = Renderer::new("main", Box::new(StaticIcons::default()));
        renderer
            .render(&ClockView {
                parts: TimeParts {
                    hours: "21".to_string(),
                    minutes: "07".to_string(),
                    seconds: "45".to_string(),
                    period: String::new(),
                },
                show_time: true,
                date: Some("Monday, March 4".to_string()),
                sun: Some(SunRow::Times {
                    sunrise: "06:41".to_string(),
                    sunset: "18:02".to_string(),
                }),
                moon: Some(MoonRow::AlwaysDown),
            })
            .clone()
    }

    #[test]
    fn test_eink_rendering() {
        let mut display = MockDisplay::<BinaryColor>::new();
        display.set_allow_out_of_bounds_drawing(true);
        display.set_allow_overdraw(true);

        draw_eink(&sample_tree(), &mut display).unwrap();

        let area = display.affected_area();
        assert!(area.size.width > 0 && area.size.height > 0, "nothing drawn");
    }

    #[test]
    fn test_frame_rendering() {
        let mut frame = MonoFrame::new(240, 80);
        draw_eink(&sample_tree(), &mut frame).unwrap();

        assert!(frame.lit_pixels() > 200);
        // The time text sits in the top-left of the card
        let time_area = (MARGIN as u32..MARGIN as u32 + 80)
            .flat_map(|x| (6..26).map(move |y| (x, y)))
            .filter(|&(x, y)| frame.get(x, y))
            .count();
        assert!(time_area > 50);
    }

    #[test]
    fn test_frame_text_preview() {
        let mut frame = MonoFrame::new(40, 10);
        Rectangle::new(Point::new(0, 0), Size::new(40, 1))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut frame)
            .unwrap();

        let text = frame.to_text();
        assert_eq!(text.len(), 5);
        assert_eq!(text[0], "▀".repeat(40));
        assert_eq!(text[1], " ".repeat(40));
    }

    #[test]
    fn test_frame_ignores_out_of_bounds() {
        let mut frame = MonoFrame::new(4, 4);
        frame
            .draw_iter([
                Pixel(Point::new(-1, 0), BinaryColor::On),
                Pixel(Point::new(9, 9), BinaryColor::On),
            ])
            .unwrap();
        assert_eq!(frame.lit_pixels(), 0);
    }
}
