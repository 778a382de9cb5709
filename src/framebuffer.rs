//! Fixed size RGB565 frame buffers.

use core::convert::Infallible;

use embedded_graphics::pixelcolor::raw::RawU16;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

use crate::{EYE_DISPLAY_HEIGHT, EYE_DISPLAY_WIDTH, FRAME_PIXELS};

/// One eye / panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    pub fn index(&self) -> usize {
        match self {
            Eye::Left => 0,
            Eye::Right => 1,
        }
    }
}

/// Which eyes an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EyeSelect {
    Left,
    Right,
    Both,
}

impl EyeSelect {
    pub fn contains(&self, eye: Eye) -> bool {
        match self {
            EyeSelect::Both => true,
            EyeSelect::Left => eye == Eye::Left,
            EyeSelect::Right => eye == Eye::Right,
        }
    }
}

impl From<Eye> for EyeSelect {
    fn from(eye: Eye) -> Self {
        match eye {
            Eye::Left => EyeSelect::Left,
            Eye::Right => EyeSelect::Right,
        }
    }
}

/// Raw RGB565 value of a color, as the panel expects it (before byte swapping).
pub fn raw(color: Rgb565) -> u16 {
    color.into_storage()
}

/// Vertical test bars, left to right.
pub const COLOR_BARS: [Rgb565; 8] = [
    Rgb565::WHITE,
    Rgb565::YELLOW,
    Rgb565::CYAN,
    Rgb565::GREEN,
    Rgb565::MAGENTA,
    Rgb565::RED,
    Rgb565::BLUE,
    Rgb565::BLACK,
];

/// A full panel of raw RGB565 pixels, row major.
#[derive(Clone)]
pub struct FrameBuffer {
    pixels: [u16; FRAME_PIXELS],
}

impl FrameBuffer {
    pub const fn new() -> Self {
        Self {
            pixels: [0; FRAME_PIXELS],
        }
    }

    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    pub fn fill_raw(&mut self, raw: u16) {
        self.pixels.fill(raw);
    }

    /// Copy a caller supplied frame. `src` must hold exactly one frame.
    pub fn copy_from(&mut self, src: &[u16]) {
        self.pixels.copy_from_slice(src);
    }

    /// Fill with [`COLOR_BARS`], equal width bands across the panel.
    pub fn draw_color_bars(&mut self) {
        let mut row = [0u16; EYE_DISPLAY_WIDTH];
        for (x, pixel) in row.iter_mut().enumerate() {
            *pixel = raw(COLOR_BARS[x * COLOR_BARS.len() / EYE_DISPLAY_WIDTH]);
        }
        for y in 0..EYE_DISPLAY_HEIGHT {
            self.row_mut(y).copy_from_slice(&row);
        }
    }

    pub fn row(&self, y: usize) -> &[u16] {
        &self.pixels[y * EYE_DISPLAY_WIDTH..(y + 1) * EYE_DISPLAY_WIDTH]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u16] {
        &mut self.pixels[y * EYE_DISPLAY_WIDTH..(y + 1) * EYE_DISPLAY_WIDTH]
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb565> {
        if x >= EYE_DISPLAY_WIDTH || y >= EYE_DISPLAY_HEIGHT {
            return None;
        }
        Some(Rgb565::from(RawU16::new(self.pixels[y * EYE_DISPLAY_WIDTH + x])))
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(EYE_DISPLAY_WIDTH as u32, EYE_DISPLAY_HEIGHT as u32)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if let (Ok(x), Ok(y)) = (usize::try_from(point.x), usize::try_from(point.y)) {
                if x < EYE_DISPLAY_WIDTH && y < EYE_DISPLAY_HEIGHT {
                    self.pixels[y * EYE_DISPLAY_WIDTH + x] = raw(color);
                }
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = area.intersection(&self.bounding_box());
        let Some(bottom_right) = area.bottom_right() else {
            return Ok(());
        };
        let value = raw(color);
        let (x0, x1) = (area.top_left.x as usize, bottom_right.x as usize);
        for y in area.top_left.y as usize..=bottom_right.y as usize {
            self.row_mut(y)[x0..=x1].fill(value);
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill_raw(raw(color));
        Ok(())
    }
}

/// Backing storage for every frame the engine needs: the animation's
/// working frame plus three pipeline slots (two committed, one in flight).
///
/// Lives in a `static` on hardware so it lands in .bss rather than on the
/// stack.
pub struct FrameStore {
    pub(crate) working: FrameBuffer,
    pub(crate) slots: [FrameBuffer; 3],
}

impl FrameStore {
    pub const fn new() -> Self {
        Self {
            working: FrameBuffer::new(),
            slots: [FrameBuffer::new(), FrameBuffer::new(), FrameBuffer::new()],
        }
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{Circle, PrimitiveStyle};

    #[test]
    fn draw_clips_to_panel() {
        let mut fb = FrameBuffer::new();
        Circle::new(Point::new(-20, -20), 60)
            .into_styled(PrimitiveStyle::with_fill(Rgb565::RED))
            .draw(&mut fb)
            .unwrap();
        assert_eq!(fb.pixel(0, 0), Some(Rgb565::RED));
        assert_eq!(fb.pixel(127, 127), Some(Rgb565::BLACK));
        assert_eq!(fb.pixel(128, 0), None);
    }

    #[test]
    fn fill_solid_handles_partial_overlap() {
        let mut fb = FrameBuffer::new();
        fb.fill_solid(
            &Rectangle::new(Point::new(120, 120), Size::new(20, 20)),
            Rgb565::GREEN,
        )
        .unwrap();
        assert_eq!(fb.pixel(127, 127), Some(Rgb565::GREEN));
        assert_eq!(fb.pixel(119, 127), Some(Rgb565::BLACK));

        // fully outside
        fb.fill_solid(
            &Rectangle::new(Point::new(200, 0), Size::new(5, 5)),
            Rgb565::BLUE,
        )
        .unwrap();
        assert!(fb.pixels().iter().all(|&p| p != raw(Rgb565::BLUE)));
    }

    #[test]
    fn color_bars_split_the_panel_evenly() {
        let mut fb = FrameBuffer::new();
        fb.draw_color_bars();
        let band = EYE_DISPLAY_WIDTH / COLOR_BARS.len();
        for (i, color) in COLOR_BARS.iter().enumerate() {
            let first = i * band;
            let last = first + band - 1;
            assert_eq!(fb.pixel(first, 0), Some(*color));
            assert_eq!(fb.pixel(last, EYE_DISPLAY_HEIGHT - 1), Some(*color));
        }
        assert_eq!(fb.row(0), fb.row(EYE_DISPLAY_HEIGHT / 2));
    }

    #[test]
    fn eye_select_membership() {
        assert!(EyeSelect::Both.contains(Eye::Right));
        assert!(EyeSelect::Left.contains(Eye::Left));
        assert!(!EyeSelect::Left.contains(Eye::Right));
        assert_eq!(EyeSelect::from(Eye::Right), EyeSelect::Right);
    }
}
