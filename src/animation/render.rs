//! Eye rasterization.

use embedded_graphics::pixelcolor::raw::RawU16;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Circle, PrimitiveStyle, Rectangle};

use crate::eyemodelz::{
    adjust_lightness_rgb565, blend_rgb565, FACTOR_BRIGHTEN_20, FACTOR_DARKEN_30,
};
use crate::framebuffer::{raw, FrameBuffer};
use crate::{EYE_DISPLAY_HEIGHT, EYE_DISPLAY_WIDTH};

/// Everything needed to draw one eye.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyePose {
    /// Pupil offset as a fraction of full travel, x east, y south
    pub offset: (f32, f32),
    /// 0.0 lids shut .. 1.0 wide open
    pub openness: f32,
    pub iris_percent: u32,
    pub pupil_percent: u32,
}

impl EyePose {
    pub const fn open() -> Self {
        Self {
            offset: (0.0, 0.0),
            openness: 1.0,
            iris_percent: 100,
            pupil_percent: 100,
        }
    }
}

pub const LID_COLOR: Rgb565 = Rgb565::new(3, 6, 4);
pub const SCLERA_COLOR: Rgb565 = Rgb565::new(29, 60, 28);
pub const IRIS_COLOR: Rgb565 = Rgb565::new(4, 38, 22);
pub const PUPIL_COLOR: Rgb565 = Rgb565::BLACK;
pub const HIGHLIGHT_COLOR: Rgb565 = Rgb565::WHITE;

const CENTER: Point = Point::new(EYE_DISPLAY_WIDTH as i32 / 2, EYE_DISPLAY_HEIGHT as i32 / 2);
const SCLERA_DIAMETER: u32 = 116;
const IRIS_DIAMETER: u32 = 56;
/// Width of the darker outer iris ring
const IRIS_RING: u32 = 6;
const PUPIL_DIAMETER: u32 = 24;
const HIGHLIGHT_DIAMETER: u32 = 7;
const HIGHLIGHT_OFFSET: Point = Point::new(-5, -5);
/// Half height of the visible band with the lids fully open
const LID_SPAN: f32 = 62.0;

fn scaled(diameter: u32, percent: u32) -> u32 {
    (diameter * percent / 100).max(2)
}

/// Pixel offset of the iris center for a unit offset: the iris may travel
/// until it touches the sclera edge.
fn travel(pose: &EyePose) -> Point {
    let iris = scaled(IRIS_DIAMETER, pose.iris_percent);
    let max = (SCLERA_DIAMETER.saturating_sub(iris) / 2).saturating_sub(2) as f32;
    Point::new(
        libm::roundf(pose.offset.0.clamp(-1.0, 1.0) * max) as i32,
        libm::roundf(pose.offset.1.clamp(-1.0, 1.0) * max) as i32,
    )
}

/// Draw one eye into `fb`, covering every pixel.
pub fn render_eye(fb: &mut FrameBuffer, pose: &EyePose) {
    let fill = |color: Rgb565| PrimitiveStyle::with_fill(color);
    fb.fill_raw(raw(LID_COLOR));

    let _ = Circle::with_center(CENTER, SCLERA_DIAMETER)
        .into_styled(fill(SCLERA_COLOR))
        .draw(fb);

    let iris_center = CENTER + travel(pose);
    let iris = scaled(IRIS_DIAMETER, pose.iris_percent);
    let _ = Circle::with_center(iris_center, iris)
        .into_styled(fill(adjust_lightness_rgb565(IRIS_COLOR, FACTOR_DARKEN_30)))
        .draw(fb);
    let _ = Circle::with_center(iris_center, iris.saturating_sub(IRIS_RING).max(2))
        .into_styled(fill(IRIS_COLOR))
        .draw(fb);

    let pupil = scaled(PUPIL_DIAMETER, pose.pupil_percent);
    // a lighter halo where the pupil meets the iris
    let _ = Circle::with_center(iris_center, pupil + 4)
        .into_styled(fill(adjust_lightness_rgb565(IRIS_COLOR, FACTOR_BRIGHTEN_20)))
        .draw(fb);
    let _ = Circle::with_center(iris_center, pupil)
        .into_styled(fill(PUPIL_COLOR))
        .draw(fb);
    let _ = Circle::with_center(iris_center + HIGHLIGHT_OFFSET, HIGHLIGHT_DIAMETER)
        .into_styled(fill(HIGHLIGHT_COLOR))
        .draw(fb);

    draw_lids(fb, pose.openness);
}

fn draw_lids(fb: &mut FrameBuffer, openness: f32) {
    let half = libm::roundf(openness.clamp(0.0, 1.0) * LID_SPAN) as i32;
    let top = (CENTER.y - half).max(0);
    let bottom = (CENTER.y + half).min(EYE_DISPLAY_HEIGHT as i32);
    let width = EYE_DISPLAY_WIDTH as u32;
    let style = PrimitiveStyle::with_fill(LID_COLOR);

    if top > 0 {
        let _ = Rectangle::new(Point::zero(), Size::new(width, top as u32))
            .into_styled(style)
            .draw(fb);
    }
    if bottom < EYE_DISPLAY_HEIGHT as i32 {
        let _ = Rectangle::new(
            Point::new(0, bottom),
            Size::new(width, (EYE_DISPLAY_HEIGHT as i32 - bottom) as u32),
        )
        .into_styled(style)
        .draw(fb);
    }
}

/// Soften hard color edges: a pixel that differs from any of its four
/// neighbours is mixed with their average. Works in place with two row
/// buffers holding the unmodified rows above and at the current line.
pub fn smooth_edges(fb: &mut FrameBuffer) {
    let mut above = [0u16; EYE_DISPLAY_WIDTH];
    let mut current = [0u16; EYE_DISPLAY_WIDTH];
    let color = |v: u16| Rgb565::from(RawU16::new(v));

    for y in 0..EYE_DISPLAY_HEIGHT {
        current.copy_from_slice(fb.row(y));
        for x in 0..EYE_DISPLAY_WIDTH {
            let c = current[x];
            let left = current[x.saturating_sub(1)];
            let right = current[(x + 1).min(EYE_DISPLAY_WIDTH - 1)];
            let up = if y > 0 { above[x] } else { c };
            // rows below are still untouched
            let down = if y + 1 < EYE_DISPLAY_HEIGHT {
                fb.row(y + 1)[x]
            } else {
                c
            };
            if left == c && right == c && up == c && down == c {
                continue;
            }
            let horizontal = blend_rgb565(color(left), color(right), 128);
            let vertical = blend_rgb565(color(up), color(down), 128);
            let around = blend_rgb565(horizontal, vertical, 128);
            fb.row_mut(y)[x] = raw(blend_rgb565(color(c), around, 96));
        }
        core::mem::swap(&mut above, &mut current);
    }
}
