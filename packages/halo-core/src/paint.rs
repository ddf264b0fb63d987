use crate::geometry::{Affine2, Rect, Vec2};
use image::{Rgba, RgbaImage};
use smallvec::SmallVec;

pub type Color = Rgba<u8>;

/// Software frame buffer the whole window is rendered into.
pub type FrameBuffer = RgbaImage;

/// Immediate-mode drawing context over a frame buffer with a transform stack.
pub struct Painter<'a> {
    frame: &'a mut FrameBuffer,
    stack: SmallVec<[Affine2; 8]>,
    current: Affine2,
    pub(crate) painted: u64,
    pub(crate) culled: u64,
}

impl<'a> Painter<'a> {
    pub fn new(frame: &'a mut FrameBuffer) -> Self {
        Self {
            frame,
            stack: SmallVec::new(),
            current: Affine2::IDENTITY,
            painted: 0,
            culled: 0,
        }
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.frame.width() as f32, self.frame.height() as f32)
    }

    /// Current local-to-device transform.
    pub fn transform(&self) -> Affine2 {
        self.current
    }

    pub fn push(&mut self, m: Affine2) {
        self.stack.push(self.current);
        self.current = self.current * m;
    }

    pub fn pop(&mut self) {
        self.current = self.stack.pop().unwrap_or(Affine2::IDENTITY);
    }

    pub fn clear(&mut self, color: Color) {
        for px in self.frame.pixels_mut() {
            *px = color;
        }
    }

    /// Fills `rect` (local coordinates) by sampling pixel centers through the
    /// inverse transform, so rotated rectangles rasterize correctly.
    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        if rect.is_empty() || color[3] == 0 {
            return;
        }
        let device = rect.transformed_bounds(&self.current);
        let Some(device) = device.intersection(&Rect::from_size(self.size())) else {
            return;
        };
        let inverse = self.current.inverse();
        let (x0, y0) = (device.min().x.floor() as u32, device.min().y.floor() as u32);
        let (x1, y1) = (
            (device.max().x.ceil() as u32).min(self.frame.width()),
            (device.max().y.ceil() as u32).min(self.frame.height()),
        );

        for y in y0..y1 {
            for x in x0..x1 {
                let center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                if rect.contains(inverse.transform_point2(center)) {
                    blend(self.frame.get_pixel_mut(x, y), color);
                }
            }
        }
    }

    pub fn stroke_rect(&mut self, rect: Rect, width: f32, color: Color) {
        let (min, size) = (rect.min(), rect.size);
        let w = width.min(size.x / 2.0).min(size.y / 2.0);
        self.fill_rect(Rect::new(min, Vec2::new(size.x, w)), color);
        self.fill_rect(
            Rect::new(Vec2::new(min.x, min.y + size.y - w), Vec2::new(size.x, w)),
            color,
        );
        self.fill_rect(
            Rect::new(Vec2::new(min.x, min.y + w), Vec2::new(w, size.y - 2.0 * w)),
            color,
        );
        self.fill_rect(
            Rect::new(
                Vec2::new(min.x + size.x - w, min.y + w),
                Vec2::new(w, size.y - 2.0 * w),
            ),
            color,
        );
    }
}

fn blend(dst: &mut Color, src: Color) {
    let a = src[3] as u32;
    if a == 255 {
        *dst = src;
        return;
    }
    for i in 0..3 {
        dst[i] = ((src[i] as u32 * a + dst[i] as u32 * (255 - a)) / 255) as u8;
    }
    dst[3] = (a + dst[3] as u32 * (255 - a) / 255) as u8;
}
