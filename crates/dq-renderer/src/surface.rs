//! Drawing surface contract
//!
//! A [`Surface`] is the canvas-like backend the [`RenderHandler`] emits to.
//! It owns the active style properties and one current path. Coordinates
//! passed to path and rect methods are in user space; the handler sets the
//! user-to-device transform through [`Surface::set_transform`].
//!
//! [`RenderHandler`]: crate::handler::RenderHandler

use dq_core::{StyleKey, Value};
use glam::{DAffine2, DVec2};

use crate::image::Image;

/// Canvas-like drawing backend
pub trait Surface {
    /// Device size in pixels
    fn size(&self) -> DVec2;

    /// Active value of a style property
    fn style(&self, key: StyleKey) -> Value;

    /// Set a style property
    fn set_style(&mut self, key: StyleKey, value: &Value);

    /// Replace the user-to-device transform
    fn set_transform(&mut self, transform: DAffine2);

    /// Start a new, empty path
    fn begin_path(&mut self);

    /// Start a subpath at `p`
    fn move_to(&mut self, p: DVec2);

    /// Straight segment to `p`
    fn line_to(&mut self, p: DVec2);

    /// Quadratic Bézier to `p` with control point `c`
    fn quad_to(&mut self, c: DVec2, p: DVec2);

    /// Cubic Bézier to `p` with control points `c1`, `c2`
    fn cubic_to(&mut self, c1: DVec2, c2: DVec2, p: DVec2);

    /// Circular arc around `center` from angle `start` to `end`
    fn arc(&mut self, center: DVec2, r: f64, start: f64, end: f64, ccw: bool);

    /// Elliptic arc around `center`, axes rotated by `rot`
    #[allow(clippy::too_many_arguments)]
    fn ellipse(
        &mut self,
        center: DVec2,
        rx: f64,
        ry: f64,
        rot: f64,
        start: f64,
        end: f64,
        ccw: bool,
    );

    /// Close the current subpath
    fn close_path(&mut self);

    /// Replace the current path with SVG path data
    fn path_data(&mut self, d: &str);

    /// Fill the current path
    fn fill(&mut self);

    /// Stroke the current path
    fn stroke(&mut self);

    /// Fill an axis-aligned rectangle
    fn fill_rect(&mut self, x: f64, y: f64, b: f64, h: f64);

    /// Stroke an axis-aligned rectangle
    fn stroke_rect(&mut self, x: f64, y: f64, b: f64, h: f64);

    /// Clear an axis-aligned rectangle to transparent
    fn clear_rect(&mut self, x: f64, y: f64, b: f64, h: f64);

    /// Fill `text` anchored at `p`
    fn fill_text(&mut self, text: &str, p: DVec2);

    /// Draw the `src` region `[x, y, b, h]` of `image` into `dst`
    fn draw_image(&mut self, image: &Image, src: [f64; 4], dst: [f64; 4]);
}

impl<S: Surface + ?Sized> Surface for &mut S {
    fn size(&self) -> DVec2 {
        (**self).size()
    }

    fn style(&self, key: StyleKey) -> Value {
        (**self).style(key)
    }

    fn set_style(&mut self, key: StyleKey, value: &Value) {
        (**self).set_style(key, value)
    }

    fn set_transform(&mut self, transform: DAffine2) {
        (**self).set_transform(transform)
    }

    fn begin_path(&mut self) {
        (**self).begin_path()
    }

    fn move_to(&mut self, p: DVec2) {
        (**self).move_to(p)
    }

    fn line_to(&mut self, p: DVec2) {
        (**self).line_to(p)
    }

    fn quad_to(&mut self, c: DVec2, p: DVec2) {
        (**self).quad_to(c, p)
    }

    fn cubic_to(&mut self, c1: DVec2, c2: DVec2, p: DVec2) {
        (**self).cubic_to(c1, c2, p)
    }

    fn arc(&mut self, center: DVec2, r: f64, start: f64, end: f64, ccw: bool) {
        (**self).arc(center, r, start, end, ccw)
    }

    fn ellipse(
        &mut self,
        center: DVec2,
        rx: f64,
        ry: f64,
        rot: f64,
        start: f64,
        end: f64,
        ccw: bool,
    ) {
        (**self).ellipse(center, rx, ry, rot, start, end, ccw)
    }

    fn close_path(&mut self) {
        (**self).close_path()
    }

    fn path_data(&mut self, d: &str) {
        (**self).path_data(d)
    }

    fn fill(&mut self) {
        (**self).fill()
    }

    fn stroke(&mut self) {
        (**self).stroke()
    }

    fn fill_rect(&mut self, x: f64, y: f64, b: f64, h: f64) {
        (**self).fill_rect(x, y, b, h)
    }

    fn stroke_rect(&mut self, x: f64, y: f64, b: f64, h: f64) {
        (**self).stroke_rect(x, y, b, h)
    }

    fn clear_rect(&mut self, x: f64, y: f64, b: f64, h: f64) {
        (**self).clear_rect(x, y, b, h)
    }

    fn fill_text(&mut self, text: &str, p: DVec2) {
        (**self).fill_text(text, p)
    }

    fn draw_image(&mut self, image: &Image, src: [f64; 4], dst: [f64; 4]) {
        (**self).draw_image(image, src, dst)
    }
}

/// Call-recording surface for tests
#[cfg(test)]
pub(crate) mod recording {
    use std::collections::HashMap;

    use super::*;

    /// Logs every call as a short string and counts style writes per key
    #[derive(Debug, Default)]
    pub struct RecordingSurface {
        pub width: f64,
        pub height: f64,
        pub styles: HashMap<StyleKey, Value>,
        pub style_writes: HashMap<StyleKey, usize>,
        pub transform: DAffine2,
        pub calls: Vec<String>,
    }

    impl RecordingSurface {
        pub fn new(width: f64, height: f64) -> Self {
            Self {
                width,
                height,
                ..Default::default()
            }
        }

        pub fn writes(&self, key: StyleKey) -> usize {
            self.style_writes.get(&key).copied().unwrap_or(0)
        }

        /// Calls whose name starts with `prefix`
        pub fn calls_named(&self, prefix: &str) -> Vec<&str> {
            self.calls
                .iter()
                .map(String::as_str)
                .filter(|c| c.starts_with(prefix))
                .collect()
        }

        fn log(&mut self, call: String) {
            self.calls.push(call);
        }
    }

    fn fmt(p: DVec2) -> String {
        format!("{},{}", p.x, p.y)
    }

    impl Surface for RecordingSurface {
        fn size(&self) -> DVec2 {
            DVec2::new(self.width, self.height)
        }

        fn style(&self, key: StyleKey) -> Value {
            self.styles.get(&key).cloned().unwrap_or(Value::Num(0.0))
        }

        fn set_style(&mut self, key: StyleKey, value: &Value) {
            *self.style_writes.entry(key).or_default() += 1;
            self.styles.insert(key, value.clone());
            self.log(format!("set {}={value:?}", key.name()));
        }

        fn set_transform(&mut self, transform: DAffine2) {
            self.transform = transform;
        }

        fn begin_path(&mut self) {
            self.log("begin".into());
        }

        fn move_to(&mut self, p: DVec2) {
            self.log(format!("move {}", fmt(p)));
        }

        fn line_to(&mut self, p: DVec2) {
            self.log(format!("line {}", fmt(p)));
        }

        fn quad_to(&mut self, c: DVec2, p: DVec2) {
            self.log(format!("quad {} {}", fmt(c), fmt(p)));
        }

        fn cubic_to(&mut self, c1: DVec2, c2: DVec2, p: DVec2) {
            self.log(format!("cubic {} {} {}", fmt(c1), fmt(c2), fmt(p)));
        }

        fn arc(&mut self, center: DVec2, r: f64, start: f64, end: f64, ccw: bool) {
            self.log(format!("arc {} {r} {start} {end} {ccw}", fmt(center)));
        }

        fn ellipse(
            &mut self,
            center: DVec2,
            rx: f64,
            ry: f64,
            rot: f64,
            start: f64,
            end: f64,
            ccw: bool,
        ) {
            self.log(format!(
                "ellipse {} {rx} {ry} {rot} {start} {end} {ccw}",
                fmt(center)
            ));
        }

        fn close_path(&mut self) {
            self.log("close".into());
        }

        fn path_data(&mut self, d: &str) {
            self.log(format!("data {d}"));
        }

        fn fill(&mut self) {
            self.log("fill".into());
        }

        fn stroke(&mut self) {
            self.log("stroke".into());
        }

        fn fill_rect(&mut self, x: f64, y: f64, b: f64, h: f64) {
            self.log(format!("fill_rect {x},{y},{b},{h}"));
        }

        fn stroke_rect(&mut self, x: f64, y: f64, b: f64, h: f64) {
            self.log(format!("stroke_rect {x},{y},{b},{h}"));
        }

        fn clear_rect(&mut self, x: f64, y: f64, b: f64, h: f64) {
            self.log(format!("clear_rect {x},{y},{b},{h}"));
        }

        fn fill_text(&mut self, text: &str, p: DVec2) {
            self.log(format!("text {text} {}", fmt(p)));
        }

        fn draw_image(&mut self, image: &Image, src: [f64; 4], dst: [f64; 4]) {
            self.log(format!("image {} {src:?} {dst:?}", image.uri));
        }
    }
}
