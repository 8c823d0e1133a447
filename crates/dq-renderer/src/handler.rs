//! Style/transform state-stack render handler
//!
//! [`RenderHandler`] turns queued commands into [`Surface`] calls. It keeps
//! two parallel stacks, both reset to one base entry by `init`:
//! - transforms: `beg` pushes `top * local`, `end` pops
//! - merged style snapshots: `beg` pushes the top merged with the scope's
//!   style keys, remembering which keys changed so `end` restores only those
//!
//! Single-shot commands (`txt`, `path`, `img`, rotated `box`) set a local
//! transform for their own duration without touching the stack.
//!
//! Style writes are diffed against the surface: a key is written only when
//! its resolved value differs from the active one. A string value `@name`
//! resolves to the registry style `name`, else to the surface's current
//! value of style key `name`, else stays the literal string.

use std::f64::consts::TAU;
use std::sync::Arc;

use async_trait::async_trait;
use dq_core::{
    Applied, Args, DrawResult, Handler, HandlerFactory, IndexedPoints, Queue, RawPoints, Registry,
    SharedPoints, Style, StyleKey, Value, View, point_view,
};
use glam::{DAffine2, DVec2};
use tracing::{debug, trace};

use crate::config::RendererConfig;
use crate::image::{ImageCache, ImageLoader};
use crate::surface::Surface;

/// Upper bound on grid step adjustments per call
const GRID_STEPS: usize = 64;

/// Smallest grid line spacing in device pixels
const MIN_GRID_SPACING: f64 = 2.0;

/// One style stack level
#[derive(Debug, Clone)]
struct StyleFrame {
    style: Style,
    changed: Vec<StyleKey>,
}

/// Canvas-style handler over a [`Surface`]
pub struct RenderHandler<S> {
    surface: S,
    config: RendererConfig,
    images: Arc<ImageCache>,
    registry: Arc<Registry>,
    styles: Vec<StyleFrame>,
    transforms: Vec<DAffine2>,
    grid_base: u32,
    grid_exp: i32,
}

fn affine(m: [f64; 6]) -> DAffine2 {
    DAffine2::from_cols_array(&m)
}

fn rotation(w: f64, x: f64, y: f64) -> DAffine2 {
    DAffine2::from_angle_translation(w, DVec2::new(x, y))
}

fn is_transparent(value: &Value) -> bool {
    match value {
        Value::Str(s) => {
            let s = s.trim();
            s == "transparent" || s.replace(' ', "") == "rgba(0,0,0,0)"
        }
        _ => false,
    }
}

/// Shadow `[offsetX, offsetY, blur, color]` that actually casts
fn casts_shadow(shadow: &Value) -> bool {
    let Some(items) = shadow.as_list() else {
        return false;
    };
    let num = |i: usize| items.get(i).and_then(Value::as_num).unwrap_or(0.0);
    let color = items.get(3).cloned().unwrap_or_else(|| Value::from("black"));
    !is_transparent(&color) && (num(0) != 0.0 || num(1) != 0.0 || num(2) != 0.0)
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Num(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

impl<S: Surface> RenderHandler<S> {
    /// Handler drawing onto `surface`
    pub fn new(surface: S, config: RendererConfig, images: Arc<ImageCache>) -> Self {
        let base = affine(config.base_transform);
        let grid_base = config.grid.base;
        let grid_exp = config.grid.exponent;
        Self {
            surface,
            config,
            images,
            registry: Registry::global(),
            styles: Vec::new(),
            transforms: vec![base],
            grid_base,
            grid_exp,
        }
    }

    /// Handler with its own image cache built from `config`
    pub fn with_loader(surface: S, config: RendererConfig, loader: Arc<dyn ImageLoader>) -> Self {
        let images = Arc::new(ImageCache::from_config(loader, &config));
        Self::new(surface, config, images)
    }

    /// The drawing surface
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Mutable access to the drawing surface
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Give the surface back
    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Renderer configuration
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Current `(style, transform)` stack depths
    pub fn depth(&self) -> (usize, usize) {
        (self.styles.len(), self.transforms.len())
    }

    /// Top of the transform stack
    pub fn transform(&self) -> DAffine2 {
        self.transforms.last().copied().unwrap_or(DAffine2::IDENTITY)
    }

    /// Top of the style stack
    pub fn style(&self) -> Option<&Style> {
        self.styles.last().map(|frame| &frame.style)
    }

    /// Whether the y axis of the current transform points up
    pub fn is_cartesian(&self) -> bool {
        self.transform().matrix2.determinant() < 0.0
    }

    // ============== Style ==============

    fn resolve(&self, value: Value) -> Value {
        let name = match value.as_str().and_then(|s| s.strip_prefix('@')) {
            Some(name) => name.to_string(),
            None => return value,
        };
        if let Some(symbol) = self.registry.style(&name) {
            return symbol;
        }
        if let Some(key) = StyleKey::from_name(&name) {
            return self.surface.style(key);
        }
        value
    }

    /// Write `key` if it differs from the surface. Returns the replaced value.
    fn apply_style(&mut self, key: StyleKey, value: &Value) -> Option<Value> {
        if key == StyleKey::Shadow && !value.truthy() {
            return None;
        }
        let active = self.surface.style(key);
        if active == *value {
            return None;
        }
        self.surface.set_style(key, value);
        Some(active)
    }

    /// Apply the style keys of `args` for one command
    fn set_style(&mut self, args: &Args) -> Vec<(StyleKey, Value)> {
        let mut saved = Vec::new();
        for key in StyleKey::ALL {
            let Some(value) = args.get(key.name()) else {
                continue;
            };
            let value = self.resolve(value);
            if let Some(previous) = self.apply_style(key, &value) {
                saved.push((key, previous));
            }
        }
        saved
    }

    fn reset_style(&mut self, saved: Vec<(StyleKey, Value)>) {
        for (key, value) in saved.into_iter().rev() {
            self.surface.set_style(key, &value);
        }
    }

    fn push_style(&mut self, args: &Args) {
        let mut frame = match self.styles.last() {
            Some(top) => StyleFrame {
                style: top.style.clone(),
                changed: Vec::new(),
            },
            None => StyleFrame {
                style: Style::new(),
                changed: Vec::new(),
            },
        };
        for key in StyleKey::ALL {
            let Some(value) = args.get(key.name()) else {
                continue;
            };
            let value = self.resolve(value);
            if frame.style.get(&key) != Some(&value) {
                self.apply_style(key, &value);
                frame.style.insert(key, value);
                frame.changed.push(key);
            }
        }
        self.styles.push(frame);
    }

    fn pop_style(&mut self) {
        if self.styles.len() <= 1 {
            return;
        }
        let Some(frame) = self.styles.pop() else {
            return;
        };
        let restore: Vec<(StyleKey, Value)> = match self.styles.last() {
            Some(top) => frame
                .changed
                .iter()
                .filter_map(|key| top.style.get(key).map(|v| (*key, v.clone())))
                .collect(),
            None => Vec::new(),
        };
        for (key, value) in restore {
            self.apply_style(key, &value);
        }
    }

    // ============== Transform ==============

    fn push_transform(&mut self, local: DAffine2) {
        let m = self.transform() * local;
        self.transforms.push(m);
        self.surface.set_transform(m);
    }

    fn pop_transform(&mut self) {
        if self.transforms.len() > 1 {
            self.transforms.pop();
        }
        self.surface.set_transform(self.transform());
    }

    fn set_local(&mut self, local: DAffine2) {
        self.surface.set_transform(self.transform() * local);
    }

    fn reset_local(&mut self) {
        self.surface.set_transform(self.transform());
    }

    // ============== Painting ==============

    /// Fill then stroke the current path. A shadow cast by the fill is not
    /// repeated by the stroke unless `stroke_shadow` is set.
    fn fill_and_stroke(&mut self, stroke_shadow: bool) {
        self.surface.fill();
        let shadow = self.surface.style(StyleKey::Shadow);
        let fill = self.surface.style(StyleKey::Fill);
        if !stroke_shadow && casts_shadow(&shadow) && !is_transparent(&fill) {
            let mut silent = shadow.as_list().map(<[Value]>::to_vec).unwrap_or_default();
            silent.resize(4, Value::Num(0.0));
            silent[3] = Value::from("transparent");
            self.surface.set_style(StyleKey::Shadow, &Value::List(silent));
            self.surface.stroke();
            self.surface.set_style(StyleKey::Shadow, &shadow);
        } else {
            self.surface.stroke();
        }
    }

    fn stroke(&mut self, args: &Args) {
        let saved = self.set_style(args);
        if let Some(d) = args.str("d") {
            self.surface.path_data(&d);
        }
        self.surface.stroke();
        self.reset_style(saved);
    }

    fn fill(&mut self, args: &Args) {
        let saved = self.set_style(args);
        if let Some(d) = args.str("d") {
            self.surface.path_data(&d);
        }
        self.surface.fill();
        self.reset_style(saved);
    }

    fn drw(&mut self, args: &Args) {
        let saved = self.set_style(args);
        if let Some(d) = args.str("d") {
            self.surface.path_data(&d);
        }
        self.fill_and_stroke(args.flag("lsh"));
        self.reset_style(saved);
    }

    // ============== Commands ==============

    fn view(&mut self, args: &Args) {
        let View {
            x,
            y,
            scl,
            cartesian,
        } = View::from_args(args);
        let local = if cartesian {
            let h = self.surface.size().y;
            affine([scl, 0.0, 0.0, -scl, x, h - 1.0 - y])
        } else {
            affine([scl, 0.0, 0.0, scl, x, y])
        };
        if let Some(top) = self.transforms.last_mut() {
            *top = *top * local;
        }
        self.surface.set_transform(self.transform());
    }

    /// On-screen grid step for scale `scl`, stepping 1-2-5 between the
    /// configured pixel bounds
    fn grid_size(&mut self, scl: f64) -> Option<f64> {
        if !(scl.is_finite() && scl > 0.0) {
            return None;
        }
        let (min, max) = (self.config.grid.min_px, self.config.grid.max_px);
        let (mut base, mut exp) = (self.grid_base, self.grid_exp);
        for _ in 0..GRID_STEPS {
            let size = scl * f64::from(base) * 10f64.powi(exp);
            if size < min {
                (base, exp) = match base {
                    1 => (2, exp),
                    2 => (5, exp),
                    _ => (1, exp + 1),
                };
            } else if size > max {
                (base, exp) = match base {
                    1 => (5, exp - 1),
                    2 => (1, exp),
                    _ => (2, exp),
                };
            } else {
                self.grid_base = base;
                self.grid_exp = exp;
                return Some(size);
            }
        }
        debug!(scl, "no grid step fits the configured pixel range");
        None
    }

    fn grid(&mut self, args: &Args) {
        let top = self.transform();
        let Some(size) = args
            .num("size")
            .filter(|s| s.is_finite() && *s > 0.0)
            .or_else(|| self.grid_size(top.matrix2.x_axis.length()))
        else {
            return;
        };
        let size = size.max(MIN_GRID_SPACING);
        let color = match args.get("color") {
            Some(color) => self.resolve(color),
            None => Value::from(self.config.grid.color.as_str()),
        };
        let mut saved = Vec::new();
        for (key, value) in [(StyleKey::Stroke, color), (StyleKey::LineWidth, Value::Num(1.0))] {
            if let Some(previous) = self.apply_style(key, &value) {
                saved.push((key, previous));
            }
        }

        let device = self.surface.size();
        self.surface.set_transform(DAffine2::IDENTITY);
        self.surface.begin_path();
        let mut x = top.translation.x % size;
        while x < device.x + 1.0 {
            self.surface.move_to(DVec2::new(x, 0.0));
            self.surface.line_to(DVec2::new(x, device.y));
            x += size;
        }
        let mut y = top.translation.y % size;
        while y < device.y + 1.0 {
            self.surface.move_to(DVec2::new(0.0, y));
            self.surface.line_to(DVec2::new(device.x, y));
            y += size;
        }
        self.surface.stroke();
        self.reset_local();
        self.reset_style(saved);
    }

    fn clr(&mut self, args: &Args) {
        let device = self.surface.size();
        let b = args.num("b").filter(|v| *v != 0.0).unwrap_or(device.x);
        let h = args.num("h").filter(|v| *v != 0.0).unwrap_or(device.y);
        self.surface.set_transform(DAffine2::IDENTITY);
        self.surface.clear_rect(0.0, 0.0, b, h);
        self.reset_local();
    }

    fn cir(&mut self, args: &Args) {
        let center = DVec2::new(args.num_or("x", 0.0), args.num_or("y", 0.0));
        let r = args.num_or("r", 0.0).abs();
        if r <= f64::EPSILON {
            trace!("zero radius circle, nothing drawn");
            return;
        }
        self.surface.begin_path();
        self.surface.arc(center, r, 0.0, TAU, true);
        self.drw(args);
    }

    fn arc(&mut self, args: &Args) {
        let center = DVec2::new(args.num_or("x", 0.0), args.num_or("y", 0.0));
        let r = args.num_or("r", 0.0);
        let w = args.num_or("w", 0.0);
        let dw = args.num_or("dw", TAU);
        if r.abs() <= f64::EPSILON {
            trace!("zero radius arc, nothing drawn");
            return;
        }
        self.surface.begin_path();
        if dw.abs() > f64::EPSILON {
            self.surface.arc(center, r.abs(), w, w + dw, dw < 0.0);
        } else {
            let dir = DVec2::from_angle(w) * r;
            self.surface.move_to(center - dir);
            self.surface.line_to(center + dir);
        }
        self.drw(args);
    }

    fn ell(&mut self, args: &Args) {
        let center = DVec2::new(args.num_or("x", 0.0), args.num_or("y", 0.0));
        let rx = args.num_or("rx", 0.0).abs();
        let ry = args.num_or("ry", 0.0).abs();
        let w = args.num_or("w", 0.0);
        let dw = args.num_or("dw", TAU);
        let rot = args.num_or("rot", 0.0);
        self.surface.begin_path();
        self.surface.ellipse(center, rx, ry, rot, w, w + dw, dw < 0.0);
        self.drw(args);
    }

    fn rect(&mut self, args: &Args, origin: DVec2, b: f64, h: f64, local: Option<DAffine2>) {
        let saved = self.set_style(args);
        if let Some(local) = local {
            self.set_local(local);
        }
        self.surface.fill_rect(origin.x, origin.y, b, h);
        self.surface.stroke_rect(origin.x, origin.y, b, h);
        if local.is_some() {
            self.reset_local();
        }
        self.reset_style(saved);
    }

    fn bbox(&mut self, args: &Args) {
        let (x, y) = (args.num_or("x", 0.0), args.num_or("y", 0.0));
        let (b, h) = (args.num_or("b", 0.0), args.num_or("h", 0.0));
        let w = args.num_or("w", 0.0);
        let half = DVec2::new(b / 2.0, h / 2.0);
        if w == 0.0 {
            self.rect(args, DVec2::new(x, y) - half, b, h, None);
        } else {
            self.rect(args, -half, b, h, Some(rotation(w, x, y)));
        }
    }

    fn rec(&mut self, args: &Args) {
        let origin = DVec2::new(args.num_or("x", 0.0), args.num_or("y", 0.0));
        self.rect(args, origin, args.num_or("b", 0.0), args.num_or("h", 0.0), None);
    }

    fn lin(&mut self, args: &Args) {
        self.surface.begin_path();
        self.surface
            .move_to(DVec2::new(args.num_or("x1", 0.0), args.num_or("y1", 0.0)));
        self.surface
            .line_to(DVec2::new(args.num_or("x2", 0.0), args.num_or("y2", 0.0)));
        self.stroke(args);
    }

    fn ply(&mut self, args: &Args) {
        let points = match args.get("pts") {
            Some(Value::Points(points)) => points,
            Some(Value::List(values)) => {
                let raw = match args.str("format") {
                    Some(format) => RawPoints::from_format(&format, &values),
                    None => RawPoints::detect(&values),
                };
                match raw {
                    Some(raw) => SharedPoints::new(raw),
                    None => return,
                }
            }
            _ => return,
        };
        let (x, y, w) = (args.num_or("x", 0.0), args.num_or("y", 0.0), args.num_or("w", 0.0));
        {
            let raw = points.read();
            let view = point_view(&raw, x, y, w);
            if view.is_empty() {
                return;
            }
            self.surface.begin_path();
            for (i, p) in view.iter().enumerate() {
                if i == 0 {
                    self.surface.move_to(p);
                } else {
                    self.surface.line_to(p);
                }
            }
        }
        if args.flag("closed") {
            self.surface.close_path();
        }
        self.drw(args);
    }

    fn txt(&mut self, args: &Args) {
        let text = args.get("str").map(|v| text_of(&v)).unwrap_or_default();
        let mut saved = self.set_style(args);
        let (x, y) = (args.num_or("x", 0.0), args.num_or("y", 0.0));
        let (sw, cw) = args.num_or("w", 0.0).sin_cos();
        let local = if self.is_cartesian() {
            affine([cw, sw, sw, -cw, x, y])
        } else {
            affine([cw, sw, -sw, cw, x, y])
        };
        self.set_local(local);
        let fill = self.surface.style(StyleKey::Fill);
        if is_transparent(&fill) {
            let stroke = self.surface.style(StyleKey::Stroke);
            self.surface.set_style(StyleKey::Fill, &stroke);
            saved.push((StyleKey::Fill, fill));
        }
        self.surface.fill_text(&text, DVec2::ZERO);
        self.reset_local();
        self.reset_style(saved);
    }

    async fn img(&mut self, args: &Args) -> DrawResult<()> {
        let Some(uri) = args.str("uri") else {
            return Ok(());
        };
        let image = self.images.load(&uri).await?;

        let nonzero = |key: &str| args.num(key).filter(|v| *v != 0.0);
        let cart = if self.is_cartesian() { -1.0 } else { 1.0 };
        let scl = nonzero("scl").unwrap_or(1.0);
        let (sx, sy) = (args.num_or("sx", 0.0), args.num_or("sy", 0.0));
        let sb = nonzero("sb").unwrap_or(image.width);
        let sh = nonzero("sh").unwrap_or(image.height);
        let b = nonzero("b").unwrap_or(image.width);
        let h = nonzero("h").unwrap_or(image.height) * cart;
        let xoff = args.num_or("xoff", 0.0);
        let yoff = args.num_or("yoff", 0.0) * cart;
        let w = args.num_or("w", 0.0) * cart;
        let x = args.num_or("x", 0.0);
        let y = args.num_or("y", 0.0);
        let y = if cart < 0.0 { -(y / scl) + sy } else { y / scl };

        let local = DAffine2::from_scale(DVec2::new(scl, scl * cart)) * rotation(w, x / scl, y);
        self.set_local(local);
        self.surface
            .draw_image(&image, [sx, sy, sb, sh], [xoff, yoff, b, h]);
        self.reset_local();
        Ok(())
    }

    fn beg(&mut self, args: &Args) {
        let matrix = args
            .get("matrix")
            .and_then(|m| m.as_numbers())
            .filter(|m| m.len() == 6);
        let local = match matrix {
            Some(m) => affine([m[0], m[1], m[2], m[3], m[4], m[5]]),
            None => {
                let scl = args.num_or("scl", 1.0);
                let (sw, cw) = args.num_or("w", 0.0).sin_cos();
                affine([
                    cw * scl,
                    sw * scl,
                    -sw * scl,
                    cw * scl,
                    args.num_or("x", 0.0),
                    args.num_or("y", 0.0),
                ])
            }
        };
        self.push_transform(local);
        self.push_style(args);
    }

    fn end(&mut self) {
        if self.transforms.len() <= 1 || self.styles.len() <= 1 {
            debug!("unbalanced scope end ignored");
            return;
        }
        self.pop_style();
        self.pop_transform();
    }

    fn trace_segments(&mut self, seg: &[Value]) {
        let point = |i: usize| {
            seg.get(i)
                .map(|s| {
                    let num = |k: &str| s.get(k).and_then(Value::as_num).unwrap_or(0.0);
                    DVec2::new(num("x"), num("y"))
                })
                .unwrap_or(DVec2::ZERO)
        };
        self.surface.begin_path();
        let mut i = 0;
        while i < seg.len() {
            let op = seg[i].get("c").and_then(Value::as_str).unwrap_or("l");
            match op {
                "m" => {
                    self.surface.move_to(point(i));
                    i += 1;
                }
                "q" => {
                    self.surface.quad_to(point(i), point(i + 1));
                    i += 2;
                }
                "c" => {
                    self.surface.cubic_to(point(i), point(i + 1), point(i + 2));
                    i += 3;
                }
                "a" => {
                    let dw = seg[i].get("dw").and_then(Value::as_num).unwrap_or(0.0);
                    let mu = if dw.abs() > f64::EPSILON && dw.abs() < TAU {
                        1.0 / (dw / 2.0).tan()
                    } else {
                        0.0
                    };
                    if i > 0 && mu != 0.0 {
                        let prev = point(i - 1);
                        let d = point(i) - prev;
                        let c = DVec2::new((d.x - mu * d.y) / 2.0, (d.y + mu * d.x) / 2.0);
                        let r = c.length();
                        let w = (-c.y).atan2(-c.x);
                        self.surface.ellipse(prev + c, r, r, 0.0, w, w + dw, dw < 0.0);
                    } else {
                        self.surface.line_to(point(i));
                    }
                    i += 1;
                }
                "z" => {
                    self.surface.close_path();
                    i += 1;
                }
                _ => {
                    self.surface.line_to(point(i));
                    i += 1;
                }
            }
        }
    }

    fn path(&mut self, args: &Args) {
        let saved = self.set_style(args);
        let (x, y, w) = (args.num_or("x", 0.0), args.num_or("y", 0.0), args.num_or("w", 0.0));
        let local = w != 0.0 || x != 0.0 || y != 0.0;
        if local {
            self.set_local(rotation(w, x, y));
        }
        if let Some(Value::List(seg)) = args.get("seg") {
            self.trace_segments(&seg);
            self.fill_and_stroke(false);
        } else if let Some(d) = args.str("d") {
            self.surface.path_data(&d);
            self.fill_and_stroke(false);
        }
        if local {
            self.reset_local();
        }
        self.reset_style(saved);
    }
}

impl<S: Surface + 'static> RenderHandler<S> {
    /// Register a factory building a render handler for targets of type `S`.
    /// Every handler it builds shares one image cache using the configured
    /// placeholder.
    pub fn register(registry: &Registry, config: RendererConfig, loader: Arc<dyn ImageLoader>) {
        let images = Arc::new(ImageCache::from_config(loader, &config));
        registry.register_handler(HandlerFactory::new(
            |target| target.is::<S>(),
            move |target| {
                let surface = target.downcast_mut::<S>()?;
                let handler: Box<dyn Handler + '_> =
                    Box::new(RenderHandler::new(surface, config.clone(), images.clone()));
                Some(handler)
            },
        ));
    }
}

#[async_trait(?Send)]
impl<S: Surface> Handler for RenderHandler<S> {
    fn init(&mut self, queue: &Queue, style: Option<&Style>) -> bool {
        self.registry = queue.registry().clone();

        let base_transform = affine(self.config.base_transform);
        self.transforms.clear();
        self.transforms.push(base_transform);
        self.surface.set_transform(base_transform);

        let mut base = self.config.default_style.to_style();
        if let Some(style) = style {
            for (key, value) in style {
                let value = self.resolve(value.clone());
                base.insert(*key, value);
            }
        }
        for key in StyleKey::ALL {
            if !base.contains_key(&key) {
                base.insert(key, self.surface.style(key));
            }
        }
        for (key, value) in &base {
            self.apply_style(*key, value);
        }
        self.styles.clear();
        self.styles.push(StyleFrame {
            style: base,
            changed: Vec::new(),
        });
        true
    }

    async fn apply(&mut self, name: &str, args: Option<&Args>) -> DrawResult<Applied> {
        let empty;
        let args = match args {
            Some(args) => args,
            None => {
                empty = Args::new();
                &empty
            }
        };
        match name {
            "view" => self.view(args),
            "grid" => self.grid(args),
            "clr" => self.clr(args),
            "cir" => self.cir(args),
            "arc" => self.arc(args),
            "ell" => self.ell(args),
            "box" => self.bbox(args),
            "rec" => self.rec(args),
            "lin" => self.lin(args),
            "ply" => self.ply(args),
            "txt" => self.txt(args),
            "img" => self.img(args).await?,
            "beg" => self.beg(args),
            "end" => self.end(),
            "path" => self.path(args),
            "stroke" => self.stroke(args),
            "fill" => self.fill(args),
            "drw" => self.drw(args),
            _ => return Ok(Applied::Unsupported),
        }
        Ok(Applied::Done)
    }

    fn finish(&mut self) {
        if self.transforms.len() > 1 {
            debug!(depth = self.transforms.len(), "unclosed scopes unwound");
        }
        while self.transforms.len() > 1 && self.styles.len() > 1 {
            self.pop_style();
            self.pop_transform();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::memory::MemoryLoader;
    use crate::surface::recording::RecordingSurface;
    use approx::assert_relative_eq;
    use dq_core::DrawError;
    use futures::executor::block_on;

    fn handler_with(loader: MemoryLoader) -> RenderHandler<RecordingSurface> {
        let images = Arc::new(ImageCache::with_placeholder(Arc::new(loader), "ph.gif"));
        RenderHandler::new(
            RecordingSurface::new(200.0, 100.0),
            RendererConfig::default(),
            images,
        )
    }

    fn handler() -> RenderHandler<RecordingSurface> {
        handler_with(MemoryLoader::default())
    }

    fn queue() -> Queue {
        Queue::with_registry(Registry::with_builtins())
    }

    fn set_calls(h: &RenderHandler<RecordingSurface>, key: StyleKey, value: &str) -> usize {
        let call = format!("set {}={:?}", key.name(), Value::from(value));
        h.surface().calls.iter().filter(|c| **c == call).count()
    }

    #[test]
    fn test_nested_identical_style_written_once() {
        let q = queue();
        q.begin_scope(Args::new().with("ls", "red"))
            .begin_scope(Args::new().with("ls", "red"))
            .cir(Args::new().with("r", 5.0))
            .end_scope()
            .end_scope();
        let mut h = handler();
        assert_eq!(q.execute_with(&mut h), Ok(true));
        assert_eq!(set_calls(&h, StyleKey::Stroke, "red"), 1, "inner scope repeats the value");
        assert_eq!(
            h.surface().writes(StyleKey::Stroke),
            3,
            "base, outer scope, restore on outer end"
        );
        assert_eq!(h.surface().style(StyleKey::Stroke), Value::from("#000"));
    }

    #[test]
    fn test_stack_depth_follows_scopes() {
        let q = queue();
        let mut h = handler();
        assert!(h.init(&q, None));
        assert_eq!(h.depth(), (1, 1));

        let scope = Args::new().with("x", 10.0).with("lw", 3.0);
        block_on(h.apply("beg", Some(&scope))).unwrap();
        block_on(h.apply("beg", Some(&Args::new()))).unwrap();
        assert_eq!(h.depth(), (3, 3));
        assert_relative_eq!(h.transform().translation.x, 10.5);

        block_on(h.apply("end", None)).unwrap();
        block_on(h.apply("end", None)).unwrap();
        assert_eq!(h.depth(), (1, 1));
        assert_eq!(h.surface().style(StyleKey::LineWidth), Value::Num(1.0));

        block_on(h.apply("end", None)).unwrap();
        assert_eq!(h.depth(), (1, 1), "unbalanced end is absorbed");
    }

    #[test]
    fn test_finish_unwinds_open_scopes() {
        let q = queue();
        q.begin_scope(Args::new().with("ls", "blue"));
        let mut h = handler();
        q.execute_with(&mut h).unwrap();
        assert_eq!(h.depth(), (1, 1));
        assert_eq!(h.surface().style(StyleKey::Stroke), Value::from("#000"));
    }

    #[test]
    fn test_zero_radius_and_zero_sweep_arcs() {
        let q = queue();
        q.arc(Args::new().with("r", 0.0).with("dw", 1.0));
        let mut h = handler();
        q.execute_with(&mut h).unwrap();
        assert!(h.surface().calls_named("arc").is_empty());
        assert!(h.surface().calls_named("stroke").is_empty(), "zero radius draws nothing");

        let q = queue();
        q.arc(Args::new().with("x", 10.0).with("r", 5.0).with("w", 0.0).with("dw", 0.0));
        let mut h = handler();
        q.execute_with(&mut h).unwrap();
        assert_eq!(h.surface().calls_named("move"), vec!["move 5,0"]);
        assert_eq!(h.surface().calls_named("line"), vec!["line 15,0"], "zero sweep is a segment");
    }

    #[test]
    fn test_zero_radius_circle_draws_nothing() {
        let q = queue();
        q.cir(Args::new().with("x", 10.0).with("r", 0.0));
        let mut h = handler();
        q.execute_with(&mut h).unwrap();
        assert!(h.surface().calls_named("arc").is_empty());
        assert!(h.surface().calls_named("fill").is_empty(), "no fill for zero radius");
        assert!(h.surface().calls_named("stroke").is_empty(), "no stroke for zero radius");
    }

    #[test]
    fn test_style_reference_chain() {
        let q = queue();
        q.rec(Args::new().with("b", 1.0).with("h", 1.0).with("ls", "@nodcolor"))
            .rec(Args::new().with("b", 1.0).with("h", 1.0).with("fs", "@ls"))
            .rec(Args::new().with("b", 1.0).with("h", 1.0).with("ls", "@nowhere"));
        let mut h = handler();
        q.execute_with(&mut h).unwrap();
        assert_eq!(set_calls(&h, StyleKey::Stroke, "#333"), 1, "registry style");
        assert_eq!(set_calls(&h, StyleKey::Fill, "#000"), 1, "current surface value");
        assert_eq!(set_calls(&h, StyleKey::Stroke, "@nowhere"), 1, "literal fallback");
    }

    #[test]
    fn test_cartesian_view_flips_y() {
        let q = queue();
        q.view(Args::new().with("cartesian", true).with("x", 20.0).with("y", 10.0));
        let mut h = handler();
        q.execute_with(&mut h).unwrap();
        let m = h.transform();
        assert!(h.is_cartesian());
        assert_relative_eq!(m.matrix2.y_axis.y, -1.0);
        assert_relative_eq!(m.translation.x, 20.5);
        assert_relative_eq!(m.translation.y, 100.0 - 1.0 - 10.0 + 0.5);
        assert_eq!(h.depth(), (1, 1), "view does not open a scope");
    }

    #[test]
    fn test_image_waits_and_keeps_order() {
        let q = queue();
        q.img(Args::new().with("uri", "missing.png"))
            .cir(Args::new().with("r", 5.0));
        let mut h = handler_with(MemoryLoader::failing(&["missing.png"]));
        assert_eq!(q.execute_with(&mut h), Ok(true));
        let calls = &h.surface().calls;
        let image = calls.iter().position(|c| c.starts_with("image ph.gif"));
        let arc = calls.iter().position(|c| c.starts_with("arc"));
        assert!(image.is_some(), "placeholder drawn: {calls:?}");
        assert!(image < arc, "image before the following circle");
        assert!(
            calls.iter().any(|c| c == "image ph.gif [0.0, 0.0, 30.0, 30.0] [0.0, 0.0, 30.0, 30.0]"),
            "natural size used: {calls:?}"
        );
    }

    #[test]
    fn test_placeholder_failure_aborts_pass() {
        let q = queue();
        q.img(Args::new().with("uri", "missing.png"));
        let mut h = handler_with(MemoryLoader::failing(&["missing.png", "ph.gif"]));
        let result = q.execute_with(&mut h);
        assert!(matches!(result, Err(DrawError::ImageLoad { .. })), "got {result:?}");
        assert_eq!(h.depth(), (1, 1));
    }

    #[test]
    fn test_path_segments() {
        let seg = |c: &str, x: f64, y: f64| Value::map([("c", Value::from(c)), ("x", x.into()), ("y", y.into())]);
        let arc = Value::map([
            ("c", Value::from("a")),
            ("x", Value::from(20.0)),
            ("y", Value::from(0.0)),
            ("dw", Value::from(std::f64::consts::PI)),
        ]);
        let q = queue();
        q.path(Args::new().with(
            "seg",
            vec![seg("m", 0.0, 0.0), seg("l", 10.0, 0.0), arc, seg("z", 0.0, 0.0)],
        ));
        let mut h = handler();
        q.execute_with(&mut h).unwrap();
        let s = h.surface();
        assert_eq!(s.calls_named("move"), vec!["move 0,0"]);
        assert_eq!(s.calls_named("line"), vec!["line 10,0"]);
        assert_eq!(s.calls_named("ellipse").len(), 1, "half-turn arc");
        assert_eq!(s.calls_named("close").len(), 1);
        assert_eq!(s.calls_named("fill").len(), 1);
        assert_eq!(s.calls_named("stroke").len(), 1);
    }

    #[test]
    fn test_text_with_transparent_fill_uses_stroke() {
        let q = queue();
        q.txt(Args::new().with("str", "hi").with("ls", "green"));
        let mut h = handler();
        q.execute_with(&mut h).unwrap();
        assert_eq!(h.surface().calls_named("text"), vec!["text hi 0,0"]);
        assert_eq!(set_calls(&h, StyleKey::Fill, "green"), 1);
        assert_eq!(h.surface().style(StyleKey::Fill), Value::from("transparent"), "fill restored");
    }

    #[test]
    fn test_label_producer_is_rendered() {
        let q = queue();
        q.cir(Args::new().with("x", 10.0).with("y", 10.0).with("r", 5.0).with("label", "A"));
        let mut h = handler();
        q.execute_with(&mut h).unwrap();
        assert_eq!(h.surface().calls_named("text"), vec!["text A 0,0"]);
    }

    #[test]
    fn test_polyline_points() {
        let q = queue();
        q.ply(
            Args::new()
                .with("pts", vec![0.0, 0.0, 10.0, 0.0, 10.0, 5.0])
                .with("closed", true),
        );
        let mut h = handler();
        q.execute_with(&mut h).unwrap();
        let s = h.surface();
        assert_eq!(s.calls_named("move"), vec!["move 0,0"]);
        assert_eq!(s.calls_named("line"), vec!["line 10,0", "line 10,5"]);
        assert_eq!(s.calls_named("close").len(), 1);
    }

    #[test]
    fn test_grid_size_steps() {
        let mut h = handler();
        assert_eq!(h.grid_size(1.0), Some(20.0));
        let size = h.grid_size(0.37).expect("a step fits");
        assert!((14.0..=35.0).contains(&size), "got {size}");
        assert_eq!(h.grid_size(0.0), None);
    }

    #[test]
    fn test_tiny_grid_size_is_clamped() {
        let q = queue();
        q.grid(Args::new().with("size", 1e-9));
        let mut h = handler();
        q.execute_with(&mut h).unwrap();
        let lines = h.surface().calls_named("line").len();
        // 200x100 surface at 2px spacing
        assert!(lines <= 101 + 51, "got {lines} grid lines");
        assert_eq!(h.surface().calls_named("stroke").len(), 1);
    }

    #[test]
    fn test_registered_handler_uses_configured_placeholder() {
        let registry = Registry::with_builtins();
        let config = RendererConfig {
            placeholder_image: "broken.gif".into(),
            ..Default::default()
        };
        let loader = Arc::new(MemoryLoader::failing(&["missing.png"]));
        RenderHandler::<RecordingSurface>::register(&registry, config, loader.clone());

        let q = Queue::with_registry(registry);
        q.img(Args::new().with("uri", "missing.png"));
        let mut surface = RecordingSurface::new(50.0, 50.0);
        assert_eq!(q.execute(&mut surface), Ok(true));
        assert_eq!(surface.calls_named("image").len(), 1);
        assert!(
            surface.calls_named("image")[0].starts_with("image broken.gif"),
            "got {:?}",
            surface.calls
        );
        assert_eq!(loader.requests(), vec!["missing.png", "broken.gif"]);
    }

    #[test]
    fn test_factory_resolves_surface() {
        let registry = Registry::with_builtins();
        RenderHandler::<RecordingSurface>::register(
            &registry,
            RendererConfig::default(),
            Arc::new(MemoryLoader::default()),
        );

        let q = Queue::with_registry(registry);
        q.lin(Args::new().with("x2", 10.0).with("y2", 10.0));
        let mut surface = RecordingSurface::new(50.0, 50.0);
        assert_eq!(q.execute(&mut surface), Ok(true));
        assert_eq!(surface.calls_named("stroke").len(), 1);
    }
}
