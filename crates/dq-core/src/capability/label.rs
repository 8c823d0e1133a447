//! Label capability
//!
//! `label` is either a template string or a map `{ str, loc, off, font,
//! border, fs, ls, digits }`. Templates substitute one field value:
//! `"len=@len; mm"` reads the `len` property of the labelled command.

use super::{Capability, DrawContext, Locator};
use crate::args::Args;
use crate::queue::Queue;
use crate::value::Value;

/// Font used when neither the label nor the style table names one
const DEFAULT_FONT: &str = "16px serif";

/// Significant digits when no symbol overrides them
const DEFAULT_DIGITS: f64 = 3.0;

/// Producer level of labels
const LEVEL: i32 = 5;

/// `sign(0) == 0`, unlike `f64::signum`
fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Render a value for display, rounding non-integers to `digits`
/// significant digits.
fn display_value(value: Option<Value>, digits: f64) -> String {
    match value {
        Some(Value::Num(v)) if v.fract() == 0.0 || !v.is_finite() => format!("{v}"),
        Some(Value::Num(v)) => {
            let decimals = (digits - 1.0 - v.abs().log10().floor()).max(0.0) as usize;
            format!("{v:.decimals$}")
        }
        Some(Value::Str(s)) => s,
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => format!("{other:?}"),
        None => String::new(),
    }
}

/// Expand a `text@field;text` template against `args`
pub fn format_label(template: &str, args: &Args, digits: f64) -> String {
    let Some((head, rest)) = template.split_once('@') else {
        return template.to_string();
    };
    let (field, tail) = rest.split_once(';').unwrap_or((rest, ""));
    let value = if field.is_empty() {
        String::new()
    } else {
        display_value(args.get(field), digits)
    };
    format!("{head}{value}{tail}")
}

/// Pixel height of a CSS font string (`"bold 14px serif"` → 14)
fn font_height(font: &str) -> f64 {
    font.split_whitespace()
        .find_map(|part| part.strip_suffix("px")?.parse().ok())
        .unwrap_or(16.0)
}

fn produce(args: &Args, cx: &DrawContext) -> Option<Queue> {
    let label = args.get("label").filter(Value::truthy)?;
    let opt = |key: &str| label.get(key).cloned().filter(Value::truthy);

    let template = match &label {
        Value::Str(s) => s.clone(),
        Value::Map(_) => opt("str")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "?".to_string()),
        _ => "?".to_string(),
    };
    let digits = opt("digits")
        .and_then(|v| v.as_num())
        .or_else(|| cx.registry.style("labelSignificantDigits").and_then(|v| v.as_num()))
        .unwrap_or(DEFAULT_DIGITS);
    let text = format_label(&template, args, digits);

    let font = opt("font")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_FONT.to_string());
    let h = font_height(&font);
    let rx = text.chars().count().max(1) as f64 * 0.65 * h / 2.0;
    let ry = 1.25 * h / 2.0;

    let loc = opt("loc")
        .or_else(|| args.get("lbloc"))
        .and_then(|v| Locator::from_value(&v))
        .unwrap_or_else(|| Locator::from("c"));
    let anchor = args.point_at(&loc, cx.view.cartesian)?;

    let off = match label.get("off").and_then(Value::as_num) {
        Some(off) => off,
        None => args.num("lboff").filter(|v| *v != 0.0).unwrap_or(1.0),
    };
    let lw = args.num("lw").filter(|v| *v != 0.0).unwrap_or(2.0);
    let offset = off + sign(off) * lw / 2.0;
    let x = anchor.pos.x + anchor.normal.x * (offset + sign(offset) * rx);
    let y = anchor.pos.y + anchor.normal.y * (offset + sign(offset) * ry);

    let queue = cx.queue();
    let border = opt("border");
    if border.is_some() || opt("fs").is_some() {
        let fs = border
            .as_ref()
            .and_then(|b| b.get("fs").cloned())
            .or_else(|| match opt("fs") {
                Some(Value::Str(s)) if s == "@" => args.get("fs"),
                other => other,
            })
            .unwrap_or_else(|| Value::from("#ffc"));
        let ls = match &border {
            Some(Value::Bool(true)) => args.get("ls"),
            Some(b) => b.get("ls").cloned().or_else(|| opt("ls")),
            None => opt("ls"),
        }
        .unwrap_or_else(|| Value::from("transparent"));
        queue.ell(
            Args::new()
                .with("x", x)
                .with("y", y)
                .with("rx", rx)
                .with("ry", ry)
                .with("ls", ls)
                .with("fs", fs),
        );
    }
    let color = opt("ls")
        .or_else(|| args.get("ls"))
        .unwrap_or_else(|| Value::from("black"));
    queue.txt(
        Args::new()
            .with("str", text)
            .with("x", x)
            .with("y", y)
            .with("thal", "center")
            .with("tval", "middle")
            .with("fs", color)
            .with("font", font),
    );
    Some(queue)
}

/// Text label anchored on the command's parametric path, with an optional
/// elliptical background.
pub fn label() -> Capability {
    Capability::new("label").producer(LEVEL, produce)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_substitution() {
        let args = Args::new().with("len", 12.3456).with("name", "A");
        assert_eq!(format_label("len=@len; mm", &args, 3.0), "len=12.3 mm");
        assert_eq!(format_label("@name", &args, 3.0), "A");
        assert_eq!(format_label("plain", &args, 3.0), "plain");
    }

    #[test]
    fn test_significant_digits() {
        let args = Args::new().with("a", 1.23456).with("b", 0.5).with("c", 42.0);
        assert_eq!(format_label("@a", &args, 3.0), "1.23");
        assert_eq!(format_label("@b", &args, 3.0), "0.500");
        assert_eq!(format_label("@c", &args, 3.0), "42", "integers are not padded");
        assert_eq!(format_label("@a", &args, 2.0), "1.2");
    }

    #[test]
    fn test_font_height() {
        assert_eq!(font_height("bold 14px serif"), 14.0);
        assert_eq!(font_height("serif"), 16.0);
    }

    #[test]
    fn test_sign_of_zero() {
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(-3.0), -1.0);
    }
}
