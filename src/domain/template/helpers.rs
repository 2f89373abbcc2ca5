//! String helpers available inside notification templates.

use handlebars::{
    handlebars_helper, Context, Handlebars, Helper, HelperResult, Output, RenderContext,
    RenderErrorReason,
};
use serde_json::Value;

use crate::domain::expression::display_value;

handlebars_helper!(split: |s: str, sep: str| s.split(sep).collect::<Vec<&str>>());
handlebars_helper!(join: |items: array, sep: str| {
    items.iter().map(display_value).collect::<Vec<_>>().join(sep)
});
handlebars_helper!(trim: |s: str| s.trim());
handlebars_helper!(lower: |s: str| s.to_lowercase());
handlebars_helper!(upper: |s: str| s.to_uppercase());
handlebars_helper!(capitalize: |s: str| capitalize_first(s));
handlebars_helper!(contains: |s: str, sub: str| s.contains(sub));
handlebars_helper!(has_prefix: |s: str, prefix: str| s.starts_with(prefix));
handlebars_helper!(has_suffix: |s: str, suffix: str| s.ends_with(suffix));
handlebars_helper!(replace: |s: str, from: str, to: str| s.replace(from, to));

pub fn register_helpers(registry: &mut Handlebars<'_>) {
    registry.register_helper("split", Box::new(split));
    registry.register_helper("join", Box::new(join));
    registry.register_helper("trim", Box::new(trim));
    registry.register_helper("lower", Box::new(lower));
    registry.register_helper("upper", Box::new(upper));
    registry.register_helper("capitalize", Box::new(capitalize));
    registry.register_helper("contains", Box::new(contains));
    registry.register_helper("hasPrefix", Box::new(has_prefix));
    registry.register_helper("hasSuffix", Box::new(has_suffix));
    registry.register_helper("replace", Box::new(replace));
    registry.register_helper("printf", Box::new(printf_helper));
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn printf_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let format = h
        .param(0)
        .and_then(|p| p.value().as_str())
        .ok_or_else(|| RenderErrorReason::Other("printf: first argument must be a format string".into()))?;
    let args: Vec<&Value> = h.params().iter().skip(1).map(|p| p.value()).collect();

    out.write(&sprintf(format, &args))?;
    Ok(())
}

/// Minimal printf: `%s %v %d %f %.Nf %q %%`. Missing arguments render as
/// `%!v(MISSING)`.
pub(crate) fn sprintf(format: &str, args: &[&Value]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut args = args.iter();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut precision: Option<usize> = None;
        if chars.next_if_eq(&'.').is_some() {
            let mut digits = String::new();
            while let Some(d) = chars.next_if(|d| d.is_ascii_digit()) {
                digits.push(d);
            }
            precision = Some(digits.parse().unwrap_or(0));
        }

        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }

        let Some(arg) = args.next() else {
            out.push_str(&format!("%!{verb}(MISSING)"));
            continue;
        };

        match verb {
            'd' => match arg.as_f64() {
                Some(n) => out.push_str(&format!("{}", n.trunc() as i64)),
                None => out.push_str(&format!("%!d({})", display_value(arg))),
            },
            'f' => match arg.as_f64() {
                Some(n) => out.push_str(&format!("{:.*}", precision.unwrap_or(6), n)),
                None => out.push_str(&format!("%!f({})", display_value(arg))),
            },
            'q' => out.push_str(&format!("{:?}", display_value(arg))),
            _ => out.push_str(&display_value(arg)),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn capitalizes_first_letter_only() {
        assert_eq!(capitalize_first("production"), "Production");
        assert_eq!(capitalize_first("éte"), "Éte");
        assert_eq!(capitalize_first(""), "");
    }

    #[test]
    fn sprintf_verbs() {
        let (s, n, f) = (json!("api"), json!(3), json!(2.345));
        assert_eq!(sprintf("%s has %d pods", &[&s, &n]), "api has 3 pods");
        assert_eq!(sprintf("%.1f%%", &[&f]), "2.3%");
        assert_eq!(sprintf("%f", &[&n]), "3.000000");
        assert_eq!(sprintf("%q", &[&s]), "\"api\"");
        assert_eq!(sprintf("%v-%v", &[&s]), "api-%!v(MISSING)");
        assert_eq!(sprintf("%d", &[&s]), "%!d(api)");
    }
}
