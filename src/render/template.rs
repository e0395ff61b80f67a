//! Template rendering
//!
//! Jinja-style templates rendered with minijinja. Output is Markdown, so
//! auto-escaping is off. A `date` filter formats timestamps with either
//! chrono `strftime` patterns or moment-style tokens (`YYYY-MM-DD`).

use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, Utc};
use minijinja::value::Value;
use minijinja::{AutoEscape, Environment, ErrorKind};
use thiserror::Error;

use super::context::TemplateContext;

/// Format used by `date` when no pattern is given
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Moment tokens and their strftime equivalents, longest first per letter
const MOMENT_TOKENS: &[(&str, &str)] = &[
    ("YYYY", "%Y"),
    ("YY", "%y"),
    ("MMMM", "%B"),
    ("MMM", "%b"),
    ("MM", "%m"),
    ("M", "%-m"),
    ("DDDD", "%j"),
    ("DD", "%d"),
    ("D", "%-d"),
    ("dddd", "%A"),
    ("ddd", "%a"),
    ("d", "%w"),
    ("HH", "%H"),
    ("H", "%-H"),
    ("hh", "%I"),
    ("h", "%-I"),
    ("mm", "%M"),
    ("m", "%-M"),
    ("ss", "%S"),
    ("s", "%-S"),
    ("A", "%p"),
    ("a", "%P"),
    ("ZZ", "%z"),
    ("Z", "%:z"),
    ("X", "%s"),
];

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// Renders issue titles and bodies
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_keep_trailing_newline(true);
        env.add_filter("date", date_filter);
        Self { env }
    }

    /// Renders a template string against the context
    pub fn render(&self, template: &str, context: &TemplateContext) -> Result<String, RenderError> {
        Ok(self.env.render_str(template, context)?)
    }
}

/// `{{ value | date(format) }}`
///
/// Accepts milliseconds since the epoch, an RFC 3339 timestamp, or a
/// `YYYY-MM-DD` date. An undefined or `none` value means "now". A format
/// without any `%` is read as moment tokens.
fn date_filter(value: Value, format: Option<String>) -> Result<String, minijinja::Error> {
    let timestamp = to_datetime(&value)?;
    let format = match format {
        Some(format) if !format.contains('%') => moment_to_strftime(&format),
        Some(format) => format,
        None => DEFAULT_DATE_FORMAT.to_string(),
    };

    let items: Vec<Item<'_>> = StrftimeItems::new(&format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("invalid date format {format:?}"),
        ));
    }

    let mut out = String::new();
    write!(out, "{}", timestamp.format_with_items(items.into_iter())).map_err(|_| {
        minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("cannot format date with {format:?}"),
        )
    })?;
    Ok(out)
}

/// Rewrites moment tokens as strftime; `[text]` is kept literally
fn moment_to_strftime(format: &str) -> String {
    let mut out = String::with_capacity(format.len() * 2);
    let mut rest = format;

    while let Some(c) = rest.chars().next() {
        if c == '[' {
            if let Some(end) = rest.find(']') {
                out.push_str(&rest[1..end]);
                rest = &rest[end + 1..];
                continue;
            }
        }

        match MOMENT_TOKENS.iter().find(|(token, _)| rest.starts_with(token)) {
            Some((token, pattern)) => {
                out.push_str(pattern);
                rest = &rest[token.len()..];
            }
            None => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    out
}

fn to_datetime(value: &Value) -> Result<DateTime<Utc>, minijinja::Error> {
    if value.is_undefined() || value.is_none() {
        return Ok(Utc::now());
    }

    if let Some(text) = value.as_str() {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
            return Ok(parsed.with_timezone(&Utc));
        }
        if let Some(midnight) = NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Ok(midnight.and_utc());
        }
        return Err(minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("cannot parse {text:?} as a date"),
        ));
    }

    let millis = i64::try_from(value.clone()).map_err(|_| {
        minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("date filter expects a timestamp, got {}", value.kind()),
        )
    })?;

    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("timestamp {millis} is out of range"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::RepoRef;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn context() -> TemplateContext {
        let mut env = BTreeMap::new();
        env.insert("GREETING".to_string(), "hello".to_string());
        TemplateContext::new(
            RepoRef::new("octo", "widgets"),
            env,
            Utc.with_ymd_and_hms(2024, 3, 9, 12, 30, 0).unwrap(),
        )
    }

    #[test]
    fn renders_variables() {
        let renderer = TemplateRenderer::new();
        let out = renderer
            .render("{{ env.GREETING }} from {{ repo.owner }}/{{ repo.repo }}", &context())
            .unwrap();
        assert_eq!(out, "hello from octo/widgets");
    }

    #[test]
    fn no_html_escaping() {
        let renderer = TemplateRenderer::new();
        let mut ctx = context();
        ctx.env.insert("HTML".to_string(), "<b>&</b>".to_string());

        let out = renderer.render("{{ env.HTML }}", &ctx).unwrap();
        assert_eq!(out, "<b>&</b>");
    }

    #[test]
    fn date_filter_formats_run_timestamp() {
        let renderer = TemplateRenderer::new();
        let out = renderer
            .render("Generated on {{ date | date(\"%Y-%m-%d\") }}", &context())
            .unwrap();
        assert_eq!(out, "Generated on 2024-03-09");
    }

    #[test]
    fn date_filter_accepts_moment_tokens() {
        let renderer = TemplateRenderer::new();
        let out = renderer
            .render("Generated on {{ date | date(\"YYYY-MM-DD\") }}", &context())
            .unwrap();
        assert_eq!(out, "Generated on 2024-03-09");

        let out = renderer
            .render("{{ date | date(\"dddd, MMMM D YYYY [at] HH:mm\") }}", &context())
            .unwrap();
        assert_eq!(out, "Saturday, March 9 2024 at 12:30");

        let out = renderer
            .render("{{ date | date(\"ddd DD MMM YY h:mm a Z\") }}", &context())
            .unwrap();
        assert_eq!(out, "Sat 09 Mar 24 12:30 pm +00:00");
    }

    #[test]
    fn moment_tokens_translate_longest_first() {
        assert_eq!(moment_to_strftime("YYYY-MM-DDTHH:mm:ssZ"), "%Y-%m-%dT%H:%M:%S%:z");
        assert_eq!(moment_to_strftime("M/D/YY"), "%-m/%-d/%y");
        assert_eq!(moment_to_strftime("[Week of] MMM"), "Week of %b");
    }

    #[test]
    fn date_filter_default_format() {
        let renderer = TemplateRenderer::new();
        let out = renderer.render("{{ date | date }}", &context()).unwrap();
        assert_eq!(out, "2024-03-09T12:30:00+00:00");
    }

    #[test]
    fn date_filter_parses_strings() {
        let renderer = TemplateRenderer::new();
        let out = renderer
            .render("{{ \"2023-12-25\" | date(\"%d/%m/%Y\") }}", &context())
            .unwrap();
        assert_eq!(out, "25/12/2023");
    }

    #[test]
    fn date_filter_rejects_bad_format() {
        let renderer = TemplateRenderer::new();
        let result = renderer.render("{{ date | date(\"%Q\") }}", &context());
        assert!(result.is_err());
    }

    #[test]
    fn keeps_trailing_newline() {
        let renderer = TemplateRenderer::new();
        let out = renderer.render("line\n", &context()).unwrap();
        assert_eq!(out, "line\n");
    }

    #[test]
    fn undefined_variables_render_empty() {
        let renderer = TemplateRenderer::new();
        let out = renderer.render("[{{ env.MISSING }}]", &context()).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn syntax_error_is_reported() {
        let renderer = TemplateRenderer::new();
        let result = renderer.render("{% if %}", &context());
        assert!(matches!(result, Err(RenderError::Template(_))));
    }
}
