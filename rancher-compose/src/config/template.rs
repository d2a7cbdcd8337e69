//! Text-level template expansion of compose files.
//!
//! Before a compose file is parsed as YAML it is rendered with `tera`,
//! exposing the stack and environment it is being deployed into:
//!
//! ```yaml
//! web:
//!   image: "nginx:{{ Stack.Version }}"
//!   labels:
//!     env: "{{ Environment.Name }}"
//! ```
//!
//! Catalog files written for Go templates reference the same values with a
//! leading dot (`{{ .Stack.Name }}`). That dot is dropped inside template
//! markers before rendering, so both spellings work.

use serde::Serialize;
use tera::{Context, Tera};

use crate::error::{Error, Result};

/// The stack a compose file is rendered for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackInfo {
    /// Stack name.
    pub name: String,
    /// Version being deployed.
    pub version: String,
    /// Version currently deployed, if upgrading.
    pub previous_version: String,
}

/// The environment a compose file is rendered for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnvironmentInfo {
    /// Environment name.
    pub name: String,
    /// Environment identifier.
    pub uuid: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TemplateContext<'a> {
    stack: &'a StackInfo,
    environment: &'a EnvironmentInfo,
}

/// Returns true when `contents` opts out of templating or has no template markers.
fn skip_templating(contents: &str) -> bool {
    let opted_out = contents
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .is_some_and(|line| line == "# notemplating" || line == "#notemplating");
    opted_out || !(contents.contains("{{") || contents.contains("{%"))
}

/// Drops the leading dot of Go-template field references inside markers.
///
/// Only a dot that starts a field path is removed: `{{ .Stack.Name }}`
/// becomes `{{ Stack.Name }}` while `Stack.Name`, `1.5` and dots inside
/// string literals are kept.
fn strip_go_dots(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        let (before, tail) = rest.split_at(open);
        out.push_str(before);
        let close = match tail.get(..2) {
            Some("{{") => "}}",
            Some("{%") => "%}",
            _ => {
                out.push('{');
                rest = &tail[1..];
                continue;
            }
        };
        let Some(end) = tail[2..].find(close) else {
            out.push_str(tail);
            return out;
        };
        let inner = &tail[2..2 + end];
        out.push_str(&tail[..2]);

        let mut quote = None;
        let mut prev = ' ';
        let mut chars = inner.chars().peekable();
        while let Some(c) = chars.next() {
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if c == '"' || c == '\'' => quote = Some(c),
                None if c == '.'
                    && (prev.is_whitespace() || matches!(prev, '(' | ','))
                    && chars.peek().is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') =>
                {
                    prev = c;
                    continue;
                }
                None => {}
            }
            out.push(c);
            prev = c;
        }

        out.push_str(close);
        rest = &tail[2 + end + close.len()..];
    }
    out.push_str(rest);
    out
}

fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Renders `contents` against the stack and environment.
///
/// Files whose first non-blank line is `# notemplating`, and files without
/// any `{{` or `{%` markers, are returned unchanged.
///
/// # Errors
///
/// Returns [`Error::Template`] if the contents are not UTF-8 or fail to render.
///
/// # Examples
///
/// ```
/// use rancher_compose::config::template::{apply_template, EnvironmentInfo, StackInfo};
///
/// let stack = StackInfo { name: "shop".into(), version: "2".into(), ..Default::default() };
/// let out = apply_template(b"web:\n  image: app:{{ Stack.Version }}\n", &stack, &EnvironmentInfo::default()).unwrap();
/// assert_eq!(out, b"web:\n  image: app:2\n");
/// ```
pub fn apply_template(
    contents: &[u8],
    stack: &StackInfo,
    environment: &EnvironmentInfo,
) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(contents).map_err(|e| Error::Template {
        message: format!("compose file is not valid UTF-8: {e}"),
    })?;
    if skip_templating(text) {
        log::debug!("templating skipped");
        return Ok(contents.to_vec());
    }

    let context = Context::from_serialize(TemplateContext { stack, environment }).map_err(|e| {
        Error::Template {
            message: describe(&e),
        }
    })?;
    let rendered =
        Tera::one_off(&strip_go_dots(text), &context, false).map_err(|e| Error::Template {
            message: describe(&e),
        })?;
    log::debug!("templated compose file for stack '{}'", stack.name);
    Ok(rendered.into_bytes())
}
