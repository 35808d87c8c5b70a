//! Minimal systemd unit file builder.

use regex::Regex;

/// Arguments matching this need double quotes on an `Exec*=` line.
const NEEDS_QUOTES_RE: &str = r#"[\s"'\\;\p{Cc}]"#;

#[derive(Debug, Clone)]
enum SectionBody {
    Entries(Vec<(String, String)>),
    Raw(String),
}

#[derive(Debug, Clone)]
struct Section {
    name: String,
    body: SectionBody,
}

/// Sections render in the order they were first touched; keys within a
/// section keep insertion order and may repeat (`Before=` per target).
#[derive(Debug, Clone, Default)]
pub struct UnitManifest {
    sections: Vec<Section>,
}

impl UnitManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        let entry = (key.to_string(), value.into());
        match self.sections.iter_mut().find(|s| s.name == section) {
            Some(Section {
                body: SectionBody::Entries(entries),
                ..
            }) => entries.push(entry),
            Some(existing) => existing.body = SectionBody::Entries(vec![entry]),
            None => self.sections.push(Section {
                name: section.to_string(),
                body: SectionBody::Entries(vec![entry]),
            }),
        }
    }

    /// Use `content` verbatim as the body of `section`.
    pub fn set_raw(&mut self, section: &str, content: impl Into<String>) {
        let body = SectionBody::Raw(content.into());
        match self.sections.iter_mut().find(|s| s.name == section) {
            Some(existing) => existing.body = body,
            None => self.sections.push(Section {
                name: section.to_string(),
                body,
            }),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push('[');
            out.push_str(&section.name);
            out.push_str("]\n");
            match &section.body {
                SectionBody::Entries(entries) => {
                    for (key, value) in entries {
                        out.push_str(key);
                        out.push('=');
                        out.push_str(value);
                        out.push('\n');
                    }
                }
                SectionBody::Raw(raw) => {
                    out.push_str(raw);
                    if !raw.ends_with('\n') {
                        out.push('\n');
                    }
                }
            }
        }
        out
    }
}

/// Joins argv into a single systemd `Exec*=` command line.
pub struct CommandEscaper {
    needs_quotes: Regex,
}

impl CommandEscaper {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            needs_quotes: Regex::new(NEEDS_QUOTES_RE)?,
        })
    }

    pub fn escape_arg(&self, arg: &str) -> String {
        // systemd expands both specifiers and variables, even unquoted.
        let doubled = arg.replace('%', "%%").replace('$', "$$");
        if !arg.is_empty() && !self.needs_quotes.is_match(arg) {
            return doubled;
        }

        // Inside quotes systemd reads C escapes, so a control character
        // must never reach the unit file raw.
        let mut out = String::with_capacity(doubled.len() + 2);
        out.push('"');
        for c in doubled.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                '\t' => out.push_str("\\t"),
                '\r' => out.push_str("\\r"),
                c if c.is_ascii_control() => out.push_str(&format!("\\x{:02x}", u32::from(c))),
                c if c.is_control() => out.push_str(&format!("\\u{:04x}", u32::from(c))),
                c => out.push(c),
            }
        }
        out.push('"');
        out
    }

    pub fn escape_command<S: AsRef<str>>(&self, argv: &[S]) -> String {
        argv.iter()
            .map(|arg| self.escape_arg(arg.as_ref()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
