//! Turning an [`ArchiveRecord`] into a package page.
//!
//! A page is a `+++` fenced TOML front matter block followed by a JSON array
//! of typed content blocks: a header, a sidebar holding the field table, the
//! package summary and the verbatim `dpkg-deb` output.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::control::{ParsedControl, MAINTAINER_MAIL, MAINTAINER_NAME};
use crate::error::RenderError;
use crate::record::ArchiveRecord;

/// Identifies pages produced by this crate.
pub const TAG: &str = "local-deb-info";

/// Format name recorded in the front matter.
pub const FORMAT: &str = "njn";

/// Language recorded in the front matter.
pub const LANGUAGE: &str = "en";

/// Link text used when the maintainer has no usable email address.
pub const MISSING: &str = "(missing)";

/// How a control field is shown in the field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStyle {
    /// Plain text.
    Text,
    /// External link opened in a new window.
    Link,
    /// `mailto:` link labelled with the maintainer's name.
    Mailto,
    /// Not shown.
    Hidden,
}

/// Fields with a style other than [`FieldStyle::Text`].
const FIELD_STYLES: &[(&str, FieldStyle)] = &[
    ("Homepage", FieldStyle::Link),
    ("Maintainer", FieldStyle::Mailto),
    (MAINTAINER_NAME, FieldStyle::Hidden),
    (MAINTAINER_MAIL, FieldStyle::Hidden),
    ("Installed-Size", FieldStyle::Hidden),
];

/// Style used for `key`.
pub fn field_style(key: &str) -> FieldStyle {
    FIELD_STYLES
        .iter()
        .find(|(name, _)| *name == key)
        .map_or(FieldStyle::Text, |(_, style)| *style)
}

/// Escape text for embedding in a double-quoted string.
pub fn escape_quotes(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\\' => output.push_str(r"\\"),
            '"' => output.push_str(r#"\""#),
            '\n' => output.push_str(r"\n"),
            '\r' => output.push_str(r"\r"),
            '\t' => output.push_str(r"\t"),
            c => output.push(c),
        }
    }
    output
}

fn field_value(parsed: &ParsedControl, key: &str, value: &str) -> Option<Value> {
    match field_style(key) {
        FieldStyle::Hidden => None,
        FieldStyle::Text => Some(json!(value)),
        FieldStyle::Link => Some(json!({
            "type": "a",
            "href": value,
            "text": [value],
            "target": "_blank",
        })),
        FieldStyle::Mailto => Some(match parsed.maintainer_email() {
            Some(mail) => json!({
                "type": "a",
                "href": format!("mailto:{}", mail),
                "text": [parsed.maintainer_name().unwrap_or(mail)],
            }),
            None => json!(MISSING),
        }),
    }
}

/// The field table, one row per visible field in report order.
pub fn field_table(parsed: &ParsedControl) -> Value {
    let rows: Vec<Value> = parsed
        .fields()
        .filter_map(|(key, value)| {
            let value = field_value(parsed, key, value)?;
            Some(json!({
                "type": "tr",
                "data": [
                    {"type": "td", "text": [{"type": "b", "text": [key]}]},
                    {"type": "td", "text": [value]},
                ],
            }))
        })
        .collect();
    json!({"type": "table", "body": rows})
}

/// One `p` block per long description paragraph.
pub fn description_paragraphs(parsed: &ParsedControl) -> Vec<Value> {
    parsed
        .paragraphs()
        .into_iter()
        .map(|paragraph| json!({"type": "p", "text": [paragraph]}))
        .collect()
}

/// Lines of a report for a code block.
pub fn code_lines(report: &str) -> Vec<&str> {
    report.split('\n').collect()
}

/// Build the content blocks of a package page.
pub fn render_body(parsed: &ParsedControl, name: &str, raw_info: &str, raw_contents: &str) -> Value {
    let code: Vec<&str> = code_lines(raw_info)
        .into_iter()
        .chain(code_lines(raw_contents))
        .collect();

    json!([
        {
            "type": "header",
            "tag": "main-header",
            "profile": "outer--inner",
            "padding": "top",
            "margins": "bottom",
            "content": {"header": [name]},
        },
        {
            "tag": "main-sidebar",
            "type": "sidebar",
            "profile": "full--outer",
            "padding": "none",
            "margins": "bottom",
            "side": "right",
            "sticky": "true",
            "stack": "top",
            "jump-top": "true",
            "jump-link": "true",
            "content": {
                "aside": [{
                    "tag": "deb-fields",
                    "type": "content",
                    "profile": "full--full",
                    "content": {"section": [field_table(parsed)]},
                }],
                "blocks": [
                    {
                        "type": "content",
                        "tag": "package-summary",
                        "profile": "outer--inner",
                        "padding": "both",
                        "margins": "both",
                        "jump-top": "true",
                        "jump-link": "true",
                        "content": {
                            "header": [parsed.summary()],
                            "section": description_paragraphs(parsed),
                        },
                    },
                    {
                        "type": "content",
                        "tag": "dpkg-deb--info--contents",
                        "profile": "outer--inner",
                        "padding": "both",
                        "margins": "both",
                        "jump-top": "true",
                        "jump-link": "true",
                        "content": {
                            "header": ["dpkg-deb --info --contents"],
                            "section": [{"type": "code", "code": code}],
                        },
                    },
                ],
            },
        },
    ])
}

/// A rendered package page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageDocument {
    /// Tag of the producer, see [`TAG`].
    pub id: String,
    /// Absolute path of the archive the page describes.
    pub path: PathBuf,
    pub title: String,
    pub description: String,
    pub url: String,
    pub language: String,
    pub format: String,
    /// Structured content blocks.
    pub body: Value,
    /// Front matter followed by the serialized body.
    pub source: String,
    /// Short hash of `source`.
    pub shasum: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Per-page settings such as `CacheControl`.
    pub context: BTreeMap<String, String>,
}

impl PageDocument {
    /// Assemble a page from its parts, producing the source text and hash.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: &str,
        path: PathBuf,
        title: &str,
        description: &str,
        url: &str,
        body: Value,
        created_at: DateTime<Utc>,
        context: BTreeMap<String, String>,
    ) -> Result<Self, RenderError> {
        if url.is_empty() || !url.starts_with('/') {
            return Err(RenderError::Page {
                path: path.display().to_string(),
                message: format!("invalid url: {:?}", url),
            });
        }

        let mut source = format!(
            "+++\n\"title\" = \"{}\"\n\"description\" = \"{}\"\n\"url\" = \"{}\"\n\"format\" = \"{}\"\n\"language\" = \"{}\"\n+++\n",
            escape_quotes(title),
            escape_quotes(description),
            escape_quotes(url),
            FORMAT,
            LANGUAGE,
        );
        source.push_str(&serde_json::to_string_pretty(&body)?);

        let shasum = hex::encode(Sha256::digest(source.as_bytes()))[..10].to_string();

        Ok(Self {
            id: id.to_string(),
            path,
            title: title.to_string(),
            description: description.to_string(),
            url: url.to_string(),
            language: LANGUAGE.to_string(),
            format: FORMAT.to_string(),
            body,
            source,
            shasum,
            created_at,
            updated_at: created_at,
            context,
        })
    }

    /// The serialized body.
    pub fn body_markup(&self) -> String {
        self.body.to_string()
    }

    /// The front matter block, without the fences.
    pub fn front_matter(&self) -> &str {
        self.source
            .strip_prefix("+++\n")
            .and_then(|rest| rest.split_once("\n+++\n"))
            .map_or("", |(matter, _)| matter)
    }
}

/// Render the package page for `record`.
pub fn render_page(
    record: &ArchiveRecord,
    context: &BTreeMap<String, String>,
) -> Result<PageDocument, RenderError> {
    let parsed = record.parse();
    let name = record.base_name();
    let body = render_body(&parsed, &name, record.raw_info(), record.raw_contents());

    PageDocument::new(
        TAG,
        record.source_path().to_path_buf(),
        &name,
        &format!("Debian package details for {}", name),
        &record.public_url(),
        body,
        Utc::now(),
        context.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::MountPoint;

    const INFO: &str = " new Debian package, version 2.0.
 Package: example
 Version: 1.0
 Maintainer: Jane Doe <jane@example.com>
 Installed-Size: 12
 Homepage: https://example.com/?q=\"x\"
 Description: an \"example\" package
  First line.
  .
  Second paragraph
  continued.
";

    const CONTENTS: &str = "drwxr-xr-x root/root         0 2024-01-01 00:00 ./
-rw-r--r-- root/root        42 2024-01-01 00:00 ./usr/share/doc/example/\"quoted\"
";

    fn record() -> ArchiveRecord {
        ArchiveRecord::new(
            MountPoint::new("/srv/debs", "/apt"),
            "example_1.0_amd64.deb",
            INFO.to_string(),
            CONTENTS.to_string(),
        )
    }

    fn rows(table: &Value) -> &Vec<Value> {
        table["body"].as_array().unwrap()
    }

    #[test]
    fn test_field_styles() {
        assert_eq!(field_style("Homepage"), FieldStyle::Link);
        assert_eq!(field_style("Maintainer"), FieldStyle::Mailto);
        assert_eq!(field_style("Installed-Size"), FieldStyle::Hidden);
        assert_eq!(field_style(MAINTAINER_NAME), FieldStyle::Hidden);
        assert_eq!(field_style("Package"), FieldStyle::Text);
    }

    #[test]
    fn test_escape_quotes() {
        assert_eq!(escape_quotes(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(escape_quotes("a\nb"), r"a\nb");
        assert_eq!(escape_quotes(r"back\slash"), r"back\\slash");
        let escaped = escape_quotes("tab\there \"quote\"\r\nnext");
        let parsed: String = serde_json::from_str(&format!("\"{}\"", escaped)).unwrap();
        assert_eq!(parsed, "tab\there \"quote\"\r\nnext");
    }

    #[test]
    fn test_field_table_rows() {
        let parsed = ParsedControl::parse(INFO);
        let table = field_table(&parsed);
        let excluded = parsed
            .keys()
            .iter()
            .filter(|key| field_style(key) == FieldStyle::Hidden)
            .count();
        assert_eq!(rows(&table).len(), parsed.len() - excluded);
        let keys: Vec<&str> = rows(&table)
            .iter()
            .map(|row| row["data"][0]["text"][0]["text"][0].as_str().unwrap())
            .collect();
        assert_eq!(
            keys,
            vec!["Package", "Version", "Maintainer", "Homepage", "Description"]
        );
    }

    #[test]
    fn test_field_table_links() {
        let parsed = ParsedControl::parse(INFO);
        let table = field_table(&parsed);
        let maintainer = &rows(&table)[2]["data"][1]["text"][0];
        assert_eq!(maintainer["href"], "mailto:jane@example.com");
        assert_eq!(maintainer["text"][0], "Jane Doe");
        let homepage = &rows(&table)[3]["data"][1]["text"][0];
        assert_eq!(homepage["href"], "https://example.com/?q=\"x\"");
        assert_eq!(homepage["target"], "_blank");
    }

    #[test]
    fn test_maintainer_fallbacks() {
        let parsed = ParsedControl::parse("Maintainer: nobody\n");
        let table = field_table(&parsed);
        assert_eq!(rows(&table)[0]["data"][1]["text"][0], MISSING);
    }

    #[test]
    fn test_render_page() {
        let page = render_page(&record(), &BTreeMap::new()).unwrap();
        assert_eq!(page.id, TAG);
        assert_eq!(page.title, "example_1.0_amd64.deb");
        assert_eq!(page.url, "/apt/example_1.0_amd64.deb");
        assert_eq!(page.path, PathBuf::from("/srv/debs/example_1.0_amd64.deb"));
        assert_eq!(page.shasum.len(), 10);

        let summary = &page.body[1]["content"]["blocks"][0]["content"];
        assert_eq!(summary["header"][0], "an \"example\" package");
        assert_eq!(summary["section"][0]["text"][0], "First line.");
        assert_eq!(summary["section"][1]["text"][0], "Second paragraph continued.");

        let code = page.body[1]["content"]["blocks"][1]["content"]["section"][0]["code"]
            .as_array()
            .unwrap();
        let info_lines = INFO.split('\n').count();
        assert_eq!(code.len(), info_lines + CONTENTS.split('\n').count());
        assert_eq!(
            code[info_lines + 1],
            "-rw-r--r-- root/root        42 2024-01-01 00:00 ./usr/share/doc/example/\"quoted\""
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let first = render_page(&record(), &BTreeMap::new()).unwrap();
        let second = render_page(&record(), &BTreeMap::new()).unwrap();
        assert_eq!(first.body_markup(), second.body_markup());
        assert_eq!(first.source, second.source);
        assert_eq!(first.shasum, second.shasum);
    }

    #[test]
    fn test_source_round_trips() {
        let record = ArchiveRecord::new(
            MountPoint::new("/srv/debs", "/apt"),
            "we\"ird\nname.deb",
            INFO.to_string(),
            CONTENTS.to_string(),
        );
        let page = render_page(&record, &BTreeMap::new()).unwrap();

        let matter: toml::Table = toml::from_str(page.front_matter()).unwrap();
        assert_eq!(matter["title"].as_str(), Some("we\"ird\nname.deb"));
        assert_eq!(matter["format"].as_str(), Some(FORMAT));

        let (_, body) = page.source.split_once("\n+++\n").unwrap();
        let body: Value = serde_json::from_str(body).unwrap();
        assert_eq!(body, page.body);
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = PageDocument::new(
            TAG,
            PathBuf::from("/srv/debs/x.deb"),
            "x.deb",
            "",
            "",
            json!([]),
            Utc::now(),
            BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::Page { .. }));
    }
}
