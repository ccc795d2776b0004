use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use debinfo::catalog::{PageServer, CACHE_CONTROL_KEY, DEFAULT_CACHE_CONTROL};
use debinfo::error::RenderError;
use debinfo::render::PageDocument;
use serde::Serialize;
use serde_json::Value;
use tera::{Context, Tera};

const PACKAGE_TEMPLATE: &str = "package.html";

/// Page context key holding the site name shown in titles.
pub const SITE_NAME_KEY: &str = "SiteName";

static NULL: Value = Value::Null;

/// One row of the field table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRow {
    pub key: String,
    pub text: String,
    pub href: Option<String>,
    pub external: bool,
}

/// What the package template needs from a [`PageDocument`].
#[derive(Debug, Serialize)]
pub struct PackageView<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub url: &'a str,
    pub language: &'a str,
    pub site_name: Option<&'a str>,
    pub fields: Vec<FieldRow>,
    pub summary: String,
    pub paragraphs: Vec<String>,
    pub listing: String,
}

fn find_block<'v>(blocks: &'v Value, tag: &str) -> &'v Value {
    blocks
        .as_array()
        .and_then(|blocks| blocks.iter().find(|block| block["tag"] == tag))
        .unwrap_or(&NULL)
}

fn first_text(value: &Value) -> Option<String> {
    value["text"][0].as_str().map(str::to_string)
}

/// Link schemes allowed in package metadata.
const SAFE_SCHEMES: &[&str] = &["http://", "https://", "mailto:"];

/// `href` if it uses one of [`SAFE_SCHEMES`].
pub fn safe_href(href: &str) -> Option<&str> {
    let lower = href.trim_start().to_ascii_lowercase();
    SAFE_SCHEMES
        .iter()
        .any(|scheme| lower.starts_with(scheme))
        .then_some(href)
}

fn field_row(row: &Value) -> Option<FieldRow> {
    let key = first_text(&row["data"][0]["text"][0])?;
    let value = &row["data"][1]["text"][0];
    match value {
        Value::String(text) => Some(FieldRow {
            key,
            text: text.clone(),
            href: None,
            external: false,
        }),
        Value::Object(_) => {
            let href = value["href"].as_str().and_then(safe_href);
            Some(FieldRow {
                key,
                text: first_text(value)?,
                external: href.is_some() && value["target"] == "_blank",
                href: href.map(str::to_string),
            })
        }
        _ => None,
    }
}

fn strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

impl<'a> PackageView<'a> {
    pub fn from_page(page: &'a PageDocument) -> Self {
        let sidebar = &find_block(&page.body, "main-sidebar")["content"];
        let table = &find_block(&sidebar["aside"], "deb-fields")["content"]["section"][0];
        let summary = &find_block(&sidebar["blocks"], "package-summary")["content"];
        let report = &find_block(&sidebar["blocks"], "dpkg-deb--info--contents")["content"];

        let fields = table["body"]
            .as_array()
            .map(|rows| rows.iter().filter_map(field_row).collect())
            .unwrap_or_default();
        let paragraphs = summary["section"]
            .as_array()
            .map(|items| items.iter().filter_map(first_text).collect())
            .unwrap_or_default();

        Self {
            title: &page.title,
            description: &page.description,
            url: &page.url,
            language: &page.language,
            site_name: page.context.get(SITE_NAME_KEY).map(String::as_str),
            fields,
            summary: summary["header"][0].as_str().unwrap_or_default().to_string(),
            paragraphs,
            listing: strings(&report["section"][0]["code"]).join("\n"),
        }
    }
}

/// Serves package pages as HTML through tera.
pub struct TemplatePageServer {
    tera: Tera,
}

impl TemplatePageServer {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_template(
            PACKAGE_TEMPLATE,
            include_str!("../templates/package.html"),
        )?;
        Ok(Self { tera })
    }

    /// The HTML for `page`.
    pub fn render_html(&self, page: &PageDocument) -> Result<String, RenderError> {
        let context = Context::from_serialize(PackageView::from_page(page))
            .map_err(|e| RenderError::Template(e.to_string()))?;
        self.tera
            .render(PACKAGE_TEMPLATE, &context)
            .map_err(|e| RenderError::Template(e.to_string()))
    }
}

fn header_value(page: &PageDocument, value: &str) -> Result<HeaderValue, RenderError> {
    HeaderValue::from_str(value).map_err(|e| RenderError::Page {
        path: page.path.display().to_string(),
        message: format!("invalid header value {:?}: {}", value, e),
    })
}

impl PageServer for TemplatePageServer {
    type Response = Response;

    fn serve_page(&self, page: &PageDocument) -> Result<Response, RenderError> {
        let html = self.render_html(page)?;
        let cache_control = page
            .context
            .get(CACHE_CONTROL_KEY)
            .map_or(DEFAULT_CACHE_CONTROL, String::as_str);

        let mut response = Response::new(Body::from(html));
        *response.status_mut() = StatusCode::OK;
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        headers.insert(header::CACHE_CONTROL, header_value(page, cache_control)?);
        headers.insert(
            header::ETAG,
            header_value(page, &format!("\"{}\"", page.shasum))?,
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debinfo::mount::MountPoint;
    use debinfo::record::ArchiveRecord;
    use debinfo::render::render_page;
    use debinfo::test_utils::{sample_contents, sample_info};
    use std::collections::BTreeMap;

    fn page(context: BTreeMap<String, String>) -> PageDocument {
        let record = ArchiveRecord::new(
            MountPoint::new("/srv/debs", "/apt"),
            "example_1.0_amd64.deb",
            sample_info("example", "1.0"),
            sample_contents("example"),
        );
        render_page(&record, &context).unwrap()
    }

    #[test]
    fn test_package_view() {
        let page = page(BTreeMap::new());
        let view = PackageView::from_page(&page);
        assert_eq!(view.title, "example_1.0_amd64.deb");
        assert_eq!(view.summary, "the example example package");
        assert_eq!(view.paragraphs.len(), 2);
        assert!(view.site_name.is_none());

        let keys: Vec<_> = view.fields.iter().map(|f| f.key.as_str()).collect();
        assert!(keys.contains(&"Package"));
        assert!(!keys.contains(&"Installed-Size"));

        let maintainer = view.fields.iter().find(|f| f.key == "Maintainer").unwrap();
        assert_eq!(maintainer.text, "Jane Doe");
        assert_eq!(maintainer.href.as_deref(), Some("mailto:jane@example.com"));
        assert!(!maintainer.external);

        let homepage = view.fields.iter().find(|f| f.key == "Homepage").unwrap();
        assert!(homepage.external);

        assert!(view.listing.contains("Package: example"));
        assert!(view.listing.contains("./usr/bin/example"));
    }

    #[test]
    fn test_serve_page() {
        let mut context = BTreeMap::new();
        context.insert(SITE_NAME_KEY.to_string(), "Apt Enjin".to_string());
        context.insert(CACHE_CONTROL_KEY.to_string(), "no-cache".to_string());
        let page = page(context);

        let server = TemplatePageServer::new().unwrap();
        let response = server.serve_page(&page).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(
            response.headers()[header::ETAG],
            format!("\"{}\"", page.shasum).as_str()
        );

        let html = server.render_html(&page).unwrap();
        assert!(html.contains("Apt Enjin"));
        assert!(html.contains("mailto:jane@example.com"));
        assert!(html.contains("It has two paragraphs."));
    }

    #[test]
    fn test_safe_href() {
        assert_eq!(safe_href("https://example.com/"), Some("https://example.com/"));
        assert_eq!(safe_href("HTTP://example.com/"), Some("HTTP://example.com/"));
        assert_eq!(safe_href("mailto:jane@example.com"), Some("mailto:jane@example.com"));
        assert_eq!(safe_href("javascript:alert(1)"), None);
        assert_eq!(safe_href(" JavaScript:alert(1)"), None);
        assert_eq!(safe_href("data:text/html,hi"), None);
        assert_eq!(safe_href("//example.com"), None);
    }

    #[test]
    fn test_unsafe_homepage_is_plain_text() {
        let record = ArchiveRecord::new(
            MountPoint::new("/srv/debs", "/apt"),
            "evil_1.0_all.deb",
            " Package: evil\n Homepage: javascript:alert(document.cookie)\n Description: evil\n  body\n"
                .to_string(),
            String::new(),
        );
        let page = render_page(&record, &BTreeMap::new()).unwrap();

        let view = PackageView::from_page(&page);
        let homepage = view.fields.iter().find(|f| f.key == "Homepage").unwrap();
        assert_eq!(homepage.href, None);
        assert!(!homepage.external);
        assert_eq!(homepage.text, "javascript:alert(document.cookie)");

        let html = TemplatePageServer::new().unwrap().render_html(&page).unwrap();
        assert!(!html.contains("href=\"javascript:"));
        assert!(html.contains("<td>javascript:alert(document.cookie)</td>"));
    }

    #[test]
    fn test_html_is_escaped() {
        let record = ArchiveRecord::new(
            MountPoint::new("/srv/debs", "/apt"),
            "evil_1.0_all.deb",
            " Package: evil\n Description: <script>alert(1)</script>\n  body\n".to_string(),
            String::new(),
        );
        let page = render_page(&record, &BTreeMap::new()).unwrap();
        let html = TemplatePageServer::new().unwrap().render_html(&page).unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
