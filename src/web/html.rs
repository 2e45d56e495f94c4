use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};

const STYLE: &str = "
body { font-family: sans-serif; margin: 2em; }
nav a { margin-right: 1em; }
table { border-collapse: collapse; width: 100%; margin-top: 1em; }
th, td { border: 1px solid #ccc; padding: 4px 8px; text-align: left; vertical-align: top; }
tr.differs td.parsed { color: #b00; }
form.inline { display: inline; }
.muted { color: #777; }
";

/// Wrap a body fragment in the shared page chrome.
pub fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title><style>{STYLE}</style></head>\
         <body><nav><a href=\"/\">Matches</a><a href=\"/incorrect-tracks\">Incorrect tags</a>\
         <a href=\"/unmatched_tracks\">Unmatched</a><a href=\"/unrated\">Unrated</a>\
         <a href=\"/search\">Search</a></nav><h1>{title}</h1>{body}</body></html>",
        title = escape_html(title),
    )
}

pub fn html_response(status: StatusCode, body: String) -> Response {
    let mut response = Html(body).into_response();
    *response.status_mut() = status;
    response
}

pub fn html_error(status: StatusCode, message: &str) -> Response {
    let body = format!("<p class=\"error\">{}</p>", escape_html(message));
    html_response(status, page(&format!("Error {}", status.as_u16()), &body))
}

pub fn redirect_to(path: &str) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::SEE_OTHER;
    let location = HeaderValue::from_str(path).unwrap_or_else(|_| HeaderValue::from_static("/"));
    response.headers_mut().insert(header::LOCATION, location);
    response
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape an optional tag, rendering `None` as an empty cell.
pub fn opt(value: Option<&str>) -> String {
    value.map(escape_html).unwrap_or_default()
}

/// iTunes/OwnTone ratings are 0-100 in steps of 20.
pub fn stars(rating: Option<i64>) -> String {
    match rating {
        Some(r) if r > 0 => {
            let n = (r.saturating_add(10) / 20).clamp(0, 5) as usize;
            format!("{}{}", "★".repeat(n), "☆".repeat(5 - n))
        }
        _ => "<span class=\"muted\">unrated</span>".to_string(),
    }
}

/// `<select>` with an empty "all" option followed by `values`.
pub fn select(name: &str, values: &[String], selected: Option<&str>) -> String {
    let mut out = format!("<select name=\"{name}\"><option value=\"\">All</option>");
    for v in values {
        let sel = if Some(v.as_str()) == selected { " selected" } else { "" };
        let v = escape_html(v);
        out.push_str(&format!("<option value=\"{v}\"{sel}>{v}</option>"));
    }
    out.push_str("</select>");
    out
}
