//! Server-rendered HTML pages
//!
//! The admin pages are minimal shells for a client-side dashboard; the
//! public profile page is rendered in full so it works without scripts.

use crate::models::{AdminIdentity, PublicProfile};

/// Escape text for HTML element content and quoted attribute values
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        body
    )
}

/// Shell for a client-rendered page
pub fn shell(page: &str, title: &str) -> String {
    layout(
        title,
        &format!("<div id=\"app\" data-page=\"{}\"></div>", escape_html(page)),
    )
}

pub fn home_page() -> String {
    layout(
        "VicDan",
        "<main>\n<h1>VicDan</h1>\n<p>One page for all your links.</p>\n\
         <p><a href=\"/login\">Sign in</a> or <a href=\"/register-admin\">create an account</a>.</p>\n</main>",
    )
}

pub fn dashboard_page(admin: &AdminIdentity) -> String {
    layout(
        "VicDan - Dashboard",
        &format!(
            "<div id=\"app\" data-page=\"dashboard\" data-admin-id=\"{}\" data-admin-name=\"{}\"></div>",
            admin.id,
            escape_html(&admin.name)
        ),
    )
}

/// Full public page for a published profile
pub fn profile_page(profile: &PublicProfile) -> String {
    let mut body = String::from("<main class=\"profile\">\n");

    if let Some(logo) = &profile.logo_url {
        body.push_str(&format!(
            "<img class=\"logo\" src=\"{}\" alt=\"{}\">\n",
            escape_html(logo),
            escape_html(&profile.name)
        ));
    }

    body.push_str(&format!("<h1>{}</h1>\n", escape_html(&profile.name)));

    if let Some(description) = &profile.description {
        body.push_str(&format!("<p class=\"description\">{}</p>\n", escape_html(description)));
    }

    if let Some(email) = &profile.email {
        body.push_str(&format!(
            "<p class=\"email\"><a href=\"mailto:{0}\">{0}</a></p>\n",
            escape_html(email)
        ));
    }

    if !profile.links.is_empty() {
        body.push_str("<ul class=\"links\">\n");
        for link in &profile.links {
            body.push_str(&format!(
                "<li><a href=\"{}\" rel=\"noopener\">{}</a></li>\n",
                escape_html(&link.url),
                escape_html(&link.title)
            ));
        }
        body.push_str("</ul>\n");
    }

    if let Some(qr) = &profile.qr_url {
        body.push_str(&format!(
            "<img class=\"qr\" src=\"{}\" alt=\"QR code\">\n",
            escape_html(qr)
        ));
    }

    body.push_str("</main>");
    layout(&profile.name, &body)
}

pub fn not_found_page() -> String {
    layout(
        "VicDan - Not found",
        "<main>\n<h1>Not found</h1>\n<p>This page does not exist.</p>\n</main>",
    )
}
