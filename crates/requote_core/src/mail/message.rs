//! Quote mail rendering.
//!
//! Layout: quote text, then `author, source` right-aligned (source linked
//! when a search link exists), then a footer link back to the site.

use crate::config::CoreConfig;
use crate::model::quote::Quote;
use serde::{Deserialize, Serialize};

const UNSOURCED_LABEL: &str = "(unsourced)";

/// Presentation settings for outgoing mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub subject: String,
    pub site_url: String,
}

impl From<&CoreConfig> for MailSettings {
    fn from(config: &CoreConfig) -> Self {
        Self {
            subject: config.email_subject.clone(),
            site_url: config.site_url.clone(),
        }
    }
}

/// A rendered message, ready for any transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteEmail {
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Renders one quote as a plain-text + HTML message.
pub fn compose_quote_email(quote: &Quote, settings: &MailSettings) -> QuoteEmail {
    QuoteEmail {
        subject: settings.subject.clone(),
        text_body: render_text(quote, settings),
        html_body: render_html(quote, settings),
    }
}

fn render_text(quote: &Quote, settings: &MailSettings) -> String {
    let attribution = match &quote.source {
        Some(source) => format!("{}, {}", quote.author, source),
        None => format!("{}, {UNSOURCED_LABEL}", quote.author),
    };
    let mut body = format!("{}\n\n    - {attribution}\n", quote.content);
    if let Some(link) = &quote.source_link {
        body.push_str(&format!("\nFind the book: {link}\n"));
    }
    body.push_str(&format!(
        "\nVisit reQuote for more inspiration: {}\n",
        settings.site_url
    ));
    body
}

fn render_html(quote: &Quote, settings: &MailSettings) -> String {
    let source_html = match (&quote.source, &quote.source_link) {
        (Some(source), Some(link)) => format!(
            r#"<a href="{}" target="_blank" rel="noopener noreferrer" style="font-style: italic; color: #2196F3; text-decoration: none;">{}</a>"#,
            escape_html(link),
            escape_html(source)
        ),
        (Some(source), None) => format!(
            r#"<span style="font-style: italic; color: #777;">{}</span>"#,
            escape_html(source)
        ),
        (None, _) => {
            format!(r#"<span style="font-style: italic; color: #777;">{UNSOURCED_LABEL}</span>"#)
        }
    };

    format!(
        concat!(
            r#"<div style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; padding: 20px; border: 1px solid #ddd; border-radius: 10px; max-width: 800px; margin: 0 auto;">"#,
            r#"<p style="font-size: 1.4em; margin: 0 0 10px 0; padding: 0 10px;">{content}</p>"#,
            r#"<p style="font-size: 1.2em; text-align: right; margin: 0; padding-right: 100px;">"#,
            r#"<span style="font-weight: bold;">{author}, </span>{source}</p>"#,
            r#"<hr style="border: none; border-top: 1px solid #ddd; margin: 20px 0;">"#,
            r#"<p style="text-align: center; font-size: 0.9rem;"><a href="{site}" style="color: #2196F3; text-decoration: none;">Visit reQuote for more inspiration!</a></p>"#,
            r#"</div>"#
        ),
        content = escape_html(&quote.content),
        author = escape_html(&quote.author),
        source = source_html,
        site = escape_html(&settings.site_url),
    )
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::{compose_quote_email, MailSettings};
    use crate::model::quote::{Quote, QuoteDraft};
    use uuid::Uuid;

    fn settings() -> MailSettings {
        MailSettings {
            subject: "Your Morning Quote".to_string(),
            site_url: "https://requote.example".to_string(),
        }
    }

    #[test]
    fn sourced_quote_links_source_in_html() {
        let mut quote = Quote::new(Uuid::new_v4(), "x", "y");
        let draft = QuoteDraft::new(
            "The obstacle is the way.",
            "Marcus Aurelius",
            Some("Meditations".to_string()),
        )
        .unwrap();
        quote.apply_draft(&draft, "");

        let email = compose_quote_email(&quote, &settings());
        assert_eq!(email.subject, "Your Morning Quote");
        assert!(email.html_body.contains("The obstacle is the way."));
        assert!(email
            .html_body
            .contains(r#"<a href="https://www.amazon.com/s?k=Marcus%20Aurelius%20Meditations""#));
        assert!(email.text_body.contains("Marcus Aurelius, Meditations"));
        assert!(email.text_body.contains("https://requote.example"));
    }

    #[test]
    fn unsourced_quote_is_labelled() {
        let quote = Quote::new(Uuid::new_v4(), "Stay curious.", "Anon");
        let email = compose_quote_email(&quote, &settings());
        assert!(email.html_body.contains("(unsourced)"));
        assert!(email.text_body.contains("Anon, (unsourced)"));
    }

    #[test]
    fn user_text_is_html_escaped() {
        let quote = Quote::new(Uuid::new_v4(), "<b>bold</b> & \"quoted\"", "O'Neil");
        let email = compose_quote_email(&quote, &settings());
        assert!(email
            .html_body
            .contains("&lt;b&gt;bold&lt;/b&gt; &amp; &quot;quoted&quot;"));
        assert!(email.html_body.contains("O&#39;Neil"));
        assert!(!email.html_body.contains("<b>bold</b>"));
    }
}
