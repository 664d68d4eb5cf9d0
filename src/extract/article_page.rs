//! Reading a standalone article page reached through a listing permalink.

use super::content::{assemble_content, date_text, text_of};
use super::selectors::{PAGE_CONTENT, PAGE_CONTENT_ENOUGH, PAGE_DATE, PAGE_TITLE};
use crate::utils::{char_len, normalize_text};
use scraper::Html;

/// Fields recovered from an article page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticlePage {
    pub title: Option<String>,
    pub content: String,
    pub date: Option<String>,
}

/// Parse an article page.
///
/// Content regions are tried best first; the first one assembling more than
/// [`PAGE_CONTENT_ENOUGH`] characters wins, otherwise the longest is kept.
/// `fallback_title` is used to filter the title out of the body when the
/// page has no heading of its own.
pub fn parse_article_page(html: &str, fallback_title: &str) -> ArticlePage {
    let document = Html::parse_document(html);

    let title = document
        .select(&PAGE_TITLE)
        .map(|el| normalize_text(&text_of(&el)))
        .find(|t| !t.is_empty());
    let body_title = title.as_deref().unwrap_or(fallback_title);

    let mut content = String::new();
    for selector in PAGE_CONTENT.iter() {
        let Some(region) = document.select(selector).next() else {
            continue;
        };
        let candidate = assemble_content(region, body_title);
        if char_len(&candidate) > char_len(&content) {
            content = candidate;
        }
        if char_len(&content) > PAGE_CONTENT_ENOUGH {
            break;
        }
    }

    let date = document.select(&PAGE_DATE).find_map(|el| date_text(&el));

    ArticlePage {
        title,
        content,
        date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_page_fields() {
        let html = r#"<html><body>
            <h1>City opens the new riverside library</h1>
            <time datetime="2024-05-02">May 2, 2024</time>
            <article>
              <p>The library opened its doors on Thursday after three years of construction work.</p>
              <p>More than two thousand visitors came on the first day, according to the city.</p>
            </article>
        </body></html>"#;
        let page = parse_article_page(html, "fallback");
        assert_eq!(page.title.as_deref(), Some("City opens the new riverside library"));
        assert_eq!(page.date.as_deref(), Some("May 2 2024"));
        assert!(page.content.starts_with("The library opened its doors"));
        assert!(page.content.contains("two thousand visitors"));
    }

    #[test]
    fn test_later_region_used_when_first_is_thin() {
        let html = r#"<html><body>
            <article><p>Teaser text only here.</p></article>
            <div class="entry-content">
              <p>This is the real body of the story, long enough to clear the threshold easily.</p>
              <p>And a second paragraph with even more detail about what happened downtown.</p>
            </div>
        </body></html>"#;
        let page = parse_article_page(html, "Some headline here");
        assert!(page.content.contains("real body of the story"));
        assert!(page.title.is_none());
        assert!(page.date.is_none());
    }

    #[test]
    fn test_empty_page() {
        assert_eq!(parse_article_page("", "t"), ArticlePage::default());
    }
}
