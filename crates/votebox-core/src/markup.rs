//! Rendering of stored entry text into HTML and searchable plain text.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::entry::RenderFormat;

/// URL-safe stand-in for `#` in a filter query string.
pub const TAG_MARK: char = '_';

/// Separator between filter terms.
pub const SPACE_MARK: char = ' ';

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^<]+?>").expect("invalid tag regex"));

static EMPHASIS: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"/([\w ]+)/").expect("invalid emphasis regex"));

static STRONG: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\*([\w ]+)\*").expect("invalid strong regex"));

static HASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\w+)").expect("invalid hashtag regex"));

/// The two faces of a rendered entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
  pub html:  String,
  /// Text used for search and export.
  pub plain: String,
}

/// Render `text` according to its stored format.
pub fn render(text: &str, format: RenderFormat) -> Rendered {
  match format {
    RenderFormat::PrettyText => prettify(text),
    RenderFormat::LegacyHtml => clean_html(text),
  }
}

/// Apply inline markup. Literal tags in the input are stripped first so
/// submitted text can never inject HTML; the plain text is kept verbatim.
pub fn prettify(text: &str) -> Rendered {
  let html = strip_tags(text);
  let html = EMPHASIS.replace_all(&html, "<em>${1}</em>");
  let html = STRONG.replace_all(&html, "<strong>${1}</strong>");
  let html = HASHTAG.replace_all(
    &html,
    format!("<a href=\"/?filter={TAG_MARK}${{1}}\">#${{1}}</a>").as_str(),
  );
  let html = html.replace('\n', "<br />");

  Rendered { html, plain: text.to_owned() }
}

/// Legacy entries are trusted HTML; their plain text drops the tags so an
/// edit "downgrades" them to pretty text cleanly.
pub fn clean_html(text: &str) -> Rendered {
  Rendered { html: text.to_owned(), plain: strip_tags(text) }
}

fn strip_tags(text: &str) -> String { TAG.replace_all(text, "").into_owned() }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn emphasis_and_strong() {
    let r = prettify("a /quiet word/ and *loud one*");
    assert_eq!(r.html, "a <em>quiet word</em> and <strong>loud one</strong>");
  }

  #[test]
  fn hashtags_become_filter_links() {
    let r = prettify("so #meta");
    assert_eq!(r.html, "so <a href=\"/?filter=_meta\">#meta</a>");
  }

  #[test]
  fn literal_tags_are_stripped_but_plain_text_is_kept() {
    let r = prettify("<script>x</script>line one\nline two");
    assert_eq!(r.html, "xline one<br />line two");
    assert_eq!(r.plain, "<script>x</script>line one\nline two");
  }

  #[test]
  fn legacy_html_keeps_markup_and_strips_plain() {
    let r = render("<b>bold</b> move", RenderFormat::LegacyHtml);
    assert_eq!(r.html, "<b>bold</b> move");
    assert_eq!(r.plain, "bold move");
  }
}
