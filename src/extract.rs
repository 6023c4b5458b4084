//! Primary-article text extraction from fetched HTML.
//!
//! Extraction never panics; a page that yields nothing usable returns an
//! [`ExtractError`] and the research client skips the URL.
//!
//! 1. Collect text blocks (`p`, headings, `li`, `blockquote`, `pre`) that
//!    are not inside boilerplate: `nav`/`footer`/`aside`/… tags, or any
//!    element whose id or class names a menu, ad, sidebar, cookie banner
//!    and similar.
//! 2. Group consecutive blocks that share a parent into runs and keep the
//!    longest run (content density).
//! 3. Every well-known article container (`article`, `main`, `#content`, …)
//!    is a candidate root; the one whose densest run is longest wins.
//!    Pages without a candidate fall back to `<body>`.

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    "#main-content",
    "#content",
    ".article-body",
    ".post-content",
];

const BLOCK_SELECTOR: &str = "p, h1, h2, h3, h4, h5, h6, li, blockquote, pre";

const BLOCK_TAGS: &[&str] = &[
    "p",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "li",
    "blockquote",
    "pre",
];

const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "nav", "aside", "footer", "header", "noscript", "form", "iframe",
];

const BOILERPLATE_MARKERS: &[&str] = &[
    "nav",
    "navbar",
    "menu",
    "footer",
    "sidebar",
    "ad",
    "advert",
    "advertisement",
    "promo",
    "cookie",
    "newsletter",
    "share",
    "social",
    "related",
    "comment",
    "subscribe",
    "breadcrumb",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("no article text found")]
    NoContent,
    #[error("extracted text too short ({chars} < {min} chars)")]
    TooShort { chars: usize, min: usize },
}

/// Length bounds applied to extracted text, in characters.
#[derive(Debug, Clone, Copy)]
pub struct ExtractLimits {
    pub min_chars: usize,
    pub max_chars: usize,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            min_chars: 200,
            max_chars: 150_000,
        }
    }
}

/// Extract the primary article text from an HTML document.
pub fn extract_article_text(html: &str, limits: ExtractLimits) -> Result<String, ExtractError> {
    let document = Html::parse_document(html);

    let named = CONTENT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .flat_map(|selector| document.select(&selector).collect::<Vec<_>>())
        .filter(|el| !is_boilerplate(el))
        .map(|root| densest_run(&collect_blocks(root)))
        .fold(String::new(), |best, text| {
            if text.len() > best.len() {
                text
            } else {
                best
            }
        });

    let text = if named.is_empty() {
        let body = Selector::parse("body")
            .ok()
            .and_then(|s| document.select(&s).next())
            .unwrap_or_else(|| document.root_element());
        densest_run(&collect_blocks(body))
    } else {
        named
    };

    let chars = text.chars().count();
    if chars == 0 {
        return Err(ExtractError::NoContent);
    }
    if chars < limits.min_chars {
        return Err(ExtractError::TooShort {
            chars,
            min: limits.min_chars,
        });
    }
    if chars > limits.max_chars {
        return Ok(text.chars().take(limits.max_chars).collect());
    }
    Ok(text)
}

struct Block<'a> {
    parent: Option<ElementRef<'a>>,
    text: String,
}

impl Block<'_> {
    fn shares_parent_with(&self, other: &Block<'_>) -> bool {
        self.parent.map(|p| p.id()) == other.parent.map(|p| p.id())
    }
}

fn collect_blocks(root: ElementRef<'_>) -> Vec<Block<'_>> {
    let Ok(selector) = Selector::parse(BLOCK_SELECTOR) else {
        return Vec::new();
    };
    root.select(&selector)
        .filter(|block| !is_boilerplate(block) && !inside_excluded(block, root))
        .filter_map(|block| {
            let text = collapse_whitespace(&block.text().collect::<Vec<_>>().join(" "));
            if text.is_empty() {
                return None;
            }
            Some(Block {
                parent: block.parent().and_then(ElementRef::wrap),
                text,
            })
        })
        .collect()
}

/// True when an ancestor between `block` and `root` is boilerplate or is
/// itself a text block (nested blocks are counted once, via the outer one).
fn inside_excluded(block: &ElementRef<'_>, root: ElementRef<'_>) -> bool {
    for ancestor in block.ancestors() {
        if ancestor.id() == root.id() {
            return false;
        }
        if let Some(el) = ElementRef::wrap(ancestor) {
            if is_boilerplate(&el) || BLOCK_TAGS.contains(&el.value().name()) {
                return true;
            }
        }
    }
    false
}

fn is_boilerplate(el: &ElementRef<'_>) -> bool {
    let value = el.value();
    if EXCLUDED_TAGS.contains(&value.name()) {
        return true;
    }
    value.id().into_iter().chain(value.classes()).any(names_boilerplate)
}

fn names_boilerplate(name: &str) -> bool {
    name.to_ascii_lowercase()
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .map(|word| word.strip_suffix('s').unwrap_or(word))
        .any(|word| BOILERPLATE_MARKERS.contains(&word))
}

fn join_blocks(blocks: &[Block<'_>]) -> String {
    blocks
        .iter()
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn densest_run(blocks: &[Block<'_>]) -> String {
    let mut best: &[Block<'_>] = &[];
    let mut best_len = 0;
    let mut start = 0;
    while start < blocks.len() {
        let mut end = start + 1;
        while end < blocks.len() && blocks[end].shares_parent_with(&blocks[start]) {
            end += 1;
        }
        let run = &blocks[start..end];
        let len: usize = run.iter().map(|b| b.text.len()).sum();
        if len > best_len {
            best = run;
            best_len = len;
        }
        start = end;
    }
    join_blocks(best)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
