//! Capability-limited rich text for chat messages.
//!
//! Assistant text is parsed as Markdown into a small block/span model that front ends draw
//! directly: paragraphs, headings, list items, code blocks, rules, and inline strong /
//! emphasis / code / links. Anything outside that set (raw HTML, images, tables) degrades to
//! literal text. Links survive only for `http`, `https` and `mailto` destinations and are
//! always opened in a new browser context by the front end. User and quote text is never
//! interpreted.

use crate::conversation::{Message, Sender};
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// Inline styling flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Style {
    pub strong: bool,
    pub emphasis: bool,
    pub code: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Text { text: String, style: Style },
    /// A link the front end must open in a new context.
    Link { text: String, url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Vec<Span>),
    Heading { level: u8, spans: Vec<Span> },
    /// `marker` is `None` for bullets, `Some(n)` for the n-th item of an ordered list.
    ListItem {
        depth: usize,
        marker: Option<u64>,
        spans: Vec<Span>,
    },
    /// A later paragraph of the list item above it: same indent, no marker.
    ListContinuation { depth: usize, spans: Vec<Span> },
    Code(String),
    Rule,
    /// Text shown exactly as written.
    Literal(String),
}

/// Render a message according to its sender: assistant text as rich text, everything else
/// literally.
pub fn render_message(message: &Message) -> Vec<Block> {
    match message.sender {
        Sender::Assistant => render_markdown(&message.text),
        Sender::User | Sender::Quote => vec![Block::Literal(message.text.clone())],
    }
}

/// True for destinations a link may point at.
pub fn is_allowed_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    lower.starts_with("https://") || lower.starts_with("http://") || lower.starts_with("mailto:")
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// One open list: `None` for bullets, `Some(next number)` for ordered lists.
type ListFrame = Option<u64>;

#[derive(Default)]
struct Builder {
    blocks: Vec<Block>,
    spans: Vec<Span>,
    style: Style,
    lists: Vec<ListFrame>,
    /// Marker for the item currently being filled, taken by its first block. `None` once taken,
    /// so further blocks of the same item become continuations.
    item_marker: Option<Option<u64>>,
    heading: Option<u8>,
    code: Option<String>,
    /// Open link destination (None when the destination is not allowed) and its text so far.
    link: Option<(Option<String>, String)>,
}

impl Builder {
    fn push_text(&mut self, text: &str) {
        if let Some(code) = self.code.as_mut() {
            code.push_str(text);
            return;
        }
        if let Some((_, link_text)) = self.link.as_mut() {
            link_text.push_str(text);
            return;
        }
        if let Some(Span::Text { text: last, style }) = self.spans.last_mut() {
            if *style == self.style {
                last.push_str(text);
                return;
            }
        }
        self.spans.push(Span::Text {
            text: text.to_string(),
            style: self.style,
        });
    }

    fn push_styled(&mut self, text: &str, style: Style) {
        let saved = std::mem::replace(&mut self.style, style);
        self.push_text(text);
        self.style = saved;
    }

    /// Close the current inline run into a block of the right kind.
    fn flush(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.spans);
        let block = if let Some(level) = self.heading {
            Block::Heading { level, spans }
        } else if !self.lists.is_empty() {
            let depth = self.lists.len() - 1;
            match self.item_marker.take() {
                Some(marker) => Block::ListItem {
                    depth,
                    marker,
                    spans,
                },
                None => Block::ListContinuation { depth, spans },
            }
        } else {
            Block::Paragraph(spans)
        };
        self.blocks.push(block);
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {}
            Tag::Heading { level, .. } => {
                self.flush();
                self.heading = Some(heading_level(level));
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let current = *n;
                        *n += 1;
                        Some(current)
                    }
                    _ => None,
                };
                self.item_marker = Some(marker);
            }
            Tag::CodeBlock(_) => {
                self.flush();
                self.code = Some(String::new());
            }
            Tag::Emphasis => self.style.emphasis = true,
            Tag::Strong => self.style.strong = true,
            Tag::Link { dest_url, .. } => {
                let url = dest_url.to_string();
                let allowed = if is_allowed_url(&url) { Some(url) } else { None };
                self.link = Some((allowed, String::new()));
            }
            Tag::Image { dest_url, .. } => {
                // Images are not shown; the alt text becomes a link to the image when allowed.
                let url = dest_url.to_string();
                let allowed = if is_allowed_url(&url) { Some(url) } else { None };
                self.link = Some((allowed, String::new()));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.flush(),
            TagEnd::Heading(_) => {
                self.flush();
                self.heading = None;
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
            }
            TagEnd::Item => self.flush(),
            TagEnd::CodeBlock => {
                if let Some(code) = self.code.take() {
                    self.blocks
                        .push(Block::Code(code.trim_end_matches('\n').to_string()));
                }
            }
            TagEnd::Emphasis => self.style.emphasis = false,
            TagEnd::Strong => self.style.strong = false,
            TagEnd::Link | TagEnd::Image => {
                if let Some((url, text)) = self.link.take() {
                    match url {
                        Some(url) => {
                            let text = if text.is_empty() { url.clone() } else { text };
                            self.spans.push(Span::Link { text, url });
                        }
                        None => self.push_text(&text),
                    }
                }
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Block> {
        if let Some(code) = self.code.take() {
            self.blocks.push(Block::Code(code));
        }
        self.flush();
        self.blocks
    }
}

/// Parse assistant Markdown into the limited block model.
pub fn render_markdown(text: &str) -> Vec<Block> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let mut b = Builder::default();
    for event in Parser::new_ext(text, options) {
        match event {
            Event::Start(tag) => b.start(tag),
            Event::End(tag) => b.end(tag),
            Event::Text(t) => b.push_text(&t),
            Event::Code(t) => b.push_styled(
                &t,
                Style {
                    code: true,
                    ..b.style
                },
            ),
            Event::Html(html) | Event::InlineHtml(html) => {
                let own_block = b.code.is_none()
                    && b.link.is_none()
                    && b.spans.is_empty()
                    && html.ends_with('\n');
                if own_block {
                    b.blocks
                        .push(Block::Literal(html.trim_end_matches('\n').to_string()));
                } else {
                    b.push_styled(&html, Style::default());
                }
            }
            Event::SoftBreak => b.push_text(" "),
            Event::HardBreak => b.push_text("\n"),
            Event::Rule => {
                b.flush();
                b.blocks.push(Block::Rule);
            }
            _ => {}
        }
    }
    b.finish()
}

/// Flatten blocks to terminal-friendly plain text (links as `text <url>`).
pub fn to_plain_text(blocks: &[Block]) -> String {
    fn spans_text(spans: &[Span]) -> String {
        spans
            .iter()
            .map(|s| match s {
                Span::Text { text, .. } => text.clone(),
                Span::Link { text, url } if text == url => url.clone(),
                Span::Link { text, url } => format!("{} <{}>", text, url),
            })
            .collect()
    }
    let mut lines = Vec::with_capacity(blocks.len());
    // Marker width per list depth, so continuations line up under their item's text.
    let mut marker_widths: Vec<usize> = Vec::new();
    for block in blocks {
        let line = match block {
            Block::Paragraph(spans) => spans_text(spans),
            Block::Heading { spans, .. } => spans_text(spans).to_uppercase(),
            Block::ListItem {
                depth,
                marker,
                spans,
            } => {
                let bullet = match marker {
                    Some(n) => format!("{}.", n),
                    None => "-".to_string(),
                };
                marker_widths.resize(*depth + 1, 2);
                marker_widths[*depth] = bullet.len() + 1;
                format!("{}{} {}", "  ".repeat(*depth), bullet, spans_text(spans))
            }
            Block::ListContinuation { depth, spans } => {
                let width = marker_widths.get(*depth).copied().unwrap_or(2);
                format!(
                    "{}{}{}",
                    "  ".repeat(*depth),
                    " ".repeat(width),
                    spans_text(spans)
                )
            }
            Block::Code(code) => code
                .lines()
                .map(|l| format!("    {}", l))
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Rule => "----".to_string(),
            Block::Literal(text) => text.clone(),
        };
        lines.push(line);
    }
    lines.join("\n")
}
