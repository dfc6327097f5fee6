//! Break parsed answer markdown into blocks of typed inline segments.
//!
//! The host draws these however it likes; footnote markers and document links come out
//! as their own segments so they can be made clickable.

use once_cell::sync::Lazy;
use pulldown_cmark::{Event, Parser, Tag};
use regex::Regex;

static FOOTNOTE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" ?\^(\d+)\^ ?").expect("footnote marker pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Citation(u32),
    Link { label: String, target: String },
    Code(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Heading(u8),
    ListItem,
    Quote,
    CodeBlock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub inlines: Vec<Inline>,
}

impl Block {
    fn new(kind: BlockKind) -> Self {
        Block {
            kind,
            inlines: Vec::new(),
        }
    }

    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for inline in &self.inlines {
            match inline {
                Inline::Text(text) | Inline::Code(text) => out.push_str(text),
                Inline::Citation(n) => out.push_str(&format!("[{}]", n)),
                Inline::Link { label, .. } => out.push_str(label),
            }
        }
        out
    }
}

#[derive(Default)]
struct Builder {
    blocks: Vec<Block>,
    current: Option<Block>,
    pending: String,
    link: Option<(String, String)>,
    quote_depth: usize,
}

impl Builder {
    fn open(&mut self, kind: BlockKind) {
        self.close();
        self.current = Some(Block::new(kind));
    }

    fn block(&mut self) -> &mut Block {
        let kind = if self.quote_depth > 0 {
            BlockKind::Quote
        } else {
            BlockKind::Paragraph
        };
        self.current.get_or_insert_with(|| Block::new(kind))
    }

    fn flush_text(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.pending);
        let code = matches!(self.current.as_ref().map(|b| b.kind), Some(BlockKind::CodeBlock));
        let block = self.block();
        if code {
            block.inlines.push(Inline::Code(text));
            return;
        }

        let mut last = 0;
        for cap in FOOTNOTE_MARKER.captures_iter(&text) {
            let whole = cap.get(0).map(|m| (m.start(), m.end())).unwrap_or_default();
            let Ok(n) = cap[1].parse::<u32>() else {
                continue;
            };
            if whole.0 > last {
                block.inlines.push(Inline::Text(text[last..whole.0].to_string()));
            }
            block.inlines.push(Inline::Citation(n));
            last = whole.1;
        }
        if last < text.len() {
            block.inlines.push(Inline::Text(text[last..].to_string()));
        }
    }

    fn push_inline(&mut self, inline: Inline) {
        self.flush_text();
        self.block().inlines.push(inline);
    }

    fn close(&mut self) {
        self.flush_text();
        if let Some(block) = self.current.take() {
            if !block.inlines.is_empty() {
                self.blocks.push(block);
            }
        }
    }

    fn text(&mut self, text: &str) {
        match self.link.as_mut() {
            Some((_, label)) => label.push_str(text),
            None => self.pending.push_str(text),
        }
    }
}

pub fn segments(markdown: &str) -> Vec<Block> {
    let mut builder = Builder::default();

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading(level, ..)) => builder.open(BlockKind::Heading(level as u8)),
            Event::Start(Tag::Item) => builder.open(BlockKind::ListItem),
            Event::Start(Tag::CodeBlock(_)) => builder.open(BlockKind::CodeBlock),
            Event::Start(Tag::BlockQuote) => {
                builder.close();
                builder.quote_depth += 1;
            }
            Event::Start(Tag::Paragraph) => {
                // paragraphs inside loose list items belong to the item
                let in_item = matches!(
                    builder.current.as_ref().map(|b| b.kind),
                    Some(BlockKind::ListItem)
                );
                if !in_item {
                    let kind = if builder.quote_depth > 0 {
                        BlockKind::Quote
                    } else {
                        BlockKind::Paragraph
                    };
                    builder.open(kind);
                }
            }
            Event::Start(Tag::Link(_, target, _)) => {
                builder.flush_text();
                builder.link = Some((target.to_string(), String::new()));
            }
            Event::End(Tag::Link(..)) => {
                if let Some((target, label)) = builder.link.take() {
                    builder.push_inline(Inline::Link { label, target });
                }
            }
            Event::End(Tag::BlockQuote) => {
                builder.close();
                builder.quote_depth = builder.quote_depth.saturating_sub(1);
            }
            Event::End(Tag::Paragraph) => {
                let in_item = matches!(
                    builder.current.as_ref().map(|b| b.kind),
                    Some(BlockKind::ListItem)
                );
                if in_item {
                    builder.text(" ");
                } else {
                    builder.close();
                }
            }
            Event::End(Tag::Heading(..)) | Event::End(Tag::Item) | Event::End(Tag::CodeBlock(_)) => {
                builder.close()
            }
            Event::Text(text) | Event::Html(text) => builder.text(&text),
            Event::Code(code) => match builder.link.as_mut() {
                Some((_, label)) => label.push_str(&code),
                None => builder.push_inline(Inline::Code(code.to_string())),
            },
            Event::SoftBreak => builder.text(" "),
            Event::HardBreak => builder.text("\n"),
            _ => {}
        }
    }
    builder.close();

    for block in builder.blocks.iter_mut() {
        if let Some(Inline::Text(text) | Inline::Code(text)) = block.inlines.last_mut() {
            let trimmed = text.trim_end().len();
            text.truncate(trimmed);
        }
        block.inlines.retain(|inline| !matches!(inline, Inline::Text(t) if t.is_empty()));
    }
    builder.blocks
}
