//! Reading Word documents into text blocks
//!
//! docx-rs exposes the body as a tree:
//! `Document -> DocumentChild::Paragraph -> ParagraphChild::Run -> RunChild::Text`.
//! Hyperlinks nest further paragraph children and are walked recursively.
//! Only top-level paragraphs are read; tables and images are skipped.

use crate::error::{Error, Result};
use docx_rs::{read_docx, DocumentChild, Paragraph, ParagraphChild, RunChild};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Plain text of one paragraph; runs are concatenated without separator
pub fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    push_children_text(&paragraph.children, &mut text);
    text
}

fn push_children_text(children: &[ParagraphChild], text: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for run_child in &run.children {
                    match run_child {
                        RunChild::Text(t) => text.push_str(&t.text),
                        RunChild::Tab(_) => text.push('\t'),
                        RunChild::Break(_) => text.push('\n'),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => push_children_text(&link.children, text),
            _ => {}
        }
    }
}

/// Group paragraphs into blocks: consecutive non-empty (trimmed) paragraphs
/// are joined with `\n`, empty paragraphs end the current block
pub fn split_blocks<I, S>(paragraphs: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut blocks = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for paragraph in paragraphs {
        let text = paragraph.as_ref().trim();
        if !text.is_empty() {
            current.push(text.to_string());
        } else if !current.is_empty() {
            blocks.push(current.join("\n"));
            current.clear();
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }

    blocks
}

/// Read a `.docx` file and split its body into blocks
pub fn extract_blocks_from_docx(path: &Path) -> Result<Vec<String>> {
    let bytes = fs::read(path)?;
    let docx = read_docx(&bytes)
        .map_err(|e| Error::Document(format!("cannot parse '{}': {:?}", path.display(), e)))?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(p) => Some(paragraph_text(p)),
            _ => None,
        })
        .collect();

    debug!(path = %path.display(), paragraphs = paragraphs.len(), "Read document paragraphs");
    Ok(split_blocks(paragraphs))
}
