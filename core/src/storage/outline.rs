//! Splits a Markdown document into a tree of files, one per heading section.

use crate::storage::path::UNSAFE_NAME_CHARS;
use crate::storage::{ItemKind, ItemPath};
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

const OUTLINE_EXTENSION: &str = "md";
// Leaves room for a " (n)" suffix and the extension within the 255 byte name limit.
const MAX_TITLE_BYTES: usize = 200;

/// One file or folder to create, relative to the import target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OutlineEntry {
    pub path: ItemPath,
    pub kind: ItemKind,
    pub content: String,
}

#[derive(Debug)]
struct Heading {
    level: usize,
    title: String,
    start: usize,
    body_start: usize,
}

#[derive(Debug)]
struct Section {
    title: String,
    body: String,
    children: Vec<Section>,
}

/// Turns a heading into a usable file name stem.
pub(crate) fn sanitize_title(title: &str) -> String {
    let cleaned = UNSAFE_NAME_CHARS.replace_all(title, "");
    let cleaned = WHITESPACE.replace_all(cleaned.trim(), " ");
    let cleaned = cleaned.trim_start_matches('.').trim_end_matches(['.', ' ']);
    let mut end = cleaned.len().min(MAX_TITLE_BYTES);
    while !cleaned.is_char_boundary(end) {
        end -= 1;
    }
    let truncated = cleaned[..end].trim_end_matches(['.', ' ']).to_string();
    if truncated.is_empty() { "Untitled".to_string() } else { truncated }
}

fn headings(markdown: &str) -> Vec<Heading> {
    let options: Options = [Options::ENABLE_GFM, Options::ENABLE_HEADING_ATTRIBUTES].into_iter().collect();
    let mut headings = Vec::new();
    let mut current: Option<Heading> = None;

    for (event, range) in Parser::new_ext(markdown, options).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some(Heading {
                    level: level as usize,
                    title: String::new(),
                    start: range.start,
                    body_start: range.end,
                });
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(heading) = current.as_mut() {
                    heading.title.push_str(&text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(heading) = current.take() {
                    headings.push(heading);
                }
            }
            _ => {}
        }
    }
    headings
}

fn sections(markdown: &str, headings: &[Heading]) -> Vec<Section> {
    // (level, section) pairs of the currently open heading chain
    let mut open: Vec<(usize, Section)> = Vec::new();
    let mut roots = Vec::new();

    fn close(open: &mut Vec<(usize, Section)>, roots: &mut Vec<Section>) {
        if let Some((_, section)) = open.pop() {
            match open.last_mut() {
                Some((_, parent)) => parent.children.push(section),
                None => roots.push(section),
            }
        }
    }

    for (idx, heading) in headings.iter().enumerate() {
        let body_end = headings.get(idx + 1).map_or(markdown.len(), |next| next.start);
        let body_start = heading.body_start.min(body_end);
        let section = Section {
            title: heading.title.clone(),
            body: markdown[body_start..body_end].trim().to_string(),
            children: Vec::new(),
        };
        while open.last().is_some_and(|(level, _)| *level >= heading.level) {
            close(&mut open, &mut roots);
        }
        open.push((heading.level, section));
    }
    while !open.is_empty() {
        close(&mut open, &mut roots);
    }
    roots
}

/// Tracks names already taken in each directory of the plan.
#[derive(Default)]
struct Names {
    taken: HashSet<(ItemPath, String)>,
}

impl Names {
    fn claim(&mut self, dir: &ItemPath, stem: &str, extension: Option<&str>) -> String {
        let mut n = 1;
        loop {
            let candidate = match (n, extension) {
                (1, Some(ext)) => format!("{}.{}", stem, ext),
                (1, None) => stem.to_string(),
                (_, Some(ext)) => format!("{} ({}).{}", stem, n, ext),
                (_, None) => format!("{} ({})", stem, n),
            };
            if self.taken.insert((dir.clone(), candidate.to_lowercase())) {
                return candidate;
            }
            n += 1;
        }
    }
}

fn plan_sections(sections: Vec<Section>, dir: &ItemPath, names: &mut Names, entries: &mut Vec<OutlineEntry>) {
    for section in sections {
        let stem = sanitize_title(&section.title);
        if section.children.is_empty() {
            let name = names.claim(dir, &stem, Some(OUTLINE_EXTENSION));
            entries.push(OutlineEntry { path: dir.join(&name), kind: ItemKind::File, content: section.body });
            continue;
        }
        let folder = dir.join(&names.claim(dir, &stem, None));
        entries.push(OutlineEntry { path: folder.clone(), kind: ItemKind::Directory, content: String::new() });
        if !section.body.is_empty() {
            let name = names.claim(&folder, &stem, Some(OUTLINE_EXTENSION));
            entries.push(OutlineEntry { path: folder.join(&name), kind: ItemKind::File, content: section.body });
        }
        plan_sections(section.children, &folder, names, entries);
    }
}

/// Plans the files and folders for importing `markdown` as an outline.
///
/// Entries are ordered so that every folder precedes its contents. Text
/// before the first heading, and documents without headings, go to a file
/// named after `file_name`.
pub(crate) fn plan(markdown: &str, file_name: &str) -> Vec<OutlineEntry> {
    let headings = headings(markdown);
    let mut names = Names::default();
    let mut entries = Vec::new();
    let root = ItemPath::root();

    let leading = headings.first().map_or(markdown, |first| &markdown[..first.start]).trim();
    if !leading.is_empty() {
        let stem = sanitize_title(file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem));
        let name = names.claim(&root, &stem, Some(OUTLINE_EXTENSION));
        let content = if headings.is_empty() { markdown.to_string() } else { leading.to_string() };
        entries.push(OutlineEntry { path: root.join(&name), kind: ItemKind::File, content });
    }

    plan_sections(sections(markdown, &headings), &root, &mut names, &mut entries);
    entries
}
