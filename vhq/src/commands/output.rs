use console::style;
use std::fmt::Write;
use vhq_core::storage::{ProjectStructure, WorkspaceItem};

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 { format!("{} B", bytes) } else { format!("{:.1} {}", size, UNITS[unit]) }
}

fn render_items(items: &[WorkspaceItem], prefix: &str, show_ids: bool, out: &mut String) {
    for (idx, item) in items.iter().enumerate() {
        let last = idx + 1 == items.len();
        let (branch, indent) = if last { ("└── ", "    ") } else { ("├── ", "│   ") };

        let label = if item.is_dir() {
            style(format!("{}/", item.name)).bold().blue().to_string()
        } else {
            format!("{}  {}", item.name, style(human_size(item.size.unwrap_or(0))).dim())
        };
        let _ = write!(out, "{}{}{}", prefix, branch, label);
        if show_ids {
            let _ = write!(out, "  {}", style(format!("[{}]", item.id)).dim());
        }
        out.push('\n');

        if item.is_dir() {
            render_items(&item.children, &format!("{}{}", prefix, indent), show_ids, out);
        }
    }
}

/// Renders a project structure as an indented tree.
pub fn render_tree(structure: &ProjectStructure, show_ids: bool) -> String {
    let mut out = format!("{}\n", style(&structure.path).bold());
    if structure.items.is_empty() {
        out.push_str("(empty)\n");
    }
    render_items(&structure.items, "", show_ids, &mut out);
    out
}
