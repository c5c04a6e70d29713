//! CLI output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use crate::auth::models::{AdminView, RoleKind};
use crate::models::PageSummary;

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print a warning message
pub fn warn(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

fn header(names: &[&str]) -> Vec<Cell> {
    names.iter().map(|n| Cell::new(n).fg(Color::Cyan)).collect()
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Print a table of administrator accounts
pub fn print_admin_table(admins: &[AdminView]) {
    if admins.is_empty() {
        info("No administrators found. Run 'schoolhouse migrate' to create the principal");
        return;
    }

    let mut table = new_table();
    table.set_header(header(&[
        "ID",
        "Admin ID",
        "Username",
        "Name",
        "Role",
        "Permissions",
        "Active",
        "Created",
    ]));

    for admin in admins {
        let role_color = match admin.role {
            RoleKind::Principal => Color::Magenta,
            RoleKind::Admin => Color::Blue,
        };
        let permissions = match admin.role {
            RoleKind::Principal => "all".to_string(),
            RoleKind::Admin if admin.permissions.is_empty() => "-".to_string(),
            RoleKind::Admin => admin.permissions.join(", "),
        };
        let (active, active_color) = if admin.is_active {
            ("yes", Color::Green)
        } else {
            ("no", Color::Red)
        };

        table.add_row(vec![
            Cell::new(admin.id),
            Cell::new(admin.admin_id.as_deref().unwrap_or("-")),
            Cell::new(&admin.username),
            Cell::new(admin.full_name.as_deref().unwrap_or("-")),
            Cell::new(admin.role.as_str()).fg(role_color),
            Cell::new(permissions),
            Cell::new(active).fg(active_color),
            Cell::new(admin.created_at.format("%Y-%m-%d %H:%M")),
        ]);
    }

    println!("{table}");
}

/// Print the pages that have content, marking those with bundled defaults
pub fn print_page_table(pages: &[PageSummary], seeded: &[String]) {
    if pages.is_empty() {
        info("No page content yet. Seed it with 'schoolhouse content seed --all'");
        return;
    }

    let mut table = new_table();
    table.set_header(header(&["Page", "Sections", "Defaults"]));

    for page in pages {
        let defaults = if seeded.contains(&page.page_slug) {
            "✓".green().to_string()
        } else {
            "-".to_string()
        };
        table.add_row(vec![
            Cell::new(&page.page_slug),
            Cell::new(page.section_count),
            Cell::new(defaults),
        ]);
    }

    println!("{table}");
}
