use crate::core::sections::SectionState;
use crate::core::slice::ResourceState;
use crate::domain::model::{BlogPost, Pagination, Subscriber};
use std::fmt::Write;

const TITLE_WIDTH: usize = 40;

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let cut: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

pub fn render_status<R>(state: &ResourceState<R>) -> Option<String> {
    if state.loading {
        Some("⏳ Loading...".to_string())
    } else {
        state.error.as_ref().map(|e| format!("❌ {}", e))
    }
}

pub fn render_pagination(pagination: &Pagination) -> String {
    format!(
        "page {}/{} ({} total)",
        pagination.page,
        pagination.total_pages.max(1),
        pagination.total
    )
}

pub fn render_post_table(state: &ResourceState<BlogPost>) -> String {
    let mut out = String::new();
    if let Some(status) = render_status(state) {
        let _ = writeln!(out, "{}", status);
    }
    if state.items.is_empty() {
        let _ = writeln!(out, "No blog posts yet.");
        return out;
    }

    let _ = writeln!(out, "{:<26} {:<40} {:<9} {}", "ID", "TITLE", "STATUS", "UPDATED");
    for post in &state.items {
        let status = if post.published { "published" } else { "draft" };
        let updated = post
            .updated_at
            .or(post.created_at)
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<26} {:<40} {:<9} {}",
            truncate(&post.id, 26),
            truncate(&post.title, TITLE_WIDTH),
            status,
            updated
        );
    }
    let _ = writeln!(out, "{}", render_pagination(&state.pagination));
    out
}

pub fn render_post_detail(post: &BlogPost) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", post.title);
    let _ = writeln!(out, "id:        {}", post.id);
    if !post.slug.is_empty() {
        let _ = writeln!(out, "slug:      {}", post.slug);
    }
    if let Some(author) = &post.author {
        let _ = writeln!(out, "author:    {}", author);
    }
    let _ = writeln!(
        out,
        "status:    {}",
        if post.published { "published" } else { "draft" }
    );
    if !post.tags.is_empty() {
        let _ = writeln!(out, "tags:      {}", post.tags.join(", "));
    }
    if let Some(cover) = &post.cover_image {
        let _ = writeln!(out, "cover:     {}", cover);
    }
    if let Some(created) = post.created_at {
        let _ = writeln!(out, "created:   {}", created.to_rfc3339());
    }
    if let Some(excerpt) = &post.excerpt {
        let _ = writeln!(out, "\n{}", excerpt);
    }
    let _ = writeln!(out, "\n{}", post.content);
    out
}

pub fn render_subscriber_table(state: &ResourceState<Subscriber>) -> String {
    let mut out = String::new();
    if let Some(status) = render_status(state) {
        let _ = writeln!(out, "{}", status);
    }
    if state.items.is_empty() {
        let _ = writeln!(out, "No subscribers yet.");
        return out;
    }

    let _ = writeln!(out, "{:<26} {:<32} {:<20} {}", "ID", "EMAIL", "NAME", "ACTIVE");
    for subscriber in &state.items {
        let _ = writeln!(
            out,
            "{:<26} {:<32} {:<20} {}",
            truncate(&subscriber.id, 26),
            truncate(&subscriber.email, 32),
            truncate(subscriber.name.as_deref().unwrap_or("-"), 20),
            if subscriber.active { "yes" } else { "no" }
        );
    }
    let _ = writeln!(out, "{}", render_pagination(&state.pagination));
    out
}

pub fn render_section(state: &SectionState) -> String {
    if state.loading {
        return "⏳ Loading...\n".to_string();
    }
    if let Some(error) = &state.error {
        return format!("❌ {}\n", error);
    }
    match &state.record {
        Some(section) => {
            let body = serde_json::to_string_pretty(&section.content)
                .unwrap_or_else(|_| section.content.to_string());
            let mut out = format!("[{}]\n{}\n", section.key, body);
            if let Some(updated) = section.updated_at {
                let _ = writeln!(out, "updated {}", updated.to_rfc3339());
            }
            out
        }
        None => "No section loaded.\n".to_string(),
    }
}
