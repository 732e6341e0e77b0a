use client_core::{FetchState, Location};
use shared::domain::Duty;

pub const TITLE: &str = "Duties";

/// Renders the list view. Stale rows stay visible while loading or after an error.
pub fn render_page(state: &FetchState, location: Location) -> String {
    let mut lines = vec![TITLE.to_string()];

    match &state.data {
        Some(page) if !page.is_empty() => {
            lines.push(format!("{:>4}  {:<36}  name", "#", "id"));
            for (row, duty) in page.items.iter().enumerate() {
                lines.push(format!("{:>4}  {:<36}  {}", row + 1, duty.id, duty.name));
            }
        }
        Some(_) => lines.push("  no duties".to_string()),
        None => {}
    }

    lines.push(match &state.data {
        Some(page) => {
            let mut summary = format!(
                "page {} of {}, {} total, {} per page",
                location.page,
                page.total_pages.max(1),
                page.total,
                location.page_size
            );
            if !page.is_empty() {
                summary.push_str(&format!(
                    ", showing {}-{}",
                    page.first_index(),
                    page.last_index()
                ));
            }
            summary
        }
        None => format!("page {}, {} per page", location.page, location.page_size),
    });

    if state.loading {
        lines.push("loading...".to_string());
    }
    if let Some(error) = &state.error {
        lines.push(format!("error: {error}"));
    }

    lines.join("\n")
}

/// The duty shown on 1-based `row` of the current page.
pub fn row(state: &FetchState, row: usize) -> Option<&Duty> {
    state.data.as_ref()?.items.get(row.checked_sub(1)?)
}

/// True once the last settled load was for `location` and left the state at rest.
///
/// `settled_for` comes from the orchestrator; an error from another location does not count.
/// A page past the end does not count either: the orchestrator is about to move the location back.
pub fn is_settled(state: &FetchState, location: Location, settled_for: Option<Location>) -> bool {
    if state.loading || settled_for != Some(location) {
        return false;
    }
    if state.error.is_some() {
        return true;
    }
    state.data.as_ref().is_some_and(|page| {
        page.page == location.page
            && page.page_size == location.page_size
            && page.page <= page.total_pages.max(1)
    })
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
