use super::models::Entry;

/// Opening sentinel; its presence means the entry is already summarized
pub const SUMMARY_START_MARKER: &str = "<!-- AI_SUMMARY_START -->";
pub const SUMMARY_END_MARKER: &str = "<!-- AI_SUMMARY_END -->";

const SUMMARY_HEADING: &str = "✨ AI Summary";

/// Check entry HTML for an existing summary block
pub fn has_summary(content: &str) -> bool {
    content.contains(SUMMARY_START_MARKER)
}

/// The HTML fragment persisted in front of an entry's content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryBlock {
    summary: String,
}

impl SummaryBlock {
    /// Wrap already-decoded summary text
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
        }
    }

    pub fn to_html(&self) -> String {
        format!(
            "<div class=\"ai-summary-block\">{}<h3>{}</h3><div class=\"ai-summary-content\">{}</div>{}</div>",
            SUMMARY_START_MARKER, SUMMARY_HEADING, self.summary, SUMMARY_END_MARKER
        )
    }

    /// Content with this block in front of it
    pub fn prepend_to(&self, content: &str) -> String {
        let mut html = self.to_html();
        html.push_str(content);
        html
    }
}

/// Inject summarize triggers above and below an entry's content.
///
/// Display-time hook for hosts rendering entries as HTML. Entries that already
/// carry a summary are returned unchanged.
pub fn render_trigger(entry: &Entry, summarize_url: &str) -> String {
    if has_summary(&entry.content) {
        return entry.content.clone();
    }

    let trigger = format!(
        "<div class=\"ai-summary-wrap\"><button data-request=\"{}\" data-entry-id=\"{}\" class=\"ai-summary-btn\"></button><div class=\"ai-summary-preview\"></div></div>",
        html_escape::encode_double_quoted_attribute(summarize_url),
        entry.id
    );

    format!("{trigger}{}<div>&nbsp;</div>{trigger}", entry.content)
}
