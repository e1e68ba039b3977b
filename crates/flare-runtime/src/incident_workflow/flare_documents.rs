use chrono::{DateTime, Utc};
use flare_commands::SpecialType;
use flare_core::format_reference_time;
use serde_json::{json, Value};

const HISTORY_SUFFIX: &str = " (Slack History)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNames {
    pub flare_doc: String,
    pub history_doc: String,
}

pub fn document_names(
    ticket_key: &str,
    title: &str,
    special_type: Option<SpecialType>,
) -> DocumentNames {
    let flare_doc = match special_type {
        Some(special_type) => format!("{ticket_key}: {title} ({special_type})"),
        None => format!("{ticket_key}: {title}"),
    };
    let history_doc = format!("{flare_doc}{HISTORY_SUFFIX}");
    DocumentNames {
        flare_doc,
        history_doc,
    }
}

pub fn flare_doc_url(document_id: &str) -> String {
    format!("https://docs.google.com/document/d/{document_id}")
}

pub fn history_doc_url(spreadsheet_id: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{spreadsheet_id}")
}

/// Fills the tracking-document placeholders. Only the first occurrence of each is replaced.
pub fn substitute_template(
    html: &str,
    ticket_key: &str,
    started_at: DateTime<Utc>,
    title: &str,
    history_doc_id: &str,
    history_doc_name: &str,
) -> String {
    let history_link = format!(
        "<a href=\"{}\">{history_doc_name}</a>",
        history_doc_url(history_doc_id)
    );
    html.replacen("[FLARE-KEY]", ticket_key, 1)
        .replacen("[START-DATE]", &format_reference_time(started_at), 1)
        .replacen("[SUMMARY]", title, 1)
        .replacen("[HISTORY-DOC]", &history_link, 1)
}

fn heading(text: &str) -> Value {
    json!({
        "type": "heading",
        "attrs": { "level": 2 },
        "content": [{ "type": "text", "text": text }],
    })
}

fn example_paragraph(text: &str) -> Value {
    json!({
        "type": "paragraph",
        "content": [{ "type": "text", "text": text, "marks": [{ "type": "em" }] }],
    })
}

fn link(text: &str, href: &str) -> Value {
    json!({
        "type": "text",
        "text": text,
        "marks": [
            { "type": "link", "attrs": { "href": href } },
            { "type": "em" },
        ],
    })
}

/// Atlassian document used as the ticket description. Missing ids render as empty links.
pub fn ticket_description(flare_doc_id: Option<&str>, history_doc_id: Option<&str>) -> Value {
    let flare_doc_href = flare_doc_url(flare_doc_id.unwrap_or_default());
    let history_doc_href = history_doc_url(history_doc_id.unwrap_or_default());
    json!({
        "version": 1,
        "type": "doc",
        "content": [
            heading("Customer Impact"),
            example_paragraph(
                "[example: All users attempting to load the dashboard saw errors for about 45 minutes.]",
            ),
            heading("Description"),
            example_paragraph(
                "[example: What happened, when it was noticed and the timeline of actions taken until the flare was mitigated.]",
            ),
            heading("Followup"),
            {
                "type": "paragraph",
                "content": [
                    {
                        "type": "text",
                        "text": "[example: Meeting with the vendor on Monday to continue investigating the root cause]\n\n",
                        "marks": [{ "type": "em" }],
                    },
                    link("Flare Doc", &flare_doc_href),
                    { "type": "text", "text": " | " },
                    link("Slack History", &history_doc_href),
                ],
            },
        ],
    })
}
