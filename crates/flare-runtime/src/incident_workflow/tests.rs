use chrono::{DateTime, TimeZone, Utc};
use flare_commands::{FireCommand, Priority, SpecialType};
use flare_integrations::MessagingClient;

use super::{
    invite_list, run_incident_workflow, FireRequest, StepOutcome, StepPolicy, WorkflowStep,
};
use crate::test_support::{harness, harness_with_config, requester, test_config, BOT, INDEX_CHANNEL};

fn fired_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 10, 20, 5, 9)
        .single()
        .expect("fixed time")
}

fn fire_request(special_type: Option<SpecialType>) -> FireRequest {
    FireRequest {
        command: FireCommand {
            priority: Priority::P1,
            special_type,
            title: "checkout errors".to_string(),
        },
        requester: requester(),
        origin_channel: INDEX_CHANNEL.to_string(),
        message_ts: "1704917109.000200".to_string(),
    }
}

#[test]
fn unit_only_ticket_and_channel_creation_are_fatal() {
    let fatal = [
        WorkflowStep::Acknowledge,
        WorkflowStep::CreateTicket,
        WorkflowStep::StartProgress,
        WorkflowStep::CreateDocuments,
        WorkflowStep::DescribeTicket,
        WorkflowStep::CreateChannel,
        WorkflowStep::SetupChannel,
        WorkflowStep::Announce,
    ]
    .into_iter()
    .filter(|step| step.policy() == StepPolicy::Fatal)
    .collect::<Vec<_>>();
    assert_eq!(fatal, vec![WorkflowStep::CreateTicket, WorkflowStep::CreateChannel]);
}

#[test]
fn unit_invite_list_puts_requester_first_and_drops_bot_and_duplicates() {
    let roster = vec![
        "UONCALL".to_string(),
        "UREQ".to_string(),
        BOT.to_string(),
        " ".to_string(),
    ];
    assert_eq!(
        invite_list("UREQ", &roster, BOT),
        vec!["UREQ".to_string(), "UONCALL".to_string()]
    );
}

#[tokio::test]
async fn functional_workflow_creates_ticket_documents_and_channel_in_order() {
    let harness = harness();
    let report = run_incident_workflow(&harness.context, &fire_request(None), fired_at())
        .await
        .expect("workflow");

    assert_eq!(report.ticket_key.as_deref(), Some("FLARE-101"));
    assert_eq!(report.channel_id.as_deref(), Some("CFLARE101"));
    assert_eq!(report.documents.flare_doc_id.as_deref(), Some("doc-1"));
    assert_eq!(report.documents.history_doc_id.as_deref(), Some("doc-2"));
    assert!(report
        .steps
        .iter()
        .all(|(_, outcome)| *outcome == StepOutcome::Completed));
    assert_eq!(report.steps.len(), 8);

    let created = harness.tracker.created.lock().expect("created").clone();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].summary, "checkout errors");
    assert_eq!(created[0].priority_id, "2");
    assert_eq!(created[0].issue_type, "Bug");
    assert_eq!(created[0].assignee_account_id, "acct-ada");
    assert_eq!(
        harness.tracker.applied(),
        vec![("FLARE-101".to_string(), "In Progress".to_string())]
    );

    let copies = harness.documents.copies.lock().expect("copies").clone();
    assert_eq!(
        copies,
        vec![
            (
                "template-doc".to_string(),
                "FLARE-101: checkout errors".to_string(),
                None
            ),
            (
                "template-history".to_string(),
                "FLARE-101: checkout errors (Slack History)".to_string(),
                None
            ),
        ]
    );
    assert_eq!(harness.documents.permissions.lock().expect("perms").len(), 2);
    let replaced = harness.documents.replaced.lock().expect("replaced").clone();
    assert_eq!(replaced.len(), 1);
    assert_eq!(replaced[0].0, "doc-1");
    assert!(replaced[0].1.contains("<h1>FLARE-101</h1>"));
    assert!(replaced[0].1.contains("1/10/2024, 12:05:09 PM PT"));
    assert!(replaced[0].1.contains("spreadsheets/d/doc-2"));
    assert!(replaced[0].1.ends_with("<p>[SUMMARY]</p>"));

    let edits = harness.tracker.edits();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].1["description"]["type"], "doc");

    assert_eq!(
        harness.messaging.created_channels.lock().expect("channels").clone(),
        vec!["flare-101".to_string()]
    );
    assert_eq!(
        harness.messaging.topics.lock().expect("topics").clone(),
        vec![("CFLARE101".to_string(), "checkout errors".to_string())]
    );
    let posts = harness.messaging.posts();
    assert_eq!(posts.len(), 3);
    assert_eq!(posts[0].text, "OK, let me get my flaregun");
    assert_eq!(posts[1].channel, "CFLARE101");
    assert!(posts[1].text.starts_with("Thank you for firing a flare"));
    assert!(posts[1].blocks.is_some());
    assert_eq!(
        posts[2].text,
        "<!channel>: Flare fired. Please visit <#CFLARE101>"
    );
    assert_eq!(posts[2].channel, INDEX_CHANNEL);
    assert_eq!(
        harness.messaging.pinned.lock().expect("pinned").clone(),
        vec![("CFLARE101".to_string(), "1700000002.000100".to_string())]
    );
    assert_eq!(
        harness.messaging.invites.lock().expect("invites").clone(),
        vec![(
            "CFLARE101".to_string(),
            vec!["UREQ".to_string(), "UONCALL".to_string()]
        )]
    );

    let doc_id = harness
        .context
        .channels
        .transcript_doc_id(harness.messaging.as_ref() as &dyn MessagingClient, "CFLARE101", BOT)
        .await
        .expect("transcript id");
    assert_eq!(doc_id.as_deref(), Some("doc-2"));
    assert!(!harness.messaging.calls().contains(&"pins.list".to_string()));
}

#[tokio::test]
async fn functional_retroactive_flare_is_quiet_and_mitigated_immediately() {
    let harness = harness();
    let request = fire_request(Some(SpecialType::Retroactive));
    run_incident_workflow(&harness.context, &request, fired_at())
        .await
        .expect("workflow");

    assert_eq!(
        harness.tracker.applied(),
        vec![
            ("FLARE-101".to_string(), "In Progress".to_string()),
            ("FLARE-101".to_string(), "Mitigated".to_string()),
        ]
    );
    let texts = harness.messaging.post_texts();
    assert_eq!(
        texts.first().map(String::as_str),
        Some("OK, let me quietly set up the Flare documents. Nobody freak out, this is retroactive.")
    );
    assert_eq!(
        texts.last().map(String::as_str),
        Some("<@UREQ>: Flare fired. Please visit <#CFLARE101>")
    );
    let copies = harness.documents.copies.lock().expect("copies").clone();
    assert_eq!(copies[0].1, "FLARE-101: checkout errors (retroactive)");
}

#[tokio::test]
async fn functional_workflow_files_documents_under_year_and_ticket_folders() {
    let mut config = test_config();
    config.flare_folder_id = Some("flares-root".to_string());
    let harness = harness_with_config(config);
    harness.documents.add_folder("flares-root", "2024", "folder-year");

    run_incident_workflow(&harness.context, &fire_request(None), fired_at())
        .await
        .expect("workflow");

    let calls = harness.documents.calls.lock().expect("calls").clone();
    assert_eq!(calls[0], "find_folder");
    assert_eq!(calls[1], "create_folder");
    let folders = harness.documents.folders.lock().expect("folders").clone();
    assert!(folders.contains(&(
        "folder-year".to_string(),
        "FLARE-101".to_string(),
        "folder-FLARE-101".to_string()
    )));
    let copies = harness.documents.copies.lock().expect("copies").clone();
    assert!(copies
        .iter()
        .all(|(_, _, parent)| parent.as_deref() == Some("folder-FLARE-101")));
}

#[tokio::test]
async fn regression_ticket_failure_never_attempts_channel_creation() {
    let harness = harness();
    harness.tracker.failures.set("issue.create");

    let failure = run_incident_workflow(&harness.context, &fire_request(None), fired_at())
        .await
        .expect_err("fatal");

    assert_eq!(failure.step, WorkflowStep::CreateTicket);
    assert!(failure.message.contains("Please create a flare channel manually."));
    assert!(!harness
        .messaging
        .calls()
        .contains(&"conversations.create".to_string()));
    assert!(harness.documents.calls.lock().expect("calls").is_empty());
    let texts = harness.messaging.post_texts();
    assert_eq!(texts.len(), 2);
    assert!(texts[1].contains("Error creating Jira issue"));
}

#[tokio::test]
async fn regression_unknown_tracker_account_is_fatal() {
    let harness = harness();
    harness.tracker.accounts.lock().expect("accounts").clear();

    let failure = run_incident_workflow(&harness.context, &fire_request(None), fired_at())
        .await
        .expect_err("fatal");
    assert_eq!(failure.step, WorkflowStep::CreateTicket);
    assert!(failure.message.contains("Could not find your JIRA user account"));
    assert!(harness.tracker.created.lock().expect("created").is_empty());
}

#[tokio::test]
async fn functional_recoverable_failures_continue_with_notices() {
    let harness = harness();
    harness.tracker.failures.set("issue.transitions");
    harness.documents.failures.set("copy:template-history");

    let report = run_incident_workflow(&harness.context, &fire_request(None), fired_at())
        .await
        .expect("workflow");

    assert!(matches!(
        report.outcome(WorkflowStep::StartProgress),
        Some(StepOutcome::Recovered { .. })
    ));
    match report.outcome(WorkflowStep::CreateDocuments) {
        Some(StepOutcome::Recovered { message }) => {
            assert!(message.contains("Continuing anyway"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(report.documents.flare_doc_id.as_deref(), Some("doc-1"));
    assert_eq!(report.documents.history_doc_id, None);
    assert_eq!(
        report.outcome(WorkflowStep::DescribeTicket),
        Some(&StepOutcome::Completed)
    );
    assert_eq!(report.channel_id.as_deref(), Some("CFLARE101"));
    let notices = harness
        .messaging
        .post_texts()
        .into_iter()
        .filter(|text| text.contains("Continuing anyway"))
        .count();
    assert_eq!(notices, 2);
}

#[tokio::test]
async fn regression_description_is_skipped_without_any_document() {
    let harness = harness();
    harness.documents.failures.set("copy:template-doc");

    let report = run_incident_workflow(&harness.context, &fire_request(None), fired_at())
        .await
        .expect("workflow");
    assert_eq!(
        report.outcome(WorkflowStep::DescribeTicket),
        Some(&StepOutcome::Skipped)
    );
    assert!(harness.tracker.edits().is_empty());
    assert!(report.channel_id.is_some());
}

#[tokio::test]
async fn regression_channel_failure_names_channel_to_create_manually() {
    let harness = harness();
    harness.messaging.failures.set("conversations.create");

    let failure = run_incident_workflow(&harness.context, &fire_request(None), fired_at())
        .await
        .expect_err("fatal");
    assert_eq!(failure.step, WorkflowStep::CreateChannel);
    assert!(failure.message.contains("#flare-101"));
    assert!(!harness
        .messaging
        .post_texts()
        .iter()
        .any(|text| text.contains("Flare fired")));
}

#[tokio::test]
async fn functional_channel_setup_failure_still_announces() {
    let harness = harness();
    harness.messaging.failures.set("pins.add");

    let report = run_incident_workflow(&harness.context, &fire_request(None), fired_at())
        .await
        .expect("workflow");
    assert!(matches!(
        report.outcome(WorkflowStep::SetupChannel),
        Some(StepOutcome::Recovered { .. })
    ));
    assert!(harness.messaging.invites.lock().expect("invites").is_empty());
    assert_eq!(
        harness.messaging.post_texts().last().map(String::as_str),
        Some("<!channel>: Flare fired. Please visit <#CFLARE101>")
    );
}
