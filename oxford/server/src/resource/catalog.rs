//! The officer pages of the portal.

use super::{ResourceConfig, StatusToggle};
use crate::form::{FieldKind, FieldSpec};
use crate::remote::SortOrder;

const ROLES: &[&str] = &[
    "Member",
    "President",
    "Secretary",
    "Treasurer",
    "Comptroller",
    "Coordinator",
    "Housing Service Representative",
];

const MEMBER_STATUSES: &[&str] = &["Active", "Inactive", "Relapsed", "Expelled"];

const FORMS_OF_PAY: &[&str] = &["Cash", "Funding"];

const MEMBER_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("name", "Full Name", FieldKind::Text).required(),
    FieldSpec::new("email", "Email", FieldKind::Email),
    FieldSpec::new("phone", "Phone Number", FieldKind::Phone).required(),
    FieldSpec::new("emergency_contact_name", "Emergency contact name", FieldKind::Text),
    FieldSpec::new("emergency_contact_phone", "Emergency contact phone", FieldKind::Phone),
    FieldSpec::new("clean_date", "Clean date", FieldKind::Date)
        .required_with("Clean Date is required"),
    FieldSpec::new("move_in_date", "Move-in date", FieldKind::Date)
        .required_with("Move-in Date is required"),
    FieldSpec::new("leave_date", "Leave date", FieldKind::Date),
    FieldSpec::new("role", "House Position", FieldKind::Choice(ROLES)).required(),
    FieldSpec::new("status", "Status", FieldKind::Choice(MEMBER_STATUSES)).required(),
    FieldSpec::new("form_of_pay", "Form of Pay", FieldKind::Choice(FORMS_OF_PAY)).required(),
    FieldSpec::new("dues_paid", "Dues Paid", FieldKind::Checkbox)
        .required_with("Dues Paid confirmation is required"),
    FieldSpec::new("position_notes", "Position notes", FieldKind::LongText),
    FieldSpec::new("notes", "Notes", FieldKind::LongText),
];

const TASK_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("title", "Title", FieldKind::Text)
        .required_with("Title and due date are required"),
    FieldSpec::new("description", "Description", FieldKind::LongText),
    FieldSpec::new("due_date", "Due date", FieldKind::Date)
        .required_with("Title and due date are required"),
];

const TASK_SUMMARY: &[&str] = &["title", "description", "due_date", "status"];

const TASK_DEFAULTS: &[(&str, &str)] = &[("status", "open")];

const TASK_STATUS: StatusToggle = StatusToggle {
    column: "status",
    off: "open",
    on: "done",
};

const MINUTES_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("meeting_date", "Date of Meeting", FieldKind::Date).required(),
    FieldSpec::new("start_time", "Start Time", FieldKind::Time),
    FieldSpec::new("end_time", "End Time", FieldKind::Time),
    FieldSpec::new("secretary_name", "Secretary Name", FieldKind::Text).required(),
    FieldSpec::new("purpose", "Purpose", FieldKind::LongText),
    FieldSpec::new("absent_members", "Absent Members", FieldKind::LongText),
    FieldSpec::new("excused_members", "Excused Members", FieldKind::LongText),
    FieldSpec::new("present_members", "Present Members", FieldKind::LongText),
    FieldSpec::new("tradition_read", "Tradition Read", FieldKind::Checkbox),
    FieldSpec::new("minutes_read", "Minutes Read", FieldKind::Checkbox),
    FieldSpec::new("treasurer_report", "Treasurer Report", FieldKind::Checkbox),
    FieldSpec::new("comptroller_report", "Comptroller Report", FieldKind::Checkbox),
    FieldSpec::new("coordinator_report", "Coordinator Report", FieldKind::Checkbox),
    FieldSpec::new("hsr_report", "HSR Report", FieldKind::Checkbox),
    FieldSpec::new("receipts_reviewed", "Receipts Reviewed", FieldKind::Checkbox),
    FieldSpec::new("audit_reviewed", "Audit Reviewed", FieldKind::Checkbox),
    FieldSpec::new("adjourn_motion", "Adjournment Motion Made", FieldKind::Checkbox),
    FieldSpec::new("unfinished_business", "Unfinished Business", FieldKind::LongText),
    FieldSpec::new("new_business", "New Business", FieldKind::LongText),
    FieldSpec::new("checking_begin", "Checking Beginning Balance ($)", FieldKind::Number),
    FieldSpec::new("checking_end", "Checking Ending Balance ($)", FieldKind::Number),
    FieldSpec::new("savings_begin", "Savings Beginning Balance ($)", FieldKind::Number),
    FieldSpec::new("savings_end", "Savings Ending Balance ($)", FieldKind::Number),
    FieldSpec::new("total_received", "Total Received ($)", FieldKind::Number),
    FieldSpec::new("total_spent", "Total Spent ($)", FieldKind::Number),
    FieldSpec::new("next_audit_date", "Next Audit Date", FieldKind::Date),
    FieldSpec::new("finalized", "Finalize minutes (cannot be edited afterwards)", FieldKind::Checkbox),
];

const REPORT_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("week_start", "Week start", FieldKind::Date).required(),
    FieldSpec::new("week_end", "Week end", FieldKind::Date).required(),
    FieldSpec::new("beginning_balance", "Beginning Balance", FieldKind::Number).required(),
    FieldSpec::new("total_received", "Total Received", FieldKind::Number).required(),
    FieldSpec::new("total_spent", "Total Spent", FieldKind::Number).required(),
    FieldSpec::new("ending_balance", "Ending Balance", FieldKind::Number).required(),
    FieldSpec::new("savings_beginning", "Savings Beg. Balance", FieldKind::Number),
    FieldSpec::new("savings_deposit", "Savings Deposits", FieldKind::Number),
    FieldSpec::new("savings_withdrawal", "Savings Withdrawals", FieldKind::Number),
    FieldSpec::new("savings_interest", "Savings Interest", FieldKind::Number),
    FieldSpec::new("savings_ending", "Savings End Balance", FieldKind::Number),
    FieldSpec::new("notes", "Notes", FieldKind::LongText),
];

pub static MEMBERS: ResourceConfig = ResourceConfig {
    slug: "members",
    table: "Members",
    title: "Member Management",
    subtitle: "Add, update, or remove members",
    noun: "Member",
    fields: MEMBER_FIELDS,
    summary: &["name", "role", "email", "phone", "move_in_date", "clean_date"],
    order: None,
    insert_defaults: &[],
    house_scoped: false,
    toggle: None,
    read_only_flag: None,
    realtime: false,
    pdf_export: false,
    delete_prompt: "Delete this member?",
    header_link: None,
};

const fn task_board(
    slug: &'static str,
    table: &'static str,
    title: &'static str,
    house_scoped: bool,
    realtime: bool,
    header_link: Option<(&'static str, &'static str)>,
) -> ResourceConfig {
    ResourceConfig {
        slug,
        table,
        title,
        subtitle: "Track the open items of this office",
        noun: "Task",
        fields: TASK_FIELDS,
        summary: TASK_SUMMARY,
        order: Some(SortOrder::ascending("due_date")),
        insert_defaults: TASK_DEFAULTS,
        house_scoped,
        toggle: Some(TASK_STATUS),
        read_only_flag: None,
        realtime,
        pdf_export: false,
        delete_prompt: "Are you sure you want to delete this task?",
        header_link,
    }
}

pub static PRESIDENT_TASKS: ResourceConfig = task_board(
    "president",
    "PresidentTasks",
    "President Dashboard",
    true,
    true,
    Some(("Meeting Agenda", "/docs/Meeting%20Agenda%20copy.pdf")),
);

pub static COMPTROLLER_TASKS: ResourceConfig = task_board(
    "comptroller",
    "ComptrollerTasks",
    "Comptroller Dashboard",
    false,
    false,
    None,
);

pub static COORDINATOR_TASKS: ResourceConfig = task_board(
    "coordinator",
    "CoordinatorTasks",
    "Coordinator Dashboard",
    false,
    false,
    None,
);

pub static HSR_TASKS: ResourceConfig = task_board(
    "hsr",
    "HsrTasks",
    "Housing Service Representative Dashboard",
    false,
    false,
    None,
);

pub static SECRETARY_MINUTES: ResourceConfig = ResourceConfig {
    slug: "secretary",
    table: "meeting_minutes",
    title: "Secretary - Weekly Meeting Minutes",
    subtitle: "Record the weekly business meeting",
    noun: "Meeting",
    fields: MINUTES_FIELDS,
    summary: &["meeting_date", "secretary_name", "purpose", "finalized"],
    order: Some(SortOrder::descending("meeting_date")),
    insert_defaults: &[],
    house_scoped: false,
    toggle: None,
    read_only_flag: Some("finalized"),
    realtime: false,
    pdf_export: true,
    delete_prompt: "Delete these minutes?",
    header_link: None,
};

pub static TREASURER_REPORTS: ResourceConfig = ResourceConfig {
    slug: "treasurer",
    table: "treasurer_reports",
    title: "Treasurer",
    subtitle: "Weekly financial reports",
    noun: "Report",
    fields: REPORT_FIELDS,
    summary: &["week_start", "week_end", "beginning_balance", "ending_balance"],
    order: Some(SortOrder::descending("week_start")),
    insert_defaults: &[],
    house_scoped: true,
    toggle: None,
    read_only_flag: None,
    realtime: false,
    pdf_export: false,
    delete_prompt: "Delete report?",
    header_link: None,
};

/// Every officer page, in sidebar order.
pub static ALL: &[&ResourceConfig] = &[
    &MEMBERS,
    &PRESIDENT_TASKS,
    &SECRETARY_MINUTES,
    &TREASURER_REPORTS,
    &COMPTROLLER_TASKS,
    &COORDINATOR_TASKS,
    &HSR_TASKS,
];
