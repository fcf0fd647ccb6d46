use chrono::{DateTime, Utc};
use colored::*;
use formulary::api::{CmdMessage, MessageLevel};
use formulary::model::{DrugRecord, StatusMode};
use formulary::state::ListingState;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const LINE_WIDTH: usize = 120;
const ID_WIDTH: usize = 36;
const CODE_WIDTH: usize = 12;
const CATEGORY_WIDTH: usize = 16;
const TIME_WIDTH: usize = 16;

pub fn print_messages(messages: &[CmdMessage]) {
    for message in messages {
        match message.level {
            MessageLevel::Info => println!("{}", message.content.dimmed()),
            MessageLevel::Success => println!("{}", message.content.green()),
            MessageLevel::Warning => println!("{}", message.content.yellow()),
            MessageLevel::Error => println!("{}", message.content.red()),
        }
    }
}

pub fn print_listing(state: &ListingState) {
    if state.records().is_empty() {
        println!("No drugs found.");
    } else {
        for record in state.records() {
            println!("{}", format_row(record, state.status()));
        }
    }
    println!(
        "{}",
        format!(
            "Page {} of {} ({} drugs)",
            state.current_page(),
            state.total_pages(),
            state.total_count()
        )
        .dimmed()
    );
}

fn format_row(record: &DrugRecord, status: StatusMode) -> String {
    let code = pad_to_width(&truncate_to_width(&record.drug_code, CODE_WIDTH), CODE_WIDTH);
    let category = pad_to_width(
        &truncate_to_width(&record.category, CATEGORY_WIDTH),
        CATEGORY_WIDTH,
    );

    let (detail, suffix) = match status {
        StatusMode::Active => (
            format!("{} ({})", record.trade_name, record.generic_name),
            String::new(),
        ),
        StatusMode::Decommissioned => (
            format!(
                "{}: {}",
                record.trade_name,
                record.remarks.as_deref().unwrap_or_default()
            ),
            record
                .decommissioned_at
                .map(format_time_ago)
                .unwrap_or_default(),
        ),
    };

    let fixed = ID_WIDTH + CODE_WIDTH + CATEGORY_WIDTH + TIME_WIDTH + 4;
    let available = LINE_WIDTH.saturating_sub(fixed);
    let detail = pad_to_width(&truncate_to_width(&detail, available), available);

    let code = match status {
        StatusMode::Active => code.bold(),
        StatusMode::Decommissioned => code.red(),
    };

    format!(
        "{} {} {} {} {}",
        record.id.to_string().dimmed(),
        code,
        detail,
        category.cyan(),
        format!("{:>width$}", suffix, width = TIME_WIDTH).dimmed()
    )
}

fn pad_to_width(s: &str, width: usize) -> String {
    let padding = width.saturating_sub(s.width());
    format!("{}{}", s, " ".repeat(padding))
}

pub fn truncate_to_width(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }

    let mut result = String::new();
    let mut current_width = 0;
    for c in s.chars() {
        let char_width = c.width().unwrap_or(0);
        if current_width + char_width > max_width.saturating_sub(1) {
            break;
        }
        result.push(c);
        current_width += char_width;
    }
    result.push('…');
    result
}

fn format_time_ago(timestamp: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(timestamp);
    let formatter = timeago::Formatter::new();
    formatter.convert(duration.to_std().unwrap_or_default())
}
