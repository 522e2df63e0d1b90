//! Mock calendar tools

use chrono::{Duration, Local, NaiveDate};
use serde_json::Value;

use super::int_arg;
use crate::tools::{ToolFn, ToolOutput, ToolParam, tool};

struct Event {
    title: &'static str,
    days_from_now: i64,
    start: &'static str,
    minutes: u32,
    attendees: u32,
    calendar: &'static str,
}

const EVENTS: [Event; 5] = [
    Event {
        title: "Team Standup",
        days_from_now: 1,
        start: "09:00",
        minutes: 30,
        attendees: 5,
        calendar: "Work",
    },
    Event {
        title: "Project Review with Stakeholders",
        days_from_now: 1,
        start: "14:00",
        minutes: 60,
        attendees: 8,
        calendar: "Work",
    },
    Event {
        title: "Dentist Appointment",
        days_from_now: 2,
        start: "10:30",
        minutes: 60,
        attendees: 1,
        calendar: "Personal",
    },
    Event {
        title: "Coffee with Sarah",
        days_from_now: 3,
        start: "15:00",
        minutes: 45,
        attendees: 2,
        calendar: "Personal",
    },
    Event {
        title: "Quarterly Planning Meeting",
        days_from_now: 5,
        start: "10:00",
        minutes: 120,
        attendees: 12,
        calendar: "Work",
    },
];

/// Working-day slots checked by `find_free_time`
const SLOTS: [&str; 8] = ["09:00", "10:00", "11:00", "13:00", "14:00", "15:00", "16:00", "17:00"];

pub(super) fn tools() -> Vec<ToolFn> {
    vec![
        ToolFn::new("list_events", list_events)
            .with_doc("List upcoming calendar events.")
            .with_param(ToolParam::optional("days_ahead", "integer", "Number of days to look ahead"))
            .with_param(ToolParam::optional("calendar_name", "string", "Calendar name to filter by"))
            .mark(
                tool("calendar")
                    .description("List upcoming calendar events")
                    .tags(["calendar", "event", "list", "schedule", "agenda"])
                    .mock(true),
            ),
        ToolFn::new("find_free_time", find_free_time)
            .with_doc("Find available one-hour slots on a given day.")
            .with_param(ToolParam::optional("days_from_now", "integer", "Day to check, 0 for today"))
            .mark(
                tool("calendar")
                    .description("Find available time slots in the calendar")
                    .tags(["calendar", "availability", "free", "schedule", "time"])
                    .mock(true),
            ),
    ]
}

fn date_for(days_from_now: i64) -> NaiveDate {
    Local::now().date_naive() + Duration::days(days_from_now)
}

fn list_events(args: &Value) -> ToolOutput {
    let days_ahead = int_arg(args, "days_ahead", 7, 1, 60);
    let calendar = args["calendar_name"].as_str().unwrap_or("all");

    let matching: Vec<&Event> = EVENTS
        .iter()
        .filter(|e| e.days_from_now <= days_ahead)
        .filter(|e| calendar.eq_ignore_ascii_case("all") || e.calendar.eq_ignore_ascii_case(calendar))
        .collect();

    if matching.is_empty() {
        return ToolOutput::success(format!(
            "📅 No events found in the next {} days for calendar '{}'.",
            days_ahead, calendar
        ));
    }

    let mut lines = vec![format!("📅 **Your Upcoming Events (Next {} Days)**", days_ahead)];
    let mut current_day = None;
    for (i, event) in matching.iter().enumerate() {
        if current_day != Some(event.days_from_now) {
            current_day = Some(event.days_from_now);
            lines.push(String::new());
            lines.push(format!("{}:", date_for(event.days_from_now).format("%A, %B %-d, %Y")));
        }
        lines.push(format!(
            "{}. 🕐 {} ({} min) | {} [{}]",
            i + 1,
            event.start,
            event.minutes,
            event.title,
            event.calendar
        ));
        lines.push(format!("   👥 {} attendees", event.attendees));
    }

    ToolOutput::success(lines.join("\n"))
}

fn find_free_time(args: &Value) -> ToolOutput {
    let day = int_arg(args, "days_from_now", 1, 0, 60);
    let busy: Vec<&str> = EVENTS
        .iter()
        .filter(|e| e.days_from_now == day)
        .map(|e| e.start)
        .collect();

    // an event starting at HH:30 blocks the HH:00 slot too
    let free: Vec<&str> = SLOTS
        .iter()
        .copied()
        .filter(|slot| !busy.iter().any(|b| b[..2] == slot[..2]))
        .collect();

    let date = date_for(day).format("%A, %B %-d, %Y");
    if free.is_empty() {
        return ToolOutput::success(format!("🗓️ No free one-hour slots on {}.", date));
    }
    ToolOutput::success(format!("🗓️ Free slots on {}:\n{}", date, free.join(", ")))
}
