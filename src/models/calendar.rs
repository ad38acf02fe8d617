use async_graphql::SimpleObject;
use time::{Date, OffsetDateTime};

use crate::models::event::Event;
use crate::util::{format_iso_date, local_offset};

/// The tags staff can filter the calendar by.
pub const TAG_OPTIONS: [&str; 5] = ["Academic", "Social", "Sport", "Cultural", "Career"];

/// Matches every event.
pub const ALL_TAGS: &str = "All";

/// The staff event calendar for one selected day.
#[derive(SimpleObject)]
pub struct Calendar {
    /// The selected day, as `YYYY-MM-DD`
    pub selected_date: String,
    /// The tag events are filtered by, or "All"
    pub tag_filter: String,
    pub tag_options: Vec<String>,
    /// Events on the selected day that match the filter
    pub events_on_date: Vec<Event>,
    /// Every event that matches the filter
    pub events: Vec<Event>,
    /// The days (`YYYY-MM-DD`) with at least one matching event
    pub event_days: Vec<String>,
}

impl Calendar {
    /// Builds the calendar from events already sorted by date.
    pub fn build(events: Vec<Event>, selected: Date, tag: Option<&str>) -> Self {
        let tag_filter = match tag.map(str::trim) {
            None | Some("") => ALL_TAGS,
            Some(tag) => tag,
        };

        let events = events
            .into_iter()
            .filter(|event| matches_tag(event, tag_filter))
            .collect::<Vec<_>>();

        let mut event_days = Vec::new();
        let mut events_on_date = Vec::new();
        for event in &events {
            if let Some(day) = event.datetime().map(local_date) {
                let day_str = format_iso_date(day);
                if !event_days.contains(&day_str) {
                    event_days.push(day_str);
                }
                if day == selected {
                    events_on_date.push(event.clone());
                }
            }
        }

        Self {
            selected_date: format_iso_date(selected),
            tag_filter: tag_filter.to_owned(),
            tag_options: TAG_OPTIONS.iter().map(|tag| tag.to_string()).collect(),
            events_on_date,
            events,
            event_days,
        }
    }
}

fn local_date(time: OffsetDateTime) -> Date {
    time.to_offset(local_offset()).date()
}

fn matches_tag(event: &Event, tag: &str) -> bool {
    tag == ALL_TAGS || event.tags.iter().any(|existing| existing == tag)
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use super::*;
    use crate::store::Timestamp;

    fn event(id: &str, at: OffsetDateTime, tags: &[&str]) -> Event {
        Event {
            id: id.to_owned(),
            title: id.to_owned(),
            date: Some(Timestamp::from(at.to_offset(local_offset()))),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            ..Event::default()
        }
    }

    fn events() -> Vec<Event> {
        let offset = local_offset();
        vec![
            event(
                "fair",
                datetime!(2025-04-30 10:00).assume_offset(offset),
                &["Career"],
            ),
            event(
                "workshop",
                datetime!(2025-05-02 14:00).assume_offset(offset),
                &["Academic"],
            ),
            event(
                "showcase",
                datetime!(2025-05-02 19:00).assume_offset(offset),
                &["Social", "Career"],
            ),
        ]
    }

    #[test]
    fn selects_events_on_the_chosen_day() {
        let calendar = Calendar::build(events(), date!(2025 - 05 - 02), None);

        let on_date = calendar
            .events_on_date
            .iter()
            .map(|e| e.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(on_date, ["workshop", "showcase"]);
        assert_eq!(calendar.tag_filter, "All");
        assert_eq!(calendar.event_days, ["2025-04-30", "2025-05-02"]);
        assert_eq!(calendar.events.len(), 3);
    }

    #[test]
    fn tag_filter_applies_to_every_list() {
        let calendar = Calendar::build(events(), date!(2025 - 05 - 02), Some("Career"));

        let filtered = calendar
            .events
            .iter()
            .map(|e| e.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(filtered, ["fair", "showcase"]);
        assert_eq!(calendar.events_on_date.len(), 1);
        assert_eq!(calendar.event_days, ["2025-04-30", "2025-05-02"]);
    }

    #[test]
    fn days_without_events_are_empty() {
        let calendar = Calendar::build(events(), date!(2025 - 05 - 05), Some("Sport"));

        assert!(calendar.events.is_empty());
        assert!(calendar.events_on_date.is_empty());
        assert!(calendar.event_days.is_empty());
        assert_eq!(calendar.tag_options.len(), 5);
    }
}
