use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::debug;

use dishwatch_types::models::MenuItem;

#[derive(Debug, thiserror::Error)]
pub enum MenuError {
    /// Non-2xx from the menu provider. Surfaces the status so the UI
    /// can show it; the operation is aborted, no retries.
    #[error("menu provider returned {0}")]
    Provider(reqwest::StatusCode),
    #[error("menu request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Client for the menu provider's weekly endpoint. The provider always
/// returns the whole week (Sunday to Saturday) containing the requested
/// date; callers narrow it down with [`todays_items`].
#[derive(Clone)]
pub struct MenuClient {
    http: reqwest::Client,
    base_url: String,
}

impl MenuClient {
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub async fn week_menu(
        &self,
        date: NaiveDate,
        location_id: u32,
        meal_id: u32,
    ) -> Result<Vec<MenuItem>, MenuError> {
        let url = format!("{}/api/menu-items/week", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("date", date.format("%Y-%m-%d").to_string()),
                ("locationId", location_id.to_string()),
                ("mealId", meal_id.to_string()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(MenuError::Provider(resp.status()));
        }

        let items: Vec<MenuItem> = resp.json().await?;
        debug!(
            location_id,
            meal_id,
            count = items.len(),
            "fetched weekly menu"
        );
        Ok(items)
    }
}

/// Narrow a week of provider records to a single day: keep only items
/// dated `today` and drop duplicate dish ids, preserving first-seen
/// order. An empty result is normal (no service that day).
pub fn todays_items(items: Vec<MenuItem>, today: NaiveDate) -> Vec<MenuItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| item_date(&item.date) == Some(today))
        .filter(|item| seen.insert(item.id))
        .collect()
}

/// Provider dates come as "YYYY-MM-DD" or "YYYY-MM-DDTHH:MM:SS"; only
/// the calendar day matters.
fn item_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, date: &str) -> MenuItem {
        MenuItem {
            id,
            name: format!("dish-{id}"),
            station_name: "Grill".into(),
            date: date.into(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 30).unwrap()
    }

    #[test]
    fn keeps_only_todays_date() {
        let week = vec![
            item(1, "2026-08-29T00:00:00"),
            item(2, "2026-08-30T00:00:00"),
            item(3, "2026-08-31T00:00:00"),
            item(4, "2026-08-30"),
        ];

        let ids: Vec<i64> = todays_items(week, today()).iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[test]
    fn drops_duplicate_dish_ids_keeping_first() {
        let week = vec![
            item(7, "2026-08-30T00:00:00"),
            item(8, "2026-08-30T00:00:00"),
            item(7, "2026-08-30T00:00:00"),
        ];

        let filtered = todays_items(week, today());
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].id, 7);
        assert_eq!(filtered[1].id, 8);
    }

    #[test]
    fn unparseable_dates_are_dropped() {
        let week = vec![item(1, "soon"), item(2, "2026-08-30T11:00:00")];
        let filtered = todays_items(week, today());
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, 2);
    }

    #[test]
    fn empty_week_yields_empty_day() {
        assert!(todays_items(vec![], today()).is_empty());
    }

    #[test]
    fn provider_json_shape_parses() {
        let raw = r#"[{"id": 42, "name": "Tofu Scramble", "stationName": "Vegan", "date": "2026-08-30T00:00:00", "price": null}]"#;
        let items: Vec<MenuItem> = serde_json::from_str(raw).unwrap();
        assert_eq!(items[0].id, 42);
        assert_eq!(items[0].station_name, "Vegan");
    }
}
