use serde::{Deserialize, Serialize};

/// One (hall, meal) service slot and the numeric IDs the menu provider
/// uses for it. The provider addresses menus by locationId/mealId, not
/// by name, so every hall/meal pair the app offers must appear here.
#[derive(Debug, Clone, Copy)]
pub struct MealSlot {
    pub hall: &'static str,
    pub meal: &'static str,
    pub location_id: u32,
    pub meal_id: u32,
}

pub const MEAL_SLOTS: &[MealSlot] = &[
    MealSlot { hall: "Bae", meal: "Breakfast", location_id: 96, meal_id: 148 },
    MealSlot { hall: "Bae", meal: "Lunch", location_id: 96, meal_id: 149 },
    MealSlot { hall: "Bae", meal: "Dinner", location_id: 96, meal_id: 312 },
    MealSlot { hall: "Bates", meal: "Breakfast", location_id: 95, meal_id: 145 },
    MealSlot { hall: "Bates", meal: "Lunch", location_id: 95, meal_id: 146 },
    MealSlot { hall: "Bates", meal: "Dinner", location_id: 95, meal_id: 311 },
    MealSlot { hall: "Stone", meal: "Breakfast", location_id: 131, meal_id: 261 },
    MealSlot { hall: "Stone", meal: "Lunch", location_id: 131, meal_id: 262 },
    MealSlot { hall: "Stone", meal: "Dinner", location_id: 131, meal_id: 263 },
    MealSlot { hall: "Tower", meal: "Breakfast", location_id: 97, meal_id: 153 },
    MealSlot { hall: "Tower", meal: "Lunch", location_id: 97, meal_id: 154 },
    MealSlot { hall: "Tower", meal: "Dinner", location_id: 97, meal_id: 310 },
];

/// Sorted, de-duplicated hall names.
pub fn halls() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = MEAL_SLOTS.iter().map(|s| s.hall).collect();
    names.sort_unstable();
    names.dedup();
    names
}

/// Sorted, de-duplicated meal names.
pub fn meals() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = MEAL_SLOTS.iter().map(|s| s.meal).collect();
    names.sort_unstable();
    names.dedup();
    names
}

/// Resolve a (hall, meal) pair to the provider's (locationId, mealId).
pub fn provider_ids(hall: &str, meal: &str) -> Option<(u32, u32)> {
    MEAL_SLOTS
        .iter()
        .find(|s| s.hall == hall && s.meal == meal)
        .map(|s| (s.location_id, s.meal_id))
}

/// A dish record as the menu provider returns it. The `date` field is
/// the provider's string form (date, sometimes with a time component);
/// filtering to a calendar day happens in dishwatch-menu.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: i64,
    pub name: String,
    #[serde(rename = "stationName")]
    pub station_name: String,
    pub date: String,
}
