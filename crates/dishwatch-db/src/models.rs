/// Database row types — these map directly to SQLite rows.
/// Kept separate from the dishwatch-types API models so the DB layer
/// doesn't depend on the wire format.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub id: i64,
    pub timestamp: String,
    pub total_missing: i64,
    pub comment: Option<String>,
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct DishRow {
    pub id: i64,
    pub dish_id: i64,
    pub date: String,
    pub dining_hall: String,
    pub meal: String,
    pub user_id: i64,
    pub summary_id: i64,
}

/// Everything a single submission writes: one summary row plus one
/// dish row per flagged dish, all owned by one user.
#[derive(Debug, Clone)]
pub struct NewReport<'a> {
    pub username: &'a str,
    pub dish_ids: &'a [i64],
    pub date: &'a str,
    pub dining_hall: &'a str,
    pub meal: &'a str,
    pub comment: Option<&'a str>,
    pub timestamp: &'a str,
}
