use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::user::UserRef;
use super::{NamedRef, Reference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub meal_type: MealType,
    pub quantity: u32,
    pub price: f64,
    pub date: String,
}

/// Wallet deduction applied to one user while locking orders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductionResult {
    pub user_id: String,
    pub total_meal_cost: f64,
    pub balance_before: f64,
    pub balance_after: f64,
    pub status: String,
    #[serde(default)]
    pub meals: Vec<Meal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockSummary {
    pub total_deducted: f64,
    pub success_count: u32,
    pub failed_count: u32,
    pub total_users: u32,
}

/// Result of `POST /meals/admin/lock-expired`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockResult {
    pub locked_count: u32,
    #[serde(default)]
    pub deduction_results: Vec<DeductionResult>,
    pub summary: LockSummary,
}

/// Locked meal order; the backend populates user, building and flat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealOrder {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<Reference<UserRef>>,
    #[serde(default)]
    pub building_id: Option<Reference<NamedRef>>,
    #[serde(default)]
    pub flat_id: Option<Reference<NamedRef>>,
    #[serde(default)]
    pub meal_date: Option<String>,
    #[serde(default)]
    pub meal_type: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_locked: Option<bool>,
    #[serde(default)]
    pub is_paid: Option<bool>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Report for `GET /meals/admin/locked-meals/{date}`; fields beyond the
/// order list are kept verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockedMealsReport {
    #[serde(default)]
    pub orders: Vec<MealOrder>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Path segment format for report dates
pub fn format_report_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
