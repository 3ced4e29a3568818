use chrono::NaiveDate;
use reqwest::Method;

use super::read_data;
use crate::error::Result;
use crate::http_client::{ApiRequest, SecureClient};
use crate::models::meal::{format_report_date, LockResult, LockedMealsReport, MealOrder};
use crate::models::user::UserRef;
use crate::models::{NamedRef, Reference};

const CSV_HEADERS: [&str; 14] = [
    "_id",
    "mealDate",
    "mealType",
    "userName",
    "userPhone",
    "userEmail",
    "building",
    "flat",
    "quantity",
    "unitPrice",
    "totalPrice",
    "status",
    "isPaid",
    "createdAt",
];

/// Lock every expired meal order and deduct the cost from wallets
pub async fn lock_expired(client: &SecureClient) -> Result<LockResult> {
    tracing::info!("Locking expired meal orders");
    let request = ApiRequest::new(Method::POST, "/meals/admin/lock-expired");
    let result: LockResult = read_data(client.request(request).await?).await?;

    tracing::info!(
        locked = result.locked_count,
        deducted = result.summary.total_deducted,
        failed = result.summary.failed_count,
        "Expired meal orders locked"
    );
    Ok(result)
}

pub async fn locked_meals(client: &SecureClient, date: NaiveDate) -> Result<LockedMealsReport> {
    let path = format!("/meals/admin/locked-meals/{}", format_report_date(date));
    read_data(client.get(&path).await?).await
}

/// Distinct users charged by a lock run, in first-seen order
pub fn deducted_user_ids(result: &LockResult) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for deduction in &result.deduction_results {
        if !ids.contains(&deduction.user_id) {
            ids.push(deduction.user_id.clone());
        }
    }
    ids
}

fn user_field(user: &Option<Reference<UserRef>>, pick: fn(&UserRef) -> Option<&String>) -> String {
    user.as_ref()
        .and_then(Reference::populated)
        .and_then(pick)
        .cloned()
        .unwrap_or_default()
}

fn name_of(reference: &Option<Reference<NamedRef>>) -> String {
    reference
        .as_ref()
        .and_then(Reference::populated)
        .and_then(|r| r.name.clone())
        .unwrap_or_default()
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Render orders as CSV; every value is quoted. No orders gives an empty string.
pub fn orders_to_csv(orders: &[MealOrder]) -> String {
    if orders.is_empty() {
        return String::new();
    }

    let mut lines = vec![CSV_HEADERS.join(",")];
    for order in orders {
        let row = [
            order.id.clone(),
            opt(&order.meal_date),
            opt(&order.meal_type),
            user_field(&order.user_id, |u| u.name.as_ref()),
            user_field(&order.user_id, |u| u.phone.as_ref()),
            user_field(&order.user_id, |u| u.email.as_ref()),
            name_of(&order.building_id),
            name_of(&order.flat_id),
            opt(&order.quantity),
            opt(&order.unit_price),
            opt(&order.total_price),
            opt(&order.status),
            opt(&order.is_paid),
            opt(&order.created_at),
        ];
        lines.push(row.iter().map(|v| quote(v)).collect::<Vec<_>>().join(","));
    }

    lines.join("\n")
}
