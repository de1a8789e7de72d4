//! Sales analytics computed from sale records.
//!
//! [`calculate_analytics`] is pure: it does no I/O and the same input always yields the
//! same report. The server runs it over persisted sales and the client store runs it
//! over its cached projection.

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

/// Fixed commission rate charged on revenue.
pub const ADMIN_COMMISSION_RATE: Decimal = dec!(0.15);
pub const UNBRANDED: &str = "Unbranded";
pub const UNCATEGORIZED: &str = "Uncategorized";
pub const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Product snapshot attached to a sale line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecordItem {
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub price: Decimal,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub quantity: Decimal,
    #[serde(default)]
    pub product: ProductSnapshot,
}

/// The subset of a sale the aggregation reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleRecord {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<SaleRecordItem>,
}

impl SaleRecord {
    /// Revenue recomputed from the lines, ignoring any stored total.
    pub fn revenue(&self) -> Decimal {
        self.items
            .iter()
            .map(SaleRecordItem::extension)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }
}

impl SaleRecordItem {
    /// Line total; a product too large to represent counts as zero, like an unparseable value.
    pub fn extension(&self) -> Decimal {
        self.price
            .checked_mul(self.quantity)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Accepts JSON numbers and numeric strings; anything else becomes zero.
fn lenient_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_decimal(&value))
}

pub fn coerce_decimal(value: &Value) -> Decimal {
    let parse = |raw: &str| {
        let raw = raw.trim();
        Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .unwrap_or(Decimal::ZERO)
    };
    match value {
        Value::Number(n) => parse(&n.to_string()),
        Value::String(s) => parse(s),
        _ => Decimal::ZERO,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    pub month: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieData {
    pub by_brand: Vec<NamedValue>,
    pub by_category: Vec<NamedValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub total_sales: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub admin_commission: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub average_ticket: Decimal,
    pub revenue_data: Vec<MonthlyRevenue>,
    pub pie_data: PieData,
}

pub fn calculate_analytics(sales: &[SaleRecord]) -> AnalyticsReport {
    let mut monthly = [Decimal::ZERO; 12];
    let mut by_brand: HashMap<String, Decimal> = HashMap::new();
    let mut by_category: HashMap<String, Decimal> = HashMap::new();
    let mut total_revenue = Decimal::ZERO;

    for sale in sales {
        let revenue = sale.revenue();
        total_revenue = total_revenue.saturating_add(revenue);
        let bucket = &mut monthly[sale.created_at.month0() as usize];
        *bucket = bucket.saturating_add(revenue);

        for item in &sale.items {
            let extension = item.extension();
            let brand = by_brand
                .entry(label_or(&item.product.brand, UNBRANDED))
                .or_default();
            *brand = brand.saturating_add(extension);
            let category = by_category
                .entry(label_or(&item.product.category, UNCATEGORIZED))
                .or_default();
            *category = category.saturating_add(extension);
        }
    }

    let total_sales = sales.len() as u64;
    let average_ticket = if total_sales == 0 {
        Decimal::ZERO
    } else {
        (total_revenue / Decimal::from(total_sales))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    };

    AnalyticsReport {
        total_sales,
        total_revenue,
        admin_commission: total_revenue.saturating_mul(ADMIN_COMMISSION_RATE),
        average_ticket,
        revenue_data: MONTHS
            .iter()
            .zip(monthly)
            .map(|(month, revenue)| MonthlyRevenue {
                month: month.to_string(),
                revenue,
            })
            .collect(),
        pie_data: PieData {
            by_brand: ranked(by_brand),
            by_category: ranked(by_category),
        },
    }
}

fn label_or(label: &Option<String>, fallback: &str) -> String {
    label
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Descending by value, ties by name; zero entries dropped.
fn ranked(totals: HashMap<String, Decimal>) -> Vec<NamedValue> {
    let mut entries: Vec<NamedValue> = totals
        .into_iter()
        .filter(|(_, value)| !value.is_zero())
        .map(|(name, value)| NamedValue { name, value })
        .collect();
    entries.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::json;

    fn item(price: Decimal, quantity: i64, brand: Option<&str>, category: Option<&str>) -> SaleRecordItem {
        SaleRecordItem {
            price,
            quantity: Decimal::from(quantity),
            product: ProductSnapshot {
                name: Some("Item".into()),
                brand: brand.map(String::from),
                category: category.map(String::from),
            },
        }
    }

    fn sale(month: u32, items: Vec<SaleRecordItem>) -> SaleRecord {
        SaleRecord {
            created_at: Utc.with_ymd_and_hms(2024, month, 15, 12, 0, 0).unwrap(),
            items,
        }
    }

    #[test]
    fn empty_input_has_zero_totals_and_twelve_months() {
        let report = calculate_analytics(&[]);
        assert_eq!(report.total_sales, 0);
        assert_eq!(report.total_revenue, Decimal::ZERO);
        assert_eq!(report.average_ticket, Decimal::ZERO);
        assert_eq!(report.admin_commission, Decimal::ZERO);
        assert_eq!(report.revenue_data.len(), 12);
        assert_eq!(report.revenue_data[0].month, "Jan");
        assert_eq!(report.revenue_data[11].month, "Dec");
        assert!(report.pie_data.by_brand.is_empty());
    }

    #[test]
    fn revenue_is_recomputed_from_lines() {
        let sales = vec![
            sale(1, vec![item(dec!(10.00), 2, Some("Acme"), Some("Shoes"))]),
            sale(
                3,
                vec![
                    item(dec!(5.50), 1, Some("Zeta"), Some("Hats")),
                    item(dec!(4.50), 1, None, None),
                ],
            ),
        ];
        let report = calculate_analytics(&sales);
        assert_eq!(report.total_sales, 2);
        assert_eq!(report.total_revenue, dec!(30.00));
        assert_eq!(report.admin_commission, dec!(4.5));
        assert_eq!(report.average_ticket, dec!(15.00));
        assert_eq!(report.revenue_data[0].revenue, dec!(20.00));
        assert_eq!(report.revenue_data[1].revenue, Decimal::ZERO);
        assert_eq!(report.revenue_data[2].revenue, dec!(10.00));

        let brands: Vec<&str> = report
            .pie_data
            .by_brand
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(brands, vec!["Acme", "Zeta", UNBRANDED]);
        assert_eq!(report.pie_data.by_category[2].name, UNCATEGORIZED);
    }

    #[test]
    fn ties_break_by_name_and_zero_values_drop() {
        let sales = vec![sale(
            6,
            vec![
                item(dec!(3), 1, Some("Beta"), None),
                item(dec!(3), 1, Some("Alpha"), None),
                item(dec!(9), 0, Some("Ghost"), None),
            ],
        )];
        let report = calculate_analytics(&sales);
        let brands: Vec<&str> = report
            .pie_data
            .by_brand
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(brands, vec!["Alpha", "Beta"]);
    }

    #[test]
    fn average_ticket_rounds_half_away_from_zero() {
        let sales = vec![
            sale(2, vec![item(dec!(0.01), 1, None, None)]),
            sale(2, vec![item(dec!(0.00), 1, None, None)]),
        ];
        assert_eq!(calculate_analytics(&sales).average_ticket, dec!(0.01));
    }

    #[test]
    fn numeric_fields_are_coerced_leniently() {
        let record: SaleRecord = serde_json::from_value(json!({
            "createdAt": "2024-05-01T10:00:00Z",
            "items": [
                {"price": "12.50", "quantity": "2", "product": {"brand": "Acme"}},
                {"price": 1e1, "quantity": 1},
                {"price": "abc", "quantity": null}
            ]
        }))
        .unwrap();
        assert_eq!(record.items[0].price, dec!(12.50));
        assert_eq!(record.items[0].quantity, dec!(2));
        assert_eq!(record.items[1].price, dec!(10));
        assert_eq!(record.items[2].price, Decimal::ZERO);
        assert_eq!(record.items[2].quantity, Decimal::ZERO);
        assert_eq!(record.revenue(), dec!(35.00));
    }

    #[test]
    fn unrepresentable_lines_count_as_zero() {
        let huge: SaleRecord = serde_json::from_value(json!({
            "createdAt": "2024-05-02T10:00:00Z",
            "items": [
                { "price": "79228162514264337593543950335", "quantity": "2", "product": { "brand": "Acme" } },
                { "price": "10", "quantity": "3", "product": { "brand": "Acme" } }
            ]
        }))
        .unwrap();

        let report = calculate_analytics(&[huge]);
        assert_eq!(report.total_revenue, dec!(30));
        assert_eq!(report.revenue_data[4].revenue, dec!(30));
        assert_eq!(report.pie_data.by_brand[0].value, dec!(30));
    }

    #[test]
    fn totals_saturate_instead_of_overflowing() {
        let near_max: SaleRecord = serde_json::from_value(json!({
            "createdAt": "2024-01-10T10:00:00Z",
            "items": [{ "price": "79228162514264337593543950335", "quantity": "1" }]
        }))
        .unwrap();

        let report = calculate_analytics(&[near_max.clone(), near_max]);
        assert_eq!(report.total_sales, 2);
        assert_eq!(report.total_revenue, Decimal::MAX);
        assert!(report.admin_commission > Decimal::ZERO);
        assert_eq!(report.pie_data.by_brand[0].name, UNBRANDED);
    }

    #[test]
    fn report_serializes_figures_as_numbers() {
        let report = calculate_analytics(&[sale(1, vec![item(dec!(2.5), 2, None, None)])]);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["totalRevenue"], json!(5.0));
        assert_eq!(value["revenueData"][0], json!({"month": "Jan", "revenue": 5.0}));
        assert_eq!(value["pieData"]["byBrand"][0]["name"], json!(UNBRANDED));
    }

    fn arb_sale() -> impl Strategy<Value = SaleRecord> {
        let arb_item = (0i64..100_000, 0i64..20, prop::option::of("[A-C]"), prop::option::of("[X-Z]"))
            .prop_map(|(cents, qty, brand, category)| {
                item(Decimal::new(cents, 2), qty, brand.as_deref(), category.as_deref())
            });
        (1u32..=12, prop::collection::vec(arb_item, 0..5)).prop_map(|(m, items)| sale(m, items))
    }

    proptest! {
        #[test]
        fn monthly_buckets_sum_to_total(sales in prop::collection::vec(arb_sale(), 0..20)) {
            let report = calculate_analytics(&sales);
            prop_assert_eq!(report.revenue_data.len(), 12);
            let monthly: Decimal = report.revenue_data.iter().map(|m| m.revenue).sum();
            prop_assert_eq!(monthly, report.total_revenue);
            let brands: Decimal = report.pie_data.by_brand.iter().map(|e| e.value).sum();
            prop_assert_eq!(brands, report.total_revenue);
            prop_assert_eq!(report.total_sales, sales.len() as u64);
        }

        #[test]
        fn breakdowns_are_sorted_and_positive(sales in prop::collection::vec(arb_sale(), 0..20)) {
            let report = calculate_analytics(&sales);
            for pair in report.pie_data.by_category.windows(2) {
                prop_assert!(pair[0].value >= pair[1].value);
            }
            prop_assert!(report.pie_data.by_category.iter().all(|e| e.value > Decimal::ZERO));
        }

        #[test]
        fn aggregation_is_deterministic(sales in prop::collection::vec(arb_sale(), 0..10)) {
            prop_assert_eq!(calculate_analytics(&sales), calculate_analytics(&sales));
        }
    }
}
