//! Tolerant normalization of requested items.
//!
//! Guest clients are not trustworthy about shape: items arrive as structured
//! objects, as JSON-encoded strings inside the array, or as malformed strings
//! that still carry a recognizable `product_id`/`quantity` pair. Everything
//! unparseable is dropped with a warning here so the pricing and ledger code
//! only ever sees a typed list.

use crate::server::model::item::ItemRequest;
use log::warn;
use serde_json::Value;

/// upper bound on a freeform unit price, in minor units; anything above is
/// treated as garbage input
const MAX_UNIT_PRICE: i64 = 100_000_000;

pub(crate) fn normalize_items(raw: &[Value]) -> Vec<ItemRequest> {
    let mut items = Vec::with_capacity(raw.len());
    for value in raw {
        let parsed = match value {
            Value::Object(map) => from_object(map),
            Value::String(s) => from_string(s),
            other => {
                warn!("dropping item with unsupported shape: {}", other);
                None
            }
        };
        match parsed {
            Some(item) => items.push(item),
            None => warn!("dropping unparseable item: {}", value),
        }
    }
    items
}

fn from_object(map: &serde_json::Map<String, Value>) -> Option<ItemRequest> {
    let product_id = int_field(map, &["product_id", "id"]);
    let external_id = str_field(map, &["external_id", "catalog_object_id"]);
    let name = str_field(map, &["name", "product_name"]);

    if product_id.is_none() && external_id.is_none() && name.is_none() {
        return None;
    }

    let quantity = match int_field(map, &["quantity", "qty"]) {
        Some(q) if q > 0 && q <= i32::MAX as i64 => q as i32,
        Some(q) => {
            warn!("dropping item with unusable quantity={}", q);
            return None;
        }
        None => 1,
    };

    let unit_price = match int_field(map, &["unit_price", "price"]) {
        Some(p) if (0..=MAX_UNIT_PRICE).contains(&p) => Some(p),
        Some(p) => {
            warn!("dropping item with unusable price={}", p);
            return None;
        }
        None => None,
    };

    Some(ItemRequest {
        product_id,
        external_id,
        name,
        unit_price,
        quantity,
        note: str_field(map, &["note"]),
    })
}

/// Strings are first retried as JSON; failing that, a `product_id` and
/// `quantity` are scraped out of the raw text.
fn from_string(s: &str) -> Option<ItemRequest> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(s) {
        return from_object(&map);
    }

    let product_id = scrape_int(s, "product_id")?;
    let quantity = match scrape_int(s, "quantity") {
        Some(q) if q > 0 && q <= i32::MAX as i64 => q as i32,
        Some(_) => return None,
        None => 1,
    };
    Some(ItemRequest {
        product_id: Some(product_id),
        quantity,
        ..ItemRequest::default()
    })
}

/// First run of digits following `key`, if any.
fn scrape_int(s: &str, key: &str) -> Option<i64> {
    let start = s.find(key)? + key.len();
    let rest = &s[start..];
    let digits: String = rest
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn int_field(map: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<i64> {
    for key in keys {
        match map.get(*key) {
            Some(Value::Number(n)) => return n.as_i64(),
            Some(Value::String(s)) => {
                if let Ok(n) = s.trim().parse() {
                    return Some(n);
                }
            }
            _ => {}
        }
    }
    None
}

fn str_field(map: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(Value::String(s)) = map.get(*key) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structured_object_passes_through() {
        let items = normalize_items(&[json!({
            "product_id": 7,
            "name": "Coffee",
            "price": 500,
            "quantity": 2
        })]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id, Some(7));
        assert_eq!(items[0].name.as_deref(), Some("Coffee"));
        assert_eq!(items[0].unit_price, Some(500));
        assert_eq!(items[0].quantity, 2);
    }

    #[test]
    fn json_encoded_string_is_reparsed() {
        let items = normalize_items(&[json!(r#"{"product_id": 3, "quantity": "4"}"#)]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id, Some(3));
        assert_eq!(items[0].quantity, 4);
    }

    #[test]
    fn malformed_string_is_scraped() {
        let items = normalize_items(&[json!("product_id=12;quantity:3 (from app v1.2)")]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id, Some(12));
        assert_eq!(items[0].quantity, 3);
    }

    #[test]
    fn quantity_defaults_to_one() {
        let items = normalize_items(&[json!({"product_id": 5})]);
        assert_eq!(items[0].quantity, 1);
    }

    #[test]
    fn out_of_range_prices_are_dropped() {
        let items = normalize_items(&[
            json!({"name": "x", "price": i64::MAX, "quantity": 2}),
            json!({"name": "y", "price": -500}),
            json!({"name": "z", "price": 500}),
        ]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name.as_deref(), Some("z"));
    }

    #[test]
    fn garbage_is_dropped_not_fatal() {
        let items = normalize_items(&[
            json!({"product_id": 1}),
            json!(42),
            json!("no ids in here"),
            json!({"note": "no reference at all"}),
            json!({"product_id": 2, "quantity": -1}),
        ]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id, Some(1));
    }
}
