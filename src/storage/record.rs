use bson::oid::ObjectId;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};

/// A schemaless document stored in a collection.
///
/// Field order is preserved, both in memory and on disk.
pub type Record = Map<String, Value>;

/// An exact-match filter. A record matches when every field in the query is
/// present in the record with an equal value. An empty query matches
/// everything.
pub type Query = Map<String, Value>;

/// The field holding a record's unique, immutable identifier.
pub const ID_FIELD: &str = "_id";

/// An identifier field from older data files, still honored on lookup.
pub const LEGACY_ID_FIELD: &str = "id";

/// Set once, when the record is created.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Refreshed on every successful update.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Generates a new record identifier.
///
/// ObjectIds combine a timestamp, a per-process random value and an
/// atomically incremented counter, so two ids created in the same
/// millisecond still differ.
pub fn new_id() -> String {
    ObjectId::new().to_hex()
}

/// Formats a timestamp the way it's stored in a record
/// (e.g. `2026-10-16T09:30:00.123Z`).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn is_system_field(key: &str) -> bool {
    matches!(key, ID_FIELD | CREATED_AT_FIELD | UPDATED_AT_FIELD)
}

/// Builds a stored record from caller supplied fields.
///
/// The result starts with a fresh `_id`, followed by the caller's fields in
/// their original order, then `createdAt` and `updatedAt`. Any system fields
/// the caller passed in are replaced.
pub fn new_record(fields: Record) -> Record {
    let now = Value::String(format_timestamp(Utc::now()));
    let mut record = Record::with_capacity(fields.len() + 3);
    record.insert(ID_FIELD.to_string(), Value::String(new_id()));
    for (key, value) in fields {
        if !is_system_field(&key) {
            record.insert(key, value);
        }
    }
    record.insert(CREATED_AT_FIELD.to_string(), now.clone());
    record.insert(UPDATED_AT_FIELD.to_string(), now);
    record
}

/// Merges `patch` over `record` in place.
///
/// Patch fields overwrite existing ones and new fields are appended.
/// `_id` and `createdAt` can't be changed through a patch. `updatedAt` is
/// set to now, or kept if the stored value is somehow ahead of the clock,
/// so it never moves backwards.
pub fn apply_patch(record: &mut Record, patch: Record) {
    for (key, value) in patch {
        if !is_system_field(&key) {
            record.insert(key, value);
        }
    }

    let now = Utc::now();
    let updated_at = match record.get(UPDATED_AT_FIELD).and_then(parse_timestamp) {
        Some(previous) if previous > now => previous,
        _ => now,
    };
    record.insert(
        UPDATED_AT_FIELD.to_string(),
        Value::String(format_timestamp(updated_at)),
    );
}

/// Checks whether the record is identified by `id`, either through its
/// `_id` or a legacy `id` field.
pub fn has_id(record: &Record, id: &str) -> bool {
    [ID_FIELD, LEGACY_ID_FIELD]
        .iter()
        .any(|field| record.get(*field).and_then(Value::as_str) == Some(id))
}

/// Checks whether the record satisfies every condition in the query.
pub fn matches(record: &Record, query: &Query) -> bool {
    query.iter().all(|(key, expected)| {
        record
            .get(key)
            .is_some_and(|actual| values_equal(actual, expected))
    })
}

/// Structural JSON equality, except that numbers compare by value
/// (`1` equals `1.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn rec(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn new_record_layout() {
        let r = new_record(rec(json!({
            "name": "Rust Basics",
            "price": 4999,
        })));
        let keys: Vec<_> = r.keys().map(String::as_str).collect();
        assert_eq!(keys, ["_id", "name", "price", "createdAt", "updatedAt"]);
        assert_eq!(r[CREATED_AT_FIELD], r[UPDATED_AT_FIELD]);
        assert!(parse_timestamp(&r[CREATED_AT_FIELD]).is_some());
    }

    #[test]
    fn new_record_replaces_system_fields() {
        let r = new_record(rec(json!({
            "_id": "mine",
            "createdAt": "yesterday",
            "title": "x",
        })));
        assert_ne!(r[ID_FIELD], json!("mine"));
        assert_ne!(r[CREATED_AT_FIELD], json!("yesterday"));
        assert_eq!(r["title"], json!("x"));
    }

    #[test]
    fn ids_differ_within_the_same_millisecond() {
        let ids: std::collections::HashSet<_> = (0..10_000).map(|_| new_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn timestamp_format() {
        let at = DateTime::parse_from_rfc3339("2026-10-16T09:30:00.123456Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(at), "2026-10-16T09:30:00.123Z");
    }

    #[test]
    fn patch_keeps_identity_and_order() {
        let mut r = rec(json!({
            "_id": "abc",
            "name": "A",
            "mode": "Online",
            "createdAt": "2020-01-01T00:00:00.000Z",
            "updatedAt": "2020-01-01T00:00:00.000Z",
        }));
        apply_patch(
            &mut r,
            rec(json!({
                "_id": "evil",
                "createdAt": "1999-01-01T00:00:00.000Z",
                "mode": "Offline",
                "seats": 30,
            })),
        );
        assert_eq!(r[ID_FIELD], json!("abc"));
        assert_eq!(r[CREATED_AT_FIELD], json!("2020-01-01T00:00:00.000Z"));
        assert_eq!(r["name"], json!("A"));
        assert_eq!(r["mode"], json!("Offline"));
        assert_eq!(r["seats"], json!(30));
        assert_ne!(r[UPDATED_AT_FIELD], json!("2020-01-01T00:00:00.000Z"));

        let keys: Vec<_> = r.keys().map(String::as_str).collect();
        assert_eq!(keys, ["_id", "name", "mode", "createdAt", "updatedAt", "seats"]);
    }

    #[test]
    fn patch_never_moves_updated_at_backwards() {
        let future = "2999-01-01T00:00:00.000Z";
        let mut r = rec(json!({ "_id": "a", "updatedAt": future }));
        apply_patch(&mut r, rec(json!({ "x": 1 })));
        assert_eq!(r[UPDATED_AT_FIELD], json!(future));
    }

    #[test]
    fn lookup_by_either_id() {
        let modern = rec(json!({ "_id": "1" }));
        let legacy = rec(json!({ "id": "2" }));
        let numeric = rec(json!({ "id": 3 }));
        assert!(has_id(&modern, "1"));
        assert!(has_id(&legacy, "2"));
        assert!(!has_id(&modern, "2"));
        assert!(!has_id(&numeric, "3"));
    }

    #[test]
    fn query_matching() {
        let r = rec(json!({
            "category": "Web",
            "price": 100,
            "tags": ["a", "b"],
            "meta": { "level": 1 },
            "cert": null,
        }));
        assert!(matches(&r, &Query::new()));
        assert!(matches(&r, &rec(json!({ "category": "Web" }))));
        assert!(matches(&r, &rec(json!({ "category": "Web", "price": 100.0 }))));
        assert!(matches(&r, &rec(json!({ "tags": ["a", "b"] }))));
        assert!(matches(&r, &rec(json!({ "meta": { "level": 1.0 } }))));
        assert!(matches(&r, &rec(json!({ "cert": null }))));
        assert!(!matches(&r, &rec(json!({ "category": "web" }))));
        assert!(!matches(&r, &rec(json!({ "price": "100" }))));
        assert!(!matches(&r, &rec(json!({ "tags": ["b", "a"] }))));
        assert!(!matches(&r, &rec(json!({ "missing": null }))));
    }
}
