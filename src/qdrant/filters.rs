//! Filter helpers for partition-scoped Qdrant requests.

use serde_json::{Value, json};

use super::payload::PARTITION_FIELD;

/// Filter matching exactly the points of one partition.
pub fn partition_filter(partition: &str) -> Value {
    json!({
        "must": [
            {
                "key": PARTITION_FIELD,
                "match": { "value": partition }
            }
        ]
    })
}

/// Payload indexes the shared collection needs for filtered reads.
pub const PAYLOAD_INDEXES: [(&str, &str); 4] = [
    (PARTITION_FIELD, "keyword"),
    ("categories", "keyword"),
    ("page", "integer"),
    ("chunk_hash", "keyword"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_filter_matches_single_value() {
        let filter = partition_filter("doc-123");
        let must = filter["must"].as_array().expect("must array");
        assert_eq!(must.len(), 1);
        assert_eq!(must[0]["key"], "partition");
        assert_eq!(must[0]["match"]["value"], "doc-123");
    }

    #[test]
    fn partition_field_is_indexed_as_keyword() {
        assert!(PAYLOAD_INDEXES.contains(&("partition", "keyword")));
    }
}
