//! Key policy comparison
//!
//! The service may return a policy with reordered keys, a lone statement
//! instead of a one-element list, or list members in a different order.
//! Two documents are equivalent when they are equal after normalization.

use serde_json::Value;

/// Parse and normalize a policy document
pub fn normalize_policy(document: &str) -> serde_json::Result<Value> {
    let value: Value = serde_json::from_str(document)?;
    Ok(normalize(value))
}

/// Whether two policy documents grant the same thing
pub fn policies_are_equivalent(a: &str, b: &str) -> serde_json::Result<bool> {
    Ok(normalize_policy(a)? == normalize_policy(b)?)
}

fn normalize(value: Value) -> Value {
    match value {
        Value::Array(items) => {
            let mut items: Vec<Value> = items.into_iter().map(normalize).collect();
            items.sort_by_cached_key(|item| item.to_string());
            items.dedup();
            if items.len() == 1 {
                return items.remove(0);
            }
            Value::Array(items)
        }
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, normalize(value)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = r#"{
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "Enable IAM User Permissions",
            "Effect": "Allow",
            "Principal": {"AWS": "arn:aws:iam::111122223333:root"},
            "Action": ["kms:Decrypt", "kms:Encrypt"],
            "Resource": "*"
        }]
    }"#;

    #[test]
    fn test_key_order_and_whitespace_ignored() {
        let reordered = r#"{"Statement":[{"Resource":"*","Action":["kms:Decrypt","kms:Encrypt"],
            "Principal":{"AWS":"arn:aws:iam::111122223333:root"},"Effect":"Allow",
            "Sid":"Enable IAM User Permissions"}],"Version":"2012-10-17"}"#;
        assert!(policies_are_equivalent(POLICY, reordered).unwrap());
    }

    #[test]
    fn test_single_statement_and_list_order() {
        let flattened = r#"{
            "Version": "2012-10-17",
            "Statement": {
                "Sid": "Enable IAM User Permissions",
                "Effect": "Allow",
                "Principal": {"AWS": ["arn:aws:iam::111122223333:root"]},
                "Action": ["kms:Encrypt", "kms:Decrypt"],
                "Resource": ["*"]
            }
        }"#;
        assert!(policies_are_equivalent(POLICY, flattened).unwrap());
    }

    #[test]
    fn test_different_actions() {
        let narrower = POLICY.replace(r#"["kms:Decrypt", "kms:Encrypt"]"#, r#""kms:Decrypt""#);
        assert!(!policies_are_equivalent(POLICY, &narrower).unwrap());
    }

    #[test]
    fn test_duplicate_members_collapse() {
        let repeated = POLICY.replace(
            r#"["kms:Decrypt", "kms:Encrypt"]"#,
            r#"["kms:Decrypt", "kms:Decrypt"]"#,
        );
        let single = POLICY.replace(r#"["kms:Decrypt", "kms:Encrypt"]"#, r#""kms:Decrypt""#);
        assert!(policies_are_equivalent(&repeated, &single).unwrap());
    }

    #[test]
    fn test_invalid_json() {
        assert!(policies_are_equivalent(POLICY, "{not json").is_err());
    }
}
