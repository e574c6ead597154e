//! Entity module - SeaORM entity definitions
//!
//! One module per table.

pub mod approval;
pub mod chatlog;
pub mod department;
pub mod department_user;
pub mod todo;
pub mod user;

/// Encode user ids into a delimited column value, `,a,b,`.
///
/// Every id is wrapped in delimiters so that a `LIKE '%,id,%'` filter
/// matches whole ids only.
pub fn encode_ids(ids: &[String]) -> String {
    if ids.is_empty() {
        return String::new();
    }
    format!(",{},", ids.join(","))
}

pub fn decode_ids(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pattern matching one id inside an encoded column
pub fn id_pattern(id: &str) -> String {
    format!(",{},", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_ids() {
        let ids = vec!["a".to_string(), "bc".to_string()];
        let encoded = encode_ids(&ids);
        assert_eq!(encoded, ",a,bc,");
        assert_eq!(decode_ids(&encoded), ids);
        assert!(encoded.contains(&id_pattern("bc")));
        assert!(!encoded.contains(&id_pattern("b")));
    }

    #[test]
    fn test_empty_ids() {
        assert_eq!(encode_ids(&[]), "");
        assert!(decode_ids("").is_empty());
    }
}
