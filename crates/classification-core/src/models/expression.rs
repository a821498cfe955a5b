use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Evaluate several expressions against the same variable types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionParseAllRequestDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expressions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_value_types: Option<BTreeMap<String, String>>,
}

/// Check a single expression.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionParseRequestDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_result_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_value_types: Option<BTreeMap<String, String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::to_wire_body;
    use serde_json::json;

    fn types() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("a".to_string(), "integer".to_string()),
            ("b".to_string(), "float".to_string()),
        ])
    }

    #[test]
    fn test_expression_parse_all_dto_all_params() {
        let dto = ExpressionParseAllRequestDto {
            expressions: Some(vec!["2+2*2".to_string(), "1+2+3+4".to_string()]),
            variable_value_types: Some(types()),
        };
        assert_eq!(
            to_wire_body(Some(&dto)).unwrap(),
            json!({
                "expressions": ["2+2*2", "1+2+3+4"],
                "variableValueTypes": {"a": "integer", "b": "float"}
            })
        );
    }

    #[test]
    fn test_expression_parse_request_dto_some_params() {
        let dto = ExpressionParseRequestDto {
            variable_value_types: Some(types()),
            ..Default::default()
        };
        assert_eq!(
            to_wire_body(Some(&dto)).unwrap(),
            json!({"variableValueTypes": {"a": "integer", "b": "float"}})
        );
    }
}
