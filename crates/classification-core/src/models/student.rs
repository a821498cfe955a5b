use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One student's value for one classification.
///
/// `value` is kept as raw JSON: the portal accepts numbers as well as
/// strings and booleans depending on the classification's value type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentClassificationPreviewDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl StudentClassificationPreviewDto {
    pub fn new(
        classification_identifier: impl Into<String>,
        student_username: impl Into<String>,
        value: Value,
    ) -> Self {
        Self {
            classification_identifier: Some(classification_identifier.into()),
            student_username: Some(student_username.into()),
            value: Some(value),
            ..Default::default()
        }
    }
}
