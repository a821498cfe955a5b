//! Request records for the Classification portal API.
//!
//! Every field is optional. Fields left as `None` are omitted from the
//! request body instead of being sent as `null`; wire names are camelCase.
//!
//! - `ClassificationDto`, `ClassificationTextDto`: classification definitions
//! - `ExpressionParseAllRequestDto`, `ExpressionParseRequestDto`: expression analysis
//! - `UserSettingsDto`, `UserCourseSettingsDto`: user settings
//! - `StudentClassificationPreviewDto`: one student's value for one classification

pub mod classification;
pub mod expression;
pub mod settings;
pub mod student;

pub use classification::{ClassificationDto, ClassificationTextDto};
pub use expression::{ExpressionParseAllRequestDto, ExpressionParseRequestDto};
pub use settings::{UserCourseSettingsDto, UserSettingsDto};
pub use student::StudentClassificationPreviewDto;
