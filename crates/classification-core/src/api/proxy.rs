//! Client wrapper that remembers common call parameters.
//!
//! `course_code`, `semester`, `group_code` and `lang` can be stored once and
//! omitted from later calls. A value passed to a method overrides the stored
//! one. When a required parameter is neither passed nor stored the call
//! fails with `MissingParameter` before any request is made.

use serde::Serialize;
use serde_json::Value;

use super::{Classification, ClassificationError, Result};
use crate::auth::CallbackEndpoint;
use crate::config::ClientConfig;
use crate::grades::{StudentsToTasks, TasksToStudents};

/// An empty supplied value counts as not supplied.
fn optional<'a>(supplied: Option<&'a str>, stored: &'a Option<String>) -> Option<&'a str> {
    supplied.filter(|value| !value.is_empty()).or(stored.as_deref())
}

fn required<'a>(
    supplied: Option<&'a str>,
    stored: &'a Option<String>,
    name: &'static str,
) -> Result<&'a str> {
    optional(supplied, stored).ok_or(ClassificationError::MissingParameter(name))
}

pub struct ClassificationParamsProxy {
    client: Classification,
    pub course_code: Option<String>,
    pub semester: Option<String>,
    pub group_code: Option<String>,
    pub lang: Option<String>,
}

impl ClassificationParamsProxy {
    pub async fn connect(config: &ClientConfig, force_new_token: bool) -> Result<Self> {
        Ok(Self::new(Classification::connect(config, force_new_token).await?))
    }

    /// Wrap `client` with no stored parameters
    pub fn new(client: Classification) -> Self {
        Self {
            client,
            course_code: None,
            semester: None,
            group_code: None,
            lang: None,
        }
    }

    pub fn with_course_code(mut self, course_code: impl Into<String>) -> Self {
        self.course_code = Some(course_code.into());
        self
    }

    pub fn with_semester(mut self, semester: impl Into<String>) -> Self {
        self.semester = Some(semester.into());
        self
    }

    pub fn with_group_code(mut self, group_code: impl Into<String>) -> Self {
        self.group_code = Some(group_code.into());
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn client(&self) -> &Classification {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut Classification {
        &mut self.client
    }

    pub fn into_inner(self) -> Classification {
        self.client
    }

    pub async fn reinit_session(&mut self, callback: CallbackEndpoint, force_new_token: bool) -> Result<()> {
        self.client.reinit_session(callback, force_new_token).await
    }

    pub fn drop_session(&mut self) {
        self.client.drop_session();
    }

    // ===== Classification controller =====

    pub async fn delete_classification(
        &mut self,
        classification_id: &str,
        course_code: Option<&str>,
        semester: Option<&str>,
    ) -> Result<Option<Value>> {
        let course_code = required(course_code, &self.course_code, "course_code")?;
        let semester = optional(semester, &self.semester);
        self.client
            .delete_classification(course_code, classification_id, semester)
            .await
    }

    pub async fn find_classifications_for_course(
        &mut self,
        course_code: Option<&str>,
        semester: Option<&str>,
        lang: Option<&str>,
    ) -> Result<Option<Value>> {
        let course_code = required(course_code, &self.course_code, "course_code")?;
        let semester = optional(semester, &self.semester);
        let lang = optional(lang, &self.lang);
        self.client
            .find_classifications_for_course(course_code, semester, lang)
            .await
    }

    pub async fn save_classification<B: Serialize>(
        &mut self,
        classification_dto: Option<&B>,
        course_code: Option<&str>,
    ) -> Result<Option<Value>> {
        let course_code = required(course_code, &self.course_code, "course_code")?;
        self.client
            .save_classification(course_code, classification_dto)
            .await
    }

    pub async fn change_order_of_classifications(
        &mut self,
        indexes: &Value,
        course_code: Option<&str>,
        semester: Option<&str>,
    ) -> Result<Option<Value>> {
        let course_code = required(course_code, &self.course_code, "course_code")?;
        let semester = optional(semester, &self.semester);
        self.client
            .change_order_of_classifications(course_code, indexes, semester)
            .await
    }

    pub async fn find_classification(
        &mut self,
        identifier: &str,
        course_code: Option<&str>,
        semester: Option<&str>,
        lang: Option<&str>,
    ) -> Result<Option<Value>> {
        let course_code = required(course_code, &self.course_code, "course_code")?;
        let semester = optional(semester, &self.semester);
        let lang = optional(lang, &self.lang);
        self.client
            .find_classification(course_code, identifier, semester, lang)
            .await
    }

    /// Both courses and semesters are explicit; stored values are not used.
    pub async fn clone_classification_definitions(
        &mut self,
        target_semester: &str,
        target_course_code: &str,
        source_semester: &str,
        source_course_code: &str,
        remove_existing: bool,
    ) -> Result<Option<Value>> {
        self.client
            .clone_classification_definitions(
                target_semester,
                target_course_code,
                source_semester,
                source_course_code,
                remove_existing,
            )
            .await
    }

    // ===== Editor controller =====

    pub async fn get_editors(&mut self, course_code: Option<&str>) -> Result<Option<Value>> {
        let course_code = required(course_code, &self.course_code, "course_code")?;
        self.client.get_editors(course_code).await
    }

    pub async fn delete_editor(&mut self, username: &str, course_code: Option<&str>) -> Result<Option<Value>> {
        let course_code = required(course_code, &self.course_code, "course_code")?;
        self.client.delete_editor(course_code, username).await
    }

    pub async fn add_editor(&mut self, username: &str, course_code: Option<&str>) -> Result<Option<Value>> {
        let course_code = required(course_code, &self.course_code, "course_code")?;
        self.client.add_editor(course_code, username).await
    }

    // ===== Expression controller =====

    pub async fn evaluate_all<B: Serialize>(&mut self, expressions_dto: Option<&B>) -> Result<Option<Value>> {
        self.client.evaluate_all(expressions_dto).await
    }

    pub async fn try_validity<B: Serialize>(&mut self, expression_dto: Option<&B>) -> Result<Option<Value>> {
        self.client.try_validity(expression_dto).await
    }

    pub async fn get_functions(&mut self) -> Result<Option<Value>> {
        self.client.get_functions().await
    }

    // ===== Notification controller =====

    pub async fn get_all_notifications(
        &mut self,
        username: &str,
        count: Option<u32>,
        page: Option<u32>,
        lang: Option<&str>,
    ) -> Result<Option<Value>> {
        let lang = optional(lang, &self.lang);
        self.client
            .get_all_notifications(username, count, page, lang)
            .await
    }

    pub async fn get_unread_notifications(
        &mut self,
        username: &str,
        count: Option<u32>,
        page: Option<u32>,
        lang: Option<&str>,
    ) -> Result<Option<Value>> {
        let lang = optional(lang, &self.lang);
        self.client
            .get_unread_notifications(username, count, page, lang)
            .await
    }

    pub async fn unread_all_notifications(&mut self, username: &str) -> Result<Option<Value>> {
        self.client.unread_all_notifications(username).await
    }

    pub async fn read_all_notifications(&mut self, username: &str) -> Result<Option<Value>> {
        self.client.read_all_notifications(username).await
    }

    pub async fn unread_notification(&mut self, username: &str, id: i64) -> Result<Option<Value>> {
        self.client.unread_notification(username, id).await
    }

    pub async fn read_notification(&mut self, username: &str, id: i64) -> Result<Option<Value>> {
        self.client.read_notification(username, id).await
    }

    // ===== Settings controller =====

    pub async fn get_settings(&mut self, semester: Option<&str>, lang: Option<&str>) -> Result<Option<Value>> {
        let semester = optional(semester, &self.semester);
        let lang = optional(lang, &self.lang);
        self.client.get_settings(semester, lang).await
    }

    pub async fn save_my_settings<B: Serialize>(&mut self, user_settings_dto: Option<&B>) -> Result<Option<Value>> {
        self.client.save_my_settings(user_settings_dto).await
    }

    pub async fn save_student_course_settings<B: Serialize>(
        &mut self,
        user_course_settings_dto: Option<&B>,
        semester: Option<&str>,
    ) -> Result<Option<Value>> {
        let semester = optional(semester, &self.semester);
        self.client
            .save_student_course_settings(user_course_settings_dto, semester)
            .await
    }

    pub async fn save_teacher_course_settings<B: Serialize>(
        &mut self,
        user_course_settings_dto: Option<&B>,
        semester: Option<&str>,
    ) -> Result<Option<Value>> {
        let semester = optional(semester, &self.semester);
        self.client
            .save_teacher_course_settings(user_course_settings_dto, semester)
            .await
    }

    // ===== Student classification controller =====

    pub async fn find_student_group_classifications(
        &mut self,
        course_code: Option<&str>,
        group_code: Option<&str>,
        semester: Option<&str>,
    ) -> Result<Option<Value>> {
        let course_code = required(course_code, &self.course_code, "course_code")?;
        let group_code = required(group_code, &self.group_code, "group_code")?;
        let semester = optional(semester, &self.semester);
        self.client
            .find_student_group_classifications(course_code, Some(group_code), semester)
            .await
    }

    pub async fn find_student_group_classifications_simple_s2t(
        &mut self,
        course_code: Option<&str>,
        group_code: Option<&str>,
        semester: Option<&str>,
    ) -> Result<Option<StudentsToTasks>> {
        let course_code = required(course_code, &self.course_code, "course_code")?;
        let group_code = required(group_code, &self.group_code, "group_code")?;
        let semester = optional(semester, &self.semester);
        self.client
            .find_student_group_classifications_simple_s2t(course_code, Some(group_code), semester)
            .await
    }

    pub async fn find_student_group_classifications_simple_t2s(
        &mut self,
        course_code: Option<&str>,
        group_code: Option<&str>,
        semester: Option<&str>,
    ) -> Result<Option<TasksToStudents>> {
        let course_code = required(course_code, &self.course_code, "course_code")?;
        let group_code = required(group_code, &self.group_code, "group_code")?;
        let semester = optional(semester, &self.semester);
        self.client
            .find_student_group_classifications_simple_t2s(course_code, Some(group_code), semester)
            .await
    }

    pub async fn find_student_classifications_for_definitions(
        &mut self,
        identifier: &str,
        course_code: Option<&str>,
        group_code: Option<&str>,
        semester: Option<&str>,
    ) -> Result<Option<Value>> {
        let course_code = required(course_code, &self.course_code, "course_code")?;
        let group_code = required(group_code, &self.group_code, "group_code")?;
        let semester = optional(semester, &self.semester);
        self.client
            .find_student_classifications_for_definitions(course_code, identifier, Some(group_code), semester)
            .await
    }

    pub async fn save_student_classifications<B: Serialize>(
        &mut self,
        student_classifications: Option<&[B]>,
        course_code: Option<&str>,
        semester: Option<&str>,
    ) -> Result<Option<Value>> {
        let course_code = required(course_code, &self.course_code, "course_code")?;
        let semester = optional(semester, &self.semester);
        self.client
            .save_student_classifications(course_code, student_classifications, semester)
            .await
    }

    pub async fn save_student_classifications_simple_s2t(
        &mut self,
        student_to_tasks: &StudentsToTasks,
        course_code: Option<&str>,
        semester: Option<&str>,
    ) -> Result<Option<Value>> {
        let course_code = required(course_code, &self.course_code, "course_code")?;
        let semester = optional(semester, &self.semester);
        self.client
            .save_student_classifications_simple_s2t(course_code, student_to_tasks, semester)
            .await
    }

    pub async fn save_student_classifications_simple_t2s(
        &mut self,
        task_to_students: &TasksToStudents,
        course_code: Option<&str>,
        semester: Option<&str>,
    ) -> Result<Option<Value>> {
        let course_code = required(course_code, &self.course_code, "course_code")?;
        let semester = optional(semester, &self.semester);
        self.client
            .save_student_classifications_simple_t2s(course_code, task_to_students, semester)
            .await
    }

    pub async fn find_student_classification(
        &mut self,
        student_username: &str,
        course_code: Option<&str>,
        semester: Option<&str>,
        lang: Option<&str>,
    ) -> Result<Option<Value>> {
        let course_code = required(course_code, &self.course_code, "course_code")?;
        let semester = optional(semester, &self.semester);
        let lang = optional(lang, &self.lang);
        self.client
            .find_student_classification(course_code, student_username, semester, lang)
            .await
    }

    // ===== Student group controller =====

    pub async fn get_course_groups(
        &mut self,
        course_code: Option<&str>,
        semester: Option<&str>,
        lang: Option<&str>,
    ) -> Result<Option<Value>> {
        let course_code = required(course_code, &self.course_code, "course_code")?;
        let semester = optional(semester, &self.semester);
        let lang = optional(lang, &self.lang);
        self.client.get_course_groups(course_code, semester, lang).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{SessionManager, Token, TokenStore};
    use mockito::Matcher;
    use serde_json::json;

    struct Fixture {
        server: mockito::ServerGuard,
        _dir: tempfile::TempDir,
        proxy: ClassificationParamsProxy,
    }

    async fn fixture() -> Fixture {
        let server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();

        let mut config = ClientConfig::new("dummy", "dummy");
        config.token_url = format!("{}/oauth/token", server.url());
        config.api_url = format!("{}/api/v1", server.url());

        let mut session = SessionManager::new(&config, TokenStore::new(dir.path().join("token.json")));
        session.with_token(Token::new("a", "r")).unwrap();

        Fixture {
            server,
            _dir: dir,
            proxy: ClassificationParamsProxy::new(Classification::from_session(session)),
        }
    }

    #[test]
    fn test_supplied_value_wins_over_stored() {
        let stored = Some("BI-PYT".to_string());
        assert_eq!(optional(Some("MI-PYT"), &stored), Some("MI-PYT"));
        assert_eq!(optional(None, &stored), Some("BI-PYT"));
        assert_eq!(optional(None, &None), None);
        assert_eq!(optional(Some(""), &stored), Some("BI-PYT"));
        assert!(matches!(
            required(Some(""), &None, "course_code"),
            Err(ClassificationError::MissingParameter("course_code"))
        ));
    }

    #[tokio::test]
    async fn test_missing_course_code_fails_before_request() {
        let mut fx = fixture().await;
        let any = fx
            .server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = fx.proxy.get_editors(None).await.unwrap_err();
        assert!(matches!(err, ClassificationError::MissingParameter("course_code")));
        assert_eq!(err.to_string(), "The following parameter must be supplied: course_code");
        any.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_group_code_fails_before_request() {
        let mut fx = fixture().await;
        fx.proxy.course_code = Some("MI-PYT".to_string());

        let err = fx
            .proxy
            .find_student_group_classifications(None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClassificationError::MissingParameter("group_code")));
    }

    #[tokio::test]
    async fn test_stored_parameters_fill_the_request() {
        let mut fx = fixture().await;
        let mock = fx
            .server
            .mock("GET", "/api/v1/public/course/MI-PYT/student-groups")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("semester".into(), "B171".into()),
                Matcher::UrlEncoded("lang".into(), "en".into()),
            ]))
            .with_status(200)
            .with_body(r#"[{"code": "101"}]"#)
            .create_async()
            .await;

        fx.proxy = fx
            .proxy
            .with_course_code("MI-PYT")
            .with_semester("B171")
            .with_lang("cs");

        let body = fx
            .proxy
            .get_course_groups(None, None, Some("en"))
            .await
            .unwrap();
        assert_eq!(body, Some(json!([{"code": "101"}])));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_stored_group_code_in_path() {
        let mut fx = fixture().await;
        let mock = fx
            .server
            .mock("GET", "/api/v1/public/courses/MI-PYT/group/102/student-classifications/lab1")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        fx.proxy = fx.proxy.with_course_code("MI-PYT").with_group_code("102");
        let body = fx
            .proxy
            .find_student_classifications_for_definitions("lab1", None, None, None)
            .await
            .unwrap();
        assert_eq!(body, None);
        mock.assert_async().await;
    }
}
