//! API client for the Classification portal REST API.
//!
//! One method per portal endpoint. Each builds an `ApiRequest`, runs it
//! through `SessionManager::call_with_refresh` and reduces the response
//! with `interpret`. On success a method returns the response body, or
//! `None` when the body is empty.

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use super::{interpret, to_wire_body, to_wire_list, ApiRequest, Result};
use crate::auth::{CallbackEndpoint, SessionManager, TokenStore};
use crate::config::ClientConfig;
use crate::grades::{
    s2t_from_response, save_request_from_s2t, save_request_from_t2s, t2s_from_response,
    StudentsToTasks, TasksToStudents,
};

/// Group code selecting every student of a course
pub const ALL_GROUPS: &str = "ALL";

pub struct Classification {
    session: SessionManager,
}

impl Classification {
    /// Create a client and bind a session, logging in through the browser
    /// when there is no usable saved token or `force_new_token` is set.
    pub async fn connect(config: &ClientConfig, force_new_token: bool) -> Result<Self> {
        let store = TokenStore::new(config.resolved_token_path());
        let mut session = SessionManager::new(config, store);
        session.initialize(force_new_token).await?;
        Ok(Self { session })
    }

    /// Wrap an already prepared session manager
    pub fn from_session(session: SessionManager) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionManager {
        &mut self.session
    }

    /// Establish a new session, e.g. to log in as a different user.
    pub async fn reinit_session(&mut self, callback: CallbackEndpoint, force_new_token: bool) -> Result<()> {
        self.session.set_callback(callback);
        self.session.initialize(force_new_token).await
    }

    pub fn drop_session(&mut self) {
        self.session.drop_session();
    }

    async fn call(&mut self, request: ApiRequest, expected: StatusCode) -> Result<Option<Value>> {
        self.session
            .call_with_refresh(|client| {
                let request = request.clone();
                async move { interpret(client.send(request).await?, expected).await }
            })
            .await
    }

    // ===== Classification controller =====

    pub async fn delete_classification(
        &mut self,
        course_code: &str,
        classification_id: &str,
        semester: Option<&str>,
    ) -> Result<Option<Value>> {
        let request = ApiRequest::delete(format!("/public/courses/{}/classifications", course_code))
            .query("classification-identifier", Some(classification_id))
            .query("semester", semester);
        self.call(request, StatusCode::NO_CONTENT).await
    }

    pub async fn find_classifications_for_course(
        &mut self,
        course_code: &str,
        semester: Option<&str>,
        lang: Option<&str>,
    ) -> Result<Option<Value>> {
        let request = ApiRequest::get(format!("/public/courses/{}/classifications", course_code))
            .query("semester", semester)
            .query("lang", lang);
        self.call(request, StatusCode::OK).await
    }

    /// `classification_dto` may be a `ClassificationDto` or a plain JSON mapping.
    pub async fn save_classification<B: Serialize>(
        &mut self,
        course_code: &str,
        classification_dto: Option<&B>,
    ) -> Result<Option<Value>> {
        let request = ApiRequest::post(format!("/public/courses/{}/classifications", course_code))
            .json(to_wire_body(classification_dto)?);
        self.call(request, StatusCode::CREATED).await
    }

    pub async fn change_order_of_classifications(
        &mut self,
        course_code: &str,
        indexes: &Value,
        semester: Option<&str>,
    ) -> Result<Option<Value>> {
        let request = ApiRequest::put(format!("/public/courses/{}/classifications/order", course_code))
            .query("semester", semester)
            .json(indexes.clone());
        self.call(request, StatusCode::CREATED).await
    }

    pub async fn find_classification(
        &mut self,
        course_code: &str,
        identifier: &str,
        semester: Option<&str>,
        lang: Option<&str>,
    ) -> Result<Option<Value>> {
        let request = ApiRequest::get(format!(
            "/public/courses/{}/classifications/{}",
            course_code, identifier
        ))
        .query("semester", semester)
        .query("lang", lang);
        self.call(request, StatusCode::OK).await
    }

    pub async fn clone_classification_definitions(
        &mut self,
        target_semester: &str,
        target_course_code: &str,
        source_semester: &str,
        source_course_code: &str,
        remove_existing: bool,
    ) -> Result<Option<Value>> {
        let request = ApiRequest::put(format!(
            "/public/courses/{}/classifications/clones/{}",
            source_course_code, target_course_code
        ))
        .query("target-semester", Some(target_semester))
        .query("source-semester", Some(source_semester))
        .query("remove-existing", Some(remove_existing));
        self.call(request, StatusCode::CREATED).await
    }

    // ===== Editor controller =====

    pub async fn get_editors(&mut self, course_code: &str) -> Result<Option<Value>> {
        let request = ApiRequest::get(format!("/public/courses/{}/editors", course_code));
        self.call(request, StatusCode::OK).await
    }

    pub async fn delete_editor(&mut self, course_code: &str, username: &str) -> Result<Option<Value>> {
        let request = ApiRequest::delete(format!("/public/courses/{}/editors/{}", course_code, username));
        self.call(request, StatusCode::NO_CONTENT).await
    }

    pub async fn add_editor(&mut self, course_code: &str, username: &str) -> Result<Option<Value>> {
        let request = ApiRequest::put(format!("/public/courses/{}/editors/{}", course_code, username));
        self.call(request, StatusCode::CREATED).await
    }

    // ===== Expression controller =====

    pub async fn evaluate_all<B: Serialize>(&mut self, expressions_dto: Option<&B>) -> Result<Option<Value>> {
        let request = ApiRequest::post("/public/course-expressions/analyses")
            .json(to_wire_body(expressions_dto)?);
        self.call(request, StatusCode::CREATED).await
    }

    pub async fn try_validity<B: Serialize>(&mut self, expression_dto: Option<&B>) -> Result<Option<Value>> {
        let request = ApiRequest::post("/public/expressions/analyses").json(to_wire_body(expression_dto)?);
        self.call(request, StatusCode::CREATED).await
    }

    pub async fn get_functions(&mut self) -> Result<Option<Value>> {
        self.call(ApiRequest::get("/public/expressions/functions"), StatusCode::OK)
            .await
    }

    // ===== Notification controller =====

    pub async fn get_all_notifications(
        &mut self,
        username: &str,
        count: Option<u32>,
        page: Option<u32>,
        lang: Option<&str>,
    ) -> Result<Option<Value>> {
        let request = ApiRequest::get(format!("/public/notifications/{}/all", username))
            .query("count", count)
            .query("page", page)
            .query("lang", lang);
        self.call(request, StatusCode::OK).await
    }

    pub async fn get_unread_notifications(
        &mut self,
        username: &str,
        count: Option<u32>,
        page: Option<u32>,
        lang: Option<&str>,
    ) -> Result<Option<Value>> {
        let request = ApiRequest::get(format!("/public/notifications/{}/new", username))
            .query("count", count)
            .query("page", page)
            .query("lang", lang);
        self.call(request, StatusCode::OK).await
    }

    pub async fn unread_all_notifications(&mut self, username: &str) -> Result<Option<Value>> {
        let request = ApiRequest::delete(format!("/public/notifications/{}/read", username));
        self.call(request, StatusCode::NO_CONTENT).await
    }

    pub async fn read_all_notifications(&mut self, username: &str) -> Result<Option<Value>> {
        let request = ApiRequest::put(format!("/public/notifications/{}/read", username));
        self.call(request, StatusCode::CREATED).await
    }

    pub async fn unread_notification(&mut self, username: &str, id: i64) -> Result<Option<Value>> {
        let request = ApiRequest::delete(format!("/public/notifications/{}/read/{}", username, id));
        self.call(request, StatusCode::NO_CONTENT).await
    }

    pub async fn read_notification(&mut self, username: &str, id: i64) -> Result<Option<Value>> {
        let request = ApiRequest::put(format!("/public/notifications/{}/read/{}", username, id));
        self.call(request, StatusCode::CREATED).await
    }

    // ===== Settings controller =====

    pub async fn get_settings(&mut self, semester: Option<&str>, lang: Option<&str>) -> Result<Option<Value>> {
        let request = ApiRequest::get("/public/settings/my")
            .query("semester", semester)
            .query("lang", lang);
        self.call(request, StatusCode::OK).await
    }

    pub async fn save_my_settings<B: Serialize>(&mut self, user_settings_dto: Option<&B>) -> Result<Option<Value>> {
        let request = ApiRequest::put("/public/settings/my").json(to_wire_body(user_settings_dto)?);
        self.call(request, StatusCode::CREATED).await
    }

    pub async fn save_student_course_settings<B: Serialize>(
        &mut self,
        user_course_settings_dto: Option<&B>,
        semester: Option<&str>,
    ) -> Result<Option<Value>> {
        let request = ApiRequest::put("/public/settings/my/student/courses")
            .query("semester", semester)
            .json(to_wire_body(user_course_settings_dto)?);
        self.call(request, StatusCode::CREATED).await
    }

    pub async fn save_teacher_course_settings<B: Serialize>(
        &mut self,
        user_course_settings_dto: Option<&B>,
        semester: Option<&str>,
    ) -> Result<Option<Value>> {
        let request = ApiRequest::put("/public/settings/my/teacher/courses")
            .query("semester", semester)
            .json(to_wire_body(user_course_settings_dto)?);
        self.call(request, StatusCode::CREATED).await
    }

    // ===== Student classification controller =====

    /// `group_code` defaults to every group (`ALL`).
    pub async fn find_student_group_classifications(
        &mut self,
        course_code: &str,
        group_code: Option<&str>,
        semester: Option<&str>,
    ) -> Result<Option<Value>> {
        let request = ApiRequest::get(format!(
            "/public/courses/{}/group/{}/student-classifications",
            course_code,
            group_code.unwrap_or(ALL_GROUPS)
        ))
        .query("semester", semester);
        self.call(request, StatusCode::OK).await
    }

    /// Like `find_student_group_classifications`, keyed student first.
    pub async fn find_student_group_classifications_simple_s2t(
        &mut self,
        course_code: &str,
        group_code: Option<&str>,
        semester: Option<&str>,
    ) -> Result<Option<StudentsToTasks>> {
        self.find_student_group_classifications(course_code, group_code, semester)
            .await?
            .map(|body| s2t_from_response(&body))
            .transpose()
    }

    /// Like `find_student_group_classifications`, keyed task first.
    pub async fn find_student_group_classifications_simple_t2s(
        &mut self,
        course_code: &str,
        group_code: Option<&str>,
        semester: Option<&str>,
    ) -> Result<Option<TasksToStudents>> {
        self.find_student_group_classifications(course_code, group_code, semester)
            .await?
            .map(|body| t2s_from_response(&body))
            .transpose()
    }

    pub async fn find_student_classifications_for_definitions(
        &mut self,
        course_code: &str,
        identifier: &str,
        group_code: Option<&str>,
        semester: Option<&str>,
    ) -> Result<Option<Value>> {
        let request = ApiRequest::get(format!(
            "/public/courses/{}/group/{}/student-classifications/{}",
            course_code,
            group_code.unwrap_or(ALL_GROUPS),
            identifier
        ))
        .query("semester", semester);
        self.call(request, StatusCode::OK).await
    }

    /// Items may be `StudentClassificationPreviewDto`s or plain JSON mappings.
    pub async fn save_student_classifications<B: Serialize>(
        &mut self,
        course_code: &str,
        student_classifications: Option<&[B]>,
        semester: Option<&str>,
    ) -> Result<Option<Value>> {
        let request = ApiRequest::put(format!("/public/courses/{}/student-classifications", course_code))
            .query("semester", semester)
            .json(to_wire_list(student_classifications)?);
        self.call(request, StatusCode::CREATED).await
    }

    pub async fn save_student_classifications_simple_s2t(
        &mut self,
        course_code: &str,
        student_to_tasks: &StudentsToTasks,
        semester: Option<&str>,
    ) -> Result<Option<Value>> {
        let previews = save_request_from_s2t(student_to_tasks);
        self.save_student_classifications(course_code, Some(&previews[..]), semester)
            .await
    }

    pub async fn save_student_classifications_simple_t2s(
        &mut self,
        course_code: &str,
        task_to_students: &TasksToStudents,
        semester: Option<&str>,
    ) -> Result<Option<Value>> {
        let previews = save_request_from_t2s(task_to_students);
        self.save_student_classifications(course_code, Some(&previews[..]), semester)
            .await
    }

    pub async fn find_student_classification(
        &mut self,
        course_code: &str,
        student_username: &str,
        semester: Option<&str>,
        lang: Option<&str>,
    ) -> Result<Option<Value>> {
        let request = ApiRequest::get(format!(
            "/public/courses/{}/student-classifications/{}",
            course_code, student_username
        ))
        .query("semester", semester)
        .query("lang", lang);
        self.call(request, StatusCode::OK).await
    }

    // ===== Student group controller =====

    pub async fn get_course_groups(
        &mut self,
        course_code: &str,
        semester: Option<&str>,
        lang: Option<&str>,
    ) -> Result<Option<Value>> {
        let request = ApiRequest::get(format!("/public/course/{}/student-groups", course_code))
            .query("semester", semester)
            .query("lang", lang);
        self.call(request, StatusCode::OK).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ClassificationError;
    use crate::auth::Token;
    use crate::models::{ClassificationDto, StudentClassificationPreviewDto};
    use mockito::Matcher;
    use serde_json::json;

    struct Fixture {
        server: mockito::ServerGuard,
        _dir: tempfile::TempDir,
        client: Classification,
    }

    async fn fixture() -> Fixture {
        let server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();

        let mut config = ClientConfig::new("dummy", "dummy");
        config.token_url = format!("{}/oauth/token", server.url());
        config.api_url = format!("{}/api/v1", server.url());

        let mut session = SessionManager::new(&config, TokenStore::new(dir.path().join("token.json")));
        session.with_token(Token::new("a-old", "r-old")).unwrap();

        Fixture {
            server,
            _dir: dir,
            client: Classification::from_session(session),
        }
    }

    #[tokio::test]
    async fn test_find_student_classification_returns_body() {
        let mut fx = fixture().await;
        let mock = fx
            .server
            .mock("GET", "/api/v1/public/courses/MI-PYT/student-classifications/laskobor")
            .match_header("authorization", "Bearer a-old")
            .match_query(Matcher::UrlEncoded("semester".into(), "B171".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"studentClassificationFullDtos": [{"identifier": "total", "value": "51"}]}"#)
            .create_async()
            .await;

        let body = fx
            .client
            .find_student_classification("MI-PYT", "laskobor", Some("B171"), None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(body["studentClassificationFullDtos"][0]["value"], json!("51"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_surfaces_http_error() {
        let mut fx = fixture().await;
        fx.server
            .mock("GET", "/api/v1/public/courses/MI-PYT/group/ALL/student-classifications")
            .with_status(401)
            .create_async()
            .await;

        let err = fx
            .client
            .find_student_group_classifications("MI-PYT", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClassificationError::Http(_)));
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn test_save_classification_sends_only_set_fields() {
        let mut fx = fixture().await;
        let mock = fx
            .server
            .mock("POST", "/api/v1/public/courses/MI-PYT/classifications")
            .match_body(Matcher::Json(json!({"identifier": "lab1", "hidden": false})))
            .with_status(201)
            .create_async()
            .await;

        let dto = ClassificationDto {
            identifier: Some("lab1".to_string()),
            hidden: Some(false),
            ..Default::default()
        };
        let body = fx
            .client
            .save_classification("MI-PYT", Some(&dto))
            .await
            .unwrap();

        assert_eq!(body, None);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_classification_no_content() {
        let mut fx = fixture().await;
        let mock = fx
            .server
            .mock("DELETE", "/api/v1/public/courses/MI-PYT/classifications")
            .match_query(Matcher::UrlEncoded("classification-identifier".into(), "lab1".into()))
            .with_status(204)
            .create_async()
            .await;

        let body = fx
            .client
            .delete_classification("MI-PYT", "lab1", None)
            .await
            .unwrap();
        assert_eq!(body, None);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_save_student_classifications_simple_s2t() {
        let mut fx = fixture().await;
        let mock = fx
            .server
            .mock("PUT", "/api/v1/public/courses/MI-PYT/student-classifications")
            .match_body(Matcher::Json(json!([
                {"classificationIdentifier": "lab1", "studentUsername": "alice", "value": 5}
            ])))
            .with_status(201)
            .create_async()
            .await;

        let matrix: StudentsToTasks = serde_json::from_value(json!({"alice": {"lab1": 5}})).unwrap();
        fx.client
            .save_student_classifications_simple_s2t("MI-PYT", &matrix, None)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_save_student_classifications_accepts_plain_mappings() {
        let mut fx = fixture().await;
        let mock = fx
            .server
            .mock("PUT", "/api/v1/public/courses/MI-PYT/student-classifications")
            .match_body(Matcher::Json(json!([{"studentUsername": "bob", "note": null}])))
            .with_status(201)
            .create_async()
            .await;

        let items = vec![json!({"studentUsername": "bob", "note": null})];
        fx.client
            .save_student_classifications("MI-PYT", Some(&items[..]), None)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_find_group_classifications_simple_t2s() {
        let mut fx = fixture().await;
        fx.server
            .mock("GET", "/api/v1/public/courses/MI-PYT/group/101/student-classifications")
            .with_status(200)
            .with_body(
                r#"[{"studentUsername": "alice", "classificationIdentifier": "lab1", "value": 5},
                    {"studentUsername": "bob", "classificationIdentifier": "lab1", "value": 7}]"#,
            )
            .create_async()
            .await;

        let t2s = fx
            .client
            .find_student_group_classifications_simple_t2s("MI-PYT", Some("101"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(t2s["lab1"]["alice"], json!(5));
        assert_eq!(t2s["lab1"]["bob"], json!(7));
    }

    #[tokio::test]
    async fn test_invalid_token_refreshes_and_retries() {
        let mut fx = fixture().await;
        let rejected = fx
            .server
            .mock("GET", "/api/v1/public/expressions/functions")
            .match_header("authorization", "Bearer a-old")
            .with_status(401)
            .with_header("www-authenticate", r#"Bearer error="invalid_token""#)
            .expect(1)
            .create_async()
            .await;
        let refresh = fx
            .server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "a-new", "refresh_token": "r-new"}"#)
            .expect(1)
            .create_async()
            .await;
        let accepted = fx
            .server
            .mock("GET", "/api/v1/public/expressions/functions")
            .match_header("authorization", "Bearer a-new")
            .with_status(200)
            .with_body(r#"["min", "max"]"#)
            .expect(1)
            .create_async()
            .await;

        let body = fx.client.get_functions().await.unwrap();
        assert_eq!(body, Some(json!(["min", "max"])));

        rejected.assert_async().await;
        refresh.assert_async().await;
        accepted.assert_async().await;
        assert_eq!(fx.client.session().token().unwrap().refresh_token, "r-new");
    }

    #[tokio::test]
    async fn test_dropped_session_fails_fast() {
        let mut fx = fixture().await;
        fx.client.drop_session();

        let err = fx.client.get_editors("MI-PYT").await.unwrap_err();
        assert!(matches!(err, ClassificationError::NotInitialized));
    }

    #[test]
    fn test_preview_dto_is_serializable_item() {
        let items = [StudentClassificationPreviewDto::new("lab1", "alice", json!(1))];
        assert_eq!(
            to_wire_list(Some(&items[..])).unwrap(),
            json!([{"classificationIdentifier": "lab1", "studentUsername": "alice", "value": 1}])
        );
    }
}
