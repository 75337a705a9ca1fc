use super::*;

// =============================================================================
// ApiError classification
// =============================================================================

#[test]
fn unauthorized_is_only_401() {
    let err = ApiError::Status { status: 401, detail: "Could not validate credentials".into() };
    assert!(err.is_unauthorized());
    let err = ApiError::Status { status: 403, detail: "forbidden".into() };
    assert!(!err.is_unauthorized());
    assert!(!ApiError::Request("connection refused".into()).is_unauthorized());
}

#[test]
fn credential_rejection_covers_client_auth_statuses() {
    for status in [400, 401, 403] {
        let err = ApiError::Status { status, detail: String::new() };
        assert!(err.is_credential_rejection(), "status {status}");
    }
    let err = ApiError::Status { status: 500, detail: String::new() };
    assert!(!err.is_credential_rejection());
    assert!(!ApiError::Request("timeout".into()).is_credential_rejection());
}

#[test]
fn status_error_display_includes_detail() {
    let err = ApiError::Status { status: 422, detail: "field required".into() };
    let msg = err.to_string();
    assert!(msg.contains("422"));
    assert!(msg.contains("field required"));
}

// =============================================================================
// error_detail / status_error
// =============================================================================

#[test]
fn error_detail_reads_string_detail() {
    assert_eq!(
        error_detail(r#"{"detail": "Incorrect username or password"}"#).as_deref(),
        Some("Incorrect username or password")
    );
}

#[test]
fn error_detail_joins_validation_messages() {
    let body = r#"{"detail": [{"loc": ["body", "fecha"], "msg": "field required"}, {"msg": "value is not a valid float"}]}"#;
    assert_eq!(error_detail(body).as_deref(), Some("field required; value is not a valid float"));
}

#[test]
fn error_detail_ignores_non_json() {
    assert!(error_detail("<html>Bad Gateway</html>").is_none());
    assert!(error_detail(r#"{"message": "nope"}"#).is_none());
}

#[test]
fn status_error_falls_back_to_reason_phrase() {
    let err = status_error(StatusCode::BAD_GATEWAY, "<html></html>");
    match err {
        ApiError::Status { status, detail } => {
            assert_eq!(status, 502);
            assert_eq!(detail, "Bad Gateway");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn parse_body_maps_decode_errors() {
    let err = parse_body::<TokenResponse>("{}").unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
    let token: TokenResponse = parse_body(r#"{"access_token": "t", "token_type": "bearer"}"#).unwrap();
    assert_eq!(token.access_token, "t");
}

// =============================================================================
// paths and queries
// =============================================================================

#[test]
fn user_path_formats_id() {
    assert_eq!(user_path(12), "/api/usuarios/12");
}

#[test]
fn user_list_query_skips_absent_filters() {
    assert!(user_list_query(None, None).is_empty());
    assert_eq!(user_list_query(Some(true), Some("")), vec![("activo", "true".to_owned())]);
    assert_eq!(
        user_list_query(Some(false), Some("OPERADOR")),
        vec![("activo", "false".to_owned()), ("rol", "OPERADOR".to_owned())]
    );
}

#[test]
fn client_trims_base_url_and_builds_asset_urls() {
    let client = ApiClient::new("http://localhost:8000/", HttpTimeouts::default()).unwrap();
    assert_eq!(client.base_url(), "http://localhost:8000");
    assert_eq!(client.asset_url("/uploads/3.png"), "http://localhost:8000/uploads/3.png");
}

#[tokio::test]
async fn update_user_without_fields_is_rejected_locally() {
    let client = ApiClient::new("http://127.0.0.1:9", HttpTimeouts::default()).unwrap();
    let err = client
        .update_user("token", 1, &UsuarioUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
}

#[tokio::test]
async fn export_of_unexportable_form_is_rejected_locally() {
    let client = ApiClient::new("http://127.0.0.1:9", HttpTimeouts::default()).unwrap();
    let err = client
        .export_excel("token", FormKind::ConsumoMensual, "2024-05")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
}
