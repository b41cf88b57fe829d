use super::*;

fn response(status: u16, message: &str) -> ClientError {
    ClientError::Response {
        status,
        message: message.to_string(),
        data: json!({}),
    }
}

#[test]
fn unauthorized_and_forbidden_map_to_authentication() {
    assert!(matches!(
        AppError::from(response(401, "The request requires valid record authorization token.")),
        AppError::Authentication(_)
    ));
    assert!(matches!(
        AppError::from(response(403, "Only superusers can perform this action.")),
        AppError::Authentication(_)
    ));
}

#[test]
fn missing_record_maps_to_not_found() {
    let err = AppError::from(response(404, "The requested resource wasn't found."));
    assert!(matches!(err, AppError::NotFound(ref m) if m == "The requested resource wasn't found."));
}

#[test]
fn bad_request_keeps_field_data() {
    let err = AppError::from(ClientError::Response {
        status: 400,
        message: "Failed to create record.".into(),
        data: json!({"name": {"code": "validation_length_out_of_range"}}),
    });
    match err {
        AppError::Validation { message, data } => {
            assert_eq!(message, "Failed to create record.");
            assert_eq!(data["name"]["code"], "validation_length_out_of_range");
        }
        other => panic!("expected validation, got {other:?}"),
    }
}

#[test]
fn server_errors_are_transient() {
    assert!(matches!(
        AppError::from(response(500, "Something went wrong")),
        AppError::TransientFetch(_)
    ));
    assert!(matches!(AppError::from(response(503, "unavailable")), AppError::TransientFetch(_)));
}

#[test]
fn status_and_not_found_helpers() {
    assert_eq!(response(404, "x").status(), 404);
    assert!(response(404, "x").is_not_found());
    assert!(!response(500, "x").is_not_found());
}

#[test]
fn into_response_status_codes() {
    assert_eq!(
        AppError::Authentication("no".into()).into_response().status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(AppError::NotFound("no".into()).into_response().status(), StatusCode::NOT_FOUND);
    assert_eq!(
        AppError::Validation { message: "bad".into(), data: Value::Null }
            .into_response()
            .status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        AppError::TransientFetch("down".into()).into_response().status(),
        StatusCode::BAD_GATEWAY
    );
}
