use actix_web::{dev::Payload, test, web, FromRequest};
use classroom_forum::{
    auth::{create_jwt, Auth, JwtKeys, Role},
    error::ApiError,
    models::Id,
};

const SECRET: &str = "test-secret-must-be-32-bytes-long!!";

fn keys() -> JwtKeys {
    JwtKeys::new(SECRET)
}

#[actix_web::test]
async fn jwt_roundtrip_ok() {
    let user = Id::new_v4();
    let token = create_jwt(&keys(), user, Role::Faculty).expect("token");
    // The Auth extractor is the public way to validate, so use it here.
    let req = test::TestRequest::default()
        .app_data(web::Data::new(keys()))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_http_request();
    let mut pl = Payload::None;
    let auth = Auth::from_request(&req, &mut pl).await.expect("extract");
    assert_eq!(auth.0.id, user);
    assert_eq!(auth.0.role, Role::Faculty);
}

#[actix_web::test]
async fn extractor_rejects_invalid_token() {
    let req = test::TestRequest::default()
        .app_data(web::Data::new(keys()))
        .insert_header(("Authorization", "Bearer notatoken"))
        .to_http_request();
    let mut pl = Payload::None;
    assert!(matches!(Auth::from_request(&req, &mut pl).await, Err(ApiError::Unauthorized)));
}

#[actix_web::test]
async fn extractor_rejects_foreign_signature() {
    let other = JwtKeys::new("another-secret-that-is-32-bytes-long");
    let token = create_jwt(&other, Id::new_v4(), Role::Student).unwrap();
    let req = test::TestRequest::default()
        .app_data(web::Data::new(keys()))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_http_request();
    let mut pl = Payload::None;
    assert!(matches!(Auth::from_request(&req, &mut pl).await, Err(ApiError::Unauthorized)));
}

#[actix_web::test]
async fn missing_header_is_unauthorized() {
    let req = test::TestRequest::default().app_data(web::Data::new(keys())).to_http_request();
    let mut pl = Payload::None;
    assert!(matches!(Auth::from_request(&req, &mut pl).await, Err(ApiError::Unauthorized)));
}
