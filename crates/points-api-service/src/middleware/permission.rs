//! 角色检查中间件
//!
//! 小程序接口只允许 user 角色；后台接口允许 admin 和 operator，
//! 其中写操作只允许 admin。管理员账号管理只允许 admin，
//! 后台人员对自己账号的操作（登出、修改密码）不区分角色。

use std::future::Future;
use std::pin::Pin;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::auth::unauthorized_response;
use crate::auth::Claims;

/// 访问级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// 小程序用户
    User,
    /// 后台人员，写操作需要 admin
    Staff,
    /// 仅 admin
    Admin,
    /// 后台人员操作自己的账号
    Account,
}

/// 角色检查中间件工厂
///
/// ```ignore
/// Router::new().route(...).layer(axum::middleware::from_fn(require_role(Access::Staff)))
/// ```
pub fn require_role(
    access: Access,
) -> impl Fn(Request<Body>, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Clone + Send
{
    move |request: Request<Body>, next: Next| {
        Box::pin(async move { check_role(request, next, access).await })
    }
}

async fn check_role(request: Request<Body>, next: Next, access: Access) -> Response {
    let Some(claims) = request.extensions().get::<Claims>() else {
        return unauthorized_response("未认证");
    };

    match is_allowed(claims, request.method(), access) {
        Ok(()) => next.run(request).await,
        Err(message) => forbidden_response(message),
    }
}

fn is_allowed(claims: &Claims, method: &Method, access: Access) -> Result<(), &'static str> {
    match access {
        Access::User if claims.is_user() => Ok(()),
        Access::User => Err("仅限小程序用户访问"),
        Access::Staff if !claims.is_staff() => Err("仅限后台人员访问"),
        Access::Staff if is_read(method) || claims.is_admin() => Ok(()),
        Access::Staff => Err("该操作需要管理员权限"),
        Access::Admin if claims.is_admin() => Ok(()),
        Access::Admin => Err("该操作需要管理员权限"),
        Access::Account if claims.is_staff() => Ok(()),
        Access::Account => Err("仅限后台人员访问"),
    }
}

fn is_read(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// 生成 403 禁止访问响应
fn forbidden_response(message: &str) -> Response {
    let body = json!({
        "success": false,
        "code": "FORBIDDEN",
        "message": message,
        "data": null
    });

    (StatusCode::FORBIDDEN, axum::Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ROLE_ADMIN, ROLE_OPERATOR, ROLE_USER};

    fn claims(role: &str) -> Claims {
        Claims {
            sub: "1".to_string(),
            name: None,
            role: role.to_string(),
            iat: 0,
            exp: 0,
            iss: "points-api-service".to_string(),
        }
    }

    #[test]
    fn test_user_access() {
        assert!(is_allowed(&claims(ROLE_USER), &Method::POST, Access::User).is_ok());
        assert!(is_allowed(&claims(ROLE_ADMIN), &Method::GET, Access::User).is_err());
    }

    #[test]
    fn test_staff_access() {
        let operator = claims(ROLE_OPERATOR);
        assert!(is_allowed(&operator, &Method::GET, Access::Staff).is_ok());
        assert!(is_allowed(&operator, &Method::POST, Access::Staff).is_err());
        assert!(is_allowed(&operator, &Method::PUT, Access::Staff).is_err());

        let admin = claims(ROLE_ADMIN);
        assert!(is_allowed(&admin, &Method::POST, Access::Staff).is_ok());

        assert!(is_allowed(&claims(ROLE_USER), &Method::GET, Access::Staff).is_err());
    }

    #[test]
    fn test_admin_only_access() {
        assert!(is_allowed(&claims(ROLE_ADMIN), &Method::GET, Access::Admin).is_ok());
        assert!(is_allowed(&claims(ROLE_ADMIN), &Method::DELETE, Access::Admin).is_ok());
        assert!(is_allowed(&claims(ROLE_OPERATOR), &Method::GET, Access::Admin).is_err());
        assert!(is_allowed(&claims(ROLE_USER), &Method::GET, Access::Admin).is_err());
    }

    #[test]
    fn test_account_access() {
        assert!(is_allowed(&claims(ROLE_OPERATOR), &Method::POST, Access::Account).is_ok());
        assert!(is_allowed(&claims(ROLE_ADMIN), &Method::POST, Access::Account).is_ok());
        assert!(is_allowed(&claims(ROLE_USER), &Method::POST, Access::Account).is_err());
    }
}
