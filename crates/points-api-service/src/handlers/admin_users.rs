//! 后台管理员账号管理，所有端点仅 admin 可访问

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use tracing::{info, instrument};
use validator::Validate;

use crate::auth::{Claims, hash_password};
use crate::dto::{
    AdminRole, AdminStatus, AdminUserDto, ApiResponse, CreateAdminUserRequest, PageResponse,
    PaginationParams, ResetPasswordRequest, UpdateAdminUserRequest,
};
use crate::error::{ApiError, Result};
use crate::repository::AdminUserUpdate;
use crate::state::AppState;

/// 用户名只允许字母、数字和 `_` `-` `.`
fn check_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if !(3..=50).contains(&len) {
        return Err(ApiError::Validation(
            "用户名长度必须在 3-50 之间".to_string(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(ApiError::Validation(
            "用户名只能包含字母、数字、下划线、短横线和点".to_string(),
        ));
    }
    Ok(())
}

/// 当前登录的管理员不能把自己降为 operator 或禁用
fn guard_self_change(claims: &Claims, id: i64, req: &UpdateAdminUserRequest) -> Result<()> {
    if claims.subject_id()? != id {
        return Ok(());
    }
    if req.role == Some(AdminRole::Operator) || req.status == Some(AdminStatus::Disabled) {
        return Err(ApiError::Forbidden(
            "不能降级或禁用当前登录的账号".to_string(),
        ));
    }
    Ok(())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

/// 管理员列表
///
/// GET /api/admin/admin-users
pub async fn list_admin_users(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<AdminUserDto>>>> {
    let (admins, total) = state
        .admins
        .list(pagination.limit(), pagination.offset())
        .await?;
    let items = admins.into_iter().map(AdminUserDto::from).collect();
    Ok(Json(ApiResponse::success(PageResponse::new(
        items,
        total,
        pagination.page(),
        pagination.limit(),
    ))))
}

/// GET /api/admin/admin-users/{id}
pub async fn get_admin_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<AdminUserDto>>> {
    let admin = state
        .admins
        .find_by_id(id)
        .await?
        .ok_or(ApiError::AdminNotFound(id))?;
    Ok(Json(ApiResponse::success(admin.into())))
}

/// 创建管理员
///
/// POST /api/admin/admin-users
#[instrument(skip_all)]
pub async fn create_admin_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateAdminUserRequest>,
) -> Result<Json<ApiResponse<AdminUserDto>>> {
    req.validate()?;
    let username = req.username.trim();
    check_username(username)?;

    let password_hash = hash_password(&req.password)?;
    let role = req.role.unwrap_or(AdminRole::Operator);
    let display_name = trimmed(req.display_name);
    let admin = state
        .admins
        .insert(username, &password_hash, display_name.as_deref(), role.as_str())
        .await?
        .ok_or_else(|| ApiError::DuplicateUsername(username.to_string()))?;

    info!(
        admin_id = admin.id,
        role = %admin.role,
        operator = %claims.sub,
        "管理员账号已创建"
    );
    Ok(Json(ApiResponse::success_with_message(
        admin.into(),
        "管理员创建成功",
    )))
}

/// 更新管理员
///
/// PUT /api/admin/admin-users/{id}
#[instrument(skip_all, fields(admin_id = id))]
pub async fn update_admin_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAdminUserRequest>,
) -> Result<Json<ApiResponse<AdminUserDto>>> {
    req.validate()?;
    guard_self_change(&claims, id, &req)?;

    let update = AdminUserUpdate {
        display_name: trimmed(req.display_name),
        role: req.role.map(|r| r.as_str().to_string()),
        status: req.status.map(|s| s.as_str().to_string()),
    };
    let admin = state
        .admins
        .update(id, &update)
        .await?
        .ok_or(ApiError::AdminNotFound(id))?;

    info!(
        role = %admin.role,
        status = %admin.status,
        operator = %claims.sub,
        "管理员账号已更新"
    );
    Ok(Json(ApiResponse::success_with_message(
        admin.into(),
        "管理员更新成功",
    )))
}

/// 删除管理员
///
/// DELETE /api/admin/admin-users/{id}
#[instrument(skip_all, fields(admin_id = id))]
pub async fn delete_admin_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>> {
    if claims.subject_id()? == id {
        return Err(ApiError::Forbidden("不能删除当前登录的账号".to_string()));
    }
    if !state.admins.delete(id).await? {
        return Err(ApiError::AdminNotFound(id));
    }

    info!(operator = %claims.sub, "管理员账号已删除");
    Ok(Json(ApiResponse::success_with_message((), "管理员删除成功")))
}

/// 重置管理员密码，同时解除登录锁定
///
/// POST /api/admin/admin-users/{id}/reset-password
#[instrument(skip_all, fields(admin_id = id))]
pub async fn reset_admin_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>> {
    req.validate()?;
    let password_hash = hash_password(&req.new_password)?;
    if !state.admins.update_password(id, &password_hash).await? {
        return Err(ApiError::AdminNotFound(id));
    }

    info!(operator = %claims.sub, "管理员密码已重置");
    Ok(Json(ApiResponse::success_with_message((), "密码重置成功")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ROLE_ADMIN;
    use tokio_test::{assert_err, assert_ok};

    fn claims(id: i64) -> Claims {
        Claims {
            sub: id.to_string(),
            name: None,
            role: ROLE_ADMIN.to_string(),
            iat: 0,
            exp: 0,
            iss: "points-api".to_string(),
        }
    }

    #[test]
    fn test_check_username() {
        assert_ok!(check_username("ops_lee-01.cn"));
        assert_err!(check_username("ab"));
        assert_err!(check_username("运营小李"));
        assert_err!(check_username("ops lee"));
        assert_err!(check_username(&"a".repeat(51)));
    }

    #[test]
    fn test_self_demote_and_disable_rejected() {
        let demote = UpdateAdminUserRequest {
            role: Some(AdminRole::Operator),
            ..Default::default()
        };
        let disable = UpdateAdminUserRequest {
            status: Some(AdminStatus::Disabled),
            ..Default::default()
        };
        let rename = UpdateAdminUserRequest {
            display_name: Some("新名字".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            guard_self_change(&claims(7), 7, &demote),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            guard_self_change(&claims(7), 7, &disable),
            Err(ApiError::Forbidden(_))
        ));
        assert_ok!(guard_self_change(&claims(7), 7, &rename));
        // 修改其他账号不受限制
        assert_ok!(guard_self_change(&claims(7), 8, &demote));
    }
}
