//! 认证相关的 HTTP 处理器
//!
//! 小程序用户通过微信 code 登录，后台管理员通过用户名密码登录

use axum::{Extension, Json, extract::State};
use chrono::Utc;
use points_ledger::User;
use points_ledger::models::UserProfile;
use points_shared::crypto::mask_openid;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::auth::{Claims, ROLE_USER, hash_password, verify_password};
use crate::dto::{
    AdminLoginRequest, AdminUserDto, ApiResponse, ChangePasswordRequest, LoginResponse,
    WechatLoginRequest,
};
use crate::error::{ApiError, Result};
use crate::repository::admin_user_repo::failed_login_state;
use crate::state::AppState;

/// 小程序登录
///
/// POST /api/auth/wechat-login
#[instrument(skip_all)]
pub async fn wechat_login(
    State(state): State<AppState>,
    Json(req): Json<WechatLoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse<User>>>> {
    req.validate()?;

    let session = state.wechat.code_to_session(&req.code).await?;
    let profile = UserProfile {
        openid: session.openid,
        unionid: session.unionid,
        nickname: req.nickname,
        avatar_url: req.avatar_url,
    };

    let user = state.users.login_or_register(&profile).await?;
    let (token, expires_at) =
        state
            .jwt_manager
            .generate_token(user.id, user.nickname.as_deref(), ROLE_USER)?;

    info!(
        user_id = user.id,
        openid = %mask_openid(&user.wechat_openid),
        "小程序用户登录"
    );

    Ok(Json(ApiResponse::success_with_message(
        LoginResponse {
            token,
            expires_at,
            user,
        },
        "登录成功",
    )))
}

/// 管理员登录
///
/// POST /api/auth/admin/login
///
/// 连续 5 次密码错误锁定 30 分钟
#[instrument(skip_all)]
pub async fn admin_login(
    State(state): State<AppState>,
    Json(req): Json<AdminLoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse<AdminUserDto>>>> {
    req.validate()?;

    let admin = state
        .admins
        .find_by_username(&req.username)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !admin.is_active() {
        return Err(ApiError::AccountDisabled);
    }

    let now = Utc::now();
    if admin.is_locked(now) {
        return Err(ApiError::AccountLocked);
    }

    if !verify_password(&req.password, &admin.password_hash)? {
        let (attempts, locked_until) = failed_login_state(admin.failed_login_attempts, now);
        state
            .admins
            .record_failed_login(admin.id, attempts, locked_until)
            .await?;

        if locked_until.is_some() {
            warn!(admin_id = admin.id, attempts, "管理员连续登录失败，账号已锁定");
        }
        return Err(ApiError::InvalidCredentials);
    }

    state.admins.record_successful_login(admin.id).await?;

    let (token, expires_at) = state.jwt_manager.generate_token(
        admin.id,
        Some(&admin.username),
        &admin.role,
    )?;

    info!(admin_id = admin.id, role = %admin.role, "管理员登录");

    Ok(Json(ApiResponse::success_with_message(
        LoginResponse {
            token,
            expires_at,
            user: AdminUserDto::from(admin),
        },
        "登录成功",
    )))
}

/// 管理员登出
///
/// POST /api/auth/admin/logout
///
/// Token 无服务端状态，客户端丢弃即可，这里只记录日志
pub async fn admin_logout(Extension(claims): Extension<Claims>) -> Json<ApiResponse<()>> {
    info!(admin_id = %claims.sub, role = %claims.role, "管理员登出");
    Json(ApiResponse::success_with_message((), "登出成功"))
}

/// 修改本人密码
///
/// POST /api/auth/admin/change-password
#[instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>> {
    req.validate()?;
    if req.old_password == req.new_password {
        return Err(ApiError::Validation("新密码不能与原密码相同".to_string()));
    }

    let id = claims.subject_id()?;
    let admin = state
        .admins
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("账号不存在".to_string()))?;
    if !verify_password(&req.old_password, &admin.password_hash)? {
        return Err(ApiError::Validation("原密码错误".to_string()));
    }

    let password_hash = hash_password(&req.new_password)?;
    state.admins.update_password(id, &password_hash).await?;

    info!(admin_id = id, "管理员修改密码");
    Ok(Json(ApiResponse::success_with_message((), "密码修改成功")))
}

/// 当前用户信息
///
/// GET /api/auth/user-info
pub async fn user_info(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResponse<User>>> {
    let user = state.users.get(claims.subject_id()?).await?;
    Ok(Json(ApiResponse::success(user)))
}
