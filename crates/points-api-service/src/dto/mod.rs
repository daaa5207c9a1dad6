//! 请求和响应的数据传输对象

pub mod request;
pub mod response;

pub use request::{
    AdjustPointsRequest, AdminLoginRequest, AdminRole, AdminStatus, ChangePasswordRequest,
    ConsumePointsRequest, CreateAdminUserRequest, CreateMerchantRequest, CreatePaymentRequest,
    ExpireOrdersRequest, MerchantQueryFilter, MockPaymentRequest, OrderQueryFilter,
    PaginationParams, PointsHistoryQuery, RefundRequest, ResetPasswordRequest,
    UpdateAdminUserRequest, UpdateMerchantRequest, UpdateUserStatusRequest, UserQueryFilter,
    WechatLoginRequest,
};
pub use response::{
    AdminUserDto, ApiResponse, CreatePaymentResponse, DashboardStats, LoginResponse,
    PageResponse, UserDetailDto,
};
