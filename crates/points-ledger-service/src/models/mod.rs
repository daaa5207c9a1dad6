//! 积分服务领域模型

pub mod enums;
pub mod ledger;
pub mod merchant;
pub mod order;
pub mod user;

pub use enums::{MerchantStatus, OrderStatus, PointsSource, UserStatus};
pub use ledger::{
    MAX_LEDGER_DESCRIPTION_CHARS, NewLedgerEntry, POINTS_VALIDITY_DAYS, PointsLedgerEntry,
    reward_expires_at,
};
pub use merchant::{Merchant, MerchantUpdate, NewMerchant};
pub use order::{
    DEFAULT_ORDER_DESCRIPTION, MAX_ORDER_AMOUNT, MIN_ORDER_AMOUNT, NewOrder, ORDER_TTL_MINUTES,
    PAYMENT_METHOD_WECHAT, PaymentOrder, generate_order_no, is_valid_amount, order_expires_at,
};
pub use user::{User, UserProfile};
