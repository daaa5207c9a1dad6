//! 微信小程序登录与微信支付通知

pub mod client;
pub mod notify;

pub use client::{DevWechatClient, HttpWechatClient, WechatClient, WechatSession};
pub use notify::{NotifyDecoder, NotifyError, TradeAction, Transaction, TransactionAmount};
