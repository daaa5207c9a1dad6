//! 配置分层加载测试
//!
//! 本文件只有一个测试，独占进程内的环境变量。

use std::fs;

use points_shared::config::AppConfig;

#[test]
fn test_layered_config_and_env_override() {
    let dir = std::env::temp_dir().join(format!("points-config-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("default.toml"),
        r#"
[server]
port = 7000

[database]
max_connections = 3

[wechat]
app_id = "wx-default"
"#,
    )
    .unwrap();
    fs::write(
        dir.join("points-api-service.toml"),
        r#"
[wechat]
app_id = "wx-service"
mock_payment_enabled = true
"#,
    )
    .unwrap();

    // SAFETY: 本测试进程内无其他线程读写这些环境变量
    unsafe {
        std::env::set_var("CONFIG_DIR", &dir);
        std::env::set_var("POINTS_ENV", "staging");
        std::env::set_var("POINTS_DATABASE__MAX_CONNECTIONS", "7");
        std::env::set_var("POINTS_API_PORT", "9100");
    }

    let config = AppConfig::load("points-api-service").unwrap();

    unsafe {
        std::env::remove_var("CONFIG_DIR");
        std::env::remove_var("POINTS_ENV");
        std::env::remove_var("POINTS_DATABASE__MAX_CONNECTIONS");
        std::env::remove_var("POINTS_API_PORT");
    }
    fs::remove_dir_all(&dir).ok();

    assert_eq!(config.service_name, "points-api-service");
    assert_eq!(config.environment, "staging");
    assert_eq!(config.server.port, 9100);
    assert_eq!(config.database.max_connections, 7);
    assert_eq!(config.wechat.app_id, "wx-service");
    assert!(config.wechat.mock_payment_enabled);
    assert!(!config.is_production());
}
