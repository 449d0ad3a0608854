use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use backend::{
    AppState,
    audit::{AuditLog, InMemoryAuditLog, PgAuditLog},
    config::Config,
    dingtalk::HttpPlatformClient,
    router::create_router,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    if config.dingtalk.credentials().is_err() {
        tracing::warn!("DingTalk credentials are not configured, platform calls will fail");
    }

    let api = Arc::new(
        HttpPlatformClient::new(config.dingtalk.clone())
            .expect("Failed to build DingTalk HTTP client"),
    );

    // 发送记录：配置了数据库则写入 Postgres，否则保存在内存
    let audit: Arc<dyn AuditLog> = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .after_connect(|conn, _meta| {
                    Box::pin(async move {
                        conn.execute("SET application_name = 'dingtalk_backend';")
                            .await?;
                        Ok(())
                    })
                })
                .connect(database_url)
                .await
                .expect("Failed to connect to Postgres");

            let log = PgAuditLog::new(pool);
            log.ensure_schema()
                .await
                .expect("Failed to prepare message_logs table");
            Arc::new(log)
        }
        None => {
            tracing::info!("DATABASE_URL not set, keeping message logs in memory");
            Arc::new(InMemoryAuditLog::new())
        }
    };

    let state = AppState::new(config.clone(), api, audit);
    let app = create_router(state);

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
