use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use payslip_harvest::{logger, App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logger::init(config.verbose_logging);

    // Ctrl-C 取消所有等待和转换
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ 收到 Ctrl-C，正在取消...");
            ctrl_c.cancel();
        }
    });

    // 初始化并运行应用
    let _summary = App::initialize(config, cancel).await?.run().await?;

    Ok(())
}
