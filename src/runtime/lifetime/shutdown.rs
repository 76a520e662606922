use std::time::Duration;

use futures_util::future::join_all;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// 等待 Ctrl+C，然后通知并等待所有后台任务退出
pub async fn listen_for_shutdown(shutdown_tx: watch::Sender<bool>, tasks: Vec<JoinHandle<()>>) {
    wait_for_signal().await;
    stop_tasks(shutdown_tx, tasks).await;
}

/// 等待 Ctrl+C 信号
pub async fn wait_for_signal() {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, stopping background tasks...");
        }
        Err(e) => {
            warn!(
                "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
                e
            );
        }
    }
}

/// 广播关闭信号并在超时内等待任务结束
pub async fn stop_tasks(shutdown_tx: watch::Sender<bool>, tasks: Vec<JoinHandle<()>>) {
    // 接收端可能已全部退出，此时发送失败无影响
    let _ = shutdown_tx.send(true);

    let count = tasks.len();
    let shutdown_result = timeout(
        Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        join_all(tasks),
    )
    .await;

    match shutdown_result {
        Ok(results) => {
            let panicked = results.iter().filter(|r| r.is_err()).count();
            if panicked > 0 {
                error!("{} of {} background tasks ended abnormally", panicked, count);
            }
            info!("All {} background tasks stopped", count);
        }
        Err(_) => {
            error!(
                "Background tasks did not stop within {} seconds, exiting anyway",
                SHUTDOWN_TIMEOUT_SECS
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_tasks_signals_workers() {
        let (tx, mut rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            while !*rx.borrow() {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });

        timeout(Duration::from_secs(2), stop_tasks(tx, vec![task]))
            .await
            .expect("tasks should stop promptly");
    }
}
