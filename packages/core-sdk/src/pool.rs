use std::sync::Arc;

use tokio::{
    sync::{mpsc, Mutex, Semaphore},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::DispatchError,
    generator::Generator,
    models::{BackgroundTask, GenerationOutcome},
};

/**
 * \brief 后台任务队列接口。只报告派发是否成功，不跟踪任务结果。
 */
pub trait JobQueue: Send + Sync {
    fn submit(&self, task: BackgroundTask) -> Result<(), DispatchError>;
}

/**
 * \brief 进程内后台任务池：一个派发循环加信号量限制的并发执行。
 * \details 同一图片的重复任务不去重，也不提供取消；任务失败只写日志。
 */
#[derive(Clone)]
pub struct TaskPool {
    tx: mpsc::UnboundedSender<BackgroundTask>,
    shutdown: CancellationToken,
    dispatcher: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl TaskPool {
    /**
     * \brief 创建任务池并在当前 tokio 运行时上启动派发循环。
     */
    pub fn new(generator: Generator, concurrency: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_dispatcher(
            rx,
            generator,
            concurrency.max(1),
            shutdown.clone(),
        ));
        Self {
            tx,
            shutdown,
            dispatcher: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /**
     * \brief 停止接收新任务，等待已排队与执行中的任务全部结束。
     */
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.dispatcher.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("task pool dispatcher ended abnormally: {}", e);
            }
        }
    }
}

impl JobQueue for TaskPool {
    fn submit(&self, task: BackgroundTask) -> Result<(), DispatchError> {
        if self.shutdown.is_cancelled() {
            return Err(DispatchError::QueueClosed);
        }
        self.tx
            .send(task)
            .map_err(|_| DispatchError::QueueClosed)?;
        tracing::debug!(image_id = %task.image_id(), "background task queued");
        Ok(())
    }
}

async fn run_dispatcher(
    mut rx: mpsc::UnboundedReceiver<BackgroundTask>,
    generator: Generator,
    concurrency: usize,
    shutdown: CancellationToken,
) {
    let semaphore = Arc::new(Semaphore::new(concurrency));

    loop {
        let received = tokio::select! {
            received = rx.recv() => received,
            _ = shutdown.cancelled() => break,
        };
        match received {
            Some(task) => spawn_task(&semaphore, &generator, task).await,
            None => break,
        }
    }

    rx.close();
    while let Some(task) = rx.recv().await {
        spawn_task(&semaphore, &generator, task).await;
    }

    // all permits back means nothing is still running
    if semaphore.acquire_many(concurrency as u32).await.is_err() {
        tracing::error!("task pool semaphore closed before drain");
    }
    tracing::info!("task pool stopped");
}

async fn spawn_task(semaphore: &Arc<Semaphore>, generator: &Generator, task: BackgroundTask) {
    let permit = match semaphore.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => {
            tracing::error!(image_id = %task.image_id(), "cannot acquire task permit: {}", e);
            return;
        }
    };
    let generator = generator.clone();
    tokio::spawn(async move {
        let _permit = permit;
        execute(&generator, task).await;
    });
}

async fn execute(generator: &Generator, task: BackgroundTask) {
    match task {
        BackgroundTask::GenerateAltText(id) => match generator.generate(id).await {
            Ok(GenerationOutcome::Generated(_)) => {
                tracing::info!(image_id = %id, outcome = "generated", "background alt text job finished");
            }
            Ok(GenerationOutcome::Skipped(_)) => {
                tracing::info!(image_id = %id, outcome = "skipped", "background alt text job finished");
            }
            Err(e) => {
                tracing::error!(image_id = %id, kind = e.kind(), error = %e, "background alt text job failed");
            }
        },
    }
}
