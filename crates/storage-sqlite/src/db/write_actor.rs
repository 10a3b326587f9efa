use super::DbPool;
use crate::errors::StorageError;
use diesel::SqliteConnection;
use log::{error, info};
use poptimizer_core::errors::Result;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

// A job runs on the writer's connection inside an immediate transaction.
type Job<T> = Box<dyn FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static>;

type AnyBox = Box<dyn Any + Send + 'static>;

/// Handle for sending jobs to the writer actor.
#[derive(Clone)]
pub struct WriteHandle {
    // The job's return type is erased so one channel serves every caller.
    tx: mpsc::Sender<(Job<AnyBox>, oneshot::Sender<Result<AnyBox>>)>,
}

impl WriteHandle {
    /// Executes a job on the writer actor's dedicated connection.
    ///
    /// Jobs run one at a time, each in its own immediate transaction, so a
    /// read-then-write inside one job is atomic with respect to every other
    /// write.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static + Any,
    {
        let (ret_tx, ret_rx) = oneshot::channel();

        self.tx
            .send((Box::new(move |c| job(c).map(|v| Box::new(v) as AnyBox)), ret_tx))
            .await
            .map_err(|_| StorageError::WriterStopped("job channel is closed".to_string()))?;

        let boxed = ret_rx.await.map_err(|_| {
            StorageError::WriterStopped("writer dropped the reply without sending it".to_string())
        })??;
        boxed.downcast::<T>().map(|v| *v).map_err(|_| {
            StorageError::WriterStopped("writer returned an unexpected result type".to_string())
                .into()
        })
    }
}

/// Spawns a background Tokio task that acts as the single writer to the
/// database. The actor owns one pooled connection and runs jobs serially.
/// It stops when every [`WriteHandle`] is dropped.
pub fn spawn_writer(pool: Arc<DbPool>) -> WriteHandle {
    // Bounded; senders wait when the writer falls behind.
    let (tx, mut rx) = mpsc::channel::<(Job<AnyBox>, oneshot::Sender<Result<AnyBox>>)>(1024);

    tokio::spawn(async move {
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                error!("Writer actor could not get a database connection: {}", e);
                // Dropping the receiver makes every exec fail with WriterStopped.
                return;
            }
        };
        info!("Database writer started");

        while let Some((job, reply_tx)) = rx.recv().await {
            let result: Result<AnyBox> = conn
                .immediate_transaction::<_, StorageError, _>(|c| {
                    job(c).map_err(StorageError::from)
                })
                .map_err(|e: StorageError| e.into());

            // The requester may have gone away; nothing to report then.
            let _ = reply_tx.send(result);
        }
        info!("Database writer stopped");
    });

    WriteHandle { tx }
}
