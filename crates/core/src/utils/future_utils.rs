use std::future::Future;

use futures::future::join_all;

use crate::errors::{ErrorGroup, Result};

/// Runs every future to completion and joins their failures.
///
/// Unlike `try_join_all` nothing is cancelled on the first error. A single
/// failure is returned as is; several become an [`ErrorGroup`].
pub async fn join_all_errors<I, F>(futures: I) -> Result<()>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<()>>,
{
    join_all(futures)
        .await
        .into_iter()
        .filter_map(|outcome| outcome.err())
        .collect::<ErrorGroup>()
        .into_result()
}
