use async_trait::async_trait;

use crate::errors::Result;
use crate::uow::UnitOfWork;
use crate::utils::short_type_name;

/// One step of a [`Dag`](super::Dag).
///
/// `params` is shared by every node of the run without locking. Nodes that
/// may run concurrently must write disjoint fields of it.
#[async_trait]
pub trait Action<P>: Send + Sync + 'static
where
    P: Send + Sync + 'static,
{
    async fn run(&self, ctx: &UnitOfWork, params: &P) -> Result<()>;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        short_type_name::<Self>()
    }
}
