//! Startup: optional schema provisioning followed by the full scan that
//! builds the in-memory index.

use tracing::{debug, info, warn};

use crate::backend::UserBackend;
use crate::context::OpContext;

use super::{StoreError, StoreOptions, index::UserIndex};

pub(super) async fn load_index(
    backend: &dyn UserBackend,
    options: &StoreOptions,
    ctx: &OpContext,
) -> Result<UserIndex, StoreError> {
    if options.provision_schema {
        debug!("Provisioning users schema");
        ctx.run("provision_schema", backend.provision_schema())
            .await?
            .map_err(|source| StoreError::StartupFailure {
                reason: "schema provisioning failed".to_string(),
                source,
            })?;
    }

    let rows = match ctx.run("bootstrap_scan", backend.select_all()).await? {
        Ok(rows) => rows,
        Err(source) if options.strict_bootstrap => {
            return Err(StoreError::StartupFailure {
                reason: "bootstrap scan failed".to_string(),
                source,
            });
        }
        Err(err) => {
            warn!(error = %err, "Bootstrap scan failed, starting with an empty index");
            let mut index = UserIndex::new();
            reserve_stored_ids(backend, ctx, &mut index, true).await?;
            return Ok(index);
        }
    };

    let mut index = UserIndex::new();
    let scanned = rows.len();
    for user in rows {
        if user.id().is_none() {
            warn!(email = %user.email(), "Skipping stored user without an identifier");
            continue;
        }
        let (email, id) = (user.email().to_string(), user.id());
        if !index.restore(user) {
            warn!(%email, ?id, "Skipping stored user with a duplicate email");
        }
    }

    reserve_stored_ids(backend, ctx, &mut index, false).await?;
    info!(scanned, indexed = index.len(), "Loaded users from durable store");
    Ok(index)
}

/// Move the identifier counter past every id in the table, including rows
/// the scan could not return.
///
/// After a failed scan the index knows no ids at all, so if the maximum
/// cannot be read either, creation is refused rather than risk handing out
/// an identifier that is already stored.
async fn reserve_stored_ids(
    backend: &dyn UserBackend,
    ctx: &OpContext,
    index: &mut UserIndex,
    scan_failed: bool,
) -> Result<(), StoreError> {
    match ctx.run("bootstrap_scan", backend.max_id()).await? {
        Ok(Some(max)) => index.reserve_through(max),
        Ok(None) => {}
        Err(err) if scan_failed => {
            warn!(error = %err, "Highest stored id unknown, refusing to create users");
            index.refuse_creates();
        }
        Err(err) => {
            warn!(error = %err, "Highest stored id unknown, using the scanned rows");
        }
    }
    Ok(())
}
