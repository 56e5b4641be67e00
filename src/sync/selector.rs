//! Chooses which app and package ids an invocation targets.

use super::mode::RunMode;
use crate::catalog::ids::{sort_descending, EntityId, EntityKind};
use crate::catalog::store::{CatalogStore, TokenCache};
use crate::runtime::config::SyncConfig;
use crate::runtime::error::SyncError;
use anyhow::Result;

/// Ids targeted by one invocation, each list strictly descending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub apps: Vec<EntityId>,
    pub packages: Vec<EntityId>,
}

/// Computes the identifier lists for `mode`. Newest ids come first.
///
/// Store failures are returned as [`SyncError::StoreRead`].
pub async fn select(
    mode: RunMode,
    store: &dyn CatalogStore,
    tokens: &dyn TokenCache,
    config: &SyncConfig,
) -> Result<Selection> {
    let selection = match mode {
        RunMode::Enumerate => Selection {
            apps: enumerate_range(store, EntityKind::App, config.enumerate_app_headroom())
                .await?,
            packages: enumerate_range(
                store,
                EntityKind::Package,
                config.enumerate_package_headroom(),
            )
            .await?,
        },
        RunMode::TokensOnly => Selection {
            apps: descending(tokens.known_ids(EntityKind::App)),
            packages: descending(tokens.known_ids(EntityKind::Package)),
        },
        RunMode::PackagesNormal => Selection {
            apps: Vec::new(),
            packages: persisted(store, EntityKind::Package).await?,
        },
        RunMode::WithForcedDepots | RunMode::NormalUsingMetadata | RunMode::FullNormal => {
            let mut apps = store
                .all_ids(EntityKind::App)
                .await
                .map_err(SyncError::store_read("all_ids"))?;
            apps.extend(
                store
                    .package_app_ids()
                    .await
                    .map_err(SyncError::store_read("package_app_ids"))?,
            );
            Selection {
                apps: descending(apps),
                packages: persisted(store, EntityKind::Package).await?,
            }
        }
    };

    tracing::debug!(
        mode = %mode,
        apps = selection.apps.len(),
        packages = selection.packages.len(),
        "selected sync targets"
    );

    Ok(selection)
}

async fn enumerate_range(
    store: &dyn CatalogStore,
    kind: EntityKind,
    headroom: u32,
) -> Result<Vec<EntityId>> {
    let highest = store
        .highest_id(kind)
        .await
        .map_err(SyncError::store_read("highest_id"))?;
    Ok((0..highest.saturating_add(headroom)).rev().collect())
}

pub(crate) async fn persisted(store: &dyn CatalogStore, kind: EntityKind) -> Result<Vec<EntityId>> {
    let ids = store
        .all_ids(kind)
        .await
        .map_err(SyncError::store_read("all_ids"))?;
    Ok(descending(ids))
}

fn descending(mut ids: Vec<EntityId>) -> Vec<EntityId> {
    sort_descending(&mut ids);
    ids
}
