// src/merge.rs
//! Batch maintenance over the correspondent collection.
//!
//! Two jobs live here: merging duplicate correspondents into the
//! earliest-created one, and repairing display names that are serialized
//! JSON blobs left behind by earlier tooling.
//!
//! The merge is fail-fast: any HTTP failure aborts the whole run.
//! Documents are always re-pointed to the survivor before their loser is
//! deleted, so an aborted run never orphans a document reference, but a
//! partially merged group has to be investigated manually.

use crate::api::types::NamedResource;
use crate::api::PaperlessClient;
use crate::error::AppError;
use serde_json::Value;
use std::collections::BTreeMap;

/// Groups correspondents by trim+lowercase name, preserving a stable
/// group order for deterministic runs.
fn group_by_normalized_name(
    correspondents: Vec<NamedResource>,
) -> BTreeMap<String, Vec<NamedResource>> {
    let mut grouped: BTreeMap<String, Vec<NamedResource>> = BTreeMap::new();
    for correspondent in correspondents {
        grouped
            .entry(crate::resolve::normalize_name(&correspondent.name))
            .or_default()
            .push(correspondent);
    }
    grouped
}

/// Title-cases a name: the first letter of every alphabetic run is
/// uppercased, the rest lowercased.
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_alphabetic = false;
    for ch in name.chars() {
        if ch.is_alphabetic() {
            if prev_alphabetic {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alphabetic = true;
        } else {
            out.push(ch);
            prev_alphabetic = false;
        }
    }
    out
}

/// Merges every group of same-named correspondents into its lowest-id
/// member, then normalizes the survivor's display name.
///
/// Lowest id means earliest-created, the only ordering signal the API
/// gives us, so it is treated as canonical.
pub async fn merge_duplicate_correspondents(client: &PaperlessClient) -> Result<(), AppError> {
    log::info!("Starting duplicate correspondent cleanup");

    let correspondents = client.correspondents().await?;
    log::info!("Fetched {} correspondents", correspondents.len());

    for (name, mut group) in group_by_normalized_name(correspondents) {
        if group.len() < 2 {
            continue;
        }

        group.sort_by_key(|c| c.id);
        let ids: Vec<u64> = group.iter().map(|c| c.id).collect();
        log::info!("Found duplicates for name '{}': {:?}", name, ids);

        let survivor = group.remove(0);
        let losers = group;

        // Every document of a loser must point at the survivor before
        // that loser can be deleted; deleting first would orphan them.
        for loser in &losers {
            let documents = client.documents_for_correspondent(loser.id).await?;
            log::info!(
                "Re-pointing {} documents from correspondent {} to {}",
                documents.len(),
                loser.id,
                survivor.id
            );
            for document in documents {
                client
                    .update_document(
                        document.id,
                        &serde_json::json!({ "correspondent": survivor.id }),
                    )
                    .await?;
            }
        }

        for loser in &losers {
            log::info!("Deleting duplicate correspondent {}", loser.id);
            client.delete_correspondent(loser.id).await?;
        }

        let canonical = title_case(survivor.name.trim());
        if survivor.name != canonical {
            log::info!(
                "Renaming survivor {} from '{}' to '{}'",
                survivor.id,
                survivor.name,
                canonical
            );
            client.rename_correspondent(survivor.id, &canonical).await?;
        }
    }

    log::info!("Duplicate correspondent cleanup completed");
    Ok(())
}

/// Extracts the real name from correspondents whose display name is a
/// serialized `{"correspondent": "..."}` object; plain names are left
/// alone.
pub async fn cleanup_json_names(client: &PaperlessClient) -> Result<(), AppError> {
    log::info!("Starting correspondent JSON name cleanup");

    let correspondents = client.correspondents().await?;
    for correspondent in correspondents {
        let Ok(parsed) = serde_json::from_str::<Value>(&correspondent.name) else {
            log::debug!(
                "Correspondent {} has a plain text name, skipping",
                correspondent.id
            );
            continue;
        };
        let Some(real_name) = parsed.get("correspondent").and_then(Value::as_str) else {
            continue;
        };

        log::info!(
            "Correspondent {} has a JSON name, extracting '{}'",
            correspondent.id,
            real_name
        );
        client
            .rename_correspondent(correspondent.id, real_name)
            .await?;
    }

    log::info!("Correspondent JSON name cleanup completed");
    Ok(())
}
