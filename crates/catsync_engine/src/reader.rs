//! Remote state reader.

use crate::client::CatalogClient;
use crate::error::ReconcileResult;
use catsync_protocol::RemoteEntry;
use tracing::debug;

/// Reads every entry of a catalog type, following the list cursor.
///
/// Each page is requested after the ID of the last entry of the previous
/// page; iteration ends at the first empty page. The cursor is forward-only,
/// so entries deleted concurrently by another actor may be skipped or
/// repeated. The next reconciliation corrects for that.
pub fn list_all<C: CatalogClient + ?Sized>(
    client: &C,
    catalog_type_id: &str,
    page_size: u32,
) -> ReconcileResult<Vec<RemoteEntry>> {
    let mut entries = Vec::new();
    let mut after: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = client.list(catalog_type_id, page_size, after.as_deref())?;
        pages += 1;

        let Some(last) = page.entries.last() else {
            break;
        };
        after = Some(last.id.clone());
        entries.extend(page.entries);
    }

    debug!(
        catalog_type_id,
        pages,
        entries = entries.len(),
        "read remote catalog entries"
    );

    Ok(entries)
}
