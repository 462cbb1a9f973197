//! Async file I/O kept separate from the synchronous, pure CSV parser,
//! matching the wire library's own `zone_from_file`/`hosts_from_file`
//! split in `util::fs`.

use std::io;
use std::path::Path;

use dns_core::csv_loader;
use dns_core::error::Error as RecordError;
use dns_core::store::RecordStore;

/// Read and parse the records file at `path`. The outer `io::Result`
/// covers reading the file; the inner one covers parsing its contents.
pub async fn store_from_file<P: AsRef<Path>>(
    path: P,
) -> io::Result<Result<RecordStore, RecordError>> {
    let data = tokio::fs::read_to_string(path).await?;
    Ok(csv_loader::deserialise(&data))
}
