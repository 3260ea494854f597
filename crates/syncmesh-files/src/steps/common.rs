//! Shared subtasks of the file pipelines.
//!
//! Every helper is one overlay-facing unit of work: upload or remove
//! the chunks of one version, fetch or store a meta document. Steps
//! compose these and add the context handling and rollback around
//! them.

use crate::chunk::nonce_index;
use crate::profile::{FileVersion, MetaDocument};
use crate::session::Session;
use crate::{addressing, FileError};
use bytes::Bytes;
use syncmesh_dht::Key160;
use syncmesh_process::ProcessError;

/// Upper bound of the version key space, for full-range removals.
pub(crate) fn max_key() -> Key160 {
    Key160::from_bytes([0xFF; syncmesh_dht::KEY_LENGTH])
}

/// Wraps a file layer error into a step execution failure.
pub(crate) fn to_process(err: FileError) -> ProcessError {
    ProcessError::execution(err)
}

/// Encrypts and stores the chunks of one version. Returns the version
/// descriptor listing the chunk locations.
pub(crate) async fn put_chunks(
    session: &Session,
    meta_location: Key160,
    version_index: u32,
    data: &[u8],
) -> Result<FileVersion, FileError> {
    let chunk_size = session.config().chunk_size.max(1);
    let keys = session.profiles().keys();
    let mut chunk_keys = Vec::new();

    for (i, chunk) in data.chunks(chunk_size).enumerate() {
        let chunk_index = u32::try_from(i)
            .map_err(|_| FileError::IllegalArgument("file has too many chunks".into()))?;
        let sealed = session
            .cipher()
            .encrypt(nonce_index(version_index, chunk_index), chunk)?;
        let location = addressing::chunk_location(meta_location, version_index, chunk_index);
        session
            .client()
            .put(
                location,
                addressing::domain_key(),
                addressing::chunk_content(),
                Key160::ZERO,
                Key160::ZERO,
                Bytes::from(sealed),
                keys,
            )
            .await?;
        chunk_keys.push(location);
    }

    Ok(FileVersion {
        index: version_index,
        size: data.len() as u64,
        chunk_keys,
    })
}

/// Fetches, verifies and decrypts the chunks of one version.
pub(crate) async fn fetch_chunks(
    session: &Session,
    version: &FileVersion,
) -> Result<Vec<u8>, FileError> {
    let mut data = Vec::with_capacity(version.size as usize);
    for (i, location) in version.chunk_keys.iter().enumerate() {
        let chunk_index = u32::try_from(i)
            .map_err(|_| FileError::Codec("chunk index overflow".into()))?;
        let entry = session
            .client()
            .get(
                *location,
                addressing::domain_key(),
                addressing::chunk_content(),
                Key160::ZERO,
            )
            .await?
            .ok_or_else(|| FileError::NotFound(format!("chunk {chunk_index} missing")))?;
        let opened = session
            .cipher()
            .decrypt(nonce_index(version.index, chunk_index), entry.payload())?;
        data.extend_from_slice(&opened);
    }

    if data.len() as u64 != version.size {
        return Err(FileError::Codec(format!(
            "assembled {} bytes, expected {}",
            data.len(),
            version.size
        )));
    }
    Ok(data)
}

/// Removes the chunks of one version.
pub(crate) async fn remove_chunks(
    session: &Session,
    version: &FileVersion,
) -> Result<(), FileError> {
    let keys = session.profiles().keys();
    for location in &version.chunk_keys {
        session
            .client()
            .remove(
                *location,
                addressing::domain_key(),
                addressing::chunk_content(),
                Key160::ZERO,
                keys,
            )
            .await?;
    }
    Ok(())
}

/// Fetches the newest meta document at a location, with its stored
/// version key.
pub(crate) async fn fetch_meta(
    session: &Session,
    meta_location: Key160,
) -> Result<(Key160, MetaDocument), FileError> {
    let (version, _, document) = fetch_meta_entry(session, meta_location).await?;
    Ok((version, document))
}

/// Like [`fetch_meta`], but also returns the stored entry's lineage
/// reference, so the caller can put the document back exactly where it
/// was.
pub(crate) async fn fetch_meta_entry(
    session: &Session,
    meta_location: Key160,
) -> Result<(Key160, Key160, MetaDocument), FileError> {
    let (version, entry) = session
        .client()
        .get_latest(
            meta_location,
            addressing::domain_key(),
            addressing::meta_content(),
        )
        .await?
        .ok_or_else(|| FileError::NotFound("meta document missing".into()))?;
    let document = serde_json::from_slice(entry.payload())?;
    Ok((version, entry.based_on(), document))
}

/// Stores a meta document as the successor of `based_on`. Returns the
/// new version key.
pub(crate) async fn put_meta(
    session: &Session,
    meta_location: Key160,
    document: &MetaDocument,
    based_on: Key160,
) -> Result<Key160, FileError> {
    let payload = serde_json::to_vec(document)?;
    let version = addressing::next_version(based_on, &payload);
    session
        .client()
        .put(
            meta_location,
            addressing::domain_key(),
            addressing::meta_content(),
            version,
            based_on,
            Bytes::from(payload),
            session.profiles().keys(),
        )
        .await?;
    Ok(version)
}

/// Puts a meta document back at the exact version key and lineage
/// reference it was removed from, leaving the version chain as it was.
pub(crate) async fn restore_meta(
    session: &Session,
    meta_location: Key160,
    document: &MetaDocument,
    version: Key160,
    based_on: Key160,
) -> Result<(), FileError> {
    let payload = serde_json::to_vec(document)?;
    session
        .client()
        .put(
            meta_location,
            addressing::domain_key(),
            addressing::meta_content(),
            version,
            based_on,
            Bytes::from(payload),
            session.profiles().keys(),
        )
        .await?;
    Ok(())
}

/// Removes one stored meta document version.
pub(crate) async fn remove_meta_version(
    session: &Session,
    meta_location: Key160,
    version: Key160,
) -> Result<(), FileError> {
    session
        .client()
        .remove(
            meta_location,
            addressing::domain_key(),
            addressing::meta_content(),
            version,
            session.profiles().keys(),
        )
        .await?;
    Ok(())
}

/// Removes every stored version of a meta document.
pub(crate) async fn remove_all_meta(
    session: &Session,
    meta_location: Key160,
) -> Result<usize, FileError> {
    let removed = session
        .client()
        .remove_range(
            meta_location,
            addressing::domain_key(),
            addressing::meta_content(),
            Key160::ZERO,
            max_key(),
            session.profiles().keys(),
        )
        .await?;
    Ok(removed)
}
