//! The proxy file registry: the mapping from an original path's fingerprint
//! to the sandbox proxy file standing in for it.

use std::io::Write;

use crate::fingerprint::fingerprint;

/// One record per original path the tracee has written to, or is about to
/// unlink or rename.
#[derive(Debug, Clone)]
pub struct Proxyfile {
    pub original_path: Vec<u8>,
    pub fingerprint: String,
    pub proxy_path: Vec<u8>,
}

/// Insertion-ordered collection of [`Proxyfile`] records, keyed by
/// fingerprint. At most one record exists per fingerprint at any time;
/// `proxy_path` never changes for the lifetime of a record.
#[derive(Debug)]
pub struct ProxyFileRegistry {
    sandbox_dir: Vec<u8>,
    records: Vec<Proxyfile>,
}

impl ProxyFileRegistry {
    pub fn new(sandbox_dir: Vec<u8>) -> Self {
        ProxyFileRegistry {
            sandbox_dir,
            records: Vec::new(),
        }
    }

    pub fn sandbox_dir(&self) -> &[u8] {
        &self.sandbox_dir
    }

    /// Returns the record whose fingerprint matches `original_path`, if any.
    pub fn lookup(&self, original_path: &[u8]) -> Option<&Proxyfile> {
        let fp = fingerprint(original_path);
        self.records.iter().find(|r| r.fingerprint == fp)
    }

    /// Inserts a new record for `original_path` and returns a reference to
    /// it. Callers must `lookup` first; inserting a path whose fingerprint
    /// already has a record violates the at-most-one-record invariant and
    /// is a caller bug, not a runtime error this function detects.
    pub fn insert(&mut self, original_path: Vec<u8>) -> &Proxyfile {
        let fp = fingerprint(&original_path);
        let mut proxy_path = self.sandbox_dir.clone();
        proxy_path.extend_from_slice(fp.as_bytes());

        self.records.push(Proxyfile {
            original_path,
            fingerprint: fp,
            proxy_path,
        });
        self.records.last().unwrap()
    }

    /// Removes the record with the given fingerprint, if present, releasing
    /// its owned byte strings. Does not touch the filesystem — the scratch
    /// file at `proxy_path` is cleaned up separately, in bulk, on final
    /// cleanup.
    pub fn remove(&mut self, fingerprint: &str) -> Option<Proxyfile> {
        let idx = self.records.iter().position(|r| r.fingerprint == fingerprint)?;
        Some(self.records.remove(idx))
    }

    /// Stable iteration in insertion order, for map output.
    pub fn iter(&self) -> impl Iterator<Item = &Proxyfile> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Deletes every record's proxy file from the filesystem. Best-effort:
    /// a missing file is not an error, since the tracee may have already
    /// unlinked its own proxy as part of normal operation.
    pub fn remove_all_proxy_files(&self) {
        for record in &self.records {
            let path = std::path::PathBuf::from(
                String::from_utf8_lossy(&record.proxy_path).into_owned(),
            );
            let _ = std::fs::remove_file(path);
        }
    }

    /// Writes one `<proxy_path> = <original_path>` line per record, in
    /// iteration order, to `out`.
    pub fn write_map<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        for record in &self.records {
            out.write_all(&record.proxy_path)?;
            out.write_all(b" = ")?;
            out.write_all(&record.original_path)?;
            out.write_all(b"\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ProxyFileRegistry {
        ProxyFileRegistry::new(b"/tmp/fssb-1/".to_vec())
    }

    #[test]
    fn lookup_misses_before_insert() {
        let reg = registry();
        assert!(reg.lookup(b"/etc/hosts").is_none());
    }

    #[test]
    fn insert_then_lookup_finds_the_same_record() {
        let mut reg = registry();
        reg.insert(b"/etc/hosts".to_vec());
        let found = reg.lookup(b"/etc/hosts").unwrap();
        assert_eq!(found.original_path, b"/etc/hosts");
        assert!(found.proxy_path.starts_with(b"/tmp/fssb-1/"));
    }

    #[test]
    fn proxy_path_is_stable_across_lookups() {
        let mut reg = registry();
        reg.insert(b"/etc/hosts".to_vec());
        let first = reg.lookup(b"/etc/hosts").unwrap().proxy_path.clone();
        let second = reg.lookup(b"/etc/hosts").unwrap().proxy_path.clone();
        assert_eq!(first, second);
    }

    #[test]
    fn remove_drops_the_record() {
        let mut reg = registry();
        let fp = reg.insert(b"/etc/hosts".to_vec()).fingerprint.clone();
        assert!(reg.remove(&fp).is_some());
        assert!(reg.lookup(b"/etc/hosts").is_none());
    }

    #[test]
    fn iteration_order_matches_insertion_order() {
        let mut reg = registry();
        reg.insert(b"/a".to_vec());
        reg.insert(b"/b".to_vec());
        reg.insert(b"/c".to_vec());
        let paths: Vec<_> = reg.iter().map(|r| r.original_path.clone()).collect();
        assert_eq!(paths, vec![b"/a".to_vec(), b"/b".to_vec(), b"/c".to_vec()]);
    }

    #[test]
    fn rename_onto_an_already_tracked_destination_leaves_one_record() {
        // Mirrors the interposer's rename handler: both `old` and `new` are
        // already tracked, `old` is renamed onto `new`. The destination's
        // pre-existing record must be dropped before the new one is
        // inserted, or two records would end up sharing `new`'s fingerprint.
        let mut reg = registry();
        reg.insert(b"/tmp/old".to_vec());
        reg.insert(b"/tmp/new".to_vec());

        let old_fp = fingerprint(b"/tmp/old");
        let new_fp = fingerprint(b"/tmp/new");
        reg.remove(&old_fp);
        reg.remove(&new_fp);
        reg.insert(b"/tmp/new".to_vec());

        assert!(reg.lookup(b"/tmp/old").is_none());
        let found = reg.lookup(b"/tmp/new").unwrap();
        assert_eq!(found.original_path, b"/tmp/new");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn write_map_renders_one_line_per_record() {
        let mut reg = registry();
        reg.insert(b"/etc/hosts".to_vec());
        let mut buf = Vec::new();
        reg.write_map(&mut buf).unwrap();
        let rendered = String::from_utf8(buf).unwrap();
        assert!(rendered.starts_with("/tmp/fssb-1/"));
        assert!(rendered.trim_end().ends_with("/etc/hosts"));
    }
}
