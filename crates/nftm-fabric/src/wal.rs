use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{FabricError, Result};
use crate::event::FabricEvent;

/// One journaled event.
///
/// Frame layout, all integers little-endian:
/// ```text
/// | len: u32 | crc32(payload): u32 | payload: bincode(FabricEvent) |
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    pub event: FabricEvent,
}

/// When appended frames reach the disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// `fsync` after each append.
    EveryWrite,
    /// Flush to the OS only.
    #[default]
    OsDefault,
}

const FRAME_HEADER: usize = 8;

fn encode_frame(event: &FabricEvent) -> Result<Vec<u8>> {
    let payload =
        bincode::serialize(event).map_err(|e| FabricError::Serialization(e.to_string()))?;
    let len = u32::try_from(payload.len()).map_err(|_| FabricError::InvalidEntryLength {
        offset: 0,
        length: u32::MAX,
    })?;

    let mut frame = Vec::with_capacity(FRAME_HEADER + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

enum Frame<'a> {
    /// A frame whose checksum matches.
    Valid { payload: &'a [u8], size: usize },
    /// A complete frame with a bad checksum.
    Corrupt,
    /// Not enough bytes left for a frame.
    Torn,
}

fn decode_frame(buf: &[u8]) -> Frame<'_> {
    let Some((header, rest)) = buf.split_first_chunk::<FRAME_HEADER>() else {
        return Frame::Torn;
    };
    let (len, crc) = header.split_at(4);
    let len = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize;
    let crc = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);

    if len == 0 || len > rest.len() {
        return Frame::Torn;
    }
    let payload = &rest[..len];
    let size = FRAME_HEADER + len;
    if crc32fast::hash(payload) == crc {
        Frame::Valid { payload, size }
    } else {
        Frame::Corrupt
    }
}

/// Byte store under a journal: the journal file itself outside of tests.
trait Segment: Send {
    fn append(&mut self, frame: &[u8]) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
    fn size(&self) -> io::Result<u64>;
    fn cut(&mut self, len: u64) -> io::Result<()>;
}

impl Segment for File {
    fn append(&mut self, frame: &[u8]) -> io::Result<()> {
        self.write_all(frame)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn cut(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

struct Tail {
    segment: Box<dyn Segment>,
    /// End of the last complete frame.
    end: u64,
    /// Set when a failed append could not be cut back off.
    failed: bool,
}

impl Tail {
    fn write(&mut self, frame: &[u8], sync_mode: SyncMode) -> io::Result<()> {
        self.segment.append(frame)?;
        if sync_mode == SyncMode::EveryWrite {
            self.segment.sync()?;
        }
        Ok(())
    }

    /// Drop whatever part of a failed frame reached the segment.
    fn roll_back(&mut self) {
        match self.segment.cut(self.end) {
            Ok(()) => warn!(offset = self.end, "failed journal append rolled back"),
            Err(e) => {
                self.failed = true;
                error!(offset = self.end, error = %e, "cannot roll back failed append; journal closed for writes");
            }
        }
    }
}

/// Append-only journal of fabric events in a single file.
///
/// A failed append never leaves a partial frame in front of later ones: the
/// file is cut back to the last complete frame, and if that is impossible
/// the journal rejects every further append. Recovery returns the intact
/// frames in order and trims a torn final frame; a complete frame that fails
/// its checksum is an error, since skipping it would leave a sequence gap.
pub struct WriteAheadLog {
    path: PathBuf,
    tail: Mutex<Tail>,
    sync_mode: SyncMode,
}

fn create_journal_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

impl WriteAheadLog {
    /// Open the journal at `path`, creating it and its directory if needed.
    pub fn open(path: &Path, sync_mode: SyncMode) -> Result<Self> {
        let file = create_journal_file(path)?;
        Self::from_segment(path, Box::new(file), sync_mode)
    }

    /// Like [`WriteAheadLog::open`], holding an exclusive lock on the file
    /// until the journal is dropped.
    pub fn open_exclusive(path: &Path, sync_mode: SyncMode) -> Result<Self> {
        let file = create_journal_file(path)?;
        if file.try_lock_exclusive().is_err() {
            return Err(FabricError::JournalLocked {
                path: path.to_path_buf(),
            });
        }
        Self::from_segment(path, Box::new(file), sync_mode)
    }

    fn from_segment(path: &Path, segment: Box<dyn Segment>, sync_mode: SyncMode) -> Result<Self> {
        let end = segment.size()?;
        Ok(Self {
            path: path.to_path_buf(),
            tail: Mutex::new(Tail {
                segment,
                end,
                failed: false,
            }),
            sync_mode,
        })
    }

    fn tail(&self) -> MutexGuard<'_, Tail> {
        self.tail.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `entry`, returning the offset its frame starts at.
    ///
    /// Fails without writing if the file no longer ends where this journal
    /// left it, i.e. someone else appended.
    pub fn append(&self, entry: &WalEntry) -> Result<u64> {
        let frame = encode_frame(&entry.event)?;

        let mut tail = self.tail();
        if tail.failed {
            return Err(FabricError::JournalFailed);
        }
        let found = tail.segment.size()?;
        if found != tail.end {
            return Err(FabricError::ForeignWrite {
                expected: tail.end,
                found,
            });
        }

        let at = tail.end;
        if let Err(e) = tail.write(&frame, self.sync_mode) {
            tail.roll_back();
            return Err(e.into());
        }
        tail.end += frame.len() as u64;

        debug!(offset = at, bytes = frame.len(), "journal append");
        Ok(at)
    }

    /// Read back every intact entry, oldest first.
    pub fn recover(&self) -> Result<Vec<WalEntry>> {
        let mut tail = self.tail();
        let bytes = fs::read(&self.path)?;
        let mut entries = Vec::new();
        let mut pos = 0usize;

        while pos < bytes.len() {
            match decode_frame(&bytes[pos..]) {
                Frame::Valid { payload, size } => {
                    let event = bincode::deserialize::<FabricEvent>(payload).map_err(|e| {
                        warn!(offset = pos, error = %e, "undecodable journal entry");
                        FabricError::CorruptEntry { offset: pos as u64 }
                    })?;
                    entries.push(WalEntry { event });
                    pos += size;
                }
                Frame::Corrupt => {
                    warn!(offset = pos, "journal entry failed checksum");
                    return Err(FabricError::CorruptEntry { offset: pos as u64 });
                }
                Frame::Torn => {
                    let trailing = bytes.len() - pos;
                    if !tail.failed && tail.end == bytes.len() as u64 {
                        tail.segment.cut(pos as u64)?;
                        tail.end = pos as u64;
                        warn!(offset = pos, trailing, "torn journal tail trimmed");
                    } else {
                        warn!(offset = pos, trailing, "torn journal tail ignored");
                    }
                    break;
                }
            }
        }

        debug!(entries = entries.len(), "journal read");
        Ok(entries)
    }

    /// Discard every entry.
    pub fn truncate(&self) -> Result<()> {
        let mut tail = self.tail();
        tail.segment.cut(0)?;
        tail.end = 0;
        tail.failed = false;
        debug!(path = %self.path.display(), "journal truncated");
        Ok(())
    }

    /// Byte length of the complete frames, i.e. where the next frame goes.
    pub fn offset(&self) -> u64 {
        self.tail().end
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use nftm_ledger::{LedgerEvent, MarketEvent};
    use nftm_types::{AccountId, Amount, TokenId};

    use super::*;

    fn mint(seq: u64) -> WalEntry {
        WalEntry {
            event: FabricEvent::new(LedgerEvent {
                seq,
                event: MarketEvent::TokenMinted {
                    token_id: TokenId::new(seq),
                    creator: AccountId::dev(0),
                    price: Amount::from_wei(seq as u128),
                    token_uri: format!("ipfs://{seq}"),
                },
            }),
        }
    }

    fn journal(dir: &tempfile::TempDir, name: &str) -> (PathBuf, WriteAheadLog) {
        let path = dir.path().join(name);
        let wal = WriteAheadLog::open(&path, SyncMode::default()).unwrap();
        (path, wal)
    }

    #[test]
    fn entries_come_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (_, wal) = journal(&dir, "market.wal");
        for seq in 1..=3 {
            wal.append(&mint(seq)).unwrap();
        }
        assert_eq!(wal.recover().unwrap(), vec![mint(1), mint(2), mint(3)]);
    }

    #[test]
    fn missing_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let (path, wal) = journal(&dir, "a/.nftm/market.wal");
        wal.append(&mint(1)).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn fresh_journal_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (_, wal) = journal(&dir, "empty.wal");
        assert_eq!(wal.offset(), 0);
        assert!(wal.recover().unwrap().is_empty());
    }

    #[test]
    fn bad_checksum_stops_recovery_at_that_entry() {
        let dir = tempfile::tempdir().unwrap();
        let (path, wal) = journal(&dir, "flip.wal");
        wal.append(&mint(1)).unwrap();
        let second = wal.append(&mint(2)).unwrap();
        wal.append(&mint(3)).unwrap();
        drop(wal);

        let mut bytes = fs::read(&path).unwrap();
        bytes[second as usize + FRAME_HEADER] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        let (_, reopened) = journal(&dir, "flip.wal");
        assert!(matches!(
            reopened.recover(),
            Err(FabricError::CorruptEntry { offset }) if offset == second
        ));
    }

    #[test]
    fn torn_tail_is_trimmed_on_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let (path, wal) = journal(&dir, "torn.wal");
        wal.append(&mint(1)).unwrap();
        let second = wal.append(&mint(2)).unwrap();
        let end = wal.offset();
        drop(wal);

        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(end - 3)
            .unwrap();

        let (_, reopened) = journal(&dir, "torn.wal");
        assert_eq!(reopened.recover().unwrap(), vec![mint(1)]);
        assert_eq!(reopened.offset(), second);
        assert_eq!(fs::metadata(&path).unwrap().len(), second);

        reopened.append(&mint(2)).unwrap();
        assert_eq!(reopened.recover().unwrap(), vec![mint(1), mint(2)]);
    }

    #[test]
    fn reopening_continues_at_the_end() {
        let dir = tempfile::tempdir().unwrap();
        let (_, first) = journal(&dir, "again.wal");
        first.append(&mint(1)).unwrap();
        let end = first.offset();
        drop(first);

        let (_, second) = journal(&dir, "again.wal");
        assert_eq!(second.offset(), end);
        assert_eq!(second.append(&mint(2)).unwrap(), end);
        assert_eq!(second.recover().unwrap(), vec![mint(1), mint(2)]);
    }

    #[test]
    fn truncate_then_append() {
        let dir = tempfile::tempdir().unwrap();
        let (_, wal) = journal(&dir, "reset.wal");
        wal.append(&mint(1)).unwrap();

        wal.truncate().unwrap();
        assert_eq!(wal.offset(), 0);
        assert!(wal.recover().unwrap().is_empty());

        assert_eq!(wal.append(&mint(1)).unwrap(), 0);
        assert_eq!(wal.recover().unwrap(), vec![mint(1)]);
    }

    #[test]
    fn synced_appends_are_readable() {
        let dir = tempfile::tempdir().unwrap();
        let wal =
            WriteAheadLog::open(&dir.path().join("sync.wal"), SyncMode::EveryWrite).unwrap();
        wal.append(&mint(1)).unwrap();
        assert_eq!(wal.recover().unwrap().len(), 1);
    }

    /// A file that fails the next `fail_writes` appends after writing only
    /// `keep` bytes of the frame, like a disk that fills up mid-write.
    struct FlakySegment {
        file: File,
        fail_writes: usize,
        keep: usize,
        fail_cut: bool,
    }

    impl Segment for FlakySegment {
        fn append(&mut self, frame: &[u8]) -> io::Result<()> {
            if self.fail_writes > 0 {
                self.fail_writes -= 1;
                self.file.write_all(&frame[..self.keep.min(frame.len())])?;
                return Err(io::Error::other("no space left on device"));
            }
            self.file.write_all(frame)
        }

        fn sync(&mut self) -> io::Result<()> {
            self.file.sync_data()
        }

        fn size(&self) -> io::Result<u64> {
            Segment::size(&self.file)
        }

        fn cut(&mut self, len: u64) -> io::Result<()> {
            if self.fail_cut {
                return Err(io::Error::other("read-only file system"));
            }
            self.file.set_len(len)
        }
    }

    fn fail_next_append(wal: &WriteAheadLog, fail_cut: bool) {
        let file = create_journal_file(&wal.path).unwrap();
        wal.tail().segment = Box::new(FlakySegment {
            file,
            fail_writes: 1,
            keep: 10,
            fail_cut,
        });
    }

    #[test]
    fn failed_append_leaves_no_partial_frame() {
        let dir = tempfile::tempdir().unwrap();
        let (path, wal) = journal(&dir, "flaky.wal");
        wal.append(&mint(1)).unwrap();
        let end = wal.offset();

        fail_next_append(&wal, false);
        assert!(matches!(wal.append(&mint(2)), Err(FabricError::Io(_))));
        assert_eq!(wal.offset(), end);
        assert_eq!(fs::metadata(&path).unwrap().len(), end);

        // Appends after the failure are recoverable.
        wal.append(&mint(2)).unwrap();
        wal.append(&mint(3)).unwrap();
        let (_, reopened) = journal(&dir, "flaky.wal");
        assert_eq!(reopened.recover().unwrap(), vec![mint(1), mint(2), mint(3)]);
    }

    #[test]
    fn unrecoverable_append_closes_journal() {
        let dir = tempfile::tempdir().unwrap();
        let (_, wal) = journal(&dir, "stuck.wal");
        wal.append(&mint(1)).unwrap();

        fail_next_append(&wal, true);
        assert!(wal.append(&mint(2)).is_err());
        assert!(matches!(
            wal.append(&mint(3)),
            Err(FabricError::JournalFailed)
        ));
        assert_eq!(wal.recover().unwrap(), vec![mint(1)]);
    }

    #[test]
    fn append_refuses_to_follow_another_writer() {
        let dir = tempfile::tempdir().unwrap();
        let (_, first) = journal(&dir, "shared.wal");
        let (_, second) = journal(&dir, "shared.wal");

        first.append(&mint(1)).unwrap();
        let end = first.offset();
        assert!(matches!(
            second.append(&mint(1)),
            Err(FabricError::ForeignWrite { expected: 0, found }) if found == end
        ));
        assert_eq!(first.recover().unwrap(), vec![mint(1)]);
    }

    #[test]
    fn exclusive_open_admits_one_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.wal");

        let held = WriteAheadLog::open_exclusive(&path, SyncMode::default()).unwrap();
        assert!(matches!(
            WriteAheadLog::open_exclusive(&path, SyncMode::default()),
            Err(FabricError::JournalLocked { .. })
        ));

        drop(held);
        assert!(WriteAheadLog::open_exclusive(&path, SyncMode::default()).is_ok());
    }

    #[test]
    fn decode_rejects_zero_length_frames() {
        assert!(matches!(decode_frame(&[0u8; 12]), Frame::Torn));
        assert!(matches!(decode_frame(&[1, 2, 3]), Frame::Torn));
    }
}
